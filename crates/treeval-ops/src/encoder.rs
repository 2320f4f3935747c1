//! `PARSE`/`EMIT` and the thin encoder driver between them: a value tree
//! walk that turns into an event stream for an external [`Emitter`], and
//! a straight pass-through into an external [`Parser`].

use treeval_core::{Builder, Kind, V};

use crate::error::{set_last_error, OpsError};
use crate::external::{Emitter, Event, EmitterConfig, Parser, ParserConfig, ScalarStyle};

fn kind_name(k: Kind) -> &'static str {
    match k {
        Kind::Invalid => "invalid",
        Kind::Null => "null",
        Kind::Bool => "bool",
        Kind::Int => "int",
        Kind::Float => "float",
        Kind::String => "string",
        Kind::Sequence => "sequence",
        Kind::Mapping => "mapping",
        Kind::Alias => "alias",
    }
}

/// `PARSE`: `input` must be a string; the external parser and decoder do
/// the rest. `V::INVALID` if `input` isn't a string or the parse fails.
pub fn parse(builder: &Builder, input: V, cfg: &ParserConfig, parser: &mut dyn Parser) -> V {
    if builder.type_of(input) != Kind::String {
        set_last_error(OpsError::TypeViolation {
            expected: "string",
            found: kind_name(builder.type_of(input)),
        });
        return V::INVALID;
    }
    let bytes = builder.as_bytes(input);
    let result = parser.parse(&bytes, cfg, builder);
    if result.is_invalid() {
        set_last_error(OpsError::ExternalFailure);
    }
    result
}

/// `EMIT`: renders `root` through the external emitter into a fresh
/// string value. `V::INVALID` if the emitter aborts.
pub fn emit(builder: &Builder, root: V, cfg: &EmitterConfig, emitter: &mut dyn Emitter) -> V {
    match encode(builder, root, cfg, emitter) {
        Some(bytes) => builder.string(&bytes),
        None => {
            set_last_error(OpsError::ExternalFailure);
            V::INVALID
        }
    }
}

/// Walks `root` and drives `emitter` through
/// `STREAM_START -> DOCUMENT_START -> value events -> DOCUMENT_END -> STREAM_END`,
/// then collects the rendered bytes. `None` if any event is rejected.
pub fn encode(builder: &Builder, root: V, cfg: &EmitterConfig, emitter: &mut dyn Emitter) -> Option<Vec<u8>> {
    if !emitter.emit_event(Event::StreamStart, cfg) {
        return None;
    }
    if !emitter.emit_event(Event::DocumentStart, cfg) {
        return None;
    }
    if !encode_value(builder, root, cfg, emitter) {
        return None;
    }
    if !emitter.emit_event(Event::DocumentEnd, cfg) {
        return None;
    }
    if !emitter.emit_event(Event::StreamEnd, cfg) {
        return None;
    }
    emitter.finish()
}

fn encode_value(builder: &Builder, v: V, cfg: &EmitterConfig, emitter: &mut dyn Emitter) -> bool {
    if builder.type_of(v) == Kind::Alias {
        let anchor = builder
            .indirect_view(v)
            .and_then(|view| view.anchor)
            .map(|a| builder.as_bytes(a));
        return match anchor {
            Some(anchor) => emitter.emit_event(Event::Alias { anchor: &anchor }, cfg),
            None => false,
        };
    }

    let decoration = builder.indirect_view(v);
    let anchor_bytes = decoration.and_then(|d| d.anchor).map(|a| builder.as_bytes(a));
    let tag_bytes = decoration.and_then(|d| d.tag).map(|t| builder.as_bytes(t));
    let anchor = anchor_bytes.as_deref();
    let tag = tag_bytes.as_deref();

    match builder.type_of(v) {
        Kind::Sequence => {
            if !emitter.emit_event(Event::SequenceStart { anchor, tag }, cfg) {
                return false;
            }
            for item in builder.seq_items(v) {
                if !encode_value(builder, item, cfg, emitter) {
                    return false;
                }
            }
            emitter.emit_event(Event::SequenceEnd, cfg)
        }
        Kind::Mapping => {
            if !emitter.emit_event(Event::MappingStart { anchor, tag }, cfg) {
                return false;
            }
            for (key, value) in builder.map_pairs(v) {
                if !encode_value(builder, key, cfg, emitter) {
                    return false;
                }
                if !encode_value(builder, value, cfg, emitter) {
                    return false;
                }
            }
            emitter.emit_event(Event::MappingEnd, cfg)
        }
        _ => {
            let (style, text) = present_scalar(builder, v);
            emitter.emit_event(
                Event::Scalar {
                    anchor,
                    tag,
                    style,
                    text: &text,
                },
                cfg,
            )
        }
    }
}

/// Schema-appropriate scalar presentation: `null`, `true`/`false`,
/// `%lld`-style integers, `%g`-style floats (with `.nan`/`.inf`/`-.inf`
/// for non-finite values), or the raw string bytes.
fn present_scalar(builder: &Builder, v: V) -> (ScalarStyle, Vec<u8>) {
    match builder.type_of(v) {
        Kind::Null => (ScalarStyle::Plain, b"null".to_vec()),
        Kind::Bool => (
            ScalarStyle::Plain,
            if builder.as_bool(v) { b"true".to_vec() } else { b"false".to_vec() },
        ),
        Kind::Int => (ScalarStyle::Plain, builder.as_int(v).to_string().into_bytes()),
        Kind::Float => {
            let f = builder.as_float(v);
            let text = if f.is_nan() {
                ".nan".to_string()
            } else if f.is_infinite() {
                if f > 0.0 { ".inf".to_string() } else { "-.inf".to_string() }
            } else {
                format!("{f}")
            };
            (ScalarStyle::Plain, text.into_bytes())
        }
        Kind::String => (ScalarStyle::DoubleQuoted, builder.as_bytes(v)),
        _ => (ScalarStyle::Plain, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeval_core::Builder;

    struct RecordingEmitter {
        log: Vec<String>,
    }

    impl RecordingEmitter {
        fn new() -> Self {
            RecordingEmitter { log: Vec::new() }
        }
    }

    impl Emitter for RecordingEmitter {
        fn emit_event(&mut self, event: Event<'_>, _cfg: &EmitterConfig) -> bool {
            let line = match event {
                Event::StreamStart => "stream_start".to_string(),
                Event::DocumentStart => "document_start".to_string(),
                Event::DocumentEnd => "document_end".to_string(),
                Event::StreamEnd => "stream_end".to_string(),
                Event::SequenceStart { .. } => "seq_start".to_string(),
                Event::SequenceEnd => "seq_end".to_string(),
                Event::MappingStart { .. } => "map_start".to_string(),
                Event::MappingEnd => "map_end".to_string(),
                Event::Alias { anchor } => format!("alias:{}", String::from_utf8_lossy(anchor)),
                Event::Scalar { text, .. } => format!("scalar:{}", String::from_utf8_lossy(text)),
            };
            self.log.push(line);
            true
        }

        fn finish(&mut self) -> Option<Vec<u8>> {
            Some(self.log.join("\n").into_bytes())
        }
    }

    struct FailingEmitter;

    impl Emitter for FailingEmitter {
        fn emit_event(&mut self, _event: Event<'_>, _cfg: &EmitterConfig) -> bool {
            false
        }

        fn finish(&mut self) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn encode_walks_nested_collections_in_order() {
        let b = Builder::new();
        let root = b.seq(&[b.int(1), b.string(b"two")]);
        let mut emitter = RecordingEmitter::new();
        let out = encode(&b, root, &EmitterConfig::default(), &mut emitter).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "stream_start\ndocument_start\nseq_start\nscalar:1\nscalar:two\nseq_end\ndocument_end\nstream_end"
        );
    }

    #[test]
    fn encode_surfaces_alias_by_anchor() {
        let b = Builder::new();
        let anchor = b.string(b"a1");
        let alias = b.alias(anchor);
        let mut emitter = RecordingEmitter::new();
        let out = encode(&b, alias, &EmitterConfig::default(), &mut emitter).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("alias:a1"));
    }

    #[test]
    fn encode_aborts_on_emitter_rejection() {
        let b = Builder::new();
        let root = b.int(1);
        let mut emitter = FailingEmitter;
        assert!(encode(&b, root, &EmitterConfig::default(), &mut emitter).is_none());
    }

    #[test]
    fn emit_returns_invalid_when_encode_fails() {
        let b = Builder::new();
        let root = b.int(1);
        let mut emitter = FailingEmitter;
        let out = emit(&b, root, &EmitterConfig::default(), &mut emitter);
        assert!(out.is_invalid());
    }

    #[test]
    fn parse_rejects_non_string_input() {
        struct NeverCalled;
        impl Parser for NeverCalled {
            fn parse(&mut self, _bytes: &[u8], _cfg: &ParserConfig, _builder: &Builder) -> V {
                panic!("should not be called");
            }
        }
        let b = Builder::new();
        let mut parser = NeverCalled;
        let out = parse(&b, b.int(1), &ParserConfig::json(), &mut parser);
        assert!(out.is_invalid());
    }
}
