//! Narrow interfaces to the collaborators this crate consumes but never
//! implements: a YAML/JSON tokenizer+event parser, and an emitter that
//! turns a stream of value events back into bytes. `PARSE`/`EMIT`
//! operations are the only callers; everything else in this crate is
//! collaborator-free. [`crate::encoder`] is the thin driver that walks a
//! value tree and feeds it to an [`Emitter`] as events.

use treeval_core::{Builder, Schema, V};

/// Selects the grammar a [`Parser`] should apply and whether multiple
/// top-level documents are permitted in one input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    pub schema: Schema,
    pub multi_document: bool,
}

impl ParserConfig {
    pub fn json() -> Self {
        ParserConfig {
            schema: Schema::Json,
            multi_document: false,
        }
    }

    pub fn yaml(schema: Schema) -> Self {
        ParserConfig {
            schema,
            multi_document: true,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            schema: Schema::default(),
            multi_document: false,
        }
    }
}

/// A tokenizer/event-parser bound to one input buffer. Implementations
/// live outside this crate (a hand-written grammar, a generated parser,
/// a wrapped C library).
pub trait Parser {
    /// Parses the whole input against `builder`, producing a single
    /// value, or a sequence of documents if `cfg.multi_document` is set.
    /// Returns `V::INVALID` on any parse failure.
    fn parse(&mut self, bytes: &[u8], cfg: &ParserConfig, builder: &Builder) -> V;
}

/// Output rendering style for an [`Emitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmitterConfig {
    pub schema: Schema,
    pub indent: u8,
    pub flow_collections: bool,
}

impl EmitterConfig {
    pub fn compact() -> Self {
        EmitterConfig {
            schema: Schema::Json,
            indent: 0,
            flow_collections: true,
        }
    }

    pub fn pretty() -> Self {
        EmitterConfig {
            schema: Schema::Yaml12Core,
            indent: 2,
            flow_collections: false,
        }
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig::pretty()
    }
}

/// How a scalar's text should be quoted/presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    DoubleQuoted,
}

/// One step of the event stream [`crate::encoder`] drives an [`Emitter`]
/// with. Mirrors the stream/document/value event shapes a YAML/JSON
/// emitter library exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    StreamStart,
    DocumentStart,
    DocumentEnd,
    StreamEnd,
    Scalar {
        anchor: Option<&'a [u8]>,
        tag: Option<&'a [u8]>,
        style: ScalarStyle,
        text: &'a [u8],
    },
    SequenceStart {
        anchor: Option<&'a [u8]>,
        tag: Option<&'a [u8]>,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<&'a [u8]>,
        tag: Option<&'a [u8]>,
    },
    MappingEnd,
    Alias {
        anchor: &'a [u8],
    },
}

/// Consumes an event stream and renders it to bytes. Implementations
/// live outside this crate.
pub trait Emitter {
    /// Handles one event. `false` aborts the whole emit with no partial
    /// result collected.
    fn emit_event(&mut self, event: Event<'_>, cfg: &EmitterConfig) -> bool;

    /// Collects everything handled so far into the rendered output.
    /// Called once, after `StreamEnd`.
    fn finish(&mut self) -> Option<Vec<u8>>;
}
