//! Schema-aware scalar decoder: raw bytes in, a recognized primitive
//! shape out. This module only classifies text; turning the result into
//! a contained [`crate::V`] is [`crate::Builder`]'s job (it owns the
//! arena the out-of-line forms would live in).

use crate::schema::Schema;
use crate::value::Kind;

/// Performance cutover: past this many bytes, a scalar is always built
/// as a string without attempting to recognize a constant or number.
pub const SCALAR_STRING_CUTOVER: usize = 4096;

/// The recognized shape of a decoded scalar. Carries enough information for
/// the builder to choose the right factory; does not itself hold a `V`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarText {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str,
}

impl ScalarText {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            ScalarText::Null => Kind::Null,
            ScalarText::Bool(_) => Kind::Bool,
            ScalarText::Int(_) | ScalarText::UInt(_) => Kind::Int,
            ScalarText::Float(_) => Kind::Float,
            ScalarText::Str => Kind::String,
        }
    }
}

/// Decodes `bytes` per `schema`. If `forced` is set, the produced shape
/// must match it — except forcing `Kind::String`, which always succeeds
/// by skipping recognition entirely.
///
/// Returns `Err(())` only when a `forced` kind could not be satisfied; a
/// builder should turn that into `V::INVALID`.
pub fn decode(bytes: &[u8], forced: Option<Kind>, schema: Schema) -> Result<ScalarText, ()> {
    if forced == Some(Kind::String) {
        return Ok(ScalarText::Str);
    }

    let result = if bytes.len() > SCALAR_STRING_CUTOVER {
        ScalarText::Str
    } else {
        match std::str::from_utf8(bytes) {
            Err(_) => ScalarText::Str,
            Ok(text) => match_constant(text, schema)
                .or_else(|| parse_number(text, schema))
                .unwrap_or(ScalarText::Str),
        }
    };

    match forced {
        Some(k) if result.kind() != k => Err(()),
        _ => Ok(result),
    }
}

fn match_constant(text: &str, schema: Schema) -> Option<ScalarText> {
    let resolved = schema.resolved();
    if resolved == Schema::Yaml12Failsafe {
        return None;
    }

    if matches!(resolved, Schema::Json | Schema::Yaml12Json) {
        return match text {
            "null" => Some(ScalarText::Null),
            "true" => Some(ScalarText::Bool(true)),
            "false" => Some(ScalarText::Bool(false)),
            _ => None,
        };
    }

    // Yaml12Core and Yaml11 share the core table; Yaml11 additionally
    // recognizes a wider boolean/null set.
    let core = match text {
        "~" | "null" | "Null" | "NULL" => Some(ScalarText::Null),
        "true" | "True" | "TRUE" => Some(ScalarText::Bool(true)),
        "false" | "False" | "FALSE" => Some(ScalarText::Bool(false)),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            Some(ScalarText::Float(f64::INFINITY))
        }
        "-.inf" | "-.Inf" | "-.INF" => Some(ScalarText::Float(f64::NEG_INFINITY)),
        ".nan" | ".NaN" | ".NAN" => Some(ScalarText::Float(f64::NAN)),
        _ => None,
    };
    if core.is_some() {
        return core;
    }

    if resolved == Schema::Yaml11 {
        return match text {
            "" => Some(ScalarText::Null),
            "y" | "Y" | "on" | "On" | "ON" => Some(ScalarText::Bool(true)),
            "n" | "N" | "off" | "Off" | "OFF" => Some(ScalarText::Bool(false)),
            _ => None,
        };
    }

    None
}

fn parse_number(text: &str, schema: Schema) -> Option<ScalarText> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    if len == 0 {
        return None;
    }

    let mut idx = 0;
    let mut negative = false;
    match bytes[0] {
        b'+' if schema.allows_plus_sign() => idx += 1,
        b'+' => return None,
        b'-' => {
            negative = true;
            idx += 1;
        }
        _ => {}
    }
    if idx >= len {
        return None;
    }

    if schema.allows_hex_octal() && idx + 1 < len && bytes[idx] == b'0' {
        let radix = match bytes[idx + 1] {
            b'x' | b'X' => Some(16u32),
            b'o' | b'O' => Some(8u32),
            _ => None,
        };
        if let Some(radix) = radix {
            let digit_start = idx + 2;
            let mut cursor = digit_start;
            while cursor < len && (bytes[cursor] as char).is_digit(radix) {
                cursor += 1;
            }
            if cursor != len || cursor == digit_start {
                return None;
            }
            let digits = &text[digit_start..cursor];
            return match i64::from_str_radix(digits, radix) {
                Ok(v) => Some(ScalarText::Int(if negative { -v } else { v })),
                Err(_) if !negative => u64::from_str_radix(digits, radix).ok().map(ScalarText::UInt),
                Err(_) => None,
            };
        }
    }

    if schema.forbids_leading_zero() && bytes[idx] == b'0' && idx + 1 < len && bytes[idx + 1].is_ascii_digit()
    {
        return None;
    }

    let int_start = idx;
    while idx < len && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == int_start {
        return None;
    }

    let mut has_frac = false;
    let mut has_exp = false;

    if idx < len && bytes[idx] == b'.' {
        has_frac = true;
        idx += 1;
        let frac_start = idx;
        while idx < len && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == frac_start {
            return None;
        }
    }

    if idx < len && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        has_exp = true;
        idx += 1;
        if idx < len && (bytes[idx] == b'+' || bytes[idx] == b'-') {
            idx += 1;
        }
        let exp_start = idx;
        while idx < len && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == exp_start {
            return None;
        }
    }

    if idx != len {
        return None;
    }

    if has_frac || has_exp {
        return match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(ScalarText::Float(v)),
            _ => None,
        };
    }

    match text.parse::<i64>() {
        Ok(v) => Some(ScalarText::Int(v)),
        Err(_) if !negative => text.trim_start_matches('+').parse::<u64>().ok().map(ScalarText::UInt),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_core_recognizes_null_variants() {
        for text in ["~", "null", "Null", "NULL"] {
            assert_eq!(
                decode(text.as_bytes(), None, Schema::Yaml12Core).unwrap(),
                ScalarText::Null
            );
        }
    }

    #[test]
    fn yaml_core_recognizes_bool_case_variants() {
        assert_eq!(
            decode(b"true", None, Schema::Yaml12Core).unwrap(),
            ScalarText::Bool(true)
        );
        assert_eq!(
            decode(b"TRUE", None, Schema::Yaml12Core).unwrap(),
            ScalarText::Bool(true)
        );
    }

    #[test]
    fn yaml_core_hex_and_float_and_string() {
        assert_eq!(
            decode(b"0x10", None, Schema::Yaml12Core).unwrap(),
            ScalarText::Int(16)
        );
        assert_eq!(
            decode(b"1e10", None, Schema::Yaml12Core).unwrap(),
            ScalarText::Float(1e10)
        );
        assert_eq!(
            decode(b"01", None, Schema::Yaml12Core).unwrap(),
            ScalarText::Int(1)
        );
    }

    #[test]
    fn json_forbids_leading_zero_sign_and_nan_literal() {
        assert_eq!(decode(b"01", None, Schema::Json).unwrap(), ScalarText::Str);
        assert_eq!(decode(b"+1", None, Schema::Json).unwrap(), ScalarText::Str);
        assert_eq!(decode(b"NaN", None, Schema::Json).unwrap(), ScalarText::Str);
    }

    #[test]
    fn yaml12_json_schema_follows_the_same_numeric_grammar_as_json() {
        assert_eq!(decode(b"01", None, Schema::Yaml12Json).unwrap(), ScalarText::Str);
        assert_eq!(decode(b"+1", None, Schema::Yaml12Json).unwrap(), ScalarText::Str);
        assert_eq!(decode(b"0x10", None, Schema::Yaml12Json).unwrap(), ScalarText::Str);
    }

    #[test]
    fn forced_kind_mismatch_fails() {
        assert!(decode(b"42", Some(Kind::String), Schema::Json).is_ok());
        assert!(decode(b"42", Some(Kind::Float), Schema::Json).is_err());
    }

    #[test]
    fn yaml11_extra_bool_and_empty_null() {
        assert_eq!(
            decode(b"", None, Schema::Yaml11).unwrap(),
            ScalarText::Null
        );
        assert_eq!(
            decode(b"on", None, Schema::Yaml11).unwrap(),
            ScalarText::Bool(true)
        );
        assert_eq!(
            decode(b"OFF", None, Schema::Yaml11).unwrap(),
            ScalarText::Bool(false)
        );
    }
}
