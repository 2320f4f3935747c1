//! Value type probes, indirect unwrap, direct-unwrap, and primitive
//! packers/unpackers. Everything here is pure and allocation-free; the
//! unsafe pointer reads it performs trust that any out-of-place `V` still
//! addresses memory owned by a live arena.

use crate::payload;
use crate::value::{Kind, Tag, V};

/// The contents of an indirect record peeled off one layer.
#[derive(Debug, Clone, Copy)]
pub struct IndirectView {
    pub value: Option<V>,
    pub anchor: Option<V>,
    pub tag: Option<V>,
}

#[inline]
pub(crate) fn type_of(v: V) -> Kind {
    // SAFETY: see module docs.
    unsafe { crate::value::type_of_raw(v) }
}

macro_rules! is_kind {
    ($name:ident, $kind:ident) => {
        #[inline]
        pub(crate) fn $name(v: V) -> bool {
            type_of(v) == Kind::$kind
        }
    };
}

is_kind!(is_null, Null);
is_kind!(is_bool, Bool);
is_kind!(is_int, Int);
is_kind!(is_float, Float);
is_kind!(is_string, String);
is_kind!(is_sequence, Sequence);
is_kind!(is_mapping, Mapping);
is_kind!(is_alias, Alias);

#[inline]
pub(crate) fn is_invalid(v: V) -> bool {
    v.is_invalid()
}

/// Peels one indirect layer. `None` if `v` is not indirect at all.
pub(crate) fn indirect_unwrap(v: V) -> Option<IndirectView> {
    if v.tag() != Tag::Indirect {
        return None;
    }
    // SAFETY: caller trust as above.
    let fields = unsafe { payload::read_indirect(v.as_ptr()) };
    Some(IndirectView {
        value: fields.value,
        anchor: fields.anchor,
        tag: fields.tag,
    })
}

/// Returns the non-decorated value. Panics if `v` is indirect — callers
/// that might receive decorated values should use [`indirect_unwrap`]
/// first.
pub(crate) fn direct_unwrap(v: V) -> V {
    assert_ne!(
        v.tag(),
        Tag::Indirect,
        "direct_unwrap called on an indirect value"
    );
    v
}

#[inline]
pub(crate) fn pack_bool(b: bool) -> V {
    if b { V::TRUE } else { V::FALSE }
}

#[inline]
pub(crate) fn try_pack_int(i: i64) -> Option<V> {
    V::try_immediate_int(i)
}

#[inline]
pub(crate) fn try_pack_uint(u: u64) -> Option<V> {
    i64::try_from(u).ok().and_then(V::try_immediate_int)
}

#[inline]
pub(crate) fn try_pack_float(f: f64) -> Option<V> {
    V::try_immediate_float(f)
}

#[inline]
pub(crate) fn try_pack_short_string(bytes: &[u8]) -> Option<V> {
    V::try_immediate_string(bytes)
}

/// Unpacks a boolean. Panics if `v` is not `Kind::Bool` or is indirect.
pub(crate) fn unpack_bool(v: V) -> bool {
    match v.tag() {
        Tag::True => true,
        Tag::False => false,
        other => panic!("unpack_bool: expected Bool, found tag {other:?}"),
    }
}

/// Unpacks an integer as a normalized 128-bit value, wide enough to hold
/// every signed and unsigned 64-bit integer without ambiguity. Panics if
/// `v` is not `Kind::Int` or is indirect.
pub(crate) fn unpack_int(v: V) -> i128 {
    match v.tag() {
        Tag::Int => v.unpack_immediate_int() as i128,
        Tag::OutInt => {
            // SAFETY: see module docs.
            let (is_unsigned, bits) = unsafe { payload::read_out_int(v.as_ptr()) };
            if is_unsigned {
                bits as i128
            } else {
                (bits as i64) as i128
            }
        }
        other => panic!("unpack_int: expected Int, found tag {other:?}"),
    }
}

/// Unpacks a float. Panics if `v` is not `Kind::Float` or is indirect.
pub(crate) fn unpack_float(v: V) -> f64 {
    match v.tag() {
        Tag::Float => v.unpack_immediate_float(),
        Tag::OutFloat => unsafe { payload::read_out_float(v.as_ptr()) },
        other => panic!("unpack_float: expected Float, found tag {other:?}"),
    }
}

/// Owned copy of a string's bytes, plus its size. Panics if `v` is not
/// `Kind::String` or is indirect.
pub(crate) fn unpack_string(v: V) -> Vec<u8> {
    match v.tag() {
        Tag::ShortString => v.short_string_bytes()[..v.short_string_len()].to_vec(),
        Tag::OutString => unsafe { payload::out_string_as_slice(v.as_ptr()).to_vec() },
        other => panic!("unpack_string: expected String, found tag {other:?}"),
    }
}

/// Size of a string in bytes, without copying. Panics if `v` is not
/// `Kind::String` or is indirect.
pub(crate) fn unpack_string_len(v: V) -> usize {
    match v.tag() {
        Tag::ShortString => v.short_string_len(),
        Tag::OutString => unsafe { payload::read_out_string(v.as_ptr()).0 },
        other => panic!("unpack_string_len: expected String, found tag {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_probes_all_false() {
        assert_eq!(type_of(V::INVALID), Kind::Invalid);
        assert!(!is_null(V::INVALID));
        assert!(!is_bool(V::INVALID));
        assert!(!is_int(V::INVALID));
        assert!(is_invalid(V::INVALID));
    }

    #[test]
    fn direct_unwrap_passes_through_plain_values() {
        assert_eq!(direct_unwrap(V::NULL), V::NULL);
        assert_eq!(direct_unwrap(pack_bool(true)), V::TRUE);
    }

    #[test]
    fn immediate_pack_unpack_round_trip() {
        let v = try_pack_int(7).unwrap();
        assert_eq!(unpack_int(v), 7);
        let v = try_pack_float(2.5).unwrap();
        assert_eq!(unpack_float(v), 2.5);
        let v = try_pack_short_string(b"hi").unwrap();
        assert_eq!(unpack_string(v), b"hi");
        assert_eq!(unpack_string_len(v), 2);
    }
}
