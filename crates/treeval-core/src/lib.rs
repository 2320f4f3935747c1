//! Space-efficient, arena-backed representation of a YAML/JSON document
//! tree: a single tagged machine word (`V`) per node, an interning arena,
//! and a builder that owns both.

mod accessors;
mod arena;
mod builder;
mod error;
mod payload;
mod relocate;
mod scalar;
mod schema;
mod value;

pub use accessors::IndirectView;
pub use arena::{Arena, Tag as ArenaTag};
pub use builder::Builder;
pub use error::{clear_last_error, last_error, BuildError};
pub use relocate::{relocate, relocate_all, relocate_to};
pub use scalar::{decode as decode_scalar, ScalarText, SCALAR_STRING_CUTOVER};
pub use schema::Schema;
pub use value::{Kind, Tag, MAX_IMMEDIATE_INT, MIN_IMMEDIATE_INT, MIN_PAYLOAD_ALIGN};
pub use value::V;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn round_trip_through_builder_and_back() {
        let b = Builder::new();
        let seq = b.seq(&[b.int(1), b.string(b"two"), b.float(3.5)]);
        assert_eq!(b.type_of(seq), Kind::Sequence);
        let items = b.seq_items(seq);
        assert_eq!(items.len(), 3);
        assert_eq!(b.as_int(items[0]), 1);
        assert_eq!(b.as_bytes(items[1]), b"two");
        assert_eq!(b.as_float(items[2]), 3.5);
    }

    #[test]
    fn diagnostics_survive_through_invalid_sentinel() {
        clear_last_error();
        let a = Builder::new();
        let b = Builder::new();
        let foreign = a.string(b"a string long enough to leave the inline encoding behind");
        let result = b.validate(foreign);
        assert!(result.is_invalid());
        assert_eq!(last_error(), Some(BuildError::NotContained));
    }
}
