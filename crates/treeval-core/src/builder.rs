//! The builder: owns an arena, participates in a parent chain, and is
//! the single authority over payload lifetime for every `V` it produces.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::accessors::{self, IndirectView};
use crate::arena::Arena;
use crate::error::{set_last_error, BuildError};
use crate::payload::{self, IndirectFields};
use crate::schema::Schema;
use crate::value::{Kind, Tag, V};

struct BuilderInner {
    arena: Arena,
    parent: Option<Builder>,
    scope_leader: bool,
    schema: Schema,
}

/// A builder: owns an arena and coordinates interning, validation, and
/// export across a chain of nested builders. Cheap to clone (an `Arc`
/// handle to shared state), matching the rest of this crate's
/// single-threaded, interior-mutable arena.
#[derive(Clone)]
pub struct Builder(Arc<BuilderInner>);

fn kind_rank(k: Kind) -> u8 {
    match k {
        Kind::Invalid => 0,
        Kind::Null => 1,
        Kind::Bool => 2,
        Kind::Int => 3,
        Kind::Float => 4,
        Kind::String => 5,
        Kind::Sequence => 6,
        Kind::Mapping => 7,
        Kind::Alias => 8,
    }
}

impl Builder {
    /// A root builder with a fresh deduplicating arena and `Schema::Auto`.
    pub fn new() -> Builder {
        Self::with_arena(Arena::deduplicating(), Schema::default())
    }

    /// A root builder with an append-only (non-deduplicating) arena.
    pub fn linear(schema: Schema) -> Builder {
        Self::with_arena(Arena::linear(), schema)
    }

    /// A root builder with a caller-supplied arena.
    pub fn with_arena(arena: Arena, schema: Schema) -> Builder {
        tracing::debug!(dedup = arena.is_dedup_enabled(), ?schema, "new root builder");
        Builder(Arc::new(BuilderInner {
            arena,
            parent: None,
            scope_leader: true,
            schema,
        }))
    }

    /// A nested, scope-leading builder: a short-lived computation scope
    /// whose own arena flavor matches `self`'s, and whose `export` targets
    /// `self`.
    pub fn child(&self) -> Builder {
        let arena = if self.0.arena.is_dedup_enabled() {
            Arena::deduplicating()
        } else {
            Arena::linear()
        };
        tracing::trace!("new child builder scope");
        Builder(Arc::new(BuilderInner {
            arena,
            parent: Some(self.clone()),
            scope_leader: true,
            schema: self.0.schema,
        }))
    }

    pub fn schema(&self) -> Schema {
        self.0.schema
    }

    pub fn with_schema(&self, schema: Schema) -> Builder {
        Builder(Arc::new(BuilderInner {
            arena: if self.0.arena.is_dedup_enabled() {
                Arena::deduplicating()
            } else {
                Arena::linear()
            },
            parent: self.0.parent.clone(),
            scope_leader: self.0.scope_leader,
            schema,
        }))
    }

    fn fail(&self, err: BuildError) -> V {
        set_last_error(err);
        V::INVALID
    }

    /// `true` if dedup is enabled on this builder and every ancestor.
    pub fn dedup_chain(&self) -> bool {
        self.0.arena.is_dedup_enabled()
            && self
                .0
                .parent
                .as_ref()
                .is_none_or(|p| p.dedup_chain())
    }

    /// Containment invariant: in-place, or the pointer lies within this
    /// builder's arena or any ancestor's.
    pub fn contains(&self, v: V) -> bool {
        if v.is_in_place() {
            return true;
        }
        if self.0.arena.contains(v.as_ptr()) {
            return true;
        }
        match &self.0.parent {
            Some(p) => p.contains(v),
            None => false,
        }
    }

    /// Resets this builder's own arena, discarding everything it holds.
    /// Ancestors are untouched.
    pub fn reset(&self) {
        self.0.arena.reset();
    }

    // -- primitive factories ---------------------------------------------

    pub fn null(&self) -> V {
        V::NULL
    }

    pub fn bool_(&self, b: bool) -> V {
        accessors::pack_bool(b)
    }

    pub fn int(&self, i: i64) -> V {
        if let Some(v) = accessors::try_pack_int(i) {
            return v;
        }
        self.intern_scalar(&payload::encode_out_int(i, false), 16, Tag::OutInt)
    }

    pub fn uint(&self, u: u64) -> V {
        if let Some(v) = accessors::try_pack_uint(u) {
            return v;
        }
        self.intern_scalar(&payload::encode_out_int(u as i64, true), 16, Tag::OutInt)
    }

    pub fn float(&self, f: f64) -> V {
        if let Some(v) = accessors::try_pack_float(f) {
            return v;
        }
        self.intern_scalar(&payload::encode_out_float(f), 16, Tag::OutFloat)
    }

    pub fn string(&self, bytes: &[u8]) -> V {
        if let Some(v) = accessors::try_pack_short_string(bytes) {
            return v;
        }
        let encoded = payload::encode_out_string(bytes);
        self.intern_scalar(&encoded, 16, Tag::OutString)
    }

    pub fn string_fmt(&self, args: std::fmt::Arguments<'_>) -> V {
        self.string(args.to_string().as_bytes())
    }

    /// Scalar decoder: classifies `bytes` per this builder's schema (see
    /// [`crate::scalar::decode`]) and builds the result. `forced`, if set,
    /// requires the decoded shape to match or the whole call fails.
    /// `V::INVALID` if the forced kind couldn't be satisfied.
    pub fn decode(&self, bytes: &[u8], forced: Option<Kind>) -> V {
        match crate::scalar::decode(bytes, forced, self.0.schema) {
            Ok(crate::scalar::ScalarText::Null) => self.null(),
            Ok(crate::scalar::ScalarText::Bool(b)) => self.bool_(b),
            Ok(crate::scalar::ScalarText::Int(i)) => self.int(i),
            Ok(crate::scalar::ScalarText::UInt(u)) => self.uint(u),
            Ok(crate::scalar::ScalarText::Float(f)) => self.float(f),
            Ok(crate::scalar::ScalarText::Str) => self.string(bytes),
            Err(()) => {
                set_last_error(BuildError::TypeViolation {
                    expected: "scalar text matching the forced kind",
                    found: "a different scalar shape",
                });
                V::INVALID
            }
        }
    }

    fn intern_scalar(&self, bytes: &[u8], align: usize, tag: Tag) -> V {
        if let Some(ptr) = self.0.arena.lookup(bytes, align) {
            return V::from_ptr(tag, ptr);
        }
        match self.0.arena.store(bytes, align) {
            Ok(ptr) => V::from_ptr(tag, ptr),
            Err(e) => self.fail(e),
        }
    }

    // -- collection factories ---------------------------------------------

    /// Builds a sequence from `items`, internalizing any item not already
    /// contained by this builder. No partial publication: if any item
    /// fails to internalize, the whole call returns `V::INVALID`.
    pub fn seq(&self, items: &[V]) -> V {
        let Some(resolved) = self.internalize_all(items) else {
            return self.fail(BuildError::NotContained);
        };
        let bytes = payload::encode_collection(&resolved);
        self.intern_scalar(&bytes, 16, Tag::Seq)
    }

    pub fn seq_empty(&self) -> V {
        self.seq(&[])
    }

    /// Builds a mapping from `pairs`, preserving the given key order.
    pub fn map(&self, pairs: &[(V, V)]) -> V {
        let mut flat = Vec::with_capacity(pairs.len() * 2);
        for (k, v) in pairs {
            flat.push(*k);
            flat.push(*v);
        }
        let Some(resolved) = self.internalize_all(&flat) else {
            return self.fail(BuildError::NotContained);
        };
        let bytes = payload::encode_collection(&resolved);
        self.intern_scalar(&bytes, 16, Tag::Map)
    }

    pub fn map_empty(&self) -> V {
        self.map(&[])
    }

    fn internalize_all(&self, items: &[V]) -> Option<Vec<V>> {
        let mut out = Vec::with_capacity(items.len());
        for &item in items {
            if item.is_invalid() {
                return None;
            }
            let resolved = if self.contains(item) {
                item
            } else {
                self.internalize(item)
            };
            if resolved.is_invalid() {
                return None;
            }
            out.push(resolved);
        }
        Some(out)
    }

    // -- indirect factories ------------------------------------------------

    /// Builds a decorated value. An anchor with no inner `value` is an
    /// alias; its anchor must itself be a string.
    pub fn indirect(&self, value: Option<V>, anchor: Option<V>, tag: Option<V>) -> V {
        let resolve = |slot: Option<V>| -> Option<Option<V>> {
            match slot {
                None => Some(None),
                Some(v) if v.is_invalid() => None,
                Some(v) => {
                    let resolved = if self.contains(v) { v } else { self.internalize(v) };
                    if resolved.is_invalid() {
                        None
                    } else {
                        Some(Some(resolved))
                    }
                }
            }
        };
        let Some(value) = resolve(value) else {
            return self.fail(BuildError::NotContained);
        };
        let Some(anchor) = resolve(anchor) else {
            return self.fail(BuildError::NotContained);
        };
        let Some(tag) = resolve(tag) else {
            return self.fail(BuildError::NotContained);
        };

        if let Some(a) = anchor {
            if accessors::type_of(a) != Kind::String {
                return self.fail(BuildError::BadAliasAnchor);
            }
        }

        let fields = IndirectFields { value, anchor, tag };
        let bytes = payload::encode_indirect(&fields);
        self.intern_scalar(&bytes, 16, Tag::Indirect)
    }

    pub fn alias(&self, anchor: V) -> V {
        self.indirect(None, Some(anchor), None)
    }

    // -- internalize / validate / export -----------------------------------

    /// Copies `v` (recursively) into this builder's arena, sharing
    /// structure via dedup lookup where possible. Returns `V::INVALID` and
    /// performs no partial publication on any failure.
    pub fn internalize(&self, v: V) -> V {
        if v.is_invalid() {
            return V::INVALID;
        }
        if v.is_in_place() {
            return v;
        }
        if self.contains(v) {
            return v;
        }

        match v.tag() {
            Tag::Indirect => {
                // SAFETY: `v` is out-of-place and assumed to address a live
                // indirect record (it came from some arena still in scope).
                let fields = unsafe { payload::read_indirect(v.as_ptr()) };
                let internalize_opt = |slot: Option<V>| -> Option<Option<V>> {
                    match slot {
                        None => Some(None),
                        Some(inner) => {
                            let r = self.internalize(inner);
                            if r.is_invalid() { None } else { Some(Some(r)) }
                        }
                    }
                };
                let (Some(value), Some(anchor), Some(tag)) = (
                    internalize_opt(fields.value),
                    internalize_opt(fields.anchor),
                    internalize_opt(fields.tag),
                ) else {
                    return self.fail(BuildError::NotContained);
                };
                let bytes = payload::encode_indirect(&IndirectFields { value, anchor, tag });
                self.intern_scalar(&bytes, 16, Tag::Indirect)
            }
            Tag::OutInt => {
                // SAFETY: as above.
                let (is_unsigned, bits) = unsafe { payload::read_out_int(v.as_ptr()) };
                self.intern_scalar(&payload::encode_out_int(bits as i64, is_unsigned), 16, Tag::OutInt)
            }
            Tag::OutFloat => {
                // SAFETY: as above.
                let f = unsafe { payload::read_out_float(v.as_ptr()) };
                self.intern_scalar(&payload::encode_out_float(f), 16, Tag::OutFloat)
            }
            Tag::OutString => {
                // SAFETY: as above.
                let bytes = unsafe { payload::out_string_as_slice(v.as_ptr()) };
                let encoded = payload::encode_out_string(bytes);
                self.intern_scalar(&encoded, 16, Tag::OutString)
            }
            Tag::Seq | Tag::Map => {
                let is_map = v.tag() == Tag::Map;
                // SAFETY: as above.
                let count = unsafe { payload::read_collection_len(v.as_ptr()) };
                let n = if is_map { count * 2 } else { count };
                let mut items = Vec::with_capacity(n);
                for i in 0..n {
                    // SAFETY: as above.
                    let item = unsafe { payload::read_collection_item(v.as_ptr(), i) };
                    let resolved = self.internalize(item);
                    if resolved.is_invalid() {
                        return self.fail(BuildError::NotContained);
                    }
                    items.push(resolved);
                }
                let bytes = payload::encode_collection(&items);
                self.intern_scalar(&bytes, 16, if is_map { Tag::Map } else { Tag::Seq })
            }
            _ => v,
        }
    }

    /// Confirms `v` is fully contained in this builder chain without
    /// copying anything.
    pub fn validate(&self, v: V) -> V {
        if v.is_invalid() {
            return V::INVALID;
        }
        if v.is_in_place() {
            return v;
        }
        if !self.contains(v) {
            return self.fail(BuildError::NotContained);
        }
        match v.tag() {
            Tag::Indirect => {
                let fields = unsafe { payload::read_indirect(v.as_ptr()) };
                for f in [fields.value, fields.anchor, fields.tag].into_iter().flatten() {
                    if self.validate(f).is_invalid() {
                        return self.fail(BuildError::NotContained);
                    }
                }
                v
            }
            Tag::Seq | Tag::Map => {
                let is_map = v.tag() == Tag::Map;
                let count = unsafe { payload::read_collection_len(v.as_ptr()) };
                let n = if is_map { count * 2 } else { count };
                for i in 0..n {
                    let item = unsafe { payload::read_collection_item(v.as_ptr(), i) };
                    if self.validate(item).is_invalid() {
                        return self.fail(BuildError::NotContained);
                    }
                }
                v
            }
            _ => v,
        }
    }

    /// Finds the nearest scope-leader ancestor (starting at `self`) and
    /// returns *its* parent — the export target.
    fn export_target(&self) -> Option<Builder> {
        let mut cur = self.clone();
        loop {
            if cur.0.scope_leader {
                return cur.0.parent.clone();
            }
            let next = cur.0.parent.clone()?;
            cur = next;
        }
    }

    /// Internalizes `v` against the nearest scope-leader's parent, so it
    /// survives this builder being reset or dropped. `V::INVALID` if no
    /// such parent is reachable.
    pub fn export(&self, v: V) -> V {
        match self.export_target() {
            Some(target) => target.internalize(v),
            None => self.fail(BuildError::NoExportTarget),
        }
    }

    // -- read accessors used by the collection-operation engine -----------

    pub fn type_of(&self, v: V) -> Kind {
        accessors::type_of(v)
    }

    pub fn indirect_view(&self, v: V) -> Option<IndirectView> {
        accessors::indirect_unwrap(v)
    }

    /// Strips any indirect decoration, returning the underlying value (or
    /// `v` itself if it wasn't decorated, or `V::INVALID` for an alias).
    pub fn strip_indirect(&self, v: V) -> V {
        match accessors::indirect_unwrap(v) {
            Some(view) => view.value.unwrap_or(V::INVALID),
            None => v,
        }
    }

    pub fn as_bool(&self, v: V) -> bool {
        accessors::unpack_bool(self.strip_indirect(v))
    }

    pub fn as_int(&self, v: V) -> i128 {
        accessors::unpack_int(self.strip_indirect(v))
    }

    pub fn as_float(&self, v: V) -> f64 {
        accessors::unpack_float(self.strip_indirect(v))
    }

    pub fn as_bytes(&self, v: V) -> Vec<u8> {
        accessors::unpack_string(self.strip_indirect(v))
    }

    /// The sequence's items, in order. Empty for a non-sequence.
    pub fn seq_items(&self, v: V) -> Vec<V> {
        let v = self.strip_indirect(v);
        if v.tag() != Tag::Seq {
            return Vec::new();
        }
        // SAFETY: tag confirms this addresses a collection header.
        unsafe {
            let count = payload::read_collection_len(v.as_ptr());
            payload::read_collection_items(v.as_ptr(), count).to_vec()
        }
    }

    /// The mapping's (key, value) pairs, in order. Empty for a non-mapping.
    pub fn map_pairs(&self, v: V) -> Vec<(V, V)> {
        let v = self.strip_indirect(v);
        if v.tag() != Tag::Map {
            return Vec::new();
        }
        // SAFETY: tag confirms this addresses a collection header.
        unsafe {
            let count = payload::read_collection_len(v.as_ptr());
            let items = payload::read_collection_items(v.as_ptr(), count * 2);
            items.chunks_exact(2).map(|c| (c[0], c[1])).collect()
        }
    }

    pub fn map_get(&self, v: V, key: V) -> Option<V> {
        self.map_pairs(v)
            .into_iter()
            .find(|(k, _)| self.compare(*k, key) == Ordering::Equal)
            .map(|(_, val)| val)
    }

    /// Total order over values.
    pub fn compare(&self, a: V, b: V) -> Ordering {
        if a.bits() == b.bits() {
            return Ordering::Equal;
        }
        let ka = self.type_of(a);
        let kb = self.type_of(b);
        if ka != kb {
            return kind_rank(ka).cmp(&kind_rank(kb));
        }
        match ka {
            Kind::Invalid | Kind::Null => Ordering::Equal,
            Kind::Bool => self.as_bool(a).cmp(&self.as_bool(b)),
            Kind::Int => self.as_int(a).cmp(&self.as_int(b)),
            Kind::Float => self.as_float(a).total_cmp(&self.as_float(b)),
            Kind::String => self.as_bytes(a).cmp(&self.as_bytes(b)),
            Kind::Sequence => {
                let sa = self.seq_items(a);
                let sb = self.seq_items(b);
                for (x, y) in sa.iter().zip(sb.iter()) {
                    let c = self.compare(*x, *y);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                sa.len().cmp(&sb.len())
            }
            Kind::Mapping => self.compare_mapping(a, b),
            Kind::Alias => {
                let anchor_a = accessors::indirect_unwrap(a).and_then(|v| v.anchor);
                let anchor_b = accessors::indirect_unwrap(b).and_then(|v| v.anchor);
                match (anchor_a, anchor_b) {
                    (Some(x), Some(y)) => self.as_bytes(x).cmp(&self.as_bytes(y)),
                    _ => Ordering::Equal,
                }
            }
        }
    }

    fn compare_mapping(&self, a: V, b: V) -> Ordering {
        let pa = self.map_pairs(a);
        let pb = self.map_pairs(b);
        if pa.len() == pb.len() {
            let equal = pa.iter().all(|(k, v)| {
                self.map_get(b, *k)
                    .is_some_and(|bv| self.compare(*v, bv) == Ordering::Equal)
            });
            if equal {
                return Ordering::Equal;
            }
        }
        // Implementation-defined total order: deterministic within a
        // process run, not a semantic ordering.
        a.bits().cmp(&b.bits())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_interning_is_bit_identical() {
        let b = Builder::new();
        let a1 = b.seq(&[b.int(1), b.int(2), b.int(3)]);
        let a2 = b.seq(&[b.int(1), b.int(2), b.int(3)]);
        assert_eq!(a1.bits(), a2.bits());
    }

    #[test]
    fn internalize_is_idempotent() {
        let b = Builder::new();
        let v = b.string(b"a string long enough to go out of line, definitely");
        let once = b.internalize(v);
        let twice = b.internalize(once);
        assert_eq!(once.bits(), twice.bits());
    }

    #[test]
    fn containment_recurses_through_parent_chain() {
        let root = Builder::new();
        let child = root.child();
        let v = root.string(b"a string long enough to leave the inline encoding, for the test");
        assert!(child.contains(v));
    }

    #[test]
    fn export_requires_scope_leader_parent() {
        let root = Builder::new();
        assert!(root.export(root.null()).is_invalid());

        let child = root.child();
        let v = child.string(b"a string long enough to go out of line for real");
        let exported = child.export(v);
        assert!(!exported.is_invalid());
        assert!(root.contains(exported));
    }

    #[test]
    fn validate_rejects_foreign_handles() {
        let a = Builder::new();
        let b = Builder::new();
        let v = a.string(b"a string long enough to go out of line for sure yes");
        assert!(b.validate(v).is_invalid());
        assert_eq!(a.validate(v), v);
    }

    #[test]
    fn alias_requires_string_anchor() {
        let b = Builder::new();
        let bad_anchor = b.int(5);
        assert!(b.alias(bad_anchor).is_invalid());
        let good_anchor = b.string(b"anchor-name");
        let alias = b.alias(good_anchor);
        assert!(!alias.is_invalid());
        assert_eq!(b.type_of(alias), Kind::Alias);
    }

    #[test]
    fn compare_orders_by_kind_then_value() {
        let b = Builder::new();
        assert_eq!(b.compare(b.int(1), b.int(1)), Ordering::Equal);
        assert_eq!(b.compare(b.int(1), b.int(2)), Ordering::Less);
        assert_eq!(b.compare(b.null(), b.int(0)), Ordering::Less);
    }

    #[test]
    fn mapping_compare_ignores_key_order() {
        let b = Builder::new();
        let k1 = b.string(b"a");
        let k2 = b.string(b"b");
        let m1 = b.map(&[(k1, b.int(1)), (k2, b.int(2))]);
        let m2 = b.map(&[(k2, b.int(2)), (k1, b.int(1))]);
        assert_eq!(b.compare(m1, m2), Ordering::Equal);
    }

    #[test]
    fn decode_produces_the_null_sentinel_for_every_recognized_spelling() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Yaml12Core);
        for text in ["~", "null", "Null", "NULL"] {
            let v = b.decode(text.as_bytes(), None);
            assert_eq!(v, V::NULL);
        }
    }

    #[test]
    fn decode_produces_true_and_an_integer() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Yaml12Core);
        assert_eq!(b.decode(b"true", None), V::TRUE);
        let sixteen = b.decode(b"0x10", None);
        assert_eq!(b.type_of(sixteen), Kind::Int);
        assert_eq!(b.as_int(sixteen), 16);
    }

    #[test]
    fn decode_builds_an_out_of_line_uint_past_i64_range() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Yaml12Core);
        let huge = b.decode(b"18446744073709551615", None);
        assert_eq!(b.type_of(huge), Kind::Int);
        assert_eq!(b.as_int(huge), u64::MAX as i128);
    }

    #[test]
    fn decode_falls_back_to_string_for_unrecognized_text() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Yaml12Core);
        let v = b.decode(b"hello world", None);
        assert_eq!(b.type_of(v), Kind::String);
        assert_eq!(b.as_bytes(v), b"hello world");
    }

    #[test]
    fn decode_rejects_a_forced_kind_the_text_cannot_satisfy() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Json);
        let v = b.decode(b"42", Some(Kind::Float));
        assert!(v.is_invalid());
    }

    #[test]
    fn decode_under_json_schema_rejects_yaml_only_spellings_as_strings() {
        let b = Builder::with_arena(Arena::deduplicating(), Schema::Json);
        let v = b.decode(b"Null", None);
        assert_eq!(b.type_of(v), Kind::String);
    }
}
