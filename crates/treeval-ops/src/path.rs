//! `GET_AT_PATH` / `SET_AT_PATH`: walking a chain of keys through nested
//! sequences and mappings.

use treeval_core::{Builder, Kind, V};

use crate::error::{set_last_error, OpsError};
use crate::flags::OpFlags;

/// One step of a path: either a sequence index or a mapping key. Kept
/// explicit (rather than reusing a `V` for both) so a path can be built
/// without going through the builder for plain integer indices.
#[derive(Clone, Debug)]
pub enum PathKey {
    Index(usize),
    Name(V),
}

fn flatten(builder: &Builder, keys: &[PathKey], flags: OpFlags) -> Vec<PathKey> {
    if !flags.contains(OpFlags::FLATTEN_KEYS) {
        return keys.to_vec();
    }
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        match key {
            PathKey::Name(v) if builder.type_of(*v) == Kind::Sequence => {
                for item in builder.seq_items(*v) {
                    out.push(PathKey::Name(item));
                }
            }
            other => out.push(other.clone()),
        }
    }
    out
}

fn step_get(builder: &Builder, container: V, key: &PathKey) -> Option<V> {
    match (builder.type_of(container), key) {
        (Kind::Sequence, PathKey::Index(i)) => builder.seq_items(container).get(*i).copied(),
        (Kind::Sequence, PathKey::Name(k)) => {
            let i = usize::try_from(builder.as_int(*k)).ok()?;
            builder.seq_items(container).get(i).copied()
        }
        (Kind::Mapping, PathKey::Name(k)) => builder.map_get(container, *k),
        (Kind::Mapping, PathKey::Index(i)) => {
            let key = builder.int(*i as i64);
            builder.map_get(container, key)
        }
        _ => None,
    }
}

/// Walks `keys` through nested collections starting at `root`.
/// `V::INVALID` if any step traverses a non-collection or a missing key.
pub fn get_at_path(builder: &Builder, root: V, keys: &[PathKey], flags: OpFlags) -> V {
    let keys = flatten(builder, keys, flags);
    let mut cur = root;
    for key in &keys {
        match step_get(builder, cur, key) {
            Some(next) => cur = next,
            None => {
                set_last_error(OpsError::PathMiss);
                return V::INVALID;
            }
        }
    }
    cur
}

fn step_set(builder: &Builder, container: V, key: &PathKey, value: V) -> V {
    match (builder.type_of(container), key) {
        (Kind::Sequence, PathKey::Index(i)) => crate::seq_ops::set_at(builder, container, *i, value),
        (Kind::Sequence, PathKey::Name(k)) => {
            let Ok(i) = usize::try_from(builder.as_int(*k)) else {
                return V::INVALID;
            };
            crate::seq_ops::set_at(builder, container, i, value)
        }
        (Kind::Mapping, PathKey::Name(k)) => crate::map_ops::assoc(builder, container, &[(*k, value)]),
        (Kind::Mapping, PathKey::Index(i)) => {
            let k = builder.int(*i as i64);
            crate::map_ops::assoc(builder, container, &[(k, value)])
        }
        _ => V::INVALID,
    }
}

/// Walks down through `keys`, then rebuilds each container bottom-up
/// with the updated child, returning the new root. Missing intermediate
/// containers along the way are treated as mappings created fresh.
pub fn set_at_path(builder: &Builder, root: V, keys: &[PathKey], value: V, flags: OpFlags) -> V {
    let keys = flatten(builder, keys, flags);
    if keys.is_empty() {
        return value;
    }

    let mut stack = Vec::with_capacity(keys.len());
    let mut cur = root;
    for key in &keys[..keys.len() - 1] {
        let next = step_get(builder, cur, key).unwrap_or_else(|| builder.map_empty());
        stack.push((cur, key.clone()));
        cur = next;
    }

    let last_key = keys.last().unwrap();
    let mut updated = step_set(builder, cur, last_key, value);
    if updated.is_invalid() {
        set_last_error(OpsError::PathMiss);
        return V::INVALID;
    }

    for (container, key) in stack.into_iter().rev() {
        updated = step_set(builder, container, &key, updated);
        if updated.is_invalid() {
            return V::INVALID;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeval_core::Builder;

    #[test]
    fn get_at_path_walks_nested_mapping_and_sequence() {
        let b = Builder::new();
        let inner = b.seq(&[b.int(10), b.int(20), b.int(30)]);
        let root = b.map(&[(b.string(b"list"), inner)]);
        let got = get_at_path(&b, root, &[PathKey::Name(b.string(b"list")), PathKey::Index(1)], OpFlags::empty());
        assert_eq!(b.as_int(got), 20);
    }

    #[test]
    fn get_at_path_missing_key_is_invalid() {
        let b = Builder::new();
        let root = b.map_empty();
        let got = get_at_path(&b, root, &[PathKey::Name(b.string(b"missing"))], OpFlags::empty());
        assert!(got.is_invalid());
    }

    #[test]
    fn set_at_path_creates_and_updates() {
        let b = Builder::new();
        let root = b.map_empty();
        let updated = set_at_path(
            &b,
            root,
            &[PathKey::Name(b.string(b"a")), PathKey::Name(b.string(b"b"))],
            b.int(5),
            OpFlags::empty(),
        );
        let got = get_at_path(&b, updated, &[PathKey::Name(b.string(b"a")), PathKey::Name(b.string(b"b"))], OpFlags::empty());
        assert_eq!(b.as_int(got), 5);
    }
}
