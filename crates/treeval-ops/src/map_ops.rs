//! Mapping-shaped operations, operating on `Vec<(V, V)>` pulled out of
//! the builder and re-interned after rebuilding.

use std::cmp::Ordering;

use treeval_core::{Builder, V};

fn find_key(builder: &Builder, pairs: &[(V, V)], key: V) -> Option<usize> {
    pairs
        .iter()
        .position(|&(k, _)| builder.compare(k, key) == Ordering::Equal)
}

/// Replaces the value at an existing key or appends the pair if the key
/// is absent. Key order is preserved; new keys are appended in the
/// order supplied.
pub fn assoc(builder: &Builder, map: V, updates: &[(V, V)]) -> V {
    let mut pairs = builder.map_pairs(map);
    for &(key, value) in updates {
        match find_key(builder, &pairs, key) {
            Some(idx) => pairs[idx].1 = value,
            None => pairs.push((key, value)),
        }
    }
    builder.map(&pairs)
}

/// Removes each supplied key if present. Returns `map` unchanged (by
/// content) if none of `keys` was found.
pub fn disassoc(builder: &Builder, map: V, keys: &[V]) -> V {
    let pairs = builder.map_pairs(map);
    let kept: Vec<(V, V)> = pairs
        .into_iter()
        .filter(|&(k, _)| !keys.iter().any(|&rk| builder.compare(k, rk) == Ordering::Equal))
        .collect();
    builder.map(&kept)
}

pub fn keys(builder: &Builder, map: V) -> V {
    let items: Vec<V> = builder.map_pairs(map).into_iter().map(|(k, _)| k).collect();
    builder.seq(&items)
}

pub fn values(builder: &Builder, map: V) -> V {
    let items: Vec<V> = builder.map_pairs(map).into_iter().map(|(_, v)| v).collect();
    builder.seq(&items)
}

pub fn items(builder: &Builder, map: V) -> V {
    let pairs = builder.map_pairs(map);
    let items: Vec<V> = pairs
        .into_iter()
        .map(|(k, v)| builder.seq(&[k, v]))
        .collect();
    builder.seq(&items)
}

pub fn contains(builder: &Builder, map: V, key: V) -> bool {
    find_key(builder, &builder.map_pairs(map), key).is_some()
}

pub fn get(builder: &Builder, map: V, key: V) -> V {
    builder.map_get(map, key).unwrap_or(V::INVALID)
}

/// Union by key; later maps in `others` override earlier definitions
/// (including `map` itself).
pub fn merge(builder: &Builder, map: V, others: &[V]) -> V {
    let mut pairs = builder.map_pairs(map);
    for &other in others {
        for (key, value) in builder.map_pairs(other) {
            match find_key(builder, &pairs, key) {
                Some(idx) => pairs[idx].1 = value,
                None => pairs.push((key, value)),
            }
        }
    }
    builder.map(&pairs)
}

/// Reverses the order of whole key/value pairs.
pub fn reverse(builder: &Builder, map: V) -> V {
    let mut pairs = builder.map_pairs(map);
    pairs.reverse();
    builder.map(&pairs)
}

pub fn sort_by_key(builder: &Builder, map: V) -> V {
    let mut pairs = builder.map_pairs(map);
    pairs.sort_by(|(a, _), (b, _)| builder.compare(*a, *b));
    builder.map(&pairs)
}
