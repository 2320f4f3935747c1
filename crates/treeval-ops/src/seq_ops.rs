//! Sequence-shaped operations: structure-sharing transforms that always
//! read a `Vec<V>` of items out, rebuild it in plain Rust, and hand the
//! result back to the builder to re-intern.

use std::cmp::Ordering;

use treeval_core::{Builder, V};

pub fn insert(builder: &Builder, seq: V, index: usize, items: &[V]) -> V {
    let mut out = builder.seq_items(seq);
    let at = index.min(out.len());
    out.splice(at..at, items.iter().copied());
    builder.seq(&out)
}

pub fn replace(builder: &Builder, seq: V, index: usize, count: usize, items: &[V]) -> V {
    let mut out = builder.seq_items(seq);
    let at = index.min(out.len());
    let end = (at + count).min(out.len());
    out.splice(at..end, items.iter().copied());
    builder.seq(&out)
}

pub fn append(builder: &Builder, seq: V, items: &[V]) -> V {
    let mut out = builder.seq_items(seq);
    out.extend_from_slice(items);
    builder.seq(&out)
}

pub fn contains(builder: &Builder, seq: V, needle: V) -> bool {
    builder
        .seq_items(seq)
        .iter()
        .any(|&item| builder.compare(item, needle) == Ordering::Equal)
}

pub fn concat(builder: &Builder, seq: V, others: &[V]) -> V {
    let mut out = builder.seq_items(seq);
    for &other in others {
        out.extend(builder.seq_items(other));
    }
    builder.seq(&out)
}

pub fn reverse(builder: &Builder, seq: V) -> V {
    let mut out = builder.seq_items(seq);
    out.reverse();
    builder.seq(&out)
}

pub fn unique(builder: &Builder, seq: V) -> V {
    let items = builder.seq_items(seq);
    let mut out: Vec<V> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|&kept| builder.compare(kept, item) == Ordering::Equal) {
            out.push(item);
        }
    }
    builder.seq(&out)
}

pub fn sort(builder: &Builder, seq: V) -> V {
    let mut out = builder.seq_items(seq);
    out.sort_by(|a, b| builder.compare(*a, *b));
    builder.seq(&out)
}

pub fn get_at(builder: &Builder, seq: V, index: usize) -> V {
    builder.seq_items(seq).get(index).copied().unwrap_or(V::INVALID)
}

pub fn set_at(builder: &Builder, seq: V, index: usize, value: V) -> V {
    let mut out = builder.seq_items(seq);
    if index >= out.len() {
        out.resize(index + 1, V::NULL);
    }
    out[index] = value;
    builder.seq(&out)
}

/// `SET` with `(index, value)` pairs: indices beyond the current length
/// pad the gap with `NULL`.
pub fn set_many(builder: &Builder, seq: V, pairs: &[(usize, V)]) -> V {
    let mut out = builder.seq_items(seq);
    let max_index = pairs.iter().map(|&(i, _)| i).max();
    if let Some(max_index) = max_index {
        if max_index >= out.len() {
            out.resize(max_index + 1, V::NULL);
        }
    }
    for &(index, value) in pairs {
        out[index] = value;
    }
    builder.seq(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeval_core::Builder;

    fn ints(b: &Builder, xs: &[i64]) -> V {
        let items: Vec<V> = xs.iter().map(|&x| b.int(x)).collect();
        b.seq(&items)
    }

    fn as_ints(b: &Builder, v: V) -> Vec<i128> {
        b.seq_items(v).into_iter().map(|item| b.as_int(item)).collect()
    }

    #[test]
    fn append_concatenates_at_tail() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        let out = append(&b, seq, &[b.int(4), b.int(5)]);
        assert_eq!(as_ints(&b, out), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn append_empty_is_identity() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        let out = append(&b, seq, &[]);
        assert_eq!(b.compare(seq, out), Ordering::Equal);
    }

    #[test]
    fn reverse_is_involutive() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        let once = reverse(&b, seq);
        let twice = reverse(&b, once);
        assert_eq!(b.compare(seq, twice), Ordering::Equal);
    }

    #[test]
    fn unique_preserves_first_occurrence() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 1, 3, 2]);
        let out = unique(&b, seq);
        assert_eq!(as_ints(&b, out), vec![1, 2, 3]);
    }

    #[test]
    fn unique_is_idempotent() {
        let b = Builder::new();
        let seq = ints(&b, &[3, 1, 2, 1]);
        let once = unique(&b, seq);
        let twice = unique(&b, once);
        assert_eq!(b.compare(once, twice), Ordering::Equal);
    }

    #[test]
    fn sort_is_stable_total_order() {
        let b = Builder::new();
        let seq = ints(&b, &[3, 1, 2]);
        let out = sort(&b, seq);
        assert_eq!(as_ints(&b, out), vec![1, 2, 3]);
    }

    #[test]
    fn set_many_pads_with_null() {
        let b = Builder::new();
        let seq = ints(&b, &[10, 20, 30]);
        let out = set_many(&b, seq, &[(5, b.int(99))]);
        let items = b.seq_items(out);
        assert_eq!(items.len(), 6);
        assert_eq!(b.as_int(items[0]), 10);
        assert!(b.type_of(items[3]) == treeval_core::Kind::Null);
        assert_eq!(b.as_int(items[5]), 99);
    }

    #[test]
    fn contains_checks_membership_by_value() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        assert!(contains(&b, seq, b.int(2)));
        assert!(!contains(&b, seq, b.int(9)));
    }
}
