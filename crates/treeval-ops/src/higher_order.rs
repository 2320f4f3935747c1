//! FILTER / MAP / MAP_FILTER / REDUCE: the only operations that accept a
//! caller-supplied callback, and the only ones eligible for the parallel
//! fan-out described for [`OpFlags::PARALLEL`].
//!
//! The callback itself is an external collaborator (like [`crate::external::Parser`]
//! and [`crate::external::Emitter`]): this crate never interprets a block/closure
//! handle, it just calls whatever `Fn(&Builder, ...) -> V` the caller passed in.

use std::sync::Mutex;

use treeval_core::{Builder, Kind, V};

use crate::error::{set_last_error, OpsError};
use crate::flags::{OpFlags, PARALLEL_THRESHOLD};
use crate::pool::WorkerPool;

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

/// The collection kind these ops iterate over: `in` and every item of
/// `extra` must share it. `None` (and a recorded `TypeViolation`) for
/// anything else, including a kind mismatch between `in` and `extra`.
fn common_kind(builder: &Builder, input: V, extra: &[V]) -> Option<Kind> {
    let kind = builder.type_of(input);
    if !matches!(kind, Kind::Sequence | Kind::Mapping) {
        set_last_error(OpsError::TypeViolation {
            expected: "sequence or mapping",
            found: kind_name(kind),
        });
        return None;
    }
    for &more in extra {
        let other = builder.type_of(more);
        if other != kind {
            set_last_error(OpsError::TypeViolation {
                expected: kind_name(kind),
                found: kind_name(other),
            });
            return None;
        }
    }
    Some(kind)
}

/// Iteration order for FILTER/MAP/MAP_FILTER/REDUCE: `in`'s items
/// followed by each of `extra`'s items, flattened one level. A mapping's
/// entries are packed one pair per item (as a 2-element sequence `[key,
/// value]`), so a pair is never split across a parallel chunk boundary.
fn gather_items(builder: &Builder, input: V, extra: &[V], kind: Kind) -> Vec<V> {
    let pack = |v: V| -> Vec<V> {
        match kind {
            Kind::Sequence => builder.seq_items(v),
            Kind::Mapping => builder
                .map_pairs(v)
                .into_iter()
                .map(|(k, val)| builder.seq(&[k, val]))
                .collect(),
            _ => unreachable!("common_kind only returns Sequence or Mapping"),
        }
    };
    let mut items = pack(input);
    for &more in extra {
        items.extend(pack(more));
    }
    items
}

/// Rebuilds the output collection for `kind` from the items FILTER/MAP
/// produced. For a mapping, each item must be the 2-element `[key,
/// value]` pair shape `gather_items` packed; anything else is a
/// `CallbackFailed` (the caller's transform broke the pair shape).
fn rebuild(builder: &Builder, kind: Kind, items: Vec<V>) -> V {
    match kind {
        Kind::Sequence => builder.seq(&items),
        Kind::Mapping => {
            let mut pairs = Vec::with_capacity(items.len());
            for item in items {
                let pair = builder.seq_items(item);
                if pair.len() != 2 {
                    set_last_error(OpsError::CallbackFailed);
                    return V::INVALID;
                }
                pairs.push((pair[0], pair[1]));
            }
            builder.map(&pairs)
        }
        _ => unreachable!("common_kind only returns Sequence or Mapping"),
    }
}

fn chunk_bounds(len: usize, chunks: usize) -> Vec<(usize, usize)> {
    let chunks = chunks.max(1);
    let base = len / chunks;
    let rem = len % chunks;
    let mut bounds = Vec::with_capacity(chunks);
    let mut start = 0;
    for i in 0..chunks {
        let size = base + usize::from(i < rem);
        if size == 0 {
            continue;
        }
        bounds.push((start, start + size));
        start += size;
    }
    bounds
}

fn eligible_pool<'a>(
    pool: Option<&'a dyn WorkerPool>,
    flags: OpFlags,
    item_count: usize,
) -> Option<&'a dyn WorkerPool> {
    pool.filter(|_| flags.contains(OpFlags::PARALLEL) && item_count > PARALLEL_THRESHOLD)
}

/// Shards `items` across `pool` and runs `work` on each disjoint slice,
/// recombining in input order. Runs `work` once, in-thread, below the
/// parallel threshold or with no pool supplied. `work` returning `None`
/// for any chunk aborts the whole call with `None`.
fn run_sharded<W>(items: &[V], flags: OpFlags, pool: Option<&dyn WorkerPool>, work: W) -> Option<Vec<V>>
where
    W: Fn(&[V]) -> Option<Vec<V>> + Sync,
{
    let Some(pool) = eligible_pool(pool, flags, items.len()) else {
        return work(items);
    };

    let bounds = chunk_bounds(items.len(), pool.num_threads());
    if bounds.len() <= 1 {
        return work(items);
    }

    let slots: Vec<Mutex<Option<Vec<V>>>> = bounds.iter().map(|_| Mutex::new(None)).collect();
    let jobs: Vec<Box<dyn FnOnce() + Send>> = bounds
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| {
            let slice = &items[start..end];
            let slot = &slots[i];
            let work = &work;
            Box::new(move || {
                *slot.lock().unwrap() = work(slice);
            }) as Box<dyn FnOnce() + Send>
        })
        .collect();
    tracing::trace!(chunks = bounds.len(), "sharding fan-out across worker pool");
    pool.join(jobs);

    let mut out = Vec::with_capacity(items.len());
    for slot in slots {
        match slot.into_inner().unwrap() {
            Some(chunk) => out.extend(chunk),
            None => return None,
        }
    }
    Some(out)
}

fn sequential_filter<F>(builder: &Builder, items: &[V], predicate: &F) -> Option<Vec<V>>
where
    F: Fn(&Builder, V) -> V,
{
    let mut out = Vec::with_capacity(items.len());
    for &item in items {
        let verdict = predicate(builder, item);
        if verdict.is_invalid() {
            return None;
        }
        if builder.as_bool(verdict) {
            out.push(item);
        }
    }
    Some(out)
}

/// Keeps elements of `in` (and `extra`'s items) for which `predicate`
/// returns a truthy value. `predicate` returning `V::INVALID` aborts the
/// whole call with `V::INVALID`.
pub fn filter<F>(
    builder: &Builder,
    input: V,
    extra: &[V],
    flags: OpFlags,
    pool: Option<&dyn WorkerPool>,
    predicate: F,
) -> V
where
    F: Fn(&Builder, V) -> V + Sync,
{
    let Some(kind) = common_kind(builder, input, extra) else {
        return V::INVALID;
    };
    let items = gather_items(builder, input, extra, kind);
    match run_sharded(&items, flags, pool, |slice| sequential_filter(builder, slice, &predicate)) {
        Some(kept) => rebuild(builder, kind, kept),
        None => {
            set_last_error(OpsError::CallbackFailed);
            V::INVALID
        }
    }
}

fn sequential_map<F>(builder: &Builder, items: &[V], transform: &F) -> Option<Vec<V>>
where
    F: Fn(&Builder, V) -> V,
{
    let mut out = Vec::with_capacity(items.len());
    for &item in items {
        let mapped = transform(builder, item);
        if mapped.is_invalid() {
            return None;
        }
        out.push(mapped);
    }
    Some(out)
}

/// Replaces every element with `transform(item)`. A single `V::INVALID`
/// result aborts the whole call with `V::INVALID`; no partial
/// publication.
pub fn map<F>(
    builder: &Builder,
    input: V,
    extra: &[V],
    flags: OpFlags,
    pool: Option<&dyn WorkerPool>,
    transform: F,
) -> V
where
    F: Fn(&Builder, V) -> V + Sync,
{
    let Some(kind) = common_kind(builder, input, extra) else {
        return V::INVALID;
    };
    let items = gather_items(builder, input, extra, kind);
    match run_sharded(&items, flags, pool, |slice| sequential_map(builder, slice, &transform)) {
        Some(mapped) => rebuild(builder, kind, mapped),
        None => {
            set_last_error(OpsError::CallbackFailed);
            V::INVALID
        }
    }
}

/// Like [`map`], but an `INVALID` result from `transform` drops the
/// element silently instead of aborting the call.
pub fn map_filter<F>(
    builder: &Builder,
    input: V,
    extra: &[V],
    flags: OpFlags,
    pool: Option<&dyn WorkerPool>,
    transform: F,
) -> V
where
    F: Fn(&Builder, V) -> V + Sync,
{
    let Some(kind) = common_kind(builder, input, extra) else {
        return V::INVALID;
    };
    let items = gather_items(builder, input, extra, kind);
    let mapped = run_sharded(&items, flags, pool, |slice| {
        Some(
            slice
                .iter()
                .map(|&item| transform(builder, item))
                .filter(|v| !v.is_invalid())
                .collect(),
        )
    });
    rebuild(builder, kind, mapped.unwrap_or_default())
}

fn sequential_fold<F>(builder: &Builder, items: &[V], seed: V, fold: &F) -> V
where
    F: Fn(&Builder, V, V) -> V,
{
    let mut acc = seed;
    for &item in items {
        acc = fold(builder, acc, item);
        if acc.is_invalid() {
            return V::INVALID;
        }
    }
    acc
}

/// Two-phase fold: below the threshold (or with no pool), a single
/// sequential fold from `seed`. Above it, each worker folds its own
/// slice starting from `seed`, then the partial accumulators are folded
/// together, again starting from `seed`.
pub fn reduce<F>(
    builder: &Builder,
    input: V,
    extra: &[V],
    seed: V,
    flags: OpFlags,
    pool: Option<&dyn WorkerPool>,
    fold: F,
) -> V
where
    F: Fn(&Builder, V, V) -> V + Sync,
{
    let Some(kind) = common_kind(builder, input, extra) else {
        return V::INVALID;
    };
    let items = gather_items(builder, input, extra, kind);

    let result = match eligible_pool(pool, flags, items.len()) {
        None => sequential_fold(builder, &items, seed, &fold),
        Some(pool) => {
            let bounds = chunk_bounds(items.len(), pool.num_threads());
            if bounds.len() <= 1 {
                sequential_fold(builder, &items, seed, &fold)
            } else {
                let slots: Vec<Mutex<Option<V>>> = bounds.iter().map(|_| Mutex::new(None)).collect();
                let jobs: Vec<Box<dyn FnOnce() + Send>> = bounds
                    .iter()
                    .enumerate()
                    .map(|(i, &(start, end))| {
                        let slice = &items[start..end];
                        let slot = &slots[i];
                        let fold = &fold;
                        Box::new(move || {
                            *slot.lock().unwrap() = Some(sequential_fold(builder, slice, seed, fold));
                        }) as Box<dyn FnOnce() + Send>
                    })
                    .collect();
                tracing::trace!(chunks = bounds.len(), "two-phase reduce fan-out");
                pool.join(jobs);

                let partials: Vec<V> = slots.into_iter().map(|s| s.into_inner().unwrap().unwrap()).collect();
                if partials.iter().any(|v| v.is_invalid()) {
                    V::INVALID
                } else {
                    sequential_fold(builder, &partials, seed, &fold)
                }
            }
        }
    };

    if result.is_invalid() {
        set_last_error(OpsError::CallbackFailed);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::StdThreadPool;
    use treeval_core::Builder;

    fn ints(b: &Builder, xs: &[i64]) -> V {
        let items: Vec<V> = xs.iter().map(|&x| b.int(x)).collect();
        b.seq(&items)
    }

    fn as_ints(b: &Builder, v: V) -> Vec<i128> {
        b.seq_items(v).into_iter().map(|item| b.as_int(item)).collect()
    }

    #[test]
    fn filter_drops_elements_where_predicate_is_false() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3, 4, 5]);
        let out = filter(&b, seq, &[], OpFlags::empty(), None, |b, item| {
            b.bool_(b.as_int(item) % 2 == 0)
        });
        assert_eq!(as_ints(&b, out), vec![2, 4]);
    }

    #[test]
    fn map_doubles_every_element() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        let out = map(&b, seq, &[], OpFlags::empty(), None, |b, item| b.int(b.as_int(item) as i64 * 2));
        assert_eq!(as_ints(&b, out), vec![2, 4, 6]);
    }

    #[test]
    fn map_aborts_whole_call_on_invalid_result() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3]);
        let out = map(&b, seq, &[], OpFlags::empty(), None, |_, item| {
            if item == b.int(2) { V::INVALID } else { item }
        });
        assert!(out.is_invalid());
    }

    #[test]
    fn map_filter_drops_invalid_silently() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3, 4]);
        let out = map_filter(&b, seq, &[], OpFlags::empty(), None, |b, item| {
            let n = b.as_int(item);
            if n % 2 == 0 { b.int(n as i64) } else { V::INVALID }
        });
        assert_eq!(as_ints(&b, out), vec![2, 4]);
    }

    #[test]
    fn reduce_folds_with_seed() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2, 3, 4]);
        let seed = b.int(0);
        let sum = reduce(&b, seq, &[], seed, OpFlags::empty(), None, |b, acc, item| {
            b.int(b.as_int(acc) as i64 + b.as_int(item) as i64)
        });
        assert_eq!(b.as_int(sum), 10);
    }

    #[test]
    fn parallel_map_matches_sequential_map_over_a_thousand_items() {
        let b = Builder::new();
        let xs: Vec<i64> = (0..1000).collect();
        let seq = ints(&b, &xs);
        let double = |b: &Builder, item: V| b.int(b.as_int(item) as i64 * 2);

        let sequential = map(&b, seq, &[], OpFlags::empty(), None, double);
        let pool = StdThreadPool::with_threads(8);
        let parallel = map(&b, seq, &[], OpFlags::PARALLEL, Some(&pool), double);

        assert_eq!(as_ints(&b, sequential), as_ints(&b, parallel));
    }

    #[test]
    fn parallel_map_with_failing_callback_is_invalid_with_no_partial_result() {
        let b = Builder::new();
        let xs: Vec<i64> = (0..1000).collect();
        let seq = ints(&b, &xs);
        let pool = StdThreadPool::with_threads(8);
        let out = map(&b, seq, &[], OpFlags::PARALLEL, Some(&pool), |_, item: V| {
            if item == b.int(500) { V::INVALID } else { item }
        });
        assert!(out.is_invalid());
    }

    #[test]
    fn parallel_reduce_matches_sequential_reduce() {
        let b = Builder::new();
        let xs: Vec<i64> = (1..=1000).collect();
        let seq = ints(&b, &xs);
        let seed = b.int(0);
        let sum = |b: &Builder, acc: V, item: V| b.int(b.as_int(acc) as i64 + b.as_int(item) as i64);

        let sequential = reduce(&b, seq, &[], seed, OpFlags::empty(), None, sum);
        let pool = StdThreadPool::with_threads(8);
        let parallel = reduce(&b, seq, &[], seed, OpFlags::PARALLEL, Some(&pool), sum);

        assert_eq!(b.as_int(sequential), b.as_int(parallel));
    }

    #[test]
    fn gather_items_concatenates_in_with_extra_sequences() {
        let b = Builder::new();
        let a = ints(&b, &[1, 2]);
        let c = ints(&b, &[3, 4]);
        let out = filter(&b, a, &[c], OpFlags::empty(), None, |b, _| b.bool_(true));
        assert_eq!(as_ints(&b, out), vec![1, 2, 3, 4]);
    }

    #[test]
    fn filter_over_a_mapping_keeps_whole_pairs_by_value() {
        let b = Builder::new();
        let map = b.map(&[
            (b.string(b"a"), b.int(1)),
            (b.string(b"b"), b.int(2)),
            (b.string(b"c"), b.int(3)),
        ]);
        let out = filter(&b, map, &[], OpFlags::empty(), None, |b, pair| {
            let kv = b.seq_items(pair);
            b.bool_(b.as_int(kv[1]) % 2 == 1)
        });
        let pairs = b.map_pairs(out);
        let names: Vec<_> = pairs.iter().map(|(k, _)| b.as_bytes(*k)).collect();
        assert_eq!(names, vec![b"a".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn map_over_a_mapping_transforms_values_and_rebuilds_pairs() {
        let b = Builder::new();
        let input = b.map(&[(b.string(b"a"), b.int(1)), (b.string(b"b"), b.int(2))]);
        let out = map(&b, input, &[], OpFlags::empty(), None, |b, pair| {
            let kv = b.seq_items(pair);
            let doubled = b.int(b.as_int(kv[1]) as i64 * 2);
            b.seq(&[kv[0], doubled])
        });
        assert_eq!(b.as_int(map_ops_get(&b, out, b.string(b"a"))), 2);
        assert_eq!(b.as_int(map_ops_get(&b, out, b.string(b"b"))), 4);
    }

    fn map_ops_get(b: &Builder, m: V, key: V) -> V {
        crate::map_ops::get(b, m, key)
    }

    #[test]
    fn filter_rejects_a_scalar_input_with_a_type_violation() {
        let b = Builder::new();
        let out = filter(&b, b.int(1), &[], OpFlags::empty(), None, |b, _| b.bool_(true));
        assert!(out.is_invalid());
    }

    #[test]
    fn map_rejects_mismatched_kinds_between_in_and_extra() {
        let b = Builder::new();
        let seq = ints(&b, &[1, 2]);
        let a_map = b.map(&[(b.string(b"a"), b.int(1))]);
        let out = map(&b, seq, &[a_map], OpFlags::empty(), None, |_, item| item);
        assert!(out.is_invalid());
    }
}
