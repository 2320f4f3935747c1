//! The central dispatcher: one entry point per non-callback operation,
//! plus the shared input-normalization and type-checking machinery every
//! operation goes through before touching [`crate::seq_ops`] or
//! [`crate::map_ops`]. FILTER/MAP/MAP_FILTER/REDUCE live in
//! [`crate::higher_order`] since they take a caller-supplied callback
//! instead of a plain `Args` payload; PARSE/EMIT live in
//! [`crate::encoder`] and call straight through to the external
//! [`crate::external::Parser`]/[`crate::external::Emitter`].

use treeval_core::{Builder, Kind, V};

use crate::error::{set_last_error, OpsError};
use crate::flags::OpFlags;
use crate::map_ops;
use crate::path::PathKey;
use crate::seq_ops;

/// A `CREATE_*` scalar payload.
#[derive(Clone, Debug)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<u8>),
}

/// Per-operation argument payload. Each operation names the shape it
/// expects in its doc comment on [`Op`]; [`dispatch`] does not attempt
/// to coerce between shapes.
#[derive(Clone, Debug)]
pub enum Args {
    None,
    Scalar(Scalar),
    Items(Vec<V>),
    Insert { index: usize, items: Vec<V> },
    Replace { index: usize, count: usize, items: Vec<V> },
    Pairs(Vec<(V, V)>),
    Keys(Vec<V>),
    SeqSet(Vec<(usize, V)>),
    Key(V),
    Index(usize),
    IndexValue { index: usize, value: V },
    Others(Vec<V>),
    Path(Vec<PathKey>),
    PathValue { path: Vec<PathKey>, value: V },
}

/// Every dispatchable operation except FILTER/MAP/MAP_FILTER/REDUCE
/// (callback-bearing, see [`crate::higher_order`]) and PARSE/EMIT (see
/// [`crate::encoder`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    CreateNull,
    CreateBool,
    CreateInt,
    CreateFlt,
    CreateStr,
    CreateSeq,
    CreateMap,
    Insert,
    Replace,
    Append,
    Assoc,
    Disassoc,
    Keys,
    Values,
    Items,
    Contains,
    Concat,
    Reverse,
    Merge,
    Unique,
    Sort,
    Set,
    Get,
    GetAt,
    SetAt,
    GetAtPath,
    SetAtPath,
}

fn type_violation(builder: &Builder, expected: &'static str, found: Kind) -> V {
    set_last_error(OpsError::TypeViolation {
        expected,
        found: kind_name(found),
    });
    let _ = builder;
    V::INVALID
}

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

/// Normalizes one handle per `flags`: `NO_CHECKS` trusts it outright,
/// `DONT_INTERNALIZE` validates (foreign handles fail), otherwise it is
/// copied in via `internalize`. `None` on failure.
fn normalize(builder: &Builder, v: V, flags: OpFlags) -> Option<V> {
    if flags.contains(OpFlags::NO_CHECKS) {
        return Some(v);
    }
    let out = if flags.contains(OpFlags::DONT_INTERNALIZE) {
        builder.validate(v)
    } else {
        builder.internalize(v)
    };
    if out.is_invalid() {
        None
    } else {
        Some(out)
    }
}

fn normalize_all(builder: &Builder, items: &[V], flags: OpFlags) -> Option<Vec<V>> {
    items.iter().map(|&v| normalize(builder, v, flags)).collect()
}

/// Runs `op` against `input`/`args`, normalizing both per `flags` first.
/// `V::INVALID` on any type violation, arity violation, or normalization
/// failure.
pub fn dispatch(builder: &Builder, flags: OpFlags, op: Op, input: V, args: Args) -> V {
    use Op::*;

    if matches!(
        op,
        CreateNull | CreateBool | CreateInt | CreateFlt | CreateStr | CreateSeq | CreateMap
    ) {
        return create(builder, flags, op, args);
    }

    let Some(input) = normalize(builder, input, flags) else {
        return V::INVALID;
    };
    let kind = builder.type_of(input);

    match op {
        Insert => {
            let Args::Insert { index, items } = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            let Some(items) = normalize_all(builder, &items, flags) else {
                return V::INVALID;
            };
            seq_ops::insert(builder, input, index, &items)
        }
        Replace => {
            let Args::Replace { index, count, items } = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            let Some(items) = normalize_all(builder, &items, flags) else {
                return V::INVALID;
            };
            seq_ops::replace(builder, input, index, count, &items)
        }
        Append => {
            let Args::Items(items) = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            let Some(items) = normalize_all(builder, &items, flags) else {
                return V::INVALID;
            };
            seq_ops::append(builder, input, &items)
        }
        Assoc => {
            let Args::Pairs(pairs) = args else {
                return type_violation(builder, "mapping", kind);
            };
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            let Some(pairs) = normalize_pairs(builder, &pairs, flags) else {
                return V::INVALID;
            };
            map_ops::assoc(builder, input, &pairs)
        }
        Disassoc => {
            let Args::Keys(keys) = args else {
                return type_violation(builder, "mapping", kind);
            };
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            let Some(keys) = normalize_all(builder, &keys, flags) else {
                return V::INVALID;
            };
            map_ops::disassoc(builder, input, &keys)
        }
        Keys => {
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            map_ops::keys(builder, input)
        }
        Values => {
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            map_ops::values(builder, input)
        }
        Items => {
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            map_ops::items(builder, input)
        }
        Contains => {
            let Args::Key(key) = args else {
                return type_violation(builder, "sequence or mapping", kind);
            };
            let Some(key) = normalize(builder, key, flags) else {
                return V::INVALID;
            };
            let found = match kind {
                Kind::Sequence => seq_ops::contains(builder, input, key),
                Kind::Mapping => map_ops::contains(builder, input, key),
                _ => return type_violation(builder, "sequence or mapping", kind),
            };
            builder.bool_(found)
        }
        Concat => {
            let Args::Others(others) = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            let Some(others) = normalize_same_kind(builder, &others, flags, kind) else {
                return V::INVALID;
            };
            seq_ops::concat(builder, input, &others)
        }
        Reverse => match kind {
            Kind::Sequence => seq_ops::reverse(builder, input),
            Kind::Mapping => map_ops::reverse(builder, input),
            _ => type_violation(builder, "sequence or mapping", kind),
        },
        Merge => {
            let Args::Others(others) = args else {
                return type_violation(builder, "mapping", kind);
            };
            if kind != Kind::Mapping {
                return type_violation(builder, "mapping", kind);
            }
            let Some(others) = normalize_same_kind(builder, &others, flags, kind) else {
                return V::INVALID;
            };
            map_ops::merge(builder, input, &others)
        }
        Unique => {
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            seq_ops::unique(builder, input)
        }
        Sort => match kind {
            Kind::Sequence => seq_ops::sort(builder, input),
            Kind::Mapping => map_ops::sort_by_key(builder, input),
            _ => type_violation(builder, "sequence or mapping", kind),
        },
        Set => match (kind, args) {
            (Kind::Sequence, Args::SeqSet(pairs)) => {
                let Some(pairs) = normalize_seq_set(builder, &pairs, flags) else {
                    return V::INVALID;
                };
                seq_ops::set_many(builder, input, &pairs)
            }
            (Kind::Mapping, Args::Pairs(pairs)) => {
                let Some(pairs) = normalize_pairs(builder, &pairs, flags) else {
                    return V::INVALID;
                };
                map_ops::assoc(builder, input, &pairs)
            }
            _ => type_violation(builder, "sequence or mapping", kind),
        },
        Get => {
            let Args::Key(key) = args else {
                return type_violation(builder, "sequence or mapping", kind);
            };
            match kind {
                Kind::Sequence => {
                    let Ok(index) = usize::try_from(builder.as_int(key)) else {
                        return V::INVALID;
                    };
                    seq_ops::get_at(builder, input, index)
                }
                Kind::Mapping => {
                    let Some(key) = normalize(builder, key, flags) else {
                        return V::INVALID;
                    };
                    map_ops::get(builder, input, key)
                }
                _ => type_violation(builder, "sequence or mapping", kind),
            }
        }
        GetAt => {
            let Args::Index(index) = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            seq_ops::get_at(builder, input, index)
        }
        SetAt => {
            let Args::IndexValue { index, value } = args else {
                return type_violation(builder, "sequence", kind);
            };
            if kind != Kind::Sequence {
                return type_violation(builder, "sequence", kind);
            }
            let Some(value) = normalize(builder, value, flags) else {
                return V::INVALID;
            };
            seq_ops::set_at(builder, input, index, value)
        }
        GetAtPath => {
            let Args::Path(path) = args else {
                return V::INVALID;
            };
            crate::path::get_at_path(builder, input, &path, flags)
        }
        SetAtPath => {
            let Args::PathValue { path, value } = args else {
                return V::INVALID;
            };
            let Some(value) = normalize(builder, value, flags) else {
                return V::INVALID;
            };
            crate::path::set_at_path(builder, input, &path, value, flags)
        }
        CreateNull | CreateBool | CreateInt | CreateFlt | CreateStr | CreateSeq | CreateMap => {
            unreachable!("handled above")
        }
    }
}

fn normalize_pairs(builder: &Builder, pairs: &[(V, V)], flags: OpFlags) -> Option<Vec<(V, V)>> {
    pairs
        .iter()
        .map(|&(k, v)| Some((normalize(builder, k, flags)?, normalize(builder, v, flags)?)))
        .collect()
}

fn normalize_seq_set(builder: &Builder, pairs: &[(usize, V)], flags: OpFlags) -> Option<Vec<(usize, V)>> {
    pairs
        .iter()
        .map(|&(i, v)| Some((i, normalize(builder, v, flags)?)))
        .collect()
}

fn normalize_same_kind(builder: &Builder, items: &[V], flags: OpFlags, kind: Kind) -> Option<Vec<V>> {
    let mut out = Vec::with_capacity(items.len());
    for &item in items {
        let item = normalize(builder, item, flags)?;
        if builder.type_of(item) != kind {
            set_last_error(OpsError::TypeViolation {
                expected: kind_name(kind),
                found: kind_name(builder.type_of(item)),
            });
            return None;
        }
        out.push(item);
    }
    Some(out)
}

fn create(builder: &Builder, flags: OpFlags, op: Op, args: Args) -> V {
    use Op::*;
    match (op, args) {
        (CreateNull, _) => builder.null(),
        (CreateBool, Args::Scalar(Scalar::Bool(b))) => builder.bool_(b),
        (CreateInt, Args::Scalar(Scalar::Int(i))) => builder.int(i),
        (CreateFlt, Args::Scalar(Scalar::Float(f))) => builder.float(f),
        (CreateStr, Args::Scalar(Scalar::Str(bytes))) => builder.string(&bytes),
        (CreateSeq, Args::Items(items)) => {
            if items.is_empty() {
                return builder.seq_empty();
            }
            let Some(items) = normalize_all(builder, &items, flags) else {
                return V::INVALID;
            };
            builder.seq(&items)
        }
        (CreateMap, Args::Pairs(pairs)) => {
            if pairs.is_empty() {
                return builder.map_empty();
            }
            let Some(pairs) = normalize_pairs(builder, &pairs, flags) else {
                return V::INVALID;
            };
            builder.map(&pairs)
        }
        (CreateMap, Args::Items(flat)) if flags.contains(OpFlags::MAP_ITEM_COUNT) => {
            if flat.len() % 2 != 0 {
                set_last_error(OpsError::OddArity);
                return V::INVALID;
            }
            let pairs: Vec<(V, V)> = flat.chunks_exact(2).map(|c| (c[0], c[1])).collect();
            let Some(pairs) = normalize_pairs(builder, &pairs, flags) else {
                return V::INVALID;
            };
            builder.map(&pairs)
        }
        _ => V::INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeval_core::Builder;

    #[test]
    fn create_seq_and_append_round_trips_through_dispatch() {
        let b = Builder::new();
        let seq = dispatch(
            &b,
            OpFlags::empty(),
            Op::CreateSeq,
            V::INVALID,
            Args::Items(vec![b.int(1), b.int(2)]),
        );
        let out = dispatch(
            &b,
            OpFlags::empty(),
            Op::Append,
            seq,
            Args::Items(vec![b.int(3)]),
        );
        assert_eq!(b.seq_items(out).iter().map(|&v| b.as_int(v)).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn assoc_on_a_sequence_is_a_type_violation() {
        let b = Builder::new();
        let seq = b.seq(&[b.int(1)]);
        let out = dispatch(&b, OpFlags::empty(), Op::Assoc, seq, Args::Pairs(vec![(b.string(b"k"), b.int(1))]));
        assert!(out.is_invalid());
    }

    #[test]
    fn set_many_via_dispatch_pads_with_null() {
        let b = Builder::new();
        let seq = b.seq(&[b.int(10), b.int(20), b.int(30)]);
        let out = dispatch(&b, OpFlags::empty(), Op::Set, seq, Args::SeqSet(vec![(5, b.int(99))]));
        let items = b.seq_items(out);
        assert_eq!(items.len(), 6);
        assert_eq!(b.as_int(items[5]), 99);
    }

    #[test]
    fn merge_rejects_a_non_mapping_argument() {
        let b = Builder::new();
        let m = b.map(&[(b.string(b"a"), b.int(1))]);
        let not_a_map = b.seq(&[b.int(1)]);
        let out = dispatch(&b, OpFlags::empty(), Op::Merge, m, Args::Others(vec![not_a_map]));
        assert!(out.is_invalid());
    }

    #[test]
    fn create_map_from_flat_pairs_with_map_item_count() {
        let b = Builder::new();
        let k = b.string(b"x");
        let v = b.int(7);
        let out = dispatch(&b, OpFlags::MAP_ITEM_COUNT, Op::CreateMap, V::INVALID, Args::Items(vec![k, v]));
        assert_eq!(b.as_int(map_ops::get(&b, out, k)), 7);
    }
}
