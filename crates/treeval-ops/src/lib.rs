//! Collection operation engine: the pure, structure-sharing transforms
//! (`seq_ops`, `map_ops`, `path`), the callback-bearing ones eligible for
//! parallel fan-out (`higher_order`), the central dispatcher tying them
//! together (`dispatch`), and the thin encoder driver between a value
//! tree and an external emitter (`encoder`). Everything here operates on
//! a [`treeval_core::Builder`] and its [`treeval_core::V`] handles.

mod dispatch;
mod encoder;
mod error;
mod external;
mod flags;
mod higher_order;
mod map_ops;
mod path;
mod pool;
mod seq_ops;

pub use dispatch::{dispatch, Args, Op, Scalar};
pub use encoder::{emit, encode, parse};
pub use error::{clear_last_error, last_error, OpsError};
pub use external::{Emitter, EmitterConfig, Event, Parser, ParserConfig, ScalarStyle};
pub use flags::{OpFlags, PARALLEL_THRESHOLD};
pub use higher_order::{filter, map, map_filter, reduce};
pub use map_ops::{
    assoc, contains as map_contains, disassoc, get as map_get, items, keys, merge,
    reverse as map_reverse, sort_by_key, values,
};
pub use path::{get_at_path, set_at_path, PathKey};
pub use pool::{StdThreadPool, WorkerPool};
pub use seq_ops::{
    append, concat, contains as seq_contains, get_at, insert, replace, reverse as seq_reverse,
    set_at, set_many, sort, unique,
};
