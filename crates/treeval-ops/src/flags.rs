//! Operation modifier bits shared across the dispatcher.

use bitflags::bitflags;

bitflags! {
    /// Modifiers that change how [`crate::dispatch::dispatch`] normalizes
    /// its inputs or shapes its output, independent of which operation
    /// runs.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpFlags: u32 {
        /// Skip input normalization entirely; trust that `input` and every
        /// item already belong to the builder chain.
        const NO_CHECKS        = 1 << 0;
        /// Normalize with `validate` instead of `internalize`: reject
        /// foreign handles instead of copying them in.
        const DONT_INTERNALIZE = 1 << 1;
        /// Interpret a flat mapping argument list as key/value pairs
        /// rather than a bare item count.
        const MAP_ITEM_COUNT   = 1 << 2;
        /// Shard the working range across a worker pool when it's large
        /// enough to be worth it.
        const PARALLEL         = 1 << 3;
        /// In `GET_AT_PATH`/`SET_AT_PATH`, expand a sequence-valued path
        /// key inline instead of treating it as one opaque key.
        const FLATTEN_KEYS     = 1 << 4;
        /// The operation's callback argument is a block/closure handle
        /// rather than a plain value (documents intent for FILTER/MAP/
        /// MAP_FILTER/REDUCE call sites).
        const BLOCK_FN         = 1 << 5;
    }
}

impl Default for OpFlags {
    fn default() -> Self {
        OpFlags::empty()
    }
}

/// Items at or above this count are eligible for parallel fan-out when
/// [`OpFlags::PARALLEL`] is set.
pub const PARALLEL_THRESHOLD: usize = 100;
