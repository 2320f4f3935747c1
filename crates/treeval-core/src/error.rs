//! Diagnostics boundary.
//!
//! Every public operation surfaces failure exclusively as
//! [`crate::V::INVALID`] — no `Result`, no panics escaping the API.
//! Internally we still want to know *why* the most recent `INVALID` was
//! produced, for logging at the boundary where a caller's input becomes a
//! `V`. A thread-local last-error slot records that reason without
//! changing the value-level contract: callers distinguish success from
//! failure with `V::is_invalid`, never by reading this slot.

use std::cell::RefCell;

use thiserror::Error;

/// Internal reasons a construction, internalize, or validate step can
/// fail. Never exposed through the public value-level API; recorded only
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("allocation refused: gather-store size overflow")]
    SizeOverflow,
    #[error("value is not contained by this builder chain")]
    NotContained,
    #[error("operation requires kind {expected}, found {found}")]
    TypeViolation {
        expected: &'static str,
        found: &'static str,
    },
    #[error("odd item count supplied for pairwise operation")]
    OddArity,
    #[error("no items supplied but a positive count was requested")]
    MissingItems,
    #[error("no scope-leader parent reachable for export")]
    NoExportTarget,
    #[error("user callback returned an invalid value")]
    CallbackFailed,
    #[error("external parser/emitter reported failure")]
    ExternalFailure,
    #[error("alias anchor must be a string value")]
    BadAliasAnchor,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<BuildError>> = const { RefCell::new(None) };
}

/// Record a diagnostic for the current thread. Called at every point an
/// internal operation is about to collapse to `V::INVALID`.
pub(crate) fn set_last_error(err: BuildError) {
    tracing::debug!(error = %err, "treeval-core: producing INVALID");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

/// Read (without clearing) the diagnostic for the most recent `INVALID`
/// produced on the calling thread, if any.
pub fn last_error() -> Option<BuildError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Clear the calling thread's diagnostic slot.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}
