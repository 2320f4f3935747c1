//! Diagnostics boundary for this crate, mirroring treeval-core's: every
//! dispatcher entry point surfaces failure as `V::INVALID`, but records
//! why in a thread-local slot for logging.

use std::cell::RefCell;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsError {
    #[error("operation requires kind {expected}, found {found}")]
    TypeViolation {
        expected: &'static str,
        found: &'static str,
    },
    #[error("odd item count supplied for a pairwise operation")]
    OddArity,
    #[error("path traversal hit a missing key or a non-collection")]
    PathMiss,
    #[error("filter/map/reduce callback returned an invalid value")]
    CallbackFailed,
    #[error("external parser or emitter reported failure")]
    ExternalFailure,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<OpsError>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(err: OpsError) {
    tracing::debug!(error = %err, "treeval-ops: producing INVALID");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

pub fn last_error() -> Option<OpsError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_clears() {
        clear_last_error();
        set_last_error(OpsError::OddArity);
        assert_eq!(last_error(), Some(OpsError::OddArity));
        clear_last_error();
        assert!(last_error().is_none());
    }
}
