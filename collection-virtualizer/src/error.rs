use alloc::string::String;

use crate::ViewType;

/// Errors returned by [`crate::CollectionBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("duplicate node key {key}")]
    DuplicateKey { key: String },
}

/// A broken contract between the virtualizer and a layout (or the pool).
///
/// These are programmer errors: the public event methods of [`crate::Virtualizer`] panic with
/// this error, [`crate::Virtualizer::try_reconcile`] returns it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("layout returned a layout info for key {key}, which is not in the collection")]
    UnknownKey { key: String },
    #[error("layout returned {key} twice for the same rect")]
    DuplicateKey { key: String },
    #[error("view type mismatch for {key}: expected {expected:?}, got {actual:?}")]
    ViewTypeMismatch {
        key: String,
        expected: ViewType,
        actual: ViewType,
    },
}
