//! The error taxonomy of spec.md §7. Protocol-benign conditions (stale responses,
//! duplicates, messages for untracked slots) are not represented here at all — they
//! are swallowed, producing an empty [`crate::core::Effects`].

use crate::storage::StorageError;

/// A fatal condition. The core halts the node rather than return a partial
/// [`crate::core::Effects`]; the caller is expected to restart the node from durable
/// state (spec.md §7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Storage` call failed. Per spec.md §7 this is always fatal and the core must
    /// not send any message whose precondition was that write.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// A durable `Progress` regression was about to be written, or a `Leader` event
    /// arrived with invariant L1 violated (`epoch` absent, or `highest_promised >
    /// epoch`). Both indicate a leader that should already have backed down; reaching
    /// either state is a bug in the caller or in this core.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
