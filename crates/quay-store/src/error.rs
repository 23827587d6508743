//! Error types for secondary storage operations.

/// Errors that can occur during secondary storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure in a disk-backed target.
    #[error("target i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the value would take the target past its byte budget.
    #[error("target full: {needed} more bytes needed, {available} free")]
    CapacityExceeded {
        /// Additional bytes the write requires.
        needed: u64,
        /// Bytes left in the budget.
        available: u64,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
