//! The unified error handling system for the memoizer.

pub use types::MemoError;

/// A unified `Result` type for the entire crate.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, MemoError>;

pub mod macros;
pub mod types;

/// Error Category for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the caller (e.g., bad configuration, unserializable arguments).
    Client,
    /// Errors caused by the store, the lock service or the wrapped operation.
    Server,
}
