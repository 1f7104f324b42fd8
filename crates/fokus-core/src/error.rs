//! Error types for `fokus-core`.
//!
//! Routing misses and cache failures have no variant here: a miss is a
//! [`Dispatch::Unmatched`](crate::router::Dispatch::Unmatched) outcome and a
//! cache failure is a `None`/`false` return. What remains are failures a
//! caller has to turn into something the user sees.

/// Errors returned by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The auth backend answered with a non-success status.
    #[error("auth backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The auth backend could not be reached.
    #[error("auth backend unreachable: {reason}")]
    Network { reason: String },

    /// The operation needs a signed-in session and there is none.
    #[error("no active session")]
    MissingSession,

    /// The token was rejected or has expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The auth backend's response could not be decoded.
    #[error("failed to decode auth response: {reason}")]
    Decode { reason: String },
}

/// Errors from router lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// `init()` was called more than once.
    #[error("router is already initialized")]
    AlreadyInitialized,
}

/// Errors raised by page handlers.
///
/// The router logs these and keeps running; pages surface the user-facing
/// part through the viewport themselves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// A call into the auth collaborator failed.
    #[error("auth call failed: {0}")]
    Auth(#[from] AuthError),

    /// Form input was rejected before any call was made.
    #[error("invalid input: {reason}")]
    Validation { reason: String },

    /// The page was asked to act while it is not mounted.
    #[error("page '{page}' is not mounted")]
    NotMounted { page: String },
}
