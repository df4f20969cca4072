//! Error types for the vow promise core

use thiserror::Error;

/// Failures the resolution machinery itself can produce.
///
/// Rejection *reasons* flowing through a [`Promise`](crate::Promise) are a
/// caller-chosen type; the only requirement is `From<Error>` so the core can
/// surface its own failures through that type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A promise was resolved with itself. Adopting one's own outcome can
    /// never settle, so this is reported as a rejection rather than a hang.
    #[error("promise cannot be resolved with itself")]
    SelfResolution,
}

/// Result type alias for vow, for callers using [`Error`] as their reason type.
pub type Result<T> = std::result::Result<T, Error>;
