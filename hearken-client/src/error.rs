//! Top-level client error.

use crate::config::ConfigError;
use crate::session::SessionStoreError;
use hearken_core::SyncError;

/// Errors raised while assembling or running a [`crate::FeedbackClient`].
///
/// Per-request failures are [`SyncError`]s; this type only appears at the
/// edges where configuration, durable session storage, or the HTTP stack
/// itself can fail.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
