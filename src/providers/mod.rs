mod twitch;

use crate::core::models::{Broadcaster, LiveInfo, Username};
use async_trait::async_trait;
use thiserror::Error;

pub use twitch::TwitchClient;

/// Failures talking to the streaming platform. Every variant is transient:
/// callers log it and try again on the next cycle.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: &'static str },
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("client has been closed")]
    Closed,
}

/// Live-status queries against the streaming platform.
///
/// Both queries are read-only and safe to repeat. "Not found" and "offline"
/// are ordinary results, not errors.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn resolve(&self, username: &Username) -> Result<Option<Broadcaster>, ApiError>;

    async fn live_info(&self, username: &Username) -> Result<LiveInfo, ApiError>;

    /// Releases network resources. Safe to call more than once.
    async fn close(&self);
}
