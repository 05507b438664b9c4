use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const STREAM_STARTED_TITLE: &str = "Stream Started";
pub const STREAMER_FOUND_TITLE: &str = "Streamer Found";
pub const STREAMER_NOT_FOUND_TITLE: &str = "Streamer Not Found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamStatus {
    Streaming,
    NotStreaming,
}

impl StreamStatus {
    pub fn from_live_info(info: &LiveInfo) -> Self {
        match info.title.as_deref() {
            Some(title) if !title.is_empty() => StreamStatus::Streaming,
            _ => StreamStatus::NotStreaming,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamStatus::Streaming => "Streaming",
            StreamStatus::NotStreaming => "Not Streaming",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Intervals between probes. Fixed once the poll loop is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    normal_interval: Duration,
    streaming_interval: Duration,
}

impl PollConfig {
    pub const DEFAULT_NORMAL_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_STREAMING_INTERVAL: Duration = Duration::from_secs(3600);

    pub fn new(normal_interval: Duration, streaming_interval: Duration) -> Self {
        Self {
            normal_interval,
            streaming_interval,
        }
    }

    pub fn normal_interval(&self) -> Duration {
        self.normal_interval
    }

    pub fn streaming_interval(&self) -> Duration {
        self.streaming_interval
    }

    pub fn interval_for(&self, status: StreamStatus) -> Duration {
        match status {
            StreamStatus::Streaming => self.streaming_interval,
            StreamStatus::NotStreaming => self.normal_interval,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_NORMAL_INTERVAL,
            Self::DEFAULT_STREAMING_INTERVAL,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("Username cannot be empty")]
    Empty,
    #[error("Username must be alphanumeric")]
    InvalidCharacters,
}

/// Login name of the watched broadcaster, as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn parse(input: &str) -> Result<Self, UsernameError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UsernameError::Empty);
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(UsernameError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcaster {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveInfo {
    pub display_name: Option<String>,
    pub title: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl LiveInfo {
    pub fn offline() -> Self {
        Self::default()
    }
}

pub fn format_stream_started(username: &str, display_name: &str, title: &str) -> String {
    if username.to_lowercase() == display_name.to_lowercase() {
        format!("{display_name} has started streaming: {title}")
    } else {
        format!("{display_name}({username}) has started streaming: {title}")
    }
}

pub fn stream_url(username: &str) -> String {
    format!("https://www.twitch.tv/{username}")
}

pub fn format_streamer_found(username: &Username) -> String {
    format!("{username} found. You will be notified when the streaming starts.")
}

pub fn format_streamer_not_found(username: &Username) -> String {
    format!("{username} not found.")
}
