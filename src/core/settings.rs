use crate::core::failures::FailureTracker;
use crate::core::models::PollConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const CLIENT_ID_ENV: &str = "TWITCH_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "TWITCH_CLIENT_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub twitch: TwitchSettings,
    pub polling: PollingSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for TwitchSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            request_timeout_secs: 30,
        }
    }
}

impl TwitchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credentials(&self) -> Result<(String, String)> {
        let client_id = self
            .client_id
            .clone()
            .filter(|s| !s.is_empty())
            .with_context(|| {
                format!("Twitch client ID missing: set {CLIENT_ID_ENV} or twitch.client_id")
            })?;
        let client_secret = self
            .client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .with_context(|| {
                format!("Twitch client secret missing: set {CLIENT_SECRET_ENV} or twitch.client_secret")
            })?;
        Ok((client_id, client_secret))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub normal_interval_secs: u64,
    pub streaming_interval_secs: u64,
    pub failure_threshold: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            normal_interval_secs: PollConfig::DEFAULT_NORMAL_INTERVAL.as_secs(),
            streaming_interval_secs: PollConfig::DEFAULT_STREAMING_INTERVAL.as_secs(),
            failure_threshold: FailureTracker::DEFAULT_THRESHOLD,
        }
    }
}

impl PollingSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.normal_interval_secs),
            Duration::from_secs(self.streaming_interval_secs),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackend {
    Desktop,
    Command,
}

/// How announcements are presented. A dialog stays until dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFormat {
    Notification,
    Dialog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub backend: NotificationBackend,
    pub format: NotificationFormat,
    /// Program and arguments for the `command` backend. `{message}`,
    /// `{title}` and `{url}` are substituted in every argument; `{url}` is
    /// empty except when a stream starts.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub profile_icon: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            backend: NotificationBackend::Desktop,
            format: NotificationFormat::Notification,
            command: vec![
                "notify-send".to_string(),
                "{title}".to_string(),
                "{message}".to_string(),
            ],
            timeout_secs: 10,
            profile_icon: true,
        }
    }
}

impl NotificationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stream-watch").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;

        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let settings: Settings = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            tracing::info!(?path, "Loaded config");
            settings
        } else {
            tracing::info!(?path, "Config file not found, using defaults");
            Self::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_ENV).filter(|s| !s.is_empty()) {
            self.twitch.client_id = Some(id);
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|s| !s.is_empty()) {
            self.twitch.client_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.normal_interval_secs == 0 {
            anyhow::bail!("polling.normal_interval_secs must be greater than 0");
        }
        if self.polling.streaming_interval_secs == 0 {
            anyhow::bail!("polling.streaming_interval_secs must be greater than 0");
        }
        if self.twitch.request_timeout_secs == 0 {
            anyhow::bail!("twitch.request_timeout_secs must be greater than 0");
        }
        if self.notifications.timeout_secs == 0 {
            anyhow::bail!("notifications.timeout_secs must be greater than 0");
        }
        if self.notifications.backend == NotificationBackend::Command
            && self.notifications.command.first().map_or(true, |p| p.is_empty())
        {
            anyhow::bail!("notifications.command must name a program for the command backend");
        }
        Ok(())
    }
}
