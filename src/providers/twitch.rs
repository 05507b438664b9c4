use crate::core::models::{Broadcaster, LiveInfo, Username};
use crate::providers::{ApiError, StatusProbe};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const API_BASE: &str = "https://api.twitch.tv/helix";
const GRANT_TYPE: &str = "client_credentials";
const TOKEN_ENDPOINT: &str = "oauth2/token";

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct DataEnvelope<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamRecord {
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
}

/// Helix client authenticated with an app access token.
///
/// The token is requested once and never refreshed. `close` drops the
/// connection pool; later calls fail with [`ApiError::Closed`].
pub struct TwitchClient {
    client_id: String,
    client_secret: String,
    endpoints: Endpoints,
    http: RwLock<Option<reqwest::Client>>,
    access_token: Mutex<Option<String>>,
}

impl TwitchClient {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self> {
        Self::with_endpoints(client_id, client_secret, timeout, Endpoints::default())
    }

    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        timeout: Duration,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client_id,
            client_secret,
            endpoints,
            http: RwLock::new(Some(http)),
            access_token: Mutex::new(None),
        })
    }

    /// Obtains the access token up front so bad credentials fail at startup.
    pub async fn initialize(&self) -> Result<(), ApiError> {
        self.access_token().await.map(|_| ())
    }

    pub fn profile_icon_path(login: &str) -> Option<PathBuf> {
        dirs::cache_dir().map(|p| p.join("stream-watch").join(format!("{login}.png")))
    }

    pub async fn download_profile_image(&self, url: &str, dest: &Path) -> Result<()> {
        let http = self.http().await?;
        let bytes = http
            .get(url)
            .send()
            .await
            .context("Failed to fetch profile image")?
            .error_for_status()
            .context("Profile image request rejected")?
            .bytes()
            .await
            .context("Failed to read profile image")?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        tracing::debug!(path = %dest.display(), bytes = bytes.len(), "Saved profile image");
        Ok(())
    }

    async fn http(&self) -> Result<reqwest::Client, ApiError> {
        self.http.read().await.clone().ok_or(ApiError::Closed)
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let mut token = self.access_token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }

        let fresh = self.request_token().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    async fn request_token(&self) -> Result<String, ApiError> {
        let http = self.http().await?;
        let response = http
            .post(&self.endpoints.token_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", GRANT_TYPE),
            ])
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: TOKEN_ENDPOINT,
                source,
            })?;

        let body: TokenResponse = check_status(TOKEN_ENDPOINT, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Decode {
                endpoint: TOKEN_ENDPOINT,
                source,
            })?;

        tracing::info!("Obtained Twitch app access token");
        Ok(body.access_token)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let http = self.http().await?;
        let token = self.access_token().await?;

        let response = http
            .get(format!("{}/{}", self.endpoints.api_base, endpoint))
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Request { endpoint, source })?;

        let envelope: DataEnvelope<T> = check_status(endpoint, response)
            .await?
            .json()
            .await
            .map_err(|source| ApiError::Decode { endpoint, source })?;

        Ok(envelope.data)
    }
}

async fn check_status(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::RateLimited { endpoint });
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        endpoint,
        status,
        body,
    })
}

#[async_trait]
impl StatusProbe for TwitchClient {
    async fn resolve(&self, username: &Username) -> Result<Option<Broadcaster>, ApiError> {
        let users: Vec<UserRecord> = self.get_data("users", &[("login", username.as_str())]).await?;

        Ok(users.into_iter().next().map(|user| Broadcaster {
            id: user.id,
            login: user.login,
            display_name: user.display_name,
            profile_image_url: user.profile_image_url.filter(|url| !url.is_empty()),
        }))
    }

    async fn live_info(&self, username: &Username) -> Result<LiveInfo, ApiError> {
        let streams: Vec<StreamRecord> = self
            .get_data("streams", &[("user_login", username.as_str())])
            .await?;

        Ok(streams
            .into_iter()
            .next()
            .map(|stream| LiveInfo {
                display_name: stream.user_name,
                title: stream.title,
                started_at: stream.started_at,
            })
            .unwrap_or_else(LiveInfo::offline))
    }

    async fn close(&self) {
        if self.http.write().await.take().is_some() {
            self.access_token.lock().await.take();
            tracing::info!("Twitch client closed");
        }
    }
}
