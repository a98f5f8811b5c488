//! HTTP client for the Linkori token endpoints.
//!
//! `AuthClient` is the seam the session manager talks through: verify a
//! bearer credential, or exchange the ambient refresh cookie for a new one.
//! `HttpAuthClient` implements it with reqwest and also carries the few
//! account calls the frontend makes directly (provider login URLs, OAuth
//! callbacks, the current user).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{cookie::Jar, Client, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::is_compact_token;
use crate::config::Config;
use crate::models::UserProfile;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const VERIFY_PATH: &str = "/api/token/verify/";
const REFRESH_PATH: &str = "/api/token/refresh/";
const USER_PATH: &str = "/accounts/user/";

/// Status value the account endpoints use for success
const STATUS_SUCCESS: &str = "success";

// ============================================================================
// Contract
// ============================================================================

/// Outcome of checking a credential with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verification {
    pub valid: bool,
    /// Both identity providers are linked. Only meaningful when `valid`.
    pub linked: bool,
}

impl Verification {
    pub fn valid(linked: bool) -> Self {
        Self { valid: true, linked }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Remote authority for bearer credentials.
///
/// Implementations must bound every call with a timeout so callers always
/// get an answer.
pub trait AuthClient: Send + Sync + 'static {
    /// Check a credential. Structurally malformed tokens and remote
    /// rejections are `Ok(Verification::invalid())`; `Err` means the check
    /// itself failed.
    fn verify(&self, token: &str) -> impl Future<Output = Result<Verification, ApiError>> + Send;

    /// Obtain a new credential from the ambient refresh session.
    fn refresh(&self) -> impl Future<Output = Result<String, ApiError>> + Send;
}

impl<T: AuthClient> AuthClient for Arc<T> {
    fn verify(&self, token: &str) -> impl Future<Output = Result<Verification, ApiError>> + Send {
        (**self).verify(token)
    }

    fn refresh(&self) -> impl Future<Output = Result<String, ApiError>> + Send {
        (**self).refresh()
    }
}

/// Identity providers the backend can link to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Osu,
    Discord,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Osu => "osu",
            Provider::Discord => "discord",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Osu => "osu!",
            Provider::Discord => "Discord",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "osu" | "osu!" => Ok(Provider::Osu),
            "discord" => Ok(Provider::Discord),
            other => Err(anyhow::anyhow!("Unknown provider: {}", other)),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default, alias = "is_linked")]
    linked: bool,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginUrlResponse {
    status: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackResponse {
    status: String,
    access: Option<String>,
    message: Option<String>,
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// reqwest-backed client.
/// Clone is cheap - reqwest::Client and the cookie jar are shared.
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
    cookies: Arc<Jar>,
}

impl HttpAuthClient {
    /// Create a client with its own empty cookie jar
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::with_cookie_jar(base_url, timeout, Arc::new(Jar::default()), false)
    }

    /// Create a client sharing an existing cookie jar. The jar holds the
    /// refresh session the backend set at login.
    pub fn with_cookie_jar(
        base_url: &str,
        timeout: Duration,
        cookies: Arc<Jar>,
        accept_invalid_certs: bool,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&cookies))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookies,
        })
    }

    /// Build from configuration, seeding the refresh cookie if one is set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Self::with_cookie_jar(
            &config.api_url,
            config.request_timeout(),
            Arc::new(Jar::default()),
            config.accept_invalid_certs,
        )?;
        if let Some(ref cookie) = config.refresh_cookie {
            client.add_cookie(cookie)?;
        }
        Ok(client)
    }

    /// Add a `name=value` cookie scoped to the API origin.
    pub fn add_cookie(&self, cookie: &str) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API URL {}: {}", self.base_url, e))?;
        self.cookies.add_cookie_str(cookie, &url);
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Fetch the provider's authorization URL. Passing the current
    /// credential as `state` links the provider to the signed-in account.
    pub async fn login_url(
        &self,
        provider: Provider,
        state: Option<&str>,
    ) -> Result<String, ApiError> {
        let url = self.url(&format!("/accounts/{}/login/", provider));
        let response = self
            .client
            .get(&url)
            .query(&[("state", state.unwrap_or(""))])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let parsed: LoginUrlResponse = Self::parse_json(response).await?;

        match parsed.url {
            Some(url) if parsed.status == STATUS_SUCCESS => Ok(url),
            _ => Err(ApiError::InvalidResponse(format!(
                "Could not get {} login URL (status {})",
                provider.display_name(),
                parsed.status
            ))),
        }
    }

    /// Exchange an OAuth callback code for an access token.
    pub async fn callback(&self, provider: Provider, code: &str) -> Result<String, ApiError> {
        let url = self.url(&format!("/accounts/{}/callback/", provider));
        let response = self.client.get(&url).query(&[("code", code)]).send().await?;

        let response = Self::check_response(response).await?;
        let parsed: CallbackResponse = Self::parse_json(response).await?;

        match parsed.access {
            Some(access) if parsed.status == STATUS_SUCCESS && !access.is_empty() => Ok(access),
            _ => Err(ApiError::InvalidResponse(
                parsed
                    .message
                    .unwrap_or_else(|| format!("{} callback failed", provider.display_name())),
            )),
        }
    }

    /// Fetch the account behind `token`.
    pub async fn fetch_user(&self, token: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .get(self.url(USER_PATH))
            .bearer_auth(token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }
}

impl AuthClient for HttpAuthClient {
    async fn verify(&self, token: &str) -> Result<Verification, ApiError> {
        if !is_compact_token(token) {
            debug!("Credential is not a compact token, skipping remote verify");
            return Ok(Verification::invalid());
        }

        let response = self
            .client
            .post(self.url(VERIFY_PATH))
            .json(&VerifyRequest { token })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            let parsed = if text.trim().is_empty() {
                VerifyResponse::default()
            } else {
                serde_json::from_str::<VerifyResponse>(&text)
                    .map_err(|e| ApiError::InvalidResponse(e.to_string()))?
            };
            if parsed.valid == Some(false) {
                return Ok(Verification::invalid());
            }
            Ok(Verification::valid(parsed.linked))
        } else if matches!(status.as_u16(), 400 | 401 | 403) {
            debug!(status = %status, "Credential rejected by verify endpoint");
            Ok(Verification::invalid())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn refresh(&self) -> Result<String, ApiError> {
        let response = self.client.post(self.url(REFRESH_PATH)).send().await?;

        let response = Self::check_response(response).await?;
        let parsed: RefreshResponse = Self::parse_json(response).await?;

        match parsed.access {
            Some(access) if !access.is_empty() => Ok(access),
            _ => {
                warn!("Refresh response carried no access token");
                Err(ApiError::InvalidResponse(
                    "Refresh response missing access token".to_string(),
                ))
            }
        }
    }
}
