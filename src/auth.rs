//! Bearer credentials for the management API: a client-secret exchange
//! against an OAuth2 token endpoint, and a fixed token.
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DnsError;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Cached tokens are replaced this many seconds before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for outgoing requests.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self) -> Result<AccessToken, DnsError>;
}

/// A token obtained elsewhere; never refreshed.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self) -> Result<AccessToken, DnsError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: DateTime::<Utc>::MAX_UTC,
        })
    }
}

/// Form body of a client-credentials token request.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds. Some endpoints send it as a string.
    pub expires_in: Seconds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn as_secs(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// OAuth2 error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Service-principal credential: tenant, client id and client secret.
///
/// A token is acquired on first use and reused until shortly before it
/// expires.
pub struct ClientSecretCredential {
    http: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        http: Client,
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority: authority.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }

    async fn request_token(&self) -> Result<AccessToken, DnsError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let res = self.http.post(self.token_url()).form(&form).send().await?;
        let status = res.status();
        debug!(tenant = %self.tenant_id, %status, "token request");

        if !status.is_success() {
            let message = match res.json::<TokenErrorResponse>().await {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => format!("token request failed with {status}"),
            };
            return Err(match status.as_u16() {
                400 | 401 | 403 => DnsError::AuthenticationFailed(message),
                code => DnsError::from_status(code, message),
            });
        }

        let body: TokenResponse = res.json().await?;
        let expires_at = body
            .expires_in
            .as_secs()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                DnsError::AuthenticationFailed("token response carries no usable expires_in".into())
            })?;
        Ok(AccessToken {
            token: body.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self) -> Result<AccessToken, DnsError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh_at(Utc::now())) {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = AccessToken {
            token: "t".into(),
            expires_at: now + TimeDelta::minutes(10),
        };
        assert!(token.is_fresh_at(now));
        assert!(!token.is_fresh_at(now + TimeDelta::minutes(6)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AccessToken {
            token: "secret-value".into(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{token:?}").contains("secret-value"));
    }

    #[test]
    fn test_expires_in_accepts_string() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": "3599"}"#,
        )
        .unwrap();
        assert_eq!(body.expires_in.as_secs(), Some(3599));
    }

    #[tokio::test]
    async fn test_static_token_never_expires() {
        let credential = StaticTokenCredential::new("fixed");
        let token = credential.get_token().await.unwrap();
        assert_eq!(token.token, "fixed");
        assert!(token.is_fresh_at(Utc::now()));
    }
}
