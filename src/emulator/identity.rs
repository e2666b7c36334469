//! Token endpoint and bearer-token extractor of the emulator.
use std::future::Future;

use axum::{
    Extension, Form, Json,
    extract::{FromRequestParts, Path},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use chrono::{TimeDelta, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{info, warn};

use super::SharedState;
use crate::auth::{Seconds, TokenErrorResponse, TokenRequest, TokenResponse};
use crate::error::DnsError;

/// Lifetime of issued tokens.
pub const TOKEN_LIFETIME_SECS: i64 = 3599;

const TOKEN_BYTES: usize = 32;

/// Opaque bearer token built from OS randomness.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Marker extractor: the request carried a bearer token this emulator
/// issued or was configured with.
pub struct Authenticated;

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = DnsError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> {
        Box::pin(async move {
            let Extension(app_state): Extension<SharedState> =
                Extension::from_request_parts(parts, state)
                    .await
                    .map_err(|_| DnsError::unknown("missing state"))?;

            let auth_header = parts
                .headers
                .get(header::AUTHORIZATION)
                .ok_or_else(|| {
                    DnsError::AuthenticationFailed(
                        "The request does not carry an Authorization header.".into(),
                    )
                })?
                .to_str()
                .map_err(|_| DnsError::Invalid("invalid Authorization header".into()))?;

            let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
                DnsError::AuthenticationFailed("Expected a Bearer authorization scheme.".into())
            })?;

            if !app_state.accepts_token(token.trim()) {
                return Err(DnsError::AuthenticationFailed(
                    "The access token is invalid or has expired.".into(),
                ));
            }
            Ok(Authenticated)
        })
    }
}

fn token_error(status: StatusCode, error: &str, description: String) -> Response {
    (
        status,
        Json(TokenErrorResponse {
            error: error.to_string(),
            error_description: Some(description),
        }),
    )
        .into_response()
}

// POST /{tenant_id}/oauth2/v2.0/token
pub async fn issue_token(
    Extension(state): Extension<SharedState>,
    Path(tenant_id): Path<String>,
    Form(req): Form<TokenRequest>,
) -> Response {
    if req.grant_type != "client_credentials" {
        return token_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            format!("The grant type '{}' is not supported.", req.grant_type),
        );
    }

    let Some(principal) = state
        .config
        .credentials
        .iter()
        .find(|c| c.tenant_id == tenant_id && c.client_id == req.client_id)
    else {
        warn!(%tenant_id, client_id = %req.client_id, "token request for unknown client");
        return token_error(
            StatusCode::BAD_REQUEST,
            "unauthorized_client",
            format!(
                "Application with identifier '{}' was not found in the directory '{tenant_id}'.",
                req.client_id
            ),
        );
    };

    if principal.client_secret != req.client_secret {
        warn!(%tenant_id, client_id = %req.client_id, "token request with invalid secret");
        return token_error(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "Invalid client secret provided.".to_string(),
        );
    }

    let now = Utc::now();
    let token = generate_token();
    state.remember_token(token.clone(), now + TimeDelta::seconds(TOKEN_LIFETIME_SECS));
    info!(%tenant_id, client_id = %req.client_id, "issued access token");

    Json(TokenResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: Seconds::Number(TOKEN_LIFETIME_SECS),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_random_and_opaque() {
        let first = generate_token();
        let second = generate_token();
        assert_ne!(first, second);

        let bytes = BASE64.decode(&first).unwrap();
        assert_eq!(bytes.len(), TOKEN_BYTES);
    }
}
