//! Connection authentication.
//!
//! The access token is read from the configured cookie or from an
//! `Authorization: Bearer` header, then validated as an HS256 JWT.

use crate::config::AuthConfig;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use roomcast_core::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token in the cookie or the `Authorization` header.
    #[error("Failed to get access token")]
    MissingCredential,

    /// The token failed validation.
    #[error("Failed to validate token: {0}")]
    InvalidToken(String),

    /// A refresh token was presented instead of an access token.
    #[error("Refresh tokens cannot open a connection")]
    RefreshToken,
}

impl AuthError {
    /// HTTP status for the rejected upgrade.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::BAD_REQUEST,
            Self::InvalidToken(_) | Self::RefreshToken => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "auth_missing",
            Self::InvalidToken(_) => "auth_invalid",
            Self::RefreshToken => "auth_refresh",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// The caller behind a validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
}

/// Validates connection credentials.
pub trait Authenticator: Send + Sync {
    /// Validate `credential` and return the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the credential is not acceptable.
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Set on refresh tokens.
    #[serde(rename = "isRefresh", default)]
    pub is_refresh: bool,
}

/// HS256 JWT validation.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Validate tokens signed with `secret`, optionally requiring `issuer`.
    #[must_use]
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            // A token without `iss` is not checked against the issuer.
            validation.set_required_spec_claims(&["exp", "iss"]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Build from the `[auth]` section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.as_deref())
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if data.claims.is_refresh {
            return Err(AuthError::RefreshToken);
        }
        if data.claims.user_id.is_empty() {
            return Err(AuthError::InvalidToken("empty userId".to_string()));
        }

        Ok(Identity {
            user_id: data.claims.user_id,
        })
    }
}

/// Find the access token in the request headers.
///
/// The cookie named `cookie_name` wins over an `Authorization: Bearer`
/// header.
#[must_use]
pub fn extract_credential(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}
