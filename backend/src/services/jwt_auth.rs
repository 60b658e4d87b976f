//! JWT Authentication
//!
//! Verifies the HS256 tokens issued by the dashboard's login backend. A token
//! is read from the `Authorization: Bearer` header, falling back to the
//! `auth-token` cookie set by the frontend.

use std::collections::HashSet;
use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::AppError;

/// Cookie consulted when no bearer token is present
pub const AUTH_COOKIE: &str = "auth-token";

/// Lifetime of tokens minted by [`JwtAuth::issue`]
const TOKEN_TTL_HOURS: i64 = 1;

/// Errors that can occur during token verification
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token found. Please login first.")]
    MissingToken,

    #[error("Token has expired. Please login again.")]
    Expired,

    #[error("Invalid token: missing userId")]
    MissingUserId,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token creation failed: {0}")]
    Encoding(String),

    #[error("Authentication service not configured")]
    NotConfigured,
}

impl AuthError {
    /// Stable name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "MissingToken",
            Self::Expired => "ExpiredSignature",
            Self::MissingUserId => "MissingUserId",
            Self::Invalid(_) => "InvalidToken",
            Self::Encoding(_) => "EncodingError",
            Self::NotConfigured => "NotConfigured",
        }
    }
}

/// The caller identified by a verified token
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Full token payload
    pub claims: Map<String, Value>,
}

impl AuthenticatedUser {
    fn from_claims(claims: Map<String, Value>) -> Result<Self, AuthError> {
        let user_id = claims
            .get("userId")
            .and_then(user_id_text)
            .ok_or(AuthError::MissingUserId)?;

        let text = |key: &str| claims.get(key).and_then(Value::as_str).map(String::from);

        Ok(Self {
            user_id,
            email: text("email"),
            username: text("username"),
            claims,
        })
    }
}

/// `userId` may be a string or a number; empty and zero values do not count
fn user_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// HS256 verifier and issuer
#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth").finish_non_exhaustive()
    }
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked when present but not required
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and identify its user
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })?;

        AuthenticatedUser::from_claims(data.claims)
    }

    /// Decode a token's payload without requiring `userId`
    pub fn decode_payload(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }

    /// Mint a token in the login backend's format, valid for one hour
    pub fn issue(&self, user_id: &str, email: &str, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("userId".to_string(), Value::from(user_id));
        claims.insert("email".to_string(), Value::from(email));
        claims.insert("username".to_string(), Value::from(username));
        claims.insert("iat".to_string(), Value::from(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            Value::from((now + Duration::hours(TOKEN_TTL_HOURS)).timestamp()),
        );

        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Map<String, Value>) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Verify the token carried by a request
    pub fn authenticate(&self, req: &HttpRequest) -> Result<AuthenticatedUser, AuthError> {
        let token = extract_token(req).ok_or(AuthError::MissingToken)?;
        tracing::debug!("Verifying token ({} bytes)", token.len());
        self.verify(&token)
    }
}

/// Extract Bearer token from Authorization header
///
/// Expected format: "Bearer <token>"
fn extract_bearer_token(req: &HttpRequest) -> Option<String> {
    let auth_header = req.headers().get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Check for "Bearer " prefix (case-insensitive)
    if auth_str.len() > 7 && auth_str[..7].eq_ignore_ascii_case("Bearer ") {
        Some(auth_str[7..].to_string())
    } else {
        None
    }
}

/// Bearer header first, then the `auth-token` cookie
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    extract_bearer_token(req).or_else(|| {
        req.cookie(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Guards a handler: the request must carry a valid token.
///
/// ```rust,ignore
/// pub async fn protected(user: AuthenticatedUser) -> Result<HttpResponse, AppError> {
///     // user.user_id is the caller
/// }
/// ```
impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<JwtAuth>>() {
            Some(auth) => auth.authenticate(req).map_err(|e| {
                tracing::debug!("Rejected {} {}: {}", req.method(), req.path(), e);
                AppError::from(e)
            }),
            None => {
                tracing::error!("JwtAuth not configured in app data");
                Err(AppError::from(AuthError::NotConfigured))
            }
        };

        ready(result)
    }
}
