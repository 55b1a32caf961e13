//! Access tokens.
//!
//! Users are authenticated by an external identity service, which issues HS256 JSON Web Tokens signed with the shared
//! `SPG_JWT_SECRET`. The server only verifies them. Tokens are read from the `spg_access_token` header, or from a
//! standard `Authorization: Bearer` header.
use std::{
    future::{ready, Ready},
    time::Duration,
};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use storefront_payment_engine::db_types::{Requester, Role};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const ACCESS_TOKEN_HEADER: &str = "spg_access_token";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id of the account the token was issued to
    pub sub: String,
    pub roles: Vec<Role>,
    /// Expiry, as a unix timestamp
    pub exp: i64,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(sub: S, roles: Vec<Role>, lifetime: Duration) -> Self {
        let exp = Utc::now().timestamp() + lifetime.as_secs() as i64;
        Self { sub: sub.into(), roles, exp }
    }
}

impl From<JwtClaims> for Requester {
    fn from(claims: JwtClaims) -> Self {
        Requester::new(claims.sub, claims.roles)
    }
}

impl From<&JwtClaims> for Requester {
    fn from(claims: &JwtClaims) -> Self {
        Requester::new(claims.sub.clone(), claims.roles.clone())
    }
}

/// Claims are put into the request extensions by the JWT middleware. Handlers that take `JwtClaims` as an argument
/// are therefore only reachable with a valid token.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("🔐️ No JWT claims found in request extensions");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

/// Signs and verifies access tokens with the HS256 shared secret.
#[derive(Clone)]
pub struct JwtAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthority {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a new access token for the given user. `lifetime` defaults to 24 hours.
    pub fn issue_token(&self, user_id: &str, roles: Vec<Role>, lifetime: Option<Duration>) -> Result<String, AuthError> {
        let claims = JwtClaims::new(user_id, roles, lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME));
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(format!("Could not sign token. {e}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔐️ Access token validated for {}", data.claims.sub);
        Ok(data.claims)
    }
}

/// Pulls the raw access token out of the request headers, if there is one.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(token) = req.headers().get(ACCESS_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim().to_string());
    }
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}
