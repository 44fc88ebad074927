//! Identity token issue and verification.
//!
//! Tokens are HS256 JWTs signed with `secret_key`. Verification pins the algorithm, the
//! issuer, the audience and the expiry; any failure yields [`Error::Unauthenticated`] with a
//! short reason, never a partially trusted identity.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    auth::current_user::AuthenticatedUser,
    config::{Config, TokenConfig},
    errors::Error,
    types::{RoleId, UserId},
};

/// The only algorithm tokens are signed with or accepted under
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT identity claims
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,             // Subject (username)
    pub uid: UserId,             // User ID
    pub role_id: Option<RoleId>, // Role the caller acts under
    pub iss: String,             // Issuer
    pub aud: String,             // Audience
    pub exp: i64,                // Expiration time
    pub iat: i64,                // Issued at
}

impl TokenClaims {
    pub fn new(user: &AuthenticatedUser, config: &TokenConfig) -> Self {
        let now = Utc::now();
        let exp = now + config.expiry;

        Self {
            sub: user.username.clone(),
            uid: user.id,
            role_id: user.role_id,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<TokenClaims> for AuthenticatedUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.uid,
            username: claims.sub,
            role_id: claims.role_id,
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign identity token: secret_key is required".to_string(),
    })
}

fn validation(config: &TokenConfig) -> Validation {
    let mut validation = Validation::new(TOKEN_ALGORITHM);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.leeway = 0;
    validation
}

/// Issue a token for an authenticated user
pub fn create_token(user: &AuthenticatedUser, config: &Config) -> Result<String, Error> {
    let claims = TokenClaims::new(user, &config.auth.token);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());

    encode(&Header::new(TOKEN_ALGORITHM), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify a token and recover the identity it carries
pub fn verify_token(token: &str, config: &Config) -> Result<AuthenticatedUser, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());

    let token_data = decode::<TokenClaims>(token, &key, &validation(&config.auth.token)).map_err(|e| {
        tracing::debug!(error = %e, "Token verification failed");
        let reason = match e.kind() {
            ErrorKind::ExpiredSignature => "token has expired",
            ErrorKind::InvalidAlgorithm => "signing algorithm not accepted",
            ErrorKind::InvalidSignature => "invalid signature",
            ErrorKind::InvalidIssuer => "unexpected issuer",
            ErrorKind::InvalidAudience => "unexpected audience",
            ErrorKind::MissingRequiredClaim(_) => "missing required claim",
            ErrorKind::ImmatureSignature => "token not yet valid",
            // Malformed segments, unknown algorithm names, bad JSON and the rest
            _ => "malformed token",
        };
        Error::Unauthenticated {
            message: Some(format!("Invalid token: {reason}")),
        }
    })?;

    Ok(AuthenticatedUser::from(token_data.claims))
}
