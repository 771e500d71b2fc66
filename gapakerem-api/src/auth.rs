use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use gapakerem_core::{AuthUser, CoreError, Role};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// Caller identity taken from a `Bearer` JWT
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub AuthUser);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || AppError::AuthenticationError("missing or invalid token".to_string());

        let token = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.auth.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            unauthorized()
        })?;

        let id = token_data.claims.sub.parse::<i32>().map_err(|_| unauthorized())?;
        Ok(Authenticated(AuthUser { id, role: token_data.claims.role }))
    }
}

/// Signs a token for `user` valid for `ttl_seconds`
pub fn issue_token(secret: &str, user: &AuthUser, ttl_seconds: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role,
        exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| CoreError::InternalError(format!("Token encoding failed: {}", e)).into())
}
