//! Authentication middleware
//!
//! Verifies the bearer JWT issued by the external auth service and makes the
//! acting user available to handlers. Every core operation receives the user
//! id explicitly from here; there is no ambient session.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        self.role == "admin" || self.permissions.contains(&format!("{}:{}", resource, action))
    }

    /// Permission guard for use in handlers
    pub fn require(&self, resource: &str, action: &str) -> Result<(), AppError> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a JWT into the acting user
pub fn authenticate(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
        permissions: claims.permissions,
    })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    match authenticate(token, &state.config.jwt.secret) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
            available: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| unauthorized_response("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, exp_offset: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role: "technician".to_string(),
            permissions: vec!["inventory:adjust".to_string()],
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_user() {
        let id = Uuid::new_v4();
        let user = authenticate(&token(&id.to_string(), 3600, "k"), "k").unwrap();
        assert_eq!(user.user_id, id);
        assert!(user.has_permission("inventory", "adjust"));
        assert!(!user.has_permission("reports", "read"));
        assert!(matches!(user.require("reports", "read"), Err(AppError::InsufficientPermissions)));
    }

    #[test]
    fn expired_and_foreign_tokens_rejected() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(authenticate(&token(&id, -3600, "k"), "k"), Err(AppError::TokenExpired)));
        assert!(matches!(authenticate(&token(&id, 3600, "other"), "k"), Err(AppError::InvalidToken)));
        assert!(matches!(authenticate(&token("not-a-uuid", 3600, "k"), "k"), Err(AppError::InvalidToken)));
    }
}
