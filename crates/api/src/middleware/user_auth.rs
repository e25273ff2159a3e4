//! Bearer JWT authentication for tenant routes.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::jwt::{JwtConfig, JwtError};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated tenant, inserted into request extensions by [`require_user_auth`].
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// Tenant (user) id from the `sub` claim.
    pub user_id: Uuid,
    /// Token id.
    pub jti: String,
}

impl UserAuth {
    /// Validates an access token.
    pub fn validate(jwt: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt.validate_access_token(token)?;
        Ok(UserAuth {
            user_id: claims.user_id()?,
            jti: claims.jti,
        })
    }

    /// Reads and validates the `Authorization: Bearer` header.
    pub fn from_headers(jwt: &JwtConfig, headers: &HeaderMap) -> Result<Self, ApiError> {
        let token = bearer_token(headers).ok_or_else(|| {
            ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

        Self::validate(jwt, token).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            match e {
                JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
                _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
            }
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid access token.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match UserAuth::from_headers(&state.jwt, req.headers()) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn jwt() -> JwtConfig {
        JwtConfig::with_secret("test-secret-for-unit-tests", 3600)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_token() {
        let jwt = jwt();
        let user_id = Uuid::new_v4();
        let (token, jti) = jwt.generate_access_token(user_id).unwrap();

        let auth = UserAuth::from_headers(&jwt, &headers(&format!("Bearer {}", token))).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.jti, jti);
    }

    #[test]
    fn test_missing_header() {
        let err = UserAuth::from_headers(&jwt(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_wrong_scheme_and_garbage_token() {
        assert!(UserAuth::from_headers(&jwt(), &headers("Basic abc")).is_err());
        assert!(UserAuth::from_headers(&jwt(), &headers("Bearer not-a-jwt")).is_err());
        assert!(UserAuth::from_headers(&jwt(), &headers("Bearer ")).is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = JwtConfig::with_secret("another-secret", 3600);
        let (token, _) = other.generate_access_token(Uuid::new_v4()).unwrap();
        assert!(UserAuth::from_headers(&jwt(), &headers(&format!("Bearer {}", token))).is_err());
    }
}
