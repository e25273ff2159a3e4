//! Tenant registration and login.

use domain::models::plan::FREE_PLAN_CODE;
use domain::models::User;
use persistence::repositories::{PlanRepository, UserRepository};
use shared::jwt::{JwtConfig, JwtError};
use shared::password::{check_password_strength, hash_password, verify_password, PasswordError};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

use crate::error::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Free plan is not configured")]
    MissingFreePlan,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => ApiError::Conflict(err.to_string()),
            AuthError::WeakPassword(reason) => ApiError::Validation(reason),
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::Database(e) => ApiError::from(e),
            AuthError::MissingFreePlan | AuthError::Token(_) | AuthError::Password(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// A signed-in tenant with its access token.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub access_token: String,
    pub expires_in: i64,
}

/// Registers tenants on the free plan and issues access tokens.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    plans: PlanRepository,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            plans: PlanRepository::new(pool),
            jwt,
        }
    }

    /// Creates a tenant on the free plan, credited with its monthly allowance.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AuthResult, AuthError> {
        check_password_strength(password).map_err(AuthError::WeakPassword)?;

        let email = email.trim().to_lowercase();
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let plan = self
            .plans
            .find_by_code(FREE_PLAN_CODE)
            .await?
            .ok_or(AuthError::MissingFreePlan)?;

        let password_hash = hash_password(password)?;
        let entity = self
            .users
            .create(
                &email,
                &password_hash,
                display_name.trim(),
                &plan.code,
                plan.monthly_credits,
            )
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                    AuthError::EmailAlreadyExists
                }
                _ => AuthError::Database(e),
            })?;

        tracing::info!(user_id = %entity.id, plan = %entity.plan_code, "Tenant registered");
        self.issue(entity.into())
    }

    /// Checks credentials. Unknown emails and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, AuthError> {
        let entity = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &entity.password_hash)? {
            tracing::debug!(user_id = %entity.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(entity.into())
    }

    fn issue(&self, user: User) -> Result<AuthResult, AuthError> {
        let (access_token, _jti) = self.jwt.generate_access_token(user.id)?;
        Ok(AuthResult {
            user,
            access_token,
            expires_in: self.jwt.access_token_expiry_secs,
        })
    }
}
