//! Per-tenant rate limiting.
//!
//! Each tenant gets its own `governor` quota of `security.rate_limit_per_minute`
//! requests. The middleware runs after authentication and reads the tenant
//! from request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, PoisonError, RwLock},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

type TenantRateLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const FALLBACK_LIMIT: NonZeroU32 = match NonZeroU32::new(120) {
    Some(n) => n,
    None => unreachable!(),
};

/// Limiters keyed by tenant id.
pub struct RateLimiterState {
    limiters: RwLock<HashMap<Uuid, Arc<TenantRateLimiter>>>,
    quota: Quota,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// A zero limit falls back to 120 requests per minute.
    pub fn new(rate_limit_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(rate_limit_per_minute).unwrap_or(FALLBACK_LIMIT);
        Self {
            limiters: RwLock::new(HashMap::new()),
            quota: Quota::per_minute(per_minute),
            rate_limit_per_minute: per_minute.get(),
        }
    }

    /// Effective requests per minute.
    pub fn limit(&self) -> u32 {
        self.rate_limit_per_minute
    }

    fn limiter_for(&self, tenant: Uuid) -> Arc<TenantRateLimiter> {
        {
            let limiters = self.limiters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(limiter) = limiters.get(&tenant) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(tenant)
            .or_insert_with(|| Arc::new(GovRateLimiter::direct(self.quota)))
            .clone()
    }

    /// `Err(retry_after_secs)` when the tenant is over quota.
    pub fn check(&self, tenant: Uuid) -> Result<(), u64> {
        match self.limiter_for(tenant).check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait.as_secs().max(1))
            }
        }
    }

    fn active_limiters(&self) -> usize {
        self.limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("active_limiters", &self.active_limiters())
            .finish()
    }
}

/// Applies the tenant quota. Requests without an authenticated tenant pass
/// through untouched.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };
    let Some(tenant) = req.extensions().get::<UserAuth>().map(|a| a.user_id) else {
        return next.run(req).await;
    };

    if let Err(retry_after) = limiter.check(tenant) {
        tracing::debug!(user_id = %tenant, retry_after, "Tenant rate limited");
        return rate_limited_response(retry_after);
    }

    next.run(req).await
}

fn rate_limited_response(retry_after: u64) -> Response {
    let mut response = ApiError::RateLimited.into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_zero_limit_falls_back() {
        assert_eq!(RateLimiterState::new(0).limit(), 120);
        assert_eq!(RateLimiterState::new(30).limit(), 30);
    }

    #[test]
    fn test_allows_within_quota() {
        let state = RateLimiterState::new(5);
        let tenant = Uuid::new_v4();
        for i in 0..5 {
            assert!(state.check(tenant).is_ok(), "request {} should pass", i);
        }
        let retry = state.check(tenant).unwrap_err();
        assert!(retry >= 1);
    }

    #[test]
    fn test_tenants_are_independent() {
        let state = RateLimiterState::new(1);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(state.check(a).is_ok());
        assert!(state.check(a).is_err());
        assert!(state.check(b).is_ok());
    }

    #[test]
    fn test_limiter_reused_per_tenant() {
        let state = RateLimiterState::new(100);
        let tenant = Uuid::new_v4();
        let first = state.limiter_for(tenant);
        let second = state.limiter_for(tenant);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &state.limiter_for(Uuid::new_v4())));
        assert_eq!(state.active_limiters(), 2);
    }

    #[test]
    fn test_debug_output() {
        let state = RateLimiterState::new(100);
        state.check(Uuid::new_v4()).unwrap();
        let debug = format!("{:?}", state);
        assert!(debug.contains("rate_limit_per_minute: 100"));
        assert!(debug.contains("active_limiters: 1"));
    }

    #[test]
    fn test_rate_limited_response() {
        let response = rate_limited_response(42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
