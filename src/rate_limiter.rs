//! Fixed-window rate limiting, per actor per route.
//!
//! Bounds abuse, not correctness: the counter is in-process and resets on
//! restart. The window key prefers a digest of the bearer credential (one
//! window per actor, token never stored) and falls back to the forwarded
//! client address. Elapsed windows are swept periodically.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::ServiceError;

/// Every this many checks, elapsed windows are swept from the map.
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
    checks: AtomicU64,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Drop windows whose period has fully elapsed. Called periodically
    /// from [`check`](Self::check) so the map stays bounded by the set of
    /// actors active within one window.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started_at) < self.config.window);
    }

    /// Number of windows currently tracked.
    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }

    /// Count a hit against the actor+route window and decide.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.evict_expired();
        }

        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.config.window {
            entry.started_at = now;
            entry.count = 0;
        }

        entry.count += 1;
        let allowed = entry.count <= self.config.requests_per_window;
        let remaining = self.config.requests_per_window.saturating_sub(entry.count);
        let elapsed = now.duration_since(entry.started_at);
        let retry_after = self.config.window.saturating_sub(elapsed);

        RateLimitDecision {
            allowed,
            remaining,
            retry_after,
        }
    }

    pub fn limit(&self) -> u32 {
        self.config.requests_per_window
    }
}

/// Non-cryptographic digest so bearer tokens are never stored as map keys.
fn hash_credential(value: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn actor_key(request: &Request) -> String {
    if let Some(auth) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return hash_credential(auth);
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

/// Middleware enforcing the fixed-window limit.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = format!("{}:{}", actor_key(&request), request.uri().path());
    let decision = limiter.check(&key);

    if !decision.allowed {
        let mut response = ServiceError::RateLimitExceeded.into_response();
        let headers = response.headers_mut();
        headers.insert(
            "Retry-After",
            decision.retry_after.as_secs().max(1).into(),
        );
        headers.insert("X-RateLimit-Limit", limiter.limit().into());
        headers.insert("X-RateLimit-Remaining", axum::http::HeaderValue::from(0u32));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", limiter.limit().into());
    headers.insert("X-RateLimit-Remaining", decision.remaining.into());
    response
}
