use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    net::SocketAddr,
    time::{Duration, Instant},
};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use tokio::sync::Mutex;

use crate::{config::RateLimitConfig, state::AppState};

/// Sliding-window limiter keyed by client address. Every attempt inside the
/// window counts, including the ones that get rejected; a key never holds
/// more than `max_requests` timestamps.
pub struct RateLimiter {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            hits: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_requests, Duration::from_secs(cfg.window_secs))
    }

    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    pub async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut lock = self.hits.lock().await;
        // drop idle keys so the map does not grow with every address ever seen
        let window = self.window;
        lock.retain(|_, q| {
            q.back()
                .map(|last| now.saturating_duration_since(*last) < window)
                .unwrap_or(false)
        });

        let queue = lock.entry(key.to_string()).or_default();
        while let Some(front) = queue.front() {
            if now.saturating_duration_since(*front) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }
        let allowed = queue.len() < self.max_requests;
        if !allowed {
            // a rejected attempt replaces the oldest hit, keeping the lockout fresh
            queue.pop_front();
        }
        queue.push_back(now);
        allowed
    }
}

/// Source address of the caller. `X-Forwarded-For` is only honoured when
/// the service is configured to sit behind a trusted proxy; otherwise the
/// peer address of the connection is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts, state.config.trust_proxy_headers)))
    }
}

fn client_ip(parts: &Parts, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = normalized_forwarded_for(&parts.headers) {
            return ip;
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn normalized_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(first.to_string())
    } else {
        None
    }
}
