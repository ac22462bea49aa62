//! Security Middleware for the Catalog API
//!
//! Layers applied around every router:
//! - API key check: the gateway that forwards principal headers holds the key
//! - Per-caller rate limiting (principal id when present, client IP otherwise)
//! - Request body size limit
//! - Response security headers
//! - Request logging with IP masking
//!
//! Rejections use the same `{ "error", "message" }` body as [`ApiError`].
//!
//! [`ApiError`]: crate::api::ApiError

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::api::error::ErrorBody;
use crate::api::principal::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};

/// Security configuration for middleware
#[derive(Debug, Clone)]
pub struct SecurityMiddlewareConfig {
    /// Require a gateway API key on non-public routes
    pub enable_auth: bool,
    /// Accepted gateway keys
    pub api_keys: Vec<String>,
    /// Requests per minute per caller
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    pub log_requests: bool,
    /// Mask client IPs in request logs
    pub sanitize_logs: bool,
    /// Path prefixes reachable without a key
    pub public_paths: Vec<String>,
}

impl Default for SecurityMiddlewareConfig {
    fn default() -> Self {
        Self {
            enable_auth: true,
            api_keys: Vec::new(),
            rate_limit_per_minute: 120,
            max_request_size: 64 * 1024, // 64KB
            log_requests: true,
            sanitize_logs: true,
            public_paths: default_public_paths(),
        }
    }
}

/// Routes reachable without an API key
pub fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/clients/register".to_string(),
        "/prices/".to_string(),
    ]
}

/// Fixed-window request counter per caller key
#[derive(Debug)]
pub struct RateLimiter {
    /// caller key -> (requests in window, window start)
    windows: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

/// Verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after_secs: u64,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            windows: DashMap::new(),
            limit: requests_per_minute,
            window: Duration::from_secs(60),
        }
    }

    /// Count a request for `key` and report whether it fits the window
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut slot = self.windows.entry(key.to_string()).or_insert((0, now));
        let (count, started) = slot.value_mut();

        if now.duration_since(*started) >= self.window {
            *count = 0;
            *started = now;
        }

        let reset_after_secs = self
            .window
            .saturating_sub(now.duration_since(*started))
            .as_secs();

        if *count >= self.limit {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_after_secs,
            };
        }

        *count += 1;
        RateDecision {
            allowed: true,
            remaining: self.limit - *count,
            reset_after_secs,
        }
    }

    /// Drop windows idle for more than two periods; returns how many
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, (_, started)| now.duration_since(*started) < self.window * 2);
        before.saturating_sub(self.windows.len())
    }

    /// Run `cleanup` every `interval` for the life of the process
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.cleanup();
                if removed > 0 {
                    debug!(removed, "Rate limiter windows expired");
                }
            }
        })
    }
}

/// Shared state for security middleware
#[derive(Clone)]
pub struct SecurityState {
    pub config: SecurityMiddlewareConfig,
    pub rate_limiter: Arc<RateLimiter>,
}

impl SecurityState {
    pub fn new(config: SecurityMiddlewareConfig) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));
        Self {
            config,
            rate_limiter,
        }
    }
}

fn reject(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error,
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP, preferring the proxy headers set by the gateway
fn client_ip(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .or_else(|| header_str(headers, "x-real-ip").map(str::to_string))
        .or_else(|| addr.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Authenticated callers are limited individually, anonymous ones per IP
fn rate_limit_key(headers: &HeaderMap, addr: Option<&SocketAddr>) -> String {
    match header_str(headers, PRINCIPAL_ID_HEADER) {
        Some(id) => format!("principal:{}", id),
        None => format!("ip:{}", client_ip(headers, addr)),
    }
}

/// Mask a value for logging, keeping four characters at each end
pub fn sanitize_for_log(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn is_public_path(path: &str, public_paths: &[String]) -> bool {
    public_paths.iter().any(|p| path.starts_with(p.as_str()))
}

/// Require a gateway API key (`x-api-key` or `Authorization: Bearer`)
pub async fn auth_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let path = request.uri().path().to_string();
    if !state.config.enable_auth || is_public_path(&path, &state.config.public_paths) {
        return Ok(next.run(request).await);
    }

    let presented = header_str(&headers, "x-api-key").or_else(|| {
        header_str(&headers, "authorization").and_then(|v| v.strip_prefix("Bearer "))
    });

    match presented {
        Some(key) if state.config.api_keys.iter().any(|k| k == key) => {
            debug!(path = %path, "Gateway key accepted");
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!(path = %path, "Rejected request with unknown API key");
            Err(reject(StatusCode::UNAUTHORIZED, "unauthenticated", "invalid API key"))
        }
        None => {
            warn!(path = %path, "Rejected request without API key");
            Err(reject(StatusCode::UNAUTHORIZED, "unauthenticated", "API key required"))
        }
    }
}

fn insert_rate_headers(headers: &mut HeaderMap, limit: u32, decision: &RateDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_after_secs));
}

pub async fn rate_limit_middleware(
    State(state): State<SecurityState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let key = rate_limit_key(&headers, Some(&addr));
    let decision = state.rate_limiter.check(&key);
    let limit = state.config.rate_limit_per_minute;

    if !decision.allowed {
        warn!(path = %request.uri().path(), "Rate limit exceeded");
        let mut response = reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            format!("retry in {} seconds", decision.reset_after_secs),
        );
        insert_rate_headers(response.headers_mut(), limit, &decision);
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from(decision.reset_after_secs));
        return response;
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), limit, &decision);
    response
}

const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("X-Frame-Options", "DENY"),
    ("X-Content-Type-Options", "nosniff"),
    (
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains",
    ),
    // JSON only: nothing may be loaded or framed
    ("Content-Security-Policy", "default-src 'none'; frame-ancestors 'none'"),
    ("Referrer-Policy", "no-referrer"),
    ("Cache-Control", "no-store"),
];

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers.remove("Server");
    response
}

/// Request logging; the level follows the response status class
pub async fn logging_middleware(
    State(state): State<SecurityState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let role = header_str(&headers, PRINCIPAL_ROLE_HEADER)
        .unwrap_or("anonymous")
        .to_string();
    let ip = client_ip(&headers, Some(&addr));
    let ip = if state.config.sanitize_logs {
        sanitize_for_log(&ip)
    } else {
        ip
    };

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match status {
        500..=599 => error!(%method, %path, status, elapsed_ms, role = %role, client_ip = %ip, "Request failed"),
        400..=499 => warn!(%method, %path, status, elapsed_ms, role = %role, client_ip = %ip, "Request rejected"),
        _ => info!(%method, %path, status, elapsed_ms, role = %role, client_ip = %ip, "Request completed"),
    }

    response
}

/// Refuse bodies whose declared length exceeds `max_request_size`
pub async fn body_size_middleware(
    State(state): State<SecurityState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let declared = header_str(&headers, "content-length").and_then(|v| v.parse::<usize>().ok());
    let max = state.config.max_request_size;

    if let Some(length) = declared.filter(|&len| len > max) {
        warn!(length, max, "Request body too large");
        return Err(reject(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("request body exceeds {} bytes", max),
        ));
    }

    Ok(next.run(request).await)
}
