use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};

use crate::blocklist::IpBlocklist;
use crate::bucket::{Decision, LimiterSettings, RateLimiter};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

type KeyFn = dyn Fn(&Request) -> String + Send + Sync;
type SkipFn = dyn Fn(&Request) -> bool + Send + Sync;
type RejectFn = dyn Fn(&Decision) -> Response + Send + Sync;

/// Shared admission-control state for the [`rate_limit`] middleware.
///
/// Combines the token-bucket [`RateLimiter`], the [`IpBlocklist`], a key
/// extractor, an optional skip predicate, and an optional custom rejection
/// handler.
///
/// # Examples
///
/// ```
/// use kestrel_gate::{Gate, LimiterSettings};
/// use std::time::Duration;
///
/// let gate = Gate::new(LimiterSettings::default(), Duration::from_secs(300))
///     .with_skip(|req| req.uri().path() == "/healthz");
/// ```
pub struct Gate {
    limiter: RateLimiter,
    blocklist: IpBlocklist,
    key_fn: Box<KeyFn>,
    skip_fn: Option<Box<SkipFn>>,
    on_reject: Option<Box<RejectFn>>,
}

impl Gate {
    /// Create a gate with the default key extractor ([`ip_and_path`]).
    pub fn new(settings: LimiterSettings, auto_block_duration: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(settings),
            blocklist: IpBlocklist::new(auto_block_duration),
            key_fn: Box::new(ip_and_path),
            skip_fn: None,
            on_reject: None,
        }
    }

    /// Replace the limiter key extractor.
    pub fn with_key_fn(mut self, f: impl Fn(&Request) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Box::new(f);
        self
    }

    /// Exempt requests matching `f` before any bucket mutation.
    pub fn with_skip(mut self, f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.skip_fn = Some(Box::new(f));
        self
    }

    /// Replace the default 429 response. The handler owns the response
    /// entirely: the gate writes no status, headers, or body of its own.
    pub fn with_reject(
        mut self,
        f: impl Fn(&Decision) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.on_reject = Some(Box::new(f));
        self
    }

    /// The blocklist layer, for recording failed attempts at the ingress.
    pub fn blocklist(&self) -> &IpBlocklist {
        &self.blocklist
    }

    /// The token-bucket layer.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

/// Axum middleware applying the blocklist and token-bucket layers.
///
/// Install with `axum::middleware::from_fn_with_state(gate, rate_limit)`.
/// Admitted requests proceed downstream and receive `X-RateLimit-*` headers
/// reflecting the bucket state after consumption; rejected requests receive
/// HTTP 429 with a structured JSON body.
pub async fn rate_limit(State(gate): State<Arc<Gate>>, req: Request, next: Next) -> Response {
    if let Some(skip) = &gate.skip_fn {
        if skip(&req) {
            return next.run(req).await;
        }
    }

    let ip = client_ip(&req);
    if gate.blocklist.is_blocked(&ip) {
        tracing::warn!(ip, "rejecting request from blocked ip");
        let decision = Decision {
            allowed: false,
            limit: 0.0,
            remaining: 0.0,
            reset_after: Duration::ZERO,
        };
        return match &gate.on_reject {
            Some(reject) => reject(&decision),
            None => default_rejection(&decision, "IP temporarily blocked"),
        };
    }

    let key = (gate.key_fn)(&req);
    let decision = gate.limiter.check(&key);
    if !decision.allowed {
        tracing::debug!(key, "rate limit exceeded");
        return match &gate.on_reject {
            Some(reject) => reject(&decision),
            None => default_rejection(&decision, "Rate limit exceeded, retry later"),
        };
    }

    let mut response = next.run(req).await;
    apply_headers(&mut response, &decision);
    response
}

/// Default limiter key: client IP plus request path.
pub fn ip_and_path(req: &Request) -> String {
    format!("{}:{}", client_ip(req), req.uri().path())
}

/// Alternative limiter key: SHA-256 of the bearer token, falling back to the
/// client IP for unauthenticated requests. The raw token never becomes a map
/// key.
pub fn bearer_token_or_ip(req: &Request) -> String {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) => {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            format!("token:{}", &digest[..16])
        }
        None => client_ip(req),
    }
}

fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn default_rejection(decision: &Decision, message: &str) -> Response {
    let body = serde_json::json!({
        "error": "Too Many Requests",
        "message": message,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_headers(&mut response, decision);
    response
}

fn apply_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    let values = [
        (LIMIT_HEADER, format!("{:.0}", decision.limit)),
        (REMAINING_HEADER, format!("{}", decision.remaining.floor() as u64)),
        (RESET_HEADER, format!("{}", decision.reset_after.as_secs_f64().ceil() as u64)),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}
