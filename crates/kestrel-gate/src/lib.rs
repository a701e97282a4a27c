//! Admission control at the network ingress.
//!
//! Two independent layers protect the review service:
//! - [`RateLimiter`] — per-key token buckets for smooth, burst-tolerant
//!   traffic shaping (fail closed: an empty bucket always rejects).
//! - [`IpBlocklist`] — escalation for repeated failed attempts (bad webhook
//!   signatures, auth failures), blocking an IP outright for a period.
//!
//! [`middleware`] wires both into an axum router with the standard
//! `X-RateLimit-*` header contract and a structured 429 response.

pub mod blocklist;
pub mod bucket;
pub mod middleware;

pub use blocklist::IpBlocklist;
pub use bucket::{Decision, LimiterSettings, RateLimiter};
pub use middleware::{bearer_token_or_ip, ip_and_path, rate_limit, Gate};
