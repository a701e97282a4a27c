//! Lock-safe process metrics: counters, gauges, histograms, and timers.
//!
//! A [`Collector`] is an explicitly constructed registry — build one at
//! process start and share it as `Arc<Collector>` with the components that
//! record into it. Entries are created lazily by name and live for the
//! collector's lifetime; a metrics call never fails an observable operation.
//!
//! Histograms keep a bounded sliding window (oldest-first eviction), because
//! the review workload cares about current latency, not all-time history.

pub mod collector;
pub mod export;

pub use collector::{Collector, Counter, Gauge, Histogram, HistogramStats, TimerGuard};
pub use export::MetricsSnapshot;
