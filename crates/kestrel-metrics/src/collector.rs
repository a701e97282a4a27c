use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default sliding-window capacity for histograms and timers.
pub const DEFAULT_HISTOGRAM_CAPACITY: usize = 1000;

/// Monotonic counter. Mutation is a single atomic primitive, no lock.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment by one.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by `n`.
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Arbitrary float gauge.
#[derive(Debug, Default)]
pub struct Gauge(Mutex<f64>);

impl Gauge {
    /// Set to `v`.
    pub fn set(&self, v: f64) {
        *self.lock() = v;
    }

    /// Increment by one.
    pub fn inc(&self) {
        *self.lock() += 1.0;
    }

    /// Decrement by one.
    pub fn dec(&self) {
        *self.lock() -= 1.0;
    }

    /// Add `v` (may be negative).
    pub fn add(&self, v: f64) {
        *self.lock() += v;
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, f64> {
        self.0.lock().expect("gauge lock poisoned")
    }
}

/// Summary statistics computed from one sorted snapshot of a histogram.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramStats {
    /// Samples currently in the window.
    pub count: usize,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub avg: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// Bounded sliding window of float samples with oldest-first eviction.
///
/// Percentiles are computed from the in-memory sample, not exact — recent
/// data is preferred over all-time history.
///
/// # Examples
///
/// ```
/// use kestrel_metrics::Histogram;
///
/// let hist = Histogram::new(3);
/// for v in [1.0, 2.0, 3.0, 4.0] {
///     hist.observe(v);
/// }
/// // capacity 3: the oldest sample (1.0) was evicted
/// assert_eq!(hist.stats().min, 2.0);
/// ```
#[derive(Debug)]
pub struct Histogram {
    capacity: usize,
    window: Mutex<VecDeque<f64>>,
}

impl Histogram {
    /// Create a histogram retaining at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record a sample, evicting the oldest once at capacity.
    pub fn observe(&self, v: f64) {
        let mut window = self.lock();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(v);
    }

    /// Percentile `p` (0–100) from a sorted snapshot, indexed at
    /// `floor((n-1) * p / 100)`. Values outside the range saturate at the
    /// smallest or largest sample. Returns `None` on an empty window.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let mut snapshot: Vec<f64> = self.lock().iter().copied().collect();
        if snapshot.is_empty() {
            return None;
        }
        snapshot.sort_by(|a, b| a.total_cmp(b));
        Some(percentile_of(&snapshot, p))
    }

    /// Count/min/max/avg/p50/p90/p99 from one sorted snapshot.
    pub fn stats(&self) -> HistogramStats {
        let mut snapshot: Vec<f64> = self.lock().iter().copied().collect();
        if snapshot.is_empty() {
            return HistogramStats::default();
        }
        snapshot.sort_by(|a, b| a.total_cmp(b));

        let count = snapshot.len();
        let sum: f64 = snapshot.iter().sum();
        HistogramStats {
            count,
            min: snapshot[0],
            max: snapshot[count - 1],
            avg: sum / count as f64,
            p50: percentile_of(&snapshot, 50.0),
            p90: percentile_of(&snapshot, 90.0),
            p99: percentile_of(&snapshot, 99.0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        self.window.lock().expect("histogram lock poisoned")
    }
}

fn percentile_of(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p / 100.0).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Handle returned by [`Collector::start_timer`]; records elapsed seconds
/// into the backing histogram when stopped.
#[must_use = "a timer that is never stopped records nothing"]
pub struct TimerGuard {
    histogram: Arc<Histogram>,
    started: Instant,
}

impl TimerGuard {
    /// Stop the timer, record elapsed seconds, and return the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.histogram.observe(elapsed.as_secs_f64());
        elapsed
    }
}

/// Registry of named metrics, safe for concurrent mutation from many
/// callers. Each entry is protected individually so contention on one metric
/// name never blocks another.
///
/// Construct one per process and share it by `Arc` — there is no implicit
/// global instance.
///
/// # Examples
///
/// ```
/// use kestrel_metrics::Collector;
///
/// let collector = Collector::new();
/// collector.inc_counter("reviews_total");
/// collector.inc_counter("reviews_total");
/// assert_eq!(collector.counter("reviews_total").value(), 2);
/// ```
pub struct Collector {
    started: Instant,
    histogram_capacity: usize,
    counters: RwLock<HashMap<String, Arc<Counter>>>,
    gauges: RwLock<HashMap<String, Arc<Gauge>>>,
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
    timers: RwLock<HashMap<String, Arc<Histogram>>>,
}

impl Collector {
    /// Create a collector with the default histogram capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTOGRAM_CAPACITY)
    }

    /// Create a collector whose histograms and timers retain `capacity`
    /// samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            started: Instant::now(),
            histogram_capacity: capacity.max(1),
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            timers: RwLock::new(HashMap::new()),
        }
    }

    /// Time since the collector was constructed.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fetch or lazily create the counter named `name`.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        lookup(&self.counters, name, || Arc::new(Counter::default()))
    }

    /// Fetch or lazily create the gauge named `name`.
    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        lookup(&self.gauges, name, || Arc::new(Gauge::default()))
    }

    /// Fetch or lazily create the histogram named `name`.
    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        let capacity = self.histogram_capacity;
        lookup(&self.histograms, name, || Arc::new(Histogram::new(capacity)))
    }

    /// Increment the counter named `name` by one.
    pub fn inc_counter(&self, name: &str) {
        self.counter(name).inc();
    }

    /// Add `n` to the counter named `name`.
    pub fn add_counter(&self, name: &str, n: u64) {
        self.counter(name).add(n);
    }

    /// Set the gauge named `name` to `v`.
    pub fn set_gauge(&self, name: &str, v: f64) {
        self.gauge(name).set(v);
    }

    /// Record a sample on the histogram named `name`.
    pub fn observe(&self, name: &str, v: f64) {
        self.histogram(name).observe(v);
    }

    /// Start a timer recording into the duration histogram named `name`.
    pub fn start_timer(&self, name: &str) -> TimerGuard {
        let capacity = self.histogram_capacity;
        let histogram = lookup(&self.timers, name, || Arc::new(Histogram::new(capacity)));
        TimerGuard {
            histogram,
            started: Instant::now(),
        }
    }

    pub(crate) fn counters_snapshot(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .expect("counter map lock poisoned")
            .iter()
            .map(|(name, counter)| (name.clone(), counter.value()))
            .collect()
    }

    pub(crate) fn gauges_snapshot(&self) -> Vec<(String, f64)> {
        self.gauges
            .read()
            .expect("gauge map lock poisoned")
            .iter()
            .map(|(name, gauge)| (name.clone(), gauge.value()))
            .collect()
    }

    pub(crate) fn histograms_snapshot(&self) -> Vec<(String, HistogramStats)> {
        self.histograms
            .read()
            .expect("histogram map lock poisoned")
            .iter()
            .map(|(name, hist)| (name.clone(), hist.stats()))
            .collect()
    }

    pub(crate) fn timers_snapshot(&self) -> Vec<(String, HistogramStats)> {
        self.timers
            .read()
            .expect("timer map lock poisoned")
            .iter()
            .map(|(name, hist)| (name.clone(), hist.stats()))
            .collect()
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<T: Clone>(
    map: &RwLock<HashMap<String, T>>,
    name: &str,
    create: impl FnOnce() -> T,
) -> T {
    {
        let map = map.read().expect("metric map lock poisoned");
        if let Some(entry) = map.get(name) {
            return entry.clone();
        }
    }
    let mut map = map.write().expect("metric map lock poisoned");
    map.entry(name.to_string()).or_insert_with(create).clone()
}
