//! Prometheus metrics recorded by the service.
//!
//! The recorder itself is installed by the binary; without one these calls
//! are no-ops, which is what handler tests see.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::cache::CacheStats;

/// Record a call for `operation`.
pub fn record_request(operation: &str) {
    counter!("stmap_requests_total", "operation" => operation.to_string()).increment(1);
}

/// Record a failed call by error kind.
pub fn record_error(kind: &str) {
    counter!("stmap_errors_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_cache_hit() {
    counter!("stmap_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("stmap_cache_misses_total").increment(1);
}

/// Record how long a call for `operation` took end to end.
pub fn record_duration(operation: &str, elapsed: Duration) {
    histogram!("stmap_request_duration_seconds", "operation" => operation.to_string())
        .record(elapsed.as_secs_f64());
}

/// Publish the cache counters as gauges before a scrape.
pub fn update_cache_gauges(stats: &CacheStats) {
    use std::sync::atomic::Ordering;

    gauge!("stmap_cache_size_bytes").set(stats.size_bytes.load(Ordering::Relaxed) as f64);
    gauge!("stmap_cache_entries").set(stats.entry_count.load(Ordering::Relaxed) as f64);
    gauge!("stmap_cache_hit_rate_percent").set(stats.hit_rate());
    gauge!("stmap_cache_evictions").set(stats.evictions.load(Ordering::Relaxed) as f64);
}
