//! Metrics collection using metrics-rs.

use metrics::{Counter, Gauge, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const MAPPINGS_CREATED: &str = "pinax_mappings_created";
const MAPPINGS_RELEASED: &str = "pinax_mappings_released";
const USER_PINS: &str = "pinax_user_pins";
const USER_UNPINS: &str = "pinax_user_unpins";
const SUBMIT_PINS: &str = "pinax_submit_pins";
const SUBMIT_UNPINS: &str = "pinax_submit_unpins";
const BATCH_ROLLBACKS: &str = "pinax_batch_rollbacks";
const REFCOUNT_CLAMPS: &str = "pinax_refcount_clamps";
const ACTIVE_MAPPINGS: &str = "pinax_active_mappings";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    // Describe all metrics
    metrics::describe_counter!(
        MAPPINGS_CREATED,
        Unit::Count,
        "Total DMA mappings established"
    );
    metrics::describe_counter!(
        MAPPINGS_RELEASED,
        Unit::Count,
        "Total DMA mappings torn down"
    );
    metrics::describe_counter!(USER_PINS, Unit::Count, "User-path pin operations");
    metrics::describe_counter!(USER_UNPINS, Unit::Count, "User-path unpin operations");
    metrics::describe_counter!(SUBMIT_PINS, Unit::Count, "Submission-path pin operations");
    metrics::describe_counter!(
        SUBMIT_UNPINS,
        Unit::Count,
        "Submission-path unpin operations"
    );
    metrics::describe_counter!(
        BATCH_ROLLBACKS,
        Unit::Count,
        "Failed batch operations rolled back"
    );
    metrics::describe_counter!(
        REFCOUNT_CLAMPS,
        Unit::Count,
        "Underflowing refcount decrements clamped to zero"
    );
    metrics::describe_gauge!(
        ACTIVE_MAPPINGS,
        Unit::Count,
        "Currently live mapping records"
    );
}

/// Metrics collector for a specific registry.
///
/// Provides a convenient way to record metrics with a pre-configured
/// registry label.
#[derive(Clone)]
pub struct RegistryMetrics {
    mappings_created: Counter,
    mappings_released: Counter,
    user_pins: Counter,
    user_unpins: Counter,
    submit_pins: Counter,
    submit_unpins: Counter,
    batch_rollbacks: Counter,
    refcount_clamps: Counter,
    active_mappings: Gauge,
}

impl RegistryMetrics {
    /// Create a new registry metrics collector.
    pub fn new(registry: &str) -> Self {
        Self {
            mappings_created: counter!(MAPPINGS_CREATED, "registry" => registry.to_string()),
            mappings_released: counter!(MAPPINGS_RELEASED, "registry" => registry.to_string()),
            user_pins: counter!(USER_PINS, "registry" => registry.to_string()),
            user_unpins: counter!(USER_UNPINS, "registry" => registry.to_string()),
            submit_pins: counter!(SUBMIT_PINS, "registry" => registry.to_string()),
            submit_unpins: counter!(SUBMIT_UNPINS, "registry" => registry.to_string()),
            batch_rollbacks: counter!(BATCH_ROLLBACKS, "registry" => registry.to_string()),
            refcount_clamps: counter!(REFCOUNT_CLAMPS, "registry" => registry.to_string()),
            active_mappings: gauge!(ACTIVE_MAPPINGS, "registry" => registry.to_string()),
        }
    }

    /// Record a new DMA mapping, with the resulting live-record count.
    #[inline]
    pub fn record_mapping_created(&self, active: usize) {
        self.mappings_created.increment(1);
        self.active_mappings.set(active as f64);
    }

    /// Record a torn-down mapping, with the resulting live-record count.
    #[inline]
    pub fn record_mapping_released(&self, active: usize) {
        self.mappings_released.increment(1);
        self.active_mappings.set(active as f64);
    }

    /// Record a user-path pin.
    #[inline]
    pub fn record_user_pin(&self) {
        self.user_pins.increment(1);
    }

    /// Record a user-path unpin.
    #[inline]
    pub fn record_user_unpin(&self) {
        self.user_unpins.increment(1);
    }

    /// Record submission-path pins.
    #[inline]
    pub fn record_submit_pins(&self, count: usize) {
        self.submit_pins.increment(count as u64);
    }

    /// Record submission-path unpins.
    #[inline]
    pub fn record_submit_unpins(&self, count: usize) {
        self.submit_unpins.increment(count as u64);
    }

    /// Record a failed batch operation that was rolled back.
    #[inline]
    pub fn record_batch_rollback(&self) {
        self.batch_rollbacks.increment(1);
    }

    /// Record an underflowing refcount decrement clamped to zero.
    #[inline]
    pub fn record_refcount_clamp(&self) {
        self.refcount_clamps.increment(1);
    }
}

impl std::fmt::Debug for RegistryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics(); // Second call is a no-op
    }

    #[test]
    fn test_recording_without_recorder_is_safe() {
        // With no global recorder installed, every handle is a no-op.
        let metrics = RegistryMetrics::new("test");
        metrics.record_mapping_created(1);
        metrics.record_user_pin();
        metrics.record_submit_pins(3);
        metrics.record_mapping_released(0);
    }
}
