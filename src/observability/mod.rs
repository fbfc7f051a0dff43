//! Observability features: metrics and tracing.
//!
//! This module provides instrumentation for monitoring and debugging buffer
//! registries:
//!
//! - **Metrics**: counters and gauges via `metrics-rs`
//! - **Tracing**: structured events emitted directly from the registry paths
//!
//! ## Metrics
//!
//! Pinax exposes the following metrics, labelled by registry name:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `pinax_mappings_created` | Counter | DMA mappings established |
//! | `pinax_mappings_released` | Counter | DMA mappings torn down |
//! | `pinax_user_pins` | Counter | User-path pin operations |
//! | `pinax_user_unpins` | Counter | User-path unpin operations |
//! | `pinax_submit_pins` | Counter | Submission-path pins |
//! | `pinax_submit_unpins` | Counter | Submission-path unpins |
//! | `pinax_batch_rollbacks` | Counter | Failed batches rolled back |
//! | `pinax_refcount_clamps` | Counter | Underflowing decrements clamped |
//! | `pinax_active_mappings` | Gauge | Currently live mapping records |
//!
//! ## Tracing
//!
//! The registry emits `trace!` events per pin/unpin, `debug!` on mapping
//! creation and teardown (with address and heap fields), and `warn!` on
//! refcount underflow clamps and forced teardown of submit-referenced
//! mappings.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pinax::observability::init_metrics;
//!
//! // Initialize metric descriptions (call once at startup)
//! init_metrics();
//!
//! // Metrics are recorded automatically by every registry; use a
//! // metrics exporter (prometheus, statsd, ...) to collect them.
//! ```

mod metrics;

pub use metrics::{RegistryMetrics, init_metrics};
