use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the core emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "rapport_cache_hit_total",
            Unit::Count,
            "Projection reads answered from the cache, labelled by key family."
        );
        describe_counter!(
            "rapport_cache_miss_total",
            Unit::Count,
            "Projection reads rebuilt from the store, labelled by key family."
        );
        describe_counter!(
            "rapport_cache_decode_error_total",
            Unit::Count,
            "Cached projections that failed to decode and were rebuilt."
        );
        describe_counter!(
            "rapport_cache_invalidate_error_total",
            Unit::Count,
            "Failed cache deletions during invalidation, labelled by operation."
        );
        describe_gauge!(
            "rapport_cache_event_queue_len",
            Unit::Count,
            "Current number of pending cache events in the queue."
        );
        describe_histogram!(
            "rapport_cache_consume_ms",
            Unit::Milliseconds,
            "Cache invalidation batch latency in milliseconds."
        );
    });
}
