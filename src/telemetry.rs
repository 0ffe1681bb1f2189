//! Tracing subscriber installation and metric descriptions.
//!
//! The filter reads `TAGCACHE_LOG` (same syntax as `RUST_LOG`) on top of the
//! configured level, so cache logging can be tuned without touching the host
//! application's filter.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use thiserror::Error;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::{LogFormat, LoggingSettings};

const FILTER_ENV_VAR: &str = "TAGCACHE_LOG";

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Install a global tracing subscriber using the provided logging settings.
///
/// Fails if a global subscriber is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(filter(logging.level))
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()?;
    Ok(())
}

fn filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(FILTER_ENV_VAR)
        .from_env_lossy()
}

/// Worker activity is logged from the `tagcache-worker` thread, so both
/// formats carry thread names.
fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_thread_names(true)
            .with_target(false)
            .boxed(),
    }
}

/// Register descriptions for every metric the crate emits. Safe to call more
/// than once; only the first call reaches the recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tagcache_store_hit_total",
            Unit::Count,
            "Total number of memory store reads that found a live entry."
        );
        describe_counter!(
            "tagcache_store_miss_total",
            Unit::Count,
            "Total number of memory store reads that found nothing or an expired entry."
        );
        describe_counter!(
            "tagcache_store_evict_total",
            Unit::Count,
            "Total number of entries pruned from the memory store due to size."
        );
        describe_gauge!(
            "tagcache_store_size",
            Unit::Count,
            "Size-hint total tracked by the memory store worker."
        );
        describe_counter!(
            "tagcache_fetch_build_total",
            Unit::Count,
            "Total number of values built on a fetch miss."
        );
        describe_histogram!(
            "tagcache_fetch_build_ms",
            Unit::Milliseconds,
            "Builder latency on a fetch miss in milliseconds."
        );
        describe_counter!(
            "tagcache_invalidate_keys_total",
            Unit::Count,
            "Total number of cache keys deleted by tag invalidation."
        );
    });
}
