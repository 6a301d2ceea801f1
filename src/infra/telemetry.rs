use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "clubsite_cache_hit_total",
            Unit::Count,
            "Cached responses served, labelled by entry state (fresh or stale)."
        );
        describe_counter!(
            "clubsite_cache_miss_total",
            Unit::Count,
            "Requests that found no usable entry, labelled by entry state (missing or expired)."
        );
        describe_counter!(
            "clubsite_cache_build_total",
            Unit::Count,
            "Payload builds, labelled by outcome."
        );
        describe_counter!(
            "clubsite_cache_refresh_total",
            Unit::Count,
            "Background refreshes spawned for stale entries."
        );
        describe_counter!(
            "clubsite_cache_lock_contended_total",
            Unit::Count,
            "Rebuilds that found the refresh lock already held."
        );
        describe_counter!(
            "clubsite_cache_bypass_total",
            Unit::Count,
            "Requests served without the cache because it is disabled."
        );
        describe_counter!(
            "clubsite_cache_generation_bump_total",
            Unit::Count,
            "Cache generation advances triggered by writes or the refresh command."
        );
        describe_histogram!(
            "clubsite_cache_build_ms",
            Unit::Milliseconds,
            "Payload build latency in milliseconds."
        );
    });
}
