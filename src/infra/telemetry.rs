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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "hotdog_refill_slots_added_total",
            Unit::Count,
            "Slots filled by refill runs, labelled by platform."
        );
        describe_counter!(
            "hotdog_refill_underfilled_days_total",
            Unit::Count,
            "Days a refill left with fewer than six filled slots."
        );
        describe_counter!(
            "hotdog_claim_conflicts_total",
            Unit::Count,
            "Slot claims skipped because the slot or candidate was taken concurrently."
        );
        describe_counter!(
            "hotdog_slots_missed_total",
            Unit::Count,
            "Scheduled slots marked missed after their grace window."
        );
        describe_histogram!(
            "hotdog_refill_duration_ms",
            Unit::Milliseconds,
            "Wall time of a multi-day refill in milliseconds."
        );
    });
}
