//! Tracing and Sentry setup for the Larder binaries.
//!
//! Both `larder-server` and `larder` call [`init`] first thing in `main`.
//! Warnings and errors become Sentry events, info and debug lines become
//! breadcrumbs attached to them.

use std::borrow::Cow;

use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::{Level, Metadata};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SentryConfig;

/// Keeps Sentry flushing until dropped. Hold it for the life of `main`.
#[must_use = "dropping the guard shuts Sentry down"]
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Install the global subscriber.
///
/// `default_filter` applies when `RUST_LOG` is unset. Sentry is started before
/// the subscriber so that its layer has a client to report to.
pub fn init(default_filter: &str, sentry: &SentryConfig) -> TelemetryGuard {
    let client = init_sentry(sentry);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(event_filter))
        .init();

    if client.is_some() {
        tracing::info!(environment = sentry.environment.as_deref(), "Sentry initialized");
    }

    TelemetryGuard { _sentry: client }
}

fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_deref()?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(Cow::Owned),
            sample_rate: config.sample_rate,
            traces_sample_rate: config.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    )))
}

fn event_filter(metadata: &Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    }
}
