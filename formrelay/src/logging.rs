use crate::config::LoggingConfig;
use sentry::ClientInitGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Events go to stderr and, when a DSN is configured, to Sentry.
///
/// The returned guard flushes pending Sentry events when dropped and must outlive the runtime.
pub fn init(config: Option<&LoggingConfig>) -> Option<ClientInitGuard> {
    let guard = config.map(|config| {
        sentry::init(sentry::ClientOptions {
            dsn: config.sentry_dsn.parse().ok(),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}
