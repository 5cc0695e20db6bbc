use crate::config::{Environment, LogLevel};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Initialize tracing with pretty output in development and JSON in production.
///
/// `RUST_LOG` takes precedence; `log_level` is the fallback filter. Spans are
/// also handed to OpenTelemetry, which stays a no-op until a tracer provider
/// is installed (see `TelemetryGuard::init`).
pub fn setup_logging(log_level: LogLevel, environment: Environment) {
    init_subscriber(log_level, environment, tracing_opentelemetry::layer());
}

pub(crate) fn init_subscriber<L>(log_level: LogLevel, environment: Environment, otel_layer: L)
where
    L: Layer<FilteredRegistry> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}
