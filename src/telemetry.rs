//! Logging and trace context setup.

use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "heart_rate_zones=info";

/// Read W3C `traceparent` / `tracestate` from incoming messages.
pub fn install_propagator() {
    global::set_text_map_propagator(TraceContextPropagator::new());
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr; stdout is left for the zone reports. Spans are
/// bridged to OpenTelemetry so a message span joins the publisher's trace.
pub fn init_tracing() {
    install_propagator();

    let provider = TracerProvider::builder().build();
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    global::set_tracer_provider(provider);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();
}
