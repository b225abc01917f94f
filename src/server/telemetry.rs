use std::env;
use tracing::Subscriber;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "match_signaling=debug,tower_http=debug,warn";

fn telemetry_enabled() -> bool {
    env::var("ENABLE_TELEMETRY")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false)
}

/// Builds the subscriber stack without installing it.
pub fn subscriber(json: bool) -> impl Subscriber + for<'span> LookupSpan<'span> + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    Registry::default()
        .with(fmt_layer(json))
        .with(env_filter)
}

fn fmt_layer(json: bool) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true);
    if json {
        layer.json().boxed()
    } else {
        layer.with_ansi(true).boxed()
    }
}

pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = subscriber(json);

    #[cfg(feature = "telemetry")]
    if telemetry_enabled() {
        let (tracer, endpoint) = jaeger::tracer()?;
        subscriber
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
        tracing::info!("Telemetry initialized with Jaeger endpoint: {}", endpoint);
        return Ok(());
    }

    subscriber.try_init()?;
    tracing::info!(telemetry = telemetry_enabled(), "Logging initialized");
    Ok(())
}

pub fn shutdown_telemetry() {
    #[cfg(feature = "telemetry")]
    if telemetry_enabled() {
        // Flush pending spans
        opentelemetry::global::shutdown_tracer_provider();
    }
}

#[cfg(feature = "telemetry")]
mod jaeger {
    use opentelemetry::sdk::propagation::TraceContextPropagator;
    use opentelemetry::sdk::{
        trace::{self, RandomIdGenerator, Sampler, Tracer},
        Resource,
    };
    use opentelemetry::{global, KeyValue};
    use std::env;

    pub fn tracer() -> Result<(Tracer, String), Box<dyn std::error::Error>> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let endpoint = env::var("JAEGER_ENDPOINT")
            .unwrap_or_else(|_| "http://jaeger:14268/api/traces".to_string());

        let tracer = opentelemetry_jaeger::new_collector_pipeline()
            .with_service_name("match-signaling")
            .with_endpoint(&endpoint)
            .with_isahc()
            .with_trace_config(
                trace::config()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_max_events_per_span(64)
                    .with_max_attributes_per_span(16)
                    .with_resource(Resource::new(vec![
                        KeyValue::new("service.name", "match-signaling"),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ])),
            )
            .with_timeout(std::time::Duration::from_secs(2))
            .install_batch(opentelemetry::runtime::Tokio)?;

        Ok((tracer, endpoint))
    }
}
