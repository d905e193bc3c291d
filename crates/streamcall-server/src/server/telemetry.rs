//! # Telemetry
//!
//! Console logging through `tracing_subscriber::fmt` is always installed.
//! OpenTelemetry pipelines are opt-in through cargo features:
//!
//! - `traces`: exports `tracing` spans as OpenTelemetry traces.
//! - `metrics`: records per-method call metrics.
//! - `stdout`: prints exported spans and metrics to stdout.
//! - `otlp`: ships spans and metrics to the collector at `OTLP_ENDPOINT`.
//!
//! Exporters need at least one of `traces` or `metrics`.
//!
//! ```bash
//! cargo run --bin streamcall-server --features traces,metrics,stdout
//! OTLP_ENDPOINT=http://localhost:4317 cargo run --bin streamcall-server --features traces,otlp
//! ```
//!
//! Every metric carries an `rpc.method` attribute naming the call it was
//! recorded for. The recording helpers compile to no-ops without `metrics`.

#[cfg(all(feature = "otlp", not(any(feature = "traces", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'traces' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "traces", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'traces' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "traces")))]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "traces")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "traces")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "traces")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "streamcall";

/// Exporter pipelines that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "traces")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending telemetry and shuts the exporters down.
    pub fn shutdown(self) {
        #[cfg(feature = "traces")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "traces")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "traces")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "traces"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Console output, independent of the `stdout` exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "traces")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "traces")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(all(feature = "otlp", any(feature = "metrics", feature = "traces")))]
fn otlp_endpoint() -> anyhow::Result<String> {
    use anyhow::Context;
    std::env::var("OTLP_ENDPOINT").context("missing `OTLP_ENDPOINT`")
}

#[cfg(any(feature = "metrics", feature = "traces"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(Compression::Gzip)
            .with_endpoint(otlp_endpoint()?)
            .with_protocol(Protocol::Grpc)
            .with_temporality(sdkmetrics::Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "traces")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_span_processor(batch(opentelemetry_stdout::SpanExporter::default()));

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(Compression::Gzip)
            .with_endpoint(otlp_endpoint()?)
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;
        builder.with_span_processor(batch(exporter))
    };

    Ok(builder.build())
}

#[cfg(all(feature = "traces", any(feature = "stdout", feature = "otlp")))]
fn batch<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(std::time::Duration::from_secs(5))
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

#[cfg(feature = "metrics")]
static CALLS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALLS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CALL_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static MESSAGES_STREAMED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = CALLS.set(
        meter
            .u64_counter("calls")
            .with_description("Total admitted calls")
            .build(),
    );

    let _ = CALLS_INFLIGHT.set(
        meter
            .i64_up_down_counter("calls_inflight")
            .with_description("Calls currently being served")
            .build(),
    );

    let _ = CALL_ERRORS.set(
        meter
            .u64_counter("errors")
            .with_description("Failed, refused or cancelled calls")
            .build(),
    );

    let _ = CALL_DURATION_MS.set(
        meter
            .f64_histogram("call_duration")
            .with_unit("ms")
            .with_description("End-to-end call duration")
            .build(),
    );

    let _ = MESSAGES_STREAMED.set(
        meter
            .u64_counter("messages_streamed")
            .with_description("Messages sent on server-streaming responses")
            .build(),
    );
}

#[cfg(feature = "metrics")]
fn method_attr(method: &'static str) -> [KeyValue; 1] {
    [KeyValue::new(semvcns::attribute::RPC_METHOD, method)]
}

#[cfg(feature = "metrics")]
pub fn increment_calls(method: &'static str) {
    if let Some(counter) = CALLS.get() {
        counter.add(1, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_calls(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_calls_inflight(method: &'static str) {
    if let Some(counter) = CALLS_INFLIGHT.get() {
        counter.add(1, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_calls_inflight(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn decrement_calls_inflight(method: &'static str) {
    if let Some(counter) = CALLS_INFLIGHT.get() {
        counter.add(-1, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_calls_inflight(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_call_errors(method: &'static str) {
    if let Some(counter) = CALL_ERRORS.get() {
        counter.add(1, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_call_errors(_method: &'static str) {}

#[cfg(feature = "metrics")]
pub fn record_call_duration(method: &'static str, duration_ms: f64) {
    if let Some(histogram) = CALL_DURATION_MS.get() {
        histogram.record(duration_ms, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_call_duration(_method: &'static str, _duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_messages_streamed(method: &'static str) {
    if let Some(counter) = MESSAGES_STREAMED.get() {
        counter.add(1, &method_attr(method));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_messages_streamed(_method: &'static str) {}
