use crate::app_env;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_http::HeaderExtractor;
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::Tracer;
use opentelemetry_sdk::{runtime, Resource};
use std::env;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing::{debug, debug_span, field, Span};
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::{prelude::*, registry, EnvFilter};

/// The name of the service as it should appear in OpenTelemetry collectors
const SERVICE_NAME: &str = "stride-api";

/// OpenTelemetry primitives which ship spans and metrics to a collector
pub struct OtelExporters {
    tracer: Tracer,
    meter: SdkMeterProvider,
}

/// Builds OpenTelemetry exporters when both export URLs are configured in the
/// environment. Local development usually runs without a collector, in which
/// case this returns None and logs stay on stdout only.
pub fn exporters_from_env() -> Option<OtelExporters> {
    let traces_endpoint = env::var(app_env::OTEL_SPAN_EXPORT_URL).ok()?;
    let metrics_endpoint = env::var(app_env::OTEL_METRIC_EXPORT_URL).ok()?;

    let span_export = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(traces_endpoint)
        .build()
        .expect("failed to build span exporter");
    let meter_export = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(metrics_endpoint)
        .build()
        .expect("failed to build meter exporter");

    let tracer = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(span_export, runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build()
        .tracer(SERVICE_NAME);
    let meter = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(meter_export, runtime::Tokio).build())
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build();

    Some(OtelExporters { tracer, meter })
}

/// Sets up the global logging and tracing sinks: a JSON logger on stdout
/// filtered by [app_env::LOG_LEVEL] (info by default), plus OpenTelemetry
/// sinks at debug level when exporters are present. Though the logger is set
/// up with the "tracing" crate, libraries still using "log" are bridged in.
pub fn init_subscriber(otel_exporters: Option<OtelExporters>) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(app_env::LOG_LEVEL)
        .from_env()
        .expect("building the logging filter failed");

    match otel_exporters {
        Some(exporters) => registry()
            .with(LevelFilter::DEBUG)
            .with(OpenTelemetryLayer::new(exporters.tracer))
            .with(MetricsLayer::new(exporters.meter))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter),
            )
            .init(),
        None => registry()
            .with(LevelFilter::DEBUG)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter),
            )
            .init(),
    }
}

/// Attaches a tracing middleware layer to the given router. Each request gets
/// a span carrying the method, path, and eventual response status, with the
/// parent trace context extracted from incoming headers.
pub fn attach_http_tracing<T>(router: Router<T>) -> Router<T>
where
    T: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new().layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let req_span = debug_span!(
                        "request",
                        method = &request.method().as_str(),
                        path = request.uri().path(),
                        response_status = field::Empty,
                    );

                    req_span.set_parent(global::get_text_map_propagator(|propagator| {
                        propagator.extract(&HeaderExtractor(request.headers()))
                    }));

                    req_span
                })
                .on_response(
                    |response: &Response<Body>, _latency: Duration, span: &Span| {
                        span.record("response_status", field::display(response.status()));
                        debug!("request processing complete");
                    },
                ),
        ),
    )
}
