//! # Telemetry
//!
//! Logging is always on: a `tracing_subscriber` registry filtered by
//! `RUST_LOG` (default `info`) and printed either as pretty, human readable
//! output or as one JSON object per line.
//!
//! Metrics are optional and exported through OpenTelemetry.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables the OpenTelemetry meter provider and the endpoint
//!   instruments (request counter, error counter, latency histogram).
//! - `stdout`: Periodically prints metrics to stdout.
//! - `otlp`: Exports metrics over OTLP/gRPC. The collector is taken from the
//!   standard `OTEL_EXPORTER_OTLP_ENDPOINT` variable.
//!
//! Exporters require `metrics`; `stdout` and `otlp` may be combined.
//!
//! ```bash
//! cargo run --features metrics,stdout
//! cargo run --features metrics,otlp
//! ```

#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires the 'metrics' feature to be enabled.");

#[cfg(all(feature = "otlp", not(feature = "metrics")))]
compile_error!("The 'otlp' feature requires the 'metrics' feature to be enabled.");

use std::fmt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use watermark_core::ErrorKind;

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::Arc;

/// Console output format.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
    metrics: EndpointMetrics,
}

impl TelemetryProviders {
    /// Handle the endpoint middleware records into.
    pub fn endpoint_metrics(&self) -> EndpointMetrics {
        self.metrics.clone()
    }

    /// Flushes and stops every exporter. Failures are reported on stderr
    /// since the subscriber may already be gone.
    pub fn shutdown(self) {
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

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(feature = "metrics")]
    let metrics = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let scope = InstrumentationScope::builder("watermark")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        EndpointMetrics::from_meter(&opentelemetry::global::meter_with_scope(scope))
    };

    #[cfg(not(feature = "metrics"))]
    let metrics = EndpointMetrics::noop();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .with_file(true)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .json()
                    .with_current_span(true),
            )
            .try_init()?,
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
        metrics,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("watermark")
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
        use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_compression(Compression::Gzip)
            .with_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
struct Instruments {
    requests: Counter<u64>,
    errors: Counter<u64>,
    duration_ms: Histogram<f64>,
}

/// Endpoint instruments. A no-op unless built with the `metrics` feature and
/// obtained from [`TelemetryProviders::endpoint_metrics`].
#[derive(Clone, Default)]
pub struct EndpointMetrics {
    #[cfg(feature = "metrics")]
    instruments: Option<Arc<Instruments>>,
}

impl EndpointMetrics {
    pub fn noop() -> Self {
        Self::default()
    }

    #[cfg(feature = "metrics")]
    fn from_meter(meter: &Meter) -> Self {
        let instruments = Instruments {
            requests: meter
                .u64_counter("requests")
                .with_description("Endpoint calls")
                .build(),
            errors: meter
                .u64_counter("errors")
                .with_description("Failed endpoint calls by error kind")
                .build(),
            duration_ms: meter
                .f64_histogram("duration")
                .with_unit("ms")
                .with_description("Endpoint call duration")
                .build(),
        };
        Self {
            instruments: Some(Arc::new(instruments)),
        }
    }

    #[cfg(feature = "metrics")]
    pub fn record(&self, endpoint: &'static str, elapsed_ms: f64, error: Option<ErrorKind>) {
        let Some(instruments) = &self.instruments else {
            return;
        };
        let attrs = [KeyValue::new("endpoint", endpoint)];
        instruments.requests.add(1, &attrs);
        instruments.duration_ms.record(elapsed_ms, &attrs);
        if let Some(kind) = error {
            instruments.errors.add(
                1,
                &[
                    KeyValue::new("endpoint", endpoint),
                    KeyValue::new("kind", kind.as_str()),
                ],
            );
        }
    }

    #[cfg(not(feature = "metrics"))]
    pub fn record(&self, _endpoint: &'static str, _elapsed_ms: f64, _error: Option<ErrorKind>) {}
}

impl fmt::Debug for EndpointMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "metrics")]
        let enabled = self.instruments.is_some();
        #[cfg(not(feature = "metrics"))]
        let enabled = false;
        f.debug_struct("EndpointMetrics")
            .field("enabled", &enabled)
            .finish()
    }
}
