/*!
Observability for the fragment engine.

Structured logging goes through `tracing`; [`init_observability`] installs a
global subscriber filtered by `RUST_LOG` (default `fragments=info`).

With the `metrics` feature, store calls, retries and conversions are counted
in a Prometheus registry readable through [`gather_metrics`]. Without it the
`record_*` hooks compile to nothing.
*/

#[cfg(feature = "metrics")]
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use std::time::Duration;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::media::MediaKind;
use crate::{FragmentError, Result};

const DEFAULT_DIRECTIVE: &str = "fragments=info";

#[cfg(feature = "metrics")]
static METRICS: OnceLock<Option<FragmentMetrics>> = OnceLock::new();

/// Prometheus metrics for store and conversion activity
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct FragmentMetrics {
    pub store_requests_total: CounterVec,
    pub store_errors_total: CounterVec,
    pub store_retries_total: CounterVec,
    pub store_latency_seconds: HistogramVec,
    pub conversions_total: CounterVec,

    registry: Registry,
}

#[cfg(feature = "metrics")]
fn metric_error(name: &str, e: prometheus::Error) -> FragmentError {
    FragmentError::observability(format!("Failed to create metric {name}: {e}"))
}

#[cfg(feature = "metrics")]
impl FragmentMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str, labels: &[&str]| -> Result<CounterVec> {
            let counter =
                CounterVec::new(Opts::new(name, help), labels).map_err(|e| metric_error(name, e))?;
            registry
                .register(Box::new(counter.clone()))
                .map_err(|e| metric_error(name, e))?;
            Ok(counter)
        };

        let store_requests_total = counter(
            "fragments_store_requests_total",
            "Store operations issued, including retried ones once",
            &["store", "operation"],
        )?;
        let store_errors_total = counter(
            "fragments_store_errors_total",
            "Store operations that failed after retries",
            &["store", "operation"],
        )?;
        let store_retries_total = counter(
            "fragments_store_retries_total",
            "Store operation retry attempts",
            &["store", "operation"],
        )?;
        let conversions_total = counter(
            "fragments_conversions_total",
            "Representation conversions by source, target and outcome",
            &["from", "to", "outcome"],
        )?;

        let store_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fragments_store_latency_seconds",
                "Duration of store operations in seconds, retries included",
            ),
            &["store", "operation"],
        )
        .map_err(|e| metric_error("fragments_store_latency_seconds", e))?;
        registry
            .register(Box::new(store_latency_seconds.clone()))
            .map_err(|e| metric_error("fragments_store_latency_seconds", e))?;

        Ok(Self {
            store_requests_total,
            store_errors_total,
            store_retries_total,
            store_latency_seconds,
            conversions_total,
            registry,
        })
    }

    /// Global metrics instance, `None` if the registry could not be built
    pub fn global() -> Option<&'static FragmentMetrics> {
        METRICS
            .get_or_init(|| match Self::new() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics disabled");
                    None
                }
            })
            .as_ref()
    }

    pub fn gather(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| FragmentError::observability(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer).map_err(|e| {
            FragmentError::observability(format!("Failed to convert metrics to string: {e}"))
        })
    }
}

/// Prometheus text exposition of all recorded metrics
#[cfg(feature = "metrics")]
pub fn gather_metrics() -> Result<String> {
    FragmentMetrics::global()
        .ok_or_else(|| FragmentError::observability("metrics registry is unavailable"))?
        .gather()
}

/// Record one completed store call (retries included in `elapsed`)
#[cfg(feature = "metrics")]
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
pub(crate) fn record_store_call(store: &str, operation: &str, elapsed: Duration, ok: bool) {
    if let Some(metrics) = FragmentMetrics::global() {
        let labels = [store, operation];
        metrics.store_requests_total.with_label_values(&labels).inc();
        metrics
            .store_latency_seconds
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
        if !ok {
            metrics.store_errors_total.with_label_values(&labels).inc();
        }
    }
}

#[cfg(feature = "metrics")]
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
pub(crate) fn record_store_retry(store: &str, operation: &str) {
    if let Some(metrics) = FragmentMetrics::global() {
        metrics
            .store_retries_total
            .with_label_values(&[store, operation])
            .inc();
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn record_conversion(from: MediaKind, to: MediaKind, ok: bool) {
    if let Some(metrics) = FragmentMetrics::global() {
        let outcome = if ok { "ok" } else { "error" };
        metrics
            .conversions_total
            .with_label_values(&[from.media_type(), to.media_type(), outcome])
            .inc();
    }
}

#[cfg(not(feature = "metrics"))]
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
pub(crate) fn record_store_call(_store: &str, _operation: &str, _elapsed: Duration, _ok: bool) {}

#[cfg(not(feature = "metrics"))]
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
pub(crate) fn record_store_retry(_store: &str, _operation: &str) {}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record_conversion(_from: MediaKind, _to: MediaKind, _ok: bool) {}

/// Install the global tracing subscriber
///
/// `json` selects machine-readable JSON lines; otherwise a compact
/// human-readable format is used. Fails if a global subscriber is already set.
pub fn init_observability(json: bool) -> Result<()> {
    init_observability_with(json, DEFAULT_DIRECTIVE)
}

/// Like [`init_observability`], with `directive` used when `RUST_LOG` is unset
pub fn init_observability_with(json: bool, directive: &str) -> Result<()> {
    #[cfg(feature = "metrics")]
    FragmentMetrics::global();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|e| {
            FragmentError::validation(format!("invalid log directive '{directive}': {e}"))
        })?;
    let registry = TracingRegistry::default().with(filter);

    let installed = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false)
            .with_writer(std::io::stderr);
        set_global_default(registry.with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        set_global_default(registry.with(fmt_layer))
    };
    installed.map_err(|e| {
        FragmentError::observability(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!("Fragment observability initialized");
    Ok(())
}

/// Initialize observability with default settings
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
