//! Prometheus recorder for the pipeline metrics
//!
//! The CLI is short-lived, so instead of serving `/metrics` it renders the
//! exposition once before exiting when `--metrics` is given.

use anyhow::{Context, Result};
use deliver_api::metrics::REQUEST_DURATION_BUCKETS;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("deliver_request_duration_seconds".to_string()),
            REQUEST_DURATION_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the global recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
