//! Prometheus scrape endpoint.

use crate::{config::MetricsConfig, services::AppMetrics};
use actix_web::{Error, HttpResponse, Result, web};
use paperclip::actix::api_v2_operation;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metrics endpoint
///
/// HTTP traffic plus window sizes, rule firings and ASN lookup results.
#[api_v2_operation(
    summary = "Prometheus Metrics Endpoint",
    description = "Returns Prometheus-formatted metrics for HTTP traffic, detection windows, rule triggers and ASN lookups.",
    tags("Metrics"),
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 503, description = "Metrics collection disabled")
    )
)]
pub async fn get_metrics(
    config: web::Data<MetricsConfig>,
    metrics: web::Data<AppMetrics>,
) -> Result<HttpResponse, Error> {
    if !config.enabled {
        return Ok(HttpResponse::ServiceUnavailable()
            .content_type("text/plain")
            .body("Metrics collection is disabled"));
    }

    metrics.update_uptime();
    let body = metrics.render().map_err(|e| {
        tracing::error!(error = %e, "Failed to render metrics");
        actix_web::error::ErrorInternalServerError(e.to_string())
    })?;

    Ok(HttpResponse::Ok()
        .content_type(PROMETHEUS_CONTENT_TYPE)
        .body(body))
}
