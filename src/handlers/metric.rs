//! Metric ingestion endpoint handler.

use crate::{
    middleware::{PostedService, RequestId},
    models::Metric,
    services::MetricRelay,
};
use actix_web::{Error, HttpMessage, HttpRequest, Result, web};
use paperclip::actix::{CreatedJson, api_v2_operation};

/// Metric ingestion endpoint
///
/// Forwards the metric to Riemann. Response-time metrics are enriched with
/// the caller's ASN and counted by the abuse-detection engine first.
#[api_v2_operation(
    summary = "Metric Ingestion Endpoint",
    description = "Forwards a metric to the event store, enriching API response-time metrics with the caller's ASN and feeding them to abuse detection.",
    tags("Metrics"),
    responses(
        (status = 201, description = "Metric forwarded", body = Metric),
        (status = 400, description = "Bad Request - Missing or invalid fields"),
        (status = 401, description = "Unauthorized - Invalid or missing credentials"),
        (status = 500, description = "Internal Server Error - Event store unavailable")
    )
)]
pub async fn create_metric(
    req: HttpRequest,
    relay: web::Data<MetricRelay>,
    payload: web::Json<Metric>,
) -> Result<CreatedJson<Metric>, Error> {
    let mut metric = payload.into_inner();
    if !metric.service.is_empty() {
        req.extensions_mut()
            .insert(PostedService(metric.service.clone()));
    }
    metric
        .validate()
        .map_err(actix_web::error::ErrorBadRequest)?;

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    tracing::debug!(request_id = %request_id, service = %metric.service, "Metric received");

    if let Err(e) = relay.send(&mut metric).await {
        tracing::error!(request_id = %request_id, error = %e, "Error sending metric");
        return Err(actix_web::error::ErrorInternalServerError(e.to_string()));
    }

    Ok(CreatedJson(metric))
}
