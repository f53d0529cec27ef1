//! Health check endpoint handler.

use crate::{models::HealthResponse, services::MetricRelay};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

/// Health check endpoint
///
/// Reports the process as healthy along with whether the detection engine
/// has been started. Used by load balancers and orchestrators.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns the current health status of the relay in JSON format.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse)
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let cerberus = match req.app_data::<web::Data<MetricRelay>>() {
        Some(relay) if relay.cerberus().is_started() => "running",
        Some(_) => "stopped",
        None => "disabled",
    };

    Ok(web::Json(HealthResponse {
        status: "healthy".to_string(),
        cerberus: cerberus.to_string(),
    }))
}
