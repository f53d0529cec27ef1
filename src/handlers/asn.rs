//! ASN lookup endpoint handler.

use crate::{
    models::{AsnQuery, AsnResponse},
    services::{AsnError, MetricRelay},
};
use actix_web::{Error, Result, web};
use paperclip::actix::api_v2_operation;

/// ASN lookup endpoint
///
/// Resolves the autonomous system announcing an address through the same
/// cache used by metric enrichment.
#[api_v2_operation(
    summary = "ASN Lookup Endpoint",
    description = "Returns the ASN announcing the given IPv4 or IPv6 address (e.g., ?ip=8.8.8.8). Addresses with no origin record resolve to \"Unknown\".",
    tags("ASN"),
    parameters(
        ("ip" = Option<String>, Query, description = "IPv4 or IPv6 address"),
    ),
    responses(
        (status = 200, description = "Successful response", body = AsnResponse),
        (status = 400, description = "Bad Request - Missing or invalid ip parameter"),
        (status = 401, description = "Unauthorized - Invalid or missing credentials"),
        (status = 500, description = "Internal Server Error - Lookup failed")
    )
)]
pub async fn get_asn(
    relay: web::Data<MetricRelay>,
    query: web::Query<AsnQuery>,
) -> Result<web::Json<AsnResponse>, Error> {
    let ip = query
        .ip
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| actix_web::error::ErrorBadRequest("ip query parameter is required"))?;

    match relay.resolver().resolve(ip).await {
        Ok(asn) => Ok(web::Json(AsnResponse {
            asn,
            ip: ip.to_string(),
        })),
        Err(AsnError::InvalidIp(ip)) => Err(actix_web::error::ErrorBadRequest(format!(
            "invalid IP address: {}",
            ip
        ))),
        Err(e) => {
            tracing::error!(ip = %ip, error = %e, "ASN lookup failed");
            Err(actix_web::error::ErrorInternalServerError(e.to_string()))
        }
    }
}
