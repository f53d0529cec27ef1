//! Request metrics recorded around every call.
//!
//! Besides the per-route counters, posted metrics are counted by the service
//! that sent them and by what happened to them: `forwarded` when the relay
//! accepted it, `rejected` on a client error, `failed` when forwarding broke.

use crate::{services::AppMetrics, utils::route::extract_route_pattern};
use actix_web::{
    Error, HttpMessage,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Next,
    web,
};
use std::time::Instant;

/// Service named by a metric posted to `/metric`, set by the handler
#[derive(Debug, Clone)]
pub struct PostedService(pub String);

fn relay_outcome(status: StatusCode) -> &'static str {
    if status.is_success() {
        "forwarded"
    } else if status.is_client_error() {
        "rejected"
    } else {
        "failed"
    }
}

/// `from_fn` middleware feeding [`AppMetrics`]; a no-op when none is registered
pub async fn record_metrics(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let started = Instant::now();
    let method = req.method().clone();

    let res = next.call(req).await?;

    let Some(metrics) = res.request().app_data::<web::Data<AppMetrics>>() else {
        return Ok(res);
    };

    let status = res.status();
    let route = extract_route_pattern(res.request());
    metrics.record_request(method.as_str(), &route, status.as_u16(), started.elapsed());
    metrics.update_uptime();

    let posted = res.request().extensions().get::<PostedService>().cloned();
    if let Some(PostedService(service)) = posted {
        metrics.record_relayed(&service, relay_outcome(status));
    }

    Ok(res)
}
