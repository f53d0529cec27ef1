//! OpenAPI specification generation and app factory.

use crate::{
    config::MetricsConfig,
    handlers::{create_metric, get_asn, get_metrics, health, version},
    middleware::{BasicAuth, RequestIdMiddleware, record_metrics},
    services::{AppMetrics, MetricRelay},
};
use actix_web::{App, body::MessageBody};
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};
use std::sync::Arc;

/// Everything the HTTP layer shares across workers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<MetricRelay>,
    pub metrics: AppMetrics,
    pub metrics_config: MetricsConfig,
    /// Basic auth user and password; `None` leaves the routes open
    pub credentials: Option<(String, String)>,
}

/// Creates the shared OpenAPI specification for the relay
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "Cerberus Relay".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Metrics relay with inline abuse detection.\n\n\
                Metrics posted to `/metric` are forwarded to Riemann. Metrics from the \
                `core_api.response_time` service are enriched with the caller's ASN and \
                counted per IP and per ASN; rules that detect brute-force login or error \
                bursts raise a `cerberus.alert` event and trigger a Jenkins block job.\n\
                \n\
                ## Authentication\n\
                When `AUTH_USER` and `AUTH_PASSWORD` are set, `/metric` and `/asn` require \
                HTTP basic authentication. Routes under `/api/` stay public."
                    .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Creates the relay application
///
/// Wires the ingestion and lookup routes behind basic auth, the public
/// health/version/metrics routes, request IDs, request metrics and the
/// OpenAPI document at `/api/spec/v2`.
pub fn create_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(BasicAuth::new(state.credentials.clone()))
        .wrap(RequestIdMiddleware)
        .wrap(actix_web::middleware::from_fn(record_metrics))
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(web::Data::from(state.relay))
        .app_data(web::Data::new(state.metrics_config))
        .app_data(web::Data::new(state.metrics))
        .service(web::resource("/metric").route(web::post().to(create_metric)))
        .service(web::resource("/asn").route(web::get().to(get_asn)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
