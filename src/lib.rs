//! Cerberus Relay - a metrics relay with inline abuse detection
//!
//! Application components post metrics over HTTP; the relay forwards them to
//! Riemann and, for API response-time metrics, watches per-IP and per-ASN
//! login and error rates to catch brute-force and credential-stuffing
//! traffic. A firing rule raises an alert event and asks Jenkins to block
//! the offending IP or network.
//!
//! ## Architecture
//!
//! - `models/` - Request/response models
//! - `handlers/` - HTTP handlers and the app factory
//! - `middleware/` - Basic auth, request IDs, request metrics
//! - `services/` - Detection engine, ASN resolution, Riemann client, relay
//! - `utils/` - Request inspection helpers
//! - `config/` - Environment and rule-file configuration
//! - `startup` - Logging and service wiring for the binary
//!
//! ## Quick Start
//!
//! ```no_run
//! use cerberus_relay::{create_app, startup::Services, ServerConfig};
//! use actix_web::HttpServer;
//!
//! #[actix_web::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerConfig::from_env();
//!     let services = Services::from_env(&server).await?;
//!     let state = services.state.clone();
//!     HttpServer::new(move || create_app(state.clone()))
//!         .bind(server.bind_address())?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use config::{
    AsnConfig, CerberusConfig, ConfigError, JenkinsConfig, MetricsConfig, RiemannConfig,
    RuleConfig, RuleScope, ServerConfig, TriggerSpec, WindowSpec,
};
pub use handlers::{
    AppState, create_app, create_metric, create_openapi_spec, get_asn, get_metrics, health,
    version,
};
pub use middleware::{BasicAuth, PostedService, RequestId, RequestIdMiddleware, record_metrics};
pub use models::{AsnQuery, AsnResponse, HealthResponse, Metric, MetricState, VersionResponse};
pub use services::{
    AppMetrics, AsnError, AsnResolver, Cerberus, CerberusError, Event, EventSink, MetricRelay,
    RelayError, RiemannClient, SinkError,
};
