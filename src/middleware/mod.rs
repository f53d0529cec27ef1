//! Custom middleware implementations for the API.
//!
//! Basic authentication, request IDs and request metrics.

pub mod basic_auth;
pub mod metrics;
pub mod request_id;

pub use basic_auth::*;
pub use metrics::*;
pub use request_id::*;
