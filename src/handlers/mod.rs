//! HTTP request handlers for API endpoints.
//!
//! This module contains all the HTTP request handlers that process
//! incoming requests and generate responses.

pub mod asn;
pub mod health;
pub mod metric;
pub mod metrics;
pub mod openapi;
pub mod version;

pub use asn::*;
pub use health::*;
pub use metric::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
