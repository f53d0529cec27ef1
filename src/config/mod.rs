//! Configuration structures and loading utilities.
//!
//! This module contains all configuration structures used by the relay,
//! including environment variable loading, rule files and default values.

pub mod asn;
pub mod cerberus;
pub mod jenkins;
pub mod metrics;
pub mod riemann;
pub mod server;

pub use asn::*;
pub use cerberus::*;
pub use jenkins::*;
pub use metrics::*;
pub use riemann::*;
pub use server::*;
