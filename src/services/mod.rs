//! Business logic and service layer modules.
//!
//! This module contains the detection engine, ASN resolution, event store
//! publishing and the metric relay that ties them together.

pub mod asn;
pub mod cerberus;
pub mod metrics;
pub mod relay;
pub mod riemann;

pub use asn::{AsnError, AsnResolver};
pub use cerberus::{Cerberus, CerberusError};
pub use metrics::*;
pub use relay::*;
pub use riemann::*;
