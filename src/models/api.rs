//! API response models for standard endpoints.

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

/// Response model for the health check endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the detection engine's windows are running
    pub cerberus: String,
}

/// Response model for the version information endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

/// Query parameters for the ASN lookup endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct AsnQuery {
    /// IPv4 or IPv6 address
    pub ip: Option<String>,
}

/// Response model for the ASN lookup endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct AsnResponse {
    pub asn: String,
    pub ip: String,
}
