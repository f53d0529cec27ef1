//! Metric ingestion payload.

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity reported with a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "lowercase")]
pub enum MetricState {
    Ok,
    Warning,
    Error,
    Critical,
}

impl MetricState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricState::Ok => "ok",
            MetricState::Warning => "warning",
            MetricState::Error => "error",
            MetricState::Critical => "critical",
        }
    }
}

/// A single application metric forwarded to the event store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Apiv2Schema)]
pub struct Metric {
    /// Emitting service, e.g. "core_api.response_time"
    pub service: String,
    pub description: String,
    pub metric: i64,
    pub state: MetricState,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Seconds the event stays valid in the event store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Free-form attributes; `ip`, `url` and `status_code` drive abuse detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl Metric {
    /// Reject payloads missing a required text field
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("service", &self.service),
            ("description", &self.description),
            ("host", &self.host),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{} is required", field));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.get(key))
            .map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: &str, value: String) {
        self.attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_validate() {
        let metric: Metric = serde_json::from_str(
            r#"{
                "service": "core_api.response_time",
                "description": "POST /api/v2/access/login",
                "metric": 87,
                "state": "ok",
                "host": "api-3",
                "attributes": {"ip": "203.0.113.4", "url": "/api/v2/access/login", "status_code": "401"}
            }"#,
        )
        .unwrap();

        assert!(metric.validate().is_ok());
        assert_eq!(metric.state, MetricState::Ok);
        assert_eq!(metric.attribute("status_code"), Some("401"));
        assert_eq!(metric.ttl, None);
    }

    #[test]
    fn test_blank_host_rejected() {
        let metric = Metric {
            service: "svc".to_string(),
            description: "d".to_string(),
            metric: 1,
            state: MetricState::Warning,
            host: "  ".to_string(),
            tags: None,
            ttl: None,
            attributes: None,
        };
        assert_eq!(metric.validate(), Err("host is required".to_string()));
    }

    #[test]
    fn test_unknown_state_rejected() {
        let parsed = serde_json::from_str::<Metric>(
            r#"{"service": "s", "description": "d", "metric": 1, "state": "fine", "host": "h"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_set_attribute_creates_map() {
        let mut metric: Metric = serde_json::from_str(
            r#"{"service": "s", "description": "d", "metric": 1, "state": "critical", "host": "h"}"#,
        )
        .unwrap();
        metric.set_attribute("asn", "15169".to_string());
        assert_eq!(metric.attribute("asn"), Some("15169"));
    }
}
