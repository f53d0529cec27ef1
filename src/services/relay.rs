//! Metric forwarding with ASN enrichment and abuse analysis.
//!
//! Every metric is forwarded to the event store. Metrics from the API
//! response-time service are first enriched with the caller's ASN and
//! counted by Cerberus; failures in either step are logged and never stop
//! the forward.

use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    models::Metric,
    services::{
        asn::AsnResolver,
        cerberus::{Cerberus, CerberusError},
        riemann::{Event, EventSink, SinkError},
    },
};

/// Service whose metrics carry per-request caller details
pub const RESPONSE_TIME_SERVICE: &str = "core_api.response_time";

/// Paths counted as login attempts
pub const LOGIN_URLS: [&str; 2] = ["/api/v2/access/login", "/api/access/login"];

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0} not found in attributes")]
    MissingAttribute(&'static str),

    #[error("analysis failed: {0}")]
    Analysis(#[from] CerberusError),

    #[error("failed to forward metric: {0}")]
    Sink(#[from] SinkError),
}

/// Detection inputs extracted from a response-time metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub ip: String,
    pub asn: String,
    pub is_login: bool,
    pub is_unauthorized: bool,
}

/// Extract the detection inputs, naming the first missing attribute
pub fn classify(metric: &Metric) -> Result<Classification, RelayError> {
    let ip = metric
        .attribute("ip")
        .ok_or(RelayError::MissingAttribute("ip"))?;
    let asn = metric
        .attribute("asn")
        .ok_or(RelayError::MissingAttribute("asn"))?;
    let url = metric
        .attribute("url")
        .ok_or(RelayError::MissingAttribute("url"))?;
    let status_code = metric
        .attribute("status_code")
        .ok_or(RelayError::MissingAttribute("status_code"))?;

    Ok(Classification {
        ip: ip.to_string(),
        asn: asn.to_string(),
        is_login: LOGIN_URLS.contains(&url),
        is_unauthorized: matches!(status_code, "401" | "403"),
    })
}

/// Build the event-store representation of a metric
pub fn to_event(metric: &Metric) -> Event {
    Event {
        service: metric.service.clone(),
        description: metric.description.clone(),
        metric: metric.metric,
        state: metric.state.as_str().to_string(),
        host: metric.host.clone(),
        tags: metric.tags.clone().unwrap_or_default(),
        ttl: metric.ttl.filter(|ttl| *ttl > 0).map(Duration::from_secs),
        attributes: metric
            .attributes
            .as_ref()
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default(),
    }
}

pub struct MetricRelay {
    sink: Arc<dyn EventSink>,
    resolver: Arc<AsnResolver>,
    cerberus: Arc<Cerberus>,
}

impl MetricRelay {
    pub fn new(sink: Arc<dyn EventSink>, resolver: Arc<AsnResolver>, cerberus: Arc<Cerberus>) -> Self {
        Self {
            sink,
            resolver,
            cerberus,
        }
    }

    pub fn resolver(&self) -> &AsnResolver {
        &self.resolver
    }

    pub fn cerberus(&self) -> &Cerberus {
        &self.cerberus
    }

    /// Enrich, analyze and forward one metric
    pub async fn send(&self, metric: &mut Metric) -> Result<(), RelayError> {
        if metric.service == RESPONSE_TIME_SERVICE {
            self.enrich(metric).await;
            if let Err(e) = self.analyze(metric).await {
                warn!(service = %metric.service, error = %e, "Skipping abuse analysis");
            }
        }

        self.sink.send_event(&to_event(metric)).await?;
        Ok(())
    }

    async fn enrich(&self, metric: &mut Metric) {
        let Some(ip) = metric.attribute("ip").map(String::from) else {
            warn!("ip not found in attributes");
            return;
        };

        match self.resolver.resolve(&ip).await {
            Ok(asn) => {
                debug!(ip = %ip, asn = %asn, "Metric enriched with ASN");
                metric.set_attribute("asn", asn);
            }
            Err(e) => warn!(ip = %ip, error = %e, "ASN lookup failed"),
        }
    }

    async fn analyze(&self, metric: &Metric) -> Result<(), RelayError> {
        let class = classify(metric)?;
        self.cerberus
            .analyze(&class.ip, &class.asn, class.is_login, class.is_unauthorized)
            .await?;
        Ok(())
    }
}
