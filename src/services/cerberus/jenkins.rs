//! Client for the Jenkins jobs that apply IP and ASN blocks.

use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::{action::ActionError, trigger::Incident};
use crate::config::JenkinsConfig;

pub const IP_BLOCK_JOB: &str = "RiemannAlertIps";
pub const ASN_BLOCK_JOB: &str = "RiemannAlertASN";

/// Triggers parameterized Jenkins builds with basic auth
#[derive(Clone)]
pub struct JenkinsClient {
    client: Client,
    config: JenkinsConfig,
}

impl JenkinsClient {
    pub fn new(config: JenkinsConfig) -> Result<Self, ActionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    /// Start the job that blocks a single IP
    pub async fn block_ip(&self, ip: &str) -> Result<(), ActionError> {
        self.build(IP_BLOCK_JOB, &[("token", self.config.token.as_str()), ("ips", ip)])
            .await
    }

    /// Start the job that blocks a whole ASN in front of the protected host
    pub async fn block_asn(&self, asn: &str, incident: &Incident) -> Result<(), ActionError> {
        let ratio = format!("{:.2}", incident.ratio());
        let total = incident.total.to_string();
        let failed = incident.failed.to_string();

        self.build(
            ASN_BLOCK_JOB,
            &[
                ("token", self.config.token.as_str()),
                ("host", self.config.protected_host.as_str()),
                ("asn", asn),
                ("ratio", ratio.as_str()),
                ("total", total.as_str()),
                ("failed", failed.as_str()),
            ],
        )
        .await
    }

    async fn build(&self, job: &str, params: &[(&str, &str)]) -> Result<(), ActionError> {
        let url = self.config.job_url(job)?;

        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Status {
                job: job.to_string(),
                status: status.as_u16(),
            });
        }

        info!(job = %job, status = status.as_u16(), "Jenkins job triggered");
        Ok(())
    }
}
