//! Jenkins blocking-job settings.

use std::env;
use url::Url;

/// Credentials and location of the Jenkins server that applies blocks
#[derive(Debug, Clone)]
pub struct JenkinsConfig {
    /// Jenkins root URL; actions run in dry-run mode when unset
    pub base_url: Option<String>,
    pub token: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
    /// Value sent as the `host` parameter of ASN block jobs
    pub protected_host: String,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_seconds: 30,
            protected_host: "https://www.tropipay.com".to_string(),
        }
    }
}

impl JenkinsConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout_seconds = env::var("JENKINS_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_seconds);

        Self {
            base_url: env::var("JENKINS_BASE_URL").ok().filter(|v| !v.is_empty()),
            token: env::var("JENKINS_TOKEN").unwrap_or_default(),
            username: env::var("JENKINS_USERNAME").unwrap_or_default(),
            password: env::var("JENKINS_PASSWORD").unwrap_or_default(),
            timeout_seconds,
            protected_host: env::var("JENKINS_PROTECTED_HOST")
                .unwrap_or(defaults.protected_host),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Build the `buildWithParameters` URL for a job
    pub fn job_url(&self, job: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.as_deref().unwrap_or_default();
        Url::parse(&format!(
            "{}/job/{}/buildWithParameters",
            base.trim_end_matches('/'),
            job
        ))
    }
}
