//! Process bootstrap: logging, configuration and service wiring.

use std::{env, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{AsnConfig, CerberusConfig, ConfigError, JenkinsConfig, MetricsConfig, RiemannConfig, ServerConfig},
    handlers::AppState,
    services::{
        AppMetrics, AsnResolver, Cerberus, CerberusError, EventSink, MetricRelay,
        asn::{AsnCacheStore, AsnError, DnsTxtResolver, MemoryAsnCache, RedisAsnCache},
        cerberus::{Action, ActionError, BlockAction, JenkinsClient},
        riemann::RiemannClient,
    },
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to initialize DNS resolver: {0}")]
    Asn(#[from] AsnError),

    #[error("failed to create Jenkins client: {0}")]
    Action(#[from] ActionError),

    #[error("failed to start detection engine: {0}")]
    Cerberus(#[from] CerberusError),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`); `LOG_FORMAT=json` switches
/// to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}

/// The running services behind the HTTP layer
pub struct Services {
    pub state: AppState,
    pub cerberus: Arc<Cerberus>,
}

impl Services {
    /// Build and start every service from the environment
    pub async fn from_env(server: &ServerConfig) -> Result<Self, StartupError> {
        let metrics = AppMetrics::new()?;
        let metrics_config = MetricsConfig::from_env();
        let riemann_config = RiemannConfig::from_env();
        let jenkins_config = JenkinsConfig::from_env();
        let asn_config = AsnConfig::from_env();
        let cerberus_config = CerberusConfig::from_env()?;

        let riemann = Arc::new(RiemannClient::new(&riemann_config));
        if let Err(e) = riemann.connect().await {
            warn!(address = %riemann_config.address, error = %e, "Riemann unavailable, will retry on first event");
        }
        let sink: Arc<dyn EventSink> = riemann;

        let cache = asn_cache(&asn_config).await;
        let resolver = AsnResolver::new(
            Arc::new(DnsTxtResolver::from_system_conf()?),
            cache,
            asn_config.cache_ttl(),
        )
        .with_metrics(metrics.clone());

        let jenkins = if jenkins_config.is_enabled() {
            Some(JenkinsClient::new(jenkins_config)?)
        } else {
            warn!("JENKINS_BASE_URL not set, blocks will only be logged");
            None
        };

        let cerberus = Cerberus::from_config(&cerberus_config, Some(metrics.clone()), |rule| {
            Arc::new(BlockAction::new(rule.scope, jenkins.clone(), Arc::clone(&sink))) as Arc<dyn Action>
        })?;
        cerberus.start()?;
        let cerberus = Arc::new(cerberus);

        let relay = Arc::new(MetricRelay::new(
            Arc::clone(&sink),
            Arc::new(resolver),
            Arc::clone(&cerberus),
        ));

        Ok(Self {
            state: AppState {
                relay,
                metrics,
                metrics_config,
                credentials: server.credentials(),
            },
            cerberus,
        })
    }
}

async fn asn_cache(config: &AsnConfig) -> Arc<dyn AsnCacheStore> {
    if let Some(url) = &config.redis_url {
        match RedisAsnCache::connect(url).await {
            Ok(cache) => {
                info!("Using Redis for the ASN cache");
                return Arc::new(cache);
            }
            Err(e) => warn!(error = %e, "Redis unavailable, using in-process ASN cache"),
        }
    }

    Arc::new(MemoryAsnCache::new())
}
