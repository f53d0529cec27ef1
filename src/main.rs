use actix_web::HttpServer;
use cerberus_relay::{ServerConfig, create_app, startup};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    startup::init_tracing();

    let server = ServerConfig::from_env();
    let services = match startup::Services::from_env(&server).await {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    if server.credentials().is_none() {
        info!("AUTH_USER/AUTH_PASSWORD not set, ingestion routes are unauthenticated");
    }

    let (host, port) = server.bind_address();
    info!(host = %host, port, rules = ?services.cerberus.rule_names(), "Relay listening");

    let state = services.state.clone();
    HttpServer::new(move || create_app(state.clone()))
        .bind((host.as_str(), port))?
        .run()
        .await
}
