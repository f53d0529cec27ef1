//! HTTP server and authentication settings.

use std::env;

/// Listener address and basic-auth credentials for the relay API
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth_user: Option<String>,
    pub auth_password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_user: None,
            auth_password: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let auth_user = env::var("AUTH_USER").ok().filter(|v| !v.is_empty());
        let auth_password = env::var("AUTH_PASSWORD").ok();

        Self {
            host,
            port,
            auth_user,
            auth_password,
        }
    }

    /// Basic-auth credentials, present only when both user and password are set
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.auth_user, &self.auth_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::ENV_MUTEX;

    #[test]
    fn test_server_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::set_var("SERVER_PORT", "9090");
            env::set_var("AUTH_USER", "relay");
            env::set_var("AUTH_PASSWORD", "s3cret");
        }

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9090);
        assert_eq!(
            config.credentials(),
            Some(("relay".to_string(), "s3cret".to_string()))
        );

        unsafe {
            env::remove_var("SERVER_PORT");
            env::remove_var("AUTH_USER");
            env::remove_var("AUTH_PASSWORD");
        }
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let config = ServerConfig {
            auth_user: Some("relay".to_string()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
    }
}
