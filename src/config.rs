use std::env;
use anyhow::{Context, Result};

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The duration of a login session in days.
    pub session_duration_days: i64,
    /// The origins allowed by CORS.
    pub cors_allowed_origins: Vec<String>,
    /// The base URL of the external support gateway, if relay is configured.
    pub gateway_base_url: Option<String>,
    /// The OAuth client id for the support gateway.
    pub gateway_client_id: Option<String>,
    /// The OAuth client secret for the support gateway.
    pub gateway_client_secret: Option<String>,
    /// The open-messaging deployment id used as the outbound sender address.
    pub gateway_deployment_id: Option<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            cors_allowed_origins,
            gateway_base_url: env::var("GATEWAY_BASE_URL").ok(),
            gateway_client_id: env::var("GATEWAY_CLIENT_ID").ok(),
            gateway_client_secret: env::var("GATEWAY_CLIENT_SECRET").ok(),
            gateway_deployment_id: env::var("GATEWAY_DEPLOYMENT_ID").ok(),
        })
    }

    /// Whether all gateway credentials are present.
    pub fn gateway_configured(&self) -> bool {
        self.gateway_base_url.is_some()
            && self.gateway_client_id.is_some()
            && self.gateway_client_secret.is_some()
            && self.gateway_deployment_id.is_some()
    }
}
