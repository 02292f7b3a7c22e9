//! Outbound client for the external support gateway's open-messaging API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{AppError, Result};

/// The seam between the chat flow and the contact-center platform. The
/// relay path always goes through this trait so deployments without
/// gateway credentials inject [`NoopGateway`] instead of branching on a
/// runtime flag inside the message flow.
#[async_trait]
pub trait SupportGateway: Send + Sync {
    /// Whether outbound sends can actually reach a gateway.
    fn is_configured(&self) -> bool;

    /// Delivers one message to the gateway conversation addressed by
    /// `to_address`. Returns the gateway-assigned message id, if the
    /// gateway reported one.
    async fn send_message(&self, to_address: &str, content: &str) -> Result<Option<String>>;
}

/// Builds the gateway implementation matching the configuration.
pub fn from_config(config: &Config) -> Arc<dyn SupportGateway> {
    if config.gateway_configured() {
        tracing::info!("Support gateway relay enabled");
        Arc::new(OpenMessagingGateway::new(
            config.gateway_base_url.clone().unwrap_or_default(),
            config.gateway_client_id.clone().unwrap_or_default(),
            config.gateway_client_secret.clone().unwrap_or_default(),
            config.gateway_deployment_id.clone().unwrap_or_default(),
        ))
    } else {
        tracing::warn!("Support gateway credentials not set; relay is a no-op");
        Arc::new(NoopGateway)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct AgentlessSendResponse {
    id: Option<String>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// HTTP implementation speaking OAuth2 client-credentials plus the
/// agentless open-messaging send endpoint.
pub struct OpenMessagingGateway {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    deployment_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl OpenMessagingGateway {
    pub fn new(
        base_url: String,
        client_id: String,
        client_secret: String,
        deployment_id: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            client_id,
            client_secret,
            deployment_id,
            token: Mutex::new(None),
        }
    }

    /// Returns a cached OAuth token, refreshing it when less than a minute
    /// of validity remains.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!("{}/oauth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Token request rejected: {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        tracing::debug!("Refreshed gateway access token");
        Ok(access_token)
    }
}

#[async_trait]
impl SupportGateway for OpenMessagingGateway {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_message(&self, to_address: &str, content: &str) -> Result<Option<String>> {
        let access_token = self.access_token().await?;
        let url = format!("{}/api/v2/conversations/messages/agentless", self.base_url);

        let payload = sonic_rs::json!({
            "fromAddress": self.deployment_id,
            "toAddress": to_address,
            "textBody": content,
            "messengerType": "open",
            "useExistingConversation": true,
        });

        tracing::info!(to_address, "sending open message to gateway");
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(sonic_rs::to_string(&payload).unwrap_or_default())
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Send failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "Send rejected: {} {}",
                status, body
            )));
        }

        let sent: AgentlessSendResponse = response
            .json()
            .await
            .unwrap_or(AgentlessSendResponse { id: None });
        Ok(sent.id)
    }
}

/// Injected when no gateway credentials are configured: relay decisions
/// still run, sends go nowhere and yield no gateway message id.
pub struct NoopGateway;

#[async_trait]
impl SupportGateway for NoopGateway {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send_message(&self, to_address: &str, _content: &str) -> Result<Option<String>> {
        tracing::debug!(to_address, "gateway not configured; dropping outbound message");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_gateway_reports_unconfigured_and_yields_no_id() {
        let gateway = NoopGateway;
        assert!(!gateway.is_configured());
        let id = gateway.send_message("user+chat@example.com", "hello").await.unwrap();
        assert!(id.is_none());
    }
}
