//! HTTP Transport
//!
//! Transport for the agent REST API.
//!
//! # Agent API
//!
//! - `GET  /health/` - liveness probe
//! - `GET  /agents/` - list agents
//! - `POST /agents/{id}/chat` - send a message to one agent
//! - `POST /teams/{id}/chat` - send a message to a multi-agent team
//!
//! The chat endpoints answer with the agent's full reply in the response
//! body. The transport treats the 2xx response as the delivery
//! acknowledgment: `send_message` returns first, and the reply reaches
//! subscribers from a task spawned at that point. Callers therefore see the
//! acknowledgment before the reply, the same split as with any other
//! transport.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::{route_for, AgentKind};
use crate::messages::{preview, ChatMessage};

use super::config::HttpTransportConfig;
use super::subscribers::SubscriberRegistry;
use super::traits::{AgentTransport, MessageHandler, Subscription, TransportError};

/// Longest error body carried in a [`TransportError::Status`]
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Request body for the chat endpoints
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    stream: bool,
}

/// Response body of the chat endpoints
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default, alias = "team_name")]
    agent_name: Option<String>,
    #[serde(default)]
    response: String,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentListResponse {
    agents: BTreeMap<String, AgentSummary>,
}

#[derive(Debug, Deserialize)]
struct AgentSummary {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// An agent advertised by the API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteAgent {
    /// Agent ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Description, if the API provides one
    pub description: Option<String>,
}

/// HTTP transport client
pub struct HttpTransport {
    config: HttpTransportConfig,
    http_client: reqwest::Client,
    subscribers: SubscriberRegistry,
    connected: AtomicBool,
}

impl HttpTransport {
    /// Create a new transport
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            subscribers: SubscriberRegistry::new(),
            connected: AtomicBool::new(false),
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Whether `connect` succeeded more recently than `disconnect`
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn health_url(&self) -> String {
        format!("{}/health/", self.config.base_url)
    }

    fn agents_url(&self) -> String {
        format!("{}/agents/", self.config.base_url)
    }

    /// Chat endpoint for an agent ID
    #[must_use]
    pub fn chat_url(&self, agent_id: &str) -> String {
        let (kind, route) = route_for(agent_id);
        let collection = match kind {
            AgentKind::Agent => "agents",
            AgentKind::Team => "teams",
        };
        format!("{}/{collection}/{route}/chat", self.config.base_url)
    }

    /// Fetch the agents the API currently serves
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is malformed.
    pub async fn list_agents(&self) -> Result<Vec<RemoteAgent>, TransportError> {
        let response = self.http_client.get(self.agents_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let list: AgentListResponse = response.json().await?;
        Ok(list
            .agents
            .into_iter()
            .map(|(id, summary)| RemoteAgent {
                id,
                name: summary.name,
                description: summary.description,
            })
            .collect())
    }
}

#[async_trait]
impl AgentTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }

        if self.config.health_check_on_connect {
            let response = self
                .http_client
                .get(self.health_url())
                .timeout(Duration::from_secs(5))
                .send()
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransportError::ConnectionFailed(format!(
                    "health check returned {}",
                    response.status()
                )));
            }
        }

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(base_url = %self.config.base_url, "Agent API connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!(base_url = %self.config.base_url, "Agent API disconnected");
        }
        Ok(())
    }

    async fn send_message(&self, content: &str, agent_id: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::InvalidState(
                "Transport not connected".to_string(),
            ));
        }

        let url = self.chat_url(agent_id);
        tracing::debug!(url = %url, agent_id = %agent_id, "Posting chat message");

        let response = self
            .http_client
            .post(&url)
            .json(&ChatRequest {
                message: content,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let reply = interpret_chat_response(status, &body)?;

        // Publish after the caller has seen the acknowledgment
        let subscribers = self.subscribers.clone();
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let delivered = subscribers.publish(&ChatMessage::assistant(reply));
            tracing::debug!(agent_id = %agent_id, delivered, "Agent reply published");
        });
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        self.subscribers.subscribe(handler)
    }
}

/// Map a chat endpoint response to the reply text
fn interpret_chat_response(status: u16, body: &str) -> Result<String, TransportError> {
    if !(200..300).contains(&status) {
        return Err(status_error(status, body));
    }

    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::SerializationError(e.to_string()))?;

    if parsed.success {
        Ok(parsed.response)
    } else {
        let agent = parsed.agent_name.unwrap_or_else(|| "agent".to_string());
        let reason = parsed.error.unwrap_or_else(|| "unknown error".to_string());
        Err(TransportError::Rejected(format!("{agent}: {reason}")))
    }
}

fn status_error(status: u16, body: &str) -> TransportError {
    TransportError::Status {
        status,
        body: preview(body, MAX_ERROR_BODY_CHARS),
    }
}
