//! The automated backend that decides how to answer a user message.
//!
//! The decision surface is a trait so the deterministic rule-based
//! implementation shipped here can be swapped for a model-backed one
//! without touching the message flow.

use async_trait::async_trait;

/// One prior turn of the conversation, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Who authored a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Everything the responder may consider for one incoming message.
pub struct RouteRequest<'a> {
    /// Caller-supplied system prompt for the automated backend.
    pub system_prompt: &'a str,
    /// The user's new message.
    pub question: &'a str,
    /// Prior conversation, oldest first.
    pub history: &'a [HistoryTurn],
    /// Whether this chat is already bridged to a live gateway conversation.
    pub relay_active: bool,
    /// Whether gateway credentials are configured at all.
    pub gateway_available: bool,
}

/// What to do with an incoming user message. Either side may be empty;
/// both may be set when escalating (inform the user while forwarding).
#[derive(Debug, Default, PartialEq)]
pub struct RoutingDecision {
    /// A system reply shown only to the user.
    pub reply_to_user: Option<String>,
    /// Content to forward to the gateway, speaking as the customer.
    pub forward_to_gateway: Option<String>,
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn route(&self, request: RouteRequest<'_>) -> RoutingDecision;
}

/// Phrases that indicate the user wants a live agent.
const ESCALATION_PHRASES: &[&str] = &[
    "human",
    "agent",
    "representative",
    "live person",
    "real person",
];

/// Deterministic routing:
/// once a chat is bridged, everything the user says goes to the agent;
/// otherwise an explicit ask for a person starts the bridge; everything
/// else gets an acknowledgment.
pub struct RuleBasedResponder;

impl RuleBasedResponder {
    fn wants_agent(question: &str) -> bool {
        let lowered = question.to_lowercase();
        ESCALATION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
    }
}

#[async_trait]
impl Responder for RuleBasedResponder {
    async fn route(&self, request: RouteRequest<'_>) -> RoutingDecision {
        if request.relay_active && request.gateway_available {
            // The live agent owns the conversation; relay verbatim.
            return RoutingDecision {
                reply_to_user: None,
                forward_to_gateway: Some(request.question.to_string()),
            };
        }

        if Self::wants_agent(request.question) {
            if request.gateway_available {
                return RoutingDecision {
                    reply_to_user: Some(
                        "I'm connecting you with a live support agent. Your message has \
                         been forwarded and the agent will respond here shortly."
                            .to_string(),
                    ),
                    forward_to_gateway: Some(request.question.to_string()),
                };
            }
            return RoutingDecision {
                reply_to_user: Some(
                    "Live agents are not available right now, but your message has been \
                     recorded and our team will follow up."
                        .to_string(),
                ),
                forward_to_gateway: None,
            };
        }

        RoutingDecision {
            reply_to_user: Some(
                "Thanks for your message. I've noted it. If you'd like to speak with a \
                 live support agent at any point, just ask for an agent."
                    .to_string(),
            ),
            forward_to_gateway: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        question: &'a str,
        relay_active: bool,
        gateway_available: bool,
    ) -> RouteRequest<'a> {
        RouteRequest {
            system_prompt: "You are a support assistant.",
            question,
            history: &[],
            relay_active,
            gateway_available,
        }
    }

    #[tokio::test]
    async fn active_relay_forwards_verbatim_without_reply() {
        let decision = RuleBasedResponder
            .route(request("my account id is 12345678", true, true))
            .await;
        assert_eq!(
            decision.forward_to_gateway.as_deref(),
            Some("my account id is 12345678")
        );
        assert!(decision.reply_to_user.is_none());
    }

    #[tokio::test]
    async fn asking_for_an_agent_escalates_and_informs_user() {
        let decision = RuleBasedResponder
            .route(request("I want to talk to a HUMAN please", false, true))
            .await;
        assert!(decision.forward_to_gateway.is_some());
        assert!(decision.reply_to_user.is_some());
    }

    #[tokio::test]
    async fn escalation_without_gateway_only_replies() {
        let decision = RuleBasedResponder
            .route(request("get me an agent", false, false))
            .await;
        assert!(decision.forward_to_gateway.is_none());
        assert!(decision.reply_to_user.is_some());
    }

    #[tokio::test]
    async fn ordinary_questions_get_an_acknowledgment_only() {
        let decision = RuleBasedResponder
            .route(request("what are your opening hours?", false, true))
            .await;
        assert!(decision.forward_to_gateway.is_none());
        assert!(decision.reply_to_user.is_some());
    }
}
