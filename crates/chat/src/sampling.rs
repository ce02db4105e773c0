//! Answers server-initiated `sampling/createMessage` requests with the
//! host's own LLM provider.

use std::sync::Arc;

use async_trait::async_trait;

use mh_domain::tool::{ContentPart, Message, MessageContent};
use mh_mcp_client::protocol::{ContentBlock, CreateMessageParams, CreateMessageResult};
use mh_mcp_client::{HandlerError, SamplingHandler};
use mh_providers::{ChatRequest, LlmProvider};

#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("model returned no text content")]
    NoText,
    #[error("LLM provider error: {0}")]
    Provider(#[from] mh_domain::error::Error),
}

/// Relays sampling requests to an [`LlmProvider`].
pub struct SamplingRelay {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl SamplingRelay {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider, model: None }
    }

    /// Pin the model used for sampling instead of the provider default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Run one sampling request through the provider.
    pub async fn relay(&self, params: CreateMessageParams) -> Result<CreateMessageResult, SamplingError> {
        let request = sampling_request(&params, self.model.clone());
        tracing::debug!(
            messages = request.messages.len(),
            max_tokens = params.max_tokens,
            provider = self.provider.provider_id(),
            "relaying sampling request"
        );

        let response = self.provider.chat(request).await?;
        let text = response_text(&response.message).ok_or(SamplingError::NoText)?;

        Ok(CreateMessageResult {
            role: "assistant".into(),
            content: ContentBlock::text(text),
            model: response.model,
            stop_reason: response.finish_reason.as_deref().map(stop_reason),
        })
    }
}

#[async_trait]
impl SamplingHandler for SamplingRelay {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, HandlerError> {
        self.relay(params).await.map_err(|e| {
            tracing::warn!(error = %e, "sampling request failed");
            Box::new(e) as HandlerError
        })
    }
}

/// Keep text messages from `user` and `assistant`; everything else is
/// dropped.
fn sampling_request(params: &CreateMessageParams, model: Option<String>) -> ChatRequest {
    let messages = params
        .messages
        .iter()
        .filter_map(|m| {
            let text = m.content.as_text()?;
            match m.role.as_str() {
                "user" => Some(Message::user(text)),
                "assistant" => Some(Message::assistant(text)),
                _ => None,
            }
        })
        .collect();

    ChatRequest {
        messages,
        system: params.system_prompt.clone(),
        temperature: params.temperature,
        max_tokens: Some(params.max_tokens),
        stop_sequences: params.stop_sequences.clone(),
        model,
        ..Default::default()
    }
}

/// All text parts joined, or `None` when the reply has no text part.
fn response_text(message: &Message) -> Option<String> {
    match &message.content {
        MessageContent::Text(t) => Some(t.clone()),
        MessageContent::Parts(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            (!texts.is_empty()).then(|| texts.concat())
        }
    }
}

fn stop_reason(finish_reason: &str) -> String {
    match finish_reason {
        "stop" => "endTurn".into(),
        "max_tokens" => "maxTokens".into(),
        "stop_sequence" => "stopSequence".into(),
        other => other.into(),
    }
}
