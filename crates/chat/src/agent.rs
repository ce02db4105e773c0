//! The tool-use loop: send the conversation to the model, run any tool
//! requests through the MCP dispatcher, repeat until the model answers in
//! plain text.

use std::sync::Arc;

use async_trait::async_trait;

use mh_domain::tool::{ContentPart, Message, Role};
use mh_mcp_client::McpManager;
use mh_providers::{ChatRequest, LlmProvider};

use crate::error::ChatError;

/// An accumulating message list plus the rule for turning user input into
/// messages.
#[async_trait]
pub trait Conversation: Send + Sync {
    async fn process_query(&mut self, query: &str) -> Result<(), ChatError>;
    fn messages(&self) -> &[Message];
    fn push(&mut self, message: Message);
}

/// Appends each query verbatim as a user turn.
#[derive(Debug, Default)]
pub struct PlainConversation {
    messages: Vec<Message>,
}

impl PlainConversation {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Conversation for PlainConversation {
    async fn process_query(&mut self, query: &str) -> Result<(), ChatError> {
        self.messages.push(Message::user(query));
        Ok(())
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Chat {
    provider: Arc<dyn LlmProvider>,
    manager: Arc<McpManager>,
    conversation: Box<dyn Conversation>,
    max_tool_rounds: usize,
    model: Option<String>,
}

impl Chat {
    pub fn new(provider: Arc<dyn LlmProvider>, manager: Arc<McpManager>) -> Self {
        Self {
            provider,
            manager,
            conversation: Box::new(PlainConversation::new()),
            max_tool_rounds: 8,
            model: None,
        }
    }

    pub fn with_conversation(mut self, conversation: impl Conversation + 'static) -> Self {
        self.conversation = Box::new(conversation);
        self
    }

    /// Cap on model calls per query. Zero is treated as one.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Answer one user query, running tool calls as the model requests them.
    ///
    /// Returns the text of the model's last turn. When the round cap is hit
    /// the pending tool calls are still answered so the conversation stays
    /// well formed for the next query.
    pub async fn run(&mut self, query: &str) -> Result<String, ChatError> {
        self.conversation.process_query(query).await?;

        let mut round = 0;
        loop {
            round += 1;
            let request = ChatRequest {
                messages: self.conversation.messages().to_vec(),
                tools: self.manager.aggregate_tools().await?,
                model: self.model.clone(),
                ..Default::default()
            };
            let response = self.provider.chat(request).await?;
            let calls = response.tool_calls().len();
            let text = response.text();
            let turn = response.message;

            if calls == 0 {
                self.conversation.push(turn);
                return Ok(text);
            }

            tracing::debug!(round, tool_calls = calls, "model requested tools");
            let blocks = self.manager.execute_tool_requests(&turn).await;
            self.conversation.push(turn);
            self.conversation.push(Message::parts(
                Role::User,
                blocks.into_iter().map(ContentPart::from).collect(),
            ));

            if round >= self.max_tool_rounds {
                tracing::warn!(rounds = round, "tool round limit reached, stopping");
                return Ok(text);
            }
        }
    }
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("provider", &self.provider.provider_id())
            .field("servers", &self.manager.len())
            .field("messages", &self.conversation.messages().len())
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}
