//! Document chat: `@mention` expansion and `/command` prompts backed by one
//! designated MCP server.
//!
//! The server is expected to expose:
//! - a JSON resource at the index URI listing every document id,
//! - one text resource per document at `<prefix><id>`,
//! - prompts taking a single `doc_id` argument.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use mh_domain::config::ChatConfig;
use mh_domain::tool::{ContentPart, Message, MessageContent, Role};
use mh_mcp_client::protocol::{ContentBlock, PromptContent, PromptDef, PromptMessage};
use mh_mcp_client::{McpClient, McpError, ResourceValue};

use crate::agent::Conversation;
use crate::error::ChatError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DocumentChat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DocumentChat {
    client: Arc<McpClient>,
    index_uri: String,
    uri_prefix: String,
    messages: Vec<Message>,
}

impl DocumentChat {
    /// Use the default `docs://documents` resource layout.
    pub fn new(client: Arc<McpClient>) -> Self {
        Self::from_config(client, &ChatConfig::default())
    }

    pub fn from_config(client: Arc<McpClient>, config: &ChatConfig) -> Self {
        Self {
            client,
            index_uri: config.document_index_uri.clone(),
            uri_prefix: config.document_uri_prefix.clone(),
            messages: Vec::new(),
        }
    }

    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    /// The conversation so far, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDef>, ChatError> {
        Ok(self.client.list_prompts().await?)
    }

    /// Ids listed by the index resource. A missing index means no documents.
    pub async fn list_document_ids(&self) -> Result<Vec<String>, ChatError> {
        let value = match self.client.read_resource(&self.index_uri).await? {
            Some(ResourceValue::Json(v)) => v,
            Some(ResourceValue::Text(t)) => serde_json::from_str(&t).map_err(|e| {
                McpError::Protocol(format!("document index {} is not JSON: {e}", self.index_uri))
            })?,
            None => return Ok(Vec::new()),
        };

        let ids = value.as_array().ok_or_else(|| {
            McpError::Protocol(format!("document index {} is not a JSON array", self.index_uri))
        })?;
        Ok(ids
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect())
    }

    /// Text content of one document, or `None` when the server returns
    /// nothing readable for it.
    pub async fn document_content(&self, doc_id: &str) -> Result<Option<String>, ChatError> {
        let uri = format!("{}{doc_id}", self.uri_prefix);
        Ok(self.client.read_resource(&uri).await?.map(ResourceValue::into_text))
    }

    /// Build the `<document>` context block for every `@mention` in `query`
    /// that names a known document. Unknown mentions are skipped; the result
    /// is empty when nothing matches.
    pub async fn expand_mentions(&self, query: &str) -> Result<String, ChatError> {
        let mentioned = mentions(query);
        if mentioned.is_empty() {
            return Ok(String::new());
        }

        let known = self.list_document_ids().await?;
        let mut blocks = Vec::new();
        for id in mentioned {
            if !known.iter().any(|k| k == id) {
                tracing::debug!(doc_id = id, "mention does not name a known document");
                continue;
            }
            if let Some(content) = self.document_content(id).await? {
                blocks.push(format!("<document id=\"{id}\">{content}</document>"));
            }
        }
        Ok(blocks.join("\n"))
    }

    /// Run `query` as a `/prompt doc_id` command if it is one.
    ///
    /// Returns `Ok(false)` without touching the conversation when `query`
    /// does not start with `/`. The prompt name is the rest of the first
    /// word, so `/ name doc` is rejected. On success the rendered prompt
    /// messages are appended and `Ok(true)` is returned.
    pub async fn maybe_handle_command(&mut self, query: &str) -> Result<bool, ChatError> {
        if !query.starts_with('/') {
            return Ok(false);
        }

        let mut words = query.split_whitespace();
        let name = words
            .next()
            .and_then(|w| w.strip_prefix('/'))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ChatError::InvalidCommand("missing prompt name after '/'".into()))?;
        let doc_id = words.next().ok_or_else(|| {
            ChatError::InvalidCommand(format!("/{name} needs a document id, e.g. /{name} report.pdf"))
        })?;

        let arguments = HashMap::from([("doc_id".to_string(), doc_id.to_string())]);
        let rendered = self.client.get_prompt(name, &arguments).await?;
        tracing::debug!(prompt = name, doc_id, messages = rendered.len(), "prompt command expanded");

        self.messages.extend(rendered.iter().map(convert_prompt_message));
        Ok(true)
    }

    /// Fold one user query into the conversation.
    pub async fn process_query(&mut self, query: &str) -> Result<(), ChatError> {
        if self.maybe_handle_command(query).await? {
            return Ok(());
        }
        let context = self.expand_mentions(query).await?;
        self.messages.push(Message::user(user_prompt(query, &context)));
        Ok(())
    }
}

#[async_trait]
impl Conversation for DocumentChat {
    async fn process_query(&mut self, query: &str) -> Result<(), ChatError> {
        DocumentChat::process_query(self, query).await
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

impl std::fmt::Debug for DocumentChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentChat")
            .field("server", &self.client.name())
            .field("index_uri", &self.index_uri)
            .field("messages", &self.messages.len())
            .finish()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Document ids mentioned in `query`, in first-appearance order without
/// duplicates. A bare `@` is not a mention.
pub fn mentions(query: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for id in query.split_whitespace().filter_map(|w| w.strip_prefix('@')) {
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Map a prompt message onto an LLM turn.
///
/// Role `user` stays user; every other role becomes assistant. A single text
/// block keeps its text; a list keeps only its text blocks. Content with no
/// text at all becomes an empty text turn rather than being dropped.
pub fn convert_prompt_message(message: &PromptMessage) -> Message {
    let role = if message.role == "user" { Role::User } else { Role::Assistant };
    let content = match &message.content {
        PromptContent::Single(ContentBlock::Text { text }) => MessageContent::Text(text.clone()),
        PromptContent::Blocks(blocks) => {
            let parts: Vec<ContentPart> = blocks
                .iter()
                .filter_map(|b| b.as_text().map(|text| ContentPart::Text { text: text.to_owned() }))
                .collect();
            if parts.is_empty() {
                MessageContent::Text(String::new())
            } else {
                MessageContent::Parts(parts)
            }
        }
        PromptContent::Single(_) => MessageContent::Text(String::new()),
    };
    Message { role, content }
}

fn user_prompt(query: &str, context: &str) -> String {
    format!(
        "The user has a question:\n\
         <query>\n{query}\n</query>\n\n\
         The following context may be useful in answering their question:\n\
         <context>\n{context}\n</context>\n\n\
         Note the user's query might contain references to documents like \
         \"@report.docx\". The \"@\" is only included as a way of mentioning \
         the doc. The actual name of the document would be \"report.docx\". \
         If the document content is included in this prompt, you don't need \
         to use an additional tool to read the document.\n\
         Answer the user's question directly and concisely. Start with the \
         exact information they need. Don't refer to or mention the provided \
         context in any way - just use it to inform your answer."
    )
}
