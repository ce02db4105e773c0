use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "d_provider_id")]
    pub id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub default_model: String,
    /// Env var containing the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Token budget for ordinary chat turns.
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: d_provider_id(),
            base_url: d_base_url(),
            default_model: d_model(),
            api_key_env: d_api_key_env(),
            max_tokens: d_max_tokens(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_provider_id() -> String {
    "anthropic".into()
}
fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_model() -> String {
    "claude-3-5-haiku-20241022".into()
}
fn d_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_max_tokens() -> u32 {
    4000
}
fn d_timeout_ms() -> u64 {
    120_000
}
