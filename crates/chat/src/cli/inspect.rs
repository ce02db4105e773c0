//! `mcphub tools` and `mcphub prompts`: read-only views of what the
//! configured servers offer.

use mh_domain::config::Config;

use crate::bootstrap::{self, Runtime};

/// Print the aggregated tool catalog, first owner first.
pub async fn tools(config: Config, json_output: bool) -> anyhow::Result<()> {
    let runtime = start(config).await?;
    let listed = runtime.manager.aggregate_tools().await;
    runtime.shutdown().await;
    let tools = listed?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }
    if tools.is_empty() {
        println!("No tools available.");
    }
    for tool in &tools {
        println!("{:<32} {}", tool.name, first_line(&tool.description));
    }
    Ok(())
}

/// Print the prompts of the document server; each takes a `doc_id`.
pub async fn prompts(config: Config) -> anyhow::Result<()> {
    let runtime = start(config).await?;
    let listed = match runtime.document_chat() {
        Ok(Some(documents)) => documents.list_prompts().await.map_err(anyhow::Error::from),
        Ok(None) => Err(anyhow::anyhow!("no document server configured (chat.document_server)")),
        Err(e) => Err(e),
    };
    runtime.shutdown().await;

    for prompt in listed? {
        let description = prompt.description.as_deref().unwrap_or("");
        println!("/{:<31} {}", prompt.name, first_line(description));
    }
    Ok(())
}

/// Listing does not need a model, so a missing API key only disables
/// sampling.
async fn start(config: Config) -> anyhow::Result<Runtime> {
    let provider = match bootstrap::build_provider(&config) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(error = %e, "LLM provider unavailable, sampling disabled");
            None
        }
    };
    Runtime::start(config, provider).await
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
