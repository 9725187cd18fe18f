//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod courses;
mod doctor;
mod outline;
mod search;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use courses::run_courses;
pub use doctor::run_doctor;
pub use outline::run_outline;
pub use search::run_search;

use crate::cli::Output;
use crate::config::{Provider, Settings};
use crate::orchestrator::{course_tools, load_catalog, Orchestrator};
use crate::tools::ToolRegistry;
use crate::vector_store::RetrievalBackend;
use std::sync::Arc;

/// Apply `--provider` / `--model` overrides to the generation settings.
///
/// Switching provider without naming a model resets the model to that
/// provider's default.
fn apply_overrides(
    settings: &mut Settings,
    model: Option<String>,
    provider: Option<String>,
) -> anyhow::Result<()> {
    if let Some(provider) = provider {
        let provider: Provider = provider.parse().map_err(anyhow::Error::msg)?;
        if provider != settings.generation.provider {
            settings.generation.provider = provider;
            settings.generation.model = default_model(provider).to_string();
        }
    }
    if let Some(model) = model {
        settings.generation.model = model;
    }
    Ok(())
}

fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "claude-sonnet-4-20250514",
        Provider::OpenAI => "gpt-4o-mini",
    }
}

/// Load the catalog and connect to the model provider behind a spinner.
async fn connect(settings: &Settings) -> anyhow::Result<Orchestrator> {
    let spinner = Output::spinner("Loading course catalog...");
    let result = Orchestrator::from_settings(settings).await;
    spinner.finish_and_clear();

    match result {
        Ok(orchestrator) => Ok(orchestrator),
        Err(e) => {
            Output::error(&format!("Failed to start: {}", e));
            Output::info("Run 'syllabus doctor' for detailed diagnostics.");
            Err(e.into())
        }
    }
}

/// Load the catalog without connecting to a model provider.
async fn open_catalog(settings: &Settings) -> anyhow::Result<Arc<dyn RetrievalBackend>> {
    let spinner = Output::spinner("Loading course catalog...");
    let result = load_catalog(settings).await;
    spinner.finish_and_clear();

    match result {
        Ok(store) => {
            tracing::debug!(
                "Loaded {} courses, {} chunks",
                store.course_count(),
                store.chunk_count()
            );
            Ok(Arc::new(store))
        }
        Err(e) => {
            Output::error(&format!("Failed to load catalog: {}", e));
            Err(e.into())
        }
    }
}

/// Course tools over the catalog, for running them without the model.
async fn open_tools(settings: &Settings) -> anyhow::Result<ToolRegistry> {
    Ok(course_tools(open_catalog(settings).await?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_override_resets_model() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, None, Some("deepseek".to_string())).unwrap();
        assert_eq!(settings.generation.provider, Provider::OpenAI);
        assert_eq!(settings.generation.model, "gpt-4o-mini");

        apply_overrides(
            &mut settings,
            Some("deepseek-chat".to_string()),
            Some("openai".to_string()),
        )
        .unwrap();
        assert_eq!(settings.generation.model, "deepseek-chat");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut settings = Settings::default();
        assert!(apply_overrides(&mut settings, None, Some("gemini".to_string())).is_err());
    }
}
