//! Ask command implementation.

use super::{apply_overrides, connect};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    provider: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    apply_overrides(&mut settings, model, provider)?;

    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'syllabus doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = connect(&settings).await?;

    let spinner = Output::spinner("Thinking...");
    let result = orchestrator.query(question, None).await;
    spinner.finish_and_clear();

    match result {
        Ok((answer, sources)) => {
            Output::answer(&answer, &sources);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}
