//! Interactive chat command.

use super::{apply_overrides, connect};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Run the interactive chat command.
pub async fn run_chat(
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
    let sessions = orchestrator.sessions();
    let session_id = sessions.create_session().await?;
    debug!("Chat session {}", session_id);

    println!("\n{}", style("Syllabus Chat").bold().cyan());
    println!(
        "{}\n",
        style(format!(
            "Model: {}. Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.",
            orchestrator.model()
        ))
        .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            sessions.clear_session(&session_id).await?;
            Output::info("Conversation history cleared.");
            continue;
        }

        let spinner = Output::spinner("Thinking...");
        let result = orchestrator.query(input, Some(&session_id)).await;
        spinner.finish_and_clear();

        match result {
            Ok((answer, sources)) => {
                println!("\n{} {}", style("Syllabus:").cyan().bold(), answer);
                if !sources.is_empty() {
                    let cited: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
                    println!("{}", style(format!("Sources: {}", cited.join("; "))).dim());
                }
                println!();
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
