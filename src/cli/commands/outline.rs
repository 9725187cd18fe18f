//! Outline command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::tools::CourseOutlineTool;
use anyhow::Result;
use serde_json::json;

/// Run the outline command.
pub async fn run_outline(course: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Retrieve, &settings)?;
    let mut registry = super::open_tools(&settings).await?;
    let output = registry
        .execute(CourseOutlineTool::NAME, &json!({ "course_title": course }))
        .await;

    if registry.last_sources().is_empty() {
        Output::warning(&output);
    } else {
        println!("\n{}\n", output);
    }

    Ok(())
}
