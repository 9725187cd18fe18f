//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::tools::CourseSearchTool;
use anyhow::Result;
use serde_json::{json, Map, Value};

/// Run the search command. Calls the search tool directly, exactly as the
/// model would.
pub async fn run_search(
    query: &str,
    course: Option<String>,
    lesson: Option<i64>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Retrieve, &settings)?;

    let mut input = Map::new();
    input.insert("query".to_string(), json!(query));
    if let Some(course) = course {
        input.insert("course_name".to_string(), json!(course));
    }
    if let Some(lesson) = lesson {
        input.insert("lesson_number".to_string(), json!(lesson));
    }

    let mut registry = super::open_tools(&settings).await?;
    let spinner = Output::spinner("Searching...");
    let output = registry
        .execute(CourseSearchTool::NAME, &Value::Object(input))
        .await;
    spinner.finish_and_clear();

    let sources = registry.last_sources();
    if sources.is_empty() {
        Output::warning(&output);
    } else {
        Output::success(&format!("Found {} results", sources.len()));
        println!();
        Output::tool_text(&output);
    }

    Ok(())
}
