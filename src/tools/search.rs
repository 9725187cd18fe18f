//! Course content search tool.

use super::{
    display_value, json_type_name, ParamType, Source, Tool, ToolArgs, ToolDescriptor, ToolError,
    ToolOutput,
};
use crate::vector_store::{keys, RetrievalBackend, RetrievalResult, SearchQuery};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Searches course content, optionally filtered by course (partial names
/// allowed) and lesson number.
pub struct CourseSearchTool {
    backend: Arc<dyn RetrievalBackend>,
}

impl CourseSearchTool {
    pub const NAME: &'static str = "search_course_content";

    pub fn new(backend: Arc<dyn RetrievalBackend>) -> Self {
        Self { backend }
    }
}

/// Validated search arguments.
struct SearchArgs {
    query: String,
    course_name: Option<String>,
    lesson_number: Option<i64>,
}

/// Validate in order: query, course name, lesson number. `Err` carries the
/// message returned to the model.
fn validate(args: &ToolArgs) -> Result<SearchArgs, String> {
    let query = match args.get("query") {
        None => return Err("Error: Query cannot be None. Please provide a search query.".to_string()),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(format!(
                "Error: Query must be a string, got {}.",
                json_type_name(other)
            ))
        }
    };

    if query.trim().is_empty() {
        return Err("Error: Query cannot be empty. Please provide a search query.".to_string());
    }

    let course_name = match args.get("course_name") {
        None => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(format!(
                "Error: Course name must be a string, got {}.",
                json_type_name(other)
            ))
        }
    };

    let lesson_number = match args.get("lesson_number") {
        None => None,
        Some(value) => match value.as_i64() {
            Some(n) => Some(n),
            None if value.is_u64() => {
                return Err(format!("Error: Lesson number out of range: {}.", value))
            }
            None => {
                return Err(format!(
                    "Error: Lesson number must be an integer, got {}.",
                    json_type_name(value)
                ))
            }
        },
    };

    Ok(SearchArgs {
        query: query.clone(),
        course_name,
        lesson_number,
    })
}

fn no_results_message(course_name: Option<&str>, lesson_number: Option<i64>) -> String {
    let mut message = "No relevant content found".to_string();
    if let Some(course) = course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(lesson) = lesson_number {
        message.push_str(&format!(" in lesson {}", lesson));
    }
    message.push('.');
    message
}

/// Render each hit under a `[course - Lesson n]` header and collect the
/// matching sources in document order.
fn format_results(results: &RetrievalResult) -> (String, Vec<Source>) {
    let mut blocks = Vec::with_capacity(results.len());
    let mut sources = Vec::with_capacity(results.len());

    for (document, meta) in results.iter() {
        let course_title = meta
            .get(keys::COURSE_TITLE)
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let mut label = course_title.to_string();
        if let Some(lesson) = meta.get(keys::LESSON_NUMBER).filter(|v| !v.is_null()) {
            label.push_str(&format!(" - Lesson {}", display_value(lesson)));
        }

        blocks.push(format!("[{}]\n{}", label, document));
        sources.push(Source::from(label));
    }

    (blocks.join("\n\n"), sources)
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Search course materials with smart course name matching and lesson filtering",
        )
        .param(
            "query",
            ParamType::String,
            "What to search for in the course content",
            true,
        )
        .param(
            "course_name",
            ParamType::String,
            "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
            false,
        )
        .param(
            "lesson_number",
            ParamType::Integer,
            "Specific lesson number to search within (e.g. 1, 2, 3)",
            false,
        )
    }

    #[instrument(skip(self, args), name = "search_course_content")]
    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args = match validate(args) {
            Ok(args) => args,
            Err(message) => {
                debug!("Rejected search arguments: {}", message);
                return Ok(ToolOutput::text(message));
            }
        };

        let mut query = SearchQuery::new(args.query);
        query.course_name = args.course_name;
        query.lesson_number = args.lesson_number;

        let results = match self.backend.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Search backend failed: {}", e);
                return Ok(ToolOutput::text(format!("Search error: {}", e)));
            }
        };

        if let Some(error) = results.error() {
            return Ok(ToolOutput::text(error));
        }

        if results.is_empty() {
            return Ok(ToolOutput::with_sources(
                no_results_message(query.course_name.as_deref(), query.lesson_number),
                Vec::new(),
            ));
        }

        debug!("Search returned {} documents", results.len());
        let (content, sources) = format_results(&results);
        Ok(ToolOutput::with_sources(content, sources))
    }
}
