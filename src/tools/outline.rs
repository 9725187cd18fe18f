//! Course outline tool.

use super::{ParamType, Source, Tool, ToolArgs, ToolDescriptor, ToolError, ToolOutput};
use crate::vector_store::{keys, Metadata, RetrievalBackend};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A lesson entry in a course outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineLesson {
    pub number: i64,
    pub title: String,
}

/// A course's title, link and ordered lesson list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub title: String,
    pub link: Option<String>,
    pub lessons: Vec<OutlineLesson>,
}

impl CourseOutline {
    /// Aggregate metadata rows into an outline.
    ///
    /// The first row with a non-empty course title supplies the title and
    /// link. Rows carrying both a lesson number and a lesson title add a
    /// lesson; exact duplicates are skipped. Returns `Ok(None)` when no row
    /// names a course, and `Err` on a malformed lesson number.
    pub fn from_metadata(rows: &[Metadata]) -> Result<Option<Self>, String> {
        let mut title: Option<String> = None;
        let mut link: Option<String> = None;
        let mut lessons: Vec<OutlineLesson> = Vec::new();

        for row in rows {
            let row_title = row
                .get(keys::COURSE_TITLE)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty());

            if title.is_none() {
                if let Some(t) = row_title {
                    title = Some(t.to_string());
                    link = row
                        .get(keys::COURSE_LINK)
                        .and_then(Value::as_str)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string);
                }
            }

            let number = match row.get(keys::LESSON_NUMBER) {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_i64().ok_or_else(|| {
                    format!("invalid lesson number {} for course '{}'", value, row_title.unwrap_or("unknown"))
                })?),
            };
            let lesson_title = row
                .get(keys::LESSON_TITLE)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty());

            if let (Some(number), Some(lesson_title)) = (number, lesson_title) {
                let lesson = OutlineLesson {
                    number,
                    title: lesson_title.to_string(),
                };
                if !lessons.contains(&lesson) {
                    lessons.push(lesson);
                }
            }
        }

        lessons.sort_by_key(|l| l.number);

        Ok(title.map(|title| Self {
            title,
            link,
            lessons,
        }))
    }

    /// Render the outline for the model.
    pub fn render(&self) -> String {
        let mut parts = vec![format!("**Course Title:** {}", self.title)];

        if let Some(link) = &self.link {
            parts.push(format!("**Course Link:** {}", link));
        }

        if self.lessons.is_empty() {
            parts.push("**Lessons:** No lesson information available".to_string());
        } else {
            parts.push(format!("**Total Lessons:** {}", self.lessons.len()));
            parts.push("\n**Course Outline:**".to_string());
            for lesson in &self.lessons {
                parts.push(format!("  {}. {}", lesson.number, lesson.title));
            }
        }

        parts.join("\n")
    }
}

/// Retrieves a course's complete outline by (partial) title.
pub struct CourseOutlineTool {
    backend: Arc<dyn RetrievalBackend>,
}

impl CourseOutlineTool {
    pub const NAME: &'static str = "get_course_outline";

    pub fn new(backend: Arc<dyn RetrievalBackend>) -> Self {
        Self { backend }
    }
}

fn not_found(course_title: &str) -> ToolOutput {
    ToolOutput::text(format!(
        "No course found matching '{}'. Please check the course title and try again.",
        course_title
    ))
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            Self::NAME,
            "Get complete course outline including course title, link, and all lessons with their numbers and titles",
        )
        .param(
            "course_title",
            ParamType::String,
            "Course title (partial matches work, e.g. 'MCP', 'Introduction', 'Build Rich-Context AI Apps')",
            true,
        )
    }

    #[instrument(skip(self, args), name = "get_course_outline")]
    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let course_title = args.required_str("course_title")?;

        let rows = match self.backend.course_metadata(course_title).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Outline lookup failed: {}", e);
                return Ok(ToolOutput::text(format!("Error retrieving course outline: {}", e)));
            }
        };

        if rows.error().is_some() || rows.is_empty() {
            debug!("No course matched '{}'", course_title);
            return Ok(not_found(course_title));
        }

        match CourseOutline::from_metadata(rows.metadata()) {
            Ok(Some(outline)) => {
                let source = Source::from(outline.title.clone());
                Ok(ToolOutput::with_sources(outline.render(), vec![source]))
            }
            Ok(None) => Ok(not_found(course_title)),
            Err(message) => Ok(ToolOutput::text(format!(
                "Error retrieving course outline: {}",
                message
            ))),
        }
    }
}
