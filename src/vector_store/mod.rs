//! Retrieval backend abstraction for Syllabus.
//!
//! Provides a trait-based interface over the indexed course corpus: similarity
//! search with optional course/lesson filters, and a metadata-only lookup for
//! a whole course.

mod memory;

pub use memory::{Catalog, MemoryVectorStore};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-document metadata, as returned by the backend.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata keys written by the backend and read by the tools.
pub mod keys {
    pub const COURSE_TITLE: &str = "course_title";
    pub const COURSE_LINK: &str = "course_link";
    pub const LESSON_NUMBER: &str = "lesson_number";
    pub const LESSON_TITLE: &str = "lesson_title";
    pub const LESSON_LINK: &str = "lesson_link";
    pub const CHUNK_INDEX: &str = "chunk_index";
}

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    #[serde(default)]
    pub lesson_link: Option<String>,
}

/// A course in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Course title. Unique within a catalog.
    pub title: String,
    #[serde(default)]
    pub course_link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    /// Embedding of the title, used to resolve partial course names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_embedding: Vec<f32>,
}

impl Course {
    /// Look up a lesson by number.
    pub fn lesson(&self, number: i64) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == number)
    }
}

/// An indexed piece of course content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseChunk {
    pub course_title: String,
    #[serde(default)]
    pub lesson_number: Option<i64>,
    pub chunk_index: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

/// A content search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// What to search for.
    pub query: String,
    /// Course name filter; partial names are resolved by the backend.
    pub course_name: Option<String>,
    /// Lesson number filter.
    pub lesson_number: Option<i64>,
    /// Maximum results. `None` uses the backend's default.
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Create an unfiltered query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Restrict to a course (partial names allowed).
    pub fn with_course(mut self, course_name: impl Into<String>) -> Self {
        self.course_name = Some(course_name.into());
        self
    }

    /// Restrict to a lesson number.
    pub fn with_lesson(mut self, lesson_number: i64) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Documents returned by the backend, with aligned metadata and distances.
///
/// `documents`, `metadata` and `distances` always have the same length; when
/// `error` is set all three are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    documents: Vec<String>,
    metadata: Vec<Metadata>,
    distances: Vec<f32>,
    error: Option<String>,
}

impl RetrievalResult {
    /// Build a result from (document, metadata, distance) hits.
    pub fn from_hits(hits: impl IntoIterator<Item = (String, Metadata, f32)>) -> Self {
        let mut result = Self::default();
        for (document, metadata, distance) in hits {
            result.push(document, metadata, distance);
        }
        result
    }

    /// An empty result carrying an error message.
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Append one hit.
    pub fn push(&mut self, document: String, metadata: Metadata, distance: f32) {
        self.documents.push(document);
        self.metadata.push(metadata);
        self.distances.push(distance);
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Iterate over aligned (document, metadata) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metadata)> {
        self.documents
            .iter()
            .map(String::as_str)
            .zip(self.metadata.iter())
    }
}

/// Trait for retrieval backend implementations.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Similarity search with optional course and lesson filters.
    ///
    /// An unresolvable course name is reported through
    /// [`RetrievalResult::error`], not as an `Err`.
    async fn search(&self, query: &SearchQuery) -> Result<RetrievalResult>;

    /// Every lesson row of the course matching `course_title` (partial match),
    /// without similarity ranking.
    async fn course_metadata(&self, course_title: &str) -> Result<RetrievalResult>;

    /// Titles of all indexed courses.
    async fn course_titles(&self) -> Result<Vec<String>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
