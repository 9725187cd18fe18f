//! Test doubles shared by the unit tests.

use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use crate::generation::{FollowUpRequest, GenerationBackend, InitialRequest, ModelResponse};
use crate::vector_store::{Metadata, RetrievalBackend, RetrievalResult, SearchQuery};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Unwrap a JSON object literal into metadata.
pub fn meta(value: Value) -> Metadata {
    value.as_object().cloned().unwrap()
}

/// Deterministic bag-of-words embedder.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 256 }
    }
}

impl HashEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

enum Mode {
    Keyword,
    Fixed(Vec<(String, Metadata)>),
    Failing(String),
}

/// Keyword-driven retrieval backend.
///
/// In keyword mode a query containing "no results" returns nothing, one
/// containing "error" returns an error result, and one mentioning python,
/// introduction or lesson returns two Python Fundamentals documents.
pub struct StubRetrieval {
    mode: Mode,
    outline: Vec<Metadata>,
    search_calls: AtomicUsize,
    last_query: Mutex<Option<SearchQuery>>,
}

impl Default for StubRetrieval {
    fn default() -> Self {
        Self::new(Mode::Keyword)
    }
}

impl StubRetrieval {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            outline: Vec::new(),
            search_calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Always return these hits from `search`.
    pub fn with_hits(hits: Vec<(&str, Metadata)>) -> Self {
        Self::new(Mode::Fixed(
            hits.into_iter().map(|(d, m)| (d.to_string(), m)).collect(),
        ))
    }

    /// Every call fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self::new(Mode::Failing(message.to_string()))
    }

    /// Rows returned by `course_metadata` for any title.
    pub fn with_outline(mut self, rows: Vec<Metadata>) -> Self {
        self.outline = rows;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<SearchQuery> {
        self.last_query.lock().unwrap().clone()
    }

    fn keyword_result(query: &str) -> RetrievalResult {
        let lowered = query.to_lowercase();
        if lowered.contains("no results") {
            return RetrievalResult::default();
        }
        if lowered.contains("error") {
            return RetrievalResult::empty("Mock search error");
        }
        if ["python", "introduction", "lesson"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            return RetrievalResult::from_hits(vec![
                (
                    "Python is a programming language used for data science and web development."
                        .to_string(),
                    meta(json!({
                        "course_title": "Python Fundamentals",
                        "lesson_number": 1,
                        "lesson_title": "Introduction to Python"
                    })),
                    0.1,
                ),
                (
                    "This lesson covers basic Python syntax and variables.".to_string(),
                    meta(json!({
                        "course_title": "Python Fundamentals",
                        "lesson_number": 2,
                        "lesson_title": "Variables and Data Types"
                    })),
                    0.2,
                ),
            ]);
        }
        RetrievalResult::default()
    }
}

#[async_trait]
impl RetrievalBackend for StubRetrieval {
    async fn search(&self, query: &SearchQuery) -> Result<RetrievalResult> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());

        match &self.mode {
            Mode::Keyword => Ok(Self::keyword_result(&query.query)),
            Mode::Fixed(hits) => Ok(RetrievalResult::from_hits(
                hits.iter()
                    .enumerate()
                    .map(|(i, (d, m))| (d.clone(), m.clone(), i as f32 * 0.1)),
            )),
            Mode::Failing(message) => Err(SyllabusError::VectorStore(message.clone())),
        }
    }

    async fn course_metadata(&self, course_title: &str) -> Result<RetrievalResult> {
        if let Mode::Failing(message) = &self.mode {
            return Err(SyllabusError::VectorStore(message.clone()));
        }
        if self.outline.is_empty() {
            return Ok(RetrievalResult::empty(format!(
                "No course found matching '{}'",
                course_title
            )));
        }
        Ok(RetrievalResult::from_hits(
            self.outline
                .iter()
                .map(|m| (String::new(), m.clone(), 0.0)),
        ))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        if let Mode::Failing(message) = &self.mode {
            return Err(SyllabusError::VectorStore(message.clone()));
        }
        Ok(vec![
            "Python Fundamentals".to_string(),
            "MCP: Build Rich-Context AI Apps".to_string(),
        ])
    }
}

/// Generation backend that replays scripted responses and records every
/// request it receives. Running out of script is a provider error.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<ModelResponse>>,
    initial: Mutex<Vec<InitialRequest>>,
    follow_ups: Mutex<Vec<FollowUpRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            initial: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    pub fn initial_requests(&self) -> Vec<InitialRequest> {
        self.initial.lock().unwrap().clone()
    }

    pub fn follow_up_requests(&self) -> Vec<FollowUpRequest> {
        self.follow_ups.lock().unwrap().clone()
    }

    fn next(&self) -> Result<ModelResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SyllabusError::Provider {
                status: Some(529),
                message: "script exhausted".to_string(),
            })
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn create(&self, request: &InitialRequest) -> Result<ModelResponse> {
        self.initial.lock().unwrap().push(request.clone());
        self.next()
    }

    async fn follow_up(&self, request: &FollowUpRequest) -> Result<ModelResponse> {
        self.follow_ups.lock().unwrap().push(request.clone());
        self.next()
    }
}
