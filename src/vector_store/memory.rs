//! In-memory retrieval backend.
//!
//! Holds the course catalog and its content chunks in memory, loaded from a
//! JSON catalog snapshot. Course names are resolved exactly, then by
//! case-insensitive substring, then by title-embedding similarity.

use super::{
    cosine_similarity, keys, Course, CourseChunk, Metadata, RetrievalBackend, RetrievalResult,
    SearchQuery,
};
use crate::embedding::Embedder;
use crate::error::{Result, SyllabusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// On-disk catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub chunks: Vec<CourseChunk>,
}

/// In-memory retrieval backend.
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    courses: Vec<Course>,
    chunks: Vec<CourseChunk>,
    max_results: usize,
    match_threshold: f32,
}

impl MemoryVectorStore {
    /// Create an empty store.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            courses: Vec::new(),
            chunks: Vec::new(),
            max_results: 5,
            match_threshold: 0.3,
        }
    }

    /// Set the default number of search results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the minimum title similarity for semantic course resolution.
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Load a catalog snapshot from disk, embedding anything not yet embedded.
    pub async fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SyllabusError::VectorStore(format!("Cannot read catalog {}: {}", path.display(), e))
        })?;
        let catalog: Catalog = serde_json::from_str(&content)?;

        let mut store = Self::new(embedder);
        store.insert_catalog(catalog).await?;
        info!(
            "Loaded {} courses and {} chunks from {}",
            store.courses.len(),
            store.chunks.len(),
            path.display()
        );
        Ok(store)
    }

    /// Embed a batch, failing unless there is one vector per text.
    async fn embed_exact(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(SyllabusError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    /// Add a catalog to the store. Missing embeddings are generated.
    pub async fn insert_catalog(&mut self, mut catalog: Catalog) -> Result<()> {
        let missing_titles: Vec<usize> = catalog
            .courses
            .iter()
            .enumerate()
            .filter(|(_, c)| c.title_embedding.is_empty())
            .map(|(i, _)| i)
            .collect();
        if !missing_titles.is_empty() {
            let texts: Vec<String> = missing_titles
                .iter()
                .map(|&i| catalog.courses[i].title.clone())
                .collect();
            let embeddings = self.embed_exact(&texts).await?;
            for (&i, embedding) in missing_titles.iter().zip(embeddings) {
                catalog.courses[i].title_embedding = embedding;
            }
        }

        let missing_chunks: Vec<usize> = catalog
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.embedding.is_empty())
            .map(|(i, _)| i)
            .collect();
        if !missing_chunks.is_empty() {
            debug!("Embedding {} chunks", missing_chunks.len());
            let texts: Vec<String> = missing_chunks
                .iter()
                .map(|&i| catalog.chunks[i].content.clone())
                .collect();
            let embeddings = self.embed_exact(&texts).await?;
            for (&i, embedding) in missing_chunks.iter().zip(embeddings) {
                catalog.chunks[i].embedding = embedding;
            }
        }

        for course in catalog.courses {
            // Titles are unique; a re-inserted course replaces the old entry.
            self.courses.retain(|c| c.title != course.title);
            self.courses.push(course);
        }
        self.chunks.extend(catalog.chunks);
        Ok(())
    }

    /// Number of courses in the catalog.
    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    /// Number of content chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Resolve a possibly partial course name to a catalog entry.
    async fn resolve_course(&self, name: &str) -> Result<Option<&Course>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        if let Some(course) = self.courses.iter().find(|c| c.title.to_lowercase() == needle) {
            return Ok(Some(course));
        }

        if let Some(course) = self
            .courses
            .iter()
            .find(|c| c.title.to_lowercase().contains(&needle))
        {
            return Ok(Some(course));
        }

        let embedding = self.embedder.embed(name).await?;
        let best = self
            .courses
            .iter()
            .map(|c| (c, cosine_similarity(&embedding, &c.title_embedding)))
            .filter(|(_, score)| *score >= self.match_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((course, score)) = best {
            debug!("Resolved course '{}' to '{}' (score {:.2})", name, course.title, score);
        }
        Ok(best.map(|(course, _)| course))
    }

    fn chunk_metadata(&self, chunk: &CourseChunk, course: Option<&Course>) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert(keys::COURSE_TITLE.into(), Value::from(chunk.course_title.clone()));
        meta.insert(keys::CHUNK_INDEX.into(), Value::from(chunk.chunk_index));
        if let Some(number) = chunk.lesson_number {
            meta.insert(keys::LESSON_NUMBER.into(), Value::from(number));
        }

        let course = course.or_else(|| self.courses.iter().find(|c| c.title == chunk.course_title));
        if let Some(course) = course {
            if let Some(link) = &course.course_link {
                meta.insert(keys::COURSE_LINK.into(), Value::from(link.clone()));
            }
            if let Some(lesson) = chunk.lesson_number.and_then(|n| course.lesson(n)) {
                meta.insert(keys::LESSON_TITLE.into(), Value::from(lesson.title.clone()));
            }
        }
        meta
    }
}

#[async_trait]
impl RetrievalBackend for MemoryVectorStore {
    #[instrument(skip(self, query), fields(query = %query.query))]
    async fn search(&self, query: &SearchQuery) -> Result<RetrievalResult> {
        let course = match query.course_name.as_deref() {
            Some(name) => match self.resolve_course(name).await? {
                Some(course) => Some(course),
                None => return Ok(RetrievalResult::empty(format!("No course found matching '{}'", name))),
            },
            None => None,
        };

        let query_embedding = self.embedder.embed(&query.query).await?;

        let mut scored: Vec<(&CourseChunk, f32)> = self
            .chunks
            .iter()
            .filter(|c| course.map_or(true, |course| c.course_title == course.title))
            .filter(|c| query.lesson_number.is_none() || c.lesson_number == query.lesson_number)
            .map(|c| (c, cosine_similarity(&query_embedding, &c.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit.unwrap_or(self.max_results));

        debug!("Search matched {} chunks", scored.len());

        Ok(RetrievalResult::from_hits(scored.into_iter().map(|(chunk, score)| {
            (chunk.content.clone(), self.chunk_metadata(chunk, course), 1.0 - score)
        })))
    }

    #[instrument(skip(self))]
    async fn course_metadata(&self, course_title: &str) -> Result<RetrievalResult> {
        let Some(course) = self.resolve_course(course_title).await? else {
            return Ok(RetrievalResult::empty(format!(
                "No course found matching '{}'",
                course_title
            )));
        };

        let mut base = Metadata::new();
        base.insert(keys::COURSE_TITLE.into(), Value::from(course.title.clone()));
        if let Some(link) = &course.course_link {
            base.insert(keys::COURSE_LINK.into(), Value::from(link.clone()));
        }

        if course.lessons.is_empty() {
            return Ok(RetrievalResult::from_hits([(course.title.clone(), base, 0.0)]));
        }

        Ok(RetrievalResult::from_hits(course.lessons.iter().map(|lesson| {
            let mut meta = base.clone();
            meta.insert(keys::LESSON_NUMBER.into(), Value::from(lesson.lesson_number));
            meta.insert(keys::LESSON_TITLE.into(), Value::from(lesson.title.clone()));
            if let Some(link) = &lesson.lesson_link {
                meta.insert(keys::LESSON_LINK.into(), Value::from(link.clone()));
            }
            (format!("Lesson {}: {}", lesson.lesson_number, lesson.title), meta, 0.0)
        })))
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(self.courses.iter().map(|c| c.title.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::HashEmbedder;
    use crate::vector_store::Lesson;

    fn lesson(number: i64, title: &str) -> Lesson {
        Lesson {
            lesson_number: number,
            title: title.to_string(),
            lesson_link: None,
        }
    }

    fn chunk(course: &str, lesson: Option<i64>, index: usize, content: &str) -> CourseChunk {
        CourseChunk {
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
            content: content.to_string(),
            embedding: Vec::new(),
        }
    }

    async fn store() -> MemoryVectorStore {
        let mut store = MemoryVectorStore::new(Arc::new(HashEmbedder::default()));
        store
            .insert_catalog(Catalog {
                courses: vec![
                    Course {
                        title: "Python Fundamentals".to_string(),
                        course_link: Some("https://example.com/python".to_string()),
                        instructor: Some("Ada".to_string()),
                        lessons: vec![lesson(2, "Variables and Data Types"), lesson(1, "Introduction to Python")],
                        title_embedding: Vec::new(),
                    },
                    Course {
                        title: "MCP: Build Rich-Context AI Apps".to_string(),
                        course_link: None,
                        instructor: None,
                        lessons: Vec::new(),
                        title_embedding: Vec::new(),
                    },
                ],
                chunks: vec![
                    chunk("Python Fundamentals", Some(1), 0, "Python is a programming language"),
                    chunk("Python Fundamentals", Some(2), 1, "Variables hold python values"),
                    chunk("MCP: Build Rich-Context AI Apps", None, 0, "MCP servers expose tools"),
                ],
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_search_ranks_and_attaches_metadata() {
        let store = store().await;
        let result = store
            .search(&SearchQuery::new("python programming language"))
            .await
            .unwrap();

        assert!(result.error().is_none());
        assert_eq!(result.len(), 3);
        assert_eq!(result.documents()[0], "Python is a programming language");
        assert!(result.distances()[0] <= result.distances()[1]);

        let meta = &result.metadata()[0];
        assert_eq!(meta[keys::COURSE_TITLE], "Python Fundamentals");
        assert_eq!(meta[keys::LESSON_NUMBER], 1);
        assert_eq!(meta[keys::LESSON_TITLE], "Introduction to Python");
        assert_eq!(meta[keys::COURSE_LINK], "https://example.com/python");
    }

    #[tokio::test]
    async fn test_search_filters_by_partial_course_and_lesson() {
        let store = store().await;
        let result = store
            .search(&SearchQuery::new("values").with_course("python").with_lesson(2))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.documents()[0], "Variables hold python values");
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let store = store().await.with_max_results(1);
        let result = store.search(&SearchQuery::new("python")).await.unwrap();
        assert_eq!(result.len(), 1);

        let result = store.search(&SearchQuery::new("python").with_limit(2)).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_course_reports_error() {
        let store = store().await.with_match_threshold(0.99);
        let result = store
            .search(&SearchQuery::new("anything").with_course("Quantum Basket Weaving"))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.error(), Some("No course found matching 'Quantum Basket Weaving'"));
    }

    #[tokio::test]
    async fn test_course_metadata_returns_every_lesson() {
        let store = store().await;
        let result = store.course_metadata("MCP").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.metadata()[0][keys::COURSE_TITLE], "MCP: Build Rich-Context AI Apps");

        let result = store.course_metadata("Python Fundamentals").await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result
            .metadata()
            .iter()
            .all(|m| m.contains_key(keys::LESSON_NUMBER) && m.contains_key(keys::LESSON_TITLE)));
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    #[async_trait::async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            HashEmbedder::default().embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut embeddings = HashEmbedder::default().embed_batch(texts).await?;
            embeddings.pop();
            Ok(embeddings)
        }

        fn dimensions(&self) -> usize {
            HashEmbedder::default().dimensions()
        }
    }

    #[tokio::test]
    async fn test_short_embedding_batch_is_an_error() {
        let mut store = MemoryVectorStore::new(Arc::new(ShortEmbedder));
        let err = store
            .insert_catalog(Catalog {
                courses: Vec::new(),
                chunks: vec![
                    chunk("Python Fundamentals", Some(1), 0, "Python is a programming language"),
                    chunk("Python Fundamentals", Some(2), 1, "Variables hold python values"),
                ],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyllabusError::Embedding(_)));
        assert!(err.to_string().contains("expected 2 embeddings, got 1"));
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = MemoryVectorStore::load(&path, Arc::new(HashEmbedder::default()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Cannot read catalog"));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{
                "courses": [{"title": "Rust Basics", "lessons": [{"lesson_number": 0, "title": "Setup"}]}],
                "chunks": [{"course_title": "Rust Basics", "lesson_number": 0, "chunk_index": 0, "content": "Install rustup"}]
            }"#,
        )
        .unwrap();

        let store = MemoryVectorStore::load(&path, Arc::new(HashEmbedder::default()))
            .await
            .unwrap();
        assert_eq!(store.course_count(), 1);
        assert_eq!(store.chunk_count(), 1);
        assert_eq!(store.course_titles().await.unwrap(), vec!["Rust Basics".to_string()]);
    }
}
