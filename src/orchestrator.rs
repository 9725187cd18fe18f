//! Conversation-level orchestrator for Syllabus.
//!
//! Answers one query at a time: resolves session history, runs the
//! generator with the course tools, collects the sources the tools cited,
//! and records the exchange.

use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::generation::{backend_from_settings, GenerationBackend, Generator};
use crate::session::{SessionManager, SessionStore};
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolRegistry};
use crate::vector_store::{MemoryVectorStore, RetrievalBackend};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Catalog statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

impl CourseAnalytics {
    pub async fn collect(retrieval: &dyn RetrievalBackend) -> Result<Self> {
        let course_titles = retrieval.course_titles().await?;
        info!("Catalog has {} courses", course_titles.len());
        Ok(Self {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

/// The main orchestrator for answering course questions.
pub struct Orchestrator {
    generator: Generator,
    /// Template registry; every query runs against its own clone.
    tools: ToolRegistry,
    retrieval: Arc<dyn RetrievalBackend>,
    sessions: Arc<dyn SessionStore>,
    prompts: Prompts,
}

impl Orchestrator {
    /// Build every component from settings: prompts, the catalog-backed
    /// retrieval store, the configured model provider and an in-memory
    /// session store.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let store = load_catalog(settings).await?;
        let backend = backend_from_settings(&settings.generation)?;
        let sessions = Arc::new(SessionManager::new(settings.session.max_history));

        Self::with_components(backend, Arc::new(store), sessions, prompts)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        backend: Arc<dyn GenerationBackend>,
        retrieval: Arc<dyn RetrievalBackend>,
        sessions: Arc<dyn SessionStore>,
        prompts: Prompts,
    ) -> Result<Self> {
        let tools = course_tools(retrieval.clone())?;
        let generator = Generator::new(backend, prompts.system_prompt());

        Ok(Self {
            generator,
            tools,
            retrieval,
            sessions,
            prompts,
        })
    }

    /// A fresh registry with the course tools, for direct tool use.
    pub fn registry(&self) -> ToolRegistry {
        self.tools.clone()
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Answer a query, returning the answer and the sources it cites.
    #[instrument(skip(self, query))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<(String, Vec<Source>)> {
        let mut registry = self.tools.clone();
        registry.reset_sources();

        let history = match session_id {
            Some(id) => self.sessions.get_history(id).await?,
            None => None,
        };

        let prompt = self.prompts.user_query(query);
        let tools = registry.describe_all();
        let answer = self
            .generator
            .generate(&prompt, history.as_deref(), Some(&tools), Some(&mut registry))
            .await?;

        let sources = registry.last_sources();
        registry.reset_sources();
        debug!("Answer cites {} sources", sources.len());

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer).await?;
        }

        Ok((answer, sources))
    }

    /// Number and titles of indexed courses.
    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        CourseAnalytics::collect(self.retrieval.as_ref()).await
    }
}

/// Load the catalog snapshot named in settings into an in-memory store.
///
/// Needs only the embedding credentials, so direct search and outline
/// lookups work without a model provider key.
pub async fn load_catalog(settings: &Settings) -> Result<MemoryVectorStore> {
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    )?);

    Ok(MemoryVectorStore::load(&settings.catalog_path(), embedder)
        .await?
        .with_max_results(settings.vector_store.max_results)
        .with_match_threshold(settings.vector_store.course_match_threshold))
}

/// Registry holding the search and outline tools over one backend.
pub fn course_tools(retrieval: Arc<dyn RetrievalBackend>) -> Result<ToolRegistry> {
    ToolRegistry::new()
        .with_tool(CourseSearchTool::new(retrieval.clone()))?
        .with_tool(CourseOutlineTool::new(retrieval))
}
