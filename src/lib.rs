//! Syllabus - Question answering over course materials
//!
//! A CLI and library that answers questions about an indexed catalog of
//! courses. A language model decides per query whether to answer directly
//! or to call one of two course tools first: a semantic search over lesson
//! content, or an outline lookup for a single course.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt management
//! - `embedding` - Embedding generation for query vectors
//! - `vector_store` - Course catalog and retrieval backends
//! - `tools` - Course tools and the per-query tool registry
//! - `generation` - Model providers and the one-round tool protocol
//! - `session` - Bounded conversation history
//! - `orchestrator` - Query coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus::config::Settings;
//! use syllabus::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::from_settings(&settings).await?;
//!
//!     let (answer, sources) = orchestrator
//!         .query("What does lesson 2 of the MCP course cover?", None)
//!         .await?;
//!     println!("{}", answer);
//!     for source in sources {
//!         println!("  {}", source);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod session;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Result, SyllabusError};
