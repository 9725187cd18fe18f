//! CLI module for Syllabus.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Syllabus - ask questions about course materials
///
/// A language model answers from an indexed course catalog, searching
/// lesson content or fetching course outlines when it needs them.
#[derive(Parser, Debug)]
#[command(name = "syllabus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configuration, credentials and the course catalog
    Doctor,

    /// Ask a single question about the course materials
    Ask {
        /// The question to ask
        question: String,

        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,

        /// Provider to use instead of the configured one (anthropic, openai)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,

        /// Provider to use instead of the configured one (anthropic, openai)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Search course content directly, without the language model
    Search {
        /// Search query
        query: String,

        /// Restrict to a course (partial titles work)
        #[arg(long)]
        course: Option<String>,

        /// Restrict to a lesson number
        #[arg(short, long)]
        lesson: Option<i64>,
    },

    /// Show a course outline
    Outline {
        /// Course title (partial titles work)
        course: String,
    },

    /// List indexed courses
    Courses,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
