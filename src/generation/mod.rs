//! Generation client for tool-augmented answers.
//!
//! A [`Generator`] makes one model call with the available tools attached.
//! If the model asks for tools, every requested invocation is executed
//! through the [`ToolRegistry`] and a single follow-up call produces the
//! final answer. The follow-up request type has no tools field, so the
//! second call can never ask for more tools.

mod anthropic;
mod openai;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAICompatibleBackend;

use crate::config::{GenerationSettings, Provider};
use crate::error::Result;
use crate::tools::{ToolDescriptor, ToolRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Response token cap for every model call.
pub const MAX_TOKENS: u32 = 800;

/// Sampling temperature for every model call.
pub const TEMPERATURE: f32 = 0.0;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// The result of a tool invocation, sent back to the model.
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not interpret (e.g. thinking).
    #[serde(other)]
    Unsupported,
}

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// A plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// An assistant turn echoing the model's content.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user turn carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// Tool invocation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
}

/// A tool invocation extracted from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

/// The first call of a query: tools may be attached.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    pub tool_choice: Option<ToolChoice>,
}

/// The single follow-up call after tool execution. Carries no tools.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpRequest {
    pub system: String,
    pub messages: Vec<Message>,
}

/// A model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
}

impl ModelResponse {
    /// A plain text response that ended normally.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocations in the order the model requested them.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Whether the model signalled tool-use intent.
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse)
    }
}

/// A chat model provider.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// First call of a query.
    async fn create(&self, request: &InitialRequest) -> Result<ModelResponse>;

    /// Follow-up call after tool execution.
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<ModelResponse>;
}

/// Build the configured backend.
pub fn backend_from_settings(settings: &GenerationSettings) -> Result<Arc<dyn GenerationBackend>> {
    let api_key = settings.resolve_api_key()?;
    let base_url = settings.base_url()?;
    let timeout = std::time::Duration::from_secs(settings.timeout_seconds);

    let backend: Arc<dyn GenerationBackend> = match settings.provider {
        Provider::Anthropic => Arc::new(AnthropicBackend::new(
            api_key,
            &settings.model,
            base_url.as_ref(),
            timeout,
        )?),
        Provider::OpenAI => Arc::new(OpenAICompatibleBackend::new(
            &api_key,
            &settings.model,
            base_url.as_ref(),
            timeout,
        )?),
    };

    info!("Using {} model {}", settings.provider, settings.model);
    Ok(backend)
}

/// Drives the one-round tool protocol against a backend.
pub struct Generator {
    backend: Arc<dyn GenerationBackend>,
    system_prompt: String,
}

impl Generator {
    pub fn new(backend: Arc<dyn GenerationBackend>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// System instruction with the rendered conversation history appended.
    fn system_content(&self, history: Option<&str>) -> String {
        match history.filter(|h| !h.is_empty()) {
            Some(history) => format!(
                "{}\n\nPrevious conversation:\n{}",
                self.system_prompt, history
            ),
            None => self.system_prompt.clone(),
        }
    }

    /// Generate an answer, running at most one round of tools.
    #[instrument(skip_all, fields(model = %self.backend.model()))]
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&[ToolDescriptor]>,
        registry: Option<&mut ToolRegistry>,
    ) -> Result<String> {
        let tools = tools.unwrap_or_default();
        let request = InitialRequest {
            system: self.system_content(history),
            messages: vec![Message::user(query)],
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
        };

        let response = self.backend.create(&request).await?;

        match registry {
            Some(registry) if response.wants_tools() => {
                self.run_tools(request, response, registry).await
            }
            _ => {
                debug!("Model answered directly");
                Ok(response.text())
            }
        }
    }

    /// Execute the requested tools and make the single follow-up call.
    async fn run_tools(
        &self,
        request: InitialRequest,
        response: ModelResponse,
        registry: &mut ToolRegistry,
    ) -> Result<String> {
        let InitialRequest {
            system,
            mut messages,
            ..
        } = request;

        let tool_uses = response.tool_uses();
        let assistant_content = response
            .content
            .into_iter()
            .filter(|block| !matches!(block, ContentBlock::Unsupported))
            .collect();
        messages.push(Message::assistant(assistant_content));

        let mut results = Vec::with_capacity(tool_uses.len());
        for tool_use in tool_uses {
            info!("Model called tool {}", tool_use.name);
            let content = registry.execute(&tool_use.name, &tool_use.input).await;
            results.push(ContentBlock::ToolResult {
                tool_use_id: tool_use.id,
                content,
            });
        }
        if !results.is_empty() {
            messages.push(Message::tool_results(results));
        }

        let follow_up = FollowUpRequest { system, messages };
        let final_response = self.backend.follow_up(&follow_up).await?;
        Ok(final_response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedBackend, StubRetrieval};
    use crate::tools::{CourseOutlineTool, CourseSearchTool};
    use serde_json::json;

    fn tool_use(id: &str, name: &str, input: Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn tool_response(blocks: Vec<ContentBlock>) -> ModelResponse {
        ModelResponse {
            content: blocks,
            stop_reason: Some(StopReason::ToolUse),
        }
    }

    fn registry() -> ToolRegistry {
        let backend = Arc::new(StubRetrieval::default());
        ToolRegistry::new()
            .with_tool(CourseSearchTool::new(backend.clone()))
            .unwrap()
            .with_tool(CourseOutlineTool::new(backend))
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_answer_makes_one_call() {
        let backend = Arc::new(ScriptedBackend::new(vec![ModelResponse::text_only(
            "Python is a language.",
        )]));
        let generator = Generator::new(backend.clone(), "policy");
        let mut registry = registry();
        let tools = registry.describe_all();

        let answer = generator
            .generate("What is Python?", None, Some(&tools), Some(&mut registry))
            .await
            .unwrap();

        assert_eq!(answer, "Python is a language.");
        assert_eq!(backend.initial_requests().len(), 1);
        assert!(backend.follow_up_requests().is_empty());

        let request = &backend.initial_requests()[0];
        assert_eq!(request.system, "policy");
        assert_eq!(request.tools.len(), 2);
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(request.messages, vec![Message::user("What is Python?")]);
    }

    #[tokio::test]
    async fn test_history_is_appended_to_system() {
        let backend = Arc::new(ScriptedBackend::new(vec![ModelResponse::text_only("ok")]));
        let generator = Generator::new(backend.clone(), "policy");

        generator
            .generate("q", Some("User: hi\nAssistant: hello"), None, None)
            .await
            .unwrap();

        let request = &backend.initial_requests()[0];
        assert_eq!(
            request.system,
            "policy\n\nPrevious conversation:\nUser: hi\nAssistant: hello"
        );
        assert!(request.tools.is_empty());
        assert_eq!(request.tool_choice, None);
    }

    #[tokio::test]
    async fn test_tool_round_has_exactly_one_follow_up() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_response(vec![
                ContentBlock::Text {
                    text: "Let me search.".to_string(),
                },
                tool_use("toolu_1", "search_course_content", json!({"query": "python"})),
            ]),
            // Asks for tools again; the generator must not honour it.
            tool_response(vec![
                ContentBlock::Text {
                    text: "Python is used for data science.".to_string(),
                },
                tool_use("toolu_2", "search_course_content", json!({"query": "more"})),
            ]),
        ]));
        let generator = Generator::new(backend.clone(), "policy");
        let mut registry = registry();
        let tools = registry.describe_all();

        let answer = generator
            .generate("What is Python?", None, Some(&tools), Some(&mut registry))
            .await
            .unwrap();

        assert_eq!(answer, "Python is used for data science.");
        assert_eq!(backend.initial_requests().len(), 1);
        assert_eq!(backend.follow_up_requests().len(), 1);

        let follow_up = &backend.follow_up_requests()[0];
        assert_eq!(follow_up.system, "policy");
        assert_eq!(follow_up.messages.len(), 3);
        assert_eq!(follow_up.messages[0], Message::user("What is Python?"));
        assert_eq!(follow_up.messages[1].role, Role::Assistant);
        assert_eq!(follow_up.messages[2].role, Role::User);

        match &follow_up.messages[2].content[..] {
            [ContentBlock::ToolResult {
                tool_use_id,
                content,
            }] => {
                assert_eq!(tool_use_id, "toolu_1");
                assert!(content.contains("[Python Fundamentals - Lesson 1]"));
            }
            other => panic!("unexpected tool results: {:?}", other),
        }

        assert_eq!(
            registry.last_sources(),
            vec!["Python Fundamentals - Lesson 1", "Python Fundamentals - Lesson 2"]
        );
    }

    #[tokio::test]
    async fn test_multiple_tool_uses_run_in_order() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            tool_response(vec![
                tool_use("a", "get_course_outline", json!({"course_title": "Python"})),
                tool_use("b", "nonexistent_tool", json!({})),
                tool_use("c", "search_course_content", json!({})),
            ]),
            ModelResponse::text_only("done"),
        ]));
        let generator = Generator::new(backend.clone(), "policy");
        let mut registry = registry();

        let answer = generator
            .generate("q", None, Some(&registry.describe_all()), Some(&mut registry))
            .await
            .unwrap();
        assert_eq!(answer, "done");

        let follow_up = &backend.follow_up_requests()[0];
        let results: Vec<(&str, &str)> = follow_up.messages[2]
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => Some((tool_use_id.as_str(), content.as_str())),
                _ => None,
            })
            .collect();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1.starts_with("No course found matching 'Python'"));
        assert_eq!(results[1].0, "b");
        assert!(results[1].1.contains("not found"));
        assert_eq!(results[2].0, "c");
        assert!(results[2].1.starts_with("Error: Query cannot be None"));
    }

    #[tokio::test]
    async fn test_tool_use_without_registry_returns_first_text() {
        let backend = Arc::new(ScriptedBackend::new(vec![tool_response(vec![
            ContentBlock::Text {
                text: "partial".to_string(),
            },
            tool_use("x", "search_course_content", json!({"query": "python"})),
        ])]));
        let generator = Generator::new(backend.clone(), "policy");

        let answer = generator.generate("q", None, None, None).await.unwrap();
        assert_eq!(answer, "partial");
        assert!(backend.follow_up_requests().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let generator = Generator::new(backend, "policy");
        assert!(generator.generate("q", None, None, None).await.is_err());
    }

    #[test]
    fn test_content_block_wire_format() {
        let blocks = vec![
            ContentBlock::Text {
                text: "hi".to_string(),
            },
            tool_use("toolu_1", "search_course_content", json!({"query": "x"})),
            ContentBlock::ToolResult {
                tool_use_id: "toolu_1".to_string(),
                content: "result".to_string(),
            },
        ];
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([
                {"type": "text", "text": "hi"},
                {"type": "tool_use", "id": "toolu_1", "name": "search_course_content", "input": {"query": "x"}},
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "result"}
            ])
        );

        let parsed: ContentBlock =
            serde_json::from_value(json!({"type": "thinking", "thinking": "hmm"})).unwrap();
        assert_eq!(parsed, ContentBlock::Unsupported);

        assert_eq!(
            serde_json::to_value(ToolChoice::Auto).unwrap(),
            json!({"type": "auto"})
        );
    }
}
