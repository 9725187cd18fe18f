//! OpenAI-compatible chat completions backend (OpenAI, DeepSeek, ...).

use super::{
    ContentBlock, FollowUpRequest, GenerationBackend, InitialRequest, Message, ModelResponse,
    Role, StopReason, MAX_TOKENS, TEMPERATURE,
};
use crate::error::{Result, SyllabusError};
use crate::openai::create_compatible_client;
use crate::tools::ToolDescriptor;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FinishReason, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

fn build_error(e: impl std::fmt::Display) -> SyllabusError {
    SyllabusError::Generation(e.to_string())
}

/// Backend for any OpenAI-compatible chat completions endpoint.
pub struct OpenAICompatibleBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleBackend {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<&url::Url>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: create_compatible_client(api_key, base_url, timeout)?,
            model: model.to_string(),
        })
    }

    #[allow(deprecated)]
    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CreateChatCompletionRequest> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(to_chat_messages(system, messages)?)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS);

        if !tools.is_empty() {
            builder
                .tools(to_chat_tools(tools)?)
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        builder.build().map_err(build_error)
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<ModelResponse> {
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SyllabusError::Provider {
                status: None,
                message: e.to_string(),
            })?;
        into_model_response(response)
    }
}

/// Convert protocol messages to chat completion messages. Tool results
/// become `tool` role messages keyed by call id.
fn to_chat_messages(system: &str, messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system.to_string())
            .build()
            .map_err(build_error)?
            .into(),
    ];

    for message in messages {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();

        for block in &message.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ChatCompletionMessageToolCall {
                        id: id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    })
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => tool_results.push((tool_use_id, content)),
                ContentBlock::Unsupported => {}
            }
        }

        match message.role {
            Role::User => {
                if !text.is_empty() {
                    out.push(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(text)
                            .build()
                            .map_err(build_error)?
                            .into(),
                    );
                }
            }
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    builder.content(text);
                }
                if !tool_calls.is_empty() {
                    builder.tool_calls(tool_calls);
                }
                out.push(builder.build().map_err(build_error)?.into());
            }
        }

        for (id, content) in tool_results {
            out.push(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(id.as_str())
                    .content(content.as_str())
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }
    }

    Ok(out)
}

/// Map tool descriptors to function tools.
fn to_chat_tools(tools: &[ToolDescriptor]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|tool| -> Result<ChatCompletionTool> {
            Ok(ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.name.clone(),
                    description: Some(tool.description.clone()),
                    parameters: Some(serde_json::to_value(&tool.input_schema)?),
                    strict: None,
                },
            })
        })
        .collect()
}

/// Read the first choice. `finish_reason == tool_calls` is tool-use intent.
fn into_model_response(response: CreateChatCompletionResponse) -> Result<ModelResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SyllabusError::Generation("No response from model".to_string()))?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
        content.push(ContentBlock::Text { text });
    }
    for call in choice.message.tool_calls.unwrap_or_default() {
        // Unparseable arguments are passed through as a string so the
        // registry reports them as an invalid value.
        let input = serde_json::from_str(&call.function.arguments)
            .unwrap_or(Value::String(call.function.arguments.clone()));
        content.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    let stop_reason = choice.finish_reason.map(|reason| match reason {
        FinishReason::ToolCalls => StopReason::ToolUse,
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        _ => StopReason::Other,
    });
    debug!(?stop_reason, "Model responded");

    Ok(ModelResponse {
        content,
        stop_reason,
    })
}

#[async_trait]
impl GenerationBackend for OpenAICompatibleBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all)]
    async fn create(&self, request: &InitialRequest) -> Result<ModelResponse> {
        let request = self.request(&request.system, &request.messages, &request.tools)?;
        self.send(request).await
    }

    #[instrument(skip_all)]
    async fn follow_up(&self, request: &FollowUpRequest) -> Result<ModelResponse> {
        let request = self.request(&request.system, &request.messages, &[])?;
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParamType;
    use serde_json::json;

    fn backend() -> OpenAICompatibleBackend {
        OpenAICompatibleBackend::new("sk-test", "deepseek-chat", None, Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_tool_round_messages() {
        let messages = vec![
            Message::user("What is Python?"),
            Message::assistant(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "search_course_content".to_string(),
                input: json!({"query": "python"}),
            }]),
            Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "call_1".to_string(),
                content: "[Python Fundamentals - Lesson 1]\n...".to_string(),
            }]),
        ];

        let value = serde_json::to_value(to_chat_messages("policy", &messages).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
        assert_eq!(value[0]["role"], "system");
        assert_eq!(value[0]["content"], "policy");
        assert_eq!(value[1]["role"], "user");
        assert_eq!(value[1]["content"], "What is Python?");
        assert_eq!(value[2]["role"], "assistant");
        assert_eq!(value[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(value[2]["tool_calls"][0]["function"]["arguments"], r#"{"query":"python"}"#);
        assert_eq!(value[3]["role"], "tool");
        assert_eq!(value[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_follow_up_request_has_no_tools() {
        let backend = backend();
        let tools = vec![ToolDescriptor::new("search_course_content", "Search").param(
            "query",
            ParamType::String,
            "What to search for",
            true,
        )];

        let initial = backend
            .request("policy", &[Message::user("hi")], &tools)
            .unwrap();
        let initial = serde_json::to_value(&initial).unwrap();
        assert_eq!(initial["tools"][0]["function"]["name"], "search_course_content");
        assert_eq!(initial["tools"][0]["function"]["parameters"]["required"], json!(["query"]));
        assert_eq!(initial["tool_choice"], "auto");
        assert_eq!(initial["max_tokens"], 800);
        assert_eq!(initial["temperature"], 0.0);

        let follow_up = backend.request("policy", &[Message::user("hi")], &[]).unwrap();
        let follow_up = serde_json::to_value(&follow_up).unwrap();
        assert!(follow_up.get("tools").map_or(true, Value::is_null));
        assert!(follow_up.get("tool_choice").map_or(true, Value::is_null));
    }

    #[test]
    fn test_tool_calls_finish_reason_is_tool_use() {
        let response: CreateChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "get_course_outline", "arguments": "{\"course_title\":\"MCP\"}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "search_course_content", "arguments": "not json"}}
                    ]
                },
                "finish_reason": "tool_calls",
                "logprobs": null
            }]
        }))
        .unwrap();

        let response = into_model_response(response).unwrap();
        assert!(response.wants_tools());
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].input, json!({"course_title": "MCP"}));
        assert_eq!(uses[1].input, json!("not json"));
        assert_eq!(response.text(), "");
    }
}
