//! Prompt templates for Syllabus.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the course assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    /// Policy prompt: tool selection guidance and response style.
    pub system: String,
    /// User turn template. `{{query}}` is replaced by the caller's question.
    pub query: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant for course materials and educational content, with search tools over the indexed course library.

Available tools:
1. search_course_content - lesson content, detailed explanations and specific topics
2. get_course_outline - course structure: title, link and the numbered list of lessons

Choosing a tool:
- Outline or structure questions ("What lessons are in X?", "Show me the outline of X") use get_course_outline
- Questions about what a lesson covers or about a concept from a course use search_course_content
- General knowledge questions are answered from your own knowledge without searching

Tool usage:
- Use at most one search per query
- Pick the single most appropriate tool
- Build the answer from the tool result; if it found nothing, say so plainly without offering alternatives

When answering from get_course_outline, always include:
- the exact course title
- the course link, if there is one
- every lesson with its number and title
- the total number of lessons

Style:
- Answer directly. No reasoning narration, no description of the search, no "based on the search results"
- Be brief and focused
- Keep it educational and use clear language
- Add an example when it helps understanding"#
                .to_string(),

            query: "Answer this question about course materials: {{query}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Single pass over the template: substituted values are never scanned
    /// again, and unknown `{{name}}` placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = &after[..end];
                    match vars.get(key) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push_str("{{");
                            result.push_str(key);
                            result.push_str("}}");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The policy system prompt with custom variables applied.
    pub fn system_prompt(&self) -> String {
        Self::render(&self.assistant.system, &self.variables)
    }

    /// Frame a caller's question as the user turn.
    pub fn user_query(&self, query: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        self.render_with_custom(&self.assistant.query, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.assistant.system.contains("search_course_content"));
        assert!(prompts.assistant.system.contains("get_course_outline"));
        assert!(prompts.assistant.system.contains("at most one search per query"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_user_query_framing() {
        let prompts = Prompts::default();
        assert_eq!(
            prompts.user_query("What is MCP?"),
            "Answer this question about course materials: What is MCP?"
        );
    }

    #[test]
    fn test_query_var_beats_custom_variable() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("query".to_string(), "ignored".to_string());
        assert!(prompts.user_query("kept").ends_with("kept"));
    }

    #[test]
    fn test_query_text_is_not_rendered() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("school".to_string(), "DeepLearning".to_string());
        assert_eq!(
            prompts.user_query("What does {{school}} mean in {{unknown"),
            "Answer this question about course materials: What does {{school}} mean in {{unknown"
        );
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "{{count}}".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render("{{name}} {{missing}} {{count}}", &vars);
        assert_eq!(result, "{{count}} {{missing}} 5");
    }

    #[test]
    fn test_load_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("assistant.toml"),
            "system = \"You teach {{school}} courses.\"\n",
        )
        .unwrap();

        let mut vars = HashMap::new();
        vars.insert("school".to_string(), "DeepLearning".to_string());
        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();

        assert_eq!(prompts.system_prompt(), "You teach DeepLearning courses.");
        // Unspecified keys keep their defaults.
        assert!(prompts.assistant.query.contains("{{query}}"));
    }
}
