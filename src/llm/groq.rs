//! Groq translation client
//!
//! Async HTTP client for an OpenAI-compatible chat-completions endpoint,
//! used both for command translation and for text-based data extraction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{
    BackendMode, KinesisError, Result, ScreenState, StateConfig, TranslatorConfig,
};
use crate::llm::traits::Translator;

/// Instructions for the structural backend, where elements are addressable
/// by CSS selector.
const STRUCTURAL_SYSTEM_PROMPT: &str = r##"You are an AI agent controlling a web browser based on user commands.
Your goal is to translate the user's command into a single, executable browser action.
You are given the user's command and the current state of the browser, which includes:
- `url`: The current URL.
- `title`: The current page title.
- `elements`: A list of visible interactive elements on the page. Each element is a dictionary containing its `tag`, and potentially attributes like `text`, `id`, `name`, `placeholder`, `aria-label`, `type`, `role`, `value`.

Available actions:
1. `navigate`: Go to a specific URL. Requires `url` parameter.
2. `click`: Click on an element. Requires a `selector` parameter (CSS selector).
3. `type`: Type text into an input field. Requires `selector` (CSS selector) and `text` parameters.
4. `scroll`: Scroll the page up or down. Requires `direction` parameter ("up" or "down").
5. `press_key`: Press a single key. Requires `key_name` parameter (e.g. "enter", "esc", "tab").

Based on the user command and the *provided elements list*, determine the most appropriate *single* action to perform next.

IMPORTANT for `click` and `type` actions:
- Analyze the `elements` list to find the element that best matches the user's command.
- Construct the best possible CSS selector for the target element identified in the list.
- Prioritize using unique attributes: id, name, aria-label, placeholder.
- If unique attributes are missing, combine tag with text: `button:has-text('Log In')`.
- Ensure the generated selector uniquely targets the intended element based on the provided list.

Respond ONLY with a single JSON object of the form {"action": ..., "parameters": {...}}.

Example Command: "Go to example.com"
Example Response: {"action": "navigate", "parameters": {"url": "https://example.com"}}

Example Command: "Click the login button"
Example State: {"url": "https://example.com", "title": "Example", "elements": [{"tag": "button", "id": "login-btn", "text": "Log In"}]}
Example Response: {"action": "click", "parameters": {"selector": "#login-btn"}}
"##;

/// Instructions for the pixel backend, where targets are natural-language
/// descriptions resolved through template matching.
const PIXEL_SYSTEM_PROMPT: &str = r#"You are an AI agent controlling a computer screen based on user commands.
Your goal is to translate the user's command into a single, executable action.
You are given the user's command and the current state of the screen, which includes:
- `visible_text`: Text recognized on the screen.

Available actions:
1. `navigate`: Go to a specific URL in the browser. Requires `url` parameter.
2. `click`: Click on a UI target. Requires a `target_description` parameter: a short name for the target, e.g. "login button" or "search bar".
3. `type`: Type text into a field. Requires `target_description` and `text` parameters.
4. `scroll`: Scroll the page up or down. Requires `direction` parameter ("up" or "down").
5. `press_key`: Press a single key. Requires `key_name` parameter (e.g. "enter", "esc", "tab").

Target descriptions must be short, stable names for on-screen controls; the same control should always get the same description.

Respond ONLY with a single JSON object of the form {"action": ..., "parameters": {...}}.

Example Command: "Go to example.com"
Example Response: {"action": "navigate", "parameters": {"url": "https://example.com"}}

Example Command: "Click the login button"
Example Response: {"action": "click", "parameters": {"target_description": "login button"}}
"#;

const EXTRACT_SYSTEM_PROMPT: &str = r#"You are an AI assistant tasked with extracting specific information from text content found on a web page.
You will be given:
1. An extraction query specifying what information to find.
2. The visible text content scraped from the web page screen.

Based *only* on the provided text content, extract the information requested in the query.
Structure your response as a JSON object containing the extracted data.
If the requested information is not found in the provided text, return an empty JSON object or indicate that the information is missing.
Do not invent information not present in the text.
Focus solely on the extraction task based on the text provided.
"#;

/// Groq API client (OpenAI-compatible wire format)
#[derive(Clone)]
pub struct GroqTranslator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    mode: BackendMode,
    caps: StateConfig,
    debug: bool,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl GroqTranslator {
    /// Create a translator from configuration
    ///
    /// Fails when the API key environment variable is unset.
    pub fn from_config(
        config: &TranslatorConfig,
        caps: StateConfig,
        mode: BackendMode,
        debug: bool,
    ) -> Result<Self> {
        let api_key = config.api_key()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| KinesisError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            mode,
            caps,
            debug,
        })
    }

    fn system_prompt(&self) -> &'static str {
        match self.mode {
            BackendMode::Structural => STRUCTURAL_SYSTEM_PROMPT,
            BackendMode::Pixel => PIXEL_SYSTEM_PROMPT,
        }
    }

    /// Run one JSON-mode chat completion and parse the returned object
    async fn chat_json(
        &self,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Result<Value> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature,
            response_format: ResponseFormat {
                format: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let detail = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            return Err(KinesisError::translation(format!(
                "API error ({}): {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| KinesisError::translation("no content in model response"))?;

        if self.debug {
            eprintln!("DEBUG: model response: {}", content);
        }

        // Strip markdown fences some models add despite JSON mode.
        let cleaned = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        serde_json::from_str(cleaned)
            .map_err(|e| KinesisError::translation(format!("unparseable model response: {}", e)))
    }
}

#[async_trait]
impl Translator for GroqTranslator {
    async fn translate(&self, command: &str, state: &ScreenState) -> Result<Value> {
        let bounded = state.to_prompt_json(&self.caps);
        let user = format!("Command: {:?}\nCurrent State: {}", command, bounded);
        self.chat_json(self.system_prompt(), user, self.temperature)
            .await
    }

    async fn extract(&self, query: &str, content: &str) -> Result<Value> {
        let user = format!(
            "Extraction Query: {:?}\n\nVisible Text Content:\n```\n{}\n```",
            query, content
        );
        self.chat_json(EXTRACT_SYSTEM_PROMPT, user, 0.0).await
    }

    fn name(&self) -> &str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_json_mode() {
        let request = ChatRequest {
            model: "llama3-70b-8192",
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: 0.1,
            response_format: ResponseFormat {
                format: "json_object",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["model"], "llama3-70b-8192");
    }

    #[test]
    fn test_response_parses() {
        let raw = json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"action\": \"scroll\"}"}}]
        });
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content,
            "{\"action\": \"scroll\"}"
        );
    }
}
