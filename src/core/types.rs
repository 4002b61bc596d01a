//! Shared types used across Kinesis modules
//!
//! Contains the screen state model, the action plan produced by the
//! translation boundary, and the uniform execution result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::StateConfig;
use crate::core::error::{KinesisError, Result};

/// URL/title sentinel reported by the pixel backend, which has no DOM access.
pub const OS_STATE_SENTINEL: &str = "unknown - OS control";

/// Which automation surface a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// DOM-aware browser; targets are CSS selectors
    Structural,
    /// Screen raster + synthesized input; targets are template descriptions
    Pixel,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Structural => write!(f, "structural"),
            BackendMode::Pixel => write!(f, "pixel"),
        }
    }
}

/// A visible interactive element harvested from the page
///
/// Attributes hold only non-empty values; ordering inside the state follows
/// the extraction category order, then document order within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Lowercased tag name
    pub tag: String,
    /// Non-empty attributes (text, id, name, placeholder, aria-label, type, role, value)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementDescriptor {
    /// Create a descriptor with no attributes yet
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute, dropping it when the value is empty
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.insert(key.into(), value);
        }
    }

    /// Builder-style variant of [`set_attr`](Self::set_attr)
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Attribute lookup
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// One-line rendering used for text-based extraction
    pub fn summary(&self) -> String {
        let attrs: Vec<String> = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect();
        format!("<{}> {}", self.tag, attrs.join(" "))
    }
}

/// Snapshot of the UI surface, recreated fresh before every translation call
///
/// The structural backend fills `url`, `title` and `elements`; the pixel
/// backend reports sentinels for `url`/`title` and fills `visible_text` and
/// `screenshot` instead.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenState {
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_text: Option<String>,
    /// Base64 PNG of the captured raster; kept for diagnostics, never sent
    /// to the translation service
    #[serde(skip)]
    pub screenshot: Option<String>,
}

impl ScreenState {
    /// State harvested from the DOM-aware backend
    pub fn structural(
        url: impl Into<String>,
        title: impl Into<String>,
        elements: Vec<ElementDescriptor>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            elements,
            visible_text: None,
            screenshot: None,
        }
    }

    /// State captured from the pixel backend
    pub fn pixel(visible_text: impl Into<String>, screenshot: Option<String>) -> Self {
        Self {
            url: OS_STATE_SENTINEL.to_string(),
            title: OS_STATE_SENTINEL.to_string(),
            elements: Vec::new(),
            visible_text: Some(visible_text.into()),
            screenshot,
        }
    }

    /// Degraded pixel state when even the capture failed
    pub fn pixel_error(error: impl fmt::Display) -> Self {
        Self {
            url: "Error".to_string(),
            title: "Error".to_string(),
            elements: Vec::new(),
            visible_text: Some(format!("Error capturing state: {}", error)),
            screenshot: None,
        }
    }

    /// Size-bounded JSON representation sent to the translation service
    ///
    /// Elements are truncated to the prompt cap in extraction order and
    /// `visible_text` to the character cap with a trailing marker. The
    /// screenshot is never included.
    pub fn to_prompt_json(&self, caps: &StateConfig) -> Value {
        let elements: Vec<&ElementDescriptor> = self
            .elements
            .iter()
            .take(caps.max_prompt_elements)
            .collect();

        let mut state = json!({
            "url": self.url,
            "title": self.title,
            "elements": elements,
        });

        if let Some(ref text) = self.visible_text {
            state["visible_text"] = Value::String(truncate_text(text, caps.max_visible_text));
        }

        state
    }

    /// Text content available for LLM data extraction
    ///
    /// Pixel states contribute their OCR text; structural states contribute a
    /// compact rendering of url, title and elements. Returns `None` when the
    /// state carries nothing readable.
    pub fn text_content(&self) -> Option<String> {
        if let Some(ref text) = self.visible_text {
            if !text.is_empty() {
                return Some(text.clone());
            }
        }
        if self.elements.is_empty() {
            return None;
        }
        let mut out = format!("URL: {}\nTitle: {}\n", self.url, self.title);
        for element in &self.elements {
            out.push_str(&element.summary());
            out.push('\n');
        }
        Some(out)
    }
}

/// Truncate to `max` characters, appending a marker when content was dropped
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max).collect();
    format!("{}... [truncated]", truncated)
}

/// Direction for viewport scrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Parse the translator-provided direction string
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "up"),
            ScrollDirection::Down => write!(f, "down"),
        }
    }
}

/// Recognized key vocabulary for `press_key`
///
/// Parsing accepts a small set of aliases ("return", "esc", "page_down");
/// anything outside the vocabulary is a validation failure, never a silent
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
}

impl KeyName {
    /// Normalize a raw key name, returning `None` for unrecognized keys
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "enter" | "return" => Some(Self::Enter),
            "esc" | "escape" => Some(Self::Escape),
            "tab" => Some(Self::Tab),
            "space" | "spacebar" => Some(Self::Space),
            "backspace" => Some(Self::Backspace),
            "delete" | "del" => Some(Self::Delete),
            "up" | "arrow_up" | "arrowup" => Some(Self::ArrowUp),
            "down" | "arrow_down" | "arrowdown" => Some(Self::ArrowDown),
            "left" | "arrow_left" | "arrowleft" => Some(Self::ArrowLeft),
            "right" | "arrow_right" | "arrowright" => Some(Self::ArrowRight),
            "home" => Some(Self::Home),
            "end" => Some(Self::End),
            "page_up" | "pageup" => Some(Self::PageUp),
            "page_down" | "pagedown" => Some(Self::PageDown),
            _ => None,
        }
    }

    /// DOM key name understood by the structural backend
    pub fn dom_key(&self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Escape => "Escape",
            Self::Tab => "Tab",
            Self::Space => "Space",
            Self::Backspace => "Backspace",
            Self::Delete => "Delete",
            Self::ArrowUp => "ArrowUp",
            Self::ArrowDown => "ArrowDown",
            Self::ArrowLeft => "ArrowLeft",
            Self::ArrowRight => "ArrowRight",
            Self::Home => "Home",
            Self::End => "End",
            Self::PageUp => "PageUp",
            Self::PageDown => "PageDown",
        }
    }
}

/// Addressing mechanism for a UI element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDescriptor {
    /// CSS-like selector, consumed directly by the structural backend
    Selector(String),
    /// Natural-language description, resolved through template matching
    Description(String),
}

impl TargetDescriptor {
    pub fn as_str(&self) -> &str {
        match self {
            TargetDescriptor::Selector(s) => s,
            TargetDescriptor::Description(s) => s,
        }
    }
}

/// Validated instruction produced by translating a command against the
/// current UI state
///
/// Decoded exactly once from the raw `{action, parameters}` response; an
/// invalid plan is rejected as a whole, never executed partially.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPlan {
    Navigate { url: String },
    Click { target: TargetDescriptor },
    Type { target: TargetDescriptor, text: String },
    Scroll { direction: ScrollDirection },
    PressKey { key: KeyName },
}

impl ActionPlan {
    /// Decode and validate a raw translator response
    ///
    /// The response is untrusted: every required parameter is checked here,
    /// and any single violation discards the whole plan. Which target
    /// parameter `click`/`type` require depends on the backend mode.
    pub fn from_response(response: &Value, mode: BackendMode) -> Result<Self> {
        let action = response
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| KinesisError::validation("response missing 'action' key"))?;

        let params = response
            .get("parameters")
            .and_then(Value::as_object)
            .ok_or_else(|| KinesisError::validation("response missing 'parameters' object"))?;

        let string_param = |key: &str| -> Result<String> {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    KinesisError::validation(format!(
                        "action '{}' missing string parameter '{}'",
                        action, key
                    ))
                })
        };

        let target_param = || -> Result<TargetDescriptor> {
            match mode {
                BackendMode::Structural => Ok(TargetDescriptor::Selector(string_param("selector")?)),
                BackendMode::Pixel => Ok(TargetDescriptor::Description(string_param(
                    "target_description",
                )?)),
            }
        };

        match action {
            "navigate" => Ok(ActionPlan::Navigate {
                url: string_param("url")?,
            }),
            "click" => Ok(ActionPlan::Click {
                target: target_param()?,
            }),
            "type" => Ok(ActionPlan::Type {
                target: target_param()?,
                text: string_param("text")?,
            }),
            "scroll" => {
                let raw = string_param("direction")?;
                let direction = ScrollDirection::parse(&raw).ok_or_else(|| {
                    KinesisError::validation(format!(
                        "invalid scroll direction '{}' (expected 'up' or 'down')",
                        raw
                    ))
                })?;
                Ok(ActionPlan::Scroll { direction })
            }
            "press_key" => {
                let raw = string_param("key_name")?;
                let key = KeyName::parse(&raw).ok_or_else(|| {
                    KinesisError::validation(format!("unrecognized key name '{}'", raw))
                })?;
                Ok(ActionPlan::PressKey { key })
            }
            other => Err(KinesisError::validation(format!(
                "unrecognized action '{}'",
                other
            ))),
        }
    }

    /// Action kind name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ActionPlan::Navigate { .. } => "navigate",
            ActionPlan::Click { .. } => "click",
            ActionPlan::Type { .. } => "type",
            ActionPlan::Scroll { .. } => "scroll",
            ActionPlan::PressKey { .. } => "press_key",
        }
    }
}

/// Uniform return shape for every executor operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the action completed
    pub success: bool,
    /// Current URL after the action, when the backend can observe it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Human-readable failure cause
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Successful action with no observable URL
    pub fn ok() -> Self {
        Self {
            success: true,
            url: None,
            error: None,
        }
    }

    /// Successful action with the URL observed afterwards
    pub fn ok_at(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            error: None,
        }
    }

    /// Failed action with a cause
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            error: Some(error.into()),
        }
    }
}
