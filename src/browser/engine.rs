//! Structural browser engine
//!
//! [`BrowserEngine`] is the narrow contract the structural backend consumes:
//! query elements by selector, check visibility, click/fill/scroll. The
//! default implementation wraps the agent-browser CLI.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::core::{ElementDescriptor, KinesisError, Result, ScrollDirection};

/// Attributes harvested per element, in the order they are reported
const ATTRIBUTE_KEYS: [&str; 8] = [
    "text",
    "id",
    "name",
    "placeholder",
    "aria-label",
    "type",
    "role",
    "value",
];

/// Poll interval for visibility/attachment checks
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Narrow structural-browser contract
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a URL in the session's page
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current page URL
    async fn current_url(&self) -> Result<String>;

    /// Current page title
    async fn title(&self) -> Result<String>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Whether the nth match becomes visible within the given bound
    async fn is_visible(&self, selector: &str, index: usize, within: Duration) -> Result<bool>;

    /// Tag and non-empty attributes of the nth match; `None` when it is gone
    async fn describe(&self, selector: &str, index: usize) -> Result<Option<ElementDescriptor>>;

    /// Wait until the first match is visible, failing at the timeout
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Wait until the first match is attached to the DOM (visibility not
    /// required), failing at the timeout
    async fn wait_attached(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Hover the first match
    async fn hover(&self, selector: &str) -> Result<()>;

    /// Scroll the first match into view
    async fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Click the first match with standard interaction preconditions
    async fn click(&self, selector: &str) -> Result<()>;

    /// Programmatic click requiring only DOM attachment
    async fn click_unchecked(&self, selector: &str) -> Result<()>;

    /// Replace the first match's content with `text`
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Press a key by its DOM name
    async fn press(&self, key: &str) -> Result<()>;

    /// Script-driven viewport scroll of one viewport height
    async fn scroll_viewport(&self, direction: ScrollDirection) -> Result<()>;

    /// Wait for the page load signal, failing at the timeout
    async fn wait_for_load(&self, timeout: Duration) -> Result<()>;

    /// Close the session's page
    async fn close(&self) -> Result<()>;
}

/// Engine implementation wrapping the agent-browser CLI
pub struct AgentBrowserEngine {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
}

impl AgentBrowserEngine {
    /// Create a new engine
    pub fn new(session_name: impl Into<String>, headed: bool) -> Self {
        Self {
            session_name: session_name.into(),
            headed,
        }
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(["--session", &self.session_name]);

        if self.headed {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KinesisError::AgentBrowserNotFound
            } else {
                KinesisError::browser(format!("Failed to run agent-browser: {}", e))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(KinesisError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    /// Evaluate JavaScript and parse the printed result
    ///
    /// Scripts return JSON-stringified values; a doubly-encoded string is
    /// unwrapped once.
    async fn eval(&self, script: &str) -> Result<Value> {
        let raw = self.run_command(&["eval", script]).await?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::String(inner)) => {
                Ok(serde_json::from_str(&inner).unwrap_or(Value::String(inner)))
            }
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(trimmed.to_string())),
        }
    }

    /// One-shot visibility check for the nth match
    async fn check_visible(&self, selector: &str, index: usize) -> Result<bool> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelectorAll({sel})[{idx}];
  if (!el) return false;
  if (el.offsetParent === null && el.tagName !== 'BODY') return false;
  const s = getComputedStyle(el);
  return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
}})()"#,
            sel = js_string(selector),
            idx = index,
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    /// One-shot attachment check for the first match
    async fn check_attached(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "!!document.querySelector({sel})",
            sel = js_string(selector)
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }
}

/// Quote a string for embedding into a JavaScript snippet
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[async_trait]
impl BrowserEngine for AgentBrowserEngine {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url]).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn title(&self) -> Result<String> {
        self.run_command(&["get", "title"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({sel}).length",
            sel = js_string(selector)
        );
        let value = self.eval(&script).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| KinesisError::browser(format!("non-numeric count for '{}'", selector)))
    }

    async fn is_visible(&self, selector: &str, index: usize, within: Duration) -> Result<bool> {
        let deadline = Instant::now() + within;
        loop {
            if self.check_visible(selector, index).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn describe(&self, selector: &str, index: usize) -> Result<Option<ElementDescriptor>> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelectorAll({sel})[{idx}];
  if (!el) return JSON.stringify(null);
  return JSON.stringify({{
    tag: el.tagName.toLowerCase(),
    text: (el.textContent || '').trim(),
    id: el.id || '',
    name: el.getAttribute('name') || '',
    placeholder: el.getAttribute('placeholder') || '',
    'aria-label': el.getAttribute('aria-label') || '',
    type: el.getAttribute('type') || '',
    role: el.getAttribute('role') || '',
    value: el.value || ''
  }});
}})()"#,
            sel = js_string(selector),
            idx = index,
        );

        let value = self.eval(&script).await?;
        let Some(object) = value.as_object() else {
            return Ok(None);
        };

        let tag = object
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let mut descriptor = ElementDescriptor::new(tag);
        for key in ATTRIBUTE_KEYS {
            if let Some(attr) = object.get(key).and_then(Value::as_str) {
                descriptor.set_attr(key, attr);
            }
        }
        Ok(Some(descriptor))
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        if self.is_visible(selector, 0, timeout).await? {
            Ok(())
        } else {
            Err(KinesisError::resolution(format!(
                "timed out after {:?} waiting for '{}' to become visible",
                timeout, selector
            )))
        }
    }

    async fn wait_attached(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.check_attached(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(KinesisError::resolution(format!(
                    "timed out after {:?} waiting for '{}' to attach",
                    timeout, selector
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.run_command(&["hover", selector]).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({sel});
  if (el) el.scrollIntoView({{block: 'center'}});
  return true;
}})()"#,
            sel = js_string(selector)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.run_command(&["click", selector]).await?;
        Ok(())
    }

    async fn click_unchecked(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) throw new Error('element not attached');
  el.click();
  return true;
}})()"#,
            sel = js_string(selector)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.run_command(&["fill", selector, text]).await?;
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<()> {
        self.run_command(&["press", key]).await?;
        Ok(())
    }

    async fn scroll_viewport(&self, direction: ScrollDirection) -> Result<()> {
        let script = match direction {
            ScrollDirection::Down => "window.scrollBy(0, window.innerHeight)",
            ScrollDirection::Up => "window.scrollBy(0, -window.innerHeight)",
        };
        self.eval(script).await?;
        Ok(())
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let wait = self.run_command(&["wait", "--load", "domcontentloaded"]);
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(KinesisError::timeout(format!(
                "page load signal not observed within {:?}",
                timeout
            ))),
        }
    }

    async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation() {
        let engine = AgentBrowserEngine::new("test-session", false);
        assert_eq!(engine.session_name, "test-session");
        assert!(!engine.headed);
    }

    #[test]
    fn test_js_string_quotes_selectors() {
        assert_eq!(js_string("#login-btn"), "\"#login-btn\"");
        assert_eq!(
            js_string("a[href=\"/x\"]"),
            "\"a[href=\\\"/x\\\"]\"".to_string()
        );
    }
}
