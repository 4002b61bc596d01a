//! Structural backend controller
//!
//! Harvests visible interactive elements from the page and executes action
//! plans against CSS selectors, with a programmatic-click fallback for
//! elements that are clickable without meeting the standard interaction
//! preconditions.

use url::Url;

use crate::browser::engine::BrowserEngine;
use crate::core::{
    BrowserConfig, ElementDescriptor, ExecutionResult, KeyName, KinesisError, Result, ScreenState,
    ScrollDirection, StateConfig,
};

/// Element categories scanned during extraction, in priority order
const SELECTOR_CATEGORIES: [&str; 12] = [
    "button",
    "a[href]",
    "input:not([type='hidden'])",
    "textarea",
    "select",
    "[role='button']",
    "[role='link']",
    "[role='menuitem']",
    "[role='tab']",
    "[role='checkbox']",
    "[role='radio']",
    "[contenteditable='true']",
];

/// Structural backend session
pub struct BrowserController {
    engine: Box<dyn BrowserEngine>,
    config: BrowserConfig,
    caps: StateConfig,
    debug: bool,
}

impl BrowserController {
    /// Create a controller over an engine
    pub fn new(
        engine: Box<dyn BrowserEngine>,
        config: BrowserConfig,
        caps: StateConfig,
        debug: bool,
    ) -> Self {
        Self {
            engine,
            config,
            caps,
            debug,
        }
    }

    /// Open the initial target; the session is unusable when this fails
    pub async fn setup(&self, initial_url: &str) -> Result<()> {
        let result = self.navigate(initial_url).await;
        if result.success {
            Ok(())
        } else {
            Err(KinesisError::browser(result.error.unwrap_or_else(|| {
                format!("setup navigation to {} failed", initial_url)
            })))
        }
    }

    /// Snapshot the page: URL, title and visible interactive elements
    ///
    /// Never fails; unobservable url/title degrade to "Error" and element
    /// extraction degrades to whatever was harvested before trouble started.
    pub async fn get_current_state(&self) -> ScreenState {
        let url = match self.engine.current_url().await {
            Ok(url) => url,
            Err(e) => {
                eprintln!("Warning: could not read page url: {}", e);
                "Error".to_string()
            }
        };
        let title = match self.engine.title().await {
            Ok(title) => title,
            Err(e) => {
                eprintln!("Warning: could not read page title: {}", e);
                "Error".to_string()
            }
        };
        let elements = self.interactive_elements().await;
        if self.debug {
            eprintln!("DEBUG: extracted {} interactive elements", elements.len());
        }
        ScreenState::structural(url, title, elements)
    }

    /// Harvest visible interactive elements up to the extraction cap
    ///
    /// Categories are scanned in declared order, elements in document order
    /// within each category. A failing category or element is skipped; it
    /// never aborts the rest of the scan.
    async fn interactive_elements(&self) -> Vec<ElementDescriptor> {
        let mut elements = Vec::new();

        'scan: for selector in SELECTOR_CATEGORIES {
            let matches = match self.engine.count(selector).await {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("Warning: could not enumerate '{}': {}", selector, e);
                    continue;
                }
            };

            for index in 0..matches {
                if elements.len() >= self.caps.max_elements {
                    break 'scan;
                }
                match self.probe_element(selector, index).await {
                    Ok(Some(descriptor)) => elements.push(descriptor),
                    Ok(None) => {}
                    Err(e) => {
                        if self.debug {
                            eprintln!("DEBUG: skipping '{}'[{}]: {}", selector, index, e);
                        }
                    }
                }
            }
        }

        elements
    }

    /// Visibility probe + attribute extraction for one candidate
    async fn probe_element(
        &self,
        selector: &str,
        index: usize,
    ) -> Result<Option<ElementDescriptor>> {
        if !self
            .engine
            .is_visible(selector, index, self.caps.visibility_probe())
            .await?
        {
            return Ok(None);
        }
        self.engine.describe(selector, index).await
    }

    /// Direct navigation with a bounded timeout; fails without retry
    pub async fn navigate(&self, url: &str) -> ExecutionResult {
        if let Err(e) = Url::parse(url) {
            return ExecutionResult::fail(format!("invalid url '{}': {}", url, e));
        }

        let attempt = async {
            self.engine.navigate(url).await?;
            self.engine.wait_for_load(self.config.load_timeout()).await
        };

        match tokio::time::timeout(self.config.navigate_timeout(), attempt).await {
            Ok(Ok(())) => match self.engine.current_url().await {
                Ok(current) => ExecutionResult::ok_at(current),
                Err(_) => ExecutionResult::ok(),
            },
            Ok(Err(e)) => ExecutionResult::fail(format!("navigation to {} failed: {}", url, e)),
            Err(_) => ExecutionResult::fail(format!(
                "navigation to {} timed out after {:?}",
                url,
                self.config.navigate_timeout()
            )),
        }
    }

    /// Click with an ordered pair of strategies
    ///
    /// The standard path requires visibility and scrolls/hovers first; some
    /// elements are clickable even when those preconditions are not met, so
    /// a failed standard click falls back once to a programmatic click
    /// against the same selector matched only by DOM attachment. When both
    /// fail, the reported error carries both causes.
    pub async fn click(&self, selector: &str) -> ExecutionResult {
        let primary = match self.click_standard(selector).await {
            Ok(url) => return ExecutionResult::ok_at(url),
            Err(e) => e,
        };

        eprintln!("Warning: standard click failed, attempting programmatic fallback");

        match self.click_programmatic(selector).await {
            Ok(url) => ExecutionResult::ok_at(url),
            Err(fallback) => ExecutionResult::fail(format!(
                "Initial error: {}. Fallback error: {}",
                primary, fallback
            )),
        }
    }

    async fn click_standard(&self, selector: &str) -> Result<String> {
        self.engine
            .wait_visible(selector, self.config.element_timeout())
            .await?;
        self.engine.hover(selector).await?;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        self.engine.scroll_into_view(selector).await?;
        self.engine.click(selector).await?;
        self.engine
            .wait_for_load(self.config.load_timeout())
            .await?;
        tokio::time::sleep(self.config.settle()).await;
        self.engine.current_url().await
    }

    async fn click_programmatic(&self, selector: &str) -> Result<String> {
        self.engine
            .wait_attached(selector, self.config.element_timeout())
            .await?;
        self.engine.click_unchecked(selector).await?;
        self.engine
            .wait_for_load(self.config.load_timeout())
            .await?;
        tokio::time::sleep(self.config.settle()).await;
        self.engine.current_url().await
    }

    /// Replace a field's content atomically (never append)
    pub async fn type_text(&self, selector: &str, text: &str) -> ExecutionResult {
        let attempt = async {
            self.engine
                .wait_visible(selector, self.config.element_timeout())
                .await?;
            self.engine.scroll_into_view(selector).await?;
            self.engine.fill(selector, text).await
        };

        match attempt.await {
            Ok(()) => ExecutionResult::ok(),
            Err(e) => ExecutionResult::fail(format!("typing into {} failed: {}", selector, e)),
        }
    }

    /// Fixed-magnitude viewport scroll
    pub async fn scroll(&self, direction: ScrollDirection) -> ExecutionResult {
        match self.engine.scroll_viewport(direction).await {
            Ok(()) => {
                tokio::time::sleep(self.config.scroll_settle()).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("scroll {} failed: {}", direction, e)),
        }
    }

    /// Press a validated key
    pub async fn press_key(&self, key: KeyName) -> ExecutionResult {
        match self.engine.press(key.dom_key()).await {
            Ok(()) => ExecutionResult::ok(),
            Err(e) => ExecutionResult::fail(format!("pressing {} failed: {}", key.dom_key(), e)),
        }
    }

    /// Release the page
    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    struct MockElement {
        visible: bool,
        descriptor: ElementDescriptor,
    }

    #[derive(Default)]
    struct ScriptedState {
        url: String,
        elements: HashMap<String, Vec<MockElement>>,
        failing_categories: HashSet<String>,
        click_fails: bool,
        js_click_fails: bool,
        clicked: Vec<String>,
        js_clicked: Vec<String>,
        filled: Vec<(String, String)>,
        pressed: Vec<String>,
        navigated: Vec<String>,
    }

    struct ScriptedEngine {
        state: Arc<Mutex<ScriptedState>>,
    }

    impl ScriptedEngine {
        fn visible_button(id: &str, text: &str) -> MockElement {
            MockElement {
                visible: true,
                descriptor: ElementDescriptor::new("button")
                    .with_attr("id", id)
                    .with_attr("text", text),
            }
        }
    }

    #[async_trait]
    impl BrowserEngine for ScriptedEngine {
        async fn navigate(&self, url: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.navigated.push(url.to_string());
            state.url = url.to_string();
            Ok(())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(self.state.lock().unwrap().url.clone())
        }

        async fn title(&self) -> Result<String> {
            Ok("Scripted Page".to_string())
        }

        async fn count(&self, selector: &str) -> Result<usize> {
            let state = self.state.lock().unwrap();
            if state.failing_categories.contains(selector) {
                return Err(KinesisError::browser("category query exploded"));
            }
            Ok(state.elements.get(selector).map_or(0, Vec::len))
        }

        async fn is_visible(&self, selector: &str, index: usize, _within: Duration) -> Result<bool> {
            let state = self.state.lock().unwrap();
            Ok(state
                .elements
                .get(selector)
                .and_then(|els| els.get(index))
                .is_some_and(|el| el.visible))
        }

        async fn describe(
            &self,
            selector: &str,
            index: usize,
        ) -> Result<Option<ElementDescriptor>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .elements
                .get(selector)
                .and_then(|els| els.get(index))
                .map(|el| el.descriptor.clone()))
        }

        async fn wait_visible(&self, selector: &str, _timeout: Duration) -> Result<()> {
            let state = self.state.lock().unwrap();
            let visible = state
                .elements
                .values()
                .flatten()
                .any(|el| el.visible && el.descriptor.attr("id").map(|id| format!("#{}", id)) == Some(selector.to_string()));
            if visible {
                Ok(())
            } else {
                Err(KinesisError::resolution(format!(
                    "'{}' never became visible",
                    selector
                )))
            }
        }

        async fn wait_attached(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn hover(&self, _selector: &str) -> Result<()> {
            Ok(())
        }

        async fn scroll_into_view(&self, _selector: &str) -> Result<()> {
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.click_fails {
                return Err(KinesisError::browser("element is occluded"));
            }
            state.clicked.push(selector.to_string());
            Ok(())
        }

        async fn click_unchecked(&self, selector: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.js_click_fails {
                return Err(KinesisError::browser("programmatic click threw"));
            }
            state.js_clicked.push(selector.to_string());
            Ok(())
        }

        async fn fill(&self, selector: &str, text: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.filled.push((selector.to_string(), text.to_string()));
            Ok(())
        }

        async fn press(&self, key: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.pressed.push(key.to_string());
            Ok(())
        }

        async fn scroll_viewport(&self, _direction: ScrollDirection) -> Result<()> {
            Ok(())
        }

        async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> BrowserConfig {
        BrowserConfig {
            settle_ms: 0,
            scroll_settle_ms: 0,
            ..BrowserConfig::default()
        }
    }

    fn controller(state: ScriptedState) -> (BrowserController, Arc<Mutex<ScriptedState>>) {
        let shared = Arc::new(Mutex::new(state));
        let engine = ScriptedEngine {
            state: Arc::clone(&shared),
        };
        let controller = BrowserController::new(
            Box::new(engine),
            fast_config(),
            StateConfig::default(),
            false,
        );
        (controller, shared)
    }

    #[tokio::test]
    async fn test_extraction_caps_at_30_elements() {
        let mut state = ScriptedState::default();
        state.elements.insert(
            "button".to_string(),
            (0..50)
                .map(|i| ScriptedEngine::visible_button(&format!("b{}", i), "x"))
                .collect(),
        );
        let (controller, _shared) = controller(state);
        let snapshot = controller.get_current_state().await;
        assert_eq!(snapshot.elements.len(), 30);
    }

    #[tokio::test]
    async fn test_extraction_preserves_category_order() {
        let mut state = ScriptedState::default();
        state.elements.insert(
            "a[href]".to_string(),
            vec![MockElement {
                visible: true,
                descriptor: ElementDescriptor::new("a").with_attr("text", "Home"),
            }],
        );
        state.elements.insert(
            "button".to_string(),
            vec![ScriptedEngine::visible_button("go", "Go")],
        );
        let (controller, _shared) = controller(state);
        let snapshot = controller.get_current_state().await;
        // Buttons are declared before links.
        assert_eq!(snapshot.elements[0].tag, "button");
        assert_eq!(snapshot.elements[1].tag, "a");
    }

    #[tokio::test]
    async fn test_extraction_skips_invisible_elements() {
        let mut state = ScriptedState::default();
        state.elements.insert(
            "button".to_string(),
            vec![
                ScriptedEngine::visible_button("shown", "Shown"),
                MockElement {
                    visible: false,
                    descriptor: ElementDescriptor::new("button").with_attr("id", "hidden"),
                },
            ],
        );
        let (controller, _shared) = controller(state);
        let snapshot = controller.get_current_state().await;
        assert_eq!(snapshot.elements.len(), 1);
        assert_eq!(snapshot.elements[0].attr("id"), Some("shown"));
    }

    #[tokio::test]
    async fn test_failing_category_never_aborts_scan() {
        let mut state = ScriptedState::default();
        state.failing_categories.insert("button".to_string());
        state.elements.insert(
            "a[href]".to_string(),
            vec![MockElement {
                visible: true,
                descriptor: ElementDescriptor::new("a").with_attr("text", "Still here"),
            }],
        );
        let (controller, _shared) = controller(state);
        let snapshot = controller.get_current_state().await;
        assert_eq!(snapshot.elements.len(), 1);
        assert_eq!(snapshot.elements[0].tag, "a");
    }

    #[tokio::test]
    async fn test_navigate_rejects_invalid_url() {
        let (controller, _shared) = controller(ScriptedState::default());
        let result = controller.navigate("not a url").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid url"));
    }

    #[tokio::test]
    async fn test_navigate_reports_final_url() {
        let (controller, shared) = controller(ScriptedState::default());
        let result = controller.navigate("https://example.com").await;
        assert!(result.success);
        assert_eq!(result.url.as_deref(), Some("https://example.com"));
        assert_eq!(shared.lock().unwrap().navigated, vec!["https://example.com"]);
    }

    #[tokio::test]
    async fn test_click_standard_path() {
        let mut state = ScriptedState::default();
        state.elements.insert(
            "button".to_string(),
            vec![ScriptedEngine::visible_button("login-btn", "Log In")],
        );
        let (controller, shared) = controller(state);
        let result = controller.click("#login-btn").await;
        assert!(result.success);
        assert_eq!(shared.lock().unwrap().clicked, vec!["#login-btn"]);
    }

    #[tokio::test]
    async fn test_click_falls_back_to_programmatic() {
        let mut state = ScriptedState::default();
        state.click_fails = true;
        state.elements.insert(
            "button".to_string(),
            vec![ScriptedEngine::visible_button("login-btn", "Log In")],
        );
        let (controller, shared) = controller(state);
        let result = controller.click("#login-btn").await;
        assert!(result.success);
        let recorded = shared.lock().unwrap();
        assert!(recorded.clicked.is_empty());
        assert_eq!(recorded.js_clicked, vec!["#login-btn"]);
    }

    #[tokio::test]
    async fn test_click_failure_reports_both_causes() {
        let mut state = ScriptedState::default();
        state.click_fails = true;
        state.js_click_fails = true;
        state.elements.insert(
            "button".to_string(),
            vec![ScriptedEngine::visible_button("login-btn", "Log In")],
        );
        let (controller, _shared) = controller(state);
        let result = controller.click("#login-btn").await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Initial error"));
        assert!(error.contains("Fallback error"));
        assert!(error.contains("occluded"));
        assert!(error.contains("programmatic click threw"));
    }

    #[tokio::test]
    async fn test_type_replaces_field_content() {
        let mut state = ScriptedState::default();
        state.elements.insert(
            "input:not([type='hidden'])".to_string(),
            vec![MockElement {
                visible: true,
                descriptor: ElementDescriptor::new("input").with_attr("id", "search"),
            }],
        );
        let (controller, shared) = controller(state);
        let result = controller.type_text("#search", "playwright").await;
        assert!(result.success);
        assert_eq!(
            shared.lock().unwrap().filled,
            vec![("#search".to_string(), "playwright".to_string())]
        );
    }

    #[tokio::test]
    async fn test_press_key_uses_dom_name() {
        let (controller, shared) = controller(ScriptedState::default());
        let result = controller.press_key(KeyName::Enter).await;
        assert!(result.success);
        assert_eq!(shared.lock().unwrap().pressed, vec!["Enter"]);
    }
}
