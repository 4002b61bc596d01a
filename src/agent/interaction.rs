//! Interaction orchestrator
//!
//! Owns exactly one automation session (a browser page or a screen/process)
//! and sequences extract → translate → validate → execute per command. One
//! command is processed at a time; callers must serialize.

use serde_json::Value;
use tokio::time::timeout;

use crate::browser::{AgentBrowserEngine, BrowserController, BrowserEngine};
use crate::core::{
    ActionPlan, BackendMode, Config, ExecutionResult, KinesisError, Result, ScreenState,
    TargetDescriptor,
};
use crate::llm::{extract_data, GroqTranslator, Translator};
use crate::os::OsController;

/// The single automation session an agent owns
enum Session {
    Browser(BrowserController),
    Os(OsController),
}

impl Session {
    async fn get_current_state(&self) -> ScreenState {
        match self {
            Session::Browser(controller) => controller.get_current_state().await,
            Session::Os(controller) => controller.get_current_state().await,
        }
    }

    /// Dispatch a validated plan to the backend
    ///
    /// Validation already enforced the backend-correct target variant; the
    /// mismatch arms are defensive and report rather than panic.
    async fn execute(&self, plan: &ActionPlan) -> ExecutionResult {
        match self {
            Session::Browser(controller) => match plan {
                ActionPlan::Navigate { url } => controller.navigate(url).await,
                ActionPlan::Click { target } => match target {
                    TargetDescriptor::Selector(selector) => controller.click(selector).await,
                    TargetDescriptor::Description(_) => {
                        ExecutionResult::fail("structural backend requires a selector target")
                    }
                },
                ActionPlan::Type { target, text } => match target {
                    TargetDescriptor::Selector(selector) => {
                        controller.type_text(selector, text).await
                    }
                    TargetDescriptor::Description(_) => {
                        ExecutionResult::fail("structural backend requires a selector target")
                    }
                },
                ActionPlan::Scroll { direction } => controller.scroll(*direction).await,
                ActionPlan::PressKey { key } => controller.press_key(*key).await,
            },
            Session::Os(controller) => match plan {
                ActionPlan::Navigate { url } => controller.navigate(url).await,
                ActionPlan::Click { target } => match target {
                    TargetDescriptor::Description(description) => {
                        controller.click(description).await
                    }
                    TargetDescriptor::Selector(_) => {
                        ExecutionResult::fail("pixel backend requires a target description")
                    }
                },
                ActionPlan::Type { target, text } => match target {
                    TargetDescriptor::Description(description) => {
                        controller.type_text(description, text).await
                    }
                    TargetDescriptor::Selector(_) => {
                        ExecutionResult::fail("pixel backend requires a target description")
                    }
                },
                ActionPlan::Scroll { direction } => controller.scroll(*direction).await,
                ActionPlan::PressKey { key } => controller.press_key(*key).await,
            },
        }
    }
}

/// Agent that interacts with a UI surface based on natural-language commands
///
/// Lifecycle: Uninitialized → Ready (after [`setup`](Self::setup)) → Closed
/// (after [`close`](Self::close)).
pub struct InteractionAgent {
    config: Config,
    translator: Box<dyn Translator>,
    session: Option<Session>,
}

impl InteractionAgent {
    /// Create an agent with the default Groq translator
    pub fn new(config: Config) -> Result<Self> {
        let translator = GroqTranslator::from_config(
            &config.translator,
            config.state.clone(),
            config.backend,
            config.debug,
        )?;
        Ok(Self::with_translator(config, Box::new(translator)))
    }

    /// Create an agent with a custom translation provider
    pub fn with_translator(config: Config, translator: Box<dyn Translator>) -> Self {
        Self {
            config,
            translator,
            session: None,
        }
    }

    /// Create a ready agent over a custom structural engine
    ///
    /// Skips session bootstrap; the engine is assumed to already hold a
    /// usable page.
    pub fn with_browser_engine(
        config: Config,
        translator: Box<dyn Translator>,
        engine: Box<dyn BrowserEngine>,
    ) -> Self {
        let controller = BrowserController::new(
            engine,
            config.browser.clone(),
            config.state.clone(),
            config.debug,
        );
        Self {
            config,
            translator,
            session: Some(Session::Browser(controller)),
        }
    }

    /// Whether a session is ready for commands
    pub fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize the configured backend session at an initial target
    pub async fn setup(&mut self, initial_url: &str) -> Result<()> {
        if self.session.is_some() {
            eprintln!("Warning: agent already set up");
            return Ok(());
        }

        println!("[Agent] Setting up {} session...", self.config.backend);
        match self.config.backend {
            BackendMode::Structural => {
                let engine = AgentBrowserEngine::new(
                    self.config.browser.session_name.clone(),
                    self.config.browser.headed,
                );
                let controller = BrowserController::new(
                    Box::new(engine),
                    self.config.browser.clone(),
                    self.config.state.clone(),
                    self.config.debug,
                );
                controller.setup(initial_url).await?;
                self.session = Some(Session::Browser(controller));
            }
            BackendMode::Pixel => {
                let mut controller =
                    OsController::new(self.config.pixel.clone(), self.config.debug);
                controller.setup(initial_url).await?;
                self.session = Some(Session::Os(controller));
            }
        }
        println!("[Agent] Session ready.");
        Ok(())
    }

    /// Translate one natural-language command into a single action and run it
    ///
    /// The state is recreated fresh, the translation call runs under the
    /// configured ceiling (timeout and transport faults both collapse to "no
    /// plan"), the untrusted response is validated into a typed plan, and
    /// the plan is dispatched. Every outcome lands in the uniform
    /// [`ExecutionResult`]; no fault escapes this boundary.
    pub async fn interact(&mut self, command: &str) -> ExecutionResult {
        let Some(session) = self.session.as_ref() else {
            return ExecutionResult::fail("agent not initialized; call setup() first");
        };

        println!("[Agent] Command: {:?}", command);

        let state = session.get_current_state().await;

        let ceiling = self.config.translator.timeout();
        let raw = match timeout(ceiling, self.translator.translate(command, &state)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return ExecutionResult::fail(format!("translation failed: {}", e)),
            Err(_) => {
                return ExecutionResult::fail(format!(
                    "translation timed out after {:?}",
                    ceiling
                ))
            }
        };

        let plan = match ActionPlan::from_response(&raw, self.config.backend) {
            Ok(plan) => plan,
            Err(e) => return ExecutionResult::fail(e.to_string()),
        };

        if self.config.debug {
            eprintln!("DEBUG: executing plan: {:?}", plan);
        }
        println!("[Agent] Executing {} action", plan.name());

        session.execute(&plan).await
    }

    /// Extract structured data from the current state
    pub async fn extract(&mut self, query: &str) -> Result<Value> {
        let session = self.session.as_ref().ok_or_else(|| {
            KinesisError::precondition("agent not initialized; call setup() first")
        })?;

        let state = session.get_current_state().await;

        let ceiling = self.config.translator.timeout();
        match timeout(ceiling, extract_data(self.translator.as_ref(), query, &state)).await {
            Ok(result) => result,
            Err(_) => Err(KinesisError::timeout(format!(
                "extraction timed out after {:?}",
                ceiling
            ))),
        }
    }

    /// Tear down the session; idempotent
    ///
    /// A second close succeeds with no side effects, and cleanup failures
    /// are logged rather than raised.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            None => Ok(()),
            Some(Session::Browser(controller)) => {
                println!("[Agent] Closing session...");
                if let Err(e) = controller.close().await {
                    eprintln!("Warning: error during browser teardown: {}", e);
                }
                Ok(())
            }
            Some(Session::Os(mut controller)) => {
                println!("[Agent] Closing session...");
                controller.teardown().await
            }
        }
    }
}
