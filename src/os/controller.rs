//! Pixel backend controller
//!
//! Drives a native browser through synthesized input only: no DOM access,
//! no load-completion signal, targets resolved by template matching. Action
//! correctness is conditional on the browser actually holding focus, which
//! the tooling can check for but not force.

use std::path::PathBuf;
use std::thread;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tokio::process::{Child, Command};

use crate::core::{
    ExecutionResult, KeyName, KinesisError, PixelConfig, Result, ScreenState, ScrollDirection,
};
use crate::os::locate::TargetResolver;
use crate::os::screen::{self, LiveScreen};

/// Platform-default browser executables, first existing wins
#[cfg(target_os = "macos")]
const BROWSER_CANDIDATES: [&str; 2] = [
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];
#[cfg(target_os = "windows")]
const BROWSER_CANDIDATES: [&str; 2] = [
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const BROWSER_CANDIDATES: [&str; 3] = [
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

/// Modifier for browser chords (address bar, select-all)
#[cfg(target_os = "macos")]
const CHORD_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const CHORD_MODIFIER: Key = Key::Control;

/// Pixel backend session
pub struct OsController {
    config: PixelConfig,
    resolver: TargetResolver,
    browser: Option<Child>,
    debug: bool,
}

impl OsController {
    pub fn new(config: PixelConfig, debug: bool) -> Self {
        let resolver = TargetResolver::from_config(&config);
        Self {
            config,
            resolver,
            browser: None,
            debug,
        }
    }

    /// Launch the native browser with the configured proxy/extension flags
    pub async fn setup(&mut self, url: &str) -> Result<()> {
        let executable = self.browser_executable()?;
        let args = launch_args(&self.config, url);

        println!("[Screen] Launching native browser...");
        let child = Command::new(&executable).args(&args).spawn().map_err(|e| {
            KinesisError::os(format!(
                "failed to launch browser {}: {}",
                executable.display(),
                e
            ))
        })?;
        self.browser = Some(child);

        // No window-ready signal exists; wait and hope the window grabbed
        // focus. The per-action window check covers the rest.
        tokio::time::sleep(self.config.load_delay() * 3 / 2).await;
        Ok(())
    }

    /// Close the browser process; failures are logged, never raised
    pub async fn teardown(&mut self) -> Result<()> {
        if let Some(mut child) = self.browser.take() {
            println!("[Screen] Closing native browser...");
            if let Err(e) = child.kill().await {
                eprintln!("Warning: error closing browser process: {}", e);
            }
        }
        Ok(())
    }

    fn browser_executable(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.browser_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(KinesisError::config(format!(
                "configured browser executable not found: {}",
                path.display()
            )));
        }
        BROWSER_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| {
                KinesisError::config("no browser executable found; set pixel.browser_path")
            })
    }

    /// Best-effort focus heuristic; a miss downgrades confidence only
    fn warn_if_unfocused(&self) {
        match screen::browser_window_present(&self.config.window_titles) {
            Ok(true) => {}
            Ok(false) => {
                eprintln!("Warning: no browser window detected; actions may land elsewhere")
            }
            Err(e) => eprintln!("Warning: window check failed: {}", e),
        }
    }

    /// Capture + OCR the screen into a pixel state
    ///
    /// OCR trouble degrades to an error-string `visible_text`; only a failed
    /// capture degrades the whole state.
    pub async fn get_current_state(&self) -> ScreenState {
        self.warn_if_unfocused();

        let image = match tokio::task::spawn_blocking(screen::capture).await {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => return ScreenState::pixel_error(e),
            Err(e) => return ScreenState::pixel_error(e),
        };

        let visible_text = screen::ocr_or_error(&image).await;

        if let Some(dir) = &self.config.screenshot_dir {
            if let Err(e) = screen::save_diagnostic(&image, dir) {
                eprintln!("Warning: could not save diagnostic screenshot: {}", e);
            }
        }

        let screenshot = match screen::encode_png_base64(&image) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                eprintln!("Warning: could not encode screenshot: {}", e);
                None
            }
        };

        ScreenState::pixel(visible_text, screenshot)
    }

    /// Navigate by synthesizing an address-bar chord
    ///
    /// Focus the bar, select existing contents so typing replaces them, type
    /// the URL, submit, then wait a fixed heuristic delay; there is no real
    /// load-completion signal on this backend.
    pub async fn navigate(&self, url: &str) -> ExecutionResult {
        if self.debug {
            eprintln!("DEBUG: navigating to {} via address bar", url);
        }
        let url = url.to_string();
        let half = self.config.action_delay() / 2;

        let typed_url = url.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut enigo = input()?;
            chord(&mut enigo, 'l')?;
            thread::sleep(half);
            chord(&mut enigo, 'a')?;
            enigo.text(&typed_url).map_err(input_err)?;
            thread::sleep(half);
            enigo.key(Key::Return, Direction::Click).map_err(input_err)?;
            Ok(())
        })
        .await;

        match flatten(outcome) {
            Ok(()) => {
                tokio::time::sleep(self.config.load_delay()).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("navigation to {} failed: {}", url, e)),
        }
    }

    /// Click a target resolved through template matching; no fallback path
    /// exists since there is no alternate addressing mechanism
    pub async fn click(&self, description: &str) -> ExecutionResult {
        self.warn_if_unfocused();

        let (x, y) = match self.resolver.resolve(description, &mut LiveScreen).await {
            Ok(coords) => coords,
            Err(e) => {
                eprintln!("Warning: {}", e);
                return ExecutionResult::fail(e.to_string());
            }
        };

        let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut enigo = input()?;
            enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_err)?;
            enigo.button(Button::Left, Direction::Click).map_err(input_err)?;
            Ok(())
        })
        .await;

        match flatten(outcome) {
            Ok(()) => {
                tokio::time::sleep(self.config.action_delay()).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("clicking '{}' failed: {}", description, e)),
        }
    }

    /// Click a target to focus it, then stream keystrokes into it
    pub async fn type_text(&self, description: &str, text: &str) -> ExecutionResult {
        self.warn_if_unfocused();

        let (x, y) = match self.resolver.resolve(description, &mut LiveScreen).await {
            Ok(coords) => coords,
            Err(e) => {
                eprintln!("Warning: {}", e);
                return ExecutionResult::fail(e.to_string());
            }
        };

        let text = text.to_string();
        let half = self.config.action_delay() / 2;

        let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut enigo = input()?;
            enigo.move_mouse(x, y, Coordinate::Abs).map_err(input_err)?;
            enigo.button(Button::Left, Direction::Click).map_err(input_err)?;
            thread::sleep(half);
            enigo.text(&text).map_err(input_err)?;
            Ok(())
        })
        .await;

        match flatten(outcome) {
            Ok(()) => {
                tokio::time::sleep(half).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("typing into '{}' failed: {}", description, e)),
        }
    }

    /// Fixed-magnitude wheel scroll
    pub async fn scroll(&self, direction: ScrollDirection) -> ExecutionResult {
        let amount = match direction {
            ScrollDirection::Down => self.config.scroll_amount,
            ScrollDirection::Up => -self.config.scroll_amount,
        };

        let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut enigo = input()?;
            enigo.scroll(amount, Axis::Vertical).map_err(input_err)?;
            Ok(())
        })
        .await;

        match flatten(outcome) {
            Ok(()) => {
                tokio::time::sleep(self.config.action_delay() / 2).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("scroll {} failed: {}", direction, e)),
        }
    }

    /// Press a validated key
    pub async fn press_key(&self, key: KeyName) -> ExecutionResult {
        let mapped = enigo_key(key);

        let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut enigo = input()?;
            enigo.key(mapped, Direction::Click).map_err(input_err)?;
            Ok(())
        })
        .await;

        match flatten(outcome) {
            Ok(()) => {
                tokio::time::sleep(self.config.action_delay()).await;
                ExecutionResult::ok()
            }
            Err(e) => ExecutionResult::fail(format!("pressing {} failed: {}", key.dom_key(), e)),
        }
    }
}

/// Browser launch arguments for the configured proxy/extensions, URL last
fn launch_args(config: &PixelConfig, url: &str) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(proxy) = &config.proxy {
        args.push(format!("--proxy-server={}", proxy));
    }
    if !config.extensions.is_empty() {
        args.push(format!("--load-extension={}", config.extensions.join(",")));
    }
    args.push(url.to_string());
    args
}

/// Fresh input handle per action; the underlying connection is cheap and
/// holding one across awaits would pin the session to a thread
fn input() -> Result<Enigo> {
    Enigo::new(&Settings::default())
        .map_err(|e| KinesisError::os(format!("failed to initialize input backend: {}", e)))
}

fn input_err(e: enigo::InputError) -> KinesisError {
    KinesisError::os(format!("input injection failed: {}", e))
}

/// Modifier + letter chord (address bar focus, select-all)
fn chord(enigo: &mut Enigo, letter: char) -> Result<()> {
    enigo
        .key(CHORD_MODIFIER, Direction::Press)
        .map_err(input_err)?;
    enigo
        .key(Key::Unicode(letter), Direction::Click)
        .map_err(input_err)?;
    enigo
        .key(CHORD_MODIFIER, Direction::Release)
        .map_err(input_err)
}

/// Map the validated key vocabulary onto enigo keys
fn enigo_key(key: KeyName) -> Key {
    match key {
        KeyName::Enter => Key::Return,
        KeyName::Escape => Key::Escape,
        KeyName::Tab => Key::Tab,
        KeyName::Space => Key::Space,
        KeyName::Backspace => Key::Backspace,
        KeyName::Delete => Key::Delete,
        KeyName::ArrowUp => Key::UpArrow,
        KeyName::ArrowDown => Key::DownArrow,
        KeyName::ArrowLeft => Key::LeftArrow,
        KeyName::ArrowRight => Key::RightArrow,
        KeyName::Home => Key::Home,
        KeyName::End => Key::End,
        KeyName::PageUp => Key::PageUp,
        KeyName::PageDown => Key::PageDown,
    }
}

fn flatten(
    outcome: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match outcome {
        Ok(inner) => inner,
        Err(e) => Err(KinesisError::os(format!("input task panicked: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_url_only() {
        let config = PixelConfig::default();
        assert_eq!(launch_args(&config, "about:blank"), vec!["about:blank"]);
    }

    #[test]
    fn test_launch_args_proxy_and_extensions() {
        let config = PixelConfig {
            proxy: Some("socks5://127.0.0.1:9050".to_string()),
            extensions: vec!["/ext/a".to_string(), "/ext/b".to_string()],
            ..PixelConfig::default()
        };
        let args = launch_args(&config, "https://example.com");
        assert_eq!(
            args,
            vec![
                "--proxy-server=socks5://127.0.0.1:9050",
                "--load-extension=/ext/a,/ext/b",
                "https://example.com",
            ]
        );
    }

    #[test]
    fn test_enigo_key_mapping_covers_vocabulary() {
        assert!(matches!(enigo_key(KeyName::Enter), Key::Return));
        assert!(matches!(enigo_key(KeyName::Escape), Key::Escape));
        assert!(matches!(enigo_key(KeyName::PageDown), Key::PageDown));
        assert!(matches!(enigo_key(KeyName::ArrowLeft), Key::LeftArrow));
    }
}
