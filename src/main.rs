//! Kinesis - Natural-Language UI Automation
//!
//! Main entry point for the CLI application.

use clap::Parser;
use kinesis::cli::repl::print_result;
use kinesis::{BackendMode, Config, InteractionAgent, Repl};

/// Kinesis - Natural-Language UI Automation
#[derive(Parser, Debug)]
#[command(name = "kinesis")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Automation backend: "structural" (DOM browser) or "pixel" (OS-level)
    #[arg(long, short = 'b')]
    backend: Option<String>,

    /// Initial URL to open
    #[arg(long, short = 'u', default_value = "about:blank")]
    url: String,

    /// Run the browser in headed mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single command mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref backend) = args.backend {
        config.backend = match backend.to_lowercase().as_str() {
            "structural" | "browser" => BackendMode::Structural,
            "pixel" | "os" => BackendMode::Pixel,
            other => anyhow::bail!(
                "unknown backend '{}'; expected 'structural' or 'pixel'",
                other
            ),
        };
    }

    if args.headed {
        config.browser.headed = true;
    }

    if args.debug {
        config.debug = true;
    }

    // Single command mode
    if let Some(prompt) = args.prompt {
        let mut agent = InteractionAgent::new(config)?;
        agent.setup(&args.url).await?;

        let result = agent.interact(&prompt).await;
        print_result(&result);

        agent.close().await?;
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run(&args.url).await?;

    Ok(())
}
