//! Interactive REPL for Kinesis
//!
//! Provides the main user interaction loop.

use std::io::{self, BufRead, Write};

use crate::agent::InteractionAgent;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, ExecutionResult, Result};

/// Interactive command loop over one agent session
pub struct Repl {
    agent: InteractionAgent,
}

impl Repl {
    /// Create a REPL with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            agent: InteractionAgent::new(config)?,
        })
    }

    /// Run the REPL against an initial target
    pub async fn run(&mut self, initial_url: &str) -> Result<()> {
        self.print_banner();

        print!("Initializing...");
        io::stdout().flush()?;

        match self.agent.setup(initial_url).await {
            Ok(()) => println!(" Ready!\n"),
            Err(e) => {
                println!("\n\nInitialization error: {}\n", e);
                return Ok(());
            }
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.agent).await {
                Ok(CommandResult::Exit) => break,
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Interact(command)) => {
                    let result = self.agent.interact(&command).await;
                    print_result(&result);
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        println!("Closing session...");
        self.agent.close().await?;
        println!("Goodbye!");
        Ok(())
    }

    fn print_banner(&self) {
        let config = self.agent.config();
        println!("Kinesis - natural-language UI automation");
        println!("Backend:    {}", config.backend);
        println!("Translator: {} ({})", config.translator.model, config.translator.base_url);
        println!();
        println!("Commands: help, extract <query>, quit");
        println!("----------------------------------------");
    }
}

/// Print one action result the way the caller sees it
pub fn print_result(result: &ExecutionResult) {
    if result.success {
        println!("Action successful.");
        if let Some(ref url) = result.url {
            println!("  Current URL: {}", url);
        }
    } else {
        println!(
            "Action failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", "-".repeat(20));
}
