//! REPL command handling
//!
//! Lines starting with a known command word are handled here; everything
//! else is treated as a natural-language command for the agent.

use crate::agent::InteractionAgent;
use crate::core::Result;

/// Outcome of handling one input line
pub enum CommandResult {
    /// Exit the REPL
    Exit,
    /// The line was handled; print this output
    Handled(String),
    /// Pass the line to the agent as a natural-language command
    Interact(String),
}

const HELP: &str = "\
Commands:
  help                 Show this help
  extract <query>      Extract structured data from the current page/screen
  quit | exit          Close the session and leave

Anything else is interpreted as a natural-language command, e.g.:
  Go to example.com
  Click the login button
  Type 'rust tutorial' into the search bar
  scroll down";

/// Handle one input line
pub async fn handle_command(input: &str, agent: &mut InteractionAgent) -> Result<CommandResult> {
    let trimmed = input.trim();

    match trimmed.to_lowercase().as_str() {
        "quit" | "exit" => return Ok(CommandResult::Exit),
        "help" => return Ok(CommandResult::Handled(HELP.to_string())),
        _ => {}
    }

    if let Some(query) = trimmed.strip_prefix("extract ") {
        let data = agent.extract(query.trim()).await?;
        let rendered = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
        return Ok(CommandResult::Handled(rendered));
    }

    Ok(CommandResult::Interact(trimmed.to_string()))
}
