//! CLI module - interactive command loop

pub mod commands;
pub mod repl;

pub use repl::Repl;
