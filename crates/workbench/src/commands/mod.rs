pub mod call;
pub mod daemon;
pub mod invoke;
pub mod procedures;
pub mod providers;

pub use call::*;
pub use daemon::*;
pub use invoke::*;
pub use procedures::*;
pub use providers::*;

use owo_colors::OwoColorize;
use starbase::AppResult;
use std::fmt::Display;

/// Print an error to stderr and exit with status 1
pub(crate) fn fail(message: impl Display) -> AppResult {
    eprintln!("{} {}", "Error:".red().bold(), message);
    Ok(Some(1))
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> AppResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            Ok(None)
        }
        Err(e) => fail(format!("Failed to serialize output: {}", e)),
    }
}
