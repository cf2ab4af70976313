//! CLI support for sprig-lang
//!
//! Provides programmatic access to sprig CLI functionality for embedding
//! in other tools.

mod check;
mod fmt;
mod render;

pub use check::execute_check;
pub use fmt::execute_fmt;
pub use render::{RenderOptions, execute_render};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Template parse or render error
    Template(crate::TemplateError),
    /// JSON context parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Template(e) => write!(f, "{}", e),
            CliError::Json(e) => write!(f, "Invalid JSON context: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Template(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<crate::TemplateError> for CliError {
    fn from(e: crate::TemplateError) -> Self {
        CliError::Template(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
