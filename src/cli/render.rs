//! Render templates against a JSON context

use super::CliError;
use crate::{Template, TokenizeOptions};

/// Options for the render command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Template source text
    pub source: String,
    /// JSON context string; empty object when absent
    pub context: Option<String>,
    /// Remove the newline after block tags
    pub trim_blocks: bool,
    /// Strip leading whitespace before block tags
    pub lstrip_blocks: bool,
}

/// Parse and render a template in one step.
pub fn execute_render(options: &RenderOptions) -> Result<String, CliError> {
    let tokenize_options = TokenizeOptions {
        trim_blocks: options.trim_blocks,
        lstrip_blocks: options.lstrip_blocks,
    };
    let template = Template::with_options(&options.source, &tokenize_options)?;

    let context: serde_json::Value = match &options.context {
        Some(text) => serde_json::from_str(text)?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    Ok(template.render(&context)?)
}
