//! Reformat templates to canonical source

use super::CliError;
use crate::{Formatter, Template};

/// Parse a template and reconstruct canonical source with the given indent
/// width.
pub fn execute_fmt(source: &str, indent: usize) -> Result<String, CliError> {
    let template = Template::new(source)?;
    Ok(template.format_with(&Formatter::with_width(indent)))
}
