//! Validate template syntax

use super::CliError;
use crate::Template;

/// Parse a template without rendering it.
pub fn execute_check(source: &str) -> Result<(), CliError> {
    Template::new(source)?;
    Ok(())
}
