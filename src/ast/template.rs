use crate::ast::Statement;

/// Root of a parsed template.
///
/// Owns the sequence of top-level statements. Built once per parse, immutable
/// afterwards, and consumed by both the evaluator and the formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Statement>,
}
