pub mod ast;
pub mod environment;
pub mod evaluator;
pub mod formatter;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Program, Statement, Token, UnaryOp};
pub use environment::Environment;
pub use evaluator::{EvalError, Interpreter};
pub use formatter::Formatter;
pub use lexer::{LexError, TokenizeOptions, tokenize};
pub use parser::{ParseError, Parser, parse};
pub use value::{Value, ValueMap};

/// Errors from engine construction or rendering.
#[derive(Debug)]
pub enum TemplateError {
    /// Tokenization error
    Lex(LexError),
    /// Syntax error
    Parse(ParseError),
    /// Evaluation error
    Eval(EvalError),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Lex(e) => write!(f, "Syntax error: {}", e),
            TemplateError::Parse(e) => write!(f, "Syntax error: {}", e),
            TemplateError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TemplateError::Lex(e) => Some(e),
            TemplateError::Parse(e) => Some(e),
            TemplateError::Eval(e) => Some(e),
        }
    }
}

impl From<LexError> for TemplateError {
    fn from(e: LexError) -> Self {
        TemplateError::Lex(e)
    }
}

impl From<ParseError> for TemplateError {
    fn from(e: ParseError) -> Self {
        TemplateError::Parse(e)
    }
}

impl From<EvalError> for TemplateError {
    fn from(e: EvalError) -> Self {
        TemplateError::Eval(e)
    }
}

/// A parsed template.
///
/// Parsing happens once at construction (syntax errors fail fast); the
/// resulting engine can render against any number of contexts and
/// reconstruct canonical source.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sprig_lang::Template;
///
/// let template = Template::new("Hello, {{ name | upper }}!").unwrap();
/// let output = template.render(&json!({ "name": "ana" })).unwrap();
/// assert_eq!(output, "Hello, ANA!");
/// ```
pub struct Template {
    program: Program,
}

impl Template {
    /// Parse a template with default tokenizer options.
    pub fn new(source: &str) -> Result<Self, TemplateError> {
        Self::with_options(source, &TokenizeOptions::default())
    }

    /// Parse a template with explicit whitespace-handling options.
    pub fn with_options(source: &str, options: &TokenizeOptions) -> Result<Self, TemplateError> {
        let tokens = tokenize(source, options)?;
        let program = parse(tokens)?;
        Ok(Template { program })
    }

    /// Render against a JSON context object; its top-level keys become
    /// template variables.
    pub fn render(&self, context: &serde_json::Value) -> Result<String, TemplateError> {
        let vars = match context {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
            serde_json::Value::Null => ValueMap::new(),
            _ => {
                return Err(TemplateError::Eval(EvalError::TypeError(
                    "Render context must be a JSON object".to_string(),
                )));
            }
        };
        self.render_with(vars)
    }

    /// Render against already-converted runtime values. Useful when the
    /// context carries host functions.
    pub fn render_with(&self, context: ValueMap) -> Result<String, TemplateError> {
        let mut interpreter = Interpreter::new();
        Ok(interpreter.evaluate(&self.program, context)?)
    }

    /// Canonical source for the parsed program, with the default indent.
    pub fn format(&self) -> String {
        Formatter::default().format(&self.program)
    }

    /// Canonical source with an explicit formatter configuration.
    pub fn format_with(&self, formatter: &Formatter) -> String {
        formatter.format(&self.program)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}
