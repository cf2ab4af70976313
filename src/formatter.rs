//! Canonical source printer for parsed templates.
//!
//! Walks the AST and reconstructs template source: statements and
//! expressions wrapped in whitespace-trimming delimiters, nested blocks
//! re-indented, text trimmed, and expressions re-serialized with minimal
//! parentheses. The transform is deterministic and idempotent: formatting
//! the parse of a formatted template reproduces the same text.

use crate::ast::{Expr, Program, Statement, UnaryOp};
use crate::value::format_float;

// Precedence thresholds shared with the parser's grammar levels. Binary
// operators carry their own (2..=7 in operators.rs).
const PREC_TERNARY: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_NOT: u8 = 4;
const PREC_IS: u8 = 8;
const PREC_FILTER: u8 = 9;
const PREC_POSTFIX: u8 = 10;

pub struct Formatter {
    indent: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::with_width(4)
    }
}

impl Formatter {
    pub fn new(indent: &str) -> Self {
        Formatter {
            indent: indent.to_string(),
        }
    }

    pub fn with_width(width: usize) -> Self {
        Formatter {
            indent: " ".repeat(width),
        }
    }

    /// Reconstruct canonical source for a parsed program.
    pub fn format(&self, program: &Program) -> String {
        self.statements(&program.body, 0).join("\n")
    }

    fn pad(&self, depth: usize) -> String {
        self.indent.repeat(depth)
    }

    fn statements(&self, body: &[Statement], depth: usize) -> Vec<String> {
        body.iter()
            .flat_map(|statement| self.statement(statement, depth))
            .collect()
    }

    fn statement(&self, statement: &Statement, depth: usize) -> Vec<String> {
        let pad = self.pad(depth);
        match statement {
            Statement::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("{}{}", pad, trimmed)]
                }
            }

            Statement::Comment(text) => vec![format!("{}{{# {} #}}", pad, text)],

            Statement::Expression(expr) => {
                vec![format!("{}{{{{- {} -}}}}", pad, self.expr(expr))]
            }

            Statement::If { .. } => self.format_if(statement, depth),

            Statement::For {
                target,
                iterable,
                body,
                default,
            } => {
                let mut lines = vec![format!(
                    "{}{{%- for {} in {} -%}}",
                    pad,
                    self.unparenthesized(target),
                    self.expr(iterable)
                )];
                lines.extend(self.statements(body, depth + 1));
                if !default.is_empty() {
                    lines.push(format!("{}{{%- else -%}}", pad));
                    lines.extend(self.statements(default, depth + 1));
                }
                lines.push(format!("{}{{%- endfor -%}}", pad));
                lines
            }

            Statement::Set {
                target,
                value: Some(value),
                ..
            } => vec![format!(
                "{}{{%- set {} = {} -%}}",
                pad,
                self.unparenthesized(target),
                self.unparenthesized(value)
            )],

            Statement::Set {
                target,
                value: None,
                body,
            } => {
                let mut lines = vec![format!(
                    "{}{{%- set {} -%}}",
                    pad,
                    self.unparenthesized(target)
                )];
                lines.extend(self.statements(body, depth + 1));
                lines.push(format!("{}{{%- endset -%}}", pad));
                lines
            }

            Statement::Macro { name, params, body } => {
                let params: Vec<String> = params.iter().map(|p| self.expr(p)).collect();
                let mut lines = vec![format!(
                    "{}{{%- macro {}({}) -%}}",
                    pad,
                    name,
                    params.join(", ")
                )];
                lines.extend(self.statements(body, depth + 1));
                lines.push(format!("{}{{%- endmacro -%}}", pad));
                lines
            }

            Statement::CallBlock {
                caller_params,
                call,
                body,
            } => {
                let header = if caller_params.is_empty() {
                    format!("{}{{%- call {} -%}}", pad, self.expr(call))
                } else {
                    let params: Vec<String> =
                        caller_params.iter().map(|p| self.expr(p)).collect();
                    format!(
                        "{}{{%- call({}) {} -%}}",
                        pad,
                        params.join(", "),
                        self.expr(call)
                    )
                };
                let mut lines = vec![header];
                lines.extend(self.statements(body, depth + 1));
                lines.push(format!("{}{{%- endcall -%}}", pad));
                lines
            }

            Statement::FilterBlock { name, args, body } => {
                let header = if args.is_empty() {
                    format!("{}{{%- filter {} -%}}", pad, name)
                } else {
                    let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                    format!("{}{{%- filter {}({}) -%}}", pad, name, args.join(", "))
                };
                let mut lines = vec![header];
                lines.extend(self.statements(body, depth + 1));
                lines.push(format!("{}{{%- endfilter -%}}", pad));
                lines
            }

            Statement::Break => vec![format!("{}{{%- break -%}}", pad)],
            Statement::Continue => vec![format!("{}{{%- continue -%}}", pad)],
        }
    }

    /// `if`/`elif` chains print flat; the chain lives in nested alternates.
    fn format_if(&self, statement: &Statement, depth: usize) -> Vec<String> {
        let pad = self.pad(depth);
        let mut lines = Vec::new();
        let mut keyword = "if";
        let mut current = statement;

        loop {
            let Statement::If {
                condition,
                body,
                alternate,
            } = current
            else {
                break;
            };

            lines.push(format!(
                "{}{{%- {} {} -%}}",
                pad,
                keyword,
                self.expr(condition)
            ));
            lines.extend(self.statements(body, depth + 1));

            if alternate.is_empty() {
                break;
            }
            if alternate.len() == 1
                && matches!(alternate[0], Statement::If { .. })
            {
                keyword = "elif";
                current = &alternate[0];
                continue;
            }
            lines.push(format!("{}{{%- else -%}}", pad));
            lines.extend(self.statements(alternate, depth + 1));
            break;
        }

        lines.push(format!("{}{{%- endif -%}}", pad));
        lines
    }

    /// Tuples in statement-header position print bare (`a, b`), not
    /// parenthesized.
    fn unparenthesized(&self, expr: &Expr) -> String {
        match expr {
            Expr::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
                parts.join(", ")
            }
            other => self.expr(other),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        self.expr_prec(expr, 0)
    }

    /// Serialize an expression, parenthesizing only when its binding
    /// strength falls below the context's requirement.
    fn expr_prec(&self, expr: &Expr, min_prec: u8) -> String {
        let (text, prec) = match expr {
            Expr::Integer(n) => (n.to_string(), PREC_POSTFIX),
            Expr::Float(n) => (format_float(*n), PREC_POSTFIX),
            Expr::String(s) => (quote_string(s), PREC_POSTFIX),
            Expr::Identifier(name) => (name.clone(), PREC_POSTFIX),

            Expr::Array(items) => {
                let parts: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
                (format!("[{}]", parts.join(", ")), PREC_POSTFIX)
            }
            Expr::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
                (format!("({})", parts.join(", ")), PREC_POSTFIX)
            }
            Expr::Object(pairs) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| format!("{}: {}", self.expr(key), self.expr(value)))
                    .collect();
                (format!("{{{}}}", parts.join(", ")), PREC_POSTFIX)
            }

            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                (
                    format!(
                        "{} {} {}",
                        self.expr_prec(left, p),
                        op.symbol(),
                        self.expr_prec(right, p + 1)
                    ),
                    p,
                )
            }

            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => (
                format!("not {}", self.expr_prec(operand, PREC_NOT)),
                PREC_NOT,
            ),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => (
                format!("-{}", self.expr_prec(operand, PREC_POSTFIX)),
                PREC_POSTFIX,
            ),

            Expr::Ternary {
                value,
                condition,
                alternative,
            } => (
                format!(
                    "{} if {} else {}",
                    self.expr_prec(value, PREC_OR),
                    self.expr_prec(condition, PREC_OR),
                    self.expr_prec(alternative, PREC_TERNARY)
                ),
                PREC_TERNARY,
            ),
            Expr::Select { value, condition } => (
                format!(
                    "{} if {}",
                    self.expr_prec(value, PREC_OR),
                    self.expr_prec(condition, PREC_OR)
                ),
                PREC_TERNARY,
            ),

            Expr::Member {
                object,
                property,
                computed,
            } => {
                let object = self.expr_prec(object, PREC_POSTFIX);
                let text = if *computed {
                    format!("{}[{}]", object, self.expr(property))
                } else {
                    format!("{}.{}", object, self.expr(property))
                };
                (text, PREC_POSTFIX)
            }

            Expr::Slice { start, stop, step } => {
                let mut text = String::new();
                if let Some(start) = start {
                    text.push_str(&self.expr(start));
                }
                text.push(':');
                if let Some(stop) = stop {
                    text.push_str(&self.expr(stop));
                }
                if let Some(step) = step {
                    text.push(':');
                    text.push_str(&self.expr(step));
                }
                (text, PREC_POSTFIX)
            }

            Expr::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                (
                    format!(
                        "{}({})",
                        self.expr_prec(callee, PREC_POSTFIX),
                        args.join(", ")
                    ),
                    PREC_POSTFIX,
                )
            }

            Expr::FilterApply {
                operand,
                name,
                args,
            } => {
                let args_text = if args.is_empty() {
                    String::new()
                } else {
                    let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                    format!("({})", args.join(", "))
                };
                (
                    format!(
                        "{} | {}{}",
                        self.expr_prec(operand, PREC_FILTER),
                        name,
                        args_text
                    ),
                    PREC_FILTER,
                )
            }

            Expr::Test {
                operand,
                name,
                args,
                negated,
            } => {
                let args_text = if args.is_empty() {
                    String::new()
                } else {
                    let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                    format!("({})", args.join(", "))
                };
                (
                    format!(
                        "{} is {}{}{}",
                        self.expr_prec(operand, PREC_IS),
                        if *negated { "not " } else { "" },
                        name,
                        args_text
                    ),
                    PREC_IS,
                )
            }

            Expr::KeywordArgument { key, value } => {
                (format!("{}={}", key, self.expr(value)), PREC_POSTFIX)
            }
            Expr::Spread(inner) => (
                format!("*{}", self.expr_prec(inner, PREC_POSTFIX)),
                PREC_POSTFIX,
            ),
        };

        if prec < min_prec {
            format!("({})", text)
        } else {
            text
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000B}' => out.push_str("\\v"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
