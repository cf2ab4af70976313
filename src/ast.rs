//! # Sprig Template Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for the Sprig template
//! language, a small Jinja-style language with control flow, filters, tests,
//! and macros.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, access, operations)
//! - **[operators]** - Binary and unary operators with printing metadata
//! - **[statements]** - Template statements (output, control flow, macros)
//! - **[template]** - The `Program` root node
//!
//! ## Quick Start
//!
//! ```text
//! {% for item in items if item.active %}{{ item.name | upper }}{% endfor %}
//! ```
//!
//! This template filters active items and emits their names uppercased.
//!
//! ## Core Concepts
//!
//! ### Template Structure
//!
//! A template interleaves literal text with statements and expression
//! outputs:
//!
//! ```text
//! text {% statement %} text {{ expression }} text {# comment #}
//! ```
//!
//! ### Statements and Expressions
//!
//! - **Statements** (`{% ... %}`) drive control flow: `if`, `for`, `set`,
//!   `macro`, `call`, `filter`, `break`, `continue`.
//! - **Expressions** (`{{ ... }}`) produce output, with filters (`|`),
//!   tests (`is`), member access, slicing, and calls.
//! - **Comments** (`{# ... #}`) are carried through parsing and dropped at
//!   evaluation.
//!
//! ### Whitespace Control
//!
//! Any delimiter accepts a `-` modifier (`{%-`, `-%}`, `{{-`, `-}}`, `{#-`,
//! `-#}`) that trims whitespace on the marked side.
//!
//! ## Examples
//!
//! ### Conditional Output
//!
//! ```text
//! {% if user.age >= 18 %}welcome{% else %}sorry{% endif %}
//! ```
//!
//! ### Loop Metadata
//!
//! ```text
//! {% for x in items %}{{ loop.index }}/{{ loop.length }} {% endfor %}
//! ```
//!
//! ### Macros with Defaults
//!
//! ```text
//! {% macro greet(name, greeting="Hi") %}{{ greeting }}, {{ name }}!{% endmacro %}
//! {{ greet("Ana", greeting="Yo") }}
//! ```
//!
//! ### Namespace Mutation
//!
//! ```text
//! {% set ns = namespace(total=0) %}
//! {% for n in [1, 2, 3] %}{% set ns.total = ns.total + n %}{% endfor %}
//! {{ ns.total }}
//! ```
pub mod expressions;
pub mod operators;
pub mod statements;
pub mod template;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnaryOp};
pub use statements::Statement;
pub use template::Program;
pub use tokens::Token;
