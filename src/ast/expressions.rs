use crate::ast::{BinOp, UnaryOp};

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Expressions appear inside `{{ ... }}` output statements and in statement
/// headers (conditions, iterables, assignment values, call arguments).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Integer(i64),

    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 42.0
    /// ```
    Float(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// ```
    String(String),

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, 3]
    /// ```
    Array(Vec<Expr>),

    /// Tuple literal, from a comma-separated expression sequence
    ///
    /// # Example
    /// ```text
    /// (a, b)
    /// ```
    Tuple(Vec<Expr>),

    /// Object literal; keys are expressions, usually string literals
    ///
    /// # Example
    /// ```text
    /// {"name": user.name, "total": total}
    /// ```
    Object(Vec<(Expr, Expr)>),

    /// Variable reference, resolved through the scope chain at evaluation
    Identifier(String),

    // Operations
    /// Binary operation (logical, comparison, arithmetic, membership)
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary prefix operation (`not x`, `-x`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Ternary conditional, `value if condition else alternative`
    Ternary {
        value: Box<Expr>,
        condition: Box<Expr>,
        alternative: Box<Expr>,
    },

    /// Conditional without an `else` branch
    ///
    /// Written `value if condition`. As a for-loop iterable this filters
    /// candidate items; elsewhere it yields undefined when the condition
    /// fails.
    Select {
        value: Box<Expr>,
        condition: Box<Expr>,
    },

    /// Member access, `object.property` or computed `object[property]`
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },

    /// Slice, only valid as the computed property of a member access
    ///
    /// # Examples
    /// ```text
    /// items[1:3]
    /// items[::-1]
    /// ```
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },

    /// Call, `callee(args...)`
    Call { callee: Box<Expr>, args: Vec<Expr> },

    /// Filter application, `operand | name` or `operand | name(args...)`
    FilterApply {
        operand: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },

    /// Test application, `operand is name` / `operand is not name(args...)`
    Test {
        operand: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        negated: bool,
    },

    /// Keyword argument inside a call or macro signature, `key=value`
    KeywordArgument { key: String, value: Box<Expr> },

    /// Spread argument inside a call, `*expr`
    Spread(Box<Expr>),
}
