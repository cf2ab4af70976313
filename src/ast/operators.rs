/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Logical
    /// Logical OR (`or`)
    Or,
    /// Logical AND (`and`)
    And,

    // Comparison
    /// Equal (`==`)
    Eq,
    /// Not equal (`!=`)
    NotEq,
    /// Less than (`<`)
    Lt,
    /// Greater than (`>`)
    Gt,
    /// Less than or equal (`<=`)
    LtEq,
    /// Greater than or equal (`>=`)
    GtEq,
    /// Membership (`in`)
    In,
    /// Negated membership (`not in`)
    NotIn,

    // Arithmetic
    /// Addition, also array concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Sub,
    /// String concatenation (`~`)
    Concat,
    /// Multiplication (`*`)
    Mul,
    /// Division, always producing a float (`/`)
    Div,
    /// Modulo (`%`)
    Mod,
}

impl BinOp {
    /// Source text for the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Concat => "~",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }

    /// Binding strength, low to high. The formatter compares these to decide
    /// where parentheses are required when re-serializing an expression.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 2,
            BinOp::And => 3,
            BinOp::Eq
            | BinOp::NotEq
            | BinOp::Lt
            | BinOp::Gt
            | BinOp::LtEq
            | BinOp::GtEq
            | BinOp::In
            | BinOp::NotIn => 5,
            BinOp::Add | BinOp::Sub | BinOp::Concat => 6,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 7,
        }
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (`not`)
    Not,
    /// Numeric negation (`-`)
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "not ",
            UnaryOp::Neg => "-",
        }
    }
}
