#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal template text outside of any delimiter
    ///
    /// # Examples
    /// ```text
    /// Hello,
    /// <li>
    /// ```
    Text(String),

    /// Comment body, without the `{#` / `#}` delimiters
    ///
    /// # Examples
    /// ```text
    /// {# ignore me #}
    /// ```
    Comment(String),

    /// Statement opener (`{%`, whitespace-trimming `{%-` included)
    OpenStatement,

    /// Statement closer (`%}` or `-%}`)
    CloseStatement,

    /// Expression opener (`{{` or `{{-`)
    OpenExpression,

    /// Expression closer (`}}` or `-}}`)
    CloseExpression,

    // Literals
    /// Integer literal, sign included when it starts an expression
    ///
    /// # Examples
    /// ```text
    /// 42
    /// -10
    /// ```
    Integer(i64),

    /// Floating-point literal (single interior dot)
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// -1.5
    /// ```
    Float(f64),

    /// String literal, single or double quoted, escapes resolved
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'it\'s'
    /// ```
    String(String),

    /// Variable, filter, test, or property name
    ///
    /// # Examples
    /// ```text
    /// user
    /// loop
    /// tojson
    /// ```
    Identifier(String),

    // Keywords
    /// `if` (statement and ternary)
    If,
    /// `elif`
    Elif,
    /// `else` (statement and ternary)
    Else,
    /// `endif`
    EndIf,
    /// `for`
    For,
    /// `endfor`
    EndFor,
    /// `in` (loop binding and membership operator)
    In,
    /// `is` (test application)
    Is,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not` (prefix negation, `not in`, `is not`)
    Not,
    /// `set`
    Set,
    /// `endset`
    EndSet,
    /// `macro`
    Macro,
    /// `endmacro`
    EndMacro,
    /// `call`
    Call,
    /// `endcall`
    EndCall,
    /// `filter` (block statement keyword)
    Filter,
    /// `endfilter`
    EndFilter,
    /// `break`
    Break,
    /// `continue`
    Continue,

    // Operators
    /// Equality (`==`)
    EqEq,
    /// Inequality (`!=`)
    NotEq,
    /// Less than
    Lt,
    /// Greater than
    Gt,
    /// Less than or equal
    LtEq,
    /// Greater than or equal
    GtEq,
    /// Addition (`+`)
    Plus,
    /// Subtraction or unary negation (`-`)
    Minus,
    /// String concatenation (`~`)
    Tilde,
    /// Multiplication, also the `*spread` marker in call arguments
    Star,
    /// Division (`/`)
    Slash,
    /// Modulo (`%`)
    Percent,
    /// Filter pipe (`|`)
    Pipe,
    /// Assignment and keyword arguments (`=`)
    Eq,

    // Delimiters
    /// Left parenthesis
    LParen,
    /// Right parenthesis
    RParen,
    /// Left bracket for indexing, slicing, and array literals
    LBracket,
    /// Right bracket
    RBracket,
    /// Left brace for object literals
    LBrace,
    /// Right brace
    RBrace,
    /// Dot for member access
    Dot,
    /// Comma for arguments, elements, and tuples
    Comma,
    /// Colon for object pairs and slices
    Colon,

    /// End of input
    Eof,
}

impl Token {
    /// True for tokens that can end an expression. The lexer uses this to
    /// decide whether a following `+`/`-` is a sign or a binary operator.
    pub fn ends_expression(&self) -> bool {
        matches!(
            self,
            Token::Identifier(_)
                | Token::Integer(_)
                | Token::Float(_)
                | Token::String(_)
                | Token::RParen
                | Token::RBracket
        )
    }

    /// Map an identifier to its keyword token, if it is one.
    pub fn keyword(ident: &str) -> Option<Token> {
        let token = match ident {
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "endif" => Token::EndIf,
            "for" => Token::For,
            "endfor" => Token::EndFor,
            "in" => Token::In,
            "is" => Token::Is,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "set" => Token::Set,
            "endset" => Token::EndSet,
            "macro" => Token::Macro,
            "endmacro" => Token::EndMacro,
            "call" => Token::Call,
            "endcall" => Token::EndCall,
            "filter" => Token::Filter,
            "endfilter" => Token::EndFilter,
            "break" => Token::Break,
            "continue" => Token::Continue,
            _ => return None,
        };
        Some(token)
    }
}
