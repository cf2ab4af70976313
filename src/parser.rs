use std::mem;

use crate::ast::{BinOp, Expr, Program, Statement, Token, UnaryOp};

/// Errors that can occur while parsing a token stream.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// The current token does not fit the grammar at this point
    UnexpectedToken { expected: &'static str, found: Token },

    /// `{% ... %}` does not start with a known statement keyword
    UnknownStatement(Token),

    /// Malformed assignment or loop target, macro signature, or call form
    InvalidTarget(&'static str),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found } => {
                write!(f, "Expected {}, got {:?}", expected, found)
            }
            ParseError::UnknownStatement(token) => {
                write!(f, "Unknown statement keyword: {:?}", token)
            }
            ParseError::InvalidTarget(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a token stream into a [`Program`].
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.position + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Take ownership of the current token and advance.
    fn take(&mut self) -> Token {
        let token = self
            .tokens
            .get_mut(self.position)
            .map(|t| mem::replace(t, Token::Eof))
            .unwrap_or(Token::Eof);
        self.position += 1;
        token
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(self.current()) == mem::discriminant(token)
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        if mem::discriminant(self.current()) != mem::discriminant(&expected) {
            return Err(ParseError::UnexpectedToken {
                expected: what,
                found: self.current().clone(),
            });
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self, what: &'static str) -> Result<String, ParseError> {
        match self.take() {
            Token::Identifier(name) => Ok(name),
            token => Err(ParseError::UnexpectedToken {
                expected: what,
                found: token,
            }),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.check(&Token::Eof) {
            body.push(self.parse_top_level()?);
        }
        Ok(Program { body })
    }

    fn parse_top_level(&mut self) -> Result<Statement, ParseError> {
        match self.current() {
            Token::Text(_) => match self.take() {
                Token::Text(text) => Ok(Statement::Text(text)),
                _ => unreachable!(),
            },
            Token::Comment(_) => match self.take() {
                Token::Comment(text) => Ok(Statement::Comment(text)),
                _ => unreachable!(),
            },
            Token::OpenExpression => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::CloseExpression, "'}}'")?;
                Ok(Statement::Expression(expr))
            }
            Token::OpenStatement => {
                self.advance();
                self.parse_statement()
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "text, a statement, or an expression",
                found: self.current().clone(),
            }),
        }
    }

    /// Dispatch on the keyword following `{%`. Each statement parser consumes
    /// its own closing `{% end... %}`.
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.current() {
            Token::If => {
                self.advance();
                self.parse_if()
            }
            Token::For => {
                self.advance();
                self.parse_for()
            }
            Token::Set => {
                self.advance();
                self.parse_set()
            }
            Token::Macro => {
                self.advance();
                self.parse_macro()
            }
            Token::Call => {
                self.advance();
                self.parse_call_block()
            }
            Token::Filter => {
                self.advance();
                self.parse_filter_block()
            }
            Token::Break => {
                self.advance();
                self.expect(Token::CloseStatement, "'%}'")?;
                Ok(Statement::Break)
            }
            Token::Continue => {
                self.advance();
                self.expect(Token::CloseStatement, "'%}'")?;
                Ok(Statement::Continue)
            }
            token => Err(ParseError::UnknownStatement(token.clone())),
        }
    }

    /// Parse nested statements until `{%` followed by one of `enders`.
    /// Consumes the `{%` and leaves the ender keyword as the current token.
    fn parse_body_until(&mut self, enders: &[Token]) -> Result<Vec<Statement>, ParseError> {
        let mut body = Vec::new();
        loop {
            if self.check(&Token::Eof) {
                return Err(ParseError::UnexpectedToken {
                    expected: "a closing block statement",
                    found: Token::Eof,
                });
            }
            if self.check(&Token::OpenStatement)
                && enders
                    .iter()
                    .any(|e| mem::discriminant(self.peek(1)) == mem::discriminant(e))
            {
                self.advance();
                return Ok(body);
            }
            body.push(self.parse_top_level()?);
        }
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let condition = self.parse_expression()?;
        self.expect(Token::CloseStatement, "'%}'")?;

        let body = self.parse_body_until(&[Token::Elif, Token::Else, Token::EndIf])?;
        let mut alternate = Vec::new();

        match self.take() {
            // elif chains become a nested If in the alternate slot
            Token::Elif => alternate.push(self.parse_if()?),
            Token::Else => {
                self.expect(Token::CloseStatement, "'%}'")?;
                alternate = self.parse_body_until(&[Token::EndIf])?;
                self.advance();
                self.expect(Token::CloseStatement, "'%}'")?;
            }
            Token::EndIf => self.expect(Token::CloseStatement, "'%}'")?,
            _ => unreachable!(),
        }

        Ok(Statement::If {
            condition,
            body,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let target = self.parse_loop_target()?;
        self.expect(Token::In, "'in'")?;
        // An inline `if` after the iterable parses as a Select expression
        let iterable = self.parse_expression()?;
        self.expect(Token::CloseStatement, "'%}'")?;

        let body = self.parse_body_until(&[Token::Else, Token::EndFor])?;
        let mut default = Vec::new();

        match self.take() {
            Token::Else => {
                self.expect(Token::CloseStatement, "'%}'")?;
                default = self.parse_body_until(&[Token::EndFor])?;
                self.advance();
                self.expect(Token::CloseStatement, "'%}'")?;
            }
            Token::EndFor => self.expect(Token::CloseStatement, "'%}'")?,
            _ => unreachable!(),
        }

        Ok(Statement::For {
            target,
            iterable,
            body,
            default,
        })
    }

    /// A loop variable: an identifier or a tuple of identifiers, optionally
    /// parenthesized.
    fn parse_loop_target(&mut self) -> Result<Expr, ParseError> {
        let parenthesized = self.check(&Token::LParen);
        if parenthesized {
            self.advance();
        }

        let mut names = vec![self.expect_identifier("a loop variable")?];
        while self.check(&Token::Comma) {
            self.advance();
            names.push(self.expect_identifier("a loop variable")?);
        }

        if parenthesized {
            self.expect(Token::RParen, "')'")?;
        }

        let mut targets: Vec<Expr> = names.into_iter().map(Expr::Identifier).collect();
        if targets.len() == 1 {
            Ok(targets.remove(0))
        } else {
            Ok(Expr::Tuple(targets))
        }
    }

    fn parse_set(&mut self) -> Result<Statement, ParseError> {
        let target = self.parse_expression_sequence()?;
        Self::validate_assign_target(&target)?;

        if self.check(&Token::Eq) {
            self.advance();
            let value = self.parse_expression_sequence()?;
            self.expect(Token::CloseStatement, "'%}'")?;
            Ok(Statement::Set {
                target,
                value: Some(value),
                body: Vec::new(),
            })
        } else {
            // Block-capture form: the rendered body becomes the value
            self.expect(Token::CloseStatement, "'%}'")?;
            let body = self.parse_body_until(&[Token::EndSet])?;
            self.advance();
            self.expect(Token::CloseStatement, "'%}'")?;
            Ok(Statement::Set {
                target,
                value: None,
                body,
            })
        }
    }

    fn validate_assign_target(target: &Expr) -> Result<(), ParseError> {
        match target {
            Expr::Identifier(_) | Expr::Member { .. } => Ok(()),
            Expr::Tuple(elements)
                if elements.iter().all(|e| matches!(e, Expr::Identifier(_))) =>
            {
                Ok(())
            }
            _ => Err(ParseError::InvalidTarget(
                "set target must be a name, a tuple of names, or a member expression",
            )),
        }
    }

    fn parse_macro(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect_identifier("a macro name")?;
        self.expect(Token::LParen, "'('")?;
        let params = self.parse_params()?;
        self.expect(Token::CloseStatement, "'%}'")?;

        let body = self.parse_body_until(&[Token::EndMacro])?;
        self.advance();
        self.expect(Token::CloseStatement, "'%}'")?;

        Ok(Statement::Macro { name, params, body })
    }

    /// Signature parameters: names, optionally with `name=default` values.
    /// Consumes through the closing `)`.
    fn parse_params(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            let name = self.expect_identifier("a parameter name")?;
            if self.check(&Token::Eq) {
                self.advance();
                let value = self.parse_expression()?;
                params.push(Expr::KeywordArgument {
                    key: name,
                    value: Box::new(value),
                });
            } else {
                params.push(Expr::Identifier(name));
            }
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma, "','")?;
            }
        }
        self.advance();
        Ok(params)
    }

    fn parse_call_block(&mut self) -> Result<Statement, ParseError> {
        let caller_params = if self.check(&Token::LParen) {
            self.advance();
            self.parse_params()?
        } else {
            Vec::new()
        };

        let call = self.parse_expression()?;
        if !matches!(call, Expr::Call { .. }) {
            return Err(ParseError::InvalidTarget(
                "call statement requires a call expression",
            ));
        }
        self.expect(Token::CloseStatement, "'%}'")?;

        let body = self.parse_body_until(&[Token::EndCall])?;
        self.advance();
        self.expect(Token::CloseStatement, "'%}'")?;

        Ok(Statement::CallBlock {
            caller_params,
            call,
            body,
        })
    }

    fn parse_filter_block(&mut self) -> Result<Statement, ParseError> {
        let name = self.expect_identifier("a filter name")?;
        let args = if self.check(&Token::LParen) {
            self.advance();
            self.parse_call_args()?
        } else {
            Vec::new()
        };
        self.expect(Token::CloseStatement, "'%}'")?;

        let body = self.parse_body_until(&[Token::EndFilter])?;
        self.advance();
        self.expect(Token::CloseStatement, "'%}'")?;

        Ok(Statement::FilterBlock { name, args, body })
    }

    /// One or more comma-separated expressions; two or more become a tuple.
    fn parse_expression_sequence(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_expression()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.check(&Token::Comma) {
            self.advance();
            items.push(self.parse_expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let value = self.parse_logical_or()?;
        if !self.check(&Token::If) {
            return Ok(value);
        }
        self.advance();
        let condition = self.parse_logical_or()?;

        if self.check(&Token::Else) {
            self.advance();
            // Right-associative: `a if b else c if d else e`
            let alternative = self.parse_expression()?;
            Ok(Expr::Ternary {
                value: Box::new(value),
                condition: Box::new(condition),
                alternative: Box::new(alternative),
            })
        } else {
            Ok(Expr::Select {
                value: Box::new(value),
                condition: Box::new(condition),
            })
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;

        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;

        while self.check(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Not) {
            self.advance();
            let operand = self.parse_not()?; // right-associative
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::LtEq => BinOp::LtEq,
                Token::GtEq => BinOp::GtEq,
                Token::In => BinOp::In,
                Token::Not if self.peek(1) == &Token::In => {
                    self.advance();
                    BinOp::NotIn
                }
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                Token::Tilde => BinOp::Concat,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_is()?;

        loop {
            let op = match self.current() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };

            self.advance();
            let right = self.parse_is()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_is(&mut self) -> Result<Expr, ParseError> {
        let mut operand = self.parse_filter_expr()?;

        while self.check(&Token::Is) {
            self.advance();
            let negated = if self.check(&Token::Not) {
                self.advance();
                true
            } else {
                false
            };
            let name = self.expect_identifier("a test name")?;
            // Tests accept a parenthesized argument list or a single bare
            // argument (`x is eq 3`)
            let args = if self.check(&Token::LParen) {
                self.advance();
                self.parse_call_args()?
            } else if matches!(
                self.current(),
                Token::Integer(_)
                    | Token::Float(_)
                    | Token::String(_)
                    | Token::Identifier(_)
                    | Token::LBracket
                    | Token::LBrace
            ) {
                vec![self.parse_postfix()?]
            } else {
                Vec::new()
            };
            operand = Expr::Test {
                operand: Box::new(operand),
                name,
                args,
                negated,
            };
        }
        Ok(operand)
    }

    fn parse_filter_expr(&mut self) -> Result<Expr, ParseError> {
        let mut operand = self.parse_postfix()?;

        while self.check(&Token::Pipe) {
            self.advance();
            let name = self.expect_identifier("a filter name")?;
            let args = if self.check(&Token::LParen) {
                self.advance();
                self.parse_call_args()?
            } else {
                Vec::new()
            };
            operand = Expr::FilterApply {
                operand: Box::new(operand),
                name,
                args,
            };
        }
        Ok(operand)
    }

    /// Postfix chain: member access, computed index/slice, and calls.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&Token::Dot) {
                self.advance();
                let name = self.expect_identifier("a property name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Identifier(name)),
                    computed: false,
                };
            } else if self.check(&Token::LBracket) {
                self.advance();
                let property = self.parse_member_property()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    computed: true,
                };
            } else if self.check(&Token::LParen) {
                self.advance();
                let args = self.parse_call_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Inside brackets: a single index expression, or a slice once any colon
    /// appears. Empty brackets are malformed.
    fn parse_member_property(&mut self) -> Result<Expr, ParseError> {
        let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut slot = 0usize;
        let mut saw_colon = false;

        loop {
            match self.current() {
                Token::Colon => {
                    if slot >= 2 {
                        return Err(ParseError::UnexpectedToken {
                            expected: "']'",
                            found: self.current().clone(),
                        });
                    }
                    saw_colon = true;
                    slot += 1;
                    self.advance();
                }
                Token::RBracket => break,
                _ => {
                    if parts[slot].is_some() {
                        return Err(ParseError::UnexpectedToken {
                            expected: "':' or ']'",
                            found: self.current().clone(),
                        });
                    }
                    parts[slot] = Some(Box::new(self.parse_expression()?));
                }
            }
        }

        if saw_colon {
            let [start, stop, step] = parts;
            Ok(Expr::Slice { start, stop, step })
        } else {
            match parts {
                [Some(expr), None, None] => Ok(*expr),
                _ => Err(ParseError::UnexpectedToken {
                    expected: "an index expression",
                    found: self.current().clone(),
                }),
            }
        }
    }

    /// Call arguments: positional (with `*spread`), then `key=value`
    /// keywords. Consumes through the closing `)`.
    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        let mut saw_keyword = false;

        while !self.check(&Token::RParen) {
            if self.check(&Token::Star) {
                self.advance();
                if saw_keyword {
                    return Err(ParseError::InvalidTarget(
                        "positional arguments must precede keyword arguments",
                    ));
                }
                let argument = self.parse_expression()?;
                args.push(Expr::Spread(Box::new(argument)));
            } else {
                let expr = self.parse_expression()?;
                if self.check(&Token::Eq) {
                    let Expr::Identifier(key) = expr else {
                        return Err(ParseError::InvalidTarget(
                            "keyword argument name must be an identifier",
                        ));
                    };
                    self.advance();
                    let value = self.parse_expression()?;
                    saw_keyword = true;
                    args.push(Expr::KeywordArgument {
                        key,
                        value: Box::new(value),
                    });
                } else {
                    if saw_keyword {
                        return Err(ParseError::InvalidTarget(
                            "positional arguments must precede keyword arguments",
                        ));
                    }
                    args.push(expr);
                }
            }
            if !self.check(&Token::RParen) {
                self.expect(Token::Comma, "','")?;
            }
        }
        self.advance();
        Ok(args)
    }

    /// Parse primary expressions (atoms): literals, identifiers, grouping,
    /// array/tuple/object literals, unary minus.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.take() {
            Token::Integer(n) => Ok(Expr::Integer(n)),
            Token::Float(n) => Ok(Expr::Float(n)),
            Token::String(s) => Ok(Expr::String(s)),
            Token::Identifier(name) => Ok(Expr::Identifier(name)),

            Token::LParen => {
                let expr = self.parse_expression_sequence()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),

            // Unary minus (negation of non-literal operands)
            Token::Minus => {
                let operand = self.parse_primary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }

            token => Err(ParseError::UnexpectedToken {
                expected: "an expression",
                found: token,
            }),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = Vec::new();

        while !self.check(&Token::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.check(&Token::RBracket) {
                self.expect(Token::Comma, "','")?;
            }
        }

        self.advance();
        Ok(Expr::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();

        while !self.check(&Token::RBrace) {
            let key = self.parse_expression()?;
            self.expect(Token::Colon, "':'")?;
            let value = self.parse_expression()?;
            pairs.push((key, value));

            if !self.check(&Token::RBrace) {
                self.expect(Token::Comma, "','")?;
            }
        }

        self.advance();
        Ok(Expr::Object(pairs))
    }
}
