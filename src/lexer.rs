use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::Token;

/// Options applied to the raw source before tokenization.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenizeOptions {
    /// Remove the newline that follows a `%}` or `#}` closer.
    pub trim_blocks: bool,
    /// Strip leading inline whitespace from lines that start with a
    /// delimiter opener.
    pub lstrip_blocks: bool,
}

/// Errors that can occur during tokenization.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    /// String literal without a closing quote
    UnterminatedString(usize),

    /// Comment without a closing `#}`
    UnterminatedComment(usize),

    /// Backslash escape outside the supported table
    InvalidEscape(char, usize),

    /// Character with no meaning inside a statement or expression
    UnexpectedCharacter(char, usize),
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnterminatedString(pos) => {
                write!(f, "Unterminated string starting at position {}", pos)
            }
            LexError::UnterminatedComment(pos) => {
                write!(f, "Unterminated comment starting at position {}", pos)
            }
            LexError::InvalidEscape(ch, pos) => {
                write!(f, "Invalid escape sequence '\\{}' at position {}", ch, pos)
            }
            LexError::UnexpectedCharacter(ch, pos) => {
                write!(f, "Unexpected character '{}' at position {}", ch, pos)
            }
        }
    }
}

impl std::error::Error for LexError {}

// `{% generation %}` regions mark spans for downstream training masks; the
// engine deletes them, tags and content both.
static GENERATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*generation\s*-?%\}.*?\{%-?\s*endgeneration\s*-?%\}")
        .expect("generation pattern")
});

static LSTRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\{[{%#])").expect("lstrip pattern"));

static TRIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([%#])\}\n").expect("trim pattern"));

/// Rewrite the source before scanning: drop a single trailing newline,
/// delete generation regions, then apply the whitespace options.
fn preprocess(source: &str, options: &TokenizeOptions) -> String {
    let mut src = source.strip_suffix('\n').unwrap_or(source).to_string();

    if src.contains("{%") {
        src = GENERATION_RE.replace_all(&src, "").into_owned();
    }
    if options.lstrip_blocks {
        src = LSTRIP_RE.replace_all(&src, "${1}").into_owned();
    }
    if options.trim_blocks {
        src = TRIM_RE.replace_all(&src, "${1}}").into_owned();
    }
    src
}

/// Convert template source into a flat token stream.
pub fn tokenize(source: &str, options: &TokenizeOptions) -> Result<Vec<Token>, LexError> {
    Lexer::new(&preprocess(source, options)).run()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TagKind {
    Statement,
    Expression,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
    tokens: Vec<Token>,
    tag: Option<TagKind>,
    brace_depth: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            tokens: Vec::new(),
            tag: None,
            brace_depth: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.position < self.input.len() {
            match self.tag {
                None => self.lex_text()?,
                Some(kind) => self.lex_in_tag(kind)?,
            }
        }
        Ok(self.tokens)
    }

    /// Accumulate literal text up to the next delimiter, then open it.
    fn lex_text(&mut self) -> Result<(), LexError> {
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '{' && matches!(self.peek_char(1), Some('%' | '{' | '#')) {
                break;
            }
            text.push(ch);
            self.advance();
        }

        // A '-' just inside the opener trims the text we collected
        if self.peek_char(2) == Some('-') {
            text.truncate(text.trim_end().len());
        }
        if !text.is_empty() {
            self.tokens.push(Token::Text(text));
        }

        match self.peek_char(1) {
            None => Ok(()),
            Some('#') => self.lex_comment(),
            Some('%') => {
                self.open_tag(TagKind::Statement);
                Ok(())
            }
            Some('{') => {
                self.open_tag(TagKind::Expression);
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }

    fn open_tag(&mut self, kind: TagKind) {
        self.advance();
        self.advance();
        if self.current_char() == Some('-') {
            self.advance();
        }
        self.tokens.push(match kind {
            TagKind::Statement => Token::OpenStatement,
            TagKind::Expression => Token::OpenExpression,
        });
        self.tag = Some(kind);
        self.brace_depth = 0;
    }

    fn close_tag(&mut self, token: Token, trim_after: bool) {
        self.tokens.push(token);
        self.tag = None;
        if trim_after {
            self.skip_whitespace();
        }
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        let start = self.position;
        self.advance();
        self.advance();
        if self.current_char() == Some('-') {
            self.advance();
        }

        let mut content = String::new();
        loop {
            match self.current_char() {
                None => return Err(LexError::UnterminatedComment(start)),
                Some('-') if self.peek_char(1) == Some('#') && self.peek_char(2) == Some('}') => {
                    self.position += 3;
                    self.tokens.push(Token::Comment(content.trim().to_string()));
                    self.skip_whitespace();
                    return Ok(());
                }
                Some('#') if self.peek_char(1) == Some('}') => {
                    self.advance();
                    self.advance();
                    self.tokens.push(Token::Comment(content.trim().to_string()));
                    return Ok(());
                }
                Some(ch) => {
                    content.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn lex_in_tag(&mut self, kind: TagKind) -> Result<(), LexError> {
        self.skip_whitespace();

        let Some(ch) = self.current_char() else {
            // Unterminated tag; the parser reports the missing closer
            return Ok(());
        };

        match ch {
            '\'' | '"' => {
                let s = self.read_string(ch)?;
                self.tokens.push(Token::String(s));
            }
            c if c.is_ascii_digit() => {
                let token = self.read_number(false);
                self.tokens.push(token);
            }
            '-' if kind == TagKind::Statement
                && self.peek_char(1) == Some('%')
                && self.peek_char(2) == Some('}') =>
            {
                self.position += 3;
                self.close_tag(Token::CloseStatement, true);
            }
            '-' if kind == TagKind::Expression
                && self.peek_char(1) == Some('}')
                && self.peek_char(2) == Some('}') =>
            {
                self.position += 3;
                self.close_tag(Token::CloseExpression, true);
            }
            '-' | '+' => {
                let binary = self.tokens.last().is_some_and(Token::ends_expression);
                if !binary && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                    let negative = ch == '-';
                    self.advance();
                    let token = self.read_number(negative);
                    self.tokens.push(token);
                } else {
                    self.advance();
                    self.tokens
                        .push(if ch == '-' { Token::Minus } else { Token::Plus });
                }
            }
            '%' if kind == TagKind::Statement && self.peek_char(1) == Some('}') => {
                self.advance();
                self.advance();
                self.close_tag(Token::CloseStatement, false);
            }
            '%' => {
                self.advance();
                self.tokens.push(Token::Percent);
            }
            '}' => {
                if self.brace_depth > 0 {
                    self.brace_depth -= 1;
                    self.advance();
                    self.tokens.push(Token::RBrace);
                } else if kind == TagKind::Expression && self.peek_char(1) == Some('}') {
                    self.advance();
                    self.advance();
                    self.close_tag(Token::CloseExpression, false);
                } else {
                    self.advance();
                    self.tokens.push(Token::RBrace);
                }
            }
            '{' => {
                self.brace_depth += 1;
                self.advance();
                self.tokens.push(Token::LBrace);
            }
            '<' => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    self.tokens.push(Token::LtEq);
                } else {
                    self.advance();
                    self.tokens.push(Token::Lt);
                }
            }
            '>' => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    self.tokens.push(Token::GtEq);
                } else {
                    self.advance();
                    self.tokens.push(Token::Gt);
                }
            }
            '=' => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    self.tokens.push(Token::EqEq);
                } else {
                    self.advance();
                    self.tokens.push(Token::Eq);
                }
            }
            '!' => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    self.tokens.push(Token::NotEq);
                } else {
                    return Err(LexError::UnexpectedCharacter('!', self.position));
                }
            }
            '~' => {
                self.advance();
                self.tokens.push(Token::Tilde);
            }
            '*' => {
                self.advance();
                self.tokens.push(Token::Star);
            }
            '/' => {
                self.advance();
                self.tokens.push(Token::Slash);
            }
            '|' => {
                self.advance();
                self.tokens.push(Token::Pipe);
            }
            '(' => {
                self.advance();
                self.tokens.push(Token::LParen);
            }
            ')' => {
                self.advance();
                self.tokens.push(Token::RParen);
            }
            '[' => {
                self.advance();
                self.tokens.push(Token::LBracket);
            }
            ']' => {
                self.advance();
                self.tokens.push(Token::RBracket);
            }
            '.' => {
                self.advance();
                self.tokens.push(Token::Dot);
            }
            ',' => {
                self.advance();
                self.tokens.push(Token::Comma);
            }
            ':' => {
                self.advance();
                self.tokens.push(Token::Colon);
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                match Token::keyword(&ident) {
                    Some(token) => self.tokens.push(token),
                    None => self.tokens.push(Token::Identifier(ident)),
                }
            }
            c => return Err(LexError::UnexpectedCharacter(c, self.position)),
        }

        Ok(())
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('b') => result.push('\u{0008}'),
                        Some('f') => result.push('\u{000C}'),
                        Some('v') => result.push('\u{000B}'),
                        Some('\'') => result.push('\''),
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some(ch) => return Err(LexError::InvalidEscape(ch, self.position)),
                        None => return Err(LexError::UnterminatedString(start)),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString(start))
    }

    fn read_number(&mut self, negative: bool) -> Token {
        let mut number = String::new();
        if negative {
            number.push('-');
        }
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            Token::Float(number.parse::<f64>().expect("float literal"))
        } else {
            Token::Integer(number.parse::<i64>().expect("integer literal"))
        }
    }
}

#[test]
fn test_text_and_expression() {
    let tokens = tokenize("Hello {{ name }}!", &TokenizeOptions::default()).unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Text("Hello ".to_string()),
            Token::OpenExpression,
            Token::Identifier("name".to_string()),
            Token::CloseExpression,
            Token::Text("!".to_string()),
        ]
    );
}

#[test]
fn test_keywords() {
    let tokens = tokenize("{% if x and y or not z %}", &TokenizeOptions::default()).unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::OpenStatement,
            Token::If,
            Token::Identifier("x".to_string()),
            Token::And,
            Token::Identifier("y".to_string()),
            Token::Or,
            Token::Not,
            Token::Identifier("z".to_string()),
            Token::CloseStatement,
        ]
    );
}
