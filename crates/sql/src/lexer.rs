use crate::token::{keyword_kind, Token, TokenKind};
use scout_error::{ErrorContext, Result, ScoutError};

/// Hand-written lexer over the query text.
///
/// Consumes the input left to right, skipping whitespace and `--` line
/// comments, and emits a token stream terminated by [`TokenKind::Eof`].
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let (offset, line, column) = (self.pos, self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    offset,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let token = match c {
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '*' => self.single(TokenKind::Star),
                '=' => self.single(TokenKind::Eq),
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.token_at(TokenKind::NotEq, "!=", offset, line, column)
                    } else {
                        return Err(self.unexpected_char('!', line, column));
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.token_at(TokenKind::GtEq, ">=", offset, line, column)
                    } else {
                        self.token_at(TokenKind::Gt, ">", offset, line, column)
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        self.token_at(TokenKind::LtEq, "<=", offset, line, column)
                    } else {
                        self.token_at(TokenKind::Lt, "<", offset, line, column)
                    }
                }
                '\'' | '"' => self.read_string(c)?,
                c if c.is_ascii_digit() => self.read_number(),
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(),
                other => return Err(self.unexpected_char(other, line, column)),
            };
            tokens.push(token);
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                // -- comment runs to end of line
                Some('-') if self.chars.get(self.pos + 1) == Some(&'-') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let (offset, line, column) = (self.pos, self.line, self.column);
        let text = self.advance().map(String::from).unwrap_or_default();
        self.token_at(kind, &text, offset, line, column)
    }

    fn token_at(
        &self,
        kind: TokenKind,
        text: &str,
        offset: usize,
        line: usize,
        column: usize,
    ) -> Token {
        Token {
            kind,
            text: text.to_string(),
            offset,
            line,
            column,
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        let (offset, line, column) = (self.pos, self.line, self.column);
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => {
                    return Ok(self.token_at(TokenKind::StringLiteral, &text, offset, line, column))
                }
                // Backslash escapes the next character verbatim
                Some('\\') => match self.advance() {
                    Some(escaped) => text.push(escaped),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(ScoutError::parse(format!(
            "Unterminated string literal starting at line {}, column {}",
            line, column
        ))
        .with_context(ErrorContext::Syntax {
            line,
            column,
            token: None,
        }))
    }

    fn read_number(&mut self) -> Token {
        let (offset, line, column) = (self.pos, self.line, self.column);
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '.' && !seen_dot && matches!(self.chars.get(self.pos + 1), Some(d) if d.is_ascii_digit())
            {
                seen_dot = true;
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.token_at(TokenKind::NumberLiteral, &text, offset, line, column)
    }

    fn read_identifier(&mut self) -> Token {
        let (offset, line, column) = (self.pos, self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let upper = text.to_ascii_uppercase();
        match keyword_kind(&upper) {
            // Keyword tokens carry the upper-cased form
            Some(kind) => self.token_at(kind, &upper, offset, line, column),
            None => self.token_at(TokenKind::Identifier, &text, offset, line, column),
        }
    }

    fn unexpected_char(&self, c: char, line: usize, column: usize) -> ScoutError {
        ScoutError::parse(format!(
            "Unexpected character '{}' at line {}, column {}",
            c, line, column
        ))
        .with_context(ErrorContext::Syntax {
            line,
            column,
            token: Some(c.to_string()),
        })
    }
}

/// Tokenize `input` in one call.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}
