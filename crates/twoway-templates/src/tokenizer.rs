//! SQL Tokenizer for directive comments
//!
//! Splits template text into literal SQL fragments and `/* ... */` comment
//! bodies. Comment markers inside single-quoted SQL literals are part of the
//! literal. Position information is kept for error messages.

use crate::error::ErrorKind;

/// A token in a template
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal SQL text
    Text(String),
    /// Body of a `/* ... */` comment, without the markers
    Comment(String),
    /// End of input
    Eof,
}

/// Token with position information
#[derive(Debug, Clone)]
pub struct PositionedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// How far the test value after a variable comment extends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestValueExtent {
    /// The whole literal: a quoted string, a parenthesized list or a bare word
    Full,
    /// A bare word up to (not including) its first dot
    UntilDot,
}

/// Tokenizer over template text
pub struct SqlTokenizer<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> SqlTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Current line (1-based)
    pub fn line(&self) -> usize {
        self.line
    }

    /// Current column (1-based)
    pub fn column(&self) -> usize {
        self.column
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<PositionedToken>, ErrorKind> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token, Token::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<PositionedToken, ErrorKind> {
        let start = self.position;
        let line = self.line;
        let column = self.column;

        if self.is_eof() {
            return Ok(PositionedToken {
                token: Token::Eof,
                start,
                end: start,
                line,
                column,
            });
        }

        let token = if self.rest().starts_with("/*") {
            self.read_comment(line, column)?
        } else {
            self.read_text()
        };

        Ok(PositionedToken {
            token,
            start,
            end: self.position,
            line,
            column,
        })
    }

    /// Consume the test value that follows a variable comment.
    ///
    /// The test value only exists so the template runs as plain SQL; it is
    /// captured to decide between scalar and list handling and quoting.
    pub fn skip_test_value(&mut self, extent: TestValueExtent) -> String {
        let start = self.position;
        match self.current_char() {
            None => {}
            Some('\'') => self.skip_quoted(),
            Some('(') => self.skip_parenthesized(),
            Some(_) => {
                while let Some(ch) = self.current_char() {
                    let stop = ch.is_whitespace()
                        || matches!(ch, ',' | '(' | ')' | ';' | '\'')
                        || (extent == TestValueExtent::UntilDot && ch == '.')
                        || self.rest().starts_with("/*")
                        || self.rest().starts_with("--");
                    if stop {
                        break;
                    }
                    self.advance();
                }
            }
        }
        self.input[start..self.position].to_string()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_by(&mut self, bytes: usize) {
        let target = self.position + bytes;
        while self.position < target && !self.is_eof() {
            self.advance();
        }
    }

    fn read_comment(&mut self, line: usize, column: usize) -> Result<Token, ErrorKind> {
        let body_start = self.position + 2;
        let Some(offset) = self.input[body_start..].find("*/") else {
            return Err(ErrorKind::UnterminatedComment { line, column });
        };
        let body = self.input[body_start..body_start + offset].to_string();
        self.advance_by(2 + offset + 2);
        Ok(Token::Comment(body))
    }

    fn read_text(&mut self) -> Token {
        let start = self.position;
        let mut in_literal = false;
        while let Some(ch) = self.current_char() {
            if !in_literal && self.rest().starts_with("/*") {
                break;
            }
            if !in_literal && self.rest().starts_with("--") {
                self.skip_line_comment();
                continue;
            }
            if ch == '\'' {
                in_literal = !in_literal;
            }
            self.advance();
        }
        Token::Text(self.input[start..self.position].to_string())
    }

    /// Quotes inside `-- ...` are not literal delimiters
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == '\n' {
                return;
            }
        }
    }

    fn skip_quoted(&mut self) {
        self.advance(); // opening quote
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == '\'' {
                // '' is an escaped quote inside the literal
                if self.current_char() == Some('\'') {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    fn skip_parenthesized(&mut self) {
        let mut depth = 0usize;
        while let Some(ch) = self.current_char() {
            match ch {
                '\'' => {
                    self.skip_quoted();
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }
}
