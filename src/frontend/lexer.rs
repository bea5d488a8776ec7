use std::{collections::BTreeMap, str::Chars};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::{Display, EnumString};

use crate::{
    error::{CompileError, CompileResult},
    frontend::SourceFile,
};

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    line_number: usize,
    chars: PeekNth<Chars<'source>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {} '{}'", self.line, self.kind, self.lexeme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // int
    Identifier,       // main

    /* Literals */
    IntegerLiteral, // 1

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
    Comma,      // ,

    /* Unary Ops */
    Bang, // !

    /* Unary + Binary Ops */
    Minus, // -

    /* Binary Ops */
    Plus,                 // +
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    Ampersand,            // &
    Pipe,                 // |
    LogicalAnd,           // &&
    LogicalOr,            // ||
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals, // =

    /* End of input marker */
    Eof,
}

impl TokenKind {
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            Self::Keyword(Keyword::Int | Keyword::Float | Keyword::String)
        )
    }

    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::DoubleEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(self, Self::Minus | Self::Bang)
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Keyword(keyword) => return write!(f, "{}", keyword.to_string().to_uppercase()),
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::IntegerLiteral => "INT_LIT",
            TokenKind::OpenParen => "LEFT_PAREN",
            TokenKind::CloseParen => "RIGHT_PAREN",
            TokenKind::OpenBrace => "LEFT_BRACE",
            TokenKind::CloseBrace => "RIGHT_BRACE",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Comma => "COMMA",
            TokenKind::Bang => "BANG",
            TokenKind::Minus => "MINUS",
            TokenKind::Plus => "PLUS",
            TokenKind::Asterisk => "STAR",
            TokenKind::Divide => "SLASH",
            TokenKind::Modulus => "PERCENTAGE",
            TokenKind::Ampersand => "AND",
            TokenKind::Pipe => "OR",
            TokenKind::LogicalAnd => "AND_AND",
            TokenKind::LogicalOr => "OR_OR",
            TokenKind::DoubleEquals => "EQUAL_EQUAL",
            TokenKind::NotEquals => "BANG_EQUAL",
            TokenKind::LessThan => "LESS",
            TokenKind::LessThanOrEqualTo => "LESS_EQUAL",
            TokenKind::GreaterThan => "GREATER",
            TokenKind::GreaterThanOrEqualTo => "GREATER_EQUAL",
            TokenKind::Equals => "EQUAL",
            TokenKind::Eof => "EOF",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Int,
    Float,
    String,
    Return,
    If,
    Else,
    While,
    For,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('!', TokenKind::Bang),
        ('*', TokenKind::Asterisk),
        ('-', TokenKind::Minus),
        ('=', TokenKind::Equals),
        ('+', TokenKind::Plus),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('&', TokenKind::Ampersand),
        ('|', TokenKind::Pipe),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
    ])
});

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
            line_number: 1,
        }
    }

    /// Consumes the whole source, producing the token stream terminated by a
    /// single [`TokenKind::Eof`] marker
    pub fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next()? {
            tokens.push(token);
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line_number));

        Ok(tokens)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();

        if c == '\n' {
            self.line_number += 1;
        }

        Some(c)
    }

    fn next_is(&mut self, n: usize, expected: char) -> bool {
        self.chars.peek_nth(n).is_some_and(|c| *c == expected)
    }

    fn ignore_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.advance();
        }
    }

    fn ignore_line(&mut self) {
        while self.chars.peek().is_some_and(|c| *c != '\n') {
            self.advance();
        }
    }

    // An unterminated block comment runs to the end of the file
    fn ignore_block_comment(&mut self) {
        // Consume the opening `/*`
        self.advance();
        self.advance();

        while self.chars.peek().is_some() {
            if self.next_is(0, '*') && self.next_is(1, '/') {
                self.advance();
                self.advance();
                return;
            }

            self.advance();
        }
    }

    fn read_while(&mut self, kind: TokenKind, predicate: impl Fn(char) -> bool) -> Token {
        let start_position = self.position;
        let line = self.line_number;

        while self.chars.peek().is_some_and(|c| predicate(*c)) {
            self.advance();
        }

        Token::new(kind, &self.source.contents[start_position..self.position], line)
    }

    // Keyword or identifier
    fn read_word(&mut self) -> Token {
        let mut token = self.read_while(TokenKind::Identifier, |c| {
            c.is_ascii_alphanumeric() || c == '_'
        });

        if let Ok(keyword) = token.lexeme.parse() {
            token.kind = TokenKind::Keyword(keyword);
        }

        token
    }

    fn read_number(&mut self) -> Token {
        self.read_while(TokenKind::IntegerLiteral, |c| c.is_ascii_digit())
    }

    fn read_fixed(&mut self, kind: TokenKind, length: usize) -> Token {
        let start_position = self.position;
        let line = self.line_number;

        for _ in 0..length {
            self.advance();
        }

        Token::new(kind, &self.source.contents[start_position..self.position], line)
    }

    pub fn next(&mut self) -> CompileResult<Option<Token>> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_ascii_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '/' if self.next_is(1, '/') => {
                    self.ignore_line();
                    continue;
                }
                '/' if self.next_is(1, '*') => {
                    self.ignore_block_comment();
                    continue;
                }

                // Integer literals
                n if n.is_ascii_digit() => self.read_number(),

                // Identifiers and keywords
                a if a.is_ascii_alphabetic() || a == '_' => self.read_word(),

                '=' if self.next_is(1, '=') => self.read_fixed(TokenKind::DoubleEquals, 2),
                '!' if self.next_is(1, '=') => self.read_fixed(TokenKind::NotEquals, 2),
                '<' if self.next_is(1, '=') => self.read_fixed(TokenKind::LessThanOrEqualTo, 2),
                '>' if self.next_is(1, '=') => {
                    self.read_fixed(TokenKind::GreaterThanOrEqualTo, 2)
                }
                '&' if self.next_is(1, '&') => self.read_fixed(TokenKind::LogicalAnd, 2),
                '|' if self.next_is(1, '|') => self.read_fixed(TokenKind::LogicalOr, 2),

                s if SINGLE_TOKENS.contains_key(&s) => self.read_fixed(SINGLE_TOKENS[&s], 1),

                character => {
                    return Err(CompileError::Lex {
                        character,
                        line: self.line_number,
                    });
                }
            };

            return Ok(Some(token));
        }

        Ok(None)
    }
}
