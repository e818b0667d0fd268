//! Bond lexer - tokenizes source code into tokens

use crate::error::syntax_error;
use core_types::{Diagnostic, Span};

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `%`
    Percent,
    /// `;`
    Semicolon,
    /// `/`
    Slash,
    /// `*`
    Star,
    /// `|`
    Pipe,
    /// `&`
    Ampersand,
    /// `^`
    Caret,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `!`
    Bang,
    /// `!=`
    BangEqual,
    /// `=`
    Equal,
    /// `==`
    EqualEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// Identifier
    Identifier,
    /// String literal (lexeme holds the unescaped contents)
    String,
    /// Integer literal
    Integer,
    /// Float literal
    Float,
    /// `and`
    And,
    /// `as`
    As,
    /// `async`
    Async,
    /// `await`
    Await,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `else`
    Else,
    /// `err`
    Err,
    /// `false`
    False,
    /// `fn`
    Fn,
    /// `for`
    For,
    /// `if`
    If,
    /// `import`
    Import,
    /// `in`
    In,
    /// `nil`
    Nil,
    /// `ok`
    Ok,
    /// `or`
    Or,
    /// `return`
    Return,
    /// `struct`
    Struct,
    /// `true`
    True,
    /// `try`
    Try,
    /// `var`
    Var,
    /// `while`
    While,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Keyword kind for an identifier-shaped lexeme.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "and" => TokenKind::And,
            "as" => TokenKind::As,
            "async" => TokenKind::Async,
            "await" => TokenKind::Await,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "else" => TokenKind::Else,
            "err" => TokenKind::Err,
            "false" => TokenKind::False,
            "fn" => TokenKind::Fn,
            "for" => TokenKind::For,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "in" => TokenKind::In,
            "nil" => TokenKind::Nil,
            "ok" => TokenKind::Ok,
            "or" => TokenKind::Or,
            "return" => TokenKind::Return,
            "struct" => TokenKind::Struct,
            "true" => TokenKind::True,
            "try" => TokenKind::Try,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => return None,
        };
        Some(kind)
    }
}

/// A lexed token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Source text (unescaped contents for strings)
    pub lexeme: String,
    /// Location in the source
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

/// Bond lexer
///
/// Lexing never stops at the first problem: bad characters and unterminated
/// strings are recorded as diagnostics and scanning resumes.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    module_id: u32,
    start: usize,
    current: usize,
    line: u32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over `source`, tagging spans with `module_id`
    pub fn new(source: &'a str, module_id: u32) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            module_id,
            start: 0,
            current: 0,
            line: 1,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tokenize the whole source. The token list always ends with [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.start = self.current;
        let span = self.span();
        self.tokens.push(Token::new(TokenKind::Eof, "", span));
        (self.tokens, self.diagnostics)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.current).copied().unwrap_or(0)
    }

    fn peek_next(&self) -> u8 {
        self.bytes.get(self.current + 1).copied().unwrap_or(0)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() != expected || self.is_at_end() {
            return false;
        }
        self.current += 1;
        true
    }

    fn span(&self) -> Span {
        Span::new(
            self.module_id,
            self.start as u32,
            self.current as u32,
            self.line,
        )
    }

    fn push(&mut self, kind: TokenKind) {
        let lexeme = &self.source[self.start..self.current];
        let span = self.span();
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    fn push_if(&mut self, next: u8, matched: TokenKind, otherwise: TokenKind) {
        let kind = if self.matches(next) { matched } else { otherwise };
        self.push(kind);
    }

    fn report(&mut self, message: &str) {
        let span = self.span();
        self.diagnostics.push(syntax_error(message, span));
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            b'(' => self.push(TokenKind::LeftParen),
            b')' => self.push(TokenKind::RightParen),
            b'{' => self.push(TokenKind::LeftBrace),
            b'}' => self.push(TokenKind::RightBrace),
            b'[' => self.push(TokenKind::LeftBracket),
            b']' => self.push(TokenKind::RightBracket),
            b',' => self.push(TokenKind::Comma),
            b'.' => self.push(TokenKind::Dot),
            b'-' => self.push(TokenKind::Minus),
            b'+' => self.push(TokenKind::Plus),
            b'%' => self.push(TokenKind::Percent),
            b';' => self.push(TokenKind::Semicolon),
            b'*' => self.push(TokenKind::Star),
            b'|' => self.push(TokenKind::Pipe),
            b'&' => self.push(TokenKind::Ampersand),
            b'^' => self.push(TokenKind::Caret),
            b':' => self.push(TokenKind::Colon),
            b'?' => self.push(TokenKind::Question),
            b'!' => self.push_if(b'=', TokenKind::BangEqual, TokenKind::Bang),
            b'=' => self.push_if(b'=', TokenKind::EqualEqual, TokenKind::Equal),
            b'<' => self.push_if(b'=', TokenKind::LessEqual, TokenKind::Less),
            b'>' => self.push_if(b'=', TokenKind::GreaterEqual, TokenKind::Greater),
            b'/' => {
                if self.matches(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.push(TokenKind::Slash);
                }
            }
            b' ' | b'\r' | b'\t' => {}
            b'\n' => self.line += 1,
            b'"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_ident_start(c) => self.identifier(),
            _ => {
                // Skip the rest of a multi-byte character so slicing stays valid.
                while !self.is_at_end() && !self.source.is_char_boundary(self.current) {
                    self.current += 1;
                }
                self.report("unexpected character");
            }
        }
    }

    fn string(&mut self) {
        let mut escaped = false;
        while self.peek() != b'"' || escaped {
            if self.is_at_end() {
                self.report("Unterminated string.");
                return;
            }
            let c = self.advance();
            if c == b'\n' {
                self.line += 1;
            }
            escaped = c == b'\\' && !escaped;
        }
        self.advance();

        let raw = &self.source[self.start + 1..self.current - 1];
        let value = unescape(raw);
        let span = self.span();
        self.tokens.push(Token::new(TokenKind::String, value, span));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            self.push(TokenKind::Float);
        } else {
            self.push(TokenKind::Integer);
        }
    }

    fn identifier(&mut self) {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let text = &self.source[self.start..self.current];
        let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Identifier);
        self.push(kind);
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Replace the escape sequences `\n \t \r \0 \\ \' \"`. Unknown escapes are
/// kept verbatim.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
