//! Recursive descent parser for Bond

use crate::ast::*;
use crate::error::*;
use crate::lexer::{Lexer, Token, TokenKind};
use core_types::{Diagnostic, Span};

/// Upper bound on parameters and call arguments.
pub const MAX_ARGS: usize = 1024;

type ParseResult<T> = Result<T, Diagnostic>;

/// Bond parser
///
/// Errors do not stop the parse: the offending top-level declaration is
/// dropped, the parser resynchronises at the next statement boundary and
/// keeps going, so one compile reports every problem it can find.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Vec<Diagnostic>,
    /// Nesting depth of function bodies
    function_depth: usize,
    /// Loop depth inside the innermost function body
    loop_depth: usize,
    /// True while parsing the body of a `!` function
    in_fallible: bool,
}

impl Parser {
    /// Create a parser for `source`, tagging spans with `module_id`
    pub fn new(source: &str, module_id: u32) -> Self {
        let (tokens, diagnostics) = Lexer::new(source, module_id).tokenize();
        Self {
            tokens,
            current: 0,
            diagnostics,
            function_depth: 0,
            loop_depth: 0,
            in_fallible: false,
        }
    }

    /// Parse the whole module
    pub fn parse(mut self) -> Result<Program, Vec<Diagnostic>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.synchronize();
                }
            }
        }
        if self.diagnostics.is_empty() {
            Ok(Program { statements })
        } else {
            Err(self.diagnostics)
        }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_next_kind(&self) -> TokenKind {
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_at_current(what))
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<Ident> {
        let token = self.expect(TokenKind::Identifier, what)?;
        Ok(Ident::new(token.lexeme, token.span))
    }

    fn error_at_current(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            unexpected_eof(token.span)
        } else {
            unexpected_token(expected, &token.lexeme, token.span)
        }
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek_kind() {
                TokenKind::Struct
                | TokenKind::Fn
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Import => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn declaration(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Var => self.var_declaration(),
            TokenKind::Struct => self.struct_declaration().map(Stmt::Struct),
            TokenKind::Fn if self.peek_next_kind() == TokenKind::Identifier => {
                let decl = self.function(true)?;
                Ok(Stmt::Function(decl))
            }
            TokenKind::Import => self.import_declaration(),
            TokenKind::Async => {
                let token = self.advance();
                Err(syntax_error("Asyncio not implemented", token.span))
            }
            _ => self.statement(),
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Var, "'var'")?.span;

        if self.matches(TokenKind::LeftBracket) {
            let mut names = Vec::new();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    names.push(self.expect_ident("variable name")?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightBracket, "']' after variable list")?;
            self.expect(TokenKind::Equal, "'=' after variable list")?;
            let init = self.expression()?;
            let end = self.expect(TokenKind::Semicolon, "';' after variable declaration")?;
            return Ok(Stmt::VarUnpack {
                names,
                init,
                span: Span::merge(start, end.span),
            });
        }

        let name = self.expect_ident("variable name")?;
        if self.matches(TokenKind::Colon) {
            self.parse_type()?;
        }
        let init = if self.matches(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        let end = self.expect(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(Stmt::Var {
            name,
            init,
            span: Span::merge(start, end.span),
        })
    }

    fn import_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Import, "'import'")?.span;
        let path = self.expect(TokenKind::String, "import path string")?;
        let alias = if self.matches(TokenKind::As) {
            self.expect_ident("alias after 'as'")?
        } else {
            let name = default_alias(&path.lexeme);
            if !is_identifier(&name) {
                return Err(syntax_error(
                    format!("cannot derive a name from import path \"{}\", use 'as'", path.lexeme),
                    path.span,
                ));
            }
            Ident::new(name, path.span)
        };
        let end = self.expect(TokenKind::Semicolon, "';' after import")?;
        Ok(Stmt::Import {
            path: path.lexeme,
            alias,
            span: Span::merge(start, end.span),
        })
    }

    fn struct_declaration(&mut self) -> ParseResult<StructDecl> {
        let start = self.expect(TokenKind::Struct, "'struct'")?.span;
        let name = self.expect_ident("struct name")?;
        self.expect(TokenKind::LeftBrace, "'{' before struct body")?;

        let mut fields: Vec<Ident> = Vec::new();
        let mut methods: Vec<FunctionDecl> = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.peek_kind() {
                TokenKind::Var => {
                    let token = self.advance();
                    if !methods.is_empty() {
                        return Err(syntax_error(
                            "Instance variables must be declared before methods",
                            token.span,
                        ));
                    }
                    let field = self.expect_ident("instance variable name")?;
                    if self.matches(TokenKind::Colon) {
                        self.parse_type()?;
                    }
                    self.expect(TokenKind::Semicolon, "';' after instance variable")?;
                    if fields.iter().any(|f| f.name == field.name) {
                        return Err(syntax_error(
                            format!("Instance variable {} is already declared", field.name),
                            field.span,
                        ));
                    }
                    fields.push(field);
                }
                TokenKind::Fn => {
                    let method = self.function(true)?;
                    if methods.iter().any(|m| m.name.name == method.name.name) {
                        return Err(syntax_error(
                            format!("Method {} is already declared in this struct", method.name.name),
                            method.name.span,
                        ));
                    }
                    methods.push(method);
                }
                _ => return Err(self.error_at_current("'var' or 'fn' in struct body")),
            }
        }
        let end = self.expect(TokenKind::RightBrace, "'}' after struct body")?;

        Ok(StructDecl {
            name,
            fields,
            methods,
            span: Span::merge(start, end.span),
        })
    }

    /// `fn [name](params) [! [<T, E>] | Type] body`
    fn function(&mut self, named: bool) -> ParseResult<FunctionDecl> {
        let start = self.expect(TokenKind::Fn, "'fn'")?.span;
        let name = if named || self.check(TokenKind::Identifier) {
            self.expect_ident("function name")?
        } else {
            Ident::new("<lambda>", start)
        };

        self.expect(TokenKind::LeftParen, "'(' after function name")?;
        let mut params: Vec<Ident> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    return Err(syntax_error(
                        format!("Cannot have more than {} parameters", MAX_ARGS),
                        self.peek().span,
                    ));
                }
                let param = self.expect_ident("parameter name")?;
                if params.iter().any(|p| p.name == param.name) {
                    return Err(syntax_error(
                        format!("Duplicate parameter {}", param.name),
                        param.span,
                    ));
                }
                if self.matches(TokenKind::Colon) {
                    self.parse_type()?;
                }
                params.push(param);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "')' after parameters")?;

        let fallible = self.matches(TokenKind::Bang);
        if fallible {
            if self.matches(TokenKind::Less) {
                self.parse_type()?;
                self.expect(TokenKind::Comma, "',' between result types")?;
                self.parse_type()?;
                self.expect(TokenKind::Greater, "'>' after result types")?;
            }
        } else if !self.check(TokenKind::LeftBrace) {
            self.skip_return_type();
        }

        let saved = (self.function_depth, self.loop_depth, self.in_fallible);
        self.function_depth += 1;
        self.loop_depth = 0;
        self.in_fallible = fallible;

        let body = if self.check(TokenKind::LeftBrace) {
            self.block_statements().map(|(stmts, _)| FunctionBody::Block(stmts))
        } else {
            self.expression().map(FunctionBody::Expr)
        };

        (self.function_depth, self.loop_depth, self.in_fallible) = saved;
        let body = body?;

        Ok(FunctionDecl {
            name,
            params,
            fallible,
            body,
            span: Span::merge(start, self.previous().span),
        })
    }

    /// Consume a return type annotation, backtracking when what follows the
    /// parameter list is really an expression body.
    fn skip_return_type(&mut self) {
        let mark = self.current;
        if self.parse_type().is_ok() {
            let body_follows = matches!(
                self.peek_kind(),
                TokenKind::LeftBrace
                    | TokenKind::Identifier
                    | TokenKind::Integer
                    | TokenKind::Float
                    | TokenKind::String
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Nil
                    | TokenKind::LeftParen
                    | TokenKind::LeftBracket
                    | TokenKind::Bang
            );
            if body_follows {
                return;
            }
        }
        self.current = mark;
    }

    /// Type annotations are parsed and discarded.
    fn parse_type(&mut self) -> ParseResult<()> {
        match self.peek_kind() {
            TokenKind::LeftBracket => {
                self.advance();
                self.parse_type()?;
                self.expect(TokenKind::RightBracket, "']' after list type")?;
            }
            TokenKind::Fn => {
                self.advance();
                self.expect(TokenKind::LeftParen, "'(' in function type")?;
                if !self.check(TokenKind::RightParen) {
                    loop {
                        self.parse_type()?;
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightParen, "')' in function type")?;
                if matches!(
                    self.peek_kind(),
                    TokenKind::Identifier | TokenKind::LeftBracket | TokenKind::Fn
                ) {
                    self.parse_type()?;
                }
            }
            _ => {
                self.expect(TokenKind::Identifier, "type name")?;
                loop {
                    if self.matches(TokenKind::Dot) {
                        self.expect(TokenKind::Identifier, "type name after '.'")?;
                    } else if self.matches(TokenKind::Less) {
                        loop {
                            self.parse_type()?;
                            if !self.matches(TokenKind::Comma) {
                                break;
                            }
                        }
                        self.expect(TokenKind::Greater, "'>' after type arguments")?;
                    } else {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::LeftBrace => {
                let (stmts, span) = self.block_statements()?;
                Ok(Stmt::Block(stmts, span))
            }
            TokenKind::Var => self.var_declaration(),
            TokenKind::Fn if self.peek_next_kind() == TokenKind::Identifier => {
                let decl = self.function(true)?;
                Ok(Stmt::Closure(decl))
            }
            TokenKind::Return => self.return_statement(),
            TokenKind::Break | TokenKind::Continue => self.loop_control(),
            TokenKind::Ok | TokenKind::Err => self.result_statement(),
            TokenKind::Async => {
                let token = self.advance();
                Err(syntax_error("Asyncio not implemented", token.span))
            }
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Semicolon, "';' after expression")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block_statements(&mut self) -> ParseResult<(Vec<Stmt>, Span)> {
        let start = self.expect(TokenKind::LeftBrace, "'{'")?.span;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        let end = self.expect(TokenKind::RightBrace, "'}' after block")?;
        Ok((stmts, Span::merge(start, end.span)))
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::If, "'if'")?.span;
        let cond = self.expression()?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.matches(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            span: Span::merge(start, self.previous().span),
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::While, "'while'")?.span;
        let cond = self.expression()?;
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Stmt::While {
            cond,
            body: Box::new(body?),
            span: Span::merge(start, self.previous().span),
        })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::For, "'for'")?.span;
        let var = self.expect_ident("loop variable")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let iterable = self.expression()?;
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Stmt::For {
            var,
            iterable,
            body: Box::new(body?),
            span: Span::merge(start, self.previous().span),
        })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.advance();
        if self.function_depth == 0 {
            return Err(syntax_error("Cannot return from top-level code", token.span));
        }
        if self.in_fallible {
            return Err(syntax_error(
                "Cannot use return in a function that can error, use ok or err",
                token.span,
            ));
        }
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        let end = self.expect(TokenKind::Semicolon, "';' after return value")?;
        Ok(Stmt::Return {
            value,
            span: Span::merge(token.span, end.span),
        })
    }

    fn loop_control(&mut self) -> ParseResult<Stmt> {
        let token = self.advance();
        let is_break = token.kind == TokenKind::Break;
        if self.loop_depth == 0 {
            return Err(syntax_error(
                format!("'{}' outside of a loop", token.lexeme),
                token.span,
            ));
        }
        let end = self.expect(TokenKind::Semicolon, "';'")?;
        let span = Span::merge(token.span, end.span);
        Ok(if is_break {
            Stmt::Break(span)
        } else {
            Stmt::Continue(span)
        })
    }

    fn result_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.advance();
        if !self.in_fallible {
            return Err(syntax_error(
                format!("'{}' can only be used in a function that can error", token.lexeme),
                token.span,
            ));
        }
        let value = self.expression()?;
        let end = self.expect(TokenKind::Semicolon, "';' after result value")?;
        Ok(Stmt::Result {
            is_error: token.kind == TokenKind::Err,
            value,
            span: Span::merge(token.span, end.span),
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Parse one expression
    pub fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.try_expression()?;

        if !self.check(TokenKind::Equal) {
            return Ok(expr);
        }
        let equals = self.advance();
        let value = Box::new(self.assignment()?);
        let span = Span::merge(expr.span, value.span);

        let kind = match expr.kind {
            ExprKind::Identifier(name) => ExprKind::Assign {
                name: Ident::new(name, expr.span),
                value,
            },
            ExprKind::GetItem { target, index } => ExprKind::SetItem {
                target,
                index,
                value,
            },
            ExprKind::GetAttribute { target, name } => ExprKind::SetAttribute {
                target,
                name,
                value,
            },
            ExprKind::List(items) => {
                let mut targets = Vec::with_capacity(items.len());
                for item in items {
                    match item.kind {
                        ExprKind::Identifier(name) => targets.push(Ident::new(name, item.span)),
                        _ => return Err(syntax_error("Invalid assignment target.", item.span)),
                    }
                }
                ExprKind::Unpack { targets, value }
            }
            _ => return Err(syntax_error("Invalid assignment target.", equals.span)),
        };
        Ok(Expr::new(kind, span))
    }

    fn check_try_allowed(&self, span: Span) -> ParseResult<()> {
        if self.function_depth > 0 && !self.in_fallible {
            return Err(syntax_error(
                "try can only be used in a function that can error",
                span,
            ));
        }
        Ok(())
    }

    fn try_expression(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::Await => {
                let token = self.advance();
                Err(syntax_error("Asyncio not implemented", token.span))
            }
            TokenKind::Try => {
                let token = self.advance();
                self.check_try_allowed(token.span)?;
                let expr = self.or()?;
                let span = Span::merge(token.span, expr.span);
                Ok(Expr::new(ExprKind::Try(Box::new(expr)), span))
            }
            _ => self.or(),
        }
    }

    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut expr = next(self)?;
        while let Some(&(_, op)) = operators.iter().find(|(kind, _)| self.check(*kind)) {
            self.advance();
            let right = next(self)?;
            let span = Span::merge(expr.span, right.span);
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[(TokenKind::Or, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[(TokenKind::And, BinaryOp::And)], Self::bit_or)
    }

    fn bit_or(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[(TokenKind::Pipe, BinaryOp::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[(TokenKind::Caret, BinaryOp::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[(TokenKind::Ampersand, BinaryOp::BitAnd)], Self::equality)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::EqualEqual, BinaryOp::Eq),
                (TokenKind::BangEqual, BinaryOp::Ne),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Less, BinaryOp::Lt),
                (TokenKind::LessEqual, BinaryOp::Le),
                (TokenKind::Greater, BinaryOp::Gt),
                (TokenKind::GreaterEqual, BinaryOp::Ge),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.call(),
        };
        let token = self.advance();
        let expr = self.unary()?;
        let span = Span::merge(token.span, expr.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LeftParen => {
                    self.advance();
                    let args = self.arguments()?;
                    let end = self.expect(TokenKind::RightParen, "')' after arguments")?;
                    let span = Span::merge(expr.span, end.span);
                    let kind = match expr.kind {
                        ExprKind::GetAttribute { target, name } => ExprKind::CallMethod {
                            receiver: target,
                            name,
                            args,
                        },
                        other => ExprKind::Call {
                            callee: Box::new(Expr::new(other, expr.span)),
                            args,
                        },
                    };
                    expr = Expr::new(kind, span);
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.expression()?;
                    let end = self.expect(TokenKind::RightBracket, "']' after index")?;
                    let span = Span::merge(expr.span, end.span);
                    expr = Expr::new(
                        ExprKind::GetItem {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    if self.check(TokenKind::Question) {
                        let token = self.advance();
                        self.check_try_allowed(token.span)?;
                        let span = Span::merge(expr.span, token.span);
                        expr = Expr::new(ExprKind::Try(Box::new(expr)), span);
                    } else {
                        let name = self.expect_ident("attribute name after '.'")?;
                        let span = Span::merge(expr.span, name.span);
                        expr = Expr::new(
                            ExprKind::GetAttribute {
                                target: Box::new(expr),
                                name,
                            },
                            span,
                        );
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RightParen) {
            return Ok(args);
        }
        loop {
            if args.len() >= MAX_ARGS {
                return Err(syntax_error(
                    format!("Cannot have more than {} arguments", MAX_ARGS),
                    self.peek().span,
                ));
            }
            args.push(self.expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::False => ExprKind::False,
            TokenKind::True => ExprKind::True,
            TokenKind::Nil => ExprKind::Nil,
            TokenKind::Integer => match token.lexeme.parse::<i64>() {
                Ok(value) => ExprKind::Int(value),
                Err(_) => {
                    return Err(syntax_error(
                        format!("Integer literal {} is out of range", token.lexeme),
                        token.span,
                    ))
                }
            },
            TokenKind::Float => match token.lexeme.parse::<f64>() {
                Ok(value) => ExprKind::Float(value),
                Err(_) => {
                    return Err(syntax_error(
                        format!("Invalid float literal {}", token.lexeme),
                        token.span,
                    ))
                }
            },
            TokenKind::String => ExprKind::Str(token.lexeme.clone()),
            TokenKind::Identifier => ExprKind::Identifier(token.lexeme.clone()),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                let end = self.expect(TokenKind::RightParen, "')' after expression")?;
                return Ok(Expr::new(expr.kind, Span::merge(token.span, end.span)));
            }
            TokenKind::LeftBracket => return self.list_literal(),
            TokenKind::LeftBrace => return self.dict_literal(),
            TokenKind::Fn => {
                let decl = self.function(false)?;
                let span = decl.span;
                return Ok(Expr::new(ExprKind::Closure(Box::new(decl)), span));
            }
            TokenKind::Async | TokenKind::Await => {
                return Err(syntax_error("Asyncio not implemented", token.span))
            }
            _ => return Err(self.error_at_current("expression")),
        };
        self.advance();
        Ok(Expr::new(kind, token.span))
    }

    fn list_literal(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut items = Vec::new();
        while !self.check(TokenKind::RightBracket) {
            items.push(self.expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RightBracket, "']' after list items")?;
        Ok(Expr::new(ExprKind::List(items), Span::merge(start, end.span)))
    }

    fn dict_literal(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut pairs = Vec::new();
        while !self.check(TokenKind::RightBrace) {
            let key = self.expression()?;
            self.expect(TokenKind::Colon, "':' after map key")?;
            let value = self.expression()?;
            pairs.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RightBrace, "'}' after map entries")?;
        Ok(Expr::new(ExprKind::Dict(pairs), Span::merge(start, end.span)))
    }
}

/// Name an import is bound to when no `as` alias is given: the last path
/// segment after `:` and `/`, without its extension.
pub fn default_alias(path: &str) -> String {
    let tail = path.rsplit(':').next().unwrap_or(path);
    let tail = tail.rsplit('/').next().unwrap_or(tail);
    match tail.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => tail.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && TokenKind::keyword(name).is_none()
}
