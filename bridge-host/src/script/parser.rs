//! Script parser.
//!
//! Parses tokens into a [`FunctionNode`]. Dynamic code must be a single
//! function expression; anything else is rejected at compile time.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use super::ast::*;
use super::error::{ScriptError, ScriptResult};
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};

/// Nesting allowed by [`parse_function`].
pub const DEFAULT_MAX_NESTING: usize = 64;

/// Compile dynamic code text into a function literal.
pub fn parse_function(source: &str) -> ScriptResult<Rc<FunctionNode>> {
    parse_function_with_limit(source, DEFAULT_MAX_NESTING)
}

/// Compile dynamic code text, rejecting expressions and statements nested
/// deeper than `max_nesting`.
pub fn parse_function_with_limit(
    source: &str,
    max_nesting: usize,
) -> ScriptResult<Rc<FunctionNode>> {
    let mut parser = Parser::new(source)?.with_max_nesting(max_nesting);
    let expr = parser.parse_expression()?;
    parser.eat(&TokenKind::Semicolon);
    if !parser.is_eof() {
        return Err(parser.unexpected());
    }
    match expr {
        Expression::Function(node) => Ok(node),
        _ => Err(ScriptError::syntax(
            "dynamic code must be a function expression",
        )),
    }
}

/// Script parser.
pub struct Parser {
    /// Tokens.
    tokens: Vec<Token>,
    /// Current position.
    pos: usize,
    /// Open nested expressions and statements.
    depth: usize,
    /// Limit on `depth`.
    max_depth: usize,
}

impl Parser {
    /// Create a new parser.
    pub fn new(source: &str) -> ScriptResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_NESTING,
        })
    }

    /// Set the nesting limit.
    pub fn with_max_nesting(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::syntax(alloc::format!(
                "nesting too deep at {}",
                self.current_span()
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Left-nested chains (`a.b.c`, `f()()`, `1 + 2 + 3`) count towards the
    /// limit one link at a time.
    fn check_chain(&self, links: usize) -> ScriptResult<()> {
        if self.depth + links > self.max_depth {
            return Err(ScriptError::syntax(alloc::format!(
                "nesting too deep at {}",
                self.current_span()
            )));
        }
        Ok(())
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn is_eof(&self) -> bool {
        self.current().is_eof()
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ScriptResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ScriptError::syntax(alloc::format!(
                "expected {} but found {} at {}",
                kind,
                self.current().kind,
                self.current_span()
            )))
        }
    }

    fn unexpected(&self) -> ScriptError {
        ScriptError::syntax(alloc::format!(
            "unexpected token {} at {}",
            self.current().kind,
            self.current_span()
        ))
    }

    fn parse_identifier(&mut self) -> ScriptResult<String> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Property names may be keywords.
    fn parse_property_name(&mut self) -> ScriptResult<String> {
        let name = match &self.current().kind {
            TokenKind::Identifier(name) | TokenKind::String(name) => name.clone(),
            TokenKind::Number(n) => crate::value::number_to_string(*n),
            kind => match keyword_text(kind) {
                Some(text) => String::from(text),
                None => return Err(self.unexpected()),
            },
        };
        self.advance();
        Ok(name)
    }

    // ── Statements ─────────────────────────────────────────────────

    /// Parse a statement.
    pub fn parse_statement(&mut self) -> ScriptResult<Statement> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ScriptResult<Statement> {
        match &self.current().kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::Const | TokenKind::Let | TokenKind::Var => self.parse_variable_declaration(),
            TokenKind::Function => {
                let node = self.parse_function_literal()?;
                if node.name.is_none() {
                    return Err(ScriptError::syntax("function statement requires a name"));
                }
                Ok(Statement::Function(node))
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Return => {
                self.advance();
                let argument = if self.check(&TokenKind::Semicolon)
                    || self.check(&TokenKind::RightBrace)
                    || self.is_eof()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.eat(&TokenKind::Semicolon);
                Ok(Statement::Return(argument))
            }
            TokenKind::Throw => {
                self.advance();
                let argument = self.parse_expression()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Statement::Throw(argument))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_block(&mut self) -> ScriptResult<Vec<Statement>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_variable_declaration(&mut self) -> ScriptResult<Statement> {
        let kind = match self.advance().kind {
            TokenKind::Const => VariableKind::Const,
            TokenKind::Let => VariableKind::Let,
            _ => VariableKind::Var,
        };
        let mut declarations = Vec::new();
        loop {
            let name = self.parse_identifier()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment_expression()?)
            } else if kind == VariableKind::Const {
                return Err(ScriptError::syntax(alloc::format!(
                    "missing initializer in const declaration '{}'",
                    name
                )));
            } else {
                None
            };
            declarations.push((name, init));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::Variable { kind, declarations })
    }

    fn parse_if_statement(&mut self) -> ScriptResult<Statement> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    // ── Expressions ────────────────────────────────────────────────

    /// Parse an expression (no comma operator).
    pub fn parse_expression(&mut self) -> ScriptResult<Expression> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> ScriptResult<Expression> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> ScriptResult<Expression> {
        if self.is_arrow_ahead() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional_expression()?;
        let operator = match &self.current().kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            _ => return Ok(target),
        };
        if !target.is_assignment_target() {
            return Err(ScriptError::syntax(alloc::format!(
                "invalid assignment target at {}",
                self.current_span()
            )));
        }
        self.advance();
        let value = self.parse_assignment_expression()?;
        Ok(Expression::Assign {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// `x =>` or `( ... ) =>`
    fn is_arrow_ahead(&self) -> bool {
        match self.peek_kind(0) {
            TokenKind::Identifier(_) => matches!(self.peek_kind(1), TokenKind::Arrow),
            TokenKind::LeftParen => {
                let mut depth = 0usize;
                let mut i = 0;
                loop {
                    match self.peek_kind(i) {
                        TokenKind::LeftParen => depth += 1,
                        TokenKind::RightParen => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.peek_kind(i + 1), TokenKind::Arrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> ScriptResult<Expression> {
        let span = self.current_span();
        let params = if self.eat(&TokenKind::LeftParen) {
            self.parse_params_tail()?
        } else {
            alloc::vec![self.parse_identifier()?]
        };
        self.expect(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LeftBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment_expression()?))
        };
        Ok(Expression::Function(Rc::new(FunctionNode {
            name: None,
            params,
            body,
            is_arrow: true,
            span,
        })))
    }

    /// Parameter names after `(`, through the closing `)`.
    fn parse_params_tail(&mut self) -> ScriptResult<Vec<String>> {
        let mut params = Vec::new();
        while !self.eat(&TokenKind::RightParen) {
            let name = self.parse_identifier()?;
            if params.contains(&name) {
                return Err(ScriptError::syntax(alloc::format!(
                    "duplicate parameter name '{}'",
                    name
                )));
            }
            params.push(name);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RightParen)?;
                break;
            }
        }
        Ok(params)
    }

    fn parse_function_literal(&mut self) -> ScriptResult<Rc<FunctionNode>> {
        let span = self.current_span();
        self.expect(&TokenKind::Function)?;
        let name = match &self.current().kind {
            TokenKind::Identifier(_) => Some(self.parse_identifier()?),
            _ => None,
        };
        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_params_tail()?;
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(Rc::new(FunctionNode {
            name,
            params,
            body,
            is_arrow: false,
            span,
        }))
    }

    fn parse_conditional_expression(&mut self) -> ScriptResult<Expression> {
        let test = self.parse_binary_expression(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment_expression()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Parse binary expression with precedence climbing.
    fn parse_binary_expression(&mut self, min_prec: u8) -> ScriptResult<Expression> {
        let mut left = self.parse_unary_expression()?;
        let mut links = 0;

        loop {
            let (op, prec) = match &self.current().kind {
                TokenKind::QuestionQuestion => (Op::Logical(LogicalOp::Nullish), 1),
                TokenKind::PipePipe => (Op::Logical(LogicalOp::Or), 2),
                TokenKind::AmpersandAmpersand => (Op::Logical(LogicalOp::And), 3),
                TokenKind::Equal => (Op::Binary(BinaryOp::Equal), 4),
                TokenKind::NotEqual => (Op::Binary(BinaryOp::NotEqual), 4),
                TokenKind::StrictEqual => (Op::Binary(BinaryOp::StrictEqual), 4),
                TokenKind::StrictNotEqual => (Op::Binary(BinaryOp::StrictNotEqual), 4),
                TokenKind::LessThan => (Op::Binary(BinaryOp::LessThan), 5),
                TokenKind::LessEqual => (Op::Binary(BinaryOp::LessEqual), 5),
                TokenKind::GreaterThan => (Op::Binary(BinaryOp::GreaterThan), 5),
                TokenKind::GreaterEqual => (Op::Binary(BinaryOp::GreaterEqual), 5),
                TokenKind::Plus => (Op::Binary(BinaryOp::Add), 6),
                TokenKind::Minus => (Op::Binary(BinaryOp::Sub), 6),
                TokenKind::Star => (Op::Binary(BinaryOp::Mul), 7),
                TokenKind::Slash => (Op::Binary(BinaryOp::Div), 7),
                TokenKind::Percent => (Op::Binary(BinaryOp::Mod), 7),
                TokenKind::StarStar => (Op::Binary(BinaryOp::Exp), 8),
                _ => break,
            };

            if prec < min_prec {
                break;
            }

            links += 1;
            self.check_chain(links)?;
            self.advance();
            // `**` is right-associative.
            let next = if matches!(op, Op::Binary(BinaryOp::Exp)) { prec } else { prec + 1 };
            let right = self.nested(|p| p.parse_binary_expression(next))?;

            left = match op {
                Op::Logical(operator) => Expression::Logical {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Op::Binary(operator) => Expression::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> ScriptResult<Expression> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> ScriptResult<Expression> {
        let operator = match &self.current().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            _ => return self.parse_call_expression(),
        };
        self.advance();
        let argument = self.parse_unary_expression()?;
        Ok(Expression::Unary {
            operator,
            argument: Box::new(argument),
        })
    }

    fn parse_call_expression(&mut self) -> ScriptResult<Expression> {
        let mut expr = if self.eat(&TokenKind::New) {
            let callee = self.parse_member_expression()?;
            let arguments = if self.check(&TokenKind::LeftParen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            Expression::Call {
                callee: Box::new(callee),
                arguments,
            }
        } else {
            self.parse_primary_expression()?
        };

        let mut links = 0;
        loop {
            if matches!(
                self.current().kind,
                TokenKind::Dot | TokenKind::LeftBracket | TokenKind::LeftParen
            ) {
                links += 1;
                self.check_chain(links)?;
            }
            expr = match &self.current().kind {
                TokenKind::Dot | TokenKind::LeftBracket => self.parse_member_tail(expr)?,
                TokenKind::LeftParen => Expression::Call {
                    callee: Box::new(expr),
                    arguments: self.parse_arguments()?,
                },
                _ => return Ok(expr),
            };
        }
    }

    /// Member chain without calls (the callee of `new`).
    fn parse_member_expression(&mut self) -> ScriptResult<Expression> {
        let mut expr = self.parse_primary_expression()?;
        let mut links = 0;
        while matches!(self.current().kind, TokenKind::Dot | TokenKind::LeftBracket) {
            links += 1;
            self.check_chain(links)?;
            expr = self.parse_member_tail(expr)?;
        }
        Ok(expr)
    }

    fn parse_member_tail(&mut self, object: Expression) -> ScriptResult<Expression> {
        let property = if self.eat(&TokenKind::Dot) {
            let name = match &self.current().kind {
                TokenKind::Identifier(name) => name.clone(),
                kind => match keyword_text(kind) {
                    Some(text) => String::from(text),
                    None => return Err(self.unexpected()),
                },
            };
            self.advance();
            MemberProperty::Named(name)
        } else {
            self.expect(&TokenKind::LeftBracket)?;
            let key = self.parse_expression()?;
            self.expect(&TokenKind::RightBracket)?;
            MemberProperty::Computed(Box::new(key))
        };
        Ok(Expression::Member {
            object: Box::new(object),
            property,
        })
    }

    fn parse_arguments(&mut self) -> ScriptResult<Vec<Expression>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut arguments = Vec::new();
        while !self.eat(&TokenKind::RightParen) {
            arguments.push(self.parse_assignment_expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RightParen)?;
                break;
            }
        }
        Ok(arguments)
    }

    fn parse_primary_expression(&mut self) -> ScriptResult<Expression> {
        let expr = match &self.current().kind {
            TokenKind::Number(n) => Expression::Number(*n),
            TokenKind::String(s) => Expression::String(s.clone()),
            TokenKind::BigInt(n) => Expression::BigInt(*n),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::Null => Expression::Null,
            TokenKind::This => Expression::This,
            TokenKind::Identifier(name) => Expression::Identifier(name.clone()),
            TokenKind::Function => return Ok(Expression::Function(self.parse_function_literal()?)),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(inner);
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftBrace => return self.parse_object_literal(),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> ScriptResult<Expression> {
        self.expect(&TokenKind::LeftBracket)?;
        let mut elements = Vec::new();
        while !self.eat(&TokenKind::RightBracket) {
            elements.push(self.parse_assignment_expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RightBracket)?;
                break;
            }
        }
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> ScriptResult<Expression> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut properties = Vec::new();
        while !self.eat(&TokenKind::RightBrace) {
            let shorthand = matches!(self.current().kind, TokenKind::Identifier(_));
            let span = self.current_span();
            let key = self.parse_property_name()?;
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_assignment_expression()?
            } else if self.eat(&TokenKind::LeftParen) {
                let params = self.parse_params_tail()?;
                let body = FunctionBody::Block(self.parse_block()?);
                Expression::Function(Rc::new(FunctionNode {
                    name: Some(key.clone()),
                    params,
                    body,
                    is_arrow: false,
                    span,
                }))
            } else if shorthand {
                Expression::Identifier(key.clone())
            } else {
                return Err(self.unexpected());
            };
            properties.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RightBrace)?;
                break;
            }
        }
        Ok(Expression::Object(properties))
    }
}

#[derive(Clone, Copy)]
enum Op {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    let text = match kind {
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::This => "this",
        TokenKind::Const => "const",
        TokenKind::Let => "let",
        TokenKind::Var => "var",
        TokenKind::Function => "function",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::Throw => "throw",
        TokenKind::Typeof => "typeof",
        TokenKind::New => "new",
        _ => return None,
    };
    Some(text)
}
