use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;

use bindgraph_common::{BindError, BindErrorKind};

use crate::tokenizer::{Token, TokenType, Tokenizer, TokenizerError, TemplateChunk, split_template_literal};

/// A custom error type for the parser.
#[derive(Debug)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

impl From<ParserError> for BindError {
    fn from(err: ParserError) -> Self {
        let error = BindError::new(BindErrorKind::Syntax).with_message(err.message);
        match err.position {
            Some(pos) => error.with_span(pos, pos + 1),
            None => error,
        }
    }
}

/// Byte range of a node within the expression source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Undefined => write!(f, "undefined"),
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<ASTNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Named(String),
    Computed(ASTNode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    KeyValue { key: PropertyKey, value: ASTNode },
    Spread(ASTNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<String>,
    pub body: ArrowBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expression(Box<ASTNode>),
    Block(Vec<Statement>),
}

/// The different types of AST nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(LiteralValue),
    Identifier(String),
    Template {
        quasis: Vec<String>,
        expressions: Vec<ASTNode>,
    },
    Array(Vec<ASTNode>),
    Object(Vec<ObjectProperty>),
    /// `...expr`; only valid inside array literals and call arguments.
    Spread(Box<ASTNode>),
    Member {
        object: Box<ASTNode>,
        property: MemberProperty,
        optional: bool,
    },
    Call {
        callee: Box<ASTNode>,
        args: Vec<ASTNode>,
        optional: bool,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Conditional {
        test: Box<ASTNode>,
        consequent: Box<ASTNode>,
        alternate: Box<ASTNode>,
    },
    /// Assignment to a local variable (`x = 1`, `x += 1`).
    Assign {
        op: String,
        target: String,
        value: Box<ASTNode>,
    },
    Arrow(Arc<ArrowFunction>),
}

/// An AST node represents a parsed expression element
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub span: Span,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, span: Span) -> Self {
        ASTNode { node_type, span }
    }

    pub fn literal(value: LiteralValue) -> Self {
        Self::new(ASTNodeType::Literal(value), Span::default())
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::new(ASTNodeType::Identifier(name.into()), Span::default())
    }
}

impl Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_type {
            ASTNodeType::Literal(v) => write!(f, "{v}"),
            ASTNodeType::Identifier(name) => write!(f, "{name}"),
            ASTNodeType::Member {
                object,
                property,
                optional,
            } => {
                let dot = if *optional { "?." } else { "." };
                match property {
                    MemberProperty::Named(name) => write!(f, "{object}{dot}{name}"),
                    MemberProperty::Computed(expr) if *optional => write!(f, "{object}?.[{expr}]"),
                    MemberProperty::Computed(expr) => write!(f, "{object}[{expr}]"),
                }
            }
            ASTNodeType::Call { callee, .. } => write!(f, "{callee}(...)"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(ASTNode),
    Declaration {
        kind: DeclKind,
        declarators: Vec<(String, Option<ASTNode>)>,
    },
    If {
        test: ASTNode,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    Block(Vec<Statement>),
    Return(Option<ASTNode>),
    Empty,
}

/// A statement list, as found in action handlers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}

fn binary_precedence(op: &str) -> Option<(u8, bool)> {
    // (precedence, right-associative)
    match op {
        "??" => Some((1, false)),
        "||" => Some((2, false)),
        "&&" => Some((3, false)),
        "==" | "!=" | "===" | "!==" => Some((4, false)),
        "<" | "<=" | ">" | ">=" => Some((5, false)),
        "+" | "-" => Some((6, false)),
        "*" | "/" | "%" => Some((7, false)),
        "**" => Some((8, true)),
        _ => None,
    }
}

const ASSIGNMENT_OPS: &[&str] = &["=", "+=", "-=", "*=", "/="];

/// Deepest nesting of expressions and statements a parser accepts by default.
/// Evaluation and reference collection recurse over the tree, so this also
/// bounds their stack use.
pub const MAX_NESTING_DEPTH: usize = 64;

/// A parser for converting tokens into an AST.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    last_end: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
            last_end: 0,
            depth: 0,
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Tokenize `source`, shifting every span by `offset`.
    pub fn from_source(source: &str, offset: usize) -> Result<Self, ParserError> {
        let mut tokens = Tokenizer::new(source)?.items;
        if offset > 0 {
            for token in &mut tokens {
                token.start += offset;
                token.end += offset;
            }
        }
        Ok(Self::new(tokens))
    }

    /// Parse a single expression; trailing semicolons are tolerated.
    pub fn parse_expression_only(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(self.error_here("Unexpected end of input"));
        }
        let ast = self.parse_expression()?;
        while self.eat_punct(";") {}
        if let Some(token) = self.peek() {
            return Err(ParserError {
                message: format!("Unexpected token '{}'", token.value),
                position: Some(token.start),
            });
        }
        Ok(ast)
    }

    pub fn parse_program(&mut self) -> Result<Program, ParserError> {
        let mut body = Vec::new();
        while self.peek().is_some() {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    /* ─────────────────────────── token helpers ─────────────────────────── */

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.position + ahead)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned()?;
        self.position += 1;
        self.last_end = token.end;
        Some(token)
    }

    fn bump(&mut self) -> Result<Token, ParserError> {
        self.advance()
            .ok_or_else(|| self.error_here("Unexpected end of input"))
    }

    fn check_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.check_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Token, ParserError> {
        if self.check_punct(punct) {
            Ok(self.bump()?)
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ParserError {
        match self.peek() {
            Some(token) => ParserError {
                message: format!("Unexpected token '{}'", token.value),
                position: Some(token.start),
            },
            None => self.error_here("Unexpected end of input"),
        }
    }

    fn error_here(&self, message: &str) -> ParserError {
        ParserError {
            message: message.to_string(),
            position: Some(self.last_end),
        }
    }

    /// Open one nesting level. Nesting that is too deep is a syntax error,
    /// not a stack overflow.
    fn enter(&mut self) -> Result<(), ParserError> {
        if self.depth >= self.max_depth {
            return Err(ParserError {
                message: "Expression nested too deeply".to_string(),
                position: Some(self.start_of_next()),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn start_of_next(&self) -> usize {
        self.peek().map(|t| t.start).unwrap_or(self.last_end)
    }

    fn finish(&self, node_type: ASTNodeType, start: usize) -> ASTNode {
        ASTNode::new(
            node_type,
            Span {
                start,
                end: self.last_end,
            },
        )
    }

    /// Identifier, or a keyword used as a property name (`a.default`, `{ if: 1 }`).
    fn expect_property_name(&mut self) -> Result<String, ParserError> {
        match self.peek() {
            Some(t) if matches!(t.token_type, TokenType::Identifier | TokenType::Keyword) => {
                Ok(self.bump()?.value)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParserError> {
        match self.peek() {
            Some(t) if t.token_type == TokenType::Identifier => {
                Ok(self.bump()?.value)
            }
            _ => Err(self.unexpected()),
        }
    }

    /* ───────────────────────────── statements ──────────────────────────── */

    fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        self.enter()?;
        let statement = self.statement_body();
        self.leave(1);
        statement
    }

    fn statement_body(&mut self) -> Result<Statement, ParserError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        if token.is_punct("{") {
            self.advance();
            return Ok(Statement::Block(self.parse_block_body()?));
        }
        if token.is_punct(";") {
            self.advance();
            return Ok(Statement::Empty);
        }
        if token.token_type == TokenType::Keyword {
            match token.value.as_str() {
                "let" | "const" | "var" => return self.parse_declaration(),
                "if" => return self.parse_if(),
                "return" => {
                    self.advance();
                    let value = match self.peek() {
                        None => None,
                        Some(t) if t.is_punct(";") || t.is_punct("}") => None,
                        Some(_) => Some(self.parse_expression()?),
                    };
                    self.eat_punct(";");
                    return Ok(Statement::Return(value));
                }
                _ => {}
            }
        }

        let expr = self.parse_expression()?;
        self.eat_punct(";");
        Ok(Statement::Expression(expr))
    }

    /// Statements up to and including the closing `}`.
    fn parse_block_body(&mut self) -> Result<Vec<Statement>, ParserError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.unexpected()),
                Some(t) if t.is_punct("}") => {
                    self.advance();
                    return Ok(body);
                }
                Some(_) => body.push(self.parse_statement()?),
            }
        }
    }

    fn parse_declaration(&mut self) -> Result<Statement, ParserError> {
        let keyword = self.bump()?;
        let kind = match keyword.value.as_str() {
            "let" => DeclKind::Let,
            "const" => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                if kind == DeclKind::Const {
                    return Err(self.error_here("Missing initializer in const declaration"));
                }
                None
            };
            declarators.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
        Ok(Statement::Declaration { kind, declarators })
    }

    fn parse_if(&mut self) -> Result<Statement, ParserError> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.peek().is_some_and(|t| t.is_keyword("else")) {
            self.advance();
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

    /* ──────────────────────────── expressions ──────────────────────────── */

    fn parse_expression(&mut self) -> Result<ASTNode, ParserError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<ASTNode, ParserError> {
        self.enter()?;
        let expr = self.assignment_body();
        self.leave(1);
        expr
    }

    fn assignment_body(&mut self) -> Result<ASTNode, ParserError> {
        if self.is_arrow_start() {
            return self.parse_arrow();
        }
        let start = self.start_of_next();
        let left = self.parse_conditional()?;

        let op = match self.peek() {
            Some(t) if t.token_type == TokenType::Punctuator
                && ASSIGNMENT_OPS.contains(&t.value.as_str()) =>
            {
                t.value.clone()
            }
            _ => return Ok(left),
        };
        let ASTNodeType::Identifier(target) = &left.node_type else {
            return Err(ParserError {
                message: "Invalid left-hand side in assignment".to_string(),
                position: Some(left.span.start),
            });
        };
        let target = target.clone();
        self.advance();
        let value = self.parse_assignment()?;
        Ok(self.finish(
            ASTNodeType::Assign {
                op,
                target,
                value: Box::new(value),
            },
            start,
        ))
    }

    fn parse_conditional(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let test = self.parse_binary_op(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(self.finish(
            ASTNodeType::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            start,
        ))
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let mut left = self.parse_unary_op()?;
        // Each operator folded in deepens the tree by one.
        let mut levels = 0;

        loop {
            let Some(token) = self.peek() else { break };
            if token.token_type != TokenType::Punctuator {
                break;
            }
            let Some((precedence, right_assoc)) = binary_precedence(&token.value) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.enter()?;
            levels += 1;
            let op = self.bump()?.value;
            let next_min = if right_assoc { precedence } else { precedence + 1 };
            let right = self.parse_binary_op(next_min)?;
            left = self.finish(
                ASTNodeType::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
            );
        }

        self.leave(levels);
        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let is_unary = self.peek().is_some_and(|t| {
            t.is_punct("!") || t.is_punct("-") || t.is_punct("+") || t.is_keyword("typeof")
        });
        if is_unary {
            let op = self.bump()?.value;
            self.enter()?;
            let expr = self.parse_unary_op();
            self.leave(1);
            let expr = expr?;
            return Ok(self.finish(
                ASTNodeType::UnaryOp {
                    op,
                    expr: Box::new(expr),
                },
                start,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let mut expr = self.parse_primary()?;
        let mut levels = 0;

        loop {
            if !self.peek().is_some_and(|t| {
                t.is_punct(".") || t.is_punct("?.") || t.is_punct("[") || t.is_punct("(")
            }) {
                break;
            }
            self.enter()?;
            levels += 1;
            if self.eat_punct(".") {
                let name = self.expect_property_name()?;
                expr = self.finish(
                    ASTNodeType::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Named(name),
                        optional: false,
                    },
                    start,
                );
            } else if self.eat_punct("?.") {
                expr = if self.eat_punct("(") {
                    let args = self.parse_arguments()?;
                    self.finish(
                        ASTNodeType::Call {
                            callee: Box::new(expr),
                            args,
                            optional: true,
                        },
                        start,
                    )
                } else if self.eat_punct("[") {
                    let property = self.parse_expression()?;
                    self.expect_punct("]")?;
                    self.finish(
                        ASTNodeType::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Computed(Box::new(property)),
                            optional: true,
                        },
                        start,
                    )
                } else {
                    let name = self.expect_property_name()?;
                    self.finish(
                        ASTNodeType::Member {
                            object: Box::new(expr),
                            property: MemberProperty::Named(name),
                            optional: true,
                        },
                        start,
                    )
                };
            } else if self.eat_punct("[") {
                let property = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = self.finish(
                    ASTNodeType::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Computed(Box::new(property)),
                        optional: false,
                    },
                    start,
                );
            } else if self.eat_punct("(") {
                let args = self.parse_arguments()?;
                expr = self.finish(
                    ASTNodeType::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    },
                    start,
                );
            }
        }

        self.leave(levels);
        Ok(expr)
    }

    /// Arguments after an already-consumed `(`, through the closing `)`.
    fn parse_arguments(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut args = Vec::new();
        loop {
            if self.eat_punct(")") {
                return Ok(args);
            }
            args.push(self.parse_element()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                return Ok(args);
            }
        }
    }

    /// An array element or call argument, which may be a spread.
    fn parse_element(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        if self.eat_punct("...") {
            let inner = self.parse_assignment()?;
            return Ok(self.finish(ASTNodeType::Spread(Box::new(inner)), start));
        }
        self.parse_assignment()
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let Some(token) = self.advance() else {
            return Err(self.error_here("Unexpected end of input"));
        };

        match token.token_type {
            TokenType::Number => {
                let value = token.value.parse::<f64>().map_err(|_| ParserError {
                    message: format!("Invalid number '{}'", token.value),
                    position: Some(token.start),
                })?;
                Ok(self.finish(ASTNodeType::Literal(LiteralValue::Number(value)), start))
            }
            TokenType::String => Ok(self.finish(
                ASTNodeType::Literal(LiteralValue::String(token.value)),
                start,
            )),
            TokenType::Template => self.parse_template(&token),
            TokenType::Identifier => Ok(self.finish(ASTNodeType::Identifier(token.value), start)),
            TokenType::Keyword => {
                let literal = match token.value.as_str() {
                    "true" => LiteralValue::Boolean(true),
                    "false" => LiteralValue::Boolean(false),
                    "null" => LiteralValue::Null,
                    "undefined" => LiteralValue::Undefined,
                    _ => {
                        return Err(ParserError {
                            message: format!("Unexpected token '{}'", token.value),
                            position: Some(token.start),
                        });
                    }
                };
                Ok(self.finish(ASTNodeType::Literal(literal), start))
            }
            TokenType::Punctuator => match token.value.as_str() {
                "(" => {
                    let expr = self.parse_expression()?;
                    self.expect_punct(")")?;
                    Ok(expr)
                }
                "[" => {
                    let mut items = Vec::new();
                    loop {
                        if self.eat_punct("]") {
                            break;
                        }
                        items.push(self.parse_element()?);
                        if !self.eat_punct(",") {
                            self.expect_punct("]")?;
                            break;
                        }
                    }
                    Ok(self.finish(ASTNodeType::Array(items), start))
                }
                "{" => self.parse_object(start),
                _ => Err(ParserError {
                    message: format!("Unexpected token '{}'", token.value),
                    position: Some(token.start),
                }),
            },
        }
    }

    fn parse_object(&mut self, start: usize) -> Result<ASTNode, ParserError> {
        let mut properties = Vec::new();
        loop {
            if self.eat_punct("}") {
                break;
            }
            if self.eat_punct("...") {
                properties.push(ObjectProperty::Spread(self.parse_assignment()?));
            } else if self.eat_punct("[") {
                let key = self.parse_assignment()?;
                self.expect_punct("]")?;
                self.expect_punct(":")?;
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty::KeyValue {
                    key: PropertyKey::Computed(key),
                    value,
                });
            } else {
                let Some(token) = self.advance() else {
                    return Err(self.error_here("Unexpected end of input"));
                };
                let key_start = token.start;
                let shorthand_ok = token.token_type == TokenType::Identifier;
                let key = match token.token_type {
                    TokenType::Identifier | TokenType::Keyword | TokenType::String => token.value,
                    TokenType::Number => match token.value.parse::<f64>() {
                        Ok(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
                        Ok(n) => n.to_string(),
                        Err(_) => token.value,
                    },
                    _ => {
                        return Err(ParserError {
                            message: format!("Unexpected token '{}'", token.value),
                            position: Some(token.start),
                        });
                    }
                };
                let value = if self.eat_punct(":") {
                    self.parse_assignment()?
                } else if shorthand_ok {
                    self.finish(ASTNodeType::Identifier(key.clone()), key_start)
                } else {
                    return Err(self.unexpected());
                };
                properties.push(ObjectProperty::KeyValue {
                    key: PropertyKey::Named(key),
                    value,
                });
            }
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(self.finish(ASTNodeType::Object(properties), start))
    }

    fn parse_template(&mut self, token: &Token) -> Result<ASTNode, ParserError> {
        let chunks = split_template_literal(&token.value).map_err(|e| ParserError {
            message: e.message,
            position: Some(token.start + 1 + e.pos),
        })?;
        let mut quasis = vec![String::new()];
        let mut expressions = Vec::new();
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => {
                    if let Some(last) = quasis.last_mut() {
                        last.push_str(&text);
                    }
                }
                TemplateChunk::Expr(source, offset) => {
                    let mut sub = Parser::from_source(&source, token.start + 1 + offset)?
                        .with_max_depth(self.max_depth.saturating_sub(self.depth));
                    expressions.push(sub.parse_expression_only()?);
                    quasis.push(String::new());
                }
            }
        }
        Ok(ASTNode::new(
            ASTNodeType::Template {
                quasis,
                expressions,
            },
            Span {
                start: token.start,
                end: token.end,
            },
        ))
    }

    /* ─────────────────────────── arrow functions ───────────────────────── */

    fn is_arrow_start(&self) -> bool {
        match self.peek() {
            Some(t) if t.token_type == TokenType::Identifier => {
                self.peek_at(1).is_some_and(|n| n.is_punct("=>"))
            }
            Some(t) if t.is_punct("(") => {
                let mut depth = 0usize;
                let mut i = self.position;
                while let Some(tok) = self.tokens.get(i) {
                    if tok.is_punct("(") {
                        depth += 1;
                    } else if tok.is_punct(")") {
                        depth -= 1;
                        if depth == 0 {
                            return self.tokens.get(i + 1).is_some_and(|n| n.is_punct("=>"));
                        }
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<ASTNode, ParserError> {
        let start = self.start_of_next();
        let mut params = Vec::new();
        if self.eat_punct("(") {
            loop {
                if self.eat_punct(")") {
                    break;
                }
                params.push(self.expect_identifier()?);
                if !self.eat_punct(",") {
                    self.expect_punct(")")?;
                    break;
                }
            }
        } else {
            params.push(self.expect_identifier()?);
        }
        self.expect_punct("=>")?;

        let body = if self.eat_punct("{") {
            ArrowBody::Block(self.parse_block_body()?)
        } else {
            ArrowBody::Expression(Box::new(self.parse_assignment()?))
        };
        Ok(self.finish(
            ASTNodeType::Arrow(Arc::new(ArrowFunction { params, body })),
            start,
        ))
    }
}

/// Parse one expression (the body of a `{{ }}` property binding).
pub fn parse_expression<T: AsRef<str>>(source: T) -> Result<ASTNode, ParserError> {
    Parser::from_source(source.as_ref(), 0)?.parse_expression_only()
}

/// Parse a statement list (the body of an action binding).
pub fn parse_program<T: AsRef<str>>(source: T) -> Result<Program, ParserError> {
    Parser::from_source(source.as_ref(), 0)?.parse_program()
}
