//! Scope-aware extraction of identifier member chains.
//!
//! Every free identifier in an expression is reported together with the
//! longest static property path that follows it (`a.b[0].c`). Names bound by
//! arrow parameters or `let`/`const`/`var` declarations are shadowed and never
//! reported.

use std::fmt;

use bindgraph_common::{PathSegment, PropertyPath};
use rustc_hash::FxHashSet;

use crate::parser::{
    ASTNode, ASTNodeType, ArrowBody, LiteralValue, MemberProperty, ObjectProperty, Program,
    PropertyKey, Statement,
};

/// A free identifier followed by a static member path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceChain {
    pub head: String,
    pub path: PropertyPath,
}

impl ReferenceChain {
    /// Path permutations of the member part, shortest first (`b`, `b.c`, ...).
    pub fn permutations(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        self.path.prefixes()
    }
}

impl fmt::Display for ReferenceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.head)
        } else {
            write!(f, "{}", bindgraph_common::node_key(&self.head, &self.path))
        }
    }
}

/// Collect the free reference chains of one expression, in source order.
pub fn collect_reference_chains(ast: &ASTNode) -> Vec<ReferenceChain> {
    let mut walker = ScopeWalker::default();
    walker.visit_expr(ast);
    walker.out
}

/// Collect the free reference chains of a statement list.
pub fn collect_program_references(program: &Program) -> Vec<ReferenceChain> {
    let mut walker = ScopeWalker::default();
    walker.visit_block(&program.body);
    walker.out
}

enum Link<'a> {
    Named(&'a str),
    Computed(&'a ASTNode),
    Call(&'a [ASTNode]),
}

#[derive(Default)]
struct ScopeWalker {
    scopes: Vec<FxHashSet<String>>,
    out: Vec<ReferenceChain>,
    seen: FxHashSet<ReferenceChain>,
}

impl ScopeWalker {
    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn record(&mut self, head: &str, path: PropertyPath) {
        if self.is_local(head) {
            return;
        }
        let chain = ReferenceChain {
            head: head.to_string(),
            path,
        };
        if self.seen.insert(chain.clone()) {
            self.out.push(chain);
        }
    }

    /// Visit a statement list in a fresh scope holding its declarations.
    fn visit_block(&mut self, body: &[Statement]) {
        let mut declared = FxHashSet::default();
        for stmt in body {
            if let Statement::Declaration { declarators, .. } = stmt {
                declared.extend(declarators.iter().map(|(name, _)| name.clone()));
            }
        }
        self.scopes.push(declared);
        for stmt in body {
            self.visit_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn visit_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(expr) => self.visit_expr(expr),
            Statement::Declaration { declarators, .. } => {
                for (_, init) in declarators {
                    if let Some(init) = init {
                        self.visit_expr(init);
                    }
                }
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                self.visit_expr(test);
                self.visit_nested(consequent);
                if let Some(alt) = alternate {
                    self.visit_nested(alt);
                }
            }
            Statement::Block(body) => self.visit_block(body),
            Statement::Return(Some(expr)) => self.visit_expr(expr),
            Statement::Return(None) | Statement::Empty => {}
        }
    }

    fn visit_nested(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(body) => self.visit_block(body),
            other => self.visit_block(std::slice::from_ref(other)),
        }
    }

    fn visit_expr(&mut self, node: &ASTNode) {
        match &node.node_type {
            ASTNodeType::Literal(_) => {}
            ASTNodeType::Identifier(name) => self.record(name, PropertyPath::root()),
            ASTNodeType::Template { expressions, .. } => {
                for expr in expressions {
                    self.visit_expr(expr);
                }
            }
            ASTNodeType::Array(items) => {
                for item in items {
                    self.visit_expr(item);
                }
            }
            ASTNodeType::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectProperty::KeyValue { key, value } => {
                            if let PropertyKey::Computed(key) = key {
                                self.visit_expr(key);
                            }
                            self.visit_expr(value);
                        }
                        ObjectProperty::Spread(expr) => self.visit_expr(expr),
                    }
                }
            }
            ASTNodeType::Spread(inner) => self.visit_expr(inner),
            ASTNodeType::Member { .. } | ASTNodeType::Call { .. } => self.visit_chain(node),
            ASTNodeType::UnaryOp { expr, .. } => self.visit_expr(expr),
            ASTNodeType::BinaryOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            ASTNodeType::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.visit_expr(test);
                self.visit_expr(consequent);
                self.visit_expr(alternate);
            }
            // The target of an assignment is a local write, not a read.
            ASTNodeType::Assign { value, .. } => self.visit_expr(value),
            ASTNodeType::Arrow(func) => {
                self.scopes.push(func.params.iter().cloned().collect());
                match &func.body {
                    ArrowBody::Expression(expr) => self.visit_expr(expr),
                    ArrowBody::Block(body) => self.visit_block(body),
                }
                self.scopes.pop();
            }
        }
    }

    /// Flatten a member/call chain and record its static prefix.
    ///
    /// The path stops at the first call or at a computed segment that is not
    /// a string or non-negative integer literal. Optional links (`?.`) are
    /// kept: they only change what happens when the value is missing.
    fn visit_chain(&mut self, node: &ASTNode) {
        let mut links = Vec::new();
        let mut base = node;
        loop {
            match &base.node_type {
                ASTNodeType::Member {
                    object, property, ..
                } => {
                    links.push(match property {
                        MemberProperty::Named(name) => Link::Named(name),
                        MemberProperty::Computed(expr) => Link::Computed(expr),
                    });
                    base = object;
                }
                ASTNodeType::Call { callee, args, .. } => {
                    links.push(Link::Call(args));
                    base = callee;
                }
                _ => break,
            }
        }
        links.reverse();

        let mut static_prefix = true;
        let mut path = PropertyPath::root();
        for link in &links {
            if !static_prefix {
                break;
            }
            match link {
                Link::Named(name) => path.push(PathSegment::Key(name.to_string())),
                Link::Computed(expr) => match static_segment(expr) {
                    Some(segment) => path.push(segment),
                    None => static_prefix = false,
                },
                Link::Call(_) => static_prefix = false,
            }
        }

        match &base.node_type {
            ASTNodeType::Identifier(name) => self.record(name, path),
            _ => self.visit_expr(base),
        }

        for link in &links {
            match link {
                Link::Named(_) => {}
                Link::Computed(expr) => self.visit_expr(expr),
                Link::Call(args) => {
                    for arg in args.iter() {
                        self.visit_expr(arg);
                    }
                }
            }
        }
    }
}

fn static_segment(expr: &ASTNode) -> Option<PathSegment> {
    match &expr.node_type {
        ASTNodeType::Literal(LiteralValue::String(s)) => Some(PathSegment::Key(s.clone())),
        ASTNodeType::Literal(LiteralValue::Number(n))
            if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 =>
        {
            Some(PathSegment::Index(*n as usize))
        }
        _ => None,
    }
}
