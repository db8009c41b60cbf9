use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use bindgraph_common::{BindError, BindErrorKind, PathSegment, PropertyPath};
use bindgraph_parse::{
    ASTNode, ASTNodeType, ArrowBody, DeclKind, LiteralValue, MemberProperty, ObjectProperty,
    Program, PropertyKey, Statement,
};
use serde::{Deserialize, Serialize};

use crate::builtins;
use crate::config::EngineConfig;
use crate::traits::EvaluationContext;
use crate::value::{Function, Scope, Value, format_number};

/// Whether entity actions may be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Property bindings: pure, actions are an error.
    Binding,
    /// Event handlers: action calls are recorded.
    Action,
}

/// A side-effecting call requested by an event handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExecution {
    pub entity_id: String,
    pub action_name: String,
    pub args: Vec<serde_json::Value>,
}

enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'a> {
    pub context: &'a dyn EvaluationContext,
    config: &'a EngineConfig,
    mode: ExecutionMode,
    depth: usize,
    executions: Vec<ActionExecution>,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a dyn EvaluationContext, config: &'a EngineConfig) -> Self {
        Self {
            context,
            config,
            mode: ExecutionMode::Binding,
            depth: 0,
            executions: Vec::new(),
        }
    }

    pub fn for_actions(context: &'a dyn EvaluationContext, config: &'a EngineConfig) -> Self {
        Self {
            mode: ExecutionMode::Action,
            ..Self::new(context, config)
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Evaluate a binding expression.
    pub fn evaluate(&mut self, ast: &ASTNode) -> Result<Value, BindError> {
        let scope = Scope::root();
        self.eval(ast, &scope)
    }

    /// Run a statement list; the result is the value of a top-level `return`.
    pub fn execute(&mut self, program: &Program) -> Result<Value, BindError> {
        let scope = Scope::root();
        match self.exec_block(&program.body, &scope)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
        }
    }

    /// Action calls recorded so far, in call order.
    pub fn take_executions(&mut self) -> Vec<ActionExecution> {
        std::mem::take(&mut self.executions)
    }

    /* ───────────────────────────── statements ──────────────────────────── */

    fn exec_block(&mut self, body: &[Statement], scope: &Rc<Scope>) -> Result<Flow, BindError> {
        for stmt in body {
            if let Flow::Return(value) = self.exec_stmt(stmt, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Statement, scope: &Rc<Scope>) -> Result<Flow, BindError> {
        match stmt {
            Statement::Expression(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Statement::Declaration { kind, declarators } => {
                for (name, init) in declarators {
                    let value = match init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    if !scope.declare(name, value.clone(), *kind != DeclKind::Const) {
                        if *kind == DeclKind::Var {
                            scope.assign(name, value)?;
                        } else {
                            return Err(BindError::syntax(format!(
                                "Identifier '{name}' has already been declared"
                            )));
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec_stmt(consequent, &Scope::child(scope))
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, &Scope::child(scope))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::Block(body) => self.exec_block(body, &Scope::child(scope)),
            Statement::Return(expr) => Ok(Flow::Return(match expr {
                Some(expr) => self.eval(expr, scope)?,
                None => Value::Undefined,
            })),
            Statement::Empty => Ok(Flow::Normal),
        }
    }

    /* ──────────────────────────── expressions ──────────────────────────── */

    fn eval(&mut self, node: &ASTNode, scope: &Rc<Scope>) -> Result<Value, BindError> {
        match &node.node_type {
            ASTNodeType::Literal(lit) => Ok(match lit {
                LiteralValue::Undefined => Value::Undefined,
                LiteralValue::Null => Value::Null,
                LiteralValue::Boolean(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::string(s),
            }),
            ASTNodeType::Identifier(name) => self.lookup(name, scope),
            ASTNodeType::Template {
                quasis,
                expressions,
            } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(i) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                }
                Ok(Value::from(out))
            }
            ASTNodeType::Array(items) => Ok(Value::array(self.eval_elements(items, scope)?)),
            ASTNodeType::Object(props) => self.eval_object(props, scope),
            ASTNodeType::Spread(_) => Err(BindError::syntax("Unexpected token '...'")),
            ASTNodeType::Member { .. } | ASTNodeType::Call { .. } => {
                Ok(self.eval_chain(node, scope)?.unwrap_or(Value::Undefined))
            }
            ASTNodeType::UnaryOp { op, expr } => {
                if op == "typeof" {
                    if let ASTNodeType::Identifier(name) = &expr.node_type {
                        return Ok(match self.lookup(name, scope) {
                            Ok(value) => Value::string(value.type_of()),
                            Err(_) => Value::string("undefined"),
                        });
                    }
                }
                let value = self.eval(expr, scope)?;
                Ok(match op.as_str() {
                    "!" => Value::Bool(!value.truthy()),
                    "-" => Value::Number(-value.to_number()),
                    "+" => Value::Number(value.to_number()),
                    "typeof" => Value::string(value.type_of()),
                    other => {
                        return Err(BindError::syntax(format!("Unexpected token '{other}'")));
                    }
                })
            }
            ASTNodeType::BinaryOp { op, left, right } => {
                let lhs = self.eval(left, scope)?;
                match op.as_str() {
                    "&&" if !lhs.truthy() => Ok(lhs),
                    "||" if lhs.truthy() => Ok(lhs),
                    "??" if !lhs.is_nullish() => Ok(lhs),
                    "&&" | "||" | "??" => self.eval(right, scope),
                    _ => {
                        let rhs = self.eval(right, scope)?;
                        binary_op(op, &lhs, &rhs)
                    }
                }
            }
            ASTNodeType::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ASTNodeType::Assign { op, target, value } => {
                let mut value = self.eval(value, scope)?;
                if op != "=" {
                    let current = self.lookup(target, scope)?;
                    value = binary_op(op.trim_end_matches('='), &current, &value)?;
                }
                if scope.assign(target, value.clone())? {
                    Ok(value)
                } else if self.context.entity_value(target).is_some() {
                    Err(BindError::type_error(format!(
                        "Cannot assign to read only property '{target}'"
                    )))
                } else {
                    Err(BindError::not_defined(target))
                }
            }
            ASTNodeType::Arrow(func) => Ok(Value::Function(Rc::new(Function::Closure {
                func: Arc::clone(func),
                env: Rc::clone(scope),
            }))),
        }
    }

    fn eval_elements(
        &mut self,
        items: &[ASTNode],
        scope: &Rc<Scope>,
    ) -> Result<Vec<Value>, BindError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let ASTNodeType::Spread(inner) = &item.node_type {
                let spread = self.eval(inner, scope)?;
                match spread {
                    Value::Array(values) => out.extend(values.iter().cloned()),
                    Value::String(s) => out.extend(s.chars().map(|c| Value::from(c.to_string()))),
                    other => {
                        return Err(BindError::type_error(format!(
                            "{} is not iterable",
                            other.to_js_string()
                        )));
                    }
                }
            } else {
                out.push(self.eval(item, scope)?);
            }
        }
        Ok(out)
    }

    fn eval_object(
        &mut self,
        props: &[ObjectProperty],
        scope: &Rc<Scope>,
    ) -> Result<Value, BindError> {
        let mut map = BTreeMap::new();
        for prop in props {
            match prop {
                ObjectProperty::KeyValue { key, value } => {
                    let key = match key {
                        PropertyKey::Named(name) => name.clone(),
                        PropertyKey::Computed(expr) => property_key(&self.eval(expr, scope)?),
                    };
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                ObjectProperty::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Object(source) => {
                        map.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    Value::Array(items) => {
                        map.extend(
                            items
                                .iter()
                                .enumerate()
                                .map(|(i, v)| (i.to_string(), v.clone())),
                        );
                    }
                    Value::String(s) => {
                        map.extend(
                            s.chars()
                                .enumerate()
                                .map(|(i, c)| (i.to_string(), Value::from(c.to_string()))),
                        );
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(map))
    }

    /// Evaluate a member/call chain. `None` means an optional link met a
    /// nullish value and the rest of the chain was skipped.
    fn eval_chain(
        &mut self,
        node: &ASTNode,
        scope: &Rc<Scope>,
    ) -> Result<Option<Value>, BindError> {
        match &node.node_type {
            ASTNodeType::Member {
                object,
                property,
                optional,
            } => {
                if let Some(value) = self.read_context_chain(node, scope) {
                    return Ok(Some(value));
                }
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                Ok(Some(self.get_property(&target, &key)?))
            }
            ASTNodeType::Call {
                callee,
                args,
                optional,
            } => {
                let func = match &callee.node_type {
                    ASTNodeType::Member {
                        object,
                        property,
                        optional: member_optional,
                    } => {
                        let Some(target) = self.eval_chain(object, scope)? else {
                            return Ok(None);
                        };
                        if *member_optional && target.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.member_key(property, scope)?;
                        self.get_property(&target, &key)?
                    }
                    _ => match self.eval_chain(callee, scope)? {
                        Some(func) => func,
                        None => return Ok(None),
                    },
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                if !matches!(func, Value::Function(_)) {
                    return Err(BindError::not_a_function(&callee.to_string()));
                }
                let args = self.eval_elements(args, scope)?;
                Ok(Some(self.call_function(&func, args)?))
            }
            _ => Ok(Some(self.eval(node, scope)?)),
        }
    }

    /// Read `Entity.a.b[0]` straight from the context tree without converting
    /// the whole entity. Falls back (returns `None`) whenever the chain is not
    /// a plain static read of an existing value.
    fn read_context_chain(&self, node: &ASTNode, scope: &Rc<Scope>) -> Option<Value> {
        let mut segments = Vec::new();
        let mut current = node;
        loop {
            match &current.node_type {
                ASTNodeType::Member {
                    object,
                    property,
                    optional: false,
                } => {
                    segments.push(match property {
                        MemberProperty::Named(name) => PathSegment::Key(name.clone()),
                        MemberProperty::Computed(expr) => match &expr.node_type {
                            ASTNodeType::Literal(LiteralValue::String(s)) => {
                                PathSegment::Key(s.clone())
                            }
                            ASTNodeType::Literal(LiteralValue::Number(n))
                                if *n >= 0.0 && n.fract() == 0.0 =>
                            {
                                PathSegment::Index(*n as usize)
                            }
                            _ => return None,
                        },
                    });
                    current = object;
                }
                ASTNodeType::Identifier(head) => {
                    if scope.is_declared(head) {
                        return None;
                    }
                    segments.reverse();
                    let path = PropertyPath::from_segments(segments);
                    let first = path.first_key()?;
                    if first == "length" || self.context.actions_of(head).iter().any(|a| a == first)
                    {
                        return None;
                    }
                    let found = self.context.resolve_path(head, &path)?;
                    return Some(Value::from(found));
                }
                _ => return None,
            }
        }
    }

    fn member_key(
        &mut self,
        property: &MemberProperty,
        scope: &Rc<Scope>,
    ) -> Result<String, BindError> {
        match property {
            MemberProperty::Named(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => Ok(property_key(&self.eval(expr, scope)?)),
        }
    }

    pub fn get_property(&self, target: &Value, key: &str) -> Result<Value, BindError> {
        match target {
            Value::Undefined => Err(BindError::cannot_read(key, "undefined")),
            Value::Null => Err(BindError::cannot_read(key, "null")),
            Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Undefined)),
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.len() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(items.get(index).cloned().unwrap_or(Value::Undefined));
                }
                Ok(builtins::bind_method(target, key).unwrap_or(Value::Undefined))
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::from(c.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                Ok(builtins::bind_method(target, key).unwrap_or(Value::Undefined))
            }
            Value::Number(_) | Value::Bool(_) => {
                Ok(builtins::bind_method(target, key).unwrap_or(Value::Undefined))
            }
            Value::Function(func) => Ok(match key {
                "name" => Value::from(func.name()),
                _ => Value::Undefined,
            }),
        }
    }

    fn lookup(&self, name: &str, scope: &Rc<Scope>) -> Result<Value, BindError> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        if let Some(tree) = self.context.entity_value(name) {
            return Ok(self.entity_value(name, tree));
        }
        builtins::global(name).ok_or_else(|| BindError::not_defined(name))
    }

    /// Convert an entity tree, exposing its actions as callable members.
    fn entity_value(&self, id: &str, tree: &serde_json::Value) -> Value {
        let value = Value::from(tree);
        let actions = self.context.actions_of(id);
        if actions.is_empty() {
            return value;
        }
        let Value::Object(map) = value else {
            return value;
        };
        let mut map = Rc::unwrap_or_clone(map);
        for action in actions {
            map.entry(action.clone()).or_insert_with(|| {
                Value::Function(Rc::new(Function::Action {
                    entity: id.to_string(),
                    action: action.clone(),
                }))
            });
        }
        Value::object(map)
    }

    /* ─────────────────────────────── calls ─────────────────────────────── */

    pub fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, BindError> {
        let Value::Function(func) = callee else {
            return Err(BindError::not_a_function(&callee.to_js_string()));
        };
        if self.depth >= self.config.max_call_depth {
            return Err(BindError::new(BindErrorKind::Range)
                .with_message("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        let result = self.invoke(func, args);
        self.depth -= 1;
        result
    }

    fn invoke(&mut self, func: &Function, args: Vec<Value>) -> Result<Value, BindError> {
        match func {
            Function::Closure { func, env } => {
                let scope = Scope::child(env);
                let mut args = args.into_iter();
                for param in &func.params {
                    scope.declare(param, args.next().unwrap_or(Value::Undefined), true);
                }
                match &func.body {
                    ArrowBody::Expression(expr) => self.eval(expr, &scope),
                    ArrowBody::Block(body) => match self.exec_block(body, &scope)? {
                        Flow::Return(value) => Ok(value),
                        Flow::Normal => Ok(Value::Undefined),
                    },
                }
            }
            Function::Native { call, .. } => call(self, args),
            Function::Method { receiver, name } => {
                builtins::call_method(self, receiver, name, args)
            }
            Function::Action { entity, action } => match self.mode {
                ExecutionMode::Action => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(entity = %entity, action = %action, "action requested");
                    self.executions.push(ActionExecution {
                        entity_id: entity.clone(),
                        action_name: action.clone(),
                        args: args.iter().map(Value::to_json).collect(),
                    });
                    Ok(Value::Undefined)
                }
                ExecutionMode::Binding => Err(BindError::new(BindErrorKind::Action)
                    .with_message(format!(
                        "{entity}.{action}() can only be called from an event handler"
                    ))),
            },
        }
    }
}

/// Property name for a computed key: integral numbers print without a fraction.
fn property_key(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) => {
            Value::from(value.to_js_string())
        }
        other => other.clone(),
    }
}

pub fn binary_op(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, BindError> {
    Ok(match op {
        "+" => {
            let (l, r) = (to_primitive(lhs), to_primitive(rhs));
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                Value::from(format!("{}{}", l.to_js_string(), r.to_js_string()))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        "-" => Value::Number(lhs.to_number() - rhs.to_number()),
        "*" => Value::Number(lhs.to_number() * rhs.to_number()),
        "/" => Value::Number(lhs.to_number() / rhs.to_number()),
        "%" => Value::Number(lhs.to_number() % rhs.to_number()),
        "**" => Value::Number(lhs.to_number().powf(rhs.to_number())),
        "===" => Value::Bool(lhs.strict_equals(rhs)),
        "!==" => Value::Bool(!lhs.strict_equals(rhs)),
        "==" => Value::Bool(lhs.loose_equals(rhs)),
        "!=" => Value::Bool(!lhs.loose_equals(rhs)),
        "<" | "<=" | ">" | ">=" => {
            let (l, r) = (to_primitive(lhs), to_primitive(rhs));
            let ordering = match (&l, &r) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            Value::Bool(match ordering {
                None => false,
                Some(ord) => match op {
                    "<" => ord.is_lt(),
                    "<=" => ord.is_le(),
                    ">" => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            })
        }
        other => return Err(BindError::syntax(format!("Unexpected token '{other}'"))),
    })
}
