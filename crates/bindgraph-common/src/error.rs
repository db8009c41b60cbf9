//! Binding error representation shared by the parser and the engine.
//!
//! - **`BindErrorKind`** : the canonical set of error classes a binding can raise
//! - **`ErrorContext`**  : lightweight location info (entity, path, source span)
//! - **`BindError`**     : one struct that glues the two together
//!
//! `Display` renders errors the way script runtimes do (`TypeError: ...`), which
//! is also the string stored in the `evaluationErrors` / `validationErrors` trees.

use std::{error::Error, fmt};

/// All recognised binding error classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BindErrorKind {
    Syntax,
    Reference,
    Type,
    Range,
    Cycle,
    Validation,
    Action,
    Internal,
}

impl fmt::Display for BindErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "SyntaxError",
            Self::Reference => "ReferenceError",
            Self::Type => "TypeError",
            Self::Range => "RangeError",
            Self::Cycle => "CycleError",
            Self::Validation => "ValidationError",
            Self::Action => "ActionError",
            Self::Internal => "InternalError",
        })
    }
}

/// Where an error was raised. Everything is optional; the engine fills in
/// entity/path when it records the error, the parser fills in the span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ErrorContext {
    pub entity: Option<String>,
    pub path: Option<String>,
    pub span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindError {
    pub kind: BindErrorKind,
    pub message: Option<String>,
    pub context: Option<ErrorContext>,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl From<BindErrorKind> for BindError {
    fn from(kind: BindErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: None,
        }
    }
}

impl BindError {
    pub fn new(kind: BindErrorKind) -> Self {
        kind.into()
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attach the `entity.path` the error belongs to.
    pub fn with_location(mut self, entity: impl Into<String>, path: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.entity = Some(entity.into());
        ctx.path = Some(path.into());
        self
    }

    /// Attach a byte span inside the binding source.
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.span = Some((start, end));
        self
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(BindErrorKind::Syntax).with_message(msg)
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new(BindErrorKind::Type).with_message(msg)
    }

    pub fn not_defined(name: &str) -> Self {
        Self::new(BindErrorKind::Reference).with_message(format!("{name} is not defined"))
    }

    pub fn cannot_read(property: &str, receiver: &str) -> Self {
        Self::type_error(format!(
            "Cannot read properties of {receiver} (reading '{property}')"
        ))
    }

    pub fn not_a_function(callee: &str) -> Self {
        Self::type_error(format!("{callee} is not a function"))
    }

    /// Message without the kind prefix.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for BindError {}

impl From<BindError> for String {
    fn from(error: BindError) -> Self {
        format!("{error}")
    }
}

impl PartialEq<BindErrorKind> for BindError {
    fn eq(&self, other: &BindErrorKind) -> bool {
        self.kind == *other
    }
}
