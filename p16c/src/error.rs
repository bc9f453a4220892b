#![allow(unused_assignments)]

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, SourceSpan};
use thiserror::Error;

use crate::ast::Span;

/// Prefix an error message with context for consistent diagnostics.
pub fn format_with_context(context: impl AsRef<str>, message: impl AsRef<str>) -> String {
    let prefix = context.as_ref();
    let message = message.as_ref();
    if prefix.is_empty() {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[derive(Debug, Error, MietteDiagnostic)]
#[error("{message}")]
#[allow(unused)]
pub struct ParseError {
    message: String,
    #[label]
    span: SourceSpan,
    span_raw: Span,
}

impl ParseError {
    pub fn new(message: String, span: Span) -> Self {
        Self {
            message,
            span: (span.start, span.end.saturating_sub(span.start)).into(),
            span_raw: span,
        }
    }

    pub fn with_context(mut self, context: impl AsRef<str>) -> Self {
        self.message = format_with_context(context, &self.message);
        self
    }

    pub fn span(&self) -> Span {
        self.span_raw
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What went wrong while lowering a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unsupported node `{0}`")]
    UnsupportedNode(String),
    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),
    #[error("invalid assignment target: {0}")]
    InvalidTarget(String),
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("undefined name `{0}`")]
    UndefinedName(String),
    #[error("`{name}` expects {expected} {what}, found {found}")]
    ArityMismatch {
        name: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("module `{name}` not found{}", format_reason(.reason))]
    ModuleNotFound {
        name: String,
        reason: Option<String>,
    },
    #[error("error in imported module `{0}`")]
    ImportFailed(String),
    #[error("cannot {0} outside loop")]
    LoopControlOutsideLoop(&'static str),
    #[error("operator `{0}` is not supported here")]
    UnsupportedOperator(String),
    #[error("invalid decorator: {0}")]
    InvalidDecorator(String),
    #[error("invalid function definition: {0}")]
    InvalidFunction(String),
    #[error("`return` outside function")]
    ReturnOutsideFunction,
    #[error("macro `{name}` failed: {message}")]
    Macro { name: String, message: String },
}

fn format_reason(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(" ({reason})"),
        None => String::new(),
    }
}

#[derive(Debug, Error, MietteDiagnostic)]
#[error("{kind}")]
#[allow(unused)]
pub struct CompileError {
    kind: ErrorKind,
    #[label]
    span: SourceSpan,
    span_raw: Span,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Self {
            kind,
            span: (span.start, span.end.saturating_sub(span.start)).into(),
            span_raw: span,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span_raw
    }

    /// Unsupported nodes are reported but never fail a compilation.
    pub fn severity(&self) -> Severity {
        match self.kind {
            ErrorKind::UnsupportedNode(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Failure reported by an extension macro or init hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MacroError(pub String);

impl MacroError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A recorded compile error together with the file it came from.
#[derive(Debug)]
pub struct Diagnostic {
    error: CompileError,
    file: Option<String>,
}

impl Diagnostic {
    pub fn new(error: CompileError, file: Option<String>) -> Self {
        Self { error, file }
    }

    pub fn severity(&self) -> Severity {
        self.error.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn kind(&self) -> &ErrorKind {
        self.error.kind()
    }

    pub fn error(&self) -> &CompileError {
        &self.error
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> u32 {
        self.error.span().line
    }

    pub fn column(&self) -> u32 {
        self.error.span().column
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity())?;
        if let Some(file) = &self.file {
            write!(f, "{file}:")?;
        }
        write!(f, "{}:{} {}", self.line(), self.column(), self.error)
    }
}
