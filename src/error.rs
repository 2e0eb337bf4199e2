//! Error types for the engine

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::JsValue;

/// One frame of a captured call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub source_name: String,
    pub function_name: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function_name.is_empty() {
            write!(f, "    at {}:{}:{}", self.source_name, self.line, self.column)
        } else {
            write!(
                f,
                "    at {} ({}:{}:{})",
                self.function_name, self.source_name, self.line, self.column
            )
        }
    }
}

pub(crate) fn format_stack(stack: &[StackFrame]) -> String {
    stack
        .iter()
        .map(|frame| format!("\n{frame}"))
        .collect::<String>()
}

/// A single compile-time diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub source_name: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Line {}:{} {}",
            self.source_name, self.line, self.column, self.message
        )
    }
}

/// Every diagnostic collected while compiling one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn first(&self) -> Option<&ParseError> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.0.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// An uncaught script exception as seen by the host
#[derive(Debug, Clone)]
pub struct Exception {
    /// The thrown value
    pub value: JsValue,
    /// `ToString` of the value at the time it escaped (`"TypeError: boom"`)
    pub message: String,
    pub stack: Vec<StackFrame>,
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.message, format_stack(&self.stack))
    }
}

/// Payload delivered by `Runtime::interrupt`
pub type InterruptValue = Arc<dyn Any + Send + Sync>;

/// An interrupt reached the running script
#[derive(Clone)]
pub struct Interrupted {
    pub value: Option<InterruptValue>,
    pub stack: Vec<StackFrame>,
}

impl Interrupted {
    /// Downcast the interrupt payload
    pub fn value_as<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupted")
            .field("has_value", &self.value.is_some())
            .field("stack", &self.stack)
            .finish()
    }
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterruptedError{}", format_stack(&self.stack))
    }
}

/// Main error type
#[derive(Debug, Error)]
pub enum JsError {
    /// Lexer, parser and early errors for one compilation
    #[error("SyntaxError: {0}")]
    Parse(ParseErrors),

    #[error("SyntaxError: {message}")]
    SyntaxError { message: String },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("URIError: {message}")]
    UriError { message: String },

    /// A script value in flight through native frames
    #[error("Uncaught {}", .0.display_hint())]
    Thrown(JsValue),

    /// An uncaught throw that reached the host
    #[error("{0}")]
    Exception(Box<Exception>),

    #[error("{0}")]
    Interrupted(Box<Interrupted>),

    #[error("RangeError: Maximum call stack size exceeded{}", format_stack(.stack))]
    StackOverflow { stack: Vec<StackFrame> },
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>) -> Self {
        JsError::SyntaxError {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        JsError::ReferenceError {
            message: message.into(),
        }
    }

    /// `x is not defined`
    pub fn not_defined(name: impl fmt::Display) -> Self {
        JsError::ReferenceError {
            message: format!("{name} is not defined"),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn uri_error(message: impl Into<String>) -> Self {
        JsError::UriError {
            message: message.into(),
        }
    }

    pub fn thrown(value: JsValue) -> Self {
        JsError::Thrown(value)
    }

    /// Interrupts and stack overflows skip every `catch` and `finally`
    pub fn is_uncatchable(&self) -> bool {
        matches!(self, JsError::Interrupted(_) | JsError::StackOverflow { .. })
    }

    /// The thrown value for exceptions that already carry one
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JsError::Thrown(v) => Some(v),
            JsError::Exception(e) => Some(&e.value),
            _ => None,
        }
    }

    /// Stack frames captured for this error, if any
    pub fn stack(&self) -> &[StackFrame] {
        match self {
            JsError::Exception(e) => &e.stack,
            JsError::Interrupted(i) => &i.stack,
            JsError::StackOverflow { stack } => stack,
            _ => &[],
        }
    }
}
