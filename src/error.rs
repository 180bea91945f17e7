use std::fmt;
use thiserror::Error;

/// Where a statement came from. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: String,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: usize) -> Self {
        Self {
            filename: filename.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

/// Errors that abort the compilation unit.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("{message}\n  --> {location}")]
    Structure {
        message: String,
        location: SourceLocation,
    },
    #[error("{error}\n  --> {location}\n  {source_text}")]
    Resolution {
        error: CommandError,
        location: SourceLocation,
        source_text: String,
    },
    #[error(
        "internal compiler error: {message}\n  --> {location}\n\
         This is a bug in the compiler, not in your code. Please file an issue with the line above."
    )]
    Internal {
        message: String,
        location: SourceLocation,
    },
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
    #[error("ConfigError: {0}")]
    Config(#[from] serde_json::Error),
}

impl CompilerError {
    pub fn structure(message: impl Into<String>, location: SourceLocation) -> Self {
        CompilerError::Structure {
            message: message.into(),
            location,
        }
    }

    pub fn internal(message: impl Into<String>, location: SourceLocation) -> Self {
        CompilerError::Internal {
            message: message.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    ArgumentCount,
    Type,
    NoCommand,
    BadStructure,
}

/// Why a line failed to resolve against the command table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub message: String,
    /// Raised by a block-construct overload; loses ties against ordinary instructions.
    pub low_priority: bool,
}

impl CommandError {
    pub fn new(kind: CommandErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            low_priority: false,
        }
    }

    pub fn argument_count(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::ArgumentCount, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Type, message)
    }

    pub fn no_command(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::NoCommand, message)
    }

    pub fn bad_structure(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::BadStructure, message)
    }

    pub fn low_priority(mut self, low_priority: bool) -> Self {
        self.low_priority = low_priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// A non-fatal finding reported after (or during) compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}\n  --> {}", self.severity, self.message, location),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// A line that cannot be tokenized. `column` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("LexingError: {message} (column {column})")]
pub struct LexingError {
    pub message: String,
    pub column: usize,
}

impl LexingError {
    pub fn new(message: impl Into<String>, column: usize) -> Self {
        Self {
            message: message.into(),
            column,
        }
    }
}
