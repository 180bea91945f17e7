use crate::constants::substitute_one;
use crate::error::SourceLocation;

/// Where a compiled statement came from, at each stage of rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub filename: String,
    pub line_number: usize,
    /// The physical line as written.
    pub source_text: String,
    /// After comment stripping and semicolon splitting.
    pub cleaned_text: String,
    /// After compiler-constant substitution.
    pub modified_text: String,
}

impl SourceInfo {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.filename.clone(), self.line_number)
    }
}

/// One base-dialect instruction (or label) ready for output and type checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub tokens: Vec<String>,
    pub source: SourceInfo,
}

impl Statement {
    pub fn new(tokens: Vec<String>, source: SourceInfo) -> Self {
        Self { tokens, source }
    }

    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// The label name if this statement is a lone `name:` line.
    pub fn label_definition(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [only] => label_name(only),
            _ => None,
        }
    }
}

/// `name:` → `name`.
pub fn label_name(token: &str) -> Option<&str> {
    token
        .strip_suffix(':')
        .filter(|name| !name.is_empty() && !name.contains([':', '"']))
}

/// A statement compiled inside a `&for` body. It still refers to the loop
/// variable and cannot be type checked until `expand` binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpandedStatement {
    statement: Statement,
}

impl UnexpandedStatement {
    pub(crate) fn new(statement: Statement) -> Self {
        Self { statement }
    }

    /// Binds `$variable` to `value` in both the compiled tokens and the source provenance.
    pub fn expand(&self, variable: &str, value: &str) -> Statement {
        let bind = |text: &str| substitute_one(text, variable, value);
        let source = &self.statement.source;
        Statement {
            tokens: self.statement.tokens.iter().map(|token| bind(token)).collect(),
            source: SourceInfo {
                filename: source.filename.clone(),
                line_number: source.line_number,
                source_text: bind(&source.source_text),
                cleaned_text: bind(&source.cleaned_text),
                modified_text: bind(&source.modified_text),
            },
        }
    }
}
