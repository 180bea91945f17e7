use crate::commands::BlockKind;
use crate::constants::delimit_references;
use crate::error::{CompilerError, Diagnostic, SourceLocation};
use crate::statement::{Statement, UnexpandedStatement};
use tracing::debug;

/// Upper bound on `HIGH - LOW` for a range loop.
pub const MAX_LOOP_SPAN: u32 = 200;

/// One open block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackElement {
    Namespace {
        name: String,
        opened_at: SourceLocation,
    },
    ForLoop {
        variable: String,
        elements: Vec<String>,
        buffer: Vec<UnexpandedStatement>,
        opened_at: SourceLocation,
    },
    Conditional {
        enabled: bool,
        opened_at: SourceLocation,
    },
}

impl StackElement {
    pub fn opened_at(&self) -> &SourceLocation {
        match self {
            StackElement::Namespace { opened_at, .. }
            | StackElement::ForLoop { opened_at, .. }
            | StackElement::Conditional { opened_at, .. } => opened_at,
        }
    }

    fn describe(&self) -> String {
        match self {
            StackElement::Namespace { name, .. } => format!("namespace {}", name),
            StackElement::ForLoop { variable, .. } => format!("&for {}", variable),
            StackElement::Conditional { enabled, .. } => format!("&if ({})", enabled),
        }
    }

    /// Runs on everything compiled while this element is open.
    fn on_postcompile(&mut self, statements: Vec<Statement>) -> Vec<Statement> {
        match self {
            StackElement::Namespace { .. } => statements,
            StackElement::ForLoop { buffer, .. } => {
                buffer.extend(statements.into_iter().map(UnexpandedStatement::new));
                Vec::new()
            }
            StackElement::Conditional { enabled, .. } => {
                if *enabled {
                    statements
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Runs once when the block's `}` is reached.
    fn on_end(self) -> Vec<Statement> {
        match self {
            StackElement::ForLoop {
                variable,
                elements,
                buffer,
                ..
            } => elements
                .iter()
                .flat_map(|value| buffer.iter().map(|statement| statement.expand(&variable, value)))
                .collect(),
            StackElement::Namespace { .. } | StackElement::Conditional { .. } => Vec::new(),
        }
    }
}

/// The open blocks of one compilation unit, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStack {
    elements: Vec<StackElement>,
}

impl BlockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Opens a block. `tokens` is the opening line without its trailing `{`.
    pub fn begin(
        &mut self,
        kind: BlockKind,
        tokens: &[String],
        location: SourceLocation,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), CompilerError> {
        let element = match kind {
            BlockKind::Namespace => begin_namespace(tokens, location)?,
            BlockKind::ForLoop => begin_for(tokens, location)?,
            BlockKind::Conditional => begin_if(tokens, location, diagnostics),
            BlockKind::End => {
                return Err(CompilerError::structure("\"}\" cannot open a block", location));
            }
        };
        debug!(block = %element.describe(), depth = self.elements.len() + 1, "opened block");
        self.elements.push(element);
        Ok(())
    }

    /// Closes the innermost block and returns what it releases, already passed
    /// through the hooks of the blocks still open around it.
    pub fn end(&mut self, location: SourceLocation) -> Result<Vec<Statement>, CompilerError> {
        let Some(element) = self.elements.pop() else {
            return Err(CompilerError::structure("No block to end", location));
        };
        debug!(block = %element.describe(), depth = self.elements.len(), "closed block");
        let released = element.on_end();
        Ok(self.postcompile(released))
    }

    /// Applies every open block's hook, innermost first. Any disabled `&if`
    /// on the way out discards the batch.
    pub fn postcompile(&mut self, mut statements: Vec<Statement>) -> Vec<Statement> {
        for element in self.elements.iter_mut().rev() {
            if statements.is_empty() {
                break;
            }
            statements = element.on_postcompile(statements);
        }
        statements
    }

    /// Variables bound by the open `&for` loops.
    pub fn loop_variables(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|element| match element {
                StackElement::ForLoop { variable, .. } => Some(variable.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names of the open namespaces, outermost first.
    pub fn namespaces(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|element| match element {
                StackElement::Namespace { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Prefixes a variable name with the open namespaces: `x` in `a { b { } }` is `_a_b_x`.
    ///
    /// Names already starting with `_` are compiler-reserved or already
    /// namespaced and are returned unchanged, as are bare `$` references whose
    /// value is bound later.
    pub fn add_namespaces(&self, name: &str) -> String {
        let namespaces = self.namespaces();
        if namespaces.is_empty() || name.starts_with('_') || name.starts_with('$') {
            return name.to_string();
        }
        let chain: Vec<String> = namespaces.iter().map(|namespace| delimit_references(namespace)).collect();
        format!("_{}_{}", chain.join("_"), name)
    }

    /// Checks that every block was closed.
    pub fn finish(&self, location: SourceLocation) -> Result<(), CompilerError> {
        if self.elements.is_empty() {
            return Ok(());
        }
        let unclosed = self
            .elements
            .iter()
            .map(|element| format!("\n  {} opened at {}", element.describe(), element.opened_at()))
            .collect::<String>();
        Err(CompilerError::structure(
            format!("Missing \"}}\" for {} open block(s):{}", self.elements.len(), unclosed),
            location,
        ))
    }
}

fn begin_namespace(tokens: &[String], location: SourceLocation) -> Result<StackElement, CompilerError> {
    match tokens.get(1) {
        Some(name) => Ok(StackElement::Namespace {
            name: name.clone(),
            opened_at: location,
        }),
        None => Err(CompilerError::structure("Missing namespace name", location)),
    }
}

fn begin_for(tokens: &[String], location: SourceLocation) -> Result<StackElement, CompilerError> {
    let (Some(variable), Some(mode)) = (tokens.get(1), tokens.get(2)) else {
        return Err(CompilerError::structure("Malformed &for loop", location));
    };
    let rest = tokens.get(3..).unwrap_or(&[]);

    let elements = match (mode.as_str(), rest) {
        ("in", [lower, upper]) => {
            let parse = |bound: &String| {
                bound.parse::<u32>().map_err(|_| {
                    CompilerError::structure(
                        format!("Loop bound \"{}\" is not a non-negative integer", bound),
                        location.clone(),
                    )
                })
            };
            let (lower, upper) = (parse(lower)?, parse(upper)?);
            if lower > upper {
                return Err(CompilerError::structure(
                    format!("Loop lower bound {} is greater than upper bound {}", lower, upper),
                    location,
                ));
            }
            if upper - lower > MAX_LOOP_SPAN {
                return Err(CompilerError::structure(
                    format!(
                        "Loop range {}..={} is too large: at most {} iterations are allowed",
                        lower,
                        upper,
                        MAX_LOOP_SPAN + 1
                    ),
                    location,
                ));
            }
            (lower..=upper).map(|value| value.to_string()).collect()
        }
        ("of", elements) if !elements.is_empty() => elements.to_vec(),
        ("of", _) => {
            return Err(CompilerError::structure("&for ... of needs at least one element", location));
        }
        _ => return Err(CompilerError::structure("Malformed &for loop", location)),
    };

    Ok(StackElement::ForLoop {
        variable: variable.clone(),
        elements,
        buffer: Vec::new(),
        opened_at: location,
    })
}

fn begin_if(tokens: &[String], location: SourceLocation, diagnostics: &mut Vec<Diagnostic>) -> StackElement {
    let condition = tokens.get(1).map(String::as_str).unwrap_or_default();
    let enabled = match condition {
        "true" => true,
        "false" => false,
        other => match other.parse::<u64>() {
            Ok(value) => value != 0,
            Err(_) => {
                diagnostics.push(Diagnostic::warning(
                    format!("Condition \"{}\" is not true, false or a number; the block is enabled", condition),
                    Some(location.clone()),
                ));
                true
            }
        },
    };
    StackElement::Conditional {
        enabled,
        opened_at: location,
    }
}
