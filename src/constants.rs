use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// A value substituted for `$NAME` before a line is tokenized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompilerConst {
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<CompilerConst>),
}

pub type CompilerConsts = BTreeMap<String, CompilerConst>;

impl CompilerConst {
    /// Reads a `-D NAME=VALUE` value: booleans and numbers are recognized, anything else is a string.
    pub fn parse(value: &str) -> CompilerConst {
        match value {
            "true" => CompilerConst::Boolean(true),
            "false" => CompilerConst::Boolean(false),
            _ => value
                .parse::<f64>()
                .map(CompilerConst::Number)
                .unwrap_or_else(|_| CompilerConst::String(value.to_string())),
        }
    }
}

impl fmt::Display for CompilerConst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerConst::Boolean(value) => write!(f, "{}", value),
            CompilerConst::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            CompilerConst::Number(value) => write!(f, "{}", value),
            CompilerConst::String(value) => write!(f, "{}", value),
            CompilerConst::Array(values) => {
                let joined = values.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(" ");
                write!(f, "{}", joined)
            }
        }
    }
}

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([\w.-]+)\)|\$([A-Za-z_]\w*)").unwrap());

/// Result of substituting compiler constants into one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Substituted {
    pub text: String,
    /// Referenced names with no value, left in the text as written.
    pub unresolved: Vec<String>,
}

/// Replaces every `$name` and `$(name)` with its value.
///
/// Names in `deferred` are loop variables that will be bound later; they are
/// left in place without being reported.
pub fn substitute(line: &str, constants: &CompilerConsts, deferred: &[&str]) -> Substituted {
    let mut unresolved = Vec::new();
    let text = substitute_with(line, |name| {
        if let Some(value) = constants.get(name) {
            return Some(value.to_string());
        }
        if !deferred.contains(&name) && !unresolved.iter().any(|seen: &String| seen == name) {
            unresolved.push(name.to_string());
        }
        None
    });
    Substituted { text, unresolved }
}

/// Replaces references to a single name, leaving every other reference alone.
pub fn substitute_one(line: &str, name: &str, value: &str) -> String {
    substitute_with(line, |reference| (reference == name).then(|| value.to_string()))
}

/// Rewrites every `$name` as `$(name)` so text glued on afterwards cannot
/// extend the reference.
pub fn delimit_references(text: &str) -> String {
    substitute_with(text, |name| Some(format!("$({})", name)))
}

fn substitute_with(line: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    if !line.contains('$') {
        return line.to_string();
    }
    REFERENCE
        .replace_all(line, |captures: &Captures| {
            let name = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}
