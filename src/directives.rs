use crate::types::ArgType;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgramType {
    /// A standalone processor program.
    #[default]
    Main,
    /// A function body meant to be `call`ed from another unit.
    Function,
    /// Not compiled on its own.
    Never,
}

impl ProgramType {
    pub fn from_name(name: &str) -> Option<ProgramType> {
        match name {
            "main" => Some(ProgramType::Main),
            "function" => Some(ProgramType::Function),
            "never" => Some(ProgramType::Never),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProgramType::Main => write!(f, "main"),
            ProgramType::Function => write!(f, "function"),
            ProgramType::Never => write!(f, "never"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<(String, ArgType)>,
}

/// One `#...` line that configures the unit instead of producing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Require(Vec<String>),
    ProgramType(ProgramType),
    Author(String),
    Function(FunctionSignature),
}

/// Everything the directives of a unit declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    pub program_type: ProgramType,
    pub author: Option<String>,
    pub requires: Vec<String>,
    pub function: Option<FunctionSignature>,
    program_type_set: bool,
}

impl ProgramHeader {
    /// Records a directive. Each directive except `#require` may appear once.
    pub fn apply(&mut self, directive: Directive) -> Result<(), String> {
        match directive {
            Directive::Require(names) => {
                for name in names {
                    if !self.requires.contains(&name) {
                        self.requires.push(name);
                    }
                }
            }
            Directive::ProgramType(program_type) => {
                if self.program_type_set {
                    return Err("Duplicate #program_type directive".to_string());
                }
                self.program_type = program_type;
                self.program_type_set = true;
            }
            Directive::Author(author) => {
                if self.author.is_some() {
                    return Err("Duplicate #author directive".to_string());
                }
                self.author = Some(author);
            }
            Directive::Function(signature) => {
                if self.function.is_some() {
                    return Err("Duplicate #function directive".to_string());
                }
                self.function = Some(signature);
            }
        }
        Ok(())
    }
}

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(require|program_type|author|function)\b(.*)$").unwrap());

static FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w-]*)\s*\((.*)\)$").unwrap());

/// Whether a raw source line is a directive. Checked before comments are stripped.
pub fn is_directive(line: &str) -> bool {
    DIRECTIVE.is_match(line.trim())
}

pub fn parse_directive(line: &str) -> Result<Directive, String> {
    let line = line.trim();
    let Some(captures) = DIRECTIVE.captures(line) else {
        return Err(format!("\"{}\" is not a directive", line));
    };
    let rest = captures[2].trim();

    match &captures[1] {
        "require" => {
            let names: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                return Err("#require needs at least one name".to_string());
            }
            Ok(Directive::Require(names))
        }
        "program_type" => ProgramType::from_name(rest).map(Directive::ProgramType).ok_or_else(|| {
            format!("Invalid program type \"{}\": expected main, function or never", rest)
        }),
        "author" if rest.is_empty() => Err("#author needs a name".to_string()),
        "author" => Ok(Directive::Author(rest.to_string())),
        _ => parse_function(rest).map(Directive::Function),
    }
}

fn parse_function(text: &str) -> Result<FunctionSignature, String> {
    let Some(captures) = FUNCTION.captures(text) else {
        return Err(format!("Malformed #function directive \"{}\": expected NAME(param:type, ...)", text));
    };

    let mut params = Vec::new();
    for param in captures[2].split(',').map(str::trim).filter(|param| !param.is_empty()) {
        let Some((name, ty)) = param.split_once(':') else {
            return Err(format!("Function parameter \"{}\" has no type", param));
        };
        let ty = ArgType::from_name(ty.trim())
            .ok_or_else(|| format!("Unknown type \"{}\" for parameter \"{}\"", ty.trim(), name.trim()))?;
        params.push((name.trim().to_string(), ty));
    }

    Ok(FunctionSignature {
        name: captures[1].to_string(),
        params,
    })
}
