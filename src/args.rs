use crate::types::{guess_token_type, ArgType};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    /// Must match the token text exactly, e.g. the `add` in `op add`.
    Literal,
    Generic(ArgType),
}

/// One positional argument of an instruction signature.
///
/// Signatures are written as space-separated words: `name:type` for a typed
/// argument, `name:*type` for a write target, a trailing `?` for an optional
/// argument, a leading `...` for a variadic tail, and a bare word for a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub kind: ArgKind,
    pub is_optional: bool,
    pub is_variable: bool,
    pub spread: bool,
}

impl Arg {
    pub fn parse(spec: &str) -> Result<Arg, String> {
        let (spec, is_optional) = match spec.strip_suffix('?') {
            Some(rest) => (rest, true),
            None => (spec, false),
        };
        let (spec, spread) = match spec.strip_prefix("...") {
            Some(rest) => (rest, true),
            None => (spec, false),
        };

        let Some((name, ty)) = spec.split_once(':') else {
            if spread {
                return Err(format!("Literal argument \"{}\" cannot be variadic", spec));
            }
            return Ok(Arg {
                name: spec.to_string(),
                kind: ArgKind::Literal,
                is_optional,
                is_variable: false,
                spread: false,
            });
        };

        let (ty, is_variable) = match ty.strip_prefix('*') {
            Some(rest) => (rest, true),
            None => (ty, false),
        };
        let ty = ArgType::from_name(ty).ok_or_else(|| format!("Unknown argument type \"{}\"", ty))?;
        if name.is_empty() {
            return Err(format!("Argument of type {} has no name", ty));
        }

        Ok(Arg {
            name: name.to_string(),
            kind: ArgKind::Generic(ty),
            is_optional,
            is_variable,
            spread,
        })
    }

    pub fn ty(&self) -> Option<ArgType> {
        match self.kind {
            ArgKind::Generic(ty) => Some(ty),
            ArgKind::Literal => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let spread = if self.spread { "..." } else { "" };
        let optional = if self.is_optional { "?" } else { "" };
        match self.kind {
            ArgKind::Literal => write!(f, "{}{}", self.name, optional),
            ArgKind::Generic(ty) => {
                let output = if self.is_variable { "*" } else { "" };
                write!(f, "{}{}:{}{}{}", spread, self.name, output, ty, optional)
            }
        }
    }
}

/// Parses a whole signature and checks its shape.
pub fn parse_signature(signature: &str) -> Result<Vec<Arg>, String> {
    let args = signature
        .split_whitespace()
        .map(Arg::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen_optional = false;
    let mut seen_spread = false;
    for arg in &args {
        if seen_spread && !arg.is_optional {
            return Err(format!(
                "Argument \"{}\" follows a variadic argument but is not optional",
                arg.name
            ));
        }
        if arg.spread && seen_spread {
            return Err("A signature may contain only one variadic argument".to_string());
        }
        if seen_optional && !arg.is_optional && !arg.spread {
            return Err(format!(
                "Required argument \"{}\" follows an optional argument",
                arg.name
            ));
        }
        seen_optional |= arg.is_optional;
        seen_spread |= arg.spread;
    }

    Ok(args)
}

/// Authoritative acceptance check for one token in one argument position.
pub fn is_token_valid_for_type(token: &str, arg: &Arg) -> bool {
    let ty = match arg.kind {
        ArgKind::Literal => return token == arg.name,
        ArgKind::Generic(ty) => ty,
    };

    let guessed = guess_token_type(token);
    if arg.is_variable {
        return guessed == ArgType::Variable;
    }
    if ty.is_wildcard() {
        return true;
    }

    let descriptor = ty.descriptor();
    if descriptor.exclude.contains(&guessed) {
        return false;
    }

    guessed == ty || ty.validates(token) || descriptor.also_accepts.contains(&guessed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn arg(spec: &str) -> Arg {
        Arg::parse(spec).unwrap()
    }

    #[test]
    fn parses_every_argument_form() {
        assert_eq!(arg("add").kind, ArgKind::Literal);

        let output = arg("result:*number");
        assert_eq!(output.kind, ArgKind::Generic(ArgType::Number));
        assert!(output.is_variable);

        let optional = arg("alpha:number?");
        assert!(optional.is_optional);
        assert!(!optional.is_variable);

        let spread = arg("...values:any");
        assert!(spread.spread);
        assert_eq!(spread.name, "values");
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(Arg::parse("x:float").is_err());
        assert!(Arg::parse(":number").is_err());
    }

    #[test]
    fn signature_shape_is_checked() {
        assert!(parse_signature("a:number b:number? ...rest:any").is_ok());
        assert!(parse_signature("...rest:any last:number").is_err());
        assert!(parse_signature("a:number? b:number").is_err());
        assert!(parse_signature("...a:any ...b:any?").is_err());
    }

    #[test]
    fn displays_like_the_text_it_came_from() {
        for spec in ["add", "out:*number", "a:number?", "...values:any"] {
            assert_eq!(arg(spec).to_string(), spec);
        }
    }

    #[test]
    fn literal_args_need_exact_text() {
        assert!(is_token_valid_for_type("add", &arg("add")));
        assert!(!is_token_valid_for_type("sub", &arg("add")));
    }

    #[test]
    fn write_targets_need_a_variable_name() {
        let target = arg("out:*any");
        assert!(is_token_valid_for_type("result", &target));
        assert!(!is_token_valid_for_type("5", &target));
        assert!(!is_token_valid_for_type("@unit", &target));
    }

    #[test]
    fn generic_args_accept_guess_validator_or_also_accepts() {
        let number = arg("n:number");
        assert!(is_token_valid_for_type("5", &number));
        assert!(is_token_valid_for_type("count", &number));
        assert!(is_token_valid_for_type("true", &number));
        assert!(!is_token_valid_for_type("\"five\"", &number));
        assert!(!is_token_valid_for_type("@copper", &number));

        let sensed = arg("property:senseable");
        assert!(is_token_valid_for_type("@copper", &sensed));
        assert!(is_token_valid_for_type("@totalItems", &sensed));
    }

    #[test]
    fn keyword_types_are_matched_by_validator_only() {
        let test = arg("condition:operandTest");
        assert!(is_token_valid_for_type("lessThan", &test));
        assert!(!is_token_valid_for_type("sometimes", &test));
    }

    #[test]
    fn jump_targets_exclude_strings() {
        let target = arg("target:jumpAddress");
        assert!(is_token_valid_for_type("loop", &target));
        assert!(is_token_valid_for_type("12", &target));
        assert!(!is_token_valid_for_type("\"loop\"", &target));
    }
}
