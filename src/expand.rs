use crate::commands::CommandDefinition;
use regex::Regex;
use std::sync::LazyLock;

/// What an overload turns into in the base dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replace {
    /// Emitted as written.
    Keep,
    /// One output line per pattern; `%1`, `%2`, ... name the arguments after the mnemonic.
    Template(&'static [&'static str]),
    Transform(Transform),
}

/// Rewrites that a fixed template cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// `print a b c` becomes one `print` per value.
    PrintEach,
    /// `sensor out thing.property` becomes `sensor out thing @property`.
    SensorShorthand,
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\d+)").unwrap());

/// Produces the base-dialect lines for a resolved command. Each line is a token list.
///
/// The caller re-resolves every produced line; a template referring to a
/// missing argument yields the placeholder text unchanged, which then fails
/// that check.
pub fn get_output_for_command(command: &CommandDefinition, tokens: &[String]) -> Vec<Vec<String>> {
    match command.replace {
        Replace::Keep => vec![tokens.to_vec()],
        Replace::Template(patterns) => patterns
            .iter()
            .map(|pattern| fill_template(pattern, tokens))
            .collect(),
        Replace::Transform(transform) => apply_transform(transform, tokens),
    }
}

fn fill_template(pattern: &str, tokens: &[String]) -> Vec<String> {
    pattern
        .split(' ')
        .map(|part| {
            PLACEHOLDER
                .replace_all(part, |captures: &regex::Captures| {
                    captures[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| tokens.get(index))
                        .cloned()
                        .unwrap_or_else(|| captures[0].to_string())
                })
                .into_owned()
        })
        .collect()
}

fn apply_transform(transform: Transform, tokens: &[String]) -> Vec<Vec<String>> {
    match transform {
        Transform::PrintEach => tokens
            .iter()
            .skip(1)
            .map(|value| vec![tokens[0].clone(), value.clone()])
            .collect(),
        Transform::SensorShorthand => {
            let (Some(output), Some(shorthand)) = (tokens.get(1), tokens.get(2)) else {
                return vec![tokens.to_vec()];
            };
            let Some((target, property)) = shorthand.rsplit_once('.') else {
                return vec![tokens.to_vec()];
            };
            vec![vec![
                tokens[0].clone(),
                output.clone(),
                target.to_string(),
                sensed_property(property),
            ]]
        }
    }
}

/// `x` and `@x` both name the sensed property `@x`.
pub fn sensed_property(property: &str) -> String {
    if property.starts_with('@') {
        property.to_string()
    } else {
        format!("@{}", property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandTable;
    use pretty_assertions::assert_eq;

    fn tokens(line: &str) -> Vec<String> {
        line.split(' ').map(str::to_string).collect()
    }

    fn expand(line: &str) -> Vec<String> {
        let tokens = tokens(line);
        let command = CommandTable::builtin().resolve(&tokens).unwrap();
        get_output_for_command(command, &tokens)
            .into_iter()
            .map(|line| line.join(" "))
            .collect()
    }

    #[test]
    fn base_instructions_pass_through() {
        assert_eq!(expand("op add x 5 5"), vec!["op add x 5 5"]);
    }

    #[test]
    fn templates_fill_placeholders() {
        assert_eq!(expand("increment x 2"), vec!["op add x x 2"]);
        assert_eq!(expand("op mul x 3"), vec!["op mul x x 3"]);
        assert_eq!(expand("call draw"), vec!["op add _stack1 @counter 1", "jump draw always 0 0"]);
    }

    #[test]
    fn print_each_splits_variadic_prints() {
        assert_eq!(expand("print \"a\" b 3"), vec!["print \"a\"", "print b", "print 3"]);
    }

    #[test]
    fn sensor_shorthand_splits_on_the_last_dot() {
        assert_eq!(expand("sensor hp @unit.health"), vec!["sensor hp @unit @health"]);
        assert_eq!(expand("sensor n cell1.@copper"), vec!["sensor n cell1 @copper"]);
    }

    #[test]
    fn missing_arguments_leave_the_placeholder() {
        assert_eq!(fill_template("op add %1 %1 %2", &tokens("increment x")), tokens("op add x x %2"));
    }
}
