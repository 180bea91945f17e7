use crate::commands::CommandTable;
use crate::error::{Diagnostic, SourceLocation};
use crate::statement::Statement;
use crate::types::ArgType;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub ty: ArgType,
    pub location: SourceLocation,
}

/// One read of a variable. `types` holds every type a matching overload reads it as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableUsage {
    pub types: Vec<ArgType>,
    pub location: SourceLocation,
}

/// What one compilation unit defines and reads, gathered statement by statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCheckingData {
    pub variable_definitions: BTreeMap<String, Vec<VariableDefinition>>,
    pub variable_usages: BTreeMap<String, Vec<VariableUsage>>,
    pub jump_labels_defined: BTreeMap<String, Vec<SourceLocation>>,
    pub jump_labels_used: BTreeMap<String, Vec<SourceLocation>>,
}

impl TypeCheckingData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a definition made outside the unit, such as a function parameter.
    pub fn define(&mut self, name: impl Into<String>, ty: ArgType, location: SourceLocation) {
        let definitions = self.variable_definitions.entry(name.into()).or_default();
        let definition = VariableDefinition { ty, location };
        if !definitions.contains(&definition) {
            definitions.push(definition);
        }
    }

    /// Folds another unit's data into this one, keeping this unit's entries first.
    pub fn merge(&mut self, other: TypeCheckingData) {
        for (name, definitions) in other.variable_definitions {
            self.variable_definitions.entry(name).or_default().extend(definitions);
        }
        for (name, usages) in other.variable_usages {
            self.variable_usages.entry(name).or_default().extend(usages);
        }
        for (name, sites) in other.jump_labels_defined {
            self.jump_labels_defined.entry(name).or_default().extend(sites);
        }
        for (name, sites) in other.jump_labels_used {
            self.jump_labels_used.entry(name).or_default().extend(sites);
        }
    }

    /// Runs the end-of-pass checks. Every finding is a warning.
    pub fn diagnose(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.check_conflicting_definitions(&mut diagnostics);
        self.check_usages(&mut diagnostics);
        self.check_jump_labels(&mut diagnostics);
        diagnostics
    }

    fn check_conflicting_definitions(&self, diagnostics: &mut Vec<Diagnostic>) {
        for (name, definitions) in &self.variable_definitions {
            let mut distinct: Vec<&VariableDefinition> = Vec::new();
            for definition in definitions.iter().filter(|d| !d.ty.is_wildcard_definition()) {
                if !distinct.iter().any(|seen| same_type(seen.ty, definition.ty)) {
                    distinct.push(definition);
                }
            }
            if let [first, second, ..] = distinct.as_slice() {
                diagnostics.push(Diagnostic::warning(
                    format!(
                        "Variable \"{}\" has conflicting types: defined as {} at {} and as {} at {}",
                        name, first.ty, first.location, second.ty, second.location
                    ),
                    Some(second.location.clone()),
                ));
            }
        }
    }

    fn check_usages(&self, diagnostics: &mut Vec<Diagnostic>) {
        for (name, usages) in &self.variable_usages {
            let Some(first_definition) = self.variable_definitions.get(name).and_then(|d| d.first()) else {
                if let Some(first) = usages.first() {
                    diagnostics.push(Diagnostic::warning(
                        format!("Variable \"{}\" seems undefined (read {} time(s))", name, usages.len()),
                        Some(first.location.clone()),
                    ));
                }
                continue;
            };

            for usage in usages {
                if !usage.types.iter().any(|ty| ty.accepts(first_definition.ty)) {
                    let expected = usage.types.iter().map(ArgType::to_string).collect::<Vec<_>>().join(" or ");
                    diagnostics.push(Diagnostic::warning(
                        format!(
                            "Type mismatch: variable \"{}\" is read as {} here but was defined as {} at {}",
                            name, expected, first_definition.ty, first_definition.location
                        ),
                        Some(usage.location.clone()),
                    ));
                }
            }
        }
    }

    fn check_jump_labels(&self, diagnostics: &mut Vec<Diagnostic>) {
        for (label, definitions) in &self.jump_labels_defined {
            if definitions.len() > 1 {
                diagnostics.push(Diagnostic::warning(
                    format!("Jump label \"{}\" is defined {} times at {}", label, definitions.len(), list(definitions)),
                    definitions.get(1).cloned(),
                ));
            }
        }

        for (label, usages) in &self.jump_labels_used {
            if self.jump_labels_defined.contains_key(label) || is_numeric_target(label) {
                continue;
            }
            diagnostics.push(Diagnostic::warning(
                format!("Jump label \"{}\" is missing; it is used at {}", label, list(usages)),
                usages.first().cloned(),
            ));
        }
    }
}

fn same_type(a: ArgType, b: ArgType) -> bool {
    let normalize = |ty| if ty == ArgType::Boolean { ArgType::Number } else { ty };
    normalize(a) == normalize(b)
}

fn is_numeric_target(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
}

fn list(locations: &[SourceLocation]) -> String {
    locations.iter().map(SourceLocation::to_string).collect::<Vec<_>>().join(", ")
}

/// Records what one output statement defines, reads and jumps to.
pub fn type_check(statement: &Statement, data: &mut TypeCheckingData, table: &CommandTable) {
    let location = statement.source.location();

    if let Some(label) = statement.label_definition() {
        data.jump_labels_defined.entry(label.to_string()).or_default().push(location);
        return;
    }

    let commands = table.matching(&statement.tokens);

    let mut labels: Vec<String> = Vec::new();
    let mut usages: BTreeMap<String, Vec<ArgType>> = BTreeMap::new();
    for command in &commands {
        for label in command.jump_labels_used(&statement.tokens) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        for (name, ty) in command.variables_defined(&statement.tokens) {
            data.define(name, ty, location.clone());
        }
        for (name, ty) in command.variables_used(&statement.tokens) {
            let types = usages.entry(name).or_default();
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
    }

    for label in labels {
        data.jump_labels_used.entry(label).or_default().push(location.clone());
    }
    for (name, types) in usages {
        data.variable_usages.entry(name).or_default().push(VariableUsage {
            types,
            location: location.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::SourceInfo;
    use pretty_assertions::assert_eq;

    fn check_lines(lines: &[&str]) -> TypeCheckingData {
        let mut data = TypeCheckingData::new();
        for (index, line) in lines.iter().enumerate() {
            let statement = Statement::new(
                line.split(' ').map(str::to_string).collect(),
                SourceInfo {
                    filename: "unit.mlogx".to_string(),
                    line_number: index + 1,
                    source_text: line.to_string(),
                    cleaned_text: line.to_string(),
                    modified_text: line.to_string(),
                },
            );
            type_check(&statement, &mut data, CommandTable::builtin());
        }
        data
    }

    fn messages(data: &TypeCheckingData) -> Vec<String> {
        data.diagnose().into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn records_output_definitions() {
        let data = check_lines(&["op add x 5 5"]);
        assert_eq!(data.variable_definitions["x"][0].ty, ArgType::Number);
        assert!(messages(&data).is_empty());
    }

    #[test]
    fn conflicting_definitions_are_reported_once() {
        let data = check_lines(&["set x 5", "set x \"hello\"", "set x true"]);
        let messages = messages(&data);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("conflicting types"), "{}", messages[0]);
        assert!(messages[0].contains("number") && messages[0].contains("string"));
    }

    #[test]
    fn booleans_and_numbers_do_not_conflict() {
        let data = check_lines(&["set flag true", "op add flag flag 1"]);
        assert!(messages(&data).is_empty(), "{:?}", messages(&data));
    }

    #[test]
    fn undefined_variables_warn_once() {
        let data = check_lines(&["print x", "print x"]);
        let messages = messages(&data);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("seems undefined"));
    }

    #[test]
    fn mismatched_usages_cite_the_definition() {
        let data = check_lines(&["set name \"router\"", "op add y name 1"]);
        let messages = messages(&data);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("unit.mlogx:1"), "{}", messages[0]);
    }

    #[test]
    fn usages_union_over_matching_overloads() {
        let data = check_lines(&["ubind @poly", "set thing @unit", "sensor hp thing @health"]);
        let usage = &data.variable_usages["thing"][0];
        assert_eq!(usage.types, vec![ArgType::Building, ArgType::Unit]);
        assert!(messages(&data).is_empty(), "{:?}", messages(&data));
    }

    #[test]
    fn jump_labels_are_checked() {
        let data = check_lines(&["loop:", "loop:", "jump loop always 0 0", "jump 0 always 0 0", "jump gone always 0 0"]);
        let messages = messages(&data);
        assert_eq!(messages.len(), 2, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("\"loop\" is defined 2 times")));
        assert!(messages.iter().any(|m| m.contains("\"gone\" is missing")));
    }

    #[test]
    fn merge_combines_units() {
        let mut main = check_lines(&["jump helper always 0 0"]);
        let helper = check_lines(&["helper:", "end"]);
        main.merge(helper);
        assert!(messages(&main).is_empty());
    }

    #[test]
    fn seeded_definitions_count_as_defined() {
        let mut data = TypeCheckingData::new();
        data.define("target", ArgType::Unit, SourceLocation::new("unit.mlogx", 1));
        let statement = Statement::new(
            vec!["ucontrol".into(), "targetp".into(), "target".into(), "true".into()],
            SourceInfo {
                filename: "unit.mlogx".to_string(),
                line_number: 2,
                source_text: String::new(),
                cleaned_text: String::new(),
                modified_text: String::new(),
            },
        );
        type_check(&statement, &mut data, CommandTable::builtin());
        assert!(data.diagnose().is_empty());
    }
}
