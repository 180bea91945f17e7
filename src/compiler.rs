use crate::analysis::{type_check, TypeCheckingData};
use crate::commands::{CommandDefinition, CommandTable};
use crate::config::{CompilerOptions, Settings};
use crate::constants::{substitute, CompilerConsts};
use crate::directives::{is_directive, parse_directive, Directive, ProgramHeader};
use crate::error::{CommandError, CompilerError, Diagnostic, SourceLocation};
use crate::expand::{get_output_for_command, Replace};
use crate::lexer::{clean_line, split_on_semicolons, tokenize};
use crate::stack::BlockStack;
use crate::statement::{label_name, SourceInfo, Statement};
use crate::types::{guess_token_type, ArgType};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Everything one compilation unit produced.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
    pub header: ProgramHeader,
    /// Kept so a caller can merge units and re-run the checks project-wide.
    pub type_data: TypeCheckingData,
}

pub struct Compiler {
    table: &'static CommandTable,
    options: CompilerOptions,
    constants: CompilerConsts,
}

impl Compiler {
    pub fn new(options: CompilerOptions, constants: CompilerConsts) -> Self {
        Self {
            table: CommandTable::builtin(),
            options,
            constants,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.compiler_options.clone(), settings.compiler_constants.clone())
    }

    pub fn compile(&self, filename: &str, source: &str) -> Result<CompileOutput, CompilerError> {
        self.compile_seeded(filename, source, TypeCheckingData::new())
    }

    /// Compiles one unit whose type checking starts from `seed`, e.g. variables the
    /// environment provides.
    pub fn compile_seeded(
        &self,
        filename: &str,
        source: &str,
        seed: TypeCheckingData,
    ) -> Result<CompileOutput, CompilerError> {
        let mut stack = BlockStack::new();
        let mut type_data = seed;
        let mut diagnostics = Vec::new();
        let mut header = ProgramHeader::default();
        let mut statements = Vec::new();
        let mut line_count = 0;

        for (index, raw) in source.lines().enumerate() {
            let line_number = index + 1;
            line_count = line_number;

            if is_directive(raw) {
                let location = SourceLocation::new(filename, line_number);
                if !stack.is_empty() {
                    return Err(CompilerError::structure("Directives must appear outside blocks", location));
                }
                let directive =
                    parse_directive(raw).map_err(|message| CompilerError::structure(message, location.clone()))?;
                if let Directive::Function(signature) = &directive {
                    for (name, ty) in &signature.params {
                        type_data.define(name.clone(), *ty, location.clone());
                    }
                }
                header
                    .apply(directive)
                    .map_err(|message| CompilerError::structure(message, location))?;
                continue;
            }

            for statement in self.compile_line(raw, filename, line_number, &mut stack, &mut diagnostics)? {
                // Loop replays bind their values after the first resolution.
                if statement.label_definition().is_none() {
                    if let Err(error) = self.table.resolve(&statement.tokens) {
                        self.reject(error, &statement.source, &mut diagnostics)?;
                        continue;
                    }
                }
                type_check(&statement, &mut type_data, self.table);
                statements.push(statement);
            }
        }

        stack.finish(SourceLocation::new(filename, line_count.max(1)))?;
        diagnostics.extend(type_data.diagnose());

        debug!(
            filename,
            lines = line_count,
            statements = statements.len(),
            diagnostics = diagnostics.len(),
            "compiled unit"
        );

        Ok(CompileOutput {
            statements,
            diagnostics,
            header,
            type_data,
        })
    }

    /// Compiles one physical line. Returned statements have passed through every
    /// open block and are ready for output.
    pub fn compile_line(
        &self,
        raw: &str,
        filename: &str,
        line_number: usize,
        stack: &mut BlockStack,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<Statement>, CompilerError> {
        let location = SourceLocation::new(filename, line_number);
        let cleaned = clean_line(raw);
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        let parts = split_on_semicolons(&cleaned)
            .map_err(|error| CompilerError::structure(error.to_string(), location.clone()))?;

        let mut compiled = Vec::new();
        for part in parts {
            let substituted = substitute(&part, &self.constants, &stack.loop_variables());
            for name in &substituted.unresolved {
                diagnostics.push(Diagnostic::warning(
                    format!("Compiler constant \"{}\" is not defined", name),
                    Some(location.clone()),
                ));
            }
            let tokens = tokenize(&substituted.text)
                .map_err(|error| CompilerError::structure(error.to_string(), location.clone()))?;
            if tokens.is_empty() {
                continue;
            }

            let source = SourceInfo {
                filename: filename.to_string(),
                line_number,
                source_text: raw.to_string(),
                cleaned_text: part,
                modified_text: substituted.text,
            };
            compiled.extend(self.compile_statement(tokens, source, stack, diagnostics)?);
        }
        Ok(compiled)
    }

    fn compile_statement(
        &self,
        tokens: Vec<String>,
        source: SourceInfo,
        stack: &mut BlockStack,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<Statement>, CompilerError> {
        let location = source.location();

        if self.table.is_block_keyword(&tokens[0]) {
            return self.compile_block(&tokens, location, stack, diagnostics);
        }

        if let [only] = tokens.as_slice() {
            if let Some(label) = label_name(only) {
                let label = format!("{}:", stack.add_namespaces(label));
                return Ok(stack.postcompile(vec![Statement::new(vec![label], source)]));
            }
        }

        let command = match self.table.resolve(&tokens) {
            Ok(command) => command,
            Err(error) => {
                self.reject(error, &source, diagnostics)?;
                return Ok(Vec::new());
            }
        };

        if command.is_world_only && !self.options.world_processor {
            diagnostics.push(Diagnostic::warning(
                format!("\"{}\" only runs on world processors", command.name),
                Some(location.clone()),
            ));
        }

        let mut compiled = Vec::new();
        for line in get_output_for_command(command, &tokens) {
            let output = match self.table.resolve(&line) {
                Ok(output) if output.replace == Replace::Keep => output,
                Ok(_) => {
                    return Err(CompilerError::internal(
                        format!("\"{}\" expanded to another extended instruction \"{}\"", tokens.join(" "), line.join(" ")),
                        location,
                    ));
                }
                Err(error) => {
                    return Err(CompilerError::internal(
                        format!("\"{}\" expanded to \"{}\", which does not resolve: {}", tokens.join(" "), line.join(" "), error),
                        location,
                    ));
                }
            };
            let line = namespace_tokens(output, line, stack);
            compiled.push(Statement::new(line, source.clone()));
        }

        Ok(stack.postcompile(compiled))
    }

    /// Fails the unit in strict mode; otherwise records the line as skipped.
    fn reject(
        &self,
        error: CommandError,
        source: &SourceInfo,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), CompilerError> {
        let location = source.location();
        if self.options.strict {
            return Err(CompilerError::Resolution {
                error,
                location,
                source_text: source.source_text.clone(),
            });
        }
        warn!(%location, "skipping line: {}", error);
        diagnostics.push(Diagnostic::warning(format!("{} (line skipped)", error), Some(location)));
        Ok(())
    }

    fn compile_block(
        &self,
        tokens: &[String],
        location: SourceLocation,
        stack: &mut BlockStack,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<Statement>, CompilerError> {
        if tokens[0] == "}" {
            if tokens.len() > 1 {
                return Err(CompilerError::structure(
                    format!("Unexpected \"{}\" after \"}}\"", tokens[1..].join(" ")),
                    location,
                ));
            }
            return stack.end(location);
        }

        let head = match tokens.split_last() {
            Some((last, head)) if last == "{" => head,
            _ => {
                return Err(CompilerError::structure(
                    format!("Expected \"{{\" at the end of \"{}\"", tokens.join(" ")),
                    location,
                ));
            }
        };

        let command = self
            .table
            .resolve(head)
            .map_err(|error| CompilerError::structure(error.message, location.clone()))?;
        let Some(kind) = command.block else {
            return Err(CompilerError::internal(
                format!("\"{}\" is a block keyword but resolved to an instruction", head[0]),
                location,
            ));
        };
        stack.begin(kind, head, location, diagnostics)?;
        Ok(Vec::new())
    }

    /// Renders output statements as base-dialect source, one instruction per line.
    pub fn render(&self, statements: &[Statement]) -> String {
        let used_labels: BTreeSet<String> = if self.options.remove_unused_jump_labels {
            statements
                .iter()
                .filter(|statement| statement.label_definition().is_none())
                .filter_map(|statement| {
                    self.table
                        .resolve(&statement.tokens)
                        .ok()
                        .map(|command| command.jump_labels_used(&statement.tokens))
                })
                .flatten()
                .collect()
        } else {
            BTreeSet::new()
        };

        let mut output = String::new();
        for statement in statements {
            if self.options.remove_unused_jump_labels {
                if let Some(label) = statement.label_definition() {
                    if !used_labels.contains(label) {
                        continue;
                    }
                }
            }
            let text = statement.text();
            output.push_str(&text);
            if self.options.include_source && text != statement.source.cleaned_text {
                output.push_str(&format!(" # {}", statement.source.location()));
            }
            output.push('\n');
        }
        output
    }
}

/// Prefixes the variables and jump targets of an output line with the open namespaces.
fn namespace_tokens(command: &CommandDefinition, tokens: Vec<String>, stack: &BlockStack) -> Vec<String> {
    if stack.namespaces().is_empty() {
        return tokens;
    }
    let offset = tokens.len() - command.argument_tokens(&tokens).len();
    tokens
        .iter()
        .enumerate()
        .map(|(index, token)| {
            let arg = index.checked_sub(offset).and_then(|position| command.arg_at(position));
            let namespaced = match arg.and_then(|arg| arg.ty()) {
                None => false,
                Some(ArgType::JumpAddress) => !token.chars().all(|c| c.is_ascii_digit()),
                Some(ty) => !ty.validates(token) && guess_token_type(token) == ArgType::Variable,
            };
            if namespaced {
                stack.add_namespaces(token)
            } else {
                token.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> CompileOutput {
        Compiler::new(CompilerOptions::default(), CompilerConsts::new())
            .compile("test.mlogx", source)
            .unwrap()
    }

    fn texts(output: &CompileOutput) -> Vec<String> {
        output.statements.iter().map(Statement::text).collect()
    }

    #[test]
    fn strips_comments_and_splits_semicolons() {
        let output = compile("set a 1; set b 2 # both\n\n// nothing here\nprint \"a; b\"");
        assert_eq!(texts(&output), vec!["set a 1", "set b 2", "print \"a; b\""]);
        assert_eq!(output.statements[1].source.cleaned_text, "set b 2");
        assert_eq!(output.statements[1].source.line_number, 1);
    }

    #[test]
    fn expands_extended_instructions() {
        let output = compile("set x 0\nincrement x\nprint \"x=\" x\njump end always\nend:");
        assert_eq!(
            texts(&output),
            vec!["set x 0", "op add x x 1", "print \"x=\"", "print x", "jump end always 0 0", "end:"]
        );
    }

    #[test]
    fn namespaces_variables_and_labels_but_not_keywords() {
        let output = compile(
            "namespace net {\nloop:\nset x 1\njump loop lessThan x 10\nsensor hp @unit @health\n}",
        );
        assert_eq!(
            texts(&output),
            vec![
                "_net_loop:",
                "set _net_x 1",
                "jump _net_loop lessThan _net_x 10",
                "sensor _net_hp @unit @health",
            ]
        );
    }

    #[test]
    fn call_and_return_use_the_stack_slot() {
        let output = compile("call draw\nend\ndraw:\nreturn");
        assert_eq!(
            texts(&output),
            vec!["op add _stack1 @counter 1", "jump draw always 0 0", "end", "draw:", "set @counter _stack1"]
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    }

    #[test]
    fn constants_substitute_before_tokenizing() {
        let mut constants = CompilerConsts::new();
        constants.insert("SIZE".to_string(), crate::constants::CompilerConst::Number(8.0));
        let output = Compiler::new(CompilerOptions::default(), constants)
            .compile("test.mlogx", "set size $SIZE\nprint $MISSING")
            .unwrap();
        assert_eq!(output.statements[0].text(), "set size 8");
        assert_eq!(output.statements[0].source.modified_text, "set size 8");
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.message.contains("\"MISSING\" is not defined")));
    }

    #[test]
    fn lenient_mode_skips_bad_lines() {
        let output = compile("wait \"soon\"\nstop");
        assert_eq!(texts(&output), vec!["stop"]);
        assert!(output.diagnostics[0].message.contains("line skipped"));
    }

    #[test]
    fn strict_mode_aborts_on_bad_lines() {
        let options = CompilerOptions {
            strict: true,
            ..CompilerOptions::default()
        };
        let result = Compiler::new(options, CompilerConsts::new()).compile("test.mlogx", "stop\nteleport 1 2");
        match result {
            Err(CompilerError::Resolution { location, .. }) => assert_eq!(location.line, 2),
            other => panic!("expected a resolution error, got {:?}", other),
        }
    }

    #[test]
    fn world_only_instructions_warn_outside_world_processors() {
        let output = compile("setrate 10");
        assert_eq!(texts(&output), vec!["setrate 10"]);
        assert!(output.diagnostics[0].message.contains("world processors"));

        let options = CompilerOptions {
            world_processor: true,
            ..CompilerOptions::default()
        };
        let output = Compiler::new(options, CompilerConsts::new())
            .compile("test.mlogx", "setrate 10")
            .unwrap();
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn block_openers_need_a_brace() {
        let error = Compiler::new(CompilerOptions::default(), CompilerConsts::new())
            .compile("test.mlogx", "&if true\n}")
            .unwrap_err();
        assert!(error.to_string().contains("Expected \"{\""), "{}", error);
    }

    #[test]
    fn directives_fill_the_header_and_seed_parameters() {
        let output = compile("#program_type function\n#function heal(target:unit)\nucontrol targetp target true");
        assert_eq!(output.header.program_type, crate::directives::ProgramType::Function);
        assert_eq!(output.header.function.as_ref().map(|f| f.name.as_str()), Some("heal"));
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    }

    #[test]
    fn directives_inside_blocks_are_fatal() {
        let error = Compiler::new(CompilerOptions::default(), CompilerConsts::new())
            .compile("test.mlogx", "namespace a {\n#author me\n}")
            .unwrap_err();
        assert!(matches!(error, CompilerError::Structure { .. }));
    }

    #[test]
    fn render_can_drop_unused_labels_and_annotate_sources() {
        let options = CompilerOptions {
            include_source: true,
            remove_unused_jump_labels: true,
            ..CompilerOptions::default()
        };
        let compiler = Compiler::new(options, CompilerConsts::new());
        let output = compiler
            .compile("test.mlogx", "unused:\nloop:\nset x 1\njump loop always")
            .unwrap();
        assert_eq!(
            compiler.render(&output.statements),
            "loop:\nset x 1\njump loop always 0 0 # test.mlogx:4\n"
        );
    }
}
