use mlogx::types::ArgType;
use mlogx::{CompileOutput, Compiler, CompilerError, CompilerOptions, CompilerConsts, Settings};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

fn compiler() -> Compiler {
    Compiler::new(CompilerOptions::default(), CompilerConsts::new())
}

fn compile(source: &str) -> CompileOutput {
    compiler().compile("main.mlogx", source).unwrap()
}

fn texts(output: &CompileOutput) -> Vec<String> {
    output.statements.iter().map(|statement| statement.text()).collect()
}

fn messages(output: &CompileOutput) -> Vec<String> {
    output.diagnostics.iter().map(|diagnostic| diagnostic.message.clone()).collect()
}

#[test]
fn op_defines_its_output_as_a_number() {
    let output = compile("op add x 5 5");
    assert_eq!(texts(&output), vec!["op add x 5 5"]);
    assert_eq!(output.type_data.variable_definitions["x"][0].ty, ArgType::Number);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn a_missing_jump_label_is_reported_exactly_once() {
    let output = compile("jump undefinedLabel equal a b");
    let missing: Vec<String> = messages(&output)
        .into_iter()
        .filter(|message| message.contains("missing"))
        .collect();
    assert_eq!(missing.len(), 1, "{:?}", missing);
    assert!(missing[0].contains("undefinedLabel"));
}

#[test]
fn range_loops_unroll_with_substituted_provenance() {
    let output = compile("&for i in 1 3 {\nprint $i\n}");
    assert_eq!(texts(&output), vec!["print 1", "print 2", "print 3"]);
    let sources: Vec<&str> = output
        .statements
        .iter()
        .map(|statement| statement.source.source_text.as_str())
        .collect();
    assert_eq!(sources, vec!["print 1", "print 2", "print 3"]);
    assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
}

#[test]
fn enumerated_loops_take_array_constants() {
    let settings: Settings =
        serde_json::from_str(r#"{ "compilerConstants": { "cells": ["cell1", "cell2"] } }"#).unwrap();
    let output = Compiler::from_settings(&settings)
        .compile("main.mlogx", "&for c of $cells {\nwrite 0 $c 0\n}")
        .unwrap();
    assert_eq!(texts(&output), vec!["write 0 cell1 0", "write 0 cell2 0"]);
}

#[test]
fn reassigning_a_different_type_conflicts() {
    let output = compile("set x 5\nset x \"hello\"");
    let messages = messages(&output);
    assert_eq!(messages.len(), 1, "{:?}", messages);
    assert!(messages[0].contains("conflicting types"));
}

#[test]
fn an_unmatched_brace_halts_the_unit() {
    let error = compiler().compile("main.mlogx", "stop\n}\nend").unwrap_err();
    match error {
        CompilerError::Structure { message, location } => {
            assert_eq!(message, "No block to end");
            assert_eq!(location.line, 2);
        }
        other => panic!("expected a structure error, got {:?}", other),
    }
}

#[test]
fn false_conditionals_reach_neither_output_nor_checker() {
    let output = compile("&if false {\nprint neverDefined\njump nowhere always\n}\nstop");
    assert_eq!(texts(&output), vec!["stop"]);
    assert!(output.type_data.variable_usages.is_empty());
    assert!(output.type_data.jump_labels_used.is_empty());
    assert!(output.diagnostics.is_empty());
}

#[test]
fn any_disabled_conditional_discards_its_body() {
    let output = compile("&if false {\n&if true {\nprint 1\n}\n}\n&if true {\n&if 0 {\nprint 2\n}\n}");
    assert!(texts(&output).is_empty(), "{:?}", texts(&output));
    assert!(output.type_data.variable_usages.is_empty());
}

#[test]
fn sibling_namespaces_do_not_alias() {
    let output = compile("namespace a {\nset x 1\n}\nnamespace b {\nset x 2\n}");
    assert_eq!(texts(&output), vec!["set _a_x 1", "set _b_x 2"]);
}

#[test]
fn nested_namespaces_join_the_whole_chain() {
    let output = compile("namespace outer {\nnamespace inner {\nincrement count\n}\n}");
    assert_eq!(texts(&output), vec!["op add _outer_inner_count _outer_inner_count 1"]);
}

#[test]
fn loops_inside_namespaces_bind_after_prefixing() {
    let output = compile("namespace io {\n&for i in 0 1 {\nread v$i cell1 $i\n}\n}");
    assert_eq!(texts(&output), vec!["read _io_v0 cell1 0", "read _io_v1 cell1 1"]);
}

#[test]
fn namespaces_named_after_loop_variables_unroll() {
    let output = compile("&for i in 0 1 {\nnamespace n$i {\nset x 1\n}\n}");
    assert_eq!(texts(&output), vec!["set _n0_x 1", "set _n1_x 1"]);
    assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
}

#[test]
fn unrolled_lines_that_stop_resolving_are_skipped() {
    let source = "&for v of \"a\" @copper {\nop add x $v 1\n}\nend";

    let lenient = compile(source);
    assert_eq!(texts(&lenient), vec!["end"]);
    let skipped: Vec<String> = messages(&lenient)
        .into_iter()
        .filter(|message| message.contains("line skipped"))
        .collect();
    assert_eq!(skipped.len(), 2, "{:?}", skipped);
    assert!(lenient.type_data.variable_definitions.is_empty());

    let strict = Compiler::new(
        CompilerOptions {
            strict: true,
            ..CompilerOptions::default()
        },
        CompilerConsts::new(),
    );
    match strict.compile("main.mlogx", source).unwrap_err() {
        CompilerError::Resolution { location, .. } => assert_eq!(location.line, 2),
        other => panic!("expected a resolution error, got {:?}", other),
    }
}

#[test]
fn unclosed_blocks_are_listed_with_their_openers() {
    let error = compiler()
        .compile("main.mlogx", "namespace a {\nset x 1\n&for i in 0 1 {\nprint $i")
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("namespace a opened at main.mlogx:1"), "{}", message);
    assert!(message.contains("&for i opened at main.mlogx:3"), "{}", message);
}

#[test]
fn oversized_loops_are_rejected() {
    let error = compiler().compile("main.mlogx", "&for i in 0 500 {\n}").unwrap_err();
    assert!(matches!(error, CompilerError::Structure { .. }));
}

#[test]
fn strict_and_lenient_modes_differ_on_bad_lines() {
    let source = "set x 1\nucontrol fly x\nprint x";

    let lenient = compile(source);
    assert_eq!(texts(&lenient), vec!["set x 1", "print x"]);
    assert!(messages(&lenient)[0].contains("line skipped"));

    let strict = Compiler::new(
        CompilerOptions {
            strict: true,
            ..CompilerOptions::default()
        },
        CompilerConsts::new(),
    );
    let error = strict.compile("main.mlogx", source).unwrap_err();
    assert!(matches!(error, CompilerError::Resolution { .. }));
}

#[test]
fn compiles_a_project_with_settings_on_disk() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("main.mlogx");
    fs::write(
        dir.path().join(Settings::FILE_NAME),
        r#"{ "compilerConstants": { "LIMIT": 10 }, "compilerOptions": { "removeUnusedJumpLabels": true } }"#,
    )
    .unwrap();
    fs::write(
        &input,
        "#program_type main\nset i 0\nstart:\nloop:\nincrement i\njump loop lessThan i $LIMIT\nend\n",
    )
    .unwrap();

    let settings = Settings::load(&Settings::path_for(&input)).unwrap();
    let compiler = Compiler::from_settings(&settings);
    let source = fs::read_to_string(&input).unwrap();
    let output = compiler.compile("main.mlogx", &source).unwrap();

    assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
    assert_eq!(
        compiler.render(&output.statements),
        "set i 0\nloop:\nop add i i 1\njump loop lessThan i 10\nend\n"
    );
}
