//! Compiler from the extended mlogx dialect to base Mindustry logic.
//!
//! A unit is compiled line by line: each line is cleaned, split on `;`,
//! has its compiler constants substituted and is tokenized, then resolved
//! against the instruction table. Extended instructions expand into base
//! instructions, block constructs (`namespace`, `&for`, `&if`) rewrite or
//! buffer what is compiled inside them, and every statement that reaches the
//! output is type checked.

pub mod analysis;
pub mod args;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod directives;
pub mod error;
pub mod expand;
pub mod lexer;
pub mod stack;
pub mod statement;
pub mod types;

pub use analysis::TypeCheckingData;
pub use compiler::{CompileOutput, Compiler};
pub use config::{CompilerOptions, Settings};
pub use constants::{CompilerConst, CompilerConsts};
pub use error::{CompilerError, Diagnostic, Severity, SourceLocation};
pub use statement::Statement;
