use crate::constants::{CompilerConst, CompilerConsts};
use crate::error::CompilerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Abort the unit on the first line that fails to resolve.
    pub strict: bool,
    /// Allow world-processor-only instructions without a warning.
    pub world_processor: bool,
    /// Append `# file:line` to lines that differ from their source.
    pub include_source: bool,
    pub remove_unused_jump_labels: bool,
}

/// Project settings, read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub name: String,
    pub authors: Vec<String>,
    pub compiler_constants: CompilerConsts,
    pub compiler_options: CompilerOptions,
}

impl Settings {
    pub const FILE_NAME: &'static str = "config.json";

    /// The settings file that applies to a source file: `config.json` in the same directory.
    pub fn path_for(input: &Path) -> PathBuf {
        input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(Self::FILE_NAME)
    }

    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, CompilerError> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CompilerError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Applies a `NAME=VALUE` definition from the command line, replacing any file value.
    pub fn define(&mut self, definition: &str) -> Result<(), String> {
        let Some((name, value)) = definition.split_once('=') else {
            return Err(format!("Expected NAME=VALUE, got \"{}\"", definition));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("Missing constant name in \"{}\"", definition));
        }
        self.compiler_constants
            .insert(name.to_string(), CompilerConst::parse(value.trim()));
        Ok(())
    }
}
