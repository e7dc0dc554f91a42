//! Script settings and shell configuration

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::descriptor::Validation;
use crate::error::{Error, Result};

/// When the interactive shell is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractiveMode {
    /// Never
    #[default]
    Off,
    /// Only with `--interactive`
    OnFlag,
    /// Whenever no subcommand is given
    Default,
}

impl InteractiveMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// How a script is built and run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Program name shown in usage and the shell intro
    pub name: String,
    pub description: String,
    /// Silence documentation warnings
    pub suppress_warnings: bool,
    /// Treat parameters without a type as a configuration error
    pub strict_annotations: bool,
    /// Add the log level flags to every command
    pub auto_log: bool,
    pub interactive: InteractiveMode,
    /// Color of the shell intro title
    pub title_color: String,
}

impl Settings {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            name: program_name(),
            description: description.into(),
            suppress_warnings: false,
            strict_annotations: false,
            auto_log: false,
            interactive: InteractiveMode::Off,
            title_color: "white".to_string(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn suppress_warnings(mut self, yes: bool) -> Self {
        self.suppress_warnings = yes;
        self
    }

    pub fn strict_annotations(mut self, yes: bool) -> Self {
        self.strict_annotations = yes;
        self
    }

    pub fn auto_log(mut self, yes: bool) -> Self {
        self.auto_log = yes;
        self
    }

    pub fn interactive(mut self, mode: InteractiveMode) -> Self {
        self.interactive = mode;
        self
    }

    pub fn title_color(mut self, color: impl Into<String>) -> Self {
        self.title_color = color.into();
        self
    }

    pub(crate) fn validation(&self) -> Validation {
        Validation {
            strict_annotations: self.strict_annotations,
            suppress_warnings: self.suppress_warnings,
        }
    }
}

/// File stem of the running executable
fn program_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(String::from)
        .unwrap_or_else(|| "script".to_string())
}

/// Interactive shell configuration, read from `shell.toml`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShellConfig {
    /// Prompt text, without the trailing space
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Load and save line history
    #[serde(default = "default_history")]
    pub history: bool,

    /// Maximum number of history entries kept
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_prompt() -> String {
    ">".to_string()
}

fn default_history() -> bool {
    true
}

fn default_history_size() -> usize {
    1000
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            history: default_history(),
            history_size: default_history_size(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from file or use defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::ShellConfig(format!("{}: {}", path.display(), e)))
    }
}
