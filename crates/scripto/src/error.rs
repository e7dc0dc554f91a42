//! Error types for scripto

use thiserror::Error;

use crate::value::ParamType;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or running a script
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("{command}: {error:#}")]
    Dispatch {
        command: String,
        error: anyhow::Error,
    },

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Argument '{name}' is not of type {expected}")]
    ArgumentType { name: String, expected: ParamType },

    #[error("Shell config error: {0}")]
    ShellConfig(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Line editor error: {0}")]
    Readline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the interactive shell may report this error and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Parse(_)
                | Error::Dispatch { .. }
                | Error::MissingArgument(_)
                | Error::ArgumentType { .. }
        )
    }
}

/// Malformed function contracts, caught before any input is parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No functions registered")]
    NoFunctions,

    #[error("No type annotation found for parameter: \"{param}\" in function: \"{function}\"")]
    MissingAnnotation { function: String, param: String },

    #[error("Flag {flag} is claimed by both '{first}' and '{second}' in the {param} group of '{function}'")]
    FlagCollision {
        function: String,
        param: String,
        flag: String,
        first: String,
        second: String,
    },

    #[error("Parameter \"{param}\" is declared twice in function: \"{function}\"")]
    DuplicateParameter { function: String, param: String },

    #[error("Command name '{0}' is used more than once")]
    DuplicateCommand(String),

    #[error("Command name '{0}' is reserved by the interactive shell")]
    ReservedCommand(String),

    #[error("Constraint value '{value}' for \"{param}\" in \"{function}\" is not a valid {expected}")]
    ConstraintType {
        function: String,
        param: String,
        value: String,
        expected: ParamType,
    },

    #[error("Default '{value}' for \"{param}\" in \"{function}\" is not a valid {expected}")]
    DefaultType {
        function: String,
        param: String,
        value: String,
        expected: ParamType,
    },

    #[error("List parameter \"{param}\" in \"{function}\" must be the last positional argument")]
    ListPositionalNotLast { function: String, param: String },

    #[error("'{name}' in \"{function}\" does not make a usable flag name")]
    InvalidFlagName { function: String, name: String },

    #[error("Parameter \"{param}\" in \"{function}\" clashes with the log level flags")]
    ReservedParameter { function: String, param: String },
}

/// Non-fatal problem found while reading a function's documentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationWarning {
    pub function: String,
    pub param: String,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// No `:param name:` entry in the docstring
    MissingDescription,
    /// No declared type, inferred from the default or string
    MissingAnnotation,
}

impl std::fmt::Display for DocumentationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            WarningKind::MissingDescription => write!(
                f,
                "Documentation not sufficient to parse description for parameter: \"{}\" in function: \"{}\"",
                self.param, self.function
            ),
            WarningKind::MissingAnnotation => write!(
                f,
                "No type annotation for: \"{}\" in function: \"{}\", may result in unexpected behaviour",
                self.param, self.function
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::MissingArgument("x".into()).is_recoverable());
        assert!(Error::Dispatch {
            command: "x".into(),
            error: anyhow::anyhow!("boom"),
        }
        .is_recoverable());
        assert!(!Error::Config(ConfigError::NoFunctions).is_recoverable());
        assert!(!Error::Io(std::io::Error::other("closed")).is_recoverable());
    }

    #[test]
    fn test_dispatch_message_includes_chain() {
        let err = Error::Dispatch {
            command: "prettify".into(),
            error: anyhow::anyhow!("inner").context("outer"),
        };
        assert_eq!(err.to_string(), "prettify: outer: inner");
    }
}
