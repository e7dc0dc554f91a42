//! Scripto - Turn documented functions into command-line tools
//!
//! Describe a function once (name, typed parameters, docstring) and get a
//! full argument parser for it: flags, defaults, choices, mutually exclusive
//! groups and subcommands. Optionally drop into an interactive shell that
//! keeps a variable environment between calls.

pub mod app;
pub mod assembler;
pub mod config;
pub mod constraint;
pub mod descriptor;
pub mod dispatch;
pub mod docstring;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod paths;
pub mod registry;
pub mod shell;
pub mod spec;
pub mod value;

pub use app::{Outcome, Scripto};
pub use config::{InteractiveMode, Settings, ShellConfig};
pub use constraint::{ConstraintSet, RawConstraint};
pub use descriptor::{Function, Param};
pub use dispatch::Arguments;
pub use error::{ConfigError, Error, Result};
pub use registry::{Registration, RegistrationReport};
pub use value::{ParamType, Value};
