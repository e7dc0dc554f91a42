//! Parser assembly
//!
//! Turns the registry into clap command trees. The batch tree parses the
//! process arguments; the shell tree parses one REPL line at a time and
//! carries the meta-commands.

use std::collections::HashSet;
use std::ffi::OsString;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::config::Settings;
use crate::dispatch::ArgMap;
use crate::error::ConfigError;
use crate::logging::{self, LogLevel, LOG_LEVEL};
use crate::registry::{CommandRegistry, RegisteredFunction};
use crate::spec::{self, Action, ArgumentSpec};
use crate::value::Value;

/// Shell meta-commands, plus `exit`
pub const RESERVED: &[&str] = &["set", "show", "help", "exit"];

const INTERACTIVE: &str = "interactive";

/// A parsed call to one registered function
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Index into the registry
    pub command: usize,
    /// Only the values present on the command line
    pub explicit: ArgMap,
}

impl Invocation {
    /// Log level flag given with the call, if any
    pub fn log_level(&self) -> Option<LogLevel> {
        match self.explicit.get(LOG_LEVEL) {
            Some(Value::Str(level)) => LogLevel::from_str(level),
            _ => None,
        }
    }
}

/// Result of parsing the process arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Invoke(Invocation),
    /// Multi-command tree without a subcommand
    NoCommand { interactive: bool },
}

/// Result of parsing one shell line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Set(Vec<String>),
    Show,
    Help(Option<String>),
    Invoke(Invocation),
}

/// The specs behind one function command
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    specs: Vec<ArgumentSpec>,
}

impl Entry {
    fn collect(&self, command: usize, matches: &ArgMatches) -> Invocation {
        let explicit = self
            .specs
            .iter()
            .filter_map(|spec| spec.extract(matches).map(|v| (spec.param.clone(), v)))
            .collect();
        Invocation { command, explicit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Flat,
    Multi,
}

/// Builds command trees from the registry
pub struct ParserAssembler<'a> {
    registry: &'a CommandRegistry,
    settings: &'a Settings,
}

impl<'a> ParserAssembler<'a> {
    pub fn new(registry: &'a CommandRegistry, settings: &'a Settings) -> Self {
        Self { registry, settings }
    }

    /// The tree for process arguments
    ///
    /// One function is parsed flat; several become subcommands.
    pub fn build(&self) -> Result<CommandTree, ConfigError> {
        let entries = self.entries()?;
        let root = Command::new(self.settings.name.clone());

        if let [entry] = entries.as_slice() {
            let function = self.function(0)?;
            let about = with_keyed_lines(&self.settings.description, function, &entry.specs);
            let command = apply_specs(root.about(about), &entry.specs);
            tracing::debug!("Assembled flat parser for {}", entry.name);
            return Ok(CommandTree {
                command,
                entries,
                layout: Layout::Flat,
                interactive_flag: false,
            });
        }

        check_unique(self.registry)?;

        let interactive_flag = self.settings.interactive.is_enabled();
        let mut root = root
            .about(self.settings.description.clone())
            .subcommand_required(false)
            .disable_help_subcommand(true);
        if interactive_flag {
            root = root.arg(
                Arg::new(INTERACTIVE)
                    .long(INTERACTIVE)
                    .help("Start the interactive shell")
                    .action(ArgAction::SetTrue),
            );
        }
        for (index, entry) in entries.iter().enumerate() {
            root = root.subcommand(self.subcommand(index, entry)?);
        }

        tracing::debug!("Assembled parser with {} commands", entries.len());
        Ok(CommandTree {
            command: root,
            entries,
            layout: Layout::Multi,
            interactive_flag,
        })
    }

    /// The lenient tree for shell lines
    ///
    /// Nothing is required here: missing values may come from the
    /// environment and are checked at dispatch.
    pub fn build_shell(&self) -> Result<ShellTree, ConfigError> {
        let mut entries = self.entries()?;
        check_unique(self.registry)?;
        for spec in entries.iter_mut().flat_map(|e| e.specs.iter_mut()) {
            spec.required = false;
        }

        for function in self.registry.iter() {
            let desc = &function.descriptor;
            let name = desc.command_name();
            if let Some(clash) = std::iter::once(&name)
                .chain(desc.aliases.iter())
                .find(|n| RESERVED.contains(&n.as_str()))
            {
                return Err(ConfigError::ReservedCommand(clash.clone()));
            }
        }

        let mut root = Command::new(self.settings.name.clone())
            .about(self.settings.description.clone())
            .no_binary_name(true)
            .subcommand_required(true)
            .disable_help_subcommand(true)
            .subcommand(
                Command::new("set").about("Set environment variables").arg(
                    Arg::new("pairs")
                        .value_name("KEY=VALUE")
                        .num_args(0..)
                        .action(ArgAction::Append),
                ),
            )
            .subcommand(Command::new("show").about("Show environment variables"))
            .subcommand(
                Command::new("help")
                    .about("Show help for the shell or a command")
                    .arg(Arg::new("command").value_name("COMMAND")),
            );
        for (index, entry) in entries.iter().enumerate() {
            root = root.subcommand(self.subcommand(index, entry)?);
        }

        Ok(ShellTree {
            command: root,
            entries,
        })
    }

    fn function(&self, index: usize) -> Result<&RegisteredFunction, ConfigError> {
        self.registry.get(index).ok_or(ConfigError::NoFunctions)
    }

    fn entries(&self) -> Result<Vec<Entry>, ConfigError> {
        if self.registry.is_empty() {
            return Err(ConfigError::NoFunctions);
        }
        self.registry
            .iter()
            .map(|function| {
                Ok(Entry {
                    name: function.descriptor.command_name(),
                    specs: self.function_specs(function)?,
                })
            })
            .collect()
    }

    /// Help flag first, then parameters, then the logging group
    fn function_specs(&self, function: &RegisteredFunction) -> Result<Vec<ArgumentSpec>, ConfigError> {
        let desc = &function.descriptor;
        let mut specs = vec![ArgumentSpec::help_flag()];
        for (param, constraint) in desc.params.iter().zip(&function.constraints) {
            specs.push(ArgumentSpec::generate(&desc.name, param, constraint)?);
        }
        if self.settings.auto_log {
            if let Some(param) = desc
                .params
                .iter()
                .find(|p| spec::kebab(&p.name) == spec::kebab(LOG_LEVEL))
            {
                return Err(ConfigError::ReservedParameter {
                    function: desc.name.clone(),
                    param: param.name.clone(),
                });
            }
            specs.push(logging::log_level_spec());
        }

        let specs = spec::resolve_conflicts(specs);
        spec::check_positionals(&desc.name, &specs)?;
        Ok(specs)
    }

    fn subcommand(&self, index: usize, entry: &Entry) -> Result<Command, ConfigError> {
        let function = self.function(index)?;
        let desc = &function.descriptor;
        let long_about = with_keyed_lines(&desc.description, function, &entry.specs);
        let command = Command::new(entry.name.clone())
            .about(desc.summary.clone())
            .long_about(long_about)
            .aliases(desc.aliases.clone());
        Ok(apply_specs(command, &entry.specs))
    }
}

fn apply_specs(command: Command, specs: &[ArgumentSpec]) -> Command {
    let mut command = command.disable_help_flag(true);
    for spec in specs {
        let (args, group) = spec.to_clap();
        command = command.args(args);
        if let Some(group) = group {
            command = command.group(group);
        }
    }
    command
}

/// Keyed parameters are listed under the description
fn with_keyed_lines(description: &str, function: &RegisteredFunction, specs: &[ArgumentSpec]) -> String {
    let mut text = description.to_string();
    for spec in specs {
        if !matches!(spec.action, Action::Exclusive(_)) {
            continue;
        }
        if let Some(param) = function.descriptor.param(&spec.param) {
            text.push_str(&format!("\n\t{} - {}", param.name, param.description));
        }
    }
    text
}

fn check_unique(registry: &CommandRegistry) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for function in registry.iter() {
        let desc = &function.descriptor;
        for name in std::iter::once(desc.command_name()).chain(desc.aliases.iter().cloned()) {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateCommand(name));
            }
        }
    }
    Ok(())
}

/// The assembled batch parser
#[derive(Debug, Clone)]
pub struct CommandTree {
    command: Command,
    entries: Vec<Entry>,
    layout: Layout,
    interactive_flag: bool,
}

impl CommandTree {
    /// Parse arguments, binary name first
    pub fn try_parse_from<I, T>(&self, args: I) -> Result<Parsed, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;

        if self.layout == Layout::Flat {
            return Ok(Parsed::Invoke(self.entries[0].collect(0, &matches)));
        }

        match matches.subcommand() {
            Some((name, sub)) => {
                let index = position(&self.entries, name);
                Ok(Parsed::Invoke(self.entries[index].collect(index, sub)))
            }
            None => Ok(Parsed::NoCommand {
                interactive: self.interactive_flag && matches.get_flag(INTERACTIVE),
            }),
        }
    }

    pub fn is_multi(&self) -> bool {
        self.layout == Layout::Multi
    }

    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }
}

/// The assembled shell parser
#[derive(Debug, Clone)]
pub struct ShellTree {
    command: Command,
    entries: Vec<Entry>,
}

impl ShellTree {
    /// Parse the tokens of one shell line
    pub fn parse(&self, tokens: &[String]) -> Result<ShellCommand, clap::Error> {
        let matches = self.command.clone().try_get_matches_from(tokens)?;
        match matches.subcommand() {
            Some(("set", sub)) => Ok(ShellCommand::Set(
                sub.get_many::<String>("pairs")
                    .map(|pairs| pairs.cloned().collect())
                    .unwrap_or_default(),
            )),
            Some(("show", _)) => Ok(ShellCommand::Show),
            Some(("help", sub)) => Ok(ShellCommand::Help(sub.get_one::<String>("command").cloned())),
            Some((name, sub)) => {
                let index = position(&self.entries, name);
                Ok(ShellCommand::Invoke(self.entries[index].collect(index, sub)))
            }
            None => Err(self
                .command
                .clone()
                .error(clap::error::ErrorKind::MissingSubcommand, "No command given")),
        }
    }

    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Help for one command, looked up by name or alias
    pub fn command_help(&self, name: &str) -> Option<String> {
        let mut command = self.command.clone();
        command.build();
        command
            .find_subcommand_mut(name)
            .map(|sub| sub.render_long_help().to_string())
    }
}

/// clap reports the canonical name even when an alias was typed
fn position(entries: &[Entry], name: &str) -> usize {
    entries.iter().position(|e| e.name == name).unwrap_or(0)
}
