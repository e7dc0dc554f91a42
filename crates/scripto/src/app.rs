//! The composition root
//!
//! [`Scripto`] owns the registry and settings. `run` is what a binary
//! calls from `main`; `execute` is the same flow with injectable
//! arguments, input and output.

use std::ffi::OsString;
use std::io::{self, Write};

use colored::Colorize;

use crate::assembler::{Invocation, Parsed, ParserAssembler};
use crate::config::{InteractiveMode, Settings, ShellConfig};
use crate::descriptor::Function;
use crate::dispatch::{Arguments, Dispatcher};
use crate::error::Result;
use crate::logging::{self, LogHandle};
use crate::paths::Paths;
use crate::registry::{CommandRegistry, Registration, RegistrationReport};
use crate::shell::{EditorReader, InteractiveShell, LineReader};

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A function ran
    Completed,
    /// The interactive shell was entered and left
    ShellClosed,
    /// No subcommand was given; help was printed
    NoCommand,
}

/// A script: registered functions plus how to expose them
pub struct Scripto {
    settings: Settings,
    registry: CommandRegistry,
    shell_config: Option<ShellConfig>,
    log: Option<LogHandle>,
}

impl Scripto {
    pub fn new(settings: Settings) -> Self {
        let registry = CommandRegistry::new(settings.validation());
        Self {
            settings,
            registry,
            shell_config: None,
            log: None,
        }
    }

    /// Use this shell configuration instead of reading `shell.toml`
    pub fn with_shell_config(mut self, config: ShellConfig) -> Self {
        self.shell_config = Some(config);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a function and the handler that implements it
    pub fn register<F>(
        &mut self,
        function: Function,
        registration: Registration,
        handler: F,
    ) -> Result<RegistrationReport>
    where
        F: Fn(&Arguments) -> anyhow::Result<Option<String>> + 'static,
    {
        let report = self.registry.register(function, registration, handler)?;
        tracing::debug!(
            "Registered {} ({} constraints applied)",
            report.function,
            report.accepted.len()
        );
        Ok(report)
    }

    /// Parse the process arguments and run what they ask for
    ///
    /// Exits with status 2 on a parse error and 1 when no subcommand was
    /// given and the shell is not entered.
    pub fn run(mut self) -> Result<()> {
        self.log = logging::init();
        self.emit_warnings();

        let tree = ParserAssembler::new(&self.registry, &self.settings).build()?;
        let parsed = match tree.try_parse_from(std::env::args_os()) {
            Ok(parsed) => parsed,
            Err(e) => e.exit(),
        };

        let stdout = io::stdout();
        let mut out = stdout.lock();
        match parsed {
            Parsed::Invoke(invocation) => self.invoke(&invocation, &mut out),
            Parsed::NoCommand { interactive } if self.enters_shell(interactive) => {
                let config = self.shell_config()?;
                let paths = Paths::for_script(&self.settings.name);
                let mut reader = EditorReader::new(&config, paths.history())?;
                self.shell(&config, &mut reader, &mut out)
            }
            Parsed::NoCommand { .. } => {
                write!(out, "{}", tree.render_help())?;
                out.flush()?;
                std::process::exit(1);
            }
        }
    }

    /// Run with explicit arguments, binary name first
    pub fn execute<I, T>(
        &self,
        args: I,
        reader: &mut dyn LineReader,
        out: &mut dyn Write,
    ) -> Result<Outcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let tree = ParserAssembler::new(&self.registry, &self.settings).build()?;
        match tree.try_parse_from(args)? {
            Parsed::Invoke(invocation) => {
                self.invoke(&invocation, out)?;
                Ok(Outcome::Completed)
            }
            Parsed::NoCommand { interactive } if self.enters_shell(interactive) => {
                let config = self.shell_config()?;
                self.shell(&config, reader, out)?;
                Ok(Outcome::ShellClosed)
            }
            Parsed::NoCommand { .. } => {
                write!(out, "{}", tree.render_help())?;
                Ok(Outcome::NoCommand)
            }
        }
    }

    fn emit_warnings(&self) {
        for warning in self.registry.warnings() {
            tracing::warn!("{}", warning);
        }
    }

    fn enters_shell(&self, flagged: bool) -> bool {
        match self.settings.interactive {
            InteractiveMode::Off => false,
            InteractiveMode::OnFlag => flagged,
            InteractiveMode::Default => true,
        }
    }

    fn shell_config(&self) -> Result<ShellConfig> {
        match &self.shell_config {
            Some(config) => Ok(config.clone()),
            None => ShellConfig::load(&Paths::for_script(&self.settings.name).shell_config()),
        }
    }

    fn invoke(&self, invocation: &Invocation, out: &mut dyn Write) -> Result<()> {
        if let (Some(level), Some(log)) = (invocation.log_level(), &self.log) {
            log.set_level(level)?;
        }
        if let Some(output) = Dispatcher::new(&self.registry).dispatch(invocation, None)? {
            writeln!(out, "{}", output)?;
        }
        Ok(())
    }

    fn shell(
        &self,
        config: &ShellConfig,
        reader: &mut dyn LineReader,
        out: &mut dyn Write,
    ) -> Result<()> {
        let tree = ParserAssembler::new(&self.registry, &self.settings).build_shell()?;
        self.intro(out)?;
        InteractiveShell::new(&self.registry, tree, config)
            .with_log_handle(self.log.as_ref())
            .run(reader, out)
    }

    fn intro(&self, out: &mut dyn Write) -> Result<()> {
        let title = self
            .settings
            .name
            .as_str()
            .color(self.settings.title_color.as_str())
            .bold();
        writeln!(out, "{}", title)?;
        if !self.settings.description.is_empty() {
            writeln!(out, "{}", self.settings.description)?;
        }
        writeln!(
            out,
            "{}",
            "Type 'help' for commands, 'exit' to leave.".dimmed()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::descriptor::Param;
    use crate::error::{ConfigError, Error};
    use crate::shell::ReadOutcome;
    use crate::value::ParamType;

    struct Lines(VecDeque<String>);

    impl Lines {
        fn new(lines: &[&str]) -> Self {
            Self(lines.iter().map(|l| l.to_string()).collect())
        }
    }

    impl LineReader for Lines {
        fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
            Ok(self.0.pop_front().map_or(ReadOutcome::Eof, ReadOutcome::Line))
        }
    }

    fn test_func() -> Function {
        Function::new(
            "test_func",
            "Some fancy docstring describing the function.
            :param param_a: The first parameter passed to the function.
            :param param_b: The second one.",
        )
        .param(Param::new("param_a", ParamType::Int))
        .param(Param::new("param_b", ParamType::Int).default(5))
    }

    fn sum(args: &Arguments) -> anyhow::Result<Option<String>> {
        Ok(Some((args.int("param_a")? + args.int("param_b")?).to_string()))
    }

    fn single() -> Scripto {
        let mut app = Scripto::new(Settings::new("Adds numbers").name("adder"));
        app.register(test_func(), Registration::new(), sum).unwrap();
        app
    }

    fn multi(mode: InteractiveMode) -> Scripto {
        let settings = Settings::new("Adds numbers").name("adder").interactive(mode);
        let mut app = Scripto::new(settings).with_shell_config(ShellConfig::default());
        app.register(test_func(), Registration::new(), sum).unwrap();
        app.register(
            Function::new("echo", "Echo a word.\n:param word: The word"),
            Registration::new(),
            |_| Ok(None),
        )
        .unwrap();
        app
    }

    fn execute(app: &Scripto, args: &[&str], lines: &[&str]) -> (Result<Outcome>, String) {
        let mut reader = Lines::new(lines);
        let mut out = Vec::new();
        let result = app.execute(args.iter().copied(), &mut reader, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_flat_execution() {
        let app = single();
        let (result, out) = execute(&app, &["adder", "4", "--param-b", "9"], &[]);
        assert_eq!(result.unwrap(), Outcome::Completed);
        assert_eq!(out, "13\n");

        let (_, out) = execute(&app, &["adder", "4"], &[]);
        assert_eq!(out, "9\n");
    }

    #[test]
    fn test_no_functions_fails_before_parsing() {
        let app = Scripto::new(Settings::new("Nothing"));
        let (result, out) = execute(&app, &["prog", "--help"], &[]);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::NoFunctions))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let app = single();
        let (result, _) = execute(&app, &["adder", "four"], &[]);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_handler_error_is_dispatch_error() {
        let mut app = Scripto::new(Settings::new("Fails").name("fails"));
        app.register(Function::new("fail", "Fails."), Registration::new(), |_| {
            anyhow::bail!("boom")
        })
        .unwrap();
        let (result, _) = execute(&app, &["fails"], &[]);
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Dispatch { .. }));
        assert_eq!(err.to_string(), "fail: boom");
    }

    #[test]
    fn test_no_command_prints_help() {
        let app = multi(InteractiveMode::Off);
        let (result, out) = execute(&app, &["adder"], &[]);
        assert_eq!(result.unwrap(), Outcome::NoCommand);
        assert!(out.contains("test-func"));
        assert!(out.contains("echo"));
    }

    #[test]
    fn test_default_mode_enters_shell() {
        let app = multi(InteractiveMode::Default);
        let (result, out) = execute(&app, &["adder"], &["set param_b=1", "test-func 2"]);
        assert_eq!(result.unwrap(), Outcome::ShellClosed);
        assert!(out.contains("adder"));
        assert!(out.contains("Adds numbers"));
        assert!(out.ends_with("3\n"));
    }

    #[test]
    fn test_on_flag_mode() {
        let app = multi(InteractiveMode::OnFlag);
        let (result, _) = execute(&app, &["adder"], &[]);
        assert_eq!(result.unwrap(), Outcome::NoCommand);

        let (result, _) = execute(&app, &["adder", "--interactive"], &[]);
        assert_eq!(result.unwrap(), Outcome::ShellClosed);
    }

    #[test]
    fn test_subcommand_in_interactive_mode_runs_directly() {
        let app = multi(InteractiveMode::Default);
        let (result, out) = execute(&app, &["adder", "test-func", "1", "-p", "1"], &["exit"]);
        assert_eq!(result.unwrap(), Outcome::Completed);
        assert_eq!(out, "2\n");
    }
}
