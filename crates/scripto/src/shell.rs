//! Interactive shell
//!
//! A line-oriented REPL over the registered functions. Each line is split
//! with shell quoting rules and parsed by the lenient command tree, so a
//! bad line is reported and the prompt comes back. Variables set with
//! `set` fill in parameters on later calls unless given explicitly.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::assembler::{Invocation, ShellCommand, ShellTree};
use crate::config::ShellConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::logging::LogHandle;
use crate::overlay::EnvironmentOverlay;
use crate::registry::CommandRegistry;

/// What one read from the terminal produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D or end of input
    Eof,
}

/// Source of shell lines
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;

    /// Remember an accepted line
    fn add_history(&mut self, _line: &str) {}

    /// Persist history, if the reader keeps any
    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Terminal line editor with optional persistent history
pub struct EditorReader {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl EditorReader {
    pub fn new(config: &ShellConfig, history: PathBuf) -> Result<Self> {
        let rl_config = rustyline::Config::builder()
            .max_history_size(config.history_size)
            .map_err(readline_error)?
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(rl_config).map_err(readline_error)?;

        let history = config.history.then_some(history);
        if let Some(path) = &history {
            // A missing history file is normal on first run
            if let Err(e) = editor.load_history(path) {
                tracing::debug!("No history loaded from {}: {}", path.display(), e);
            }
        }

        Ok(Self { editor, history })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(readline_error(e)),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::debug!("Failed to add history entry: {}", e);
        }
    }

    fn save(&mut self) -> Result<()> {
        let Some(path) = &self.history else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.editor.save_history(path).map_err(readline_error)
    }
}

fn readline_error(e: ReadlineError) -> Error {
    Error::Readline(e.to_string())
}

/// Shell states between two prompts
#[derive(Debug, Clone, PartialEq)]
enum State {
    Prompt,
    MetaSet(Vec<String>),
    MetaShow,
    MetaHelp(Option<String>),
    Dispatch(Invocation),
    Exit,
}

/// The REPL over one registry
pub struct InteractiveShell<'a> {
    registry: &'a CommandRegistry,
    tree: ShellTree,
    overlay: EnvironmentOverlay,
    prompt: String,
    log: Option<&'a LogHandle>,
}

impl<'a> InteractiveShell<'a> {
    pub fn new(registry: &'a CommandRegistry, tree: ShellTree, config: &ShellConfig) -> Self {
        Self {
            registry,
            tree,
            overlay: EnvironmentOverlay::new(),
            prompt: format!("{} ", config.prompt),
            log: None,
        }
    }

    /// Let log level flags on a line reload the active filter
    pub fn with_log_handle(mut self, log: Option<&'a LogHandle>) -> Self {
        self.log = log;
        self
    }

    pub fn overlay(&self) -> &EnvironmentOverlay {
        &self.overlay
    }

    /// Read and run lines until `exit`, interrupt or end of input
    pub fn run(&mut self, reader: &mut dyn LineReader, out: &mut dyn Write) -> Result<()> {
        let mut state = State::Prompt;
        loop {
            let outcome = match state {
                State::Exit => break,
                State::Prompt => self.read(reader),
                other => self.step(other, out).map(|()| State::Prompt),
            };

            state = match outcome {
                Ok(next) => next,
                Err(e) if e.is_recoverable() => {
                    report(out, &e)?;
                    State::Prompt
                }
                Err(e) => return Err(e),
            };
        }

        if let Err(e) = reader.save() {
            tracing::warn!("Failed to save shell history: {}", e);
        }
        Ok(())
    }

    fn read(&self, reader: &mut dyn LineReader) -> Result<State> {
        let line = match reader.read_line(&self.prompt)? {
            ReadOutcome::Line(line) => line,
            ReadOutcome::Interrupted | ReadOutcome::Eof => return Ok(State::Exit),
        };

        let line = line.trim();
        if line.is_empty() {
            return Ok(State::Prompt);
        }
        reader.add_history(line);
        self.parse_line(line)
    }

    fn parse_line(&self, line: &str) -> Result<State> {
        if line == "exit" {
            return Ok(State::Exit);
        }

        let tokens = shlex::split(line).ok_or_else(|| {
            clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                "Unbalanced quotes in input\n",
            )
        })?;

        let state = match self.tree.parse(&tokens)? {
            ShellCommand::Set(pairs) => State::MetaSet(pairs),
            ShellCommand::Show => State::MetaShow,
            ShellCommand::Help(target) => State::MetaHelp(target),
            ShellCommand::Invoke(invocation) => State::Dispatch(invocation),
        };
        Ok(state)
    }

    fn step(&mut self, state: State, out: &mut dyn Write) -> Result<()> {
        match state {
            State::MetaSet(pairs) => {
                let report = self.overlay.apply(&pairs);
                for token in report.rejected {
                    writeln!(
                        out,
                        "{} Ignoring '{}', expected key=value",
                        "Warning:".yellow(),
                        token
                    )?;
                }
            }
            State::MetaShow => {
                for (key, value) in self.overlay.iter() {
                    writeln!(out, "{}={}", key, value)?;
                }
            }
            State::MetaHelp(None) => {
                write!(out, "{}", self.tree.render_help())?;
                writeln!(out, "  {}  Leave the shell", "exit".bold())?;
            }
            State::MetaHelp(Some(target)) => match self.tree.command_help(&target) {
                Some(help) => write!(out, "{}", help)?,
                None => writeln!(out, "{} Unknown command: {}", "Error:".red(), target)?,
            },
            State::Dispatch(invocation) => {
                if let (Some(level), Some(log)) = (invocation.log_level(), self.log) {
                    log.set_level(level)?;
                }
                let output = Dispatcher::new(self.registry).dispatch(&invocation, Some(&self.overlay))?;
                if let Some(output) = output {
                    writeln!(out, "{}", output)?;
                }
            }
            State::Prompt | State::Exit => {}
        }
        Ok(())
    }
}

/// Print a recoverable error
fn report(out: &mut dyn Write, error: &Error) -> Result<()> {
    match error {
        // clap renders its own usage, help and error prefix
        Error::Parse(e) => write!(out, "{}", e.render())?,
        other => writeln!(out, "{} {}", "Error:".red(), other)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::assembler::ParserAssembler;
    use crate::config::Settings;
    use crate::descriptor::{Function, Param};
    use crate::registry::Registration;
    use crate::value::ParamType;

    struct Scripted {
        lines: VecDeque<ReadOutcome>,
        history: Vec<String>,
    }

    impl Scripted {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| ReadOutcome::Line(l.to_string())).collect(),
                history: Vec::new(),
            }
        }
    }

    impl LineReader for Scripted {
        fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
            Ok(self.lines.pop_front().unwrap_or(ReadOutcome::Eof))
        }

        fn add_history(&mut self, line: &str) {
            self.history.push(line.to_string());
        }
    }

    struct Failing;

    impl LineReader for Failing {
        fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
            Err(Error::Readline("terminal went away".to_string()))
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::default();
        registry
            .register(
                Function::new(
                    "add",
                    "Add two numbers.\n:param a: First\n:param x: Second",
                )
                .param(Param::new("a", ParamType::Int))
                .param(Param::new("x", ParamType::Int).default(1)),
                Registration::new(),
                |args| Ok(Some((args.int("a")? + args.int("x")?).to_string())),
            )
            .unwrap();
        registry
            .register(
                Function::new("greet", "Greet someone.\n:param name: Who")
                    .param(Param::new("name", ParamType::Str).default("world")),
                Registration::new().alias("hi"),
                |args| Ok(Some(format!("hello {}", args.str("name")?))),
            )
            .unwrap();
        registry
            .register(
                Function::new("fail", "Always fails."),
                Registration::new(),
                |_| anyhow::bail!("boom"),
            )
            .unwrap();
        registry
    }

    fn run_lines(lines: &[&str]) -> (String, EnvironmentOverlay) {
        let registry = registry();
        let settings = Settings::new("Test").name("test");
        let tree = ParserAssembler::new(&registry, &settings).build_shell().unwrap();
        let mut shell = InteractiveShell::new(&registry, tree, &ShellConfig::default());

        let mut reader = Scripted::new(lines);
        let mut out = Vec::new();
        shell.run(&mut reader, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), shell.overlay().clone())
    }

    #[test]
    fn test_set_and_show() {
        let (out, overlay) = run_lines(&["set key=\"a b\" other=3", "show"]);
        assert_eq!(overlay.get("key"), Some("a b"));
        assert_eq!(overlay.get("other"), Some("3"));
        assert_eq!(overlay.len(), 2);
        assert_eq!(out, "key=a b\nother=3\n");
    }

    #[test]
    fn test_malformed_assignment_is_reported() {
        let (out, overlay) = run_lines(&["set good=1 bad"]);
        assert_eq!(overlay.len(), 1);
        assert!(out.contains("Ignoring 'bad'"));
    }

    #[test]
    fn test_dispatch_prints_output() {
        let (out, _) = run_lines(&["add 2 --x 5", "greet"]);
        assert_eq!(out, "7\nhello world\n");
    }

    #[test]
    fn test_overlay_fills_parameters() {
        let (out, _) = run_lines(&["set x=2 name=shell", "add 1", "add 1 --x 3", "hi"]);
        assert_eq!(out, "3\n4\nhello shell\n");
    }

    #[test]
    fn test_errors_do_not_end_the_shell() {
        let (out, _) = run_lines(&["add notanumber", "fail", "nosuch", "add 1"]);
        assert!(out.contains("boom"));
        assert!(out.ends_with("2\n"));
    }

    #[test]
    fn test_environment_fills_required_parameters() {
        let (out, _) = run_lines(&["set a=5", "add", "add --x 2"]);
        assert_eq!(out, "6\n7\n");
    }

    #[test]
    fn test_missing_parameter_is_reported() {
        let (out, _) = run_lines(&["add", "add 1"]);
        assert!(out.contains("Missing argument: a"));
        assert!(out.ends_with("2\n"));
    }

    #[test]
    fn test_unbalanced_quotes() {
        let (out, _) = run_lines(&["greet --name \"open", "add 1"]);
        assert!(out.contains("Unbalanced quotes"));
        assert!(out.ends_with("2\n"));
    }

    #[test]
    fn test_exit_stops_reading() {
        let (out, _) = run_lines(&["", "exit", "add 1"]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_interrupt_exits() {
        let registry = registry();
        let settings = Settings::new("Test").name("test");
        let tree = ParserAssembler::new(&registry, &settings).build_shell().unwrap();
        let mut shell = InteractiveShell::new(&registry, tree, &ShellConfig::default());

        let mut reader = Scripted::new(&[]);
        reader.lines.push_back(ReadOutcome::Interrupted);
        reader.lines.push_back(ReadOutcome::Line("add 1".to_string()));
        let mut out = Vec::new();
        shell.run(&mut reader, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(reader.lines.len(), 1);
    }

    #[test]
    fn test_help() {
        let (out, _) = run_lines(&["help", "help hi", "help nosuch"]);
        assert!(out.contains("greet"));
        assert!(out.contains("exit"));
        assert!(out.contains("Greet someone."));
        assert!(out.contains("Unknown command: nosuch"));
    }

    #[test]
    fn test_history_records_lines() {
        let registry = registry();
        let settings = Settings::new("Test").name("test");
        let tree = ParserAssembler::new(&registry, &settings).build_shell().unwrap();
        let mut shell = InteractiveShell::new(&registry, tree, &ShellConfig::default());

        let mut reader = Scripted::new(&["  add 1  ", "", "show"]);
        shell.run(&mut reader, &mut Vec::new()).unwrap();
        assert_eq!(reader.history, vec!["add 1", "show"]);
    }

    #[test]
    fn test_reader_failure_propagates() {
        let registry = registry();
        let settings = Settings::new("Test").name("test");
        let tree = ParserAssembler::new(&registry, &settings).build_shell().unwrap();
        let mut shell = InteractiveShell::new(&registry, tree, &ShellConfig::default());

        let err = shell.run(&mut Failing, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Readline(_)));
    }
}
