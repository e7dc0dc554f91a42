//! Argument specifications
//!
//! One [`ArgumentSpec`] per parameter, plus the built-in help flag and the
//! optional logging group. Specs are plain data; [`ArgumentSpec::to_clap`]
//! turns them into clap arguments and [`ArgumentSpec::extract`] reads the
//! parsed value back out.

use std::collections::HashMap;
use std::ffi::OsStr;

use clap::builder::{PossibleValue, TypedValueParser, ValueParser};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};

use crate::constraint::{ConstFlag, ConstraintSet, Resolved};
use crate::descriptor::ParameterDescriptor;
use crate::error::ConfigError;
use crate::value::{ParamType, Value};

/// Lower-case, spaces and underscores to hyphens
pub fn kebab(s: &str) -> String {
    s.to_lowercase().replace([' ', '_'], "-")
}

/// Long and short flag for a name
///
/// Leading hyphens are dropped from the long form; the short form is the
/// first ASCII letter or digit, if any. `None` when no long form is left.
pub fn flag_tokens(name: &str) -> Option<(String, Option<char>)> {
    let long = kebab(name).trim_start_matches('-').to_string();
    if long.is_empty() {
        return None;
    }
    let short = long.chars().find(|c| c.is_ascii_alphanumeric());
    Some((long, short))
}

/// What a spec does when it appears on the command line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A bare positional value
    Positional,
    /// `--name VALUE`
    Store,
    /// `--name` sets true
    Toggle,
    /// A value restricted to a closed list, positional or flagged
    Choices(Vec<Value>),
    /// Mutually exclusive flags, each setting a constant
    Exclusive(Vec<ConstFlag>),
    /// Print help
    Help,
}

/// A concrete flag or positional definition
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    /// clap id, always `kebab(param)`
    pub dest: String,
    pub param: String,
    pub ty: ParamType,
    pub long: Option<String>,
    pub short: Option<char>,
    pub help: String,
    pub required: bool,
    pub default: Option<Value>,
    pub action: Action,
}

impl ArgumentSpec {
    /// Derive the spec for one parameter
    pub fn generate(
        function: &str,
        param: &ParameterDescriptor,
        constraint: &ConstraintSet,
    ) -> Result<Self, ConfigError> {
        let dest = kebab(&param.name);
        let flagged = param.ty == ParamType::Bool || param.default.is_some();
        let (long, short) = if flagged {
            let (long, short) =
                flag_tokens(&param.name).ok_or_else(|| ConfigError::InvalidFlagName {
                    function: function.to_string(),
                    name: param.name.clone(),
                })?;
            (Some(long), short)
        } else {
            (None, None)
        };

        let mut help = param.description.clone();
        if let Some(default) = &param.default {
            help = format!("{} Defaults to {} if not provided.", help, default)
                .trim()
                .to_string();
        }

        let mut spec = Self {
            dest,
            param: param.name.clone(),
            ty: param.ty,
            long,
            short,
            help,
            required: false,
            default: param.implicit_default(),
            action: Action::Positional,
        };

        match constraint.resolve(function, param)? {
            None if param.ty == ParamType::Bool => spec.action = Action::Toggle,
            None if flagged => spec.action = Action::Store,
            None => spec.required = true,
            Some(Resolved::Choices { choices, required }) => {
                spec.action = Action::Choices(choices);
                spec.required = required;
            }
            Some(Resolved::Group { flags, required }) => {
                spec.long = None;
                spec.short = None;
                spec.action = Action::Exclusive(flags);
                spec.required = required;
            }
        }

        Ok(spec)
    }

    /// The built-in `--help`/`-h` flag
    pub fn help_flag() -> Self {
        Self {
            dest: "__help".to_string(),
            param: "help".to_string(),
            ty: ParamType::Bool,
            long: Some("help".to_string()),
            short: Some('h'),
            help: "Print help".to_string(),
            required: false,
            default: None,
            action: Action::Help,
        }
    }

    pub fn is_positional(&self) -> bool {
        match self.action {
            Action::Positional => true,
            Action::Choices(_) => self.long.is_none() && self.short.is_none(),
            _ => false,
        }
    }

    /// Build the clap arguments, plus the group for exclusive specs
    pub fn to_clap(&self) -> (Vec<Arg>, Option<ArgGroup>) {
        match &self.action {
            Action::Exclusive(flags) => {
                let args: Vec<Arg> = flags
                    .iter()
                    .map(|flag| {
                        let mut arg = Arg::new(flag.id.clone())
                            .help(flag.help.clone())
                            .action(ArgAction::SetTrue);
                        if let Some(long) = &flag.long {
                            arg = arg.long(long.clone());
                        }
                        if let Some(short) = flag.short {
                            arg = arg.short(short);
                        }
                        arg
                    })
                    .collect();
                let group = ArgGroup::new(self.dest.clone())
                    .args(flags.iter().map(|f| f.id.clone()))
                    .multiple(false)
                    .required(self.required);
                (args, Some(group))
            }
            _ => (vec![self.single_arg()], None),
        }
    }

    fn single_arg(&self) -> Arg {
        let mut arg = Arg::new(self.dest.clone()).help(self.help.clone());
        if let Some(long) = &self.long {
            arg = arg.long(long.clone());
        }
        if let Some(short) = self.short {
            arg = arg.short(short);
        }

        match &self.action {
            Action::Help => arg.action(ArgAction::Help),
            Action::Toggle => arg.action(ArgAction::SetTrue),
            Action::Positional | Action::Store => {
                let arg = arg
                    .value_name(self.param.to_uppercase())
                    .required(self.required)
                    .value_parser(value_parser(self.ty));
                self.multiplicity(arg)
            }
            Action::Choices(choices) => {
                let parser = ChoiceParser {
                    ty: element_type(self.ty),
                    choices: choices.clone(),
                };
                let arg = arg
                    .value_name(self.param.to_uppercase())
                    .required(self.required)
                    .value_parser(parser);
                self.multiplicity(arg)
            }
            Action::Exclusive(_) => arg,
        }
    }

    fn multiplicity(&self, arg: Arg) -> Arg {
        match (self.ty, self.is_positional()) {
            (ParamType::StrList, true) => arg.num_args(1..),
            (ParamType::StrList, false) => arg.num_args(1..).action(ArgAction::Append),
            (_, true) => arg,
            (_, false) => arg.action(ArgAction::Set),
        }
    }

    /// The value given on the command line, if any
    ///
    /// Defaults are never reported here; an absent flag is `None`.
    pub fn extract(&self, matches: &ArgMatches) -> Option<Value> {
        match &self.action {
            Action::Help => None,
            Action::Toggle => matches.get_flag(&self.dest).then_some(Value::Bool(true)),
            Action::Exclusive(flags) => flags
                .iter()
                .find(|f| matches.get_flag(&f.id))
                .map(|f| f.value.clone()),
            _ if self.ty == ParamType::StrList => matches
                .get_many::<Value>(&self.dest)
                .map(|values| Value::List(values.map(|v| v.to_string()).collect())),
            _ => matches.get_one::<Value>(&self.dest).cloned(),
        }
    }
}

/// Lists are parsed one element at a time
fn element_type(ty: ParamType) -> ParamType {
    match ty {
        ParamType::StrList => ParamType::Str,
        other => other,
    }
}

fn value_parser(ty: ParamType) -> ValueParser {
    let ty = element_type(ty);
    ValueParser::new(move |raw: &str| ty.parse(raw))
}

/// Parses to the parameter type first, then checks membership
///
/// Comparing typed values keeps `2.0` and `2` equal for float choices.
#[derive(Clone)]
struct ChoiceParser {
    ty: ParamType,
    choices: Vec<Value>,
}

impl ChoiceParser {
    fn render(value: &Value) -> String {
        match value {
            Value::Float(x) => format!("{:?}", x),
            other => other.to_string(),
        }
    }
}

impl TypedValueParser for ChoiceParser {
    type Value = Value;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        raw: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let raw = raw.to_string_lossy();
        let value = self.ty.parse(&raw).ok().filter(|v| self.choices.contains(v));
        value.ok_or_else(|| {
            let name = arg.map(|a| a.get_id().to_string()).unwrap_or_default();
            let listed: Vec<String> = self.choices.iter().map(Self::render).collect();
            cmd.clone().error(
                ErrorKind::InvalidValue,
                format!(
                    "invalid value '{}' for '{}' [possible values: {}]",
                    raw,
                    name,
                    listed.join(", ")
                ),
            )
        })
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        Some(Box::new(
            self.choices.iter().map(|c| PossibleValue::new(Self::render(c))),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    Long(String),
    Short(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Spec(usize),
    Flag(usize, usize),
}

/// Resolve flag tokens claimed more than once: the last claimer wins
///
/// Earlier owners lose the token. Flags left with no tokens at all are
/// dropped; positionals are never affected.
pub fn resolve_conflicts(specs: Vec<ArgumentSpec>) -> Vec<ArgumentSpec> {
    let mut winners: HashMap<Token, Owner> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        for token in tokens(spec.long.as_deref(), spec.short) {
            winners.insert(token, Owner::Spec(i));
        }
        if let Action::Exclusive(flags) = &spec.action {
            for (j, flag) in flags.iter().enumerate() {
                for token in tokens(flag.long.as_deref(), flag.short) {
                    winners.insert(token, Owner::Flag(i, j));
                }
            }
        }
    }

    let keeps = |token: Token, owner: Owner| winners.get(&token) == Some(&owner);

    let mut resolved = Vec::with_capacity(specs.len());
    for (i, mut spec) in specs.into_iter().enumerate() {
        let positional = spec.is_positional();

        if let Some(long) = spec.long.take() {
            if keeps(Token::Long(long.clone()), Owner::Spec(i)) {
                spec.long = Some(long);
            } else {
                tracing::debug!("--{} reassigned away from {}", long, spec.param);
            }
        }
        if let Some(short) = spec.short.take() {
            if keeps(Token::Short(short), Owner::Spec(i)) {
                spec.short = Some(short);
            } else {
                tracing::debug!("-{} reassigned away from {}", short, spec.param);
            }
        }

        if let Action::Exclusive(flags) = &mut spec.action {
            let mut kept = Vec::with_capacity(flags.len());
            for (j, mut flag) in flags.drain(..).enumerate() {
                flag.long = flag
                    .long
                    .filter(|l| keeps(Token::Long(l.clone()), Owner::Flag(i, j)));
                flag.short = flag
                    .short
                    .filter(|s| keeps(Token::Short(*s), Owner::Flag(i, j)));
                if flag.long.is_some() || flag.short.is_some() {
                    kept.push(flag);
                }
            }
            if kept.is_empty() {
                tracing::debug!("Dropping {}: every flag was reassigned", spec.param);
                continue;
            }
            *flags = kept;
        } else if !positional && spec.long.is_none() && spec.short.is_none() {
            tracing::debug!("Dropping {}: every flag was reassigned", spec.param);
            continue;
        }

        resolved.push(spec);
    }
    resolved
}

fn tokens(long: Option<&str>, short: Option<char>) -> Vec<Token> {
    let mut out = Vec::with_capacity(2);
    if let Some(l) = long {
        out.push(Token::Long(l.to_string()));
    }
    if let Some(s) = short {
        out.push(Token::Short(s));
    }
    out
}

/// Only the last positional may take several values
pub fn check_positionals(function: &str, specs: &[ArgumentSpec]) -> Result<(), ConfigError> {
    let positionals: Vec<&ArgumentSpec> = specs.iter().filter(|s| s.is_positional()).collect();
    if let Some((_, init)) = positionals.split_last() {
        if let Some(list) = init.iter().find(|s| s.ty == ParamType::StrList) {
            return Err(ConfigError::ListPositionalNotLast {
                function: function.to_string(),
                param: list.param.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    fn param(name: &str, ty: ParamType, default: Option<Value>, desc: &str) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            ty,
            default,
            description: desc.to_string(),
        }
    }

    fn command(specs: &[ArgumentSpec]) -> Command {
        let mut cmd = Command::new("test").disable_help_flag(true);
        for spec in specs {
            let (args, group) = spec.to_clap();
            cmd = cmd.args(args);
            if let Some(group) = group {
                cmd = cmd.group(group);
            }
        }
        cmd
    }

    #[test]
    fn test_kebab() {
        assert_eq!(kebab("Param_A two"), "param-a-two");
        for s in ["Hello World", "snake_case_name", "already-kebab", "MiXeD_ Case"] {
            let once = kebab(s);
            assert_eq!(kebab(&once), once);
            assert!(!once.contains(' ') && !once.contains('_'));
            assert_eq!(once, once.to_lowercase());
        }
    }

    #[test]
    fn test_bool_is_toggle() {
        let p = param("super_long_parameter_name", ParamType::Bool, None, "does stuff");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        assert_eq!(spec.action, Action::Toggle);
        assert_eq!(spec.long.as_deref(), Some("super-long-parameter-name"));
        assert_eq!(spec.short, Some('s'));
        assert_eq!(spec.default, Some(Value::Bool(false)));
        assert!(!spec.is_positional());
    }

    #[test]
    fn test_default_becomes_option() {
        let p = param("param_b", ParamType::Int, Some(Value::Int(5)), "Second.");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        assert_eq!(spec.action, Action::Store);
        assert_eq!(spec.dest, "param-b");
        assert_eq!(spec.help, "Second. Defaults to 5 if not provided.");
        assert!(!spec.required);
    }

    #[test]
    fn test_undocumented_default_help() {
        let p = param("n", ParamType::Int, Some(Value::Int(1)), "");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        assert_eq!(spec.help, "Defaults to 1 if not provided.");
    }

    #[test]
    fn test_plain_positional() {
        let p = param("param_a", ParamType::Int, None, "First.");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        assert_eq!(spec.action, Action::Positional);
        assert!(spec.required);
        assert!(spec.is_positional());
    }

    #[test]
    fn test_constrained_positional_keeps_choices() {
        let p = param("level", ParamType::Int, None, "");
        let set = ConstraintSet::Enumerated(vec![Value::Int(2), Value::Int(1)]);
        let spec = ArgumentSpec::generate("f", &p, &set).unwrap();
        assert_eq!(spec.action, Action::Choices(vec![Value::Int(1), Value::Int(2)]));
        assert!(spec.is_positional());
        assert!(spec.required);
    }

    #[test]
    fn test_choices_parse() {
        let p = param("level", ParamType::Int, Some(Value::Int(5)), "");
        let set = ConstraintSet::Enumerated(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let spec = ArgumentSpec::generate("f", &p, &set).unwrap();
        let cmd = command(std::slice::from_ref(&spec));

        let matches = cmd.clone().try_get_matches_from(["test", "--level", "2"]).unwrap();
        assert_eq!(spec.extract(&matches), Some(Value::Int(2)));

        let matches = cmd.clone().try_get_matches_from(["test"]).unwrap();
        assert_eq!(spec.extract(&matches), None);
        assert_eq!(spec.default, Some(Value::Int(5)));

        assert!(cmd.try_get_matches_from(["test", "--level", "4"]).is_err());
    }

    #[test]
    fn test_float_choices_compare_by_value() {
        let p = param("ratio", ParamType::Float, Some(Value::Float(1.5)), "");
        let set = ConstraintSet::Enumerated(vec![Value::Float(1.5), Value::Float(2.0)]);
        let spec = ArgumentSpec::generate("f", &p, &set).unwrap();
        let cmd = command(std::slice::from_ref(&spec));

        for raw in ["2.0", "2", "2.00"] {
            let matches = cmd.clone().try_get_matches_from(["test", "--ratio", raw]).unwrap();
            assert_eq!(spec.extract(&matches), Some(Value::Float(2.0)));
        }

        let err = cmd.try_get_matches_from(["test", "--ratio", "3"]).unwrap_err();
        assert!(err.to_string().contains("1.5, 2.0"));
    }

    #[test]
    fn test_leading_underscore_name() {
        let p = param("_quiet", ParamType::Bool, None, "");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        assert_eq!(spec.long.as_deref(), Some("quiet"));
        assert_eq!(spec.short, Some('q'));

        let cmd = command(std::slice::from_ref(&spec));
        let matches = cmd.clone().try_get_matches_from(["test", "-q"]).unwrap();
        assert_eq!(spec.extract(&matches), Some(Value::Bool(true)));
        let matches = cmd.try_get_matches_from(["test", "--quiet"]).unwrap();
        assert_eq!(spec.extract(&matches), Some(Value::Bool(true)));
    }

    #[test]
    fn test_name_without_letters_is_rejected() {
        let p = param("__", ParamType::Int, Some(Value::Int(1)), "");
        let err = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlagName { ref name, .. } if name == "__"));
    }

    #[test]
    fn test_flag_tokens() {
        assert_eq!(flag_tokens("dry_run"), Some(("dry-run".to_string(), Some('d'))));
        assert_eq!(flag_tokens("_1st"), Some(("1st".to_string(), Some('1'))));
        assert_eq!(flag_tokens("x-"), Some(("x-".to_string(), Some('x'))));
        assert_eq!(flag_tokens("é"), Some(("é".to_string(), None)));
        assert_eq!(flag_tokens("-_"), None);
    }

    #[test]
    fn test_exclusive_group_parse() {
        let p = param("mode", ParamType::Int, None, "");
        let set = ConstraintSet::Keyed(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
        ]);
        let spec = ArgumentSpec::generate("f", &p, &set).unwrap();
        let cmd = command(std::slice::from_ref(&spec));

        let matches = cmd.clone().try_get_matches_from(["test", "--b"]).unwrap();
        assert_eq!(spec.extract(&matches), Some(Value::Int(2)));

        assert!(cmd.clone().try_get_matches_from(["test", "--a", "--b"]).is_err());
        assert!(cmd.try_get_matches_from(["test"]).is_err());
    }

    #[test]
    fn test_type_error_is_parse_error() {
        let p = param("count", ParamType::Int, None, "");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        let cmd = command(std::slice::from_ref(&spec));
        assert!(cmd.try_get_matches_from(["test", "many"]).is_err());
    }

    #[test]
    fn test_list_values() {
        let p = param("files", ParamType::StrList, None, "");
        let spec = ArgumentSpec::generate("f", &p, &ConstraintSet::None).unwrap();
        let cmd = command(std::slice::from_ref(&spec));
        let matches = cmd.try_get_matches_from(["test", "a.json", "b.json"]).unwrap();
        assert_eq!(
            spec.extract(&matches),
            Some(Value::List(vec!["a.json".into(), "b.json".into()]))
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let first = ArgumentSpec::generate(
            "f",
            &param("path", ParamType::Str, Some(Value::from(".")), ""),
            &ConstraintSet::None,
        )
        .unwrap();
        let second = ArgumentSpec::generate(
            "f",
            &param("pretty", ParamType::Bool, None, ""),
            &ConstraintSet::None,
        )
        .unwrap();

        let resolved = resolve_conflicts(vec![ArgumentSpec::help_flag(), first, second]);
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[1].long.as_deref(), Some("path"));
        assert_eq!(resolved[1].short, None);
        assert_eq!(resolved[2].short, Some('p'));
    }

    #[test]
    fn test_param_can_take_help_short() {
        let hosts = ArgumentSpec::generate(
            "f",
            &param("host", ParamType::Str, Some(Value::from("localhost")), ""),
            &ConstraintSet::None,
        )
        .unwrap();
        let resolved = resolve_conflicts(vec![ArgumentSpec::help_flag(), hosts]);
        assert_eq!(resolved[0].short, None);
        assert_eq!(resolved[0].long.as_deref(), Some("help"));
        assert_eq!(resolved[1].short, Some('h'));
    }

    #[test]
    fn test_fully_shadowed_flag_is_dropped() {
        let a = ArgumentSpec::generate(
            "f",
            &param("x", ParamType::Bool, None, ""),
            &ConstraintSet::None,
        )
        .unwrap();
        let b = a.clone();
        let resolved = resolve_conflicts(vec![a, b]);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_positional_list_must_be_last() {
        let files = ArgumentSpec::generate(
            "f",
            &param("files", ParamType::StrList, None, ""),
            &ConstraintSet::None,
        )
        .unwrap();
        let out = ArgumentSpec::generate(
            "f",
            &param("out", ParamType::Str, None, ""),
            &ConstraintSet::None,
        )
        .unwrap();
        assert!(check_positionals("f", &[out.clone(), files.clone()]).is_ok());
        assert!(matches!(
            check_positionals("f", &[files, out]),
            Err(ConfigError::ListPositionalNotLast { .. })
        ));
    }
}
