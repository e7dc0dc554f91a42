//! Value constraints on parameters
//!
//! A caller may restrict a parameter to a closed list of values (rendered
//! as a choice list) or to a labelled mapping (rendered as a mutually
//! exclusive group of flags, each setting the parameter to one value).

use crate::descriptor::ParameterDescriptor;
use crate::error::ConfigError;
use crate::spec::{flag_tokens, kebab};
use crate::value::{sort_values, Value};

/// A constraint as supplied at registration
#[derive(Debug, Clone, PartialEq)]
pub enum RawConstraint {
    Sequence(Vec<Value>),
    Mapping(Vec<(String, Value)>),
}

impl RawConstraint {
    pub fn choices<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }

    pub fn keyed<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The legal values for one parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConstraintSet {
    #[default]
    None,
    Enumerated(Vec<Value>),
    Keyed(Vec<(String, Value)>),
}

/// One constant-setting flag inside an exclusive group
#[derive(Debug, Clone, PartialEq)]
pub struct ConstFlag {
    /// clap id, `<dest>:<label>`
    pub id: String,
    pub label: String,
    pub long: Option<String>,
    pub short: Option<char>,
    pub value: Value,
    pub help: String,
}

/// A constraint rendered for one parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Choices { choices: Vec<Value>, required: bool },
    Group { flags: Vec<ConstFlag>, required: bool },
}

impl ConstraintSet {
    /// Classify a raw constraint, checking every value against the parameter type
    pub fn classify(
        function: &str,
        param: &ParameterDescriptor,
        raw: Option<&RawConstraint>,
    ) -> Result<Self, ConfigError> {
        let coerce = |value: &Value| {
            param
                .ty
                .admit(value)
                .or_else(|_| param.ty.parse(&value.to_string()))
                .map_err(|_| ConfigError::ConstraintType {
                    function: function.to_string(),
                    param: param.name.clone(),
                    value: value.to_string(),
                    expected: param.ty,
                })
        };

        match raw {
            None => Ok(Self::None),
            Some(RawConstraint::Sequence(values)) => Ok(Self::Enumerated(
                values.iter().map(coerce).collect::<Result<_, _>>()?,
            )),
            Some(RawConstraint::Mapping(entries)) => Ok(Self::Keyed(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), coerce(v)?)))
                    .collect::<Result<_, ConfigError>>()?,
            )),
        }
    }

    /// Whether a value may be bound under this constraint
    ///
    /// The default is always admitted, as it is on the command line.
    pub fn admits(&self, value: &Value, default: Option<&Value>) -> bool {
        match self {
            Self::None => true,
            Self::Enumerated(values) => values.contains(value) || default == Some(value),
            Self::Keyed(entries) => {
                entries.iter().any(|(_, v)| v == value) || default == Some(value)
            }
        }
    }

    /// Render the constraint, folding the parameter's default into it
    pub fn resolve(
        &self,
        function: &str,
        param: &ParameterDescriptor,
    ) -> Result<Option<Resolved>, ConfigError> {
        match self {
            Self::None => Ok(None),
            Self::Enumerated(values) => {
                let mut choices = values.clone();
                if let Some(default) = &param.default {
                    if !choices.contains(default) {
                        choices.push(default.clone());
                    }
                }
                sort_values(&mut choices);
                Ok(Some(Resolved::Choices {
                    choices,
                    required: param.default.is_none(),
                }))
            }
            Self::Keyed(entries) => {
                let mut entries = entries.clone();
                let mut required = true;
                if let Some(default) = &param.default {
                    if !entries.iter().any(|(_, v)| v == default) {
                        entries.push((param.name.clone(), default.clone()));
                        required = false;
                    }
                }
                let flags = group_flags(function, param, &entries)?;
                Ok(Some(Resolved::Group { flags, required }))
            }
        }
    }
}

fn group_flags(
    function: &str,
    param: &ParameterDescriptor,
    entries: &[(String, Value)],
) -> Result<Vec<ConstFlag>, ConfigError> {
    let dest = kebab(&param.name);
    let mut flags: Vec<ConstFlag> = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        let (label, short) = flag_tokens(key).ok_or_else(|| ConfigError::InvalidFlagName {
            function: function.to_string(),
            name: key.clone(),
        })?;

        let collision = |flag: String, other: &ConstFlag| ConfigError::FlagCollision {
            function: function.to_string(),
            param: param.name.clone(),
            flag,
            first: other.label.clone(),
            second: label.clone(),
        };

        if let Some(other) = flags.iter().find(|f| f.label == label) {
            return Err(collision(format!("--{}", label), other));
        }
        if let Some(c) = short {
            if let Some(other) = flags.iter().find(|f| f.short == Some(c)) {
                return Err(collision(format!("-{}", c), other));
            }
        }

        flags.push(ConstFlag {
            id: format!("{}:{}", dest, label),
            long: Some(label.clone()),
            short,
            value: value.clone(),
            help: format!("Sets {} to {}", param.name, value),
            label,
        });
    }

    Ok(flags)
}
