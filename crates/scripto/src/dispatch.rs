//! Argument resolution and function dispatch
//!
//! Values come from three layers, lowest first: declared defaults, the
//! interactive environment, explicit command-line values. Whatever the
//! callee did not declare is dropped before the call.

use std::collections::BTreeMap;

use crate::assembler::Invocation;
use crate::error::{Error, Result};
use crate::overlay::EnvironmentOverlay;
use crate::registry::{CommandRegistry, RegisteredFunction};
use crate::value::{ParamType, Value};

/// Parsed values keyed by parameter name
pub type ArgMap = BTreeMap<String, Value>;

/// The fully resolved arguments handed to a function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: ArgMap,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| Error::MissingArgument(name.to_string()))
    }

    fn mismatch(name: &str, expected: ParamType) -> Error {
        Error::ArgumentType {
            name: name.to_string(),
            expected,
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            Value::Int(i) => Ok(*i),
            _ => Err(Self::mismatch(name, ParamType::Int)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            _ => Err(Self::mismatch(name, ParamType::Float)),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            Value::Str(s) => Ok(s),
            _ => Err(Self::mismatch(name, ParamType::Str)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            Value::Bool(b) => Ok(*b),
            _ => Err(Self::mismatch(name, ParamType::Bool)),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[String]> {
        match self.require(name)? {
            Value::List(items) => Ok(items),
            _ => Err(Self::mismatch(name, ParamType::StrList)),
        }
    }
}

impl FromIterator<(String, Value)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Merge the value layers for one function and keep only its parameters
pub fn resolve(
    function: &RegisteredFunction,
    explicit: &ArgMap,
    overlay: Option<&EnvironmentOverlay>,
) -> Arguments {
    let (function, constraints) = (&function.descriptor, &function.constraints);
    let mut merged = ArgMap::new();

    for param in &function.params {
        if let Some(default) = param.implicit_default() {
            merged.insert(param.name.clone(), default);
        }
    }

    if let Some(overlay) = overlay {
        merged.extend(overlay.coerce_for(function, constraints));
    }

    for (name, value) in explicit {
        merged.insert(name.clone(), value.clone());
    }

    merged
        .into_iter()
        .filter(|(name, _)| function.param(name).is_some())
        .collect()
}

/// Calls registered functions with resolved arguments
pub struct Dispatcher<'a> {
    registry: &'a CommandRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self { registry }
    }

    /// Invoke the target of a parsed command line
    ///
    /// Returns the function's output when it produced something non-empty.
    pub fn dispatch(
        &self,
        invocation: &Invocation,
        overlay: Option<&EnvironmentOverlay>,
    ) -> Result<Option<String>> {
        let function = self
            .registry
            .get(invocation.command)
            .ok_or_else(|| Error::Dispatch {
                command: format!("#{}", invocation.command),
                error: anyhow::anyhow!("No such command"),
            })?;
        let descriptor = &function.descriptor;

        let args = resolve(function, &invocation.explicit, overlay);
        tracing::debug!("Dispatching {} with {:?}", descriptor.name, args);

        // The shell tree leaves every argument optional
        if let Some(missing) = descriptor.params.iter().find(|p| !args.contains(&p.name)) {
            return Err(Error::MissingArgument(missing.name.clone()));
        }

        let output = function.call(&args).map_err(|error| Error::Dispatch {
            command: descriptor.command_name(),
            error,
        })?;

        Ok(output.filter(|s| !s.is_empty()))
    }
}
