//! The ordered collection of registered functions

use std::fmt;

use crate::constraint::{ConstraintSet, RawConstraint};
use crate::descriptor::{self, Function, FunctionDescriptor, Validation};
use crate::dispatch::Arguments;
use crate::error::{ConfigError, DocumentationWarning};
use crate::value::Value;

/// The callable behind a registered function
pub type Handler = Box<dyn Fn(&Arguments) -> anyhow::Result<Option<String>>>;

/// Options supplied alongside a function at registration
#[derive(Debug, Clone, Default)]
pub struct Registration {
    name: Option<String>,
    aliases: Vec<String>,
    constraints: Vec<(String, RawConstraint)>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the function under this name instead of its kebab-cased one
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn constrain(mut self, param: impl Into<String>, constraint: RawConstraint) -> Self {
        let param = param.into();
        self.constraints.retain(|(p, _)| *p != param);
        self.constraints.push((param, constraint));
        self
    }

    /// Restrict a parameter to a closed list of values
    pub fn choices<I, V>(self, param: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constrain(param, RawConstraint::choices(values))
    }

    /// Expose a parameter as one flag per entry, each setting its value
    pub fn keyed<I, K, V>(self, param: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.constrain(param, RawConstraint::keyed(entries))
    }
}

/// What registration made of the supplied options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationReport {
    pub function: String,
    /// Constraint keys that name a declared parameter
    pub accepted: Vec<String>,
    /// Constraint keys that match nothing and were not applied
    pub rejected: Vec<String>,
    pub warnings: Vec<DocumentationWarning>,
}

/// A function ready to be assembled into a parser and called
pub struct RegisteredFunction {
    pub descriptor: FunctionDescriptor,
    /// One entry per parameter, in declaration order
    pub constraints: Vec<ConstraintSet>,
    handler: Handler,
}

impl RegisteredFunction {
    pub fn call(&self, args: &Arguments) -> anyhow::Result<Option<String>> {
        (self.handler)(args)
    }
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("descriptor", &self.descriptor)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// Registered functions, in registration order
#[derive(Debug, Default)]
pub struct CommandRegistry {
    functions: Vec<RegisteredFunction>,
    warnings: Vec<DocumentationWarning>,
    validation: Validation,
}

impl CommandRegistry {
    pub fn new(validation: Validation) -> Self {
        Self {
            functions: Vec::new(),
            warnings: Vec::new(),
            validation,
        }
    }

    /// Validate a function and add it to the registry
    pub fn register<F>(
        &mut self,
        function: Function,
        registration: Registration,
        handler: F,
    ) -> Result<RegistrationReport, ConfigError>
    where
        F: Fn(&Arguments) -> anyhow::Result<Option<String>> + 'static,
    {
        let (accepted, rejected): (Vec<_>, Vec<_>) = registration
            .constraints
            .into_iter()
            .partition(|(param, _)| function.param_names().any(|p| p == param));

        let (mut descriptor, warnings) = descriptor::build(function, self.validation)?;
        descriptor.external_name = registration.name;
        descriptor.aliases = registration.aliases;

        let constraints = descriptor
            .params
            .iter()
            .map(|param| {
                let raw = accepted
                    .iter()
                    .find(|(name, _)| *name == param.name)
                    .map(|(_, raw)| raw);
                ConstraintSet::classify(&descriptor.name, param, raw)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let report = RegistrationReport {
            function: descriptor.name.clone(),
            accepted: accepted.into_iter().map(|(name, _)| name).collect(),
            rejected: rejected.into_iter().map(|(name, _)| name).collect(),
            warnings: warnings.clone(),
        };

        if !report.rejected.is_empty() {
            tracing::debug!(
                "Constraints for unknown parameters of {}: {}",
                report.function,
                report.rejected.join(", ")
            );
        }

        self.warnings.extend(warnings);
        self.functions.push(RegisteredFunction {
            descriptor,
            constraints,
            handler: Box::new(handler),
        });

        Ok(report)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredFunction> {
        self.functions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredFunction> {
        self.functions.iter()
    }

    /// Documentation warnings gathered so far
    pub fn warnings(&self) -> &[DocumentationWarning] {
        &self.warnings
    }
}
