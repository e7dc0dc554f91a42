//! The interactive variable environment
//!
//! Variables are stored as raw strings and only coerced when a function is
//! about to be called, using that function's parameter types. A value that
//! does not fit, by type or by the parameter's constraint, is left out for
//! that call; it never fails the call.

use std::collections::BTreeMap;

use crate::constraint::ConstraintSet;
use crate::descriptor::FunctionDescriptor;
use crate::dispatch::ArgMap;
use crate::spec::kebab;

/// Outcome of a `set` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    pub applied: Vec<String>,
    /// Tokens that were not `key=value`
    pub rejected: Vec<String>,
}

/// Mutable key/value store for one interactive session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvironmentOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply already-unquoted `key=value` tokens, overwriting existing keys
    pub fn apply<S: AsRef<str>>(&mut self, tokens: &[S]) -> AssignmentReport {
        let mut report = AssignmentReport::default();
        for token in tokens {
            let token = token.as_ref();
            match parse_assignment(token) {
                Some((key, value)) => {
                    self.set(key, value);
                    report.applied.push(key.to_string());
                }
                None => report.rejected.push(token.to_string()),
            }
        }
        report
    }

    /// The variables that name a parameter of `function`, coerced to its types
    ///
    /// A variable matches a parameter by exact name or by kebab-cased name.
    /// `constraints` runs parallel to the parameters; a value outside its
    /// parameter's constraint is skipped.
    pub fn coerce_for(
        &self,
        function: &FunctionDescriptor,
        constraints: &[ConstraintSet],
    ) -> ArgMap {
        let mut coerced = ArgMap::new();
        for (i, param) in function.params.iter().enumerate() {
            let raw = self
                .vars
                .get(&param.name)
                .or_else(|| self.vars.get(&kebab(&param.name)));
            let Some(raw) = raw else {
                continue;
            };
            match param.ty.parse(raw) {
                Ok(value) => {
                    let constraint = constraints.get(i).unwrap_or(&ConstraintSet::None);
                    if !constraint.admits(&value, param.default.as_ref()) {
                        tracing::trace!(
                            "Ignoring {} for {}: {} is not allowed",
                            param.name,
                            function.name,
                            value
                        );
                        continue;
                    }
                    coerced.insert(param.name.clone(), value);
                }
                Err(e) => {
                    tracing::trace!("Ignoring {} for {}: {}", param.name, function.name, e);
                }
            }
        }
        coerced
    }
}

/// Split `key=value` on the first `=`
fn parse_assignment(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let mut chars = key.chars();
    let head = chars.next()?;
    if !(head.is_ascii_alphabetic() || head == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some((key, value))
}
