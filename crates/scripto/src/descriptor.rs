//! Function and parameter descriptors
//!
//! Callers describe a function once with [`Function`] and [`Param`]. At
//! registration the description is validated against its docstring and
//! frozen into a [`FunctionDescriptor`].

use std::collections::HashSet;

use crate::docstring::Docstring;
use crate::error::{ConfigError, DocumentationWarning, WarningKind};
use crate::spec::kebab;
use crate::value::{ParamType, Value};

/// A parameter as declared by the caller
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    ty: Option<ParamType>,
    default: Option<Value>,
    help: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            default: None,
            help: None,
        }
    }

    /// A parameter without a declared type
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
            help: None,
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Help text that takes precedence over the docstring entry
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }
}

/// A function signature plus its documentation
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    doc: String,
    params: Vec<Param>,
}

impl Function {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }
}

/// A validated, normalized parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
    /// Never absent; undocumented parameters get ""
    pub description: String,
}

impl ParameterDescriptor {
    /// The value used when nothing else supplies one
    pub fn implicit_default(&self) -> Option<Value> {
        match (&self.default, self.ty) {
            (Some(v), _) => Some(v.clone()),
            (None, ParamType::Bool) => Some(Value::Bool(false)),
            (None, _) => None,
        }
    }
}

/// A validated function, ready for parser assembly
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub external_name: Option<String>,
    pub aliases: Vec<String>,
    pub params: Vec<ParameterDescriptor>,
    pub description: String,
    pub summary: String,
}

impl FunctionDescriptor {
    /// Name exposed on the command line
    pub fn command_name(&self) -> String {
        self.external_name
            .clone()
            .unwrap_or_else(|| kebab(&self.name))
    }

    pub fn param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// How strictly function contracts are checked
#[derive(Debug, Clone, Copy, Default)]
pub struct Validation {
    pub strict_annotations: bool,
    pub suppress_warnings: bool,
}

/// Validate a function and build its descriptor
///
/// Returns the warnings found along the way; they are never fatal.
pub fn build(
    function: Function,
    validation: Validation,
) -> Result<(FunctionDescriptor, Vec<DocumentationWarning>), ConfigError> {
    let doc = Docstring::parse(&function.doc);
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(function.params.len());

    for param in function.params {
        if !seen.insert(kebab(&param.name)) {
            return Err(ConfigError::DuplicateParameter {
                function: function.name.clone(),
                param: param.name,
            });
        }

        let documented = doc.param(&param.name);
        if documented.is_none() && param.help.is_none() && !validation.suppress_warnings {
            warnings.push(DocumentationWarning {
                function: function.name.clone(),
                param: param.name.clone(),
                kind: WarningKind::MissingDescription,
            });
        }

        let ty = match param.ty {
            Some(ty) => ty,
            None if validation.strict_annotations => {
                return Err(ConfigError::MissingAnnotation {
                    function: function.name.clone(),
                    param: param.name,
                });
            }
            None => {
                if !validation.suppress_warnings {
                    warnings.push(DocumentationWarning {
                        function: function.name.clone(),
                        param: param.name.clone(),
                        kind: WarningKind::MissingAnnotation,
                    });
                }
                param
                    .default
                    .as_ref()
                    .map_or(ParamType::Str, Value::param_type)
            }
        };

        let default = match param.default {
            Some(value) => Some(ty.admit(&value).map_err(|_| ConfigError::DefaultType {
                function: function.name.clone(),
                param: param.name.clone(),
                value: value.to_string(),
                expected: ty,
            })?),
            None => None,
        };

        let description = param
            .help
            .clone()
            .unwrap_or_else(|| documented.unwrap_or("").to_string());

        params.push(ParameterDescriptor {
            name: param.name,
            ty,
            default,
            description,
        });
    }

    let descriptor = FunctionDescriptor {
        name: function.name,
        external_name: None,
        aliases: Vec::new(),
        params,
        description: doc.description().to_string(),
        summary: doc.first_sentence().to_string(),
    };

    Ok((descriptor, warnings))
}
