//! Command payloads and positional parameter resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// A declared handler parameter has no matching entry in a command's
/// parameter map.
///
/// Recoverable only by fixing the handler declaration or the story script;
/// the error names the parameter so the misconfiguration is visible without
/// engine source access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command '{command}' has no parameter named '{param}'")]
pub struct MissingParameter {
    /// The command being dispatched.
    pub command: String,
    /// The declared parameter that was not provided.
    pub param: String,
}

/// A command invocation produced by the story.
///
/// Transient: valid only until the next advancement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The command's name, possibly scoped as `"Character.Action"`.
    pub name: String,
    /// Named parameters supplied by the script.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Command {
    /// Create a command with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a named parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Resolve positional arguments for a handler's declared parameter names.
    ///
    /// Each declared name must have a matching entry in the parameter map;
    /// the resolved values are returned in declared order. A declared name
    /// with no entry fails with [`MissingParameter`] naming it.
    pub fn args_for(&self, declared: &[String]) -> Result<Vec<Value>, MissingParameter> {
        declared
            .iter()
            .map(|param| {
                self.params
                    .get(param)
                    .cloned()
                    .ok_or_else(|| MissingParameter {
                        command: self.name.clone(),
                        param: param.clone(),
                    })
            })
            .collect()
    }
}
