// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;

use crate::directory_expansion::Expander;
use crate::error::CommandLineExpansionError;
use crate::value::Value;

/// Where a `map_each` (or `before_each`/`format_each`/...) directive was
/// attached, for use in the wrapped-error message that `apply_map_each`
/// produces when the host's callable fails.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Opaque evaluation-configuration handle threaded through to the host's
/// callable unmodified. This crate never inspects it; it exists purely so
/// the host's scripting runtime can recover whatever semantics flags were in
/// effect when the directive was built.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MapEachSemantics(pub u32);

/// Handle passed to a two-argument `map_each` callable, letting it expand a
/// tree artifact on demand rather than receiving pre-flattened files.
pub enum DirectoryExpanderHandle {
    Full(Arc<dyn Expander>),
    Noop,
}

impl DirectoryExpanderHandle {
    pub fn list(&self, value: &Value) -> Vec<Value> {
        match self {
            DirectoryExpanderHandle::Noop => vec![value.clone()],
            DirectoryExpanderHandle::Full(expander) => {
                if value.is_tree_artifact() {
                    let mut out = Vec::new();
                    expander.expand_tree(value, &mut out);
                    out
                } else {
                    vec![value.clone()]
                }
            }
        }
    }
}

/// The untyped value a host callable hands back, validated by
/// `apply_map_each` against the contract in `spec.md` §4.3: a string, `None`,
/// or a list of strings; anything else is a expansion failure, not a panic,
/// since it describes a malformed user callable rather than a bug here.
pub enum ScriptingValue {
    Str(String),
    List(Vec<ScriptingValue>),
    None,
    /// Any other value the host's scripting runtime might produce, carrying
    /// only its type name for the diagnostic.
    Other(&'static str),
}

/// A failure the host's scripting runtime raised while evaluating a
/// callable, before this crate has had a chance to interpret it.
#[derive(Debug)]
pub struct ScriptingEvalError {
    pub message_with_stack: String,
    pub cause: Option<String>,
}

pub enum MapEachCallError {
    Scripting(ScriptingEvalError),
    Cancelled,
}

/// The host capability for applying a scripted function to every element of
/// a `VectorArg`'s values. `async_trait` is used here for the same reason it
/// is used by `fs`/`process_execution`'s capability traits: the host's
/// invocation may suspend across an await point.
#[async_trait]
pub trait MapEachCallable: Send + Sync {
    /// `1` for a plain `fn(value)` callable, `2` if it also accepts a
    /// `DirectoryExpanderHandle`.
    fn parameter_count(&self) -> usize;

    async fn call(
        &self,
        value: &Value,
        expander: Option<&DirectoryExpanderHandle>,
    ) -> Result<ScriptingValue, MapEachCallError>;
}

/// Implements C3: invoke `callable` once per value, validating and
/// flattening its return value into `strings`.
pub async fn apply_map_each(
    callable: &dyn MapEachCallable,
    values: &[Value],
    location: &SourceLocation,
    expander: Option<&Arc<dyn Expander>>,
) -> Result<Vec<String>, CommandLineExpansionError> {
    let handle = if callable.parameter_count() >= 2 {
        Some(match expander {
            Some(expander) => DirectoryExpanderHandle::Full(Arc::clone(expander)),
            None => {
                trace!(
                    "{location}: no execution-time directory expander available, \
                     falling back to a noop expander that will not flatten tree artifacts"
                );
                DirectoryExpanderHandle::Noop
            }
        })
    } else {
        None
    };

    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let result = callable
            .call(value, handle.as_ref())
            .await
            .map_err(|err| match err {
                MapEachCallError::Scripting(err) => wrap_scripting_error(location, err),
                MapEachCallError::Cancelled => CommandLineExpansionError::Cancelled,
            })?;
        collect(result, &mut out)?;
    }
    Ok(out)
}

fn collect(value: ScriptingValue, out: &mut Vec<String>) -> Result<(), CommandLineExpansionError> {
    match value {
        ScriptingValue::Str(s) => {
            out.push(s);
            Ok(())
        }
        ScriptingValue::None => Ok(()),
        ScriptingValue::List(items) => {
            for item in items {
                match item {
                    ScriptingValue::Str(s) => out.push(s),
                    other => {
                        return Err(CommandLineExpansionError::expansion(format!(
                            "Expected map_each to return string, None, or list of strings, found list containing {}",
                            type_name(&other)
                        )));
                    }
                }
            }
            Ok(())
        }
        other => Err(CommandLineExpansionError::expansion(format!(
            "Expected map_each to return string, None, or list of strings, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &ScriptingValue) -> &'static str {
    match value {
        ScriptingValue::Str(_) => "string",
        ScriptingValue::List(_) => "list",
        ScriptingValue::None => "NoneType",
        ScriptingValue::Other(name) => name,
    }
}

/// Formats a scripting-runtime failure as `spec.md` §4.3 requires: a leading
/// newline, the source location, the message with its stack, and the cause
/// appended only if its text isn't already part of the message.
fn wrap_scripting_error(location: &SourceLocation, err: ScriptingEvalError) -> CommandLineExpansionError {
    let mut message = format!("\n{location}: {}", err.message_with_stack);
    if let Some(cause) = &err.cause {
        if !message.contains(cause.as_str()) {
            message.push_str(cause);
        }
    }
    CommandLineExpansionError::expansion(message)
}
