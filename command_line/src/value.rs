// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::sync::Arc;

use crate::remapper::Remapper;

/// A host-provided artifact-like thing: a source file, a derived (built)
/// file, a tree artifact, or a fileset. Implemented by the host, not by this
/// crate -- mirrors `fs::directory::Entry`'s "the host tells us what kind of
/// thing this is" shape rather than us trying to model the host's full
/// artifact graph.
pub trait ToCommandLine: Send + Sync {
    /// The host's own string conversion, used for every value this crate
    /// does not itself know how to remap (i.e. everything except a derived
    /// artifact's exec path).
    fn expand_to_command_line(&self) -> String;

    /// A short label for diagnostics; does not need to be the exec path.
    fn display_name(&self) -> String;

    fn is_tree_artifact(&self) -> bool {
        false
    }

    fn is_fileset(&self) -> bool {
        false
    }

    fn is_directory(&self) -> bool {
        self.is_tree_artifact() || self.is_fileset()
    }

    /// `true` for any artifact produced by a prior action, whose exec path
    /// may need to be rewritten by a `Remapper` before use.
    fn is_derived_artifact(&self) -> bool {
        false
    }

    /// Required when `is_derived_artifact()` is `true`.
    fn exec_path(&self) -> Option<String> {
        None
    }
}

/// One element of an argument vector before it has been coerced to a
/// `String`. Plain strings -- the overwhelming majority of real command
/// lines -- are stored inline so they avoid the allocation and vtable cost
/// of going through `Arc<dyn ToCommandLine>`.
#[derive(Clone)]
pub enum Value {
    Str(String),
    Artifact(Arc<dyn ToCommandLine>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn artifact(artifact: Arc<dyn ToCommandLine>) -> Self {
        Value::Artifact(artifact)
    }

    pub fn is_tree_artifact(&self) -> bool {
        matches!(self, Value::Artifact(a) if a.is_tree_artifact())
    }

    pub fn is_fileset(&self) -> bool {
        matches!(self, Value::Artifact(a) if a.is_fileset())
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Value::Artifact(a) if a.is_directory())
    }

    pub fn display_name(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Artifact(a) => a.display_name(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Artifact(a) => write!(f, "Artifact({})", a.display_name()),
        }
    }
}

/// Implements C1: coerce a single `Value` to the string that will appear on
/// the command line, remapping a derived artifact's exec path and deferring
/// to the host's own conversion for everything else.
pub fn expand_value(value: &Value, remapper: &dyn Remapper) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Artifact(a) => {
            if a.is_derived_artifact() {
                let exec_path = a
                    .exec_path()
                    .expect("derived artifact did not report an exec path");
                remapper.map(&exec_path)
            } else {
                a.expand_to_command_line()
            }
        }
    }
}
