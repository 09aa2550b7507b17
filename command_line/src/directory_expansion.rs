// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use log::warn;

use crate::error::CommandLineExpansionError;
use crate::remapper::Remapper;
use crate::value::Value;

/// Host capability for flattening a directory-shaped `Value` into concrete
/// files. Absent during most of analysis time, when no real sandbox layout
/// exists yet; present during actual command-line construction ahead of
/// action execution.
pub trait Expander: Send + Sync {
    /// Append the files contained in a tree artifact to `out`, in the
    /// host's canonical order.
    fn expand_tree(&self, artifact: &Value, out: &mut Vec<Value>);

    /// Resolve a fileset artifact's manifest, or fail if the host never
    /// registered it as an input.
    fn get_fileset(&self, artifact: &Value) -> Result<FilesetManifest, MissingExpansion>;
}

/// Marker returned by `Expander::get_fileset` when the fileset was never
/// registered as an input of the action. Carries no data; the caller already
/// has the artifact in hand to build a diagnostic.
#[derive(Debug)]
pub struct MissingExpansion;

/// How a fileset's internal relative symlinks are handled while building its
/// manifest. `IgnoreWithoutError` is the only variant this crate exercises;
/// other policies exist in the host but have no caller here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelativeSymlinkPolicy {
    IgnoreWithoutError,
}

#[derive(Clone, Debug)]
pub struct FilesetManifestEntry {
    pub relative_path: String,
}

impl FilesetManifestEntry {
    pub fn new(relative_path: impl Into<String>) -> Self {
        FilesetManifestEntry {
            relative_path: relative_path.into(),
        }
    }
}

/// The flattened contents of a fileset: an origin exec path, and the
/// relative paths of every file it contains.
#[derive(Clone, Debug)]
pub struct FilesetManifest {
    origin_exec_path: String,
    entries: Vec<FilesetManifestEntry>,
}

impl FilesetManifest {
    pub fn construct(
        entries: Vec<FilesetManifestEntry>,
        origin_exec_path: impl Into<String>,
        _policy: RelativeSymlinkPolicy,
    ) -> Self {
        FilesetManifest {
            origin_exec_path: origin_exec_path.into(),
            entries,
        }
    }

    pub fn entries(&self) -> &[FilesetManifestEntry] {
        &self.entries
    }

    pub fn origin_exec_path(&self) -> &str {
        &self.origin_exec_path
    }
}

/// Implements C2: replace tree-artifact and fileset values with the files
/// they contain. A no-op when no value `isDirectory`, matching the spec's
/// "return the input list unchanged" fast path; callers are expected to gate
/// this on the `EXPAND_DIRECTORIES` feature bit themselves.
pub fn expand_directories(
    values: Vec<Value>,
    expander: Option<&Arc<dyn Expander>>,
    remapper: &dyn Remapper,
) -> Result<Vec<Value>, CommandLineExpansionError> {
    let Some(expander) = expander else {
        return Ok(values);
    };
    if !values.iter().any(Value::is_directory) {
        return Ok(values);
    }

    let mut out = Vec::with_capacity(values.len());
    for value in values {
        if value.is_tree_artifact() {
            expander.expand_tree(&value, &mut out);
        } else if value.is_fileset() {
            let manifest = expander.get_fileset(&value).map_err(|_| {
                CommandLineExpansionError::expansion(format!(
                    "Could not expand fileset: {}. Did you forget to add it as an input of the action?",
                    value.display_name()
                ))
            })?;
            for entry in manifest.entries() {
                let relative = remapper.map(&entry.relative_path);
                out.push(Value::str(format!(
                    "{}/{}",
                    manifest.origin_exec_path(),
                    relative
                )));
            }
        } else if value.is_directory() {
            warn!(
                "unknown directory kind for {}; this is a bug, not a malformed action",
                value.display_name()
            );
            panic!(
                "command line decoder invariant breach: unknown directory kind for {}",
                value.display_name()
            );
        } else {
            out.push(value);
        }
    }
    Ok(out)
}
