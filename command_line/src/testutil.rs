// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Shared fixtures for the `*_tests` modules: a fake derived artifact, a
//! fake tree artifact/fileset pair, an `Expander` that actually expands
//! them, a `RecordingMapEach` callable with scripted outputs, and a
//! `CountingRemapper` used to assert fingerprinting never touches the
//! remapper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::directory_expansion::{Expander, FilesetManifest, MissingExpansion};
use crate::error::CommandLineExpansionError;
use crate::fingerprint::FingerprintSink;
use crate::map_each::{DirectoryExpanderHandle, MapEachCallError, MapEachCallable, ScriptingValue};
use crate::nested_set::{MapEachFingerprintAdaptor, NestedSetFingerprintCache, NestedSetHandle, NestedSetLike};
use crate::remapper::Remapper;
use crate::value::{expand_value, ToCommandLine, Value};

/// A derived (built) file artifact whose exec path is subject to remapping.
pub struct FakeDerivedFile {
    pub exec_path: String,
}

impl ToCommandLine for FakeDerivedFile {
    fn expand_to_command_line(&self) -> String {
        self.exec_path.clone()
    }

    fn display_name(&self) -> String {
        self.exec_path.clone()
    }

    fn is_derived_artifact(&self) -> bool {
        true
    }

    fn exec_path(&self) -> Option<String> {
        Some(self.exec_path.clone())
    }
}

/// A source file: never remapped, just converted as-is.
pub struct FakeSourceFile {
    pub path: String,
}

impl ToCommandLine for FakeSourceFile {
    fn expand_to_command_line(&self) -> String {
        self.path.clone()
    }

    fn display_name(&self) -> String {
        self.path.clone()
    }
}

/// A tree artifact whose contents are only known to the `Expander`.
pub struct FakeTreeArtifact {
    pub label: String,
}

impl ToCommandLine for FakeTreeArtifact {
    fn expand_to_command_line(&self) -> String {
        panic!("a tree artifact must be expanded, never coerced directly")
    }

    fn display_name(&self) -> String {
        self.label.clone()
    }

    fn is_tree_artifact(&self) -> bool {
        true
    }
}

pub struct FakeFileset {
    pub label: String,
}

impl ToCommandLine for FakeFileset {
    fn expand_to_command_line(&self) -> String {
        panic!("a fileset must be expanded, never coerced directly")
    }

    fn display_name(&self) -> String {
        self.label.clone()
    }

    fn is_fileset(&self) -> bool {
        true
    }
}

/// An `Expander` whose tree-artifact and fileset contents are configured by
/// the test, keyed by the artifact's `display_name()`.
#[derive(Default)]
pub struct FakeExpander {
    trees: std::collections::HashMap<String, Vec<Value>>,
    filesets: std::collections::HashMap<String, FilesetManifest>,
}

impl FakeExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(mut self, label: impl Into<String>, files: Vec<Value>) -> Self {
        self.trees.insert(label.into(), files);
        self
    }

    pub fn with_fileset(mut self, label: impl Into<String>, manifest: FilesetManifest) -> Self {
        self.filesets.insert(label.into(), manifest);
        self
    }
}

impl Expander for FakeExpander {
    fn expand_tree(&self, artifact: &Value, out: &mut Vec<Value>) {
        let files = self
            .trees
            .get(&artifact.display_name())
            .unwrap_or_else(|| panic!("no fixture tree registered for {}", artifact.display_name()));
        out.extend(files.iter().cloned());
    }

    fn get_fileset(&self, artifact: &Value) -> Result<FilesetManifest, MissingExpansion> {
        self.filesets
            .get(&artifact.display_name())
            .cloned()
            .ok_or(MissingExpansion)
    }
}

/// A `map_each` callable that returns pre-scripted outputs, one per call, in
/// order. Records every value it was invoked with so tests can assert on
/// invocation order and count.
pub struct RecordingMapEach {
    outputs: Mutex<Vec<ScriptingValue>>,
    parameter_count: usize,
    calls: AtomicUsize,
}

impl RecordingMapEach {
    pub fn new(outputs: Vec<ScriptingValue>) -> Self {
        RecordingMapEach {
            outputs: Mutex::new(outputs),
            parameter_count: 1,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_parameter_count(mut self, parameter_count: usize) -> Self {
        self.parameter_count = parameter_count;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MapEachCallable for RecordingMapEach {
    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    async fn call(
        &self,
        _value: &Value,
        _expander: Option<&DirectoryExpanderHandle>,
    ) -> Result<ScriptingValue, MapEachCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            panic!("RecordingMapEach ran out of scripted outputs");
        }
        Ok(outputs.remove(0))
    }
}

/// A `Remapper` that panics the first time it is invoked. Used to assert
/// that fingerprinting never touches the remapper at all.
#[derive(Default)]
pub struct CountingRemapper {
    calls: AtomicUsize,
}

impl CountingRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Remapper for CountingRemapper {
    fn map(&self, exec_path: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        exec_path.to_string()
    }
}

/// A trivial, non-sharing `NestedSetLike` fixture: real nested sets flatten
/// lazily and share structure across the build graph, neither of which this
/// crate ever inspects, so a plain owned `Vec` is a faithful enough stand-in.
pub struct FakeNestedSet(pub Vec<Value>);

impl NestedSetLike for FakeNestedSet {
    fn to_list(&self) -> Vec<Value> {
        self.0.clone()
    }
}

pub fn nested_set(values: Vec<Value>) -> NestedSetHandle {
    Arc::new(FakeNestedSet(values))
}

/// A `NestedSetFingerprintCache` stand-in that never actually caches:
/// it records every adaptor it was handed (so tests can assert on the
/// `(identity(callable), has_directory_expander)` equality contract) and
/// folds the set's un-remapped, un-mapped-each contents into the sink,
/// mirroring the host's real cache closely enough to exercise this crate's
/// side of the contract.
#[derive(Default)]
pub struct RecordingNestedSetCache {
    pub adaptors: Mutex<Vec<Arc<MapEachFingerprintAdaptor>>>,
}

impl RecordingNestedSetCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NestedSetFingerprintCache for RecordingNestedSetCache {
    fn add_nested_set_to_fingerprint(
        &self,
        adaptors: &[Arc<MapEachFingerprintAdaptor>],
        sink: &mut dyn FingerprintSink,
        set: &NestedSetHandle,
    ) -> Result<(), CommandLineExpansionError> {
        self.adaptors.lock().unwrap().extend(adaptors.iter().cloned());
        for value in set.to_list() {
            sink.add_string(&expand_value(&value, &crate::remapper::IdentityRemapper));
        }
        Ok(())
    }
}

pub fn file(exec_path: impl Into<String>) -> Value {
    Value::artifact(Arc::new(FakeDerivedFile {
        exec_path: exec_path.into(),
    }))
}

pub fn source(path: impl Into<String>) -> Value {
    Value::artifact(Arc::new(FakeSourceFile { path: path.into() }))
}

pub fn tree(label: impl Into<String>) -> Value {
    Value::artifact(Arc::new(FakeTreeArtifact { label: label.into() }))
}

pub fn fileset(label: impl Into<String>) -> Value {
    Value::artifact(Arc::new(FakeFileset { label: label.into() }))
}
