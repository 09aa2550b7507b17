// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::sync::Arc;

use internment::Intern;
use log::error;

use crate::command_line::{CommandLine, DecodedCommandLine};
use crate::map_each::{MapEachCallable, MapEachSemantics, SourceLocation};
use crate::nested_set::NestedSetHandle;
use crate::value::Value;
use crate::vector_arg::{VectorArgBuilder, VectorFeatures};

/// One slot of the flat, append-only instruction buffer (`spec.md` §3, §5).
/// A typed-variant enum rather than a single heterogeneous object array,
/// since Rust has no sound way to erase unrelated types into one array slot
/// without `unsafe`; this still gets the buffer's main win, a single `Vec`
/// with no per-directive heap node.
pub enum ArgSlot {
    Value(Value),
    Callable(Arc<dyn MapEachCallable>),
    Location(SourceLocation),
    Semantics(MapEachSemantics),
    NestedSet(NestedSetHandle),
    Str(String),
    Count(usize),
    Features(Intern<VectorFeatures>),
    FormattedMarker,
}

impl fmt::Debug for ArgSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSlot::Value(v) => write!(f, "Value({v:?})"),
            ArgSlot::Callable(_) => write!(f, "Callable(..)"),
            ArgSlot::Location(l) => write!(f, "Location({l:?})"),
            ArgSlot::Semantics(s) => write!(f, "Semantics({s:?})"),
            ArgSlot::NestedSet(_) => write!(f, "NestedSet(..)"),
            ArgSlot::Str(s) => write!(f, "Str({s:?})"),
            ArgSlot::Count(c) => write!(f, "Count({c})"),
            ArgSlot::Features(features) => write!(f, "Features({:?})", **features),
            ArgSlot::FormattedMarker => write!(f, "FormattedMarker"),
        }
    }
}

fn invariant_breach(slot: &ArgSlot) -> ! {
    error!("command line decoder index drift: unexpected slot {slot:?}");
    panic!("command line decoder index drift: unexpected slot {slot:?}");
}

pub(crate) fn take_value(stream: &[ArgSlot], index: &mut usize) -> Value {
    match &stream[*index] {
        ArgSlot::Value(v) => {
            *index += 1;
            v.clone()
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_str(stream: &[ArgSlot], index: &mut usize) -> String {
    match &stream[*index] {
        ArgSlot::Str(s) => {
            *index += 1;
            s.clone()
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_count(stream: &[ArgSlot], index: &mut usize) -> usize {
    match &stream[*index] {
        ArgSlot::Count(c) => {
            *index += 1;
            *c
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_callable(stream: &[ArgSlot], index: &mut usize) -> Arc<dyn MapEachCallable> {
    match &stream[*index] {
        ArgSlot::Callable(c) => {
            *index += 1;
            Arc::clone(c)
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_location(stream: &[ArgSlot], index: &mut usize) -> SourceLocation {
    match &stream[*index] {
        ArgSlot::Location(l) => {
            *index += 1;
            l.clone()
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_semantics(stream: &[ArgSlot], index: &mut usize) -> MapEachSemantics {
    match &stream[*index] {
        ArgSlot::Semantics(s) => {
            *index += 1;
            *s
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_nested_set(stream: &[ArgSlot], index: &mut usize) -> NestedSetHandle {
    match &stream[*index] {
        ArgSlot::NestedSet(s) => {
            *index += 1;
            Arc::clone(s)
        }
        other => invariant_breach(other),
    }
}

pub(crate) fn take_features(stream: &[ArgSlot], index: &mut usize) -> VectorFeatures {
    match &stream[*index] {
        ArgSlot::Features(f) => {
            *index += 1;
            **f
        }
        other => invariant_breach(other),
    }
}

/// `FlagPerLine::{Yes, No}` replaces a bare `bool` at the `build()` boundary,
/// the way `fs::directory::SymlinkBehavior` replaces a bare `bool` with
/// `Aware`/`Oblivious`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagPerLine {
    Yes,
    No,
}

/// Accumulates an instruction buffer. Appending is the only mutation this
/// type supports; once `build()` consumes it, the resulting `CommandLine` is
/// immutable (`spec.md` Non-goals: "no mutation after build").
#[derive(Default)]
pub struct CommandLineBuilder {
    stream: Vec<ArgSlot>,
    group_starts: Vec<usize>,
}

impl CommandLineBuilder {
    pub fn new() -> Self {
        CommandLineBuilder::default()
    }

    /// Marks the start of a new flag-per-line group. Only consulted when the
    /// command line is later built with `FlagPerLine::Yes`.
    pub fn record_arg_start(&mut self) {
        self.group_starts.push(self.stream.len());
    }

    pub fn add(&mut self, value: Value) {
        self.stream.push(ArgSlot::Value(value));
    }

    pub fn add_vector(
        &mut self,
        vector: VectorArgBuilder,
    ) -> Result<(), crate::error::CommandLineExpansionError> {
        vector.push(&mut self.stream)
    }

    /// A single value rendered through a one-shot format string, without the
    /// full `VectorArg` machinery -- the degenerate "one value, one format"
    /// case that doesn't need a feature word at all.
    pub fn add_formatted(&mut self, value: Value, format: impl Into<String>) {
        self.stream.push(ArgSlot::FormattedMarker);
        self.stream.push(ArgSlot::Value(value));
        self.stream.push(ArgSlot::Str(format.into()));
    }

    pub fn build(self, flag_per_line: FlagPerLine) -> CommandLine {
        if self.stream.is_empty() {
            return CommandLine::Empty;
        }
        let stream: Arc<[ArgSlot]> = self.stream.into();
        match flag_per_line {
            FlagPerLine::No => CommandLine::Plain(DecodedCommandLine {
                stream,
                group_starts: Vec::new(),
            }),
            FlagPerLine::Yes => CommandLine::Grouped(DecodedCommandLine {
                stream,
                group_starts: self.group_starts,
            }),
        }
    }
}
