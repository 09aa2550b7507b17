// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use internment::Intern;
use log::trace;

use crate::builder::{
    take_callable, take_count, take_location, take_nested_set, take_semantics, take_str,
    take_value, ArgSlot,
};
use crate::directory_expansion::{expand_directories, Expander};
use crate::error::CommandLineExpansionError;
use crate::fingerprint::{
    FingerprintSink, SALT_EXPAND_DIRECTORIES, SALT_HAS_ARG_NAME, SALT_HAS_BEFORE_EACH,
    SALT_HAS_FORMAT_EACH, SALT_HAS_FORMAT_JOINED, SALT_HAS_JOIN_WITH, SALT_HAS_TERMINATE_WITH,
    SALT_OMIT_IF_EMPTY, SALT_UNIQUIFY,
};
use crate::map_each::{apply_map_each, MapEachCallable, MapEachSemantics, SourceLocation};
use crate::nested_set::{MapEachFingerprintAdaptor, NestedSetFingerprintCache, NestedSetHandle};
use crate::remapper::{IdentityRemapper, Remapper};
use crate::value::{expand_value, Value};

pub(crate) mod bit {
    pub const HAS_MAP_EACH: u16 = 1 << 0;
    pub const IS_NESTED_SET: u16 = 1 << 1;
    pub const EXPAND_DIRECTORIES: u16 = 1 << 2;
    pub const UNIQUIFY: u16 = 1 << 3;
    pub const OMIT_IF_EMPTY: u16 = 1 << 4;
    pub const HAS_ARG_NAME: u16 = 1 << 5;
    pub const HAS_FORMAT_EACH: u16 = 1 << 6;
    pub const HAS_BEFORE_EACH: u16 = 1 << 7;
    pub const HAS_JOIN_WITH: u16 = 1 << 8;
    pub const HAS_FORMAT_JOINED: u16 = 1 << 9;
    pub const HAS_TERMINATE_WITH: u16 = 1 << 10;
    /// Bits above the 11 meaningful ones, asserted zero on construction.
    pub const RESERVED: u16 = !((1 << 11) - 1);
}

/// The `VectorArg` feature word: an 11-bit directive describing how one run
/// of values is decoded. `Copy`/`Eq`/`Hash` and interned exactly like
/// `fs::directory::Name(Intern<String>)` interns its `String` -- equal
/// feature words across the whole process share one `Intern` instance, so
/// the buffer only ever stores a pointer-sized handle for this slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct VectorFeatures(u16);

impl VectorFeatures {
    fn new(bits: u16) -> Self {
        assert_eq!(bits & bit::RESERVED, 0, "reserved feature bits must be zero");
        VectorFeatures(bits)
    }

    pub(crate) fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }
}

/// Formats a single value through a `%s` template, rejecting anything that
/// doesn't have exactly one placeholder -- used by both `format_each` and
/// `format_joined`.
pub fn format_one(template: &str, arg: &str) -> Result<String, CommandLineExpansionError> {
    let count = template.matches("%s").count();
    if count != 1 {
        return Err(CommandLineExpansionError::expansion(format!(
            "Invalid format string '{template}': expected exactly one %s placeholder, found {count}"
        )));
    }
    Ok(template.replacen("%s", arg, 1))
}

/// The values a `VectorArg` is built over: either a plain list (the common
/// case) or a host nested set, which supports incremental fingerprint
/// caching (`spec.md` §4.4, §6) that a plain `Vec` cannot.
pub enum VectorArgValues {
    List(Vec<Value>),
    NestedSet(NestedSetHandle),
}

/// Builds one `VectorArg` directive (C4). Constructed with its values, then
/// configured with the optional directives below, then pushed onto a
/// `CommandLineBuilder`'s buffer with `push`.
pub struct VectorArgBuilder {
    map_each: Option<(Arc<dyn MapEachCallable>, SourceLocation, MapEachSemantics)>,
    values: VectorArgValues,
    expand_directories: bool,
    uniquify: bool,
    omit_if_empty: bool,
    arg_name: Option<String>,
    format_each: Option<String>,
    before_each: Option<String>,
    join_with: Option<String>,
    format_joined: Option<String>,
    terminate_with: Option<String>,
}

impl VectorArgBuilder {
    pub fn new(values: VectorArgValues) -> Self {
        VectorArgBuilder {
            map_each: None,
            values,
            expand_directories: false,
            uniquify: false,
            omit_if_empty: false,
            arg_name: None,
            format_each: None,
            before_each: None,
            join_with: None,
            format_joined: None,
            terminate_with: None,
        }
    }

    /// A source location is always attached with `map_each`: it is cheap to
    /// require unconditionally, and it is the only thing that lets a failure
    /// inside the host's callable point back at the directive that caused it.
    pub fn map_each(
        mut self,
        callable: Arc<dyn MapEachCallable>,
        location: SourceLocation,
        semantics: MapEachSemantics,
    ) -> Self {
        self.map_each = Some((callable, location, semantics));
        self
    }

    pub fn expand_directories(mut self) -> Self {
        self.expand_directories = true;
        self
    }

    pub fn uniquify(mut self) -> Self {
        self.uniquify = true;
        self
    }

    pub fn omit_if_empty(mut self) -> Self {
        self.omit_if_empty = true;
        self
    }

    pub fn arg_name(mut self, name: impl Into<String>) -> Self {
        self.arg_name = Some(name.into());
        self
    }

    pub fn format_each(mut self, format: impl Into<String>) -> Self {
        self.format_each = Some(format.into());
        self
    }

    pub fn before_each(mut self, separator: impl Into<String>) -> Self {
        self.before_each = Some(separator.into());
        self
    }

    pub fn join_with(mut self, delimiter: impl Into<String>) -> Self {
        self.join_with = Some(delimiter.into());
        self
    }

    pub fn format_joined(mut self, format: impl Into<String>) -> Self {
        self.format_joined = Some(format.into());
        self
    }

    pub fn terminate_with(mut self, terminator: impl Into<String>) -> Self {
        self.terminate_with = Some(terminator.into());
        self
    }

    fn feature_word(&self) -> Result<VectorFeatures, CommandLineExpansionError> {
        // Open Question 2, resolved: this combination is undefined in the
        // decoder (which emission branch would win is not specified), so it
        // is rejected here rather than silently picking one.
        if self.before_each.is_some() && self.join_with.is_some() {
            return Err(CommandLineExpansionError::expansion(
                "before_each and join_with cannot both be set",
            ));
        }

        let mut bits = 0u16;
        if self.map_each.is_some() {
            bits |= bit::HAS_MAP_EACH;
        }
        if matches!(self.values, VectorArgValues::NestedSet(_)) {
            bits |= bit::IS_NESTED_SET;
        }
        if self.expand_directories {
            bits |= bit::EXPAND_DIRECTORIES;
        }
        if self.uniquify {
            bits |= bit::UNIQUIFY;
        }
        if self.omit_if_empty {
            bits |= bit::OMIT_IF_EMPTY;
        }
        if self.arg_name.is_some() {
            bits |= bit::HAS_ARG_NAME;
        }
        if self.format_each.is_some() {
            bits |= bit::HAS_FORMAT_EACH;
        }
        if self.before_each.is_some() {
            bits |= bit::HAS_BEFORE_EACH;
        }
        if self.join_with.is_some() {
            bits |= bit::HAS_JOIN_WITH;
        }
        if self.format_joined.is_some() {
            bits |= bit::HAS_FORMAT_JOINED;
        }
        if self.terminate_with.is_some() {
            bits |= bit::HAS_TERMINATE_WITH;
        }
        Ok(VectorFeatures::new(bits))
    }

    /// Encodes this directive's payload onto `stream`, in the fixed order
    /// the decoder expects: feature word, map-each triple, values/nested-set,
    /// then the optional trailing slots in declaration order.
    pub(crate) fn push(self, stream: &mut Vec<ArgSlot>) -> Result<(), CommandLineExpansionError> {
        let features = self.feature_word()?;
        let interned = Intern::new(features);
        trace!("interned VectorArg feature word {:?} at {:p}", features, &*interned);
        stream.push(ArgSlot::Features(interned));

        if let Some((callable, location, semantics)) = self.map_each {
            stream.push(ArgSlot::Callable(callable));
            stream.push(ArgSlot::Location(location));
            stream.push(ArgSlot::Semantics(semantics));
        }

        match self.values {
            VectorArgValues::NestedSet(set) => stream.push(ArgSlot::NestedSet(set)),
            VectorArgValues::List(values) => {
                stream.push(ArgSlot::Count(values.len()));
                for value in values {
                    stream.push(ArgSlot::Value(value));
                }
            }
        }

        if let Some(name) = self.arg_name {
            stream.push(ArgSlot::Str(name));
        }
        if let Some(format) = self.format_each {
            stream.push(ArgSlot::Str(format));
        }
        if let Some(separator) = self.before_each {
            stream.push(ArgSlot::Str(separator));
        }
        if let Some(delimiter) = self.join_with {
            stream.push(ArgSlot::Str(delimiter));
        }
        if let Some(format) = self.format_joined {
            stream.push(ArgSlot::Str(format));
        }
        if let Some(terminator) = self.terminate_with {
            stream.push(ArgSlot::Str(terminator));
        }

        Ok(())
    }
}

/// Implements the decode half of C4: reads one `VectorArg` directive
/// starting at `index` (just past its `Features` slot), appends its rendered
/// tokens to `out`, and returns the index of the next slot.
pub async fn eval(
    features: VectorFeatures,
    stream: &[ArgSlot],
    mut index: usize,
    out: &mut Vec<String>,
    expander: Option<&Arc<dyn Expander>>,
    remapper: &dyn Remapper,
) -> Result<usize, CommandLineExpansionError> {
    let map_each = if features.has(bit::HAS_MAP_EACH) {
        let callable = take_callable(stream, &mut index);
        let location = take_location(stream, &mut index);
        let semantics = take_semantics(stream, &mut index);
        Some((callable, location, semantics))
    } else {
        None
    };

    let mut values = if features.has(bit::IS_NESTED_SET) {
        let set = take_nested_set(stream, &mut index);
        set.to_list()
    } else {
        let count = take_count(stream, &mut index);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(take_value(stream, &mut index));
        }
        values
    };

    if features.has(bit::EXPAND_DIRECTORIES) {
        values = expand_directories(values, expander, remapper)?;
    }

    let mut strings = if let Some((callable, location, _semantics)) = &map_each {
        apply_map_each(callable.as_ref(), &values, location, expander).await?
    } else {
        values.iter().map(|v| expand_value(v, remapper)).collect()
    };

    let arg_name = if features.has(bit::HAS_ARG_NAME) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };
    let format_each = if features.has(bit::HAS_FORMAT_EACH) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };
    let before_each = if features.has(bit::HAS_BEFORE_EACH) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };
    let join_with = if features.has(bit::HAS_JOIN_WITH) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };
    let format_joined = if features.has(bit::HAS_FORMAT_JOINED) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };
    let terminate_with = if features.has(bit::HAS_TERMINATE_WITH) {
        Some(take_str(stream, &mut index))
    } else {
        None
    };

    if features.has(bit::UNIQUIFY) {
        let mut seen = std::collections::HashSet::with_capacity(strings.len());
        strings.retain(|s| seen.insert(s.clone()));
    }

    let is_empty_and_should_omit = strings.is_empty() && features.has(bit::OMIT_IF_EMPTY);

    if let Some(name) = &arg_name {
        if !is_empty_and_should_omit {
            out.push(name.clone());
        }
    }

    if let Some(format) = &format_each {
        for s in strings.iter_mut() {
            *s = format_one(format, s)?;
        }
    }

    if features.has(bit::HAS_BEFORE_EACH) {
        let before = before_each.as_ref().expect("HAS_BEFORE_EACH without payload");
        for s in &strings {
            out.push(before.clone());
            out.push(s.clone());
        }
    } else if features.has(bit::HAS_JOIN_WITH) {
        if !is_empty_and_should_omit {
            let delimiter = join_with.as_ref().expect("HAS_JOIN_WITH without payload");
            let joined = strings.join(delimiter);
            let joined = match &format_joined {
                Some(format) => format_one(format, &joined)?,
                None => joined,
            };
            out.push(joined);
        }
    } else {
        out.extend(strings.iter().cloned());
    }

    if features.has(bit::HAS_TERMINATE_WITH) && !is_empty_and_should_omit {
        out.push(
            terminate_with
                .expect("HAS_TERMINATE_WITH without payload")
                .clone(),
        );
    }

    Ok(index)
}

/// Implements the fingerprint half of C4: mirrors `eval`'s decode walk but
/// never calls the host's real expansion, using the identity remapper and,
/// for a plain list of values, feeding whatever `expand_directories` returns
/// -- including, when no expander is present, the unexpanded directory
/// values themselves.
///
/// This is deliberate, not a bug: at analysis time there usually is no
/// sandbox yet to expand a tree artifact against, so the fingerprint already
/// has to approximate. `expand_directories` already returns its input
/// unchanged whenever no expander is present, so this function does not
/// special-case it -- the approximation falls out of reusing the same
/// helper `eval` uses.
pub async fn add_to_fingerprint(
    features: VectorFeatures,
    stream: &[ArgSlot],
    mut index: usize,
    sink: &mut dyn FingerprintSink,
    expander: Option<&Arc<dyn Expander>>,
    nested_set_cache: &dyn NestedSetFingerprintCache,
) -> Result<usize, CommandLineExpansionError> {
    let map_each = if features.has(bit::HAS_MAP_EACH) {
        let callable = take_callable(stream, &mut index);
        let location = take_location(stream, &mut index);
        let semantics = take_semantics(stream, &mut index);
        Some((callable, location, semantics))
    } else {
        None
    };

    if features.has(bit::IS_NESTED_SET) {
        let set = take_nested_set(stream, &mut index);
        match &map_each {
            Some((callable, _location, _semantics)) => {
                let adaptor = Arc::new(MapEachFingerprintAdaptor::new(
                    Arc::clone(callable),
                    expander.map(Arc::clone),
                ));
                let result =
                    nested_set_cache.add_nested_set_to_fingerprint(&[Arc::clone(&adaptor)], sink, &set);
                adaptor.clear_expander();
                result?;
            }
            None => {
                for value in set.to_list() {
                    sink.add_string(&expand_value(&value, &IdentityRemapper));
                }
            }
        }
    } else {
        let count = take_count(stream, &mut index);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(take_value(stream, &mut index));
        }
        if features.has(bit::EXPAND_DIRECTORIES) {
            values = expand_directories(values, expander, &IdentityRemapper)?;
        }
        match &map_each {
            Some((callable, location, _semantics)) => {
                let strings = apply_map_each(callable.as_ref(), &values, location, expander).await?;
                for s in &strings {
                    sink.add_string(s);
                }
            }
            None => {
                for value in &values {
                    sink.add_string(&expand_value(value, &IdentityRemapper));
                }
            }
        }
    }

    if features.has(bit::EXPAND_DIRECTORIES) {
        sink.add_uuid(*SALT_EXPAND_DIRECTORIES);
    }
    if features.has(bit::UNIQUIFY) {
        sink.add_uuid(*SALT_UNIQUIFY);
    }
    if features.has(bit::OMIT_IF_EMPTY) {
        sink.add_uuid(*SALT_OMIT_IF_EMPTY);
    }
    if features.has(bit::HAS_ARG_NAME) {
        let name = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_ARG_NAME);
        sink.add_string(&name);
    }
    if features.has(bit::HAS_FORMAT_EACH) {
        let format = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_FORMAT_EACH);
        sink.add_string(&format);
    }
    if features.has(bit::HAS_BEFORE_EACH) {
        let separator = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_BEFORE_EACH);
        sink.add_string(&separator);
    }
    if features.has(bit::HAS_JOIN_WITH) {
        let delimiter = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_JOIN_WITH);
        sink.add_string(&delimiter);
    }
    if features.has(bit::HAS_FORMAT_JOINED) {
        let format = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_FORMAT_JOINED);
        sink.add_string(&format);
    }
    if features.has(bit::HAS_TERMINATE_WITH) {
        let terminator = take_str(stream, &mut index);
        sink.add_uuid(*SALT_HAS_TERMINATE_WITH);
        sink.add_string(&terminator);
    }

    Ok(index)
}
