// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use crate::builder::{take_features, take_str, take_value, ArgSlot};
use crate::directory_expansion::Expander;
use crate::error::CommandLineExpansionError;
use crate::fingerprint::{FingerprintSink, SALT_SINGLE_FORMATTED};
use crate::nested_set::NestedSetFingerprintCache;
use crate::remapper::{IdentityRemapper, Remapper};
use crate::value::expand_value;
use crate::vector_arg;

/// The decoded payload shared by both `CommandLine::Plain` and
/// `CommandLine::Grouped`; `group_starts` is empty for the former.
pub(crate) struct DecodedCommandLine {
    pub(crate) stream: Arc<[ArgSlot]>,
    pub(crate) group_starts: Vec<usize>,
}

/// Implements C6: the immutable, built command line. Produced only by
/// `CommandLineBuilder::build`, never constructed directly.
pub enum CommandLine {
    /// No directives were ever added.
    Empty,
    /// Every decoded token is emitted as its own argument.
    Plain(DecodedCommandLine),
    /// Tokens belonging to the same `record_arg_start` group are coalesced
    /// into `first=rest joined by spaces` (`spec.md` §4.6).
    Grouped(DecodedCommandLine),
}

impl CommandLine {
    /// Fully decodes this command line into the argument vector that should
    /// be passed to the process being constructed.
    pub async fn arguments(
        &self,
        expander: Option<&Arc<dyn Expander>>,
        remapper: &dyn Remapper,
    ) -> Result<Vec<String>, CommandLineExpansionError> {
        let (stream, group_starts) = match self {
            CommandLine::Empty => return Ok(Vec::new()),
            CommandLine::Plain(decoded) => (&decoded.stream, None),
            CommandLine::Grouped(decoded) => (&decoded.stream, Some(&decoded.group_starts)),
        };

        let mut out = Vec::new();
        let mut result_group_starts = Vec::new();
        let mut next_group = 0;
        let mut index = 0;
        while index < stream.len() {
            if let Some(starts) = group_starts {
                if next_group < starts.len() && starts[next_group] == index {
                    result_group_starts.push(out.len());
                    next_group += 1;
                }
            }
            match &stream[index] {
                ArgSlot::Features(_) => {
                    let features = take_features(stream, &mut index);
                    index =
                        vector_arg::eval(features, stream, index, &mut out, expander, remapper)
                            .await?;
                }
                ArgSlot::FormattedMarker => {
                    let mut cursor = index + 1;
                    let value = take_value(stream, &mut cursor);
                    let format = take_str(stream, &mut cursor);
                    out.push(vector_arg::format_one(&format, &expand_value(&value, remapper))?);
                    index = cursor;
                }
                ArgSlot::Value(value) => {
                    out.push(expand_value(value, remapper));
                    index += 1;
                }
                other => panic!("command line decoder invariant breach: unexpected top-level slot {other:?}"),
            }
        }

        let out = remapper.map_custom_args(out);

        Ok(match group_starts {
            Some(_) => coalesce_groups(out, &result_group_starts),
            None => out,
        })
    }

    /// Mirrors `arguments` into a fingerprint sink without ever performing
    /// real directory expansion or remapping (`spec.md` §4.4, §4.7).
    pub async fn add_to_fingerprint(
        &self,
        sink: &mut dyn FingerprintSink,
        expander: Option<&Arc<dyn Expander>>,
        nested_set_cache: &dyn NestedSetFingerprintCache,
    ) -> Result<(), CommandLineExpansionError> {
        let stream = match self {
            CommandLine::Empty => return Ok(()),
            CommandLine::Plain(decoded) | CommandLine::Grouped(decoded) => &decoded.stream,
        };

        let mut index = 0;
        while index < stream.len() {
            match &stream[index] {
                ArgSlot::Features(_) => {
                    let features = take_features(stream, &mut index);
                    index = vector_arg::add_to_fingerprint(
                        features,
                        stream,
                        index,
                        sink,
                        expander,
                        nested_set_cache,
                    )
                    .await?;
                }
                ArgSlot::FormattedMarker => {
                    let mut cursor = index + 1;
                    let value = take_value(stream, &mut cursor);
                    let format = take_str(stream, &mut cursor);
                    sink.add_string(&expand_value(&value, &IdentityRemapper));
                    sink.add_string(&format);
                    sink.add_uuid(*SALT_SINGLE_FORMATTED);
                    index = cursor;
                }
                ArgSlot::Value(value) => {
                    sink.add_string(&expand_value(value, &IdentityRemapper));
                    index += 1;
                }
                other => panic!("command line decoder invariant breach: unexpected top-level slot {other:?}"),
            }
        }
        Ok(())
    }
}

/// Coalesces tokens recorded between successive `record_arg_start` points:
/// a group of zero or one token passes through unchanged; a group of two or
/// more becomes `first=rest joined by " "`, unless `first` is empty, in
/// which case only the joined rest is emitted.
fn coalesce_groups(tokens: Vec<String>, starts: &[usize]) -> Vec<String> {
    let mut result = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(tokens.len());
        let group = &tokens[start..end];
        match group.len() {
            0 => {}
            1 => result.push(group[0].clone()),
            _ => {
                let first = &group[0];
                let rest = group[1..].join(" ");
                if first.is_empty() {
                    result.push(rest);
                } else {
                    result.push(format!("{first}={rest}"));
                }
            }
        }
    }
    result
}
