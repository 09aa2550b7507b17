// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(unused_must_use)]
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::single_match_else,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(clippy::len_without_is_empty, clippy::redundant_field_names, clippy::too_many_arguments)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

//! A deferred command-line builder for build-action argument vectors.
//!
//! A [`CommandLineBuilder`] records a sequence of directives -- plain
//! values, vector-argument directives with `map_each`/`join_with`/etc., and
//! single-value format directives -- into a flat, append-only instruction
//! buffer. The resulting [`CommandLine`] defers all expensive work (directory
//! expansion, host-callable invocation, string formatting) until
//! [`CommandLine::arguments`] is actually called, and can alternatively be
//! walked by [`CommandLine::add_to_fingerprint`] to contribute to an action's
//! cache key without performing any of that real expansion.

mod builder;
mod command_line;
mod directory_expansion;
mod error;
mod fingerprint;
mod map_each;
mod nested_set;
mod remapper;
mod value;
mod vector_arg;

#[cfg(test)]
mod command_line_tests;
#[cfg(test)]
mod testutil;

pub use builder::{CommandLineBuilder, FlagPerLine};
pub use command_line::CommandLine;
pub use directory_expansion::{
    Expander, FilesetManifest, FilesetManifestEntry, MissingExpansion, RelativeSymlinkPolicy,
};
pub use error::CommandLineExpansionError;
pub use fingerprint::{FingerprintSink, Sha256Fingerprinter};
pub use map_each::{
    DirectoryExpanderHandle, MapEachCallError, MapEachCallable, MapEachSemantics, ScriptingEvalError,
    ScriptingValue, SourceLocation,
};
pub use nested_set::{MapEachFingerprintAdaptor, NestedSetFingerprintCache, NestedSetHandle, NestedSetLike};
pub use remapper::{IdentityRemapper, Remapper};
pub use value::{expand_value, ToCommandLine, Value};
pub use vector_arg::{format_one, VectorArgBuilder, VectorArgValues, VectorFeatures};
