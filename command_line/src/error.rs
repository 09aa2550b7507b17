// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

/// Failure produced while expanding or fingerprinting a command line.
///
/// This is deliberately not a `thiserror`-derived type: expansion failures
/// here are data about a malformed action, not a bug in this crate, and the
/// rest of the tree reports that kind of failure as a plain enum with a
/// hand-written `Display` (see `fs::directory::MergeError`). A bug in this
/// crate itself -- an unknown directory kind, a decoder that reads past the
/// end of the buffer -- is a panic, never a variant here.
#[derive(Debug)]
pub enum CommandLineExpansionError {
    /// A recoverable failure: a malformed format string, a `map_each` that
    /// returned the wrong type, a fileset that was never registered as an
    /// input, or a wrapped failure from the host's scripting runtime.
    Expansion(String),
    /// Cooperative cancellation, propagated from a host callable or a
    /// nested-set flattening. Never swallowed; always re-raised by callers.
    Cancelled,
}

impl CommandLineExpansionError {
    pub fn expansion<S: Into<String>>(message: S) -> Self {
        CommandLineExpansionError::Expansion(message.into())
    }
}

impl fmt::Display for CommandLineExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLineExpansionError::Expansion(message) => write!(f, "{message}"),
            CommandLineExpansionError::Cancelled => {
                write!(f, "command line expansion was cancelled")
            }
        }
    }
}

impl std::error::Error for CommandLineExpansionError {}
