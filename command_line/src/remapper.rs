// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

/// Rewrites derived-artifact exec paths, and (rarely) an already-built
/// argument vector, between the sandbox the host constructed the command
/// line against and the one it actually runs in.
///
/// Most command lines never need a real remapper; `IdentityRemapper` is the
/// default a caller reaches for outside of the handful of execution
/// strategies (e.g. nailgun-style persistent workers) that relocate outputs.
pub trait Remapper: Send + Sync {
    /// Rewrite a single derived-artifact exec path.
    fn map(&self, exec_path: &str) -> String;

    /// Rewrite the fully-expanded argument vector as a final pass. Most
    /// remappers leave this as the identity; it exists for host strategies
    /// that need to post-process the whole vector rather than path by path.
    fn map_custom_args(&self, args: Vec<String>) -> Vec<String> {
        args
    }
}

/// The identity `Remapper`, used both as the default at the public API and,
/// unconditionally, while fingerprinting (`spec.md` §4.4: "the remapper used
/// is always the identity remapper").
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityRemapper;

impl Remapper for IdentityRemapper {
    fn map(&self, exec_path: &str) -> String {
        exec_path.to_string()
    }
}
