// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::directory_expansion::Expander;
use crate::error::CommandLineExpansionError;
use crate::fingerprint::FingerprintSink;
use crate::map_each::MapEachCallable;
use crate::value::Value;

/// A host-provided, structure-sharing set of `Value`s. This crate only ever
/// flattens it (`to_list`) or hands it, unflattened, to the host's own
/// fingerprint cache -- it never inspects the sharing structure itself.
pub trait NestedSetLike: Send + Sync {
    fn to_list(&self) -> Vec<Value>;
}

pub type NestedSetHandle = Arc<dyn NestedSetLike>;

/// Host facade for fingerprinting a nested set without flattening it: the
/// host may already have a fingerprint cached for this exact
/// `(set, adaptor)` pair from a previous action, keyed by the adaptor's
/// `Eq`/`Hash` (identity of the callable plus whether an expander was
/// present), and can skip re-walking the set entirely.
pub trait NestedSetFingerprintCache: Send + Sync {
    fn add_nested_set_to_fingerprint(
        &self,
        adaptors: &[Arc<MapEachFingerprintAdaptor>],
        sink: &mut dyn FingerprintSink,
        set: &NestedSetHandle,
    ) -> Result<(), CommandLineExpansionError>;
}

/// The cache key used when a map-each directive's values are a nested set.
/// Equality and hashing are by the callable's identity and whether an
/// expander was supplied, never by the expander's value -- the expander
/// itself is only borrowed for the lifetime of a single fingerprint call and
/// is cleared immediately after, so a cached adaptor never outlives the
/// capability it was built with.
pub struct MapEachFingerprintAdaptor {
    callable: Arc<dyn MapEachCallable>,
    has_directory_expander: bool,
    expander: Mutex<Option<Arc<dyn Expander>>>,
    cleared: std::sync::atomic::AtomicBool,
}

impl MapEachFingerprintAdaptor {
    pub fn new(callable: Arc<dyn MapEachCallable>, expander: Option<Arc<dyn Expander>>) -> Self {
        MapEachFingerprintAdaptor {
            callable,
            has_directory_expander: expander.is_some(),
            expander: Mutex::new(expander),
            cleared: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn callable(&self) -> &Arc<dyn MapEachCallable> {
        &self.callable
    }

    /// Panics if called after `clear_expander`: a cached adaptor must never
    /// be asked to expand a directory once the capability it was built with
    /// has been released back to the single fingerprint call that owned it.
    pub fn expander(&self) -> Option<Arc<dyn Expander>> {
        assert!(
            !self.cleared.load(std::sync::atomic::Ordering::SeqCst),
            "MapEachFingerprintAdaptor::expander called after clear_expander; \
             a cached adaptor must not outlive the fingerprint call that built it"
        );
        self.expander.lock().clone()
    }

    /// Drop the held expander reference once this fingerprint pass is done,
    /// so a cached adaptor doesn't keep a stale capability alive. Does not
    /// change `Eq`/`Hash`, which depend only on `(identity(callable),
    /// has_directory_expander)`.
    pub fn clear_expander(&self) {
        self.expander.lock().take();
        self.cleared.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl std::fmt::Debug for MapEachFingerprintAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEachFingerprintAdaptor")
            .field("callable", &(Arc::as_ptr(&self.callable) as *const ()))
            .field("has_directory_expander", &self.has_directory_expander)
            .finish()
    }
}

impl PartialEq for MapEachFingerprintAdaptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
            && self.has_directory_expander == other.has_directory_expander
    }
}

impl Eq for MapEachFingerprintAdaptor {}

impl Hash for MapEachFingerprintAdaptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.callable) as *const () as usize).hash(state);
        self.has_directory_expander.hash(state);
    }
}
