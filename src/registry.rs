use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::comparator::RawComparator;
use crate::error::{Error, Result};
use crate::writable::{CompositeKey, WritableComparable};

/// Maps key types to their full-order comparator.
///
/// Built once at startup and then shared by reference; nothing mutates it
/// while sorts are running. Each type has one slot, for the order used to
/// sort. Grouping orders are chosen per job and never stored here.
#[derive(Default)]
pub struct ComparatorRegistry {
    comparators: HashMap<TypeId, Registration>,
}

struct Registration {
    type_name: &'static str,
    comparator: Arc<dyn RawComparator>,
}

impl ComparatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the defaults for the key types this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_default::<CompositeKey>();
        registry.register_default::<String>();
        registry
    }

    /// Set the comparator for `K`, returning the one it replaced.
    pub fn register<K: 'static>(
        &mut self,
        comparator: Arc<dyn RawComparator>,
    ) -> Option<Arc<dyn RawComparator>> {
        debug!(key_type = type_name::<K>(), comparator = comparator.name(), "registering comparator");
        self.comparators
            .insert(
                TypeId::of::<K>(),
                Registration {
                    type_name: type_name::<K>(),
                    comparator,
                },
            )
            .map(|old| old.comparator)
    }

    /// Register `K`'s own raw comparator. Calling this again is harmless.
    pub fn register_default<K: WritableComparable>(&mut self) {
        self.register::<K>(K::raw_comparator());
    }

    /// The comparator registered for `K`, if any.
    pub fn get<K: 'static>(&self) -> Option<Arc<dyn RawComparator>> {
        self.comparators
            .get(&TypeId::of::<K>())
            .map(|r| Arc::clone(&r.comparator))
    }

    /// Like `get`, but a missing registration is an error.
    pub fn comparator_for<K: 'static>(&self) -> Result<Arc<dyn RawComparator>> {
        self.get::<K>()
            .ok_or_else(|| Error::MissingComparator(type_name::<K>()))
    }

    /// Names of the registered key types, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.comparators.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }
}
