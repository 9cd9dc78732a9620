//=========================================================================
// Subsystem Registry
//=========================================================================
//
// Maps a TypeKey to the single shared instance of that type.
//
// Registration is keyed by the instance's dynamic type, so a typed
// lookup can downcast safely: the key and the concrete type always
// agree. First registration wins.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::hash_map::Entry;

use log::{debug, warn};
use rustc_hash::FxHashMap;

//=== Internal Dependencies ===============================================

use super::object::ObjectRef;
use super::TypeKey;

//=== SubsystemRegistry ===================================================

/// Type-keyed table of singleton instances.
#[derive(Default)]
pub struct SubsystemRegistry {
    subsystems: FxHashMap<TypeKey, ObjectRef>,
}

impl SubsystemRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `instance` under its dynamic type key if the slot is free.
    ///
    /// On a duplicate the instance is handed back unchanged so the caller
    /// decides where it gets dropped.
    pub fn register(&mut self, instance: ObjectRef) -> Result<(), ObjectRef> {
        match self.subsystems.entry(instance.type_key()) {
            Entry::Occupied(_) => {
                warn!(
                    "Subsystem {} ({}) already registered, keeping existing",
                    instance.type_name(),
                    instance.type_key()
                );
                Err(instance)
            }
            Entry::Vacant(slot) => {
                debug!("Registered subsystem {} ({})", instance.type_name(), instance.type_key());
                slot.insert(instance);
                Ok(())
            }
        }
    }

    /// Direct lookup. Never constructs on demand.
    pub fn get(&self, key: TypeKey) -> Option<ObjectRef> {
        self.subsystems.get(&key).cloned()
    }

    /// Whether `key` has a registered subsystem.
    pub fn contains(&self, key: TypeKey) -> bool {
        self.subsystems.contains_key(&key)
    }

    /// All registered type keys in ascending order.
    pub fn types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.subsystems.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered subsystems.
    pub fn len(&self) -> usize {
        self.subsystems.len()
    }

    /// Whether no subsystem is registered.
    pub fn is_empty(&self) -> bool {
        self.subsystems.is_empty()
    }

    /// Removes every subsystem, returning them for dropping outside any
    /// borrow of the registry.
    pub(crate) fn take_all(&mut self) -> Vec<ObjectRef> {
        self.subsystems.drain().map(|(_, instance)| instance).collect()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
