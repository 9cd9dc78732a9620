//=========================================================================
// Attribute Registry
//=========================================================================
//
// Reflection metadata per object type: an ordered list of attribute
// descriptors, registered once per type (not per instance).
//
// Architecture:
//   AttributeRegistry
//     └─ attributes: FxHashMap<TypeKey, Vec<AttributeInfo>>
//
// copy_base() is a snapshot copy. Later changes to the base list are not
// seen by the derived list.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{debug, warn};
use rustc_hash::FxHashMap;

//=== Internal Dependencies ===============================================

use super::{TypeKey, Variant, VariantType};

//=== AttributeMode =======================================================

/// Where an attribute participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeMode {
    /// Serialization and network replication.
    #[default]
    Both,
    /// Serialization only.
    File,
    /// Network replication only.
    Network,
}

//=== AttributeInfo =======================================================

/// Descriptor of one reflectable attribute.
///
/// The runtime only compares descriptors by name; kind, offset, default
/// and mode are carried for the serializers that consume them.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub kind: VariantType,
    pub offset: usize,
    pub default_value: Variant,
    pub mode: AttributeMode,
}

impl AttributeInfo {
    /// Creates a descriptor with an empty default and [`AttributeMode::Both`].
    pub fn new(name: impl Into<String>, kind: VariantType, offset: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            offset,
            default_value: Variant::Empty,
            mode: AttributeMode::Both,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, default_value: impl Into<Variant>) -> Self {
        self.default_value = default_value.into();
        self
    }

    /// Sets where the attribute is used.
    pub fn with_mode(mut self, mode: AttributeMode) -> Self {
        self.mode = mode;
        self
    }
}

//=== AttributeRegistry ===================================================

/// Type-keyed table of attribute descriptor lists.
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    attributes: FxHashMap<TypeKey, Vec<AttributeInfo>>,
}

impl AttributeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    //--- Mutation ---------------------------------------------------------

    /// Appends `attr` to the list of `type_key`, creating it on first use.
    pub fn register(&mut self, type_key: TypeKey, attr: AttributeInfo) {
        let list = self.attributes.entry(type_key).or_default();

        // Names should be unique per type; the caller owns that.
        if list.iter().any(|a| a.name == attr.name) {
            warn!("Attribute {:?} registered twice for {}", attr.name, type_key);
        }

        list.push(attr);
    }

    /// Removes the first attribute named `name`. No-op if absent.
    pub fn remove(&mut self, type_key: TypeKey, name: &str) {
        let Some(list) = self.attributes.get_mut(&type_key) else {
            return;
        };

        if let Some(pos) = list.iter().position(|a| a.name == name) {
            list.remove(pos);
        }
    }

    /// Appends a copy of every attribute of `base` to `derived`.
    ///
    /// Must run after the base type finished registering. Names already
    /// present in `derived` are not deduplicated.
    pub fn copy_base(&mut self, base: TypeKey, derived: TypeKey) {
        let Some(base_list) = self.attributes.get(&base) else {
            return;
        };

        let copied = base_list.clone();
        debug!("Copying {} attribute(s) from {} to {}", copied.len(), base, derived);
        self.attributes.entry(derived).or_default().extend(copied);
    }

    //--- Queries ----------------------------------------------------------

    /// Attribute list of `type_key`, or `None` when the type has no
    /// reflection data.
    pub fn get(&self, type_key: TypeKey) -> Option<&[AttributeInfo]> {
        self.attributes.get(&type_key).map(Vec::as_slice)
    }

    /// Looks up one attribute of `type_key` by name.
    pub fn attribute(&self, type_key: TypeKey, name: &str) -> Option<&AttributeInfo> {
        self.get(type_key)?.iter().find(|a| a.name == name)
    }

    /// All type keys with reflection data, in ascending order.
    pub fn types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.attributes.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
