//=========================================================================
// Type Key
//=========================================================================
//
// Fixed-width hashed identifier for object types, event types and event
// parameter names.
//
// Hashing: SDBM over ASCII-lowercased bytes, 32 bits, wrapping.
//
// Two names that hash to the same value ARE the same key. Lookups never
// fall back to comparing the original strings.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== TypeKey =============================================================

/// Hashed identifier standing in for a type, event or parameter name.
///
/// Built at compile time where possible:
///
/// ```rust
/// use aetheric_runtime::core::TypeKey;
///
/// const E_UPDATE: TypeKey = TypeKey::new("Update");
/// assert_eq!(E_UPDATE, TypeKey::new("update"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TypeKey(u32);

impl TypeKey {
    /// The key of the empty name.
    pub const ZERO: TypeKey = TypeKey(0);

    /// Hashes `name` into a key. Case-insensitive for ASCII.
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash: u32 = 0;
        let mut i = 0;

        while i < bytes.len() {
            let c = bytes[i].to_ascii_lowercase() as u32;
            hash = c
                .wrapping_add(hash << 6)
                .wrapping_add(hash << 16)
                .wrapping_sub(hash);
            i += 1;
        }

        TypeKey(hash)
    }

    /// Wraps an already computed hash value.
    pub const fn from_value(value: u32) -> Self {
        TypeKey(value)
    }

    /// Returns the raw hash value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this is [`TypeKey::ZERO`].
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::new(name)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:#010x})", self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_zero() {
        assert_eq!(TypeKey::new(""), TypeKey::ZERO);
        assert!(TypeKey::new("").is_zero());
        assert_eq!(TypeKey::default(), TypeKey::ZERO);
    }

    #[test]
    fn hashing_is_case_insensitive() {
        assert_eq!(TypeKey::new("BeginFrame"), TypeKey::new("BEGINFRAME"));
        assert_eq!(TypeKey::new("BeginFrame"), TypeKey::new("beginframe"));
    }

    #[test]
    fn distinct_names_give_distinct_keys() {
        assert_ne!(TypeKey::new("Camera"), TypeKey::new("Light"));
        assert_ne!(TypeKey::new("ab"), TypeKey::new("ba"));
    }

    #[test]
    fn single_character_hash_is_its_lowercase_code() {
        // hash = c + (0 << 6) + (0 << 16) - 0
        assert_eq!(TypeKey::new("a").value(), 'a' as u32);
        assert_eq!(TypeKey::new("A").value(), 'a' as u32);
    }

    #[test]
    fn keys_compare_by_value_only() {
        let a = TypeKey::from_value(42);
        let b = TypeKey::from_value(42);
        assert_eq!(a, b);
        assert!(TypeKey::from_value(1) < TypeKey::from_value(2));
    }

    #[test]
    fn const_construction_matches_runtime() {
        const KEY: TypeKey = TypeKey::new("Node");
        let runtime: TypeKey = "Node".into();
        assert_eq!(KEY, runtime);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(TypeKey::from_value(0xab).to_string(), "000000ab");
        assert_eq!(format!("{:?}", TypeKey::from_value(0xab)), "TypeKey(0x000000ab)");
    }
}
