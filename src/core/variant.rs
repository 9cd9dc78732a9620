//=========================================================================
// Variant
//=========================================================================
//
// Dynamically typed values carried in event payloads and used as
// attribute defaults.
//
// Architecture:
//   VariantMap = FxHashMap<TypeKey, Variant>
//     key   → parameter name hash (e.g. P_TIMESTEP)
//     value → Variant
//
//=========================================================================

//=== External Dependencies ===============================================

use rustc_hash::FxHashMap;

//=== Internal Dependencies ===============================================

use super::object::ObjectId;
use super::TypeKey;

//=== VariantType =========================================================

/// Tag of a [`Variant`], also used as an attribute's value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariantType {
    #[default]
    Empty,
    Bool,
    Int,
    Float,
    String,
    Key,
    Object,
}

//=== Variant =============================================================

/// A single dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Key(TypeKey),
    /// Identity of an object, or none.
    Object(Option<ObjectId>),
}

impl Variant {
    /// Tag of the stored value.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Empty => VariantType::Empty,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Key(_) => VariantType::Key,
            Variant::Object(_) => VariantType::Object,
        }
    }

    /// Whether this is [`Variant::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    //--- Accessors --------------------------------------------------------
    //
    // Each accessor returns `None` when the variant holds another type.
    //

    /// The value if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is an int.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Variant::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is a float.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Variant::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// The value if this is a type key.
    pub fn as_key(&self) -> Option<TypeKey> {
        match self {
            Variant::Key(v) => Some(*v),
            _ => None,
        }
    }

    /// The object id if this is a non-null object reference.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Variant::Object(v) => *v,
            _ => None,
        }
    }
}

//--- Conversions ----------------------------------------------------------

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::Int(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Variant::Float(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

impl From<TypeKey> for Variant {
    fn from(v: TypeKey) -> Self {
        Variant::Key(v)
    }
}

impl From<ObjectId> for Variant {
    fn from(v: ObjectId) -> Self {
        Variant::Object(Some(v))
    }
}

//=== VariantMap ==========================================================

/// Event payload: parameter name hash → value.
pub type VariantMap = FxHashMap<TypeKey, Variant>;

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        let v = Variant::default();
        assert!(v.is_empty());
        assert_eq!(v.variant_type(), VariantType::Empty);
    }

    #[test]
    fn accessors_match_only_their_type() {
        let v = Variant::from(7);
        assert_eq!(v.as_int(), Some(7));
        assert_eq!(v.as_float(), None);
        assert_eq!(v.as_bool(), None);

        let v = Variant::from("hello");
        assert_eq!(v.as_str(), Some("hello"));
        assert_eq!(v.variant_type(), VariantType::String);
    }

    #[test]
    fn object_variant_may_be_null() {
        assert_eq!(Variant::Object(None).as_object(), None);
        assert_eq!(Variant::Object(None).variant_type(), VariantType::Object);
    }

    #[test]
    fn map_is_keyed_by_parameter_hash() {
        let mut data = VariantMap::default();
        data.insert(TypeKey::new("TimeStep"), 0.5f32.into());
        data.insert(TypeKey::new("FrameNumber"), 3.into());

        assert_eq!(data[&TypeKey::new("timestep")].as_float(), Some(0.5));
        assert_eq!(data[&TypeKey::new("FrameNumber")].as_int(), Some(3));
        assert!(data.get(&TypeKey::new("Missing")).is_none());
    }
}
