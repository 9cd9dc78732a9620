//=========================================================================
// Object Factory Registry
//=========================================================================
//
// Maps a TypeKey to the factory that constructs instances of that type.
//
// Architecture:
//   FactoryRegistry
//     └─ factories: FxHashMap<TypeKey, Rc<dyn ObjectFactory>>
//
// First registration wins; later registrations for the same key are
// ignored. Unknown keys create nothing.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::marker::PhantomData;
use std::rc::Rc;

use log::{debug, warn};
use rustc_hash::FxHashMap;

//=== Internal Dependencies ===============================================

use super::object::{ObjectRef, ObjectType};
use super::TypeKey;
use crate::context::Context;

//=== ObjectFactory Trait =================================================

/// Constructs instances of one concrete object type.
///
/// Owns no instances. Each call to [`ObjectFactory::create`] returns a new
/// object.
pub trait ObjectFactory {
    /// Type key of the objects this factory produces.
    fn produced_type(&self) -> TypeKey;

    /// Human-readable name of the produced type.
    fn type_name(&self) -> &'static str;

    fn create(&self, context: &Context) -> ObjectRef;
}

//=== TypedFactory ========================================================

/// Factory for a statically known [`ObjectType`], backed by a constructor
/// function.
pub struct TypedFactory<T: ObjectType> {
    constructor: fn(&Context) -> T,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: ObjectType> TypedFactory<T> {
    /// Wraps `constructor` as the factory of `T`.
    pub fn new(constructor: fn(&Context) -> T) -> Self {
        Self {
            constructor,
            _phantom: PhantomData,
        }
    }
}

impl<T: ObjectType> ObjectFactory for TypedFactory<T> {
    fn produced_type(&self) -> TypeKey {
        T::type_static()
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn create(&self, context: &Context) -> ObjectRef {
        Rc::new((self.constructor)(context))
    }
}

//=== FactoryRegistry =====================================================

/// Type-keyed table of object factories.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: FxHashMap<TypeKey, Rc<dyn ObjectFactory>>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    //--- Registration -----------------------------------------------------

    /// Stores `factory` under its produced type if that type has none yet.
    ///
    /// Returns `false` (and keeps the existing factory) for a duplicate.
    pub fn register(&mut self, factory: Rc<dyn ObjectFactory>) -> bool {
        let key = factory.produced_type();

        if let Some(existing) = self.factories.get(&key) {
            warn!(
                "Factory for {} ({}) already registered as {}, keeping existing",
                factory.type_name(),
                key,
                existing.type_name()
            );
            return false;
        }

        debug!("Registered factory for {} ({})", factory.type_name(), key);
        self.factories.insert(key, factory);
        true
    }

    //--- Queries ----------------------------------------------------------

    /// Returns the factory for `key`, if any.
    ///
    /// Handed out as an owned handle so the caller can invoke it without
    /// keeping the registry borrowed.
    pub fn get(&self, key: TypeKey) -> Option<Rc<dyn ObjectFactory>> {
        self.factories.get(&key).cloned()
    }

    /// Whether `key` has a registered factory.
    pub fn contains(&self, key: TypeKey) -> bool {
        self.factories.contains_key(&key)
    }

    /// Name of the type produced under `key`, if a factory is registered.
    pub fn type_name(&self, key: TypeKey) -> Option<&'static str> {
        self.factories.get(&key).map(|f| f.type_name())
    }

    /// All registered type keys in ascending order.
    pub fn types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.factories.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Object, ObjectBase};

    struct Crate {
        base: ObjectBase,
    }

    impl ObjectType for Crate {
        const TYPE_NAME: &'static str = "Crate";
    }

    impl Object for Crate {
        fn base(&self) -> &ObjectBase {
            &self.base
        }
    }

    struct NamedFactory {
        name: &'static str,
    }

    impl ObjectFactory for NamedFactory {
        fn produced_type(&self) -> TypeKey {
            TypeKey::new("Crate")
        }

        fn type_name(&self) -> &'static str {
            self.name
        }

        fn create(&self, context: &Context) -> ObjectRef {
            Rc::new(Crate { base: ObjectBase::new::<Crate>(context) })
        }
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = FactoryRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(TypeKey::new("Crate")).is_none());
        assert!(registry.type_name(TypeKey::new("Crate")).is_none());
    }

    #[test]
    fn typed_factory_produces_its_type() {
        let context = Context::new();
        let factory = TypedFactory::<Crate>::new(|ctx| Crate { base: ObjectBase::new::<Crate>(ctx) });

        assert_eq!(factory.produced_type(), Crate::type_static());
        assert_eq!(factory.type_name(), "Crate");

        let a = factory.create(&context);
        let b = factory.create(&context);
        assert_eq!(a.type_key(), Crate::type_static());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = FactoryRegistry::new();

        assert!(registry.register(Rc::new(NamedFactory { name: "first" })));
        assert!(!registry.register(Rc::new(NamedFactory { name: "second" })));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.type_name(TypeKey::new("Crate")), Some("first"));
    }

    #[test]
    fn keys_are_case_insensitive_names() {
        let mut registry = FactoryRegistry::new();
        registry.register(Rc::new(NamedFactory { name: "Crate" }));
        registry.register(Rc::new(TypedFactory::<Crate>::new(|ctx| Crate {
            base: ObjectBase::new::<Crate>(ctx),
        })));

        let types = registry.types();
        assert_eq!(types, vec![TypeKey::new("Crate")]);
        assert!(registry.contains(TypeKey::new("crate")));
    }
}
