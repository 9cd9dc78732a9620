//=========================================================================
// Object
//=========================================================================
//
// Base capability shared by everything the runtime creates, indexes or
// routes events to.
//
// Architecture:
//   ObjectRef  = Rc<dyn Object>     (owning handle)
//   WeakObjectRef = Weak<dyn Object> (subscription lists)
//
//   struct MyType { base: ObjectBase, .. }
//     ├─ impl ObjectType  (static name → TypeKey)
//     └─ impl Object      (base() + optional on_event())
//
// Lifetime contract: dropping an object unsubscribes it from everything
// it subscribed to and purges the specific buckets keyed by it as sender.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::trace;

//=== Internal Dependencies ===============================================

use super::{TypeKey, VariantMap};
use crate::context::Context;

//=== ObjectId ============================================================

/// Identity of one object within its [`Context`].
///
/// Allocated sequentially and never reused by the same context, so a stale
/// id can never alias a newer object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        ObjectId(raw)
    }

    /// Raw sequential value of the id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//=== Handles =============================================================

/// Owning handle to any object.
pub type ObjectRef = Rc<dyn Object>;

/// Non-owning handle to any object. Reads as gone once the object drops.
pub type WeakObjectRef = Weak<dyn Object>;

//=== Object Trait ========================================================

/// Shared base capability of runtime objects.
///
/// Only [`Object::base`] is required. Events arrive through
/// [`Object::on_event`]; the default implementation ignores them.
///
/// ```rust
/// use aetheric_runtime::prelude::*;
///
/// struct Door {
///     base: ObjectBase,
/// }
///
/// impl ObjectType for Door {
///     const TYPE_NAME: &'static str = "Door";
/// }
///
/// impl Object for Door {
///     fn base(&self) -> &ObjectBase {
///         &self.base
///     }
/// }
///
/// let context = Context::new();
/// let door = Door { base: ObjectBase::new::<Door>(&context) };
/// assert_eq!(door.type_key(), Door::type_static());
/// ```
pub trait Object: Any {
    /// Returns the per-instance runtime state.
    fn base(&self) -> &ObjectBase;

    /// Handles a delivered event.
    ///
    /// Runs synchronously inside a broadcast. The handler may subscribe,
    /// unsubscribe (itself or others) and send further events.
    fn on_event(
        &self,
        _context: &Context,
        _sender: Option<ObjectId>,
        _event_type: TypeKey,
        _data: &mut VariantMap,
    ) {
    }

    /// Identity of this object within its context.
    fn id(&self) -> ObjectId {
        self.base().id()
    }

    /// Dynamic type key, fixed when the base was built.
    fn type_key(&self) -> TypeKey {
        self.base().type_key()
    }

    /// Name of the dynamic type.
    fn type_name(&self) -> &'static str {
        self.base().type_name()
    }
}

//=== ObjectType Trait ====================================================

/// Static type identity of a concrete object type.
///
/// Used by the generic convenience wrappers (`register_factory_for`,
/// `subsystem::<T>()`, `register_attribute_for`, ...).
pub trait ObjectType: Object + Sized {
    const TYPE_NAME: &'static str;

    fn type_static() -> TypeKey {
        TypeKey::new(Self::TYPE_NAME)
    }
}

/// Recovers the concrete type behind an [`ObjectRef`].
///
/// Returns `None` when the object is of another type.
pub fn downcast_object<T: ObjectType>(object: ObjectRef) -> Option<Rc<T>> {
    let any: Rc<dyn Any> = object;
    any.downcast::<T>().ok()
}

//=== Subscription ========================================================

/// One receiver subscription recorded on the receiver's base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Subscription {
    pub sender: Option<ObjectId>,
    pub event_type: TypeKey,
}

//=== ObjectBase ==========================================================

/// Per-instance state every object embeds.
///
/// Holds the identity, the dynamic type and a weak handle back to the
/// owning [`Context`]. Never keeps the context alive.
pub struct ObjectBase {
    id: ObjectId,
    type_key: TypeKey,
    type_name: &'static str,
    context: Weak<Context>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl ObjectBase {
    //--- Construction -----------------------------------------------------

    /// Creates the base for an instance of `T`.
    pub fn new<T: ObjectType>(context: &Context) -> Self {
        Self::with_type(context, T::type_static(), T::TYPE_NAME)
    }

    /// Creates a base with an explicit dynamic type.
    ///
    /// For types without a static [`ObjectType`] impl. Typed lookups
    /// (`subsystem::<T>()`) will not find such objects.
    pub fn with_type(context: &Context, type_key: TypeKey, type_name: &'static str) -> Self {
        Self {
            id: context.next_object_id(),
            type_key,
            type_name,
            context: context.downgrade(),
            subscriptions: RefCell::new(Vec::new()),
        }
    }

    //--- Accessors --------------------------------------------------------

    /// Identity of the owning object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Dynamic type key of the owning object.
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Dynamic type name of the owning object.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the owning context, or `None` once it has been dropped.
    pub fn context(&self) -> Option<Rc<Context>> {
        self.context.upgrade()
    }

    /// Number of receiver subscriptions this object currently holds.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    //--- Subscription Bookkeeping -----------------------------------------

    pub(crate) fn record_subscription(&self, sender: Option<ObjectId>, event_type: TypeKey) {
        self.subscriptions
            .borrow_mut()
            .push(Subscription { sender, event_type });
    }

    pub(crate) fn forget_subscription(&self, sender: Option<ObjectId>, event_type: TypeKey) {
        let wanted = Subscription { sender, event_type };
        self.subscriptions.borrow_mut().retain(|s| *s != wanted);
    }

    pub(crate) fn forget_sender(&self, sender: ObjectId) {
        self.subscriptions
            .borrow_mut()
            .retain(|s| s.sender != Some(sender));
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("type_key", &self.type_key)
            .finish()
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        // Context already torn down: nothing left to clean.
        let Some(context) = self.context.upgrade() else {
            return;
        };

        let subscriptions = std::mem::take(self.subscriptions.get_mut());
        trace!(
            "Dropping {} {}: releasing {} subscription(s)",
            self.type_name,
            self.id,
            subscriptions.len()
        );

        for subscription in subscriptions {
            match subscription.sender {
                Some(sender) => context.remove_specific_event_receiver(
                    self.id,
                    sender,
                    subscription.event_type,
                ),
                None => context.remove_event_receiver(self.id, subscription.event_type),
            }
        }

        context.remove_event_sender(self.id);
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Lamp {
        base: ObjectBase,
    }

    impl ObjectType for Lamp {
        const TYPE_NAME: &'static str = "Lamp";
    }

    impl Object for Lamp {
        fn base(&self) -> &ObjectBase {
            &self.base
        }
    }

    struct Switch {
        base: ObjectBase,
    }

    impl ObjectType for Switch {
        const TYPE_NAME: &'static str = "Switch";
    }

    impl Object for Switch {
        fn base(&self) -> &ObjectBase {
            &self.base
        }
    }

    #[test]
    fn base_carries_static_type() {
        let context = Context::new();
        let lamp = Lamp { base: ObjectBase::new::<Lamp>(&context) };

        assert_eq!(lamp.type_key(), TypeKey::new("Lamp"));
        assert_eq!(lamp.type_name(), "Lamp");
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let context = Context::new();
        let a = Lamp { base: ObjectBase::new::<Lamp>(&context) };
        let b = Lamp { base: ObjectBase::new::<Lamp>(&context) };

        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn with_type_sets_dynamic_identity() {
        let context = Context::new();
        let base = ObjectBase::with_type(&context, TypeKey::new("Scripted"), "Scripted");

        assert_eq!(base.type_key(), TypeKey::new("Scripted"));
        assert_eq!(base.type_name(), "Scripted");
    }

    #[test]
    fn base_does_not_keep_context_alive() {
        let context = Context::new();
        let lamp = Lamp { base: ObjectBase::new::<Lamp>(&context) };
        assert!(lamp.base().context().is_some());

        drop(context);
        assert!(lamp.base().context().is_none());
    }

    #[test]
    fn downcast_recovers_concrete_type() {
        let context = Context::new();
        let lamp: ObjectRef = Rc::new(Lamp { base: ObjectBase::new::<Lamp>(&context) });

        assert!(downcast_object::<Switch>(lamp.clone()).is_none());
        let concrete = downcast_object::<Lamp>(lamp).expect("lamp downcast");
        assert_eq!(concrete.type_name(), "Lamp");
    }

    #[test]
    fn subscription_bookkeeping() {
        let context = Context::new();
        let lamp = Lamp { base: ObjectBase::new::<Lamp>(&context) };
        let sender = ObjectId::from_raw(99);
        let event = TypeKey::new("Toggle");

        lamp.base().record_subscription(None, event);
        lamp.base().record_subscription(Some(sender), event);
        lamp.base().record_subscription(Some(sender), TypeKey::new("Other"));
        lamp.base().record_subscription(None, event);
        assert_eq!(lamp.base().subscription_count(), 4);

        // Both global records of the event go at once.
        lamp.base().forget_subscription(None, event);
        assert_eq!(lamp.base().subscription_count(), 2);

        lamp.base().forget_sender(sender);
        assert_eq!(lamp.base().subscription_count(), 0);
    }
}
