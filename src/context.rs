//=========================================================================
// Context
//
// Process-wide access point of the object model runtime.
//
// Architecture:
// ```text
//     ContextBuilder ──build()──> Rc<Context>
//                                   ├─ FactoryRegistry    (type → factory)
//                                   ├─ SubsystemRegistry  (type → singleton)
//                                   ├─ AttributeRegistry  (type → [AttributeInfo])
//                                   └─ EventDispatcher    (subscriptions, sender stack)
// ```
//
// All methods take `&self`: receivers reach back into the context while
// an event is being delivered. Borrows of the inner tables never span a
// call into user code (factories, receivers, drops).
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, info};

//=== Internal Dependencies ===============================================

use crate::core::event::core_events::{E_BEGINFRAME, E_ENDFRAME};
use crate::core::event::EventDispatcher;
use crate::core::{
    downcast_object, AttributeInfo, AttributeRegistry, FactoryRegistry, Object, ObjectFactory, ObjectId,
    ObjectRef, ObjectType, Profiler, SubsystemRegistry, Time, TypeKey, TypedFactory, VariantMap,
};

//=== ContextBuilder ======================================================

/// Builder for configuring and constructing a [`Context`].
///
/// # Default Values
///
/// - **Time subsystem**: registered
/// - **Profiler subsystem**: registered, driven by Time's frame events
/// - **Receiver capacity**: 4 slots per new receiver list
///
/// # Examples
///
/// ```rust
/// use aetheric_runtime::ContextBuilder;
///
/// let context = ContextBuilder::new()
///     .with_time_subsystem(false)
///     .with_profiler(false)
///     .with_receiver_capacity(16)
///     .build();
///
/// assert!(context.subsystem_types().is_empty());
/// ```
pub struct ContextBuilder {
    time_subsystem: bool,
    profiler: bool,
    receiver_capacity: usize,
}

impl ContextBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            time_subsystem: true,
            profiler: true,
            receiver_capacity: 4,
        }
    }

    /// Sets whether the [`Time`] subsystem is created and registered.
    ///
    /// Default: true
    pub fn with_time_subsystem(mut self, enabled: bool) -> Self {
        self.time_subsystem = enabled;
        self
    }

    /// Sets whether the [`Profiler`] subsystem is created and registered.
    ///
    /// Default: true
    pub fn with_profiler(mut self, enabled: bool) -> Self {
        self.profiler = enabled;
        self
    }

    /// Sets the initial capacity of each newly created receiver list.
    ///
    /// Default: 4
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_receiver_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Receiver capacity must be positive");
        self.receiver_capacity = capacity;
        self
    }

    /// Builds the context.
    pub fn build(self) -> Rc<Context> {
        info!(
            "Building context (time subsystem: {}, profiler: {}, receiver capacity: {})",
            self.time_subsystem, self.profiler, self.receiver_capacity
        );

        let context = Rc::new_cyclic(|self_ref| Context {
            self_ref: self_ref.clone(),
            next_object_id: Cell::new(1),
            factories: RefCell::new(FactoryRegistry::new()),
            subsystems: RefCell::new(SubsystemRegistry::new()),
            attributes: RefCell::new(AttributeRegistry::new()),
            events: EventDispatcher::new(self.receiver_capacity),
        });

        let time = self.time_subsystem.then(|| Rc::new(Time::new(&context)));
        if let Some(time) = &time {
            context.register_subsystem(time.clone());
        }

        if self.profiler {
            let profiler: ObjectRef = Rc::new(Profiler::new(&context));
            if let Some(time) = &time {
                context.add_specific_event_receiver(&profiler, time.id(), E_BEGINFRAME);
                context.add_specific_event_receiver(&profiler, time.id(), E_ENDFRAME);
            }
            context.register_subsystem(profiler);
        }

        context
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== Context =============================================================

/// Execution context: object factories, subsystems, attribute metadata and
/// event routing.
///
/// Absence is never an error here. Unknown types, subsystems, attributes
/// and receivers all read as `None` or make the call a no-op.
///
/// # Examples
///
/// ```rust
/// use aetheric_runtime::prelude::*;
///
/// struct Beacon {
///     base: ObjectBase,
/// }
///
/// impl ObjectType for Beacon {
///     const TYPE_NAME: &'static str = "Beacon";
/// }
///
/// impl Object for Beacon {
///     fn base(&self) -> &ObjectBase {
///         &self.base
///     }
/// }
///
/// let context = Context::new();
/// context.register_factory_for::<Beacon>(|ctx| Beacon { base: ObjectBase::new::<Beacon>(ctx) });
///
/// let beacon = context.create::<Beacon>().expect("factory registered");
/// assert_eq!(beacon.type_name(), "Beacon");
/// assert!(context.create_object(TypeKey::new("Unknown")).is_none());
/// ```
pub struct Context {
    self_ref: Weak<Context>,
    next_object_id: Cell<u64>,
    factories: RefCell<FactoryRegistry>,
    subsystems: RefCell<SubsystemRegistry>,
    attributes: RefCell<AttributeRegistry>,
    events: EventDispatcher,
}

impl Context {
    /// Creates a context with default settings.
    pub fn new() -> Rc<Context> {
        ContextBuilder::new().build()
    }

    pub(crate) fn downgrade(&self) -> Weak<Context> {
        self.self_ref.clone()
    }

    pub(crate) fn next_object_id(&self) -> ObjectId {
        let raw = self.next_object_id.get();
        self.next_object_id.set(raw + 1);
        ObjectId::from_raw(raw)
    }

    //=====================================================================
    // Object Factories
    //=====================================================================

    /// Registers a factory under its produced type. Ignored if that type
    /// already has one.
    pub fn register_factory(&self, factory: Rc<dyn ObjectFactory>) {
        self.factories.borrow_mut().register(factory);
    }

    /// Registers a [`TypedFactory`] for `T` built from `constructor`.
    pub fn register_factory_for<T: ObjectType>(&self, constructor: fn(&Context) -> T) {
        self.register_factory(Rc::new(TypedFactory::<T>::new(constructor)));
    }

    /// Creates an object by type key, or `None` if no factory is registered.
    pub fn create_object(&self, type_key: TypeKey) -> Option<ObjectRef> {
        let factory = self.factories.borrow().get(type_key)?;
        Some(factory.create(self))
    }

    /// Creates an object of type `T`.
    pub fn create<T: ObjectType>(&self) -> Option<Rc<T>> {
        self.create_object(T::type_static())
            .and_then(downcast_object::<T>)
    }

    /// Name of a type with a registered factory.
    pub fn type_name(&self, type_key: TypeKey) -> Option<&'static str> {
        self.factories.borrow().type_name(type_key)
    }

    /// Types that have a registered factory, sorted.
    pub fn factory_types(&self) -> Vec<TypeKey> {
        self.factories.borrow().types()
    }

    //=====================================================================
    // Subsystems
    //=====================================================================

    /// Registers `instance` as the subsystem of its dynamic type. Ignored
    /// if that type already has one.
    pub fn register_subsystem(&self, instance: ObjectRef) {
        let rejected = self.subsystems.borrow_mut().register(instance).err();

        // Dropped here, outside the registry borrow.
        drop(rejected);
    }

    /// Subsystem registered under `type_key`.
    pub fn subsystem_by_key(&self, type_key: TypeKey) -> Option<ObjectRef> {
        self.subsystems.borrow().get(type_key)
    }

    /// Subsystem of type `T`.
    ///
    /// ```rust
    /// use aetheric_runtime::prelude::*;
    ///
    /// let context = Context::new();
    /// let time = context.subsystem::<Time>().expect("created by default");
    /// assert_eq!(time.frame_number(), 0);
    /// ```
    pub fn subsystem<T: ObjectType>(&self) -> Option<Rc<T>> {
        self.subsystem_by_key(T::type_static())
            .and_then(downcast_object::<T>)
    }

    /// Types that have a registered subsystem, sorted.
    pub fn subsystem_types(&self) -> Vec<TypeKey> {
        self.subsystems.borrow().types()
    }

    //=====================================================================
    // Attributes
    //=====================================================================

    /// Appends `attr` to the attribute list of `type_key`.
    pub fn register_attribute(&self, type_key: TypeKey, attr: AttributeInfo) {
        self.attributes.borrow_mut().register(type_key, attr);
    }

    /// Removes the first attribute of `type_key` named `name`. No-op if absent.
    pub fn remove_attribute(&self, type_key: TypeKey, name: &str) {
        self.attributes.borrow_mut().remove(type_key, name);
    }

    /// Appends a snapshot of `base`'s attributes to `derived`.
    pub fn copy_base_attributes(&self, base: TypeKey, derived: TypeKey) {
        self.attributes.borrow_mut().copy_base(base, derived);
    }

    /// Attribute list of a type, or `None` if it has no reflection data.
    ///
    /// The returned guard borrows the attribute table. Drop it before
    /// registering or removing attributes.
    pub fn attributes(&self, type_key: TypeKey) -> Option<Ref<'_, [AttributeInfo]>> {
        Ref::filter_map(self.attributes.borrow(), |registry| registry.get(type_key)).ok()
    }

    /// Types that have attribute data, sorted.
    pub fn attribute_types(&self) -> Vec<TypeKey> {
        self.attributes.borrow().types()
    }

    //--- Typed convenience ------------------------------------------------

    /// Appends `attr` to the attribute list of `T`.
    pub fn register_attribute_for<T: ObjectType>(&self, attr: AttributeInfo) {
        self.register_attribute(T::type_static(), attr);
    }

    /// Removes the attribute of `T` named `name`.
    pub fn remove_attribute_for<T: ObjectType>(&self, name: &str) {
        self.remove_attribute(T::type_static(), name);
    }

    /// Appends a snapshot of `Base`'s attributes to `Derived`.
    pub fn copy_base_attributes_for<Base: ObjectType, Derived: ObjectType>(&self) {
        self.copy_base_attributes(Base::type_static(), Derived::type_static());
    }

    /// Attribute list of `T`.
    pub fn attributes_for<T: ObjectType>(&self) -> Option<Ref<'_, [AttributeInfo]>> {
        self.attributes(T::type_static())
    }

    //=====================================================================
    // Events
    //=====================================================================

    /// Subscribes `receiver` to every send of `event_type`.
    ///
    /// Subscribing twice delivers twice. The context keeps only a weak
    /// handle to the receiver.
    pub fn add_event_receiver(&self, receiver: &ObjectRef, event_type: TypeKey) {
        self.events.add_receiver(receiver, event_type);
    }

    /// Subscribes `receiver` to sends of `event_type` by `sender` only.
    pub fn add_specific_event_receiver(&self, receiver: &ObjectRef, sender: ObjectId, event_type: TypeKey) {
        self.events.add_specific_receiver(receiver, sender, event_type);
    }

    /// Unsubscribes `receiver` from `event_type` (global subscriptions).
    pub fn remove_event_receiver(&self, receiver: ObjectId, event_type: TypeKey) {
        self.events.remove_receiver(receiver, event_type);
    }

    /// Unsubscribes `receiver` from `event_type` sent by `sender`.
    pub fn remove_specific_event_receiver(&self, receiver: ObjectId, sender: ObjectId, event_type: TypeKey) {
        self.events.remove_specific_receiver(receiver, sender, event_type);
    }

    /// Drops every specific subscription keyed by `sender`.
    ///
    /// Runs automatically when an object's base is dropped.
    pub fn remove_event_sender(&self, sender: ObjectId) {
        debug!("Removing event sender {}", sender);
        self.events.remove_sender(sender);
    }

    /// Pushes `sender` onto the sender stack. `None` marks a senderless
    /// send. Must be paired with [`Context::end_send_event`].
    pub fn begin_send_event(&self, sender: Option<&ObjectRef>) {
        self.events.begin_send(sender);
    }

    /// Pops the sender stack; at depth zero, compacts lists that had
    /// receivers removed meanwhile.
    pub fn end_send_event(&self) {
        self.events.end_send();
    }

    /// Innermost active sender, or `None` outside event handling.
    pub fn current_sender(&self) -> Option<ObjectRef> {
        self.events.current_sender()
    }

    /// Number of sends currently in progress.
    pub fn send_depth(&self) -> usize {
        self.events.depth()
    }

    /// Delivers `event_type` with `data` to the subscribed receivers.
    ///
    /// Specific receivers of `sender` go first, then global receivers.
    pub fn send_event(&self, sender: Option<&ObjectRef>, event_type: TypeKey, data: &mut VariantMap) {
        self.events.send(self, sender, event_type, data);
    }

    /// Snapshot of the global receivers of `event_type`, holes included.
    pub fn event_receivers(&self, event_type: TypeKey) -> Option<Vec<Option<ObjectId>>> {
        self.events.receivers(event_type)
    }

    /// Snapshot of the receivers of `event_type` sent by `sender`.
    pub fn specific_event_receivers(&self, sender: ObjectId, event_type: TypeKey) -> Option<Vec<Option<ObjectId>>> {
        self.events.specific_receivers(sender, event_type)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let mut subsystems = self.subsystems.get_mut().take_all();
        if subsystems.is_empty() {
            return;
        }

        // Newest first.
        subsystems.sort_by_key(|s| std::cmp::Reverse(s.id()));
        info!("Shutting down context: releasing {} subsystem(s)", subsystems.len());
        for subsystem in subsystems {
            debug!("Releasing subsystem {} {}", subsystem.type_name(), subsystem.id());
            drop(subsystem);
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
