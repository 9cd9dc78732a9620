//=========================================================================
// Core Object Model
//
// Building blocks owned and composed by the `Context`.
//
// Responsibilities:
// - Identify types, events and parameters by hashed keys (`TypeKey`)
// - Define the object base capability (`Object`, `ObjectBase`)
// - Keep type-keyed registries for factories, subsystems and attributes
// - Route events between objects (`event`)
// - Provide the built-in Time and Profiler subsystems
//
// Notes:
// The registries are plain single-owner tables. Interior mutability and
// reentrancy handling live one level up, in `Context` and the event
// dispatcher.
//
//=========================================================================

//=== Module Declarations =================================================

pub mod attribute;
pub mod event;
pub mod factory;
pub mod object;
pub mod profiler;
pub mod subsystem;
pub mod time;
pub mod type_key;
pub mod variant;

//=== Public API ==========================================================

pub use attribute::{AttributeInfo, AttributeMode, AttributeRegistry};
pub use factory::{FactoryRegistry, ObjectFactory, TypedFactory};
pub use object::{downcast_object, Object, ObjectBase, ObjectId, ObjectRef, ObjectType, WeakObjectRef};
pub use profiler::{BlockStats, ProfileScope, Profiler};
pub use subsystem::SubsystemRegistry;
pub use time::Time;
pub use type_key::TypeKey;
pub use variant::{Variant, VariantMap, VariantType};
