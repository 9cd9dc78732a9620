//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_runtime::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Context
pub use crate::context::{Context, ContextBuilder};

// Object model
pub use crate::core::{downcast_object, Object, ObjectBase, ObjectId, ObjectRef, ObjectType, WeakObjectRef};
pub use crate::core::{TypeKey, Variant, VariantMap, VariantType};

// Registries
pub use crate::core::{AttributeInfo, AttributeMode, ObjectFactory, TypedFactory};

// Events and built-in subsystems
pub use crate::core::event::core_events::*;
pub use crate::core::{BlockStats, Profiler, Time};

// Package files
pub use crate::io::{PackageEntry, PackageError, PackageFile};
