//=========================================================================
// Aetheric Runtime Library Root
//
// This crate defines the public API surface of the Aetheric object-model
// runtime.
//
// Responsibilities:
// - Expose the execution context (`Context`, `ContextBuilder`)
// - Expose the object model building blocks (`core`)
// - Provide readers for runtime file formats (`io`)
//
// Typical usage:
// ```no_run
// use aetheric_runtime::prelude::*;
//
// let context = Context::new();
// if let Some(time) = context.subsystem::<Time>() {
//     time.begin_frame(1.0 / 60.0);
//     time.end_frame();
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the object model: type keys, objects, registries, event
// routing and the built-in subsystems.
//
// `io` holds file format readers.
//
pub mod core;
pub mod io;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `context` composes the registries and the event dispatcher. Only its
// types are public, re-exported below.
//
mod context;

//--- Public Exports ------------------------------------------------------

pub use context::{Context, ContextBuilder};
