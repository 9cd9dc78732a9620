//=========================================================================
// Event System
//=========================================================================
//
// In-process publish/subscribe with global (event type) and specific
// (sender + event type) subscriptions.
//
// Architecture:
//   Context ──send_event()──> EventDispatcher
//                                ├─ specific lists (sender, type)
//                                └─ global lists (type)
//                                       ↓
//                              Object::on_event(..)
//
// Delivery is synchronous and stack-based; receivers may subscribe,
// unsubscribe and send again while being notified.
//
//=========================================================================

//=== Module Declarations =================================================

pub mod core_events;
mod dispatcher;
mod receiver_list;

//=== Crate API ===========================================================

pub(crate) use dispatcher::EventDispatcher;
