//=========================================================================
// Event Dispatcher
//=========================================================================
//
// Synchronous, reentrant publish/subscribe engine.
//
// Architecture:
//   global   : FxHashMap<TypeKey, ReceiverList>
//   specific : FxHashMap<ObjectId, FxHashMap<TypeKey, ReceiverList>>
//   senders  : Vec<Option<WeakObjectRef>>   (one entry per active send)
//   dirty_*  : keys of lists holding holes
//
// Broadcast:
//   begin_send(sender)
//     → walk specific list of (sender, type)
//     → walk global list of type (skipping receivers already reached)
//   end_send()
//     → stack empty? reconcile dirty lists
//
// While any send is active a removal only nulls slots. List shape only
// changes at stack depth zero, so every walk in progress (outer or
// nested) keeps valid indices. No RefCell borrow is held while a
// receiver runs.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};

//=== Internal Dependencies ===============================================

use super::receiver_list::{ReceiverList, ReceiverSlot, SlotState};
use crate::context::Context;
use crate::core::object::{ObjectId, ObjectRef, WeakObjectRef};
use crate::core::{TypeKey, VariantMap};

//=== EventDispatcher =====================================================

pub(crate) struct EventDispatcher {
    global: RefCell<FxHashMap<TypeKey, ReceiverList>>,
    specific: RefCell<FxHashMap<ObjectId, FxHashMap<TypeKey, ReceiverList>>>,
    senders: RefCell<Vec<Option<WeakObjectRef>>>,
    dirty_global: RefCell<FxHashSet<TypeKey>>,
    dirty_specific: RefCell<FxHashSet<(ObjectId, TypeKey)>>,
    receiver_capacity: usize,
}

impl EventDispatcher {
    pub fn new(receiver_capacity: usize) -> Self {
        Self {
            global: RefCell::new(FxHashMap::default()),
            specific: RefCell::new(FxHashMap::default()),
            senders: RefCell::new(Vec::new()),
            dirty_global: RefCell::new(FxHashSet::default()),
            dirty_specific: RefCell::new(FxHashSet::default()),
            receiver_capacity,
        }
    }

    //=====================================================================
    // Sender Stack
    //=====================================================================

    pub fn begin_send(&self, sender: Option<&ObjectRef>) {
        self.senders.borrow_mut().push(sender.map(Rc::downgrade));
    }

    /// Pops the sender stack. Reconciles dirty lists once it is empty.
    pub fn end_send(&self) {
        let now_idle = {
            let mut senders = self.senders.borrow_mut();
            if senders.pop().is_none() {
                warn!("end_send called without a matching begin_send");
                return;
            }
            senders.is_empty()
        };

        if now_idle {
            self.reconcile();
        }
    }

    /// Innermost active sender. `None` when idle, for a senderless send,
    /// or once the sender has been dropped.
    pub fn current_sender(&self) -> Option<ObjectRef> {
        self.senders
            .borrow()
            .last()
            .and_then(Option::as_ref)
            .and_then(|sender| sender.upgrade())
    }

    pub fn depth(&self) -> usize {
        self.senders.borrow().len()
    }

    fn is_sending(&self) -> bool {
        !self.senders.borrow().is_empty()
    }

    //=====================================================================
    // Subscription
    //=====================================================================

    /// Appends `receiver` to the global list of `event_type`.
    ///
    /// Duplicates are kept: each subscription gets its own delivery.
    pub fn add_receiver(&self, receiver: &ObjectRef, event_type: TypeKey) {
        self.global
            .borrow_mut()
            .entry(event_type)
            .or_insert_with(|| ReceiverList::with_capacity(self.receiver_capacity))
            .push(ReceiverSlot::new(receiver));

        receiver.base().record_subscription(None, event_type);
    }

    /// Appends `receiver` to the list of `(sender, event_type)`.
    pub fn add_specific_receiver(&self, receiver: &ObjectRef, sender: ObjectId, event_type: TypeKey) {
        self.specific
            .borrow_mut()
            .entry(sender)
            .or_default()
            .entry(event_type)
            .or_insert_with(|| ReceiverList::with_capacity(self.receiver_capacity))
            .push(ReceiverSlot::new(receiver));

        receiver.base().record_subscription(Some(sender), event_type);
    }

    /// Removes every slot of `receiver` from the global list of
    /// `event_type`. No-op if it is not subscribed.
    pub fn remove_receiver(&self, receiver: ObjectId, event_type: TypeKey) {
        let sending = self.is_sending();

        let removed = {
            let mut global = self.global.borrow_mut();
            let Some(list) = global.get_mut(&event_type) else {
                return;
            };

            if sending {
                let removed = list.null_matching(receiver);
                if removed.is_some() {
                    self.dirty_global.borrow_mut().insert(event_type);
                }
                removed
            } else {
                let removed = list.erase_matching(receiver);
                if list.is_empty() {
                    global.remove(&event_type);
                }
                removed
            }
        };

        if let Some(object) = removed.and_then(|handle| handle.upgrade()) {
            object.base().forget_subscription(None, event_type);
        }
    }

    /// Removes every slot of `receiver` from the list of
    /// `(sender, event_type)`. No-op if it is not subscribed.
    pub fn remove_specific_receiver(&self, receiver: ObjectId, sender: ObjectId, event_type: TypeKey) {
        let sending = self.is_sending();

        let removed = {
            let mut specific = self.specific.borrow_mut();
            let Some(buckets) = specific.get_mut(&sender) else {
                return;
            };
            let Some(list) = buckets.get_mut(&event_type) else {
                return;
            };

            if sending {
                let removed = list.null_matching(receiver);
                if removed.is_some() {
                    self.dirty_specific.borrow_mut().insert((sender, event_type));
                }
                removed
            } else {
                let removed = list.erase_matching(receiver);
                if list.is_empty() {
                    buckets.remove(&event_type);
                    if buckets.is_empty() {
                        specific.remove(&sender);
                    }
                }
                removed
            }
        };

        if let Some(object) = removed.and_then(|handle| handle.upgrade()) {
            object.base().forget_subscription(Some(sender), event_type);
        }
    }

    /// Drops every specific bucket keyed by `sender`.
    ///
    /// Unconditional, even mid-broadcast: a walk over one of these buckets
    /// finds it gone and stops.
    pub fn remove_sender(&self, sender: ObjectId) {
        let removed = self.specific.borrow_mut().remove(&sender);
        self.dirty_specific
            .borrow_mut()
            .retain(|(dirty_sender, _)| *dirty_sender != sender);

        let Some(buckets) = removed else {
            return;
        };

        debug!("Removed {} event bucket(s) of sender {}", buckets.len(), sender);

        for list in buckets.values() {
            for handle in list.handles() {
                if let Some(object) = handle.upgrade() {
                    object.base().forget_sender(sender);
                }
            }
        }
    }

    //=====================================================================
    // Delivery
    //=====================================================================

    /// Broadcasts `event_type` on behalf of `sender`.
    ///
    /// Receivers added during the broadcast are first reached by the next
    /// one. A receiver subscribed both to this sender and globally gets
    /// the event once, through the specific list.
    pub fn send(
        &self,
        context: &Context,
        sender: Option<&ObjectRef>,
        event_type: TypeKey,
        data: &mut VariantMap,
    ) {
        let sender_id = sender.map(|s| s.id());
        let _scope = SendScope::begin(self, sender);
        let mut processed: FxHashSet<ObjectId> = FxHashSet::default();

        //--- Specific receivers ------------------------------------------
        if let Some(sender_id) = sender_id {
            let count = self.specific_len(sender_id, event_type);

            for index in 0..count {
                match self.specific_slot(sender_id, event_type, index) {
                    SlotState::Live(receiver) => {
                        trace!("Delivering {} from {} to {}", event_type, sender_id, receiver.id());
                        receiver.on_event(context, Some(sender_id), event_type, data);
                        processed.insert(receiver.id());
                    }
                    SlotState::Vacant => {}
                    SlotState::End => break,
                }
            }
        }

        //--- Global receivers --------------------------------------------
        let count = self.global_len(event_type);

        for index in 0..count {
            match self.global_slot(event_type, index) {
                SlotState::Live(receiver) => {
                    if processed.contains(&receiver.id()) {
                        continue;
                    }
                    trace!("Delivering {} to {}", event_type, receiver.id());
                    receiver.on_event(context, sender_id, event_type, data);
                }
                SlotState::Vacant => {}
                SlotState::End => break,
            }
        }
    }

    //--- Walk helpers -----------------------------------------------------
    //
    // Each lookup borrows the tables only for the duration of the lookup.
    //

    fn global_len(&self, event_type: TypeKey) -> usize {
        self.global
            .borrow()
            .get(&event_type)
            .map_or(0, ReceiverList::len)
    }

    fn specific_len(&self, sender: ObjectId, event_type: TypeKey) -> usize {
        self.specific
            .borrow()
            .get(&sender)
            .and_then(|buckets| buckets.get(&event_type))
            .map_or(0, ReceiverList::len)
    }

    fn global_slot(&self, event_type: TypeKey, index: usize) -> SlotState {
        self.global
            .borrow()
            .get(&event_type)
            .map_or(SlotState::End, |list| list.slot(index))
    }

    fn specific_slot(&self, sender: ObjectId, event_type: TypeKey, index: usize) -> SlotState {
        self.specific
            .borrow()
            .get(&sender)
            .and_then(|buckets| buckets.get(&event_type))
            .map_or(SlotState::End, |list| list.slot(index))
    }

    //=====================================================================
    // Reconciliation
    //=====================================================================

    /// Compacts every dirty list. Only called at stack depth zero.
    fn reconcile(&self) {
        let dirty_specific = std::mem::take(&mut *self.dirty_specific.borrow_mut());
        let dirty_global = std::mem::take(&mut *self.dirty_global.borrow_mut());

        if dirty_specific.is_empty() && dirty_global.is_empty() {
            return;
        }

        let mut erased = 0;

        {
            let mut specific = self.specific.borrow_mut();
            for (sender, event_type) in dirty_specific {
                let Some(buckets) = specific.get_mut(&sender) else {
                    continue;
                };
                if let Some(list) = buckets.get_mut(&event_type) {
                    erased += list.compact();
                    if list.is_empty() {
                        buckets.remove(&event_type);
                    }
                }
                if buckets.is_empty() {
                    specific.remove(&sender);
                }
            }
        }

        {
            let mut global = self.global.borrow_mut();
            for event_type in dirty_global {
                if let Some(list) = global.get_mut(&event_type) {
                    erased += list.compact();
                    if list.is_empty() {
                        global.remove(&event_type);
                    }
                }
            }
        }

        debug!("Reconciled receiver lists, erased {} stale slot(s)", erased);
    }

    //=====================================================================
    // Introspection
    //=====================================================================

    pub fn receivers(&self, event_type: TypeKey) -> Option<Vec<Option<ObjectId>>> {
        self.global.borrow().get(&event_type).map(ReceiverList::ids)
    }

    pub fn specific_receivers(&self, sender: ObjectId, event_type: TypeKey) -> Option<Vec<Option<ObjectId>>> {
        self.specific
            .borrow()
            .get(&sender)
            .and_then(|buckets| buckets.get(&event_type))
            .map(ReceiverList::ids)
    }
}

//=== SendScope ===========================================================

/// Keeps one sender stack entry for its lifetime.
///
/// Pops (and reconciles at depth zero) even if a receiver unwinds.
struct SendScope<'a> {
    dispatcher: &'a EventDispatcher,
}

impl<'a> SendScope<'a> {
    fn begin(dispatcher: &'a EventDispatcher, sender: Option<&ObjectRef>) -> Self {
        dispatcher.begin_send(sender);
        Self { dispatcher }
    }
}

impl Drop for SendScope<'_> {
    fn drop(&mut self) {
        self.dispatcher.end_send();
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
