//=========================================================================
// Receiver List
//=========================================================================
//
// Ordered subscription list for one event type (global) or one
// (sender, event type) pair (specific).
//
// Slots:
//   Some(ReceiverSlot) → subscribed receiver (weak handle + id)
//   None               → hole left by a removal during a broadcast
//
// Holes keep indices stable for any walk in progress. They are erased by
// compact(), which only runs when no broadcast is active.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::rc::Rc;

//=== Internal Dependencies ===============================================

use crate::core::object::{ObjectId, ObjectRef, WeakObjectRef};

//=== ReceiverSlot ========================================================

#[derive(Clone)]
pub(crate) struct ReceiverSlot {
    pub id: ObjectId,
    pub handle: WeakObjectRef,
}

impl ReceiverSlot {
    pub fn new(receiver: &ObjectRef) -> Self {
        Self {
            id: receiver.id(),
            handle: Rc::downgrade(receiver),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

//=== SlotState ===========================================================

/// What a walk finds at one index.
pub(crate) enum SlotState {
    /// A live receiver, upgraded for the duration of one delivery.
    Live(ObjectRef),
    /// A hole or an expired receiver.
    Vacant,
    /// Past the end of the list (or the list no longer exists).
    End,
}

//=== ReceiverList ========================================================

pub(crate) struct ReceiverList {
    slots: Vec<Option<ReceiverSlot>>,
}

impl ReceiverList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, slot: ReceiverSlot) {
        self.slots.push(Some(slot));
    }

    /// Slot count, holes included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> SlotState {
        match self.slots.get(index) {
            None => SlotState::End,
            Some(None) => SlotState::Vacant,
            Some(Some(slot)) => match slot.handle.upgrade() {
                Some(receiver) => SlotState::Live(receiver),
                None => SlotState::Vacant,
            },
        }
    }

    //--- Removal ----------------------------------------------------------

    /// Replaces every slot of `receiver` with a hole. Shape is unchanged.
    ///
    /// Returns the handle of the removed receiver if any slot matched.
    pub fn null_matching(&mut self, receiver: ObjectId) -> Option<WeakObjectRef> {
        let mut removed = None;

        for entry in self.slots.iter_mut() {
            if entry.as_ref().is_some_and(|slot| slot.id == receiver) {
                removed = entry.take().map(|slot| slot.handle);
            }
        }

        removed
    }

    /// Physically erases every slot of `receiver`.
    pub fn erase_matching(&mut self, receiver: ObjectId) -> Option<WeakObjectRef> {
        let mut removed = None;

        self.slots.retain(|entry| match entry {
            Some(slot) if slot.id == receiver => {
                removed = Some(slot.handle.clone());
                false
            }
            _ => true,
        });

        removed
    }

    /// Erases holes and expired receivers. Returns the number erased.
    pub fn compact(&mut self) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|entry| entry.as_ref().is_some_and(ReceiverSlot::is_alive));
        before - self.slots.len()
    }

    //--- Snapshots --------------------------------------------------------

    /// Receiver ids in delivery order; holes read as `None`.
    pub fn ids(&self) -> Vec<Option<ObjectId>> {
        self.slots
            .iter()
            .map(|entry| entry.as_ref().map(|slot| slot.id))
            .collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = &WeakObjectRef> + '_ {
        self.slots.iter().flatten().map(|slot| &slot.handle)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
