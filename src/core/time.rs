//=========================================================================
// Time Subsystem
//=========================================================================
//
// Frame counter and timestep source. Announces frame boundaries as
// events sent from itself.
//
// Frame lifecycle:
//   begin_frame(dt) → E_BEGINFRAME, E_UPDATE
//   end_frame()     → E_ENDFRAME
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::Cell;
use std::rc::Rc;

use log::warn;

//=== Internal Dependencies ===============================================

use super::event::core_events::{E_BEGINFRAME, E_ENDFRAME, E_UPDATE, P_FRAMENUMBER, P_TIMESTEP};
use super::{Object, ObjectBase, ObjectRef, ObjectType, VariantMap};
use crate::context::Context;

//=== Time ================================================================

/// Frame timing subsystem.
///
/// Registered by default when a [`Context`] is built.
pub struct Time {
    base: ObjectBase,
    frame_number: Cell<u32>,
    time_step: Cell<f32>,
    elapsed: Cell<f32>,
}

impl ObjectType for Time {
    const TYPE_NAME: &'static str = "Time";
}

impl Object for Time {
    fn base(&self) -> &ObjectBase {
        &self.base
    }
}

impl Time {
    /// Creates the subsystem with no frame started.
    pub fn new(context: &Context) -> Self {
        Self {
            base: ObjectBase::new::<Time>(context),
            frame_number: Cell::new(0),
            time_step: Cell::new(0.0),
            elapsed: Cell::new(0.0),
        }
    }

    //--- Frame Lifecycle --------------------------------------------------

    /// Starts a new frame lasting `time_step` seconds.
    ///
    /// The frame number skips zero when it wraps, so zero always means
    /// "no frame started yet".
    pub fn begin_frame(self: &Rc<Self>, time_step: f32) {
        let mut frame = self.frame_number.get().wrapping_add(1);
        if frame == 0 {
            frame = 1;
        }
        self.frame_number.set(frame);
        self.time_step.set(time_step);
        self.elapsed.set(self.elapsed.get() + time_step);

        let Some(context) = self.base.context() else {
            warn!("Time::begin_frame without a live context, no events sent");
            return;
        };
        let sender: ObjectRef = self.clone();

        // Variant ints are i32; frame numbers past i32::MAX report i32::MAX.
        let mut data = VariantMap::default();
        data.insert(P_FRAMENUMBER, i32::try_from(frame).unwrap_or(i32::MAX).into());
        data.insert(P_TIMESTEP, time_step.into());
        context.send_event(Some(&sender), E_BEGINFRAME, &mut data);

        let mut data = VariantMap::default();
        data.insert(P_TIMESTEP, time_step.into());
        context.send_event(Some(&sender), E_UPDATE, &mut data);
    }

    /// Ends the current frame.
    pub fn end_frame(self: &Rc<Self>) {
        let Some(context) = self.base.context() else {
            return;
        };
        let sender: ObjectRef = self.clone();
        context.send_event(Some(&sender), E_ENDFRAME, &mut VariantMap::default());
    }

    //--- Queries ----------------------------------------------------------

    /// Number of the current frame; zero before the first frame.
    pub fn frame_number(&self) -> u32 {
        self.frame_number.get()
    }

    /// Length of the current frame in seconds.
    pub fn time_step(&self) -> f32 {
        self.time_step.get()
    }

    /// Total seconds across all frames begun so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed.get()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
