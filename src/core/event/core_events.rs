//=========================================================================
// Core Events
//=========================================================================
//
// Frame events sent by the Time subsystem and their parameter names.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use crate::core::TypeKey;

//=== Events ==============================================================

/// Frame begin. Params: [`P_FRAMENUMBER`], [`P_TIMESTEP`].
pub const E_BEGINFRAME: TypeKey = TypeKey::new("BeginFrame");

/// Per-frame logic update. Params: [`P_TIMESTEP`].
pub const E_UPDATE: TypeKey = TypeKey::new("Update");

/// Frame end. No params.
pub const E_ENDFRAME: TypeKey = TypeKey::new("EndFrame");

//=== Parameters ==========================================================

pub const P_FRAMENUMBER: TypeKey = TypeKey::new("FrameNumber");
pub const P_TIMESTEP: TypeKey = TypeKey::new("TimeStep");
