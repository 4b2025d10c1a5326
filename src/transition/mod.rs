//! The cinematic "step into the screen" transition.
//!
//! Starting from a camera watching the display surface in the primary scene,
//! the transition runs three phases over a fixed duration:
//!
//! - **ZoomGrain**: the camera flies up to the screen while its field of view
//!   narrows and film grain builds up.
//! - **Blackout**: a black overlay fades in. Just before it is fully opaque the
//!   viewer is handed off: the secondary camera becomes active, the avatar
//!   moves into the secondary scene and the screen prop disappears.
//! - **FadeIn**: the overlay and grain fade away over the secondary scene.
//!
//! On completion the follow camera is synced to the secondary camera so it
//! takes over without a jump.
//!
//! # Example
//!
//! ```ignore
//! use telescreen::*;
//!
//! let mut transition = CinematicTransitionController::new(TransitionConfig::default());
//!
//! let display = compositor.display_surface().copied();
//! let (world, world_camera) = compositor.secondary_parts_mut();
//! let mut rig = TransitionRig::new(&mut room_camera, &mut room, world, world_camera, &mut avatar)
//!     .display(display)
//!     .follow_camera(&mut follow)
//!     .grain(&mut grain)
//!     .overlay(&mut overlay)
//!     .viewport(width, height);
//!
//! let done = transition.start(&mut rig, || log::info!("inside"))?;
//! ```

mod controller;
mod effects;
mod phase;

pub use controller::{
    ActiveCamera, CinematicTransitionController, Completion, SpawnPose, TransitionConfig,
    TransitionError, TransitionRig,
};
pub use effects::{FadeOverlay, GrainSettings, OverlayState};
pub use phase::{
    BLACKOUT_END, HANDOFF_AT, Handoff, PhaseThresholds, TransitionPhase, ZOOM_END,
    ease_in_out_cubic,
};
