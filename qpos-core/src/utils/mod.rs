//! Utility re-exports and helper macros for the position servo.
//!
//! This module re-exports the control loop, motion sequencing and timing:
//!
//! - `controllers`: encoder, actuator, PID controller and the periodic tick
//! - `motion`: motion profiles, the sequencer and its command channel
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod controllers;
pub mod motion;

pub use controllers::ControlLoop;
pub use embassy_time::*;
pub use motion::{MotionCommand, MotionSequencer, MOTION_CHANNEL};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::__static_cell::StaticCell<$t> =
            $crate::__static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
