//! Values exchanged between the tick handler and the foreground.
//!
//! Each value is a single machine word stored atomically, so a read on one
//! side of the tick boundary never observes a half-written update.

use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, Ordering};

use super::{encoder::Position, pid::Setpoint};

/// Setpoint, published position and enable gate shared with the control loop.
pub struct SharedState {
    setpoint: AtomicI16,
    position: AtomicU16,
    enabled: AtomicBool,
}

impl SharedState {
    /// Setpoint 0, position 0, controller disabled.
    pub const fn new() -> Self {
        Self {
            setpoint: AtomicI16::new(0),
            position: AtomicU16::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint.load(Ordering::Acquire)
    }

    /// Written by the motion sequencer; picked up on the next tick.
    ///
    /// Single writer, so a plain load/store pair is enough on targets
    /// without compare-and-swap.
    pub fn set_setpoint(&self, setpoint: Setpoint) {
        let previous = self.setpoint.load(Ordering::Relaxed);
        self.setpoint.store(setpoint, Ordering::Release);
        if previous != setpoint {
            tracing::info!(previous, setpoint, "setpoint changed");
        }
    }

    /// Last position sampled by the control loop.
    pub fn position(&self) -> Position {
        self.position.load(Ordering::Acquire)
    }

    pub(crate) fn publish_position(&self, position: Position) {
        self.position.store(position, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Open or close the closed-loop gate.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.load(Ordering::Relaxed);
        self.enabled.store(enabled, Ordering::Release);
        if previous != enabled {
            tracing::info!(enabled, "position control gate");
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
