//! Motion sequencing on top of the position loop.
//!
//! The sequencer is a foreground collaborator: it only writes the shared
//! setpoint and enable gate, and never touches controller internals.
//! Commands reach it through `MOTION_CHANNEL`.

pub mod profile;
pub mod sequencer;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

pub use profile::{MotionProfile, MotionStep, ProfileError};
pub use sequencer::MotionSequencer;

/// Channel used to receive motion commands (`MotionCommand` messages).
pub static MOTION_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    MotionCommand,
    8,
> = embassy_sync::channel::Channel::new();

/// Motion command variants.
///
/// Serialized as JSON with tag `"mc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "mc", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Start closed-loop control at the current setpoint.
    Enable,
    /// Stop closed-loop control; the motor is braked.
    Disable,
    /// Hold a fixed position (cancels any running profile).
    Goto { p: i16 },
    /// Run a preset profile and enable control.
    Profile { id: u8 },
    /// Cancel the profile and disable control.
    Stop,
}

impl MotionCommand {
    /// Parse a JSON command frame such as `{"mc":"goto","p":300}`.
    pub fn from_json(frame: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(frame).map_err(|_| CommandError::Malformed)
    }
}

/// Errors produced while accepting a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The frame is not a valid `MotionCommand`.
    Malformed,
    /// The command named a profile that cannot be built.
    Profile(ProfileError),
}

impl From<ProfileError> for CommandError {
    fn from(e: ProfileError) -> Self {
        CommandError::Profile(e)
    }
}
