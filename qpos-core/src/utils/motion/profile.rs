//! Motion profiles: cyclic lists of (setpoint, hold) steps.

use embassy_time::Duration;
use heapless::Vec;

use crate::utils::controllers::pid::Setpoint;

/// Maximum number of steps in one profile.
pub const MAX_STEPS: usize = 16;

/// Hold time between steps of the sweep profile.
pub const SWEEP_HOLD: Duration = Duration::from_millis(700);
/// Hold time at each end of the long-stroke profile.
pub const STROKE_HOLD: Duration = Duration::from_millis(2500);

/// Move to `setpoint`, then wait `hold` before the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionStep {
    pub setpoint: Setpoint,
    pub hold: Duration,
}

impl MotionStep {
    pub const fn new(setpoint: Setpoint, hold: Duration) -> Self {
        Self { setpoint, hold }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    /// A profile needs at least one step.
    Empty,
    /// More than [`MAX_STEPS`] steps were given.
    TooManySteps,
    /// No preset with this id.
    UnknownPreset(u8),
}

/// A sequence of steps replayed from the start once exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionProfile {
    steps: Vec<MotionStep, MAX_STEPS>,
}

impl MotionProfile {
    pub fn from_steps(steps: &[MotionStep]) -> Result<Self, ProfileError> {
        if steps.is_empty() {
            return Err(ProfileError::Empty);
        }
        let steps = Vec::from_slice(steps).map_err(|_| ProfileError::TooManySteps)?;
        Ok(Self { steps })
    }

    /// Built-in profiles, selected by id.
    ///
    /// - `1`: short sweep 120 → 480 → 210 in steps of 90 counts.
    /// - `2`: long stroke between 120 and 1200.
    pub fn preset(id: u8) -> Result<Self, ProfileError> {
        match id {
            1 => Self::from_steps(
                &[120, 210, 300, 390, 480, 390, 300, 210].map(|sp| MotionStep::new(sp, SWEEP_HOLD)),
            ),
            2 => Self::from_steps(&[
                MotionStep::new(120, STROKE_HOLD),
                MotionStep::new(1200, STROKE_HOLD),
            ]),
            other => Err(ProfileError::UnknownPreset(other)),
        }
    }

    pub fn steps(&self) -> &[MotionStep] {
        &self.steps
    }

    /// Step at `index`, wrapping past the end.
    pub fn step(&self, index: usize) -> MotionStep {
        self.steps[index % self.steps.len()]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
