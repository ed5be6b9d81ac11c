//! Foreground sequencer that walks a motion profile.

use embassy_futures::select::{select, Either};
use embassy_time::{Instant, Timer};

use super::{CommandError, MotionCommand, MotionProfile, MotionStep, MOTION_CHANNEL};
use crate::utils::controllers::SharedState;

/// Writes setpoints from the active profile and executes motion commands.
pub struct MotionSequencer<'a> {
    shared: &'a SharedState,
    profile: Option<MotionProfile>,
    next: usize,
}

impl<'a> MotionSequencer<'a> {
    pub fn new(shared: &'a SharedState) -> Self {
        Self {
            shared,
            profile: None,
            next: 0,
        }
    }

    /// Apply a command to the shared state.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn execute_command(&mut self, command: MotionCommand) -> Result<(), CommandError> {
        match command {
            MotionCommand::Enable => self.shared.set_enabled(true),
            MotionCommand::Disable => self.shared.set_enabled(false),
            MotionCommand::Goto { p } => {
                self.clear_profile();
                self.shared.set_setpoint(p);
            }
            MotionCommand::Profile { id } => {
                let profile = MotionProfile::preset(id)?;
                tracing::info!(id, steps = profile.len(), "profile loaded");
                self.load(profile);
                self.shared.set_enabled(true);
            }
            MotionCommand::Stop => {
                self.clear_profile();
                self.shared.set_enabled(false);
            }
        }
        Ok(())
    }

    /// Replace the active profile; it starts from its first step.
    pub fn load(&mut self, profile: MotionProfile) {
        self.profile = Some(profile);
        self.next = 0;
    }

    pub fn clear_profile(&mut self) {
        if self.profile.take().is_some() {
            tracing::info!("profile cleared");
        }
        self.next = 0;
    }

    pub fn profile(&self) -> Option<&MotionProfile> {
        self.profile.as_ref()
    }

    /// Publish the next step's setpoint and return the step.
    ///
    /// Returns `None` when no profile is active.
    pub fn advance(&mut self) -> Option<MotionStep> {
        let step = self.profile.as_ref()?.step(self.next);
        self.next = self.next.wrapping_add(1);
        self.shared.set_setpoint(step.setpoint);
        Some(step)
    }

    /// Serve `MOTION_CHANNEL` and step the active profile forever.
    ///
    /// A step's hold time runs from when its setpoint was published; commands
    /// that arrive meanwhile do not restart it.
    pub async fn run(&mut self) -> ! {
        let receiver = MOTION_CHANNEL.receiver();
        let mut deadline: Option<Instant> = None;
        loop {
            if deadline.is_none() {
                deadline = self.advance().map(|step| Instant::now() + step.hold);
            }

            let command = match deadline {
                Some(at) => match select(receiver.receive(), Timer::at(at)).await {
                    Either::First(command) => Some(command),
                    Either::Second(()) => None,
                },
                None => Some(receiver.receive().await),
            };

            let Some(command) = command else {
                deadline = None;
                continue;
            };

            tracing::info!("Received motion command: {:?}", command);
            if let Err(e) = self.execute_command(command) {
                tracing::warn!("motion command rejected: {:?}", e);
                continue;
            }
            // a new profile (or none) takes over right away
            if matches!(
                command,
                MotionCommand::Profile { .. } | MotionCommand::Goto { .. } | MotionCommand::Stop
            ) {
                deadline = None;
            }
        }
    }
}
