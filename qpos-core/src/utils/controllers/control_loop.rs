//! The periodic position-control tick.
//!
//! `ControlLoop::run` plays the role of the 100 Hz timer interrupt: each
//! period it samples the encoder, runs the PID controller and applies the
//! resulting command to the actuator, synchronously and without awaiting
//! anything inside the tick body.

use embassy_time::{Duration, Instant, Ticker};

use super::{
    actuator::{ActuatorCommand, ActuatorDriver},
    encoder::PositionSource,
    pid::{PidConfig, PositionPid},
    shared::SharedState,
};

/// Tick rate of the control loop.
pub const TICK_HZ: u64 = 100;
/// Period between ticks (10 ms).
pub const TICK_PERIOD: Duration = Duration::from_millis(1000 / TICK_HZ);
/// Longest a single tick may run before it is reported as an overrun.
pub const TICK_BUDGET: Duration = Duration::from_millis(2);

/// Counters kept by the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u32,
    pub overruns: u32,
    pub actuator_faults: u32,
}

/// Encoder → PID → actuator, once per tick.
pub struct ControlLoop<'a, P, A> {
    pid: PositionPid,
    encoder: P,
    actuator: A,
    shared: &'a SharedState,
    last: Option<ActuatorCommand>,
    stats: LoopStats,
}

impl<'a, P, A> ControlLoop<'a, P, A>
where
    P: PositionSource,
    A: ActuatorDriver,
{
    pub fn new(pid: PositionPid, encoder: P, actuator: A, shared: &'a SharedState) -> Self {
        Self {
            pid,
            encoder,
            actuator,
            shared,
            last: None,
            stats: LoopStats::default(),
        }
    }

    /// Brake the motor and build a loop, using the default gains unless `config` is given.
    pub fn init(
        encoder: P,
        mut actuator: A,
        shared: &'a SharedState,
        config: Option<PidConfig>,
    ) -> Self {
        if let Err(e) = actuator.brake() {
            tracing::warn!("initial brake failed: {:?}", e);
        }
        Self::new(
            PositionPid::new(config.unwrap_or_default()),
            encoder,
            actuator,
            shared,
        )
    }

    /// Run one control period and return the command that was applied.
    pub fn tick(&mut self) -> Result<ActuatorCommand, A::Error> {
        let position = self.encoder.read();
        self.shared.publish_position(position);
        self.pid.set_enabled(self.shared.is_enabled());

        let setpoint = self.shared.setpoint();
        let command = self.pid.tick(setpoint, position);
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        tracing::trace!(setpoint, position, ?command, "tick");

        if let Err(e) = self.actuator.apply(command) {
            self.stats.actuator_faults = self.stats.actuator_faults.wrapping_add(1);
            self.last = None;
            return Err(e);
        }
        self.last = Some(command);
        Ok(command)
    }

    /// Tick forever at [`TICK_PERIOD`].
    ///
    /// Actuator faults are logged and the loop keeps going; a tick that runs
    /// longer than [`TICK_BUDGET`] is counted and logged as an overrun.
    pub async fn run(&mut self) -> ! {
        let mut ticker = Ticker::every(TICK_PERIOD);
        tracing::info!(period_ms = TICK_PERIOD.as_millis(), "control loop started");
        loop {
            ticker.next().await;
            let started = Instant::now();
            if let Err(e) = self.tick() {
                tracing::error!("actuator command failed: {:?}", e);
            }
            let elapsed = started.elapsed();
            if elapsed > TICK_BUDGET {
                self.stats.overruns = self.stats.overruns.wrapping_add(1);
                tracing::warn!(elapsed_us = elapsed.as_micros(), "tick overran its budget");
            }
        }
    }

    /// Command applied on the last successful tick.
    pub fn last_command(&self) -> Option<ActuatorCommand> {
        self.last
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn pid(&self) -> &PositionPid {
        &self.pid
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    /// Tear down the loop and hand back the encoder and actuator.
    pub fn free(self) -> (P, A) {
        (self.encoder, self.actuator)
    }
}
