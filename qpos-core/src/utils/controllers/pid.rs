//! Fixed-point PID position controller.
//!
//! Integer-only, `no_std`, no allocation. Far from the setpoint the motor is
//! driven bang-bang at full duty; close to it a PID blend is used with a
//! clamped integral, a dead band that clears the integral once on target,
//! and a derivative-like term taken against the error from three ticks ago.
//! Requested duties below the motor's dead zone are raised to the floor.

use super::{
    actuator::{ActuatorCommand, Direction, MAX_DUTY},
    encoder::Position,
};

/// Desired encoder position, same scale as [`Position`].
pub type Setpoint = i16;

/// Proportional gain.
pub const KP: i32 = 4;
/// Integral gain, applied to the clamped error sum.
pub const KI: i32 = 1;
/// Gain on the three-tick error difference.
pub const KD: i32 = 22;
/// Errors beyond ± this drive the motor at full duty.
pub const LARGE_ERROR: i32 = 150;
/// Anti-windup clamp for the error sum.
pub const INTEGRAL_LIMIT: i32 = 240;
/// Errors strictly inside ± this clear the error sum.
pub const DEAD_BAND: i32 = 2;
/// Outputs strictly inside ± this brake the motor.
pub const BRAKE_BAND: i32 = 2;
/// Smallest duty at which the motor reliably turns.
pub const MIN_DUTY: u8 = 140;

/// Controller gains and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidConfig {
    pub kp: i32,
    pub ki: i32,
    pub kd: i32,
    pub large_error: i32,
    pub integral_limit: i32,
    pub dead_band: i32,
    pub brake_band: i32,
    pub min_duty: u8,
    pub max_duty: u8,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: KP,
            ki: KI,
            kd: KD,
            large_error: LARGE_ERROR,
            integral_limit: INTEGRAL_LIMIT,
            dead_band: DEAD_BAND,
            brake_band: BRAKE_BAND,
            min_duty: MIN_DUTY,
            max_duty: MAX_DUTY,
        }
    }
}

impl PidConfig {
    /// Replace the three gains.
    pub fn with_gains(mut self, kp: i32, ki: i32, kd: i32) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// Set the error magnitude above which the motor runs bang-bang.
    pub fn with_large_error(mut self, threshold: i32) -> Self {
        self.large_error = threshold;
        self
    }

    /// Set the anti-windup clamp for the error sum.
    ///
    /// The sign of `limit` is ignored.
    pub fn with_integral_limit(mut self, limit: i32) -> Self {
        self.integral_limit = limit.saturating_abs();
        self
    }

    /// Set the dead-zone floor and the saturation limit for the duty.
    ///
    /// `min` is capped at `max`.
    pub fn with_duty_limits(mut self, min: u8, max: u8) -> Self {
        self.min_duty = min.min(max);
        self.max_duty = max;
        self
    }
}

/// The last three errors, newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorHistory {
    errors: [i32; 3],
}

impl ErrorHistory {
    /// Error recorded three updates ago.
    #[inline]
    pub fn oldest(&self) -> i32 {
        self.errors[2]
    }

    /// Errors as `[error1, error2, error3]`.
    pub fn as_array(&self) -> [i32; 3] {
        self.errors
    }

    fn push(&mut self, error: i32) {
        self.errors = [error, self.errors[0], self.errors[1]];
    }
}

/// State carried by the controller from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub integral: i32,
    pub history: ErrorHistory,
    pub enabled: bool,
}

impl ControllerState {
    /// Advance the controller by one tick.
    ///
    /// Total over every input: never fails, always yields a valid command.
    pub fn tick(
        &mut self,
        config: &PidConfig,
        setpoint: Setpoint,
        position: Position,
    ) -> ActuatorCommand {
        let error0 = position_error(setpoint, position);

        if !self.enabled {
            return ActuatorCommand::Brake;
        }

        if error0 > config.large_error {
            self.integral = 0;
            return full_speed(Direction::Increasing, config);
        }
        if error0 < -config.large_error {
            self.integral = 0;
            return full_speed(Direction::Decreasing, config);
        }

        self.integral = (self.integral + error0).clamp(-config.integral_limit, config.integral_limit);
        if error0 > -config.dead_band && error0 < config.dead_band {
            self.integral = 0;
        }

        let error_delta = error0 - self.history.oldest();
        let output = config.kp * error0 + config.ki * self.integral + config.kd * error_delta;

        let command = if output >= config.brake_band {
            ActuatorCommand::Drive {
                direction: Direction::Increasing,
                duty: floored_duty(output, config),
            }
        } else if output <= -config.brake_band {
            ActuatorCommand::Drive {
                direction: Direction::Decreasing,
                duty: floored_duty(-output, config),
            }
        } else {
            ActuatorCommand::Brake
        };

        self.history.push(error0);
        command
    }
}

/// Signed distance from `position` to `setpoint`.
///
/// Taken modulo 2^16 so a counter that wrapped past zero still yields the
/// short way round.
#[inline]
pub fn position_error(setpoint: Setpoint, position: Position) -> i32 {
    setpoint.wrapping_sub(position as i16) as i32
}

fn full_speed(direction: Direction, config: &PidConfig) -> ActuatorCommand {
    ActuatorCommand::Drive {
        direction,
        duty: config.max_duty,
    }
}

/// Saturate a positive output to the duty range, then lift it to the dead-zone floor.
fn floored_duty(magnitude: i32, config: &PidConfig) -> u8 {
    let duty = magnitude.min(config.max_duty as i32);
    duty.max(config.min_duty as i32) as u8
}

/// PID position controller: configuration plus per-tick state.
#[derive(Debug, Clone, Default)]
pub struct PositionPid {
    config: PidConfig,
    state: ControllerState,
}

impl PositionPid {
    /// New controller, disabled, with zeroed integral and history.
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            state: ControllerState::default(),
        }
    }

    /// Compute this tick's actuator command.
    #[inline]
    pub fn tick(&mut self, setpoint: Setpoint, position: Position) -> ActuatorCommand {
        self.state.tick(&self.config, setpoint, position)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled != enabled {
            tracing::debug!(enabled, "PID gate changed");
        }
        self.state.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> PositionPid {
        let mut pid = PositionPid::new(PidConfig::default());
        pid.set_enabled(true);
        pid
    }

    fn drive(direction: Direction, duty: u8) -> ActuatorCommand {
        ActuatorCommand::Drive { direction, duty }
    }

    #[test]
    fn first_tick_near_setpoint_saturates() {
        let mut pid = enabled();
        // 4*120 + 120 + 22*120 = 3240
        assert_eq!(pid.tick(120, 0), drive(Direction::Increasing, 255));
        assert_eq!(pid.state().integral, 120);
        assert_eq!(pid.state().history.as_array(), [120, 0, 0]);
    }

    #[test]
    fn large_negative_error_is_bang_bang() {
        let mut pid = enabled();
        pid.tick(100, 90);
        let history = pid.state().history;
        assert_eq!(pid.tick(0, 300), drive(Direction::Decreasing, 255));
        assert_eq!(pid.state().integral, 0);
        assert_eq!(pid.state().history, history);
    }

    #[test]
    fn large_positive_error_clears_integral() {
        let mut pid = enabled();
        pid.tick(100, 0);
        assert_ne!(pid.state().integral, 0);
        assert_eq!(pid.tick(151, 0), drive(Direction::Increasing, 255));
        assert_eq!(pid.state().integral, 0);
    }

    #[test]
    fn threshold_itself_uses_pid_branch() {
        let mut pid = enabled();
        pid.tick(150, 0);
        assert_eq!(pid.state().integral, 150);
        assert_eq!(pid.state().history.as_array(), [150, 0, 0]);
    }

    #[test]
    fn one_count_short_lifts_to_dead_zone_floor() {
        let mut pid = enabled();
        // integral cleared by the dead band, delta 1: 4 + 0 + 22 = 26
        assert_eq!(pid.tick(500, 499), drive(Direction::Increasing, 140));
        assert_eq!(pid.state().integral, 0);
    }

    #[test]
    fn small_negative_output_brakes() {
        let mut pid = enabled();
        pid.tick(10, 9);
        pid.tick(10, 10);
        pid.tick(10, 10);
        // error 0 against error3 = 1: output -22
        assert_eq!(pid.tick(10, 10), drive(Direction::Decreasing, 140));
        // error3 now 0
        assert_eq!(pid.tick(10, 10), ActuatorCommand::Brake);
    }

    #[test]
    fn derivative_uses_three_tick_old_error() {
        let mut pid = enabled();
        pid.tick(30, 0);
        pid.tick(20, 0);
        pid.tick(10, 0);
        assert_eq!(pid.state().history.oldest(), 30);
        assert_eq!(pid.state().integral, 60);
        // error 5: integral 65, delta 5 - 30 = -25 -> 20 + 65 - 550 = -465
        assert_eq!(pid.tick(5, 0), drive(Direction::Decreasing, 255));
        assert_eq!(pid.state().history.as_array(), [5, 10, 20]);
    }

    #[test]
    fn integral_is_clamped() {
        let mut pid = enabled();
        for _ in 0..20 {
            pid.tick(100, 0);
            assert!(pid.state().integral <= INTEGRAL_LIMIT);
        }
        assert_eq!(pid.state().integral, INTEGRAL_LIMIT);
        for _ in 0..20 {
            pid.tick(-100, 0);
            assert!(pid.state().integral >= -INTEGRAL_LIMIT);
        }
        assert_eq!(pid.state().integral, -INTEGRAL_LIMIT);
    }

    #[test]
    fn disabled_controller_brakes_without_touching_state() {
        let mut pid = enabled();
        pid.tick(50, 0);
        let before = *pid.state();
        pid.set_enabled(false);
        for (sp, pos) in [(0, 0), (1000, 0), (-20, 40), (7, 3)] {
            assert_eq!(pid.tick(sp, pos), ActuatorCommand::Brake);
        }
        assert_eq!(pid.state().integral, before.integral);
        assert_eq!(pid.state().history, before.history);
    }

    #[test]
    fn settled_loop_stays_braked() {
        let mut pid = enabled();
        pid.tick(40, 0);
        for _ in 0..3 {
            pid.tick(40, 40);
        }
        for _ in 0..50 {
            assert_eq!(pid.tick(40, 40), ActuatorCommand::Brake);
            assert_eq!(pid.state().integral, 0);
        }
    }

    #[test]
    fn driven_duty_stays_in_range() {
        let mut pid = enabled();
        let mut position: u16 = 0;
        for step in 0..400i32 {
            let setpoint = ((step * 37) % 400 - 200) as i16;
            position = position.wrapping_add((step % 7) as u16);
            match pid.tick(setpoint, position) {
                ActuatorCommand::Drive { duty, .. } => assert!((140..=255).contains(&duty)),
                ActuatorCommand::Brake => {}
            }
            assert!(pid.state().integral.abs() <= INTEGRAL_LIMIT);
        }
    }

    #[test]
    fn error_takes_short_way_across_wrap() {
        assert_eq!(position_error(0, u16::MAX), 1);
        assert_eq!(position_error(-1, 1), -2);
        assert_eq!(position_error(1200, 120), 1080);
    }

    #[test]
    fn duty_limits_are_configurable() {
        let config = PidConfig::default().with_duty_limits(200, 180);
        assert_eq!(config.min_duty, 180);
        let mut state = ControllerState {
            enabled: true,
            ..Default::default()
        };
        assert_eq!(
            state.tick(&config, 1000, 0),
            drive(Direction::Increasing, 180)
        );
    }

    #[test]
    fn builders_replace_gains_and_thresholds() {
        let config = PidConfig::default()
            .with_gains(1, 0, 0)
            .with_large_error(50)
            .with_integral_limit(30);
        assert_eq!((config.kp, config.ki, config.kd), (1, 0, 0));
        let mut pid = PositionPid::new(config);
        pid.set_enabled(true);

        assert_eq!(pid.tick(60, 0), drive(Direction::Increasing, 255));
        assert_eq!(pid.state().integral, 0);
        // P-only output of 40 is lifted to the duty floor
        assert_eq!(pid.tick(40, 0), drive(Direction::Increasing, MIN_DUTY));
        assert_eq!(pid.state().integral, 30);
    }

    #[test]
    fn negative_integral_limit_uses_magnitude() {
        let config = PidConfig::default().with_integral_limit(-5);
        assert_eq!(config.integral_limit, 5);
        let mut pid = PositionPid::new(config);
        pid.set_enabled(true);
        assert_eq!(pid.tick(10, 0), drive(Direction::Increasing, 255));
        assert_eq!(pid.state().integral, 5);
        pid.tick(-10, 0);
        assert!(pid.state().integral >= -5);
    }
}
