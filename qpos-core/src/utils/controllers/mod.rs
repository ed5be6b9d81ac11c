//! Module Exports
//!
//! This file exports the pieces of the position-control loop.
//!
//! - `encoder`: quadrature counter, decoder and the `PositionSource` trait.
//! - `actuator`: direction + PWM motor bridge behind `ActuatorDriver`.
//! - `pid`: the fixed-point PID position controller.
//! - `shared`: setpoint / position / enable cells shared with the foreground.
//! - `control_loop`: the 100 Hz tick tying them together.

pub mod actuator;
pub mod control_loop;
pub mod encoder;
pub mod pid;
pub mod shared;

pub use actuator::{ActuatorCommand, ActuatorDriver, ActuatorError, Direction, HBridge};
pub use control_loop::{ControlLoop, LoopStats, TICK_BUDGET, TICK_PERIOD};
pub use encoder::{PinDecoder, Position, PositionSource, QuadratureCounter, QuadratureDecoder};
pub use pid::{ControllerState, PidConfig, PositionPid, Setpoint};
pub use shared::SharedState;
