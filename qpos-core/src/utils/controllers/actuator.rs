//! Direction + PWM actuator for a brushed DC motor.
//!
//! The motor bridge has two mutually exclusive direction lines and one 8-bit
//! duty register. Driving both lines low with the duty at maximum is the
//! bridge's brake condition; it is not a coast, and callers must not assume
//! zero duty brakes.

use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};

/// Largest value of the 8-bit duty register.
pub const MAX_DUTY: u8 = u8::MAX;

/// Rotation direction, named after its effect on the encoder count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Encoder position counts up.
    Increasing,
    /// Encoder position counts down.
    Decreasing,
}

/// What the actuator is told to do on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Drive { direction: Direction, duty: u8 },
    Brake,
}

impl ActuatorCommand {
    /// Signed drive value in [-255, 255]; brake maps to 0.
    pub fn signed_duty(&self) -> i16 {
        match *self {
            ActuatorCommand::Drive {
                direction: Direction::Increasing,
                duty,
            } => duty as i16,
            ActuatorCommand::Drive {
                direction: Direction::Decreasing,
                duty,
            } => -(duty as i16),
            ActuatorCommand::Brake => 0,
        }
    }
}

/// Motor actuation capability the control loop drives.
///
/// Duty is an 8-bit value, so out-of-range requests cannot reach the driver.
pub trait ActuatorDriver {
    type Error: core::fmt::Debug;

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;

    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error>;

    /// Both direction lines low, duty at [`MAX_DUTY`].
    fn brake(&mut self) -> Result<(), Self::Error>;

    fn drive(&mut self, direction: Direction, duty: u8) -> Result<(), Self::Error> {
        self.set_direction(direction)?;
        self.set_duty(duty)
    }

    /// Apply a controller command verbatim.
    fn apply(&mut self, command: ActuatorCommand) -> Result<(), Self::Error> {
        match command {
            ActuatorCommand::Drive { direction, duty } => self.drive(direction, duty),
            ActuatorCommand::Brake => self.brake(),
        }
    }
}

/// Errors raised by the bridge's pins or PWM channel.
#[derive(Debug)]
pub enum ActuatorError<PinE, PwmE> {
    Pin(PinE),
    Pwm(PwmE),
}

/// H-bridge (L293D style) driven by two direction GPIOs and one PWM channel.
pub struct HBridge<INC, DEC, PWM> {
    increase: INC,
    decrease: DEC,
    pwm: PWM,
}

impl<INC, DEC, PWM, PinE> HBridge<INC, DEC, PWM>
where
    INC: OutputPin<Error = PinE>,
    DEC: OutputPin<Error = PinE>,
    PWM: SetDutyCycle,
{
    /// Wrap the bridge lines. Nothing is written until the first command.
    pub fn new(increase: INC, decrease: DEC, pwm: PWM) -> Self {
        Self {
            increase,
            decrease,
            pwm,
        }
    }

    /// Consume the bridge and return its pins and PWM channel.
    pub fn free(self) -> (INC, DEC, PWM) {
        (self.increase, self.decrease, self.pwm)
    }
}

impl<INC, DEC, PWM, PinE> ActuatorDriver for HBridge<INC, DEC, PWM>
where
    INC: OutputPin<Error = PinE>,
    DEC: OutputPin<Error = PinE>,
    PWM: SetDutyCycle,
    PinE: core::fmt::Debug,
{
    type Error = ActuatorError<PinE, PWM::Error>;

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        // release the active line before asserting the other one
        match direction {
            Direction::Increasing => {
                self.decrease.set_low().map_err(ActuatorError::Pin)?;
                self.increase.set_high().map_err(ActuatorError::Pin)?;
            }
            Direction::Decreasing => {
                self.increase.set_low().map_err(ActuatorError::Pin)?;
                self.decrease.set_high().map_err(ActuatorError::Pin)?;
            }
        }
        Ok(())
    }

    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error> {
        self.pwm
            .set_duty_cycle_fraction(duty as u16, MAX_DUTY as u16)
            .map_err(ActuatorError::Pwm)
    }

    fn brake(&mut self) -> Result<(), Self::Error> {
        self.increase.set_low().map_err(ActuatorError::Pin)?;
        self.decrease.set_low().map_err(ActuatorError::Pin)?;
        self.set_duty(MAX_DUTY)
    }
}
