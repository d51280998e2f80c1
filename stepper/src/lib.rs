//! Half-step driver for the four-coil lift motor.
//!
//! [`MotorLink`] carries position and direction between the microstep timer
//! and the logic loop; [`StepperDriver`] owns the coils and moves the motor.

mod driver;
mod link;
mod pattern;

pub use driver::{StepperConfig, StepperDriver};
pub use link::{Axis, Direction, MotorLink};
pub use pattern::{WindingPattern, HALF_STEP_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepperError {
    #[error("micro-steps per step must be at least 1")]
    ZeroMicroSteps,
}
