use std::time::Duration;

use thiserror::Error;

use crate::color::RgbSample;

#[derive(Error, PartialEq, Clone, Debug)]
pub enum HalError {
    #[error("{0}")]
    DeviceNotConnected(String),
    #[error("{0}")]
    InternalError(String),
}

pub type HalResult<T> = Result<T, HalError>;

/// Control signal for one servo joint.
pub trait ServoOutput {
    fn set_pulse_us(&mut self, pulse_us: u16) -> HalResult<()>;
}

pub trait ColorSensor {
    /// Blocking bus transaction returning one sample.
    fn read_rgb(&mut self) -> HalResult<RgbSample>;
}

/// Logical trigger button. Electrical polarity is the implementation's concern.
pub trait TriggerInput {
    fn is_asserted(&mut self) -> HalResult<bool>;
}

/// Blocking pause. Every delay in the control loop goes through here.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Everything the sequencer needs from the board. Servo outputs are indexed by
/// [`crate::pose::Joint::index`].
pub struct ArmHal {
    pub servos: [Box<dyn ServoOutput>; 4],
    pub color_sensor: Box<dyn ColorSensor>,
    pub trigger: Box<dyn TriggerInput>,
    pub pacer: Box<dyn Pacer>,
}
