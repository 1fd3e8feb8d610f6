use derive_new::new;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::arm_hal::{HalResult, ServoOutput};
use crate::config::ConfigError;
use crate::pose::Joint;

/// Inclusive range of pulse widths a joint may be commanded to.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize, new)]
pub struct JointRange {
    pub min_us: u16,
    pub max_us: u16,
}

impl JointRange {
    pub fn contains(&self, pulse_us: u16) -> bool {
        (self.min_us..=self.max_us).contains(&pulse_us)
    }
}

/// One joint's output plus the last pulse width commanded to it. The arm is open-loop, so
/// `current_position` is what we asked for, not what the servo actually reached.
pub struct ActuatorChannel {
    joint: Joint,
    range: JointRange,
    current_us: u16,
    output: Box<dyn ServoOutput>,
}

impl ActuatorChannel {
    /// Takes ownership of `output` assuming it currently sits at `initial_us`. Nothing is
    /// commanded until [`ActuatorChannel::set_position`] is called.
    pub fn new(
        joint: Joint,
        range: JointRange,
        initial_us: u16,
        output: Box<dyn ServoOutput>,
    ) -> Result<Self, ConfigError> {
        if range.min_us >= range.max_us {
            return Err(ConfigError::EmptyRange { joint, range });
        }
        if !range.contains(initial_us) {
            return Err(ConfigError::PositionOutOfRange { joint, value: initial_us, range });
        }
        Ok(Self { joint, range, current_us: initial_us, output })
    }

    pub fn set_position(&mut self, pulse_us: u16) -> HalResult<()> {
        debug_assert!(
            self.range.contains(pulse_us),
            "{} commanded to {pulse_us}us outside {:?}",
            self.joint,
            self.range);
        trace!("{}: {pulse_us}us", self.joint);
        self.output.set_pulse_us(pulse_us)?;
        self.current_us = pulse_us;
        Ok(())
    }

    pub fn current_position(&self) -> u16 {
        self.current_us
    }

    pub fn joint(&self) -> Joint {
        self.joint
    }

    pub fn range(&self) -> JointRange {
        self.range
    }
}
