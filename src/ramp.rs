use std::time::Duration;

use log::debug;

use crate::actuator::ActuatorChannel;
use crate::arm_hal::{HalResult, Pacer};

/// Moves a single joint toward a target in fixed increments, pausing between commits so the
/// servo never sees a jump larger than one step.
#[derive(Debug, Copy, Clone)]
pub struct RampMotionController {
    step_us: u16,
}

impl RampMotionController {
    pub fn new(step_us: u16) -> Self {
        Self { step_us: step_us.max(1) }
    }

    pub fn step_us(&self) -> u16 {
        self.step_us
    }

    pub fn steps(&self, from_us: u16, to_us: u16) -> RampSteps {
        RampSteps { current: from_us, target: to_us, step: self.step_us }
    }

    /// Blocks until `channel` has been commanded to exactly `target_us`. Returns the number of
    /// positions committed, which is zero when the channel is already there.
    pub fn ramp_to(
        &self,
        channel: &mut ActuatorChannel,
        target_us: u16,
        step_delay: Duration,
        pacer: &mut dyn Pacer,
    ) -> HalResult<usize> {
        let from_us = channel.current_position();
        if from_us == target_us {
            return Ok(0);
        }
        debug!("{}: ramping {from_us}us -> {target_us}us", channel.joint());
        let mut commits = 0;
        for pulse_us in self.steps(from_us, target_us) {
            channel.set_position(pulse_us)?;
            pacer.pause(step_delay);
            commits += 1;
        }
        Ok(commits)
    }
}

/// Intermediate positions of one ramp. Strictly monotonic, never passes the target, and the
/// last item is always the target itself (the final step is clamped when the distance is not a
/// multiple of the step size).
#[derive(Debug, Clone)]
pub struct RampSteps {
    current: u16,
    target: u16,
    step: u16,
}

impl Iterator for RampSteps {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.current == self.target {
            return None;
        }
        self.current = if self.target > self.current {
            self.current.saturating_add(self.step).min(self.target)
        } else {
            self.current.saturating_sub(self.step).max(self.target)
        };
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let distance = usize::from(self.current.abs_diff(self.target));
        let step = usize::from(self.step);
        let remaining = (distance + step - 1) / step;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RampSteps {}
