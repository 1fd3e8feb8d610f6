use std::time::Duration;

use log::{debug, info};

use crate::actuator::ActuatorChannel;
use crate::arm_hal::{HalResult, Pacer, ServoOutput};
use crate::config::{ArmConfig, ConfigError, GripperConfig};
use crate::pose::{Joint, Pose};
use crate::ramp::RampMotionController;

/// Owns the four joint channels and realizes pose transitions one joint at a time.
pub struct ArmController {
    /// Indexed by [`Joint::index`].
    channels: [ActuatorChannel; 4],
    step_delays: [Duration; 4],
    ramp: RampMotionController,
    gripper: GripperConfig,
}

impl ArmController {
    /// Builds the channels assuming the servos sit at `initial`. Nothing is commanded until
    /// [`ArmController::snap_to`] or a move.
    pub fn new(
        config: &ArmConfig,
        servos: [Box<dyn ServoOutput>; 4],
        initial: &Pose,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let channel = |joint: Joint, output: Box<dyn ServoOutput>| {
            ActuatorChannel::new(joint, config.joints.get(joint).range, initial.get(joint), output)
        };
        let [base, shoulder, elbow, gripper] = servos;
        let channels = [
            channel(Joint::Base, base)?,
            channel(Joint::Shoulder, shoulder)?,
            channel(Joint::Elbow, elbow)?,
            channel(Joint::Gripper, gripper)?,
        ];
        Ok(Self {
            channels,
            step_delays: Joint::ALL.map(|joint| config.joints.get(joint).step_delay()),
            ramp: RampMotionController::new(config.step_us),
            gripper: config.gripper.clone(),
        })
    }

    /// Commands every joint straight to `pose` without ramping. Only safe when the arm is known
    /// to be at or near `pose`.
    pub fn snap_to(&mut self, pose: &Pose) -> HalResult<()> {
        for channel in self.channels.iter_mut() {
            channel.set_position(pose.get(channel.joint()))?;
        }
        Ok(())
    }

    /// Ramps base, then shoulder, then elbow, then gripper. The base must finish rotating
    /// before the shoulder and elbow extend, so this order is fixed.
    pub fn move_to_pose(&mut self, pose: &Pose, pacer: &mut dyn Pacer) -> HalResult<()> {
        debug!("Moving to {pose:?}");
        for (joint, target) in pose.targets() {
            self.ramp_joint(joint, target, pacer)?;
        }
        Ok(())
    }

    pub fn open_gripper(&mut self, pacer: &mut dyn Pacer) -> HalResult<()> {
        info!("Opening gripper...");
        self.ramp_joint(Joint::Gripper, self.gripper.open_us, pacer)
    }

    pub fn close_gripper(&mut self, pacer: &mut dyn Pacer) -> HalResult<()> {
        info!("Closing gripper...");
        self.ramp_joint(Joint::Gripper, self.gripper.closed_us, pacer)
    }

    pub fn current_pose(&self) -> Pose {
        let mut pose = Pose::new(0, 0, 0, 0);
        for channel in &self.channels {
            pose.set(channel.joint(), channel.current_position());
        }
        pose
    }

    pub fn position(&self, joint: Joint) -> u16 {
        self.channels[joint.index()].current_position()
    }

    fn ramp_joint(&mut self, joint: Joint, target: u16, pacer: &mut dyn Pacer) -> HalResult<()> {
        let index = joint.index();
        self.ramp
            .ramp_to(&mut self.channels[index], target, self.step_delays[index], pacer)?;
        Ok(())
    }
}
