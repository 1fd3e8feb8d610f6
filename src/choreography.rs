use std::time::Duration;

use log::debug;
use serde::Serialize;

use crate::arm_controller::ArmController;
use crate::arm_hal::{HalResult, Pacer};
use crate::color::Bin;
use crate::pose::{Waypoint, WaypointTable};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize)]
pub enum ArmAction {
    MoveTo(Waypoint),
    OpenGripper,
    CloseGripper,
}

/// One action followed by a pause to let the arm settle.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ChoreographyStep {
    pub action: ArmAction,
    pub settle: Duration,
}

const fn step(action: ArmAction, settle_ms: u64) -> ChoreographyStep {
    ChoreographyStep { action, settle: Duration::from_millis(settle_ms) }
}

// Intermediate poses keep the arm clear of the object and the work surface. Do not reorder.
pub const PICK: &[ChoreographyStep] = &[
    step(ArmAction::MoveTo(Waypoint::PickAlign), 1000),
    step(ArmAction::MoveTo(Waypoint::PickLower), 1000),
    step(ArmAction::OpenGripper, 500),
    step(ArmAction::MoveTo(Waypoint::PickExtend), 1000),
    step(ArmAction::MoveTo(Waypoint::PickGrip), 500),
    step(ArmAction::MoveTo(Waypoint::Transport), 0),
];

pub const PLACE_RED: &[ChoreographyStep] = &[
    step(ArmAction::MoveTo(Waypoint::RedAlign), 1000),
    step(ArmAction::MoveTo(Waypoint::RedExtend), 1000),
    step(ArmAction::MoveTo(Waypoint::RedLower), 1000),
    step(ArmAction::OpenGripper, 1000),
    step(ArmAction::CloseGripper, 0),
];

pub const PLACE_BLUE: &[ChoreographyStep] = &[
    step(ArmAction::MoveTo(Waypoint::BlueAlign), 1000),
    step(ArmAction::MoveTo(Waypoint::BlueExtend), 1000),
    step(ArmAction::MoveTo(Waypoint::BlueLower), 1000),
    step(ArmAction::OpenGripper, 1000),
    step(ArmAction::CloseGripper, 0),
];

pub fn placement(bin: Bin) -> &'static [ChoreographyStep] {
    match bin {
        Bin::Red => PLACE_RED,
        Bin::Blue => PLACE_BLUE,
    }
}

/// Runs `steps` to completion, in order.
pub fn perform(
    arm: &mut ArmController,
    waypoints: &WaypointTable,
    steps: &[ChoreographyStep],
    pacer: &mut dyn Pacer,
) -> HalResult<()> {
    for step in steps {
        debug!("{:?}", step.action);
        match step.action {
            ArmAction::MoveTo(waypoint) => arm.move_to_pose(waypoints.get(waypoint), pacer)?,
            ArmAction::OpenGripper => arm.open_gripper(pacer)?,
            ArmAction::CloseGripper => arm.close_gripper(pacer)?,
        }
        if !step.settle.is_zero() {
            pacer.pause(step.settle);
        }
    }
    Ok(())
}
