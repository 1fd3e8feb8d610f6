use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actuator::JointRange;
use crate::config::ConfigError;

/// The four controllable joints, in the order `ArmController::move_to_pose` drives them.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Base,
    Shoulder,
    Elbow,
    Gripper,
}

impl Joint {
    pub const ALL: [Joint; 4] = [Joint::Base, Joint::Shoulder, Joint::Elbow, Joint::Gripper];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Joint::Base => "base",
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Gripper => "gripper",
        };
        f.write_str(name)
    }
}

/// Full-arm snapshot of target pulse widths, in microseconds.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub base: u16,
    pub shoulder: u16,
    pub elbow: u16,
    pub gripper: u16,
}

impl Pose {
    pub const fn new(base: u16, shoulder: u16, elbow: u16, gripper: u16) -> Self {
        Self { base, shoulder, elbow, gripper }
    }

    pub fn get(&self, joint: Joint) -> u16 {
        match joint {
            Joint::Base => self.base,
            Joint::Shoulder => self.shoulder,
            Joint::Elbow => self.elbow,
            Joint::Gripper => self.gripper,
        }
    }

    pub fn set(&mut self, joint: Joint, pulse_us: u16) {
        match joint {
            Joint::Base => self.base = pulse_us,
            Joint::Shoulder => self.shoulder = pulse_us,
            Joint::Elbow => self.elbow = pulse_us,
            Joint::Gripper => self.gripper = pulse_us,
        }
    }

    /// Joint targets in drive order.
    pub fn targets(&self) -> impl Iterator<Item = (Joint, u16)> + '_ {
        Joint::ALL.into_iter().map(move |joint| (joint, self.get(joint)))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waypoint {
    /// Resting position between cycles, gripper closed.
    Rest,
    /// Raised carrying position, gripper holding the object.
    Transport,
    PickAlign,
    PickLower,
    PickExtend,
    PickGrip,
    RedAlign,
    RedExtend,
    RedLower,
    BlueAlign,
    BlueExtend,
    BlueLower,
}

impl Waypoint {
    pub const ALL: [Waypoint; 12] = [
        Waypoint::Rest,
        Waypoint::Transport,
        Waypoint::PickAlign,
        Waypoint::PickLower,
        Waypoint::PickExtend,
        Waypoint::PickGrip,
        Waypoint::RedAlign,
        Waypoint::RedExtend,
        Waypoint::RedLower,
        Waypoint::BlueAlign,
        Waypoint::BlueExtend,
        Waypoint::BlueLower,
    ];

    pub const COUNT: usize = Waypoint::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

/// Poses measured on the assembled arm.
pub fn default_waypoints() -> BTreeMap<Waypoint, Pose> {
    BTreeMap::from([
        (Waypoint::Rest, Pose::new(1400, 1500, 1300, 2000)),
        (Waypoint::Transport, Pose::new(500, 1500, 1500, 1800)),
        (Waypoint::PickAlign, Pose::new(500, 1500, 1300, 2000)),
        (Waypoint::PickLower, Pose::new(500, 2400, 500, 2000)),
        (Waypoint::PickExtend, Pose::new(500, 2400, 1000, 1500)),
        (Waypoint::PickGrip, Pose::new(500, 2400, 1000, 1800)),
        (Waypoint::RedAlign, Pose::new(1400, 1500, 1500, 1800)),
        (Waypoint::RedExtend, Pose::new(1400, 2400, 1500, 1800)),
        (Waypoint::RedLower, Pose::new(1400, 2400, 1000, 1800)),
        (Waypoint::BlueAlign, Pose::new(2400, 1500, 1500, 1800)),
        (Waypoint::BlueExtend, Pose::new(2400, 1500, 1000, 1800)),
        (Waypoint::BlueLower, Pose::new(2400, 2400, 1000, 1800)),
    ])
}

/// Immutable waypoint table. Only constructible through validation, so every waypoint is
/// present and every value lies inside its joint's range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointTable {
    poses: [Pose; Waypoint::COUNT],
}

impl WaypointTable {
    pub fn validated(
        waypoints: &BTreeMap<Waypoint, Pose>,
        ranges: &[JointRange; 4],
    ) -> Result<Self, ConfigError> {
        let mut poses = [Pose::new(0, 0, 0, 0); Waypoint::COUNT];
        for waypoint in Waypoint::ALL {
            let pose = waypoints
                .get(&waypoint)
                .ok_or(ConfigError::MissingWaypoint(waypoint))?;
            for (joint, value) in pose.targets() {
                let range = ranges[joint.index()];
                if !range.contains(value) {
                    return Err(ConfigError::PoseOutOfRange { waypoint, joint, value, range });
                }
            }
            poses[waypoint.index()] = *pose;
        }
        Ok(Self { poses })
    }

    pub fn get(&self, waypoint: Waypoint) -> &Pose {
        &self.poses[waypoint.index()]
    }
}
