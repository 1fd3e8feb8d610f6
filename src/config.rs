use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actuator::JointRange;
use crate::pose::{default_waypoints, Joint, Pose, Waypoint, WaypointTable};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{joint}: range {}..={}us is empty", .range.min_us, .range.max_us)]
    EmptyRange { joint: Joint, range: JointRange },
    #[error("ramp step size must be at least 1us")]
    ZeroStep,
    #[error("waypoint {0:?} is not defined")]
    MissingWaypoint(Waypoint),
    #[error("waypoint {waypoint:?}: {joint} = {value}us outside {}..={}us", .range.min_us, .range.max_us)]
    PoseOutOfRange { waypoint: Waypoint, joint: Joint, value: u16, range: JointRange },
    #[error("{joint}: position {value}us outside {}..={}us", .range.min_us, .range.max_us)]
    PositionOutOfRange { joint: Joint, value: u16, range: JointRange },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointConfig {
    pub range: JointRange,
    /// Pause after each ramp step. Heavier joints get longer pauses.
    pub step_delay_us: u64,
}

impl JointConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_micros(self.step_delay_us)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointsConfig {
    pub base: JointConfig,
    pub shoulder: JointConfig,
    pub elbow: JointConfig,
    pub gripper: JointConfig,
}

impl JointsConfig {
    pub fn get(&self, joint: Joint) -> &JointConfig {
        match joint {
            Joint::Base => &self.base,
            Joint::Shoulder => &self.shoulder,
            Joint::Elbow => &self.elbow,
            Joint::Gripper => &self.gripper,
        }
    }

    pub fn ranges(&self) -> [JointRange; 4] {
        Joint::ALL.map(|joint| self.get(joint).range)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GripperConfig {
    pub open_us: u16,
    pub closed_us: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub classify_retry_ms: u64,
    pub trigger_poll_ms: u64,
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn classify_retry(&self) -> Duration {
        Duration::from_millis(self.classify_retry_ms)
    }

    pub fn trigger_poll(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmConfig {
    pub joints: JointsConfig,
    pub step_us: u16,
    pub gripper: GripperConfig,
    pub timing: TimingConfig,
    pub waypoints: BTreeMap<Waypoint, Pose>,
}

impl Default for ArmConfig {
    fn default() -> Self {
        let servo_range = JointRange::new(500, 2500);
        Self {
            joints: JointsConfig {
                base: JointConfig { range: servo_range, step_delay_us: 800 },
                shoulder: JointConfig { range: servo_range, step_delay_us: 800 },
                elbow: JointConfig { range: servo_range, step_delay_us: 1200 },
                gripper: JointConfig { range: servo_range, step_delay_us: 1500 },
            },
            step_us: 10,
            gripper: GripperConfig { open_us: 1500, closed_us: 2000 },
            timing: TimingConfig {
                debounce_ms: 50,
                classify_retry_ms: 500,
                trigger_poll_ms: 10,
            },
            waypoints: default_waypoints(),
        }
    }
}

impl ArmConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: ArmConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that would otherwise surface as an out-of-range command mid-cycle, and
    /// returns the waypoint table.
    pub fn validate(&self) -> Result<WaypointTable, ConfigError> {
        for joint in Joint::ALL {
            let range = self.joints.get(joint).range;
            if range.min_us >= range.max_us {
                return Err(ConfigError::EmptyRange { joint, range });
            }
        }
        if self.step_us == 0 {
            return Err(ConfigError::ZeroStep);
        }
        let gripper_range = self.joints.gripper.range;
        for value in [self.gripper.open_us, self.gripper.closed_us] {
            if !gripper_range.contains(value) {
                return Err(ConfigError::PositionOutOfRange {
                    joint: Joint::Gripper,
                    value,
                    range: gripper_range,
                });
            }
        }
        WaypointTable::validated(&self.waypoints, &self.joints.ranges())
    }
}
