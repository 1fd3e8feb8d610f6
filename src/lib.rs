pub mod arm_hal;
pub mod arm_hal_mock;
pub mod hw;

pub mod actuator;
pub mod ramp;
pub mod pose;
pub mod config;
pub mod arm_controller;

pub mod color;
pub mod choreography;
pub mod telemetry;
pub mod sequencer;
