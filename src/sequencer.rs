use std::convert::Infallible;

use log::{debug, info};
use serde::Serialize;

use crate::arm_controller::ArmController;
use crate::arm_hal::{ArmHal, HalResult, Pacer, TriggerInput};
use crate::choreography::{perform, placement, PICK};
use crate::color::{Bin, ColorClassifier};
use crate::config::{ArmConfig, ConfigError, TimingConfig};
use crate::pose::{Waypoint, WaypointTable};
use crate::telemetry::{EventSink, LogSink, SequencerEvent};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize)]
pub enum SequencerState {
    Idle,
    Debouncing,
    Picking,
    Classifying,
    Placing(Bin),
    Resetting,
}

/// Top-level pick, classify, place, reset cycle. Owns every device, so nothing else can command
/// the arm while a cycle is in flight.
pub struct PickPlaceSequencer {
    arm: ArmController,
    waypoints: WaypointTable,
    classifier: ColorClassifier,
    trigger: Box<dyn TriggerInput>,
    pacer: Box<dyn Pacer>,
    timing: TimingConfig,
    sink: Box<dyn EventSink>,
    state: SequencerState,
    homed: bool,
    retries: u32,
    placed: Option<Bin>,
    cycles: u64,
}

impl PickPlaceSequencer {
    /// Validates `config` and takes ownership of the board. The arm is assumed to be at rest;
    /// nothing moves until [`PickPlaceSequencer::start`].
    pub fn new(config: &ArmConfig, hal: ArmHal) -> Result<Self, ConfigError> {
        let waypoints = config.validate()?;
        let ArmHal { servos, color_sensor, trigger, pacer } = hal;
        let arm = ArmController::new(config, servos, waypoints.get(Waypoint::Rest))?;
        Ok(Self {
            arm,
            waypoints,
            classifier: ColorClassifier::new(color_sensor),
            trigger,
            pacer,
            timing: config.timing.clone(),
            sink: Box::new(LogSink),
            state: SequencerState::Idle,
            homed: false,
            retries: 0,
            placed: None,
            cycles: 0,
        })
    }

    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = sink;
    }

    /// Snaps every joint to the rest pose, then ramps to the transport pose and enters Idle.
    /// Calling it again mid-cycle abandons the cycle and homes from rest.
    pub fn start(&mut self) -> HalResult<()> {
        info!("Commanding rest pose...");
        self.arm.snap_to(self.waypoints.get(Waypoint::Rest))?;
        info!("Homing to transport pose...");
        self.arm
            .move_to_pose(self.waypoints.get(Waypoint::Transport), self.pacer.as_mut())?;
        self.homed = true;
        self.placed = None;
        self.retries = 0;
        self.state = SequencerState::Idle;
        info!("Ready, waiting for trigger");
        Ok(())
    }

    /// Does the work of the current state and moves to the next one. Idle and Classifying do a
    /// single poll or read per call; every other state runs to completion.
    pub fn step(&mut self) -> HalResult<SequencerState> {
        if !self.homed {
            self.start()?;
        }
        let next = match self.state {
            SequencerState::Idle => self.poll_trigger()?,
            SequencerState::Debouncing => self.debounce()?,
            SequencerState::Picking => {
                perform(&mut self.arm, &self.waypoints, PICK, self.pacer.as_mut())?;
                SequencerState::Classifying
            }
            SequencerState::Classifying => self.classify()?,
            SequencerState::Placing(bin) => {
                perform(&mut self.arm, &self.waypoints, placement(bin), self.pacer.as_mut())?;
                self.placed = Some(bin);
                SequencerState::Resetting
            }
            SequencerState::Resetting => self.reset()?,
        };
        self.transition(next);
        Ok(next)
    }

    /// Cycles forever. Only a hardware failure gets out of here.
    pub fn run(&mut self) -> HalResult<Infallible> {
        loop {
            self.step()?;
        }
    }

    /// Steps until `cycles` more full cycles have completed.
    pub fn run_cycles(&mut self, cycles: u64) -> HalResult<()> {
        let target = self.cycles + cycles;
        while self.cycles < target {
            self.step()?;
        }
        Ok(())
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn arm(&self) -> &ArmController {
        &self.arm
    }

    fn poll_trigger(&mut self) -> HalResult<SequencerState> {
        if self.trigger.is_asserted()? {
            return Ok(SequencerState::Debouncing);
        }
        self.pacer.pause(self.timing.trigger_poll());
        Ok(SequencerState::Idle)
    }

    fn debounce(&mut self) -> HalResult<SequencerState> {
        self.pacer.pause(self.timing.debounce());
        if self.trigger.is_asserted()? {
            Ok(SequencerState::Picking)
        } else {
            self.sink.publish(&SequencerEvent::FalseTrigger);
            Ok(SequencerState::Idle)
        }
    }

    fn classify(&mut self) -> HalResult<SequencerState> {
        let reading = self.classifier.read()?;
        self.sink.publish(&SequencerEvent::ColorSampled { reading });
        match reading.category.bin() {
            Some(bin) => {
                self.retries = 0;
                Ok(SequencerState::Placing(bin))
            }
            None => {
                // Unbounded on purpose: the object stays put until its color is legible.
                self.retries += 1;
                self.sink
                    .publish(&SequencerEvent::ClassificationRetry { attempt: self.retries });
                self.pacer.pause(self.timing.classify_retry());
                Ok(SequencerState::Classifying)
            }
        }
    }

    fn reset(&mut self) -> HalResult<SequencerState> {
        self.arm
            .move_to_pose(self.waypoints.get(Waypoint::Rest), self.pacer.as_mut())?;
        debug!("Waiting for trigger release");
        while self.trigger.is_asserted()? {
            self.pacer.pause(self.timing.trigger_poll());
        }
        self.cycles += 1;
        if let Some(bin) = self.placed.take() {
            self.sink
                .publish(&SequencerEvent::CycleCompleted { cycle: self.cycles, bin });
        }
        Ok(SequencerState::Idle)
    }

    fn transition(&mut self, next: SequencerState) {
        if next != self.state {
            self.sink
                .publish(&SequencerEvent::StateChanged { from: self.state, to: next });
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::arm_hal_mock::{mock_hal, HalRecord, Journal, MockColorSensor, MockTrigger};
    use crate::color::RgbSample;
    use crate::pose::{Joint, Pose};
    use crate::telemetry::RecordingSink;

    struct Bench {
        journal: Journal,
        events: RecordingSink,
        sequencer: PickPlaceSequencer,
    }

    fn bench(levels: Vec<bool>, samples: Vec<RgbSample>) -> Bench {
        let journal = Journal::default();
        let hal = mock_hal(
            &journal,
            MockColorSensor::with_samples(journal.clone(), samples),
            MockTrigger::with_script(journal.clone(), levels));
        let mut sequencer = PickPlaceSequencer::new(&ArmConfig::default(), hal).unwrap();
        let events = RecordingSink::default();
        sequencer.set_event_sink(Box::new(events.clone()));
        sequencer.start().unwrap();
        journal.clear();
        Bench { journal, events, sequencer }
    }

    /// Tracked pose at every settle pause, replayed from the commanded pulses.
    fn settled_poses(journal: &Journal, start: Pose) -> Vec<Pose> {
        let mut pose = start;
        let mut settled = Vec::new();
        for record in journal.records() {
            match record {
                HalRecord::Pulse(joint, pulse_us) => pose.set(joint, pulse_us),
                HalRecord::Pause(d) if d >= Duration::from_millis(100) => settled.push(pose),
                _ => {}
            }
        }
        settled
    }

    fn with_gripper(pose: &Pose, gripper_us: u16) -> Pose {
        Pose { gripper: gripper_us, ..*pose }
    }

    fn long_pauses(journal: &Journal) -> Vec<u64> {
        journal
            .records()
            .into_iter()
            .filter_map(|r| match r {
                HalRecord::Pause(d) if d >= Duration::from_millis(100) => Some(d.as_millis() as u64),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_snaps_to_rest_then_ramps_to_transport() {
        let journal = Journal::default();
        let hal = mock_hal(
            &journal,
            MockColorSensor::with_samples(journal.clone(), Vec::new()),
            MockTrigger::with_script(journal.clone(), Vec::new()));
        let config = ArmConfig::default();
        let mut sequencer = PickPlaceSequencer::new(&config, hal).unwrap();
        assert!(journal.is_empty());

        sequencer.start().unwrap();

        let records = journal.records();
        assert_eq!(records[..4], [
            HalRecord::Pulse(Joint::Base, 1400),
            HalRecord::Pulse(Joint::Shoulder, 1500),
            HalRecord::Pulse(Joint::Elbow, 1300),
            HalRecord::Pulse(Joint::Gripper, 2000),
        ]);
        assert_eq!(records[4], HalRecord::Pulse(Joint::Base, 1390));
        assert_eq!(sequencer.arm().current_pose(), config.waypoints[&Waypoint::Transport]);
        assert_eq!(sequencer.state(), SequencerState::Idle);
    }

    #[test]
    fn test_red_cycle_end_to_end() {
        let mut b = bench(vec![true, true, false], vec![RgbSample::new(10, 5, 5)]);

        b.sequencer.run_cycles(1).unwrap();

        assert_eq!(b.events.states(), vec![
            SequencerState::Debouncing,
            SequencerState::Picking,
            SequencerState::Classifying,
            SequencerState::Placing(Bin::Red),
            SequencerState::Resetting,
            SequencerState::Idle,
        ]);
        // Pick settles, then red placement settles. No retry pause in between.
        assert_eq!(long_pauses(&b.journal), vec![1000, 1000, 500, 1000, 500, 1000, 1000, 1000, 1000]);
        assert!(!b.journal.pulses(Joint::Base).contains(&2400));
        assert_eq!(b.sequencer.arm().current_pose(), ArmConfig::default().waypoints[&Waypoint::Rest]);
        assert_eq!(b.sequencer.cycles(), 1);
        assert!(b
            .events
            .events()
            .contains(&SequencerEvent::CycleCompleted { cycle: 1, bin: Bin::Red }));
    }

    #[test]
    fn test_cycle_visits_waypoints_in_order() {
        let config = ArmConfig::default();
        let table = config.validate().unwrap();
        let open = config.gripper.open_us;
        let mut b = bench(vec![true, true, false], vec![RgbSample::new(10, 5, 5)]);

        b.sequencer.run_cycles(1).unwrap();

        let poses = settled_poses(&b.journal, *table.get(Waypoint::Transport));
        assert_eq!(poses, vec![
            *table.get(Waypoint::PickAlign),
            *table.get(Waypoint::PickLower),
            with_gripper(table.get(Waypoint::PickLower), open),
            *table.get(Waypoint::PickExtend),
            *table.get(Waypoint::PickGrip),
            *table.get(Waypoint::RedAlign),
            *table.get(Waypoint::RedExtend),
            *table.get(Waypoint::RedLower),
            with_gripper(table.get(Waypoint::RedLower), open),
        ]);
        assert_eq!(b.sequencer.arm().current_pose(), *table.get(Waypoint::Rest));
    }

    #[test]
    fn test_blue_cycle_visits_blue_waypoints_in_order() {
        let config = ArmConfig::default();
        let table = config.validate().unwrap();
        let mut b = bench(vec![true, true, false], vec![RgbSample::new(20, 5, 180)]);

        b.sequencer.run_cycles(1).unwrap();

        let poses = settled_poses(&b.journal, *table.get(Waypoint::Transport));
        assert_eq!(poses[5..], [
            *table.get(Waypoint::BlueAlign),
            *table.get(Waypoint::BlueExtend),
            *table.get(Waypoint::BlueLower),
            with_gripper(table.get(Waypoint::BlueLower), config.gripper.open_us),
        ]);
    }

    #[test]
    fn test_restart_mid_cycle_snaps_back_to_rest() {
        let table = ArmConfig::default().validate().unwrap();
        let mut b = bench(vec![true, true], vec![RgbSample::new(200, 50, 50)]);
        while b.sequencer.state() != SequencerState::Resetting {
            b.sequencer.step().unwrap();
        }
        assert_ne!(b.sequencer.arm().current_pose(), *table.get(Waypoint::Rest));
        b.journal.clear();

        b.sequencer.start().unwrap();

        let rest = table.get(Waypoint::Rest);
        assert_eq!(b.journal.records()[..4], [
            HalRecord::Pulse(Joint::Base, rest.base),
            HalRecord::Pulse(Joint::Shoulder, rest.shoulder),
            HalRecord::Pulse(Joint::Elbow, rest.elbow),
            HalRecord::Pulse(Joint::Gripper, rest.gripper),
        ]);
        assert_eq!(b.sequencer.arm().current_pose(), *table.get(Waypoint::Transport));
        assert_eq!(b.sequencer.state(), SequencerState::Idle);
    }

    #[test]
    fn test_blue_after_exactly_one_retry() {
        let mut b = bench(
            vec![true, true, false],
            vec![RgbSample::new(50, 200, 190), RgbSample::new(20, 5, 180)]);

        b.sequencer.run_cycles(1).unwrap();

        let records = b.journal.records();
        let reads: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, HalRecord::ReadRgb(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(reads.len(), 2);
        assert_eq!(records[reads[0] + 1..reads[1]], [HalRecord::Pause(Duration::from_millis(500))]);

        let retries: Vec<SequencerEvent> = b
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, SequencerEvent::ClassificationRetry { .. }))
            .collect();
        assert_eq!(retries, vec![SequencerEvent::ClassificationRetry { attempt: 1 }]);
        assert!(b.events.states().contains(&SequencerState::Placing(Bin::Blue)));
        assert!(b.journal.pulses(Joint::Base).contains(&2400));
    }

    #[test]
    fn test_false_trigger_returns_to_idle() {
        let mut b = bench(vec![true, false], vec![]);

        assert_eq!(b.sequencer.step().unwrap(), SequencerState::Debouncing);
        assert_eq!(b.sequencer.step().unwrap(), SequencerState::Idle);

        assert_eq!(b.events.states(), vec![SequencerState::Debouncing, SequencerState::Idle]);
        assert!(b.events.events().contains(&SequencerEvent::FalseTrigger));
        assert_eq!(b.journal.records(), vec![
            HalRecord::Trigger(true),
            HalRecord::Pause(Duration::from_millis(50)),
            HalRecord::Trigger(false),
        ]);
    }

    #[test]
    fn test_idle_polls_once_per_step() {
        let mut b = bench(vec![false, false], vec![]);

        assert_eq!(b.sequencer.step().unwrap(), SequencerState::Idle);

        assert_eq!(b.journal.records(), vec![
            HalRecord::Trigger(false),
            HalRecord::Pause(Duration::from_millis(10)),
        ]);
        assert!(b.events.events().is_empty());
    }

    #[test]
    fn test_reset_blocks_until_trigger_released() {
        let mut b = bench(vec![true, true, true, true, true, false], vec![RgbSample::new(200, 50, 50)]);
        while b.sequencer.state() != SequencerState::Resetting {
            b.sequencer.step().unwrap();
        }
        b.journal.clear();

        assert_eq!(b.sequencer.step().unwrap(), SequencerState::Idle);

        let records = b.journal.records();
        let first_poll = records
            .iter()
            .position(|r| matches!(r, HalRecord::Trigger(_)))
            .unwrap();
        assert!(records[..first_poll].iter().any(|r| matches!(r, HalRecord::Pulse(..))));
        assert_eq!(records[first_poll..], [
            HalRecord::Trigger(true),
            HalRecord::Pause(Duration::from_millis(10)),
            HalRecord::Trigger(true),
            HalRecord::Pause(Duration::from_millis(10)),
            HalRecord::Trigger(true),
            HalRecord::Pause(Duration::from_millis(10)),
            HalRecord::Trigger(false),
        ]);
        assert_eq!(b.sequencer.cycles(), 1);
    }

    #[test]
    fn test_many_cycles_on_random_bench() {
        let journal = Journal::default();
        let hal = mock_hal(
            &journal,
            MockColorSensor::random(journal.clone(), 42),
            MockTrigger::repeating_presses(journal.clone(), 3, 2));
        let mut sequencer = PickPlaceSequencer::new(&ArmConfig::default(), hal).unwrap();
        let events = RecordingSink::default();
        sequencer.set_event_sink(Box::new(events.clone()));

        sequencer.run_cycles(5).unwrap();

        assert_eq!(sequencer.cycles(), 5);
        assert_eq!(sequencer.state(), SequencerState::Idle);
        let completed = events
            .events()
            .into_iter()
            .filter(|e| matches!(e, SequencerEvent::CycleCompleted { .. }))
            .count();
        assert_eq!(completed, 5);
    }

    #[test]
    fn test_invalid_config_fails_before_touching_hardware() {
        let journal = Journal::default();
        let hal = mock_hal(
            &journal,
            MockColorSensor::with_samples(journal.clone(), Vec::new()),
            MockTrigger::with_script(journal.clone(), Vec::new()));
        let mut config = ArmConfig::default();
        config.waypoints.remove(&Waypoint::RedLower);

        let result = PickPlaceSequencer::new(&config, hal);

        assert!(matches!(result, Err(ConfigError::MissingWaypoint(Waypoint::RedLower))));
        assert!(journal.is_empty());
    }
}
