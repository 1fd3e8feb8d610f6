use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arm_hal::{ArmHal, ColorSensor, HalError, HalResult, Pacer, ServoOutput, TriggerInput};
use crate::color::RgbSample;
use crate::pose::Joint;

/// Everything the simulated bench was asked to do, in order.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum HalRecord {
    Pulse(Joint, u16),
    Pause(Duration),
    ReadRgb(RgbSample),
    Trigger(bool),
}

/// Shared log written by every mock device so ordering across devices can be checked.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    records: Rc<RefCell<Vec<HalRecord>>>,
}

impl Journal {
    pub fn push(&self, record: HalRecord) {
        self.records.borrow_mut().push(record);
    }

    pub fn records(&self) -> Vec<HalRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    /// Pulses committed to `joint`, in order.
    pub fn pulses(&self, joint: Joint) -> Vec<u16> {
        self.records
            .borrow()
            .iter()
            .filter_map(|r| match r {
                HalRecord::Pulse(j, pulse) if *j == joint => Some(*pulse),
                _ => None,
            })
            .collect()
    }

    /// Joints in the order they were first touched after each change of joint. A pose move
    /// that changes every joint shows up as `[Base, Shoulder, Elbow, Gripper]`.
    pub fn joint_order(&self) -> Vec<Joint> {
        let mut order: Vec<Joint> = Vec::new();
        for record in self.records.borrow().iter() {
            if let HalRecord::Pulse(joint, _) = record {
                if order.last() != Some(joint) {
                    order.push(*joint);
                }
            }
        }
        order
    }
}

#[derive(Debug)]
pub struct MockServo {
    joint: Joint,
    journal: Journal,
}

impl MockServo {
    pub fn new(joint: Joint, journal: Journal) -> Self {
        Self { joint, journal }
    }
}

impl ServoOutput for MockServo {
    fn set_pulse_us(&mut self, pulse_us: u16) -> HalResult<()> {
        self.journal.push(HalRecord::Pulse(self.joint, pulse_us));
        Ok(())
    }
}

/// Records pauses without sleeping.
#[derive(Debug)]
pub struct MockPacer {
    journal: Journal,
}

impl MockPacer {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Pacer for MockPacer {
    fn pause(&mut self, duration: Duration) {
        self.journal.push(HalRecord::Pause(duration));
    }
}

pub struct MockColorSensor {
    samples: Box<dyn Iterator<Item = RgbSample>>,
    journal: Journal,
}

impl MockColorSensor {
    /// Returns `samples` in order, then fails.
    pub fn with_samples<I>(journal: Journal, samples: I) -> Self
    where
        I: IntoIterator<Item = RgbSample>,
        I::IntoIter: 'static,
    {
        Self { samples: Box::new(samples.into_iter()), journal }
    }

    /// Endless readings that are mostly clearly red or blue, with the occasional washed-out
    /// sample that should force a retry.
    pub fn random(journal: Journal, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let samples = std::iter::repeat_with(move || {
            let low = rng.gen_range(0..120);
            let high = rng.gen_range(180..1024);
            match rng.gen_range(0..10) {
                0..=3 => RgbSample::new(high, low, rng.gen_range(0..120)),
                4..=7 => RgbSample::new(low, rng.gen_range(0..120), high),
                _ => RgbSample::new(low, high, rng.gen_range(0..high)),
            }
        });
        Self { samples: Box::new(samples), journal }
    }
}

impl ColorSensor for MockColorSensor {
    fn read_rgb(&mut self) -> HalResult<RgbSample> {
        let sample = self
            .samples
            .next()
            .ok_or_else(|| HalError::DeviceNotConnected("mock color sensor ran out of samples".into()))?;
        trace!("read_rgb: {sample:?}");
        self.journal.push(HalRecord::ReadRgb(sample));
        Ok(sample)
    }
}

pub struct MockTrigger {
    levels: Box<dyn Iterator<Item = bool>>,
    journal: Journal,
}

impl MockTrigger {
    /// Reports `levels` in order, then stays released.
    pub fn with_script<I>(journal: Journal, levels: I) -> Self
    where
        I: IntoIterator<Item = bool>,
        I::IntoIter: 'static,
    {
        Self { levels: Box::new(levels.into_iter()), journal }
    }

    /// Endless presses: released for `idle_polls`, then held for `held_polls`.
    pub fn repeating_presses(journal: Journal, idle_polls: usize, held_polls: usize) -> Self {
        let press = std::iter::repeat(false)
            .take(idle_polls)
            .chain(std::iter::repeat(true).take(held_polls));
        let levels: Vec<bool> = press.collect();
        Self { levels: Box::new(levels.into_iter().cycle()), journal }
    }
}

impl TriggerInput for MockTrigger {
    fn is_asserted(&mut self) -> HalResult<bool> {
        let asserted = self.levels.next().unwrap_or(false);
        trace!("is_asserted: {asserted}");
        self.journal.push(HalRecord::Trigger(asserted));
        Ok(asserted)
    }
}

/// Simulated bench: every device writes to `journal`.
pub fn mock_hal(journal: &Journal, color_sensor: MockColorSensor, trigger: MockTrigger) -> ArmHal {
    ArmHal {
        servos: Joint::ALL.map(|joint| {
            Box::new(MockServo::new(joint, journal.clone())) as Box<dyn ServoOutput>
        }),
        color_sensor: Box::new(color_sensor),
        trigger: Box::new(trigger),
        pacer: Box::new(MockPacer::new(journal.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{classify, ColorCategory};

    #[test]
    fn test_trigger_script_then_released() {
        let journal = Journal::default();
        let mut trigger = MockTrigger::with_script(journal.clone(), [true, true]);
        assert!(trigger.is_asserted().unwrap());
        assert!(trigger.is_asserted().unwrap());
        assert!(!trigger.is_asserted().unwrap());
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn test_repeating_presses_cycle() {
        let mut trigger = MockTrigger::repeating_presses(Journal::default(), 2, 1);
        let levels: Vec<bool> = (0..6).map(|_| trigger.is_asserted().unwrap()).collect();
        assert_eq!(levels, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_exhausted_sensor_fails() {
        let mut sensor = MockColorSensor::with_samples(Journal::default(), [RgbSample::new(1, 0, 0)]);
        assert!(sensor.read_rgb().is_ok());
        assert!(matches!(sensor.read_rgb(), Err(HalError::DeviceNotConnected(_))));
    }

    #[test]
    fn test_random_sensor_is_reproducible_and_mostly_conclusive() {
        let mut a = MockColorSensor::random(Journal::default(), 7);
        let mut b = MockColorSensor::random(Journal::default(), 7);
        let mut conclusive = 0;
        for _ in 0..200 {
            let sample = a.read_rgb().unwrap();
            assert_eq!(sample, b.read_rgb().unwrap());
            if classify(sample) != ColorCategory::Indeterminate {
                conclusive += 1;
            }
        }
        assert!(conclusive > 100);
    }
}
