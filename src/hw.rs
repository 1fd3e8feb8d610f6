//! Adapters from `embedded-hal` peripherals to the arm HAL traits.

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::trace;

use crate::arm_hal::{HalError, HalResult, Pacer, ServoOutput, TriggerInput};

/// Hobby servos expect one pulse every 20ms (50Hz).
pub const SERVO_FRAME_US: u32 = 20_000;

/// Drives a servo from any PWM channel already configured for a 50Hz frame.
pub struct PwmServo<P> {
    channel: P,
}

impl<P: SetDutyCycle> PwmServo<P> {
    pub fn new(channel: P) -> Self {
        Self { channel }
    }

    /// Duty cycle corresponding to a `pulse_us` wide pulse, clamped to a full frame.
    pub fn duty_for(&self, pulse_us: u16) -> u16 {
        let max = u32::from(self.channel.max_duty_cycle());
        let duty = u32::from(pulse_us).min(SERVO_FRAME_US) * max / SERVO_FRAME_US;
        duty as u16
    }

    pub fn into_inner(self) -> P {
        self.channel
    }
}

impl<P: SetDutyCycle> ServoOutput for PwmServo<P> {
    fn set_pulse_us(&mut self, pulse_us: u16) -> HalResult<()> {
        let duty = self.duty_for(pulse_us);
        trace!("pulse {pulse_us}us => duty {duty}");
        self.channel
            .set_duty_cycle(duty)
            .map_err(|e| HalError::InternalError(format!("pwm: {:?}", pwm::Error::kind(&e))))
    }
}

/// Push button wired to ground with a pull-up: pressed reads low.
pub struct ActiveLowButton<P> {
    pin: P,
}

impl<P: InputPin> ActiveLowButton<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> TriggerInput for ActiveLowButton<P> {
    fn is_asserted(&mut self) -> HalResult<bool> {
        self.pin
            .is_low()
            .map_err(|e| HalError::DeviceNotConnected(format!("trigger: {:?}", digital::Error::kind(&e))))
    }
}

/// Paces with a board delay provider.
pub struct DelayPacer<D> {
    delay: D,
}

impl<D: DelayNs> DelayPacer<D> {
    pub fn new(delay: D) -> Self {
        Self { delay }
    }
}

impl<D: DelayNs> Pacer for DelayPacer<D> {
    fn pause(&mut self, duration: Duration) {
        let micros = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(micros);
    }
}

/// Paces by sleeping the current thread.
#[derive(Debug, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}
