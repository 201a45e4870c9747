//! Timer PWM Functionality
//!
//! Drives PWM outputs generated directly by a hardware timer: each output
//! channel owns a compare register, and the output is active while the
//! timer counter is below the compare value.
//!
//! The timer peripheral itself (clock, period, pin routing) is configured by
//! the caller. This driver only enables/disables channel outputs and writes
//! compare values, validating every input before the timer is touched.
//!
//! The timer is borrowed per call through the [`Instance`] trait;
//! [`crate::pwm::HalPwm`] implements it for any `embedded_hal::Pwm`.

use crate::log;
use crate::units::{self, Bound};

/// Capability to drive the compare channels of a running timer
pub trait Instance {
    /// Error reported when the peripheral rejects a request
    type Error;

    /// Enable the compare output of `channel`
    fn enable(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Disable the compare output of `channel`
    fn disable(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Load a new compare value for `channel`
    fn set_compare(&mut self, channel: u8, count: u16) -> Result<(), Self::Error>;
}

/// Timer PWM errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The timer refused to enable the channel output
    StartFailed(E),
    /// The timer refused to disable the channel output
    StopFailed(E),
    /// The timer refused the new compare value
    SetFailed(E),
    /// Channel index is not below the configured channel count
    ChannelOutOfRange(u8),
    /// Compare value is outside `[min_count, max_count]`
    PulseCountOutOfRange(Bound),
    /// Duty cycle is not in `[0.0, 1.0]`
    DutyCycleOutOfRange(Bound),
}

/// Timer PWM configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Number of compare channels driven
    pub channels: u8,
    /// Lowest accepted compare value
    pub min_count: u16,
    /// Highest accepted compare value, also the full-scale count for duty cycles
    pub max_count: u16,
    /// Duty cycle applied by [`TimerPwm::on`]
    pub on_duty_cycle: f32,
}

impl Config {
    pub const DEFAULT: Config = Config {
        channels: 3,
        min_count: 0,
        max_count: 4095,
        on_duty_cycle: 0.7,
    };

    pub const fn with_channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    pub const fn with_min_count(mut self, min_count: u16) -> Self {
        self.min_count = min_count;
        self
    }

    /// Use `max_count` as full scale, e.g. the timer's auto-reload value
    pub const fn with_max_count(mut self, max_count: u16) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_on_duty_cycle(mut self, on_duty_cycle: f32) -> Self {
        self.on_duty_cycle = on_duty_cycle;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Multi-channel timer PWM driver
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimerPwm {
    config: Config,
}

impl TimerPwm {
    pub const fn new(config: Config) -> Self {
        TimerPwm { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start generating the PWM signal on `channel`
    pub fn start<T: Instance>(&self, timer: &mut T, channel: u8) -> Result<(), Error<T::Error>> {
        self.check_channel(channel)?;
        timer.enable(channel).map_err(|e| {
            log::warn!("timer: channel {=u8} refused to start", channel);
            Error::StartFailed(e)
        })
    }

    /// Stop generating the PWM signal on `channel`
    pub fn stop<T: Instance>(&self, timer: &mut T, channel: u8) -> Result<(), Error<T::Error>> {
        self.check_channel(channel)?;
        timer.disable(channel).map_err(|e| {
            log::warn!("timer: channel {=u8} refused to stop", channel);
            Error::StopFailed(e)
        })
    }

    /// Write a raw compare value to `channel`
    pub fn set_count<T: Instance>(
        &self,
        timer: &mut T,
        channel: u8,
        count: u16,
    ) -> Result<(), Error<T::Error>> {
        self.check_channel(channel)?;
        let count = units::check_range(count, self.config.min_count, self.config.max_count)
            .map_err(Error::PulseCountOutOfRange)?;

        log::debug!("timer: channel {=u8} compare {=u16}", channel, count);
        timer.set_compare(channel, count).map_err(|e| {
            log::warn!("timer: channel {=u8} refused compare value", channel);
            Error::SetFailed(e)
        })
    }

    /// Set `channel` to `duty_cycle` of the full-scale count
    pub fn set_duty_cycle<T: Instance>(
        &self,
        timer: &mut T,
        channel: u8,
        duty_cycle: f32,
    ) -> Result<(), Error<T::Error>> {
        self.check_channel(channel)?;
        let count = units::duty_cycle_to_count(duty_cycle, self.config.max_count)
            .map_err(Error::DutyCycleOutOfRange)?;
        self.set_count(timer, channel, count)
    }

    /// Drive `channel` at the configured "on" duty cycle
    pub fn on<T: Instance>(&self, timer: &mut T, channel: u8) -> Result<(), Error<T::Error>> {
        self.set_duty_cycle(timer, channel, self.config.on_duty_cycle)
    }

    /// Drive `channel` at a zero duty cycle, leaving its output enabled
    pub fn off<T: Instance>(&self, timer: &mut T, channel: u8) -> Result<(), Error<T::Error>> {
        self.set_duty_cycle(timer, channel, 0.0)
    }

    fn check_channel<E>(&self, channel: u8) -> Result<(), Error<E>> {
        if channel < self.config.channels {
            Ok(())
        } else {
            Err(Error::ChannelOutOfRange(channel))
        }
    }
}

impl Default for TimerPwm {
    fn default() -> Self {
        TimerPwm::new(Config::DEFAULT)
    }
}
