//! Ducted fan (EDF) motor driver
//!
//! An electronic speed controller for a ducted fan reads a single PWM
//! signal. The fan is a timer PWM output pinned to one channel, so every
//! operation only needs the timer.

use crate::timer::{self, Error, Instance, TimerPwm};

/// Ducted fan configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Timer channel the speed controller is wired to
    pub channel: u8,
    pub timer: timer::Config,
}

impl Config {
    pub const DEFAULT: Config = Config {
        channel: 0,
        timer: timer::Config::DEFAULT.with_channels(1),
    };

    /// Use `channel` of a timer with `timer.channels` outputs
    pub const fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub const fn with_timer(mut self, timer: timer::Config) -> Self {
        self.timer = timer;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Single-channel ducted fan driver
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuctedFan {
    pwm: TimerPwm,
    channel: u8,
}

impl DuctedFan {
    pub const fn new(config: Config) -> Self {
        DuctedFan {
            pwm: TimerPwm::new(config.timer),
            channel: config.channel,
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn start<T: Instance>(&self, timer: &mut T) -> Result<(), Error<T::Error>> {
        self.pwm.start(timer, self.channel)
    }

    pub fn stop<T: Instance>(&self, timer: &mut T) -> Result<(), Error<T::Error>> {
        self.pwm.stop(timer, self.channel)
    }

    pub fn set_count<T: Instance>(&self, timer: &mut T, count: u16) -> Result<(), Error<T::Error>> {
        self.pwm.set_count(timer, self.channel, count)
    }

    pub fn set_duty_cycle<T: Instance>(
        &self,
        timer: &mut T,
        duty_cycle: f32,
    ) -> Result<(), Error<T::Error>> {
        self.pwm.set_duty_cycle(timer, self.channel, duty_cycle)
    }

    /// Spin at the configured "on" duty cycle
    pub fn on<T: Instance>(&self, timer: &mut T) -> Result<(), Error<T::Error>> {
        self.pwm.on(timer, self.channel)
    }

    /// Idle the fan (zero duty cycle)
    pub fn off<T: Instance>(&self, timer: &mut T) -> Result<(), Error<T::Error>> {
        self.pwm.off(timer, self.channel)
    }
}

impl Default for DuctedFan {
    fn default() -> Self {
        DuctedFan::new(Config::DEFAULT)
    }
}
