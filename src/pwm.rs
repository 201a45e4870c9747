//! `embedded_hal::Pwm` adapter
//!
//! Lets the timer PWM driver run on top of any HAL that implements the
//! (unproven) `embedded_hal::Pwm` trait with 16-bit duty values. The HAL's
//! channel type is opaque to this crate, so the adapter carries a table
//! mapping channel indices to HAL channels.

use embedded_hal::Pwm;

use crate::timer::{self, Instance};

/// Adapter-specific errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No HAL channel is mapped to this index
    UnmappedChannel(u8),
}

/// A HAL PWM peripheral together with its channel table
pub struct HalPwm<P: Pwm, const N: usize> {
    pwm: P,
    channels: [P::Channel; N],
}

impl<P, const N: usize> HalPwm<P, N>
where
    P: Pwm<Duty = u16>,
    P::Channel: Copy,
{
    /// Wrap `pwm`; index `i` drives `channels[i]`
    pub fn new(pwm: P, channels: [P::Channel; N]) -> Self {
        HalPwm { pwm, channels }
    }

    /// Full-scale duty value of the underlying peripheral
    pub fn max_duty(&self) -> u16 {
        self.pwm.get_max_duty()
    }

    /// Timer PWM configuration matching this peripheral's channel count and
    /// full-scale duty value
    pub fn config(&self) -> timer::Config {
        timer::Config::DEFAULT
            .with_channels(N as u8)
            .with_max_count(self.max_duty())
    }

    /// Return the raw interface to the underlying PWM peripheral
    pub fn free(self) -> P {
        self.pwm
    }

    fn channel(&self, index: u8) -> Result<P::Channel, Error> {
        self.channels
            .get(index as usize)
            .copied()
            .ok_or(Error::UnmappedChannel(index))
    }
}

impl<P, const N: usize> Instance for HalPwm<P, N>
where
    P: Pwm<Duty = u16>,
    P::Channel: Copy,
{
    type Error = Error;

    fn enable(&mut self, channel: u8) -> Result<(), Error> {
        let channel = self.channel(channel)?;
        self.pwm.enable(channel);
        Ok(())
    }

    fn disable(&mut self, channel: u8) -> Result<(), Error> {
        let channel = self.channel(channel)?;
        self.pwm.disable(channel);
        Ok(())
    }

    fn set_compare(&mut self, channel: u8, count: u16) -> Result<(), Error> {
        let channel = self.channel(channel)?;
        self.pwm.set_duty(channel, count);
        Ok(())
    }
}
