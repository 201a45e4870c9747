//! Commonly used units throughout the drivers

use micromath::F32Ext;

/// Which side of an accepted range a rejected value fell on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bound {
    TooLow,
    TooHigh,
}

/// 12-bit `Ticks`, the resolution of one PCA9685 PWM period
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticks12(u16);

impl Ticks12 {
    /// Largest count a 12-bit counter can hold
    pub const MAX: u16 = 0x0FFF;

    pub fn into_u16(self) -> u16 {
        // ensure that we ever only return the lower 12-bits set
        self.0 & Self::MAX
    }

    /// Break the count down into the (low, high) bytes of a register pair
    pub fn into_le_bytes(self) -> [u8; 2] {
        let val = self.into_u16();
        [(val & 0xff) as u8, (val >> 8) as u8]
    }
}

impl From<u16> for Ticks12 {
    fn from(val: u16) -> Self {
        Ticks12(val)
    }
}

impl From<[u8; 2]> for Ticks12 {
    fn from([low, high]: [u8; 2]) -> Self {
        Ticks12(((high as u16) << 8) | low as u16)
    }
}

impl PartialEq for Ticks12 {
    fn eq(&self, other: &Self) -> bool {
        self.into_u16() == other.into_u16()
    }
}

impl Eq for Ticks12 {}

/// Check that `value` lies within `[min, max]`
pub(crate) fn check_range(value: u16, min: u16, max: u16) -> Result<u16, Bound> {
    if value < min {
        Err(Bound::TooLow)
    } else if value > max {
        Err(Bound::TooHigh)
    } else {
        Ok(value)
    }
}

/// Scale a duty cycle in `[0.0, 1.0]` to a count out of `full_scale`
///
/// NaN is reported as [`Bound::TooLow`].
pub fn duty_cycle_to_count(duty_cycle: f32, full_scale: u16) -> Result<u16, Bound> {
    if duty_cycle.is_nan() || duty_cycle < 0.0 {
        return Err(Bound::TooLow);
    }
    if duty_cycle > 1.0 {
        return Err(Bound::TooHigh);
    }

    // duty_cycle <= 1.0, so the product never exceeds `full_scale`
    Ok(F32Ext::round(duty_cycle * full_scale as f32) as u16)
}
