#![cfg_attr(not(test), no_std)]

pub mod fan;
pub mod i2c;
pub(crate) mod log;
pub mod pca9685;
pub mod prelude;
pub mod pwm;
pub mod timer;
pub mod units;

#[cfg(test)]
mod testing;

pub use crate::fan::DuctedFan;
pub use crate::pca9685::Pca9685;
pub use crate::pwm::HalPwm;
pub use crate::timer::TimerPwm;
