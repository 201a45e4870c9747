//! Traits and types commonly needed to drive the outputs
//!
//! ```
//! use servo_pwm::prelude::*;
//! ```

pub use embedded_hal::blocking::delay::DelayUs as _;
pub use embedded_hal::blocking::i2c::Write as _;
pub use embedded_hal::Pwm as _;

pub use crate::timer::Instance as _;
pub use crate::units::Bound;
