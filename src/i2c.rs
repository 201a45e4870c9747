//! PCA9685 register access over I2C
//!
//! Reference: PCA9685 datasheet Rev. 4, Section 7.3 (as DS)
//!
//! Every transaction the chip driver issues is a single write of the
//! register address followed by up to four data bytes. With the MODE1
//! auto-increment bit set, the chip advances the register pointer after
//! each data byte, so a channel's LOW/HIGH register pair is written in
//! one transaction.

use embedded_hal::blocking::i2c::Write;

/// Default 7-bit device address (all address pins tied low)
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Largest number of data bytes following the register address
pub const MAX_PAYLOAD: usize = 4;

/// Number of PWM output channels
pub const CHANNEL_COUNT: u8 = 16;

/// MODE1 register bits (DS 7.3.1)
pub mod mode1 {
    /// Register auto-increment
    pub const AI: u8 = 1 << 5;
    pub const SLEEP: u8 = 1 << 4;
}

/// MODE2 register bits (DS 7.3.2)
pub mod mode2 {
    /// Totem pole (push-pull) outputs instead of open drain
    pub const OUTDRV: u8 = 1 << 2;
}

/// Bit in a `LEDn_OFF_H` register forcing the output fully off (DS 7.3.3)
pub const FULL_OFF: u8 = 1 << 4;

/// Register write errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// More than [`MAX_PAYLOAD`] data bytes were supplied
    ExceedingPayload(usize),
    /// The register belongs to a channel the chip does not have
    ChannelOutOfRange(u8),
    /// The bus rejected the transaction
    Bus(E),
}

/// Registers written by the driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    Mode1,
    Mode2,
    /// Low byte of the off-count of the given channel
    LedOffL(u8),
    /// High byte of the off-count shared by all channels
    AllLedOffH,
    PreScale,
}

impl Register {
    /// Register address
    ///
    /// Channel registers only exist for channels `0..16`; larger indices
    /// wrap around and are rejected by [`write_register`].
    pub fn address(self) -> u8 {
        match self {
            Register::Mode1 => 0x00,
            Register::Mode2 => 0x01,
            // Each channel owns four consecutive registers starting at 0x06,
            // the off-count pair being the second half
            Register::LedOffL(channel) => channel.wrapping_mul(4).wrapping_add(0x08),
            Register::AllLedOffH => 0xFD,
            Register::PreScale => 0xFE,
        }
    }
}

/// Send `data` to `register` of the device at `addr`
///
/// Nothing is sent if `data` exceeds [`MAX_PAYLOAD`] bytes or `register`
/// does not exist.
pub fn write_register<I2C, E>(
    i2c: &mut I2C,
    addr: u8,
    register: Register,
    data: &[u8],
) -> Result<(), Error<E>>
where
    I2C: Write<Error = E>,
{
    let len = data.len();
    if len > MAX_PAYLOAD {
        return Err(Error::ExceedingPayload(len));
    }
    if let Register::LedOffL(channel) = register {
        if channel >= CHANNEL_COUNT {
            return Err(Error::ChannelOutOfRange(channel));
        }
    }

    // Register address goes first, followed by the data bytes
    let mut frame = [0u8; MAX_PAYLOAD + 1];
    frame[0] = register.address();
    frame[1..=len].copy_from_slice(data);

    i2c.write(addr, &frame[..=len]).map_err(Error::Bus)
}
