//! PCA9685 16-channel PWM Controller
//!
//! Reference: PCA9685 datasheet Rev. 4 (as DS)
//!
//! The PCA9685 generates 16 PWM outputs with 12-bit resolution from an
//! internal 25 MHz oscillator and is programmed over I2C. This driver is
//! used for servos: callers work in normalized units (points or duty
//! cycle) and the driver maps them into a calibrated window of raw counts
//! that matches the actuator's usable travel.
//!
//! The driver keeps no hardware state of its own. The bus is borrowed for
//! the duration of each call and every call results in complete register
//! writes on the device.

use core::convert::TryFrom;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;
use micromath::F32Ext;

use crate::i2c::{self, mode1, mode2, Register, CHANNEL_COUNT, FULL_OFF};
use crate::log;
use crate::units::{self, Bound, Ticks12};

/// Frequency of the internal oscillator (DS 7.3.5)
pub const INTERNAL_OSCILLATOR_HZ: u32 = 25_000_000;

/// Lowest value the chip accepts in the PRE_SCALE register
pub const PRESCALE_MIN: u8 = 0x03;

/// Time the oscillator needs after leaving sleep mode (DS 7.3.1.1)
pub const OSCILLATOR_STABILIZATION_US: u16 = 500;

/// Steps of the initialization sequence, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStep {
    /// Disabling all outputs
    Reset,
    /// Entering sleep mode to unlock the prescaler
    Sleep,
    /// Programming the output configuration
    Mode2,
    /// Writing the oscillator prescaler
    Prescaler,
    /// Leaving sleep mode
    Wakeup,
}

/// PCA9685-specific errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus rejected a transaction
    Transport(E),
    /// The bus rejected a transaction of the initialization sequence
    InitStepFailed(InitStep, E),
    /// Channel index is not in `0..16`
    ChannelOutOfRange(u8),
    /// Mapped pulse count falls outside the calibrated window
    PulseCountOutOfRange(Bound),
    /// Duty cycle is not in `[0.0, 1.0]`
    DutyCycleOutOfRange(Bound),
    /// A register write carried more data bytes than one frame holds
    PayloadTooLarge(usize),
}

impl<E> From<i2c::Error<E>> for Error<E> {
    fn from(err: i2c::Error<E>) -> Self {
        match err {
            i2c::Error::Bus(e) => Error::Transport(e),
            i2c::Error::ChannelOutOfRange(channel) => Error::ChannelOutOfRange(channel),
            i2c::Error::ExceedingPayload(len) => Error::PayloadTooLarge(len),
        }
    }
}

/// Calibrated window of raw counts an actuator accepts
///
/// `min` maps to zero points, `max` maps to [`Calibration::range`] points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    min: u16,
    max: u16,
}

impl Calibration {
    /// Window for hobby servos: 0.8 ms to 2.2 ms within a 20 ms period
    pub const DEFAULT: Calibration = match Calibration::from_pulse_widths_us(800, 2200, 20_000) {
        Some(calibration) => calibration,
        None => Calibration { min: 0, max: Ticks12::MAX },
    };

    /// Create a window from raw counts
    ///
    /// Returns `None` unless `min < max <= 4095`.
    pub const fn new(min: u16, max: u16) -> Option<Self> {
        if min < max && max <= Ticks12::MAX {
            Some(Calibration { min, max })
        } else {
            None
        }
    }

    /// Create a window from pulse widths within a period, all in microseconds
    ///
    /// Counts are truncated towards zero.
    pub const fn from_pulse_widths_us(min_us: u32, max_us: u32, period_us: u32) -> Option<Self> {
        if period_us == 0 || min_us > max_us || max_us > period_us {
            return None;
        }
        let steps = Ticks12::MAX as u64 + 1;
        let min = min_us as u64 * steps / period_us as u64;
        let max = max_us as u64 * steps / period_us as u64;
        if max > Ticks12::MAX as u64 {
            return None;
        }
        Calibration::new(min as u16, max as u16)
    }

    pub const fn min(&self) -> u16 {
        self.min
    }

    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Number of points between `min` and `max`
    pub const fn range(&self) -> u16 {
        self.max - self.min
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Driver configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// 7-bit device address
    pub address: u8,
    /// Oscillator clock in Hz
    pub oscillator_hz: u32,
    /// Target PWM refresh frequency in Hz
    pub frequency_hz: f32,
    pub calibration: Calibration,
}

impl Config {
    // Datasheet frequencies run slightly fast on real parts; 46 Hz lands
    // close to the 50 Hz servos expect.
    pub const DEFAULT: Config = Config {
        address: i2c::DEFAULT_ADDRESS,
        oscillator_hz: INTERNAL_OSCILLATOR_HZ,
        frequency_hz: 46.0,
        calibration: Calibration::DEFAULT,
    };

    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub const fn with_oscillator(mut self, oscillator_hz: u32) -> Self {
        self.oscillator_hz = oscillator_hz;
        self
    }

    pub fn with_frequency(mut self, frequency_hz: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub const fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// PCA9685 driver
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pca9685 {
    config: Config,
}

impl Pca9685 {
    pub const fn new(config: Config) -> Self {
        Pca9685 { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// PRE_SCALE register value for the configured frequency (DS 7.3.5)
    ///
    /// `round(oscillator / (4096 * frequency)) - 1`, clamped to the range
    /// the chip accepts.
    pub fn prescale(&self) -> u8 {
        let steps = (Ticks12::MAX as f32 + 1.0) * self.config.frequency_hz;
        let divider = F32Ext::round(self.config.oscillator_hz as f32 / steps) - 1.0;

        // Float to int casts saturate, NaN becomes 0
        (divider as u32).clamp(PRESCALE_MIN as u32, u8::MAX as u32) as u8
    }

    /// Map `points` in `[0, range]` into the calibrated window
    pub fn map_points(&self, points: u16) -> Result<u16, Bound> {
        let calibration = &self.config.calibration;
        let (min, max) = (calibration.min as u32, calibration.max as u32);
        let range = calibration.range() as u32;

        let mapped = points as u32 * (max - min) / range + min;

        // Anything above the 16-bit range is above `max` as well
        let mapped = u16::try_from(mapped).unwrap_or(u16::MAX);
        units::check_range(mapped, calibration.min, calibration.max)
    }

    /// Bring the chip into a known state and start its oscillator
    ///
    /// Aborts on the first failed transaction, leaving the device in the
    /// state the preceding steps produced.
    pub fn initialize<I2C, E, D>(&self, i2c: &mut I2C, delay: &mut D) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E>,
        D: DelayUs<u16>,
    {
        let prescale = self.prescale();
        log::debug!("pca9685: initializing with prescaler {=u8}", prescale);

        let steps = [
            (InitStep::Reset, Register::AllLedOffH, FULL_OFF),
            // The prescaler can only be written while the oscillator is off
            (InitStep::Sleep, Register::Mode1, mode1::SLEEP | mode1::AI),
            (InitStep::Mode2, Register::Mode2, mode2::OUTDRV),
            (InitStep::Prescaler, Register::PreScale, prescale),
            (InitStep::Wakeup, Register::Mode1, mode1::AI),
        ];

        for (step, register, value) in steps.iter() {
            self.write(i2c, *register, &[*value]).map_err(|err| match err {
                i2c::Error::Bus(e) => {
                    log::error!("pca9685: initialization step {} failed", step);
                    Error::InitStepFailed(*step, e)
                }
                err => Error::from(err),
            })?;
        }

        delay.delay_us(OSCILLATOR_STABILIZATION_US);
        Ok(())
    }

    /// Force all 16 outputs off in a single transaction
    pub fn disable_all<I2C, E>(&self, i2c: &mut I2C) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E>,
    {
        self.write(i2c, Register::AllLedOffH, &[FULL_OFF])
            .map_err(Error::from)
    }

    /// Force the output of `channel` off
    pub fn disable_channel<I2C, E>(&self, i2c: &mut I2C, channel: u8) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E>,
    {
        check_channel(channel)?;
        self.write(i2c, Register::LedOffL(channel), &[0x00, FULL_OFF])
            .map_err(Error::from)
    }

    /// Set the pulse width of `channel` to `points` within the calibrated window
    pub fn set_pulse<I2C, E>(&self, i2c: &mut I2C, channel: u8, points: u16) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E>,
    {
        check_channel(channel)?;
        let count = self
            .map_points(points)
            .map_err(Error::PulseCountOutOfRange)?;

        log::debug!("pca9685: channel {=u8} off-count {=u16}", channel, count);
        self.write(
            i2c,
            Register::LedOffL(channel),
            &Ticks12::from(count).into_le_bytes(),
        )
        .map_err(Error::from)
    }

    /// Set the pulse width of `channel` as a fraction of the calibrated window
    pub fn set_duty_cycle<I2C, E>(
        &self,
        i2c: &mut I2C,
        channel: u8,
        duty_cycle: f32,
    ) -> Result<(), Error<E>>
    where
        I2C: Write<Error = E>,
    {
        check_channel(channel)?;
        let points = units::duty_cycle_to_count(duty_cycle, self.config.calibration.range())
            .map_err(Error::DutyCycleOutOfRange)?;
        self.set_pulse(i2c, channel, points)
    }

    fn write<I2C, E>(
        &self,
        i2c: &mut I2C,
        register: Register,
        data: &[u8],
    ) -> Result<(), i2c::Error<E>>
    where
        I2C: Write<Error = E>,
    {
        i2c::write_register(i2c, self.config.address, register, data)
    }
}

impl Default for Pca9685 {
    fn default() -> Self {
        Pca9685::new(Config::DEFAULT)
    }
}

fn check_channel<E>(channel: u8) -> Result<(), Error<E>> {
    if channel < CHANNEL_COUNT {
        Ok(())
    } else {
        Err(Error::ChannelOutOfRange(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BusError, FakeBus, FakeDelay};

    fn servo_window() -> Pca9685 {
        let calibration = Calibration::new(205, 615).unwrap();
        Pca9685::new(Config::DEFAULT.with_calibration(calibration))
    }

    #[test]
    fn default_calibration_matches_servo_pulse_widths() {
        assert_eq!(Calibration::DEFAULT.min(), 163);
        assert_eq!(Calibration::DEFAULT.max(), 450);
        assert_eq!(Calibration::DEFAULT.range(), 287);
    }

    #[test]
    fn calibration_rejects_empty_or_oversized_windows() {
        assert_eq!(Calibration::new(300, 300), None);
        assert_eq!(Calibration::new(400, 300), None);
        assert_eq!(Calibration::new(0, 4096), None);
        assert!(Calibration::new(0, 4095).is_some());
        assert_eq!(Calibration::from_pulse_widths_us(800, 2200, 0), None);
        assert_eq!(Calibration::from_pulse_widths_us(800, 30_000, 20_000), None);
    }

    #[test]
    fn prescaler_for_46_hz() {
        assert_eq!(Pca9685::default().prescale(), 132);
    }

    #[test]
    fn prescaler_is_clamped_to_accepted_range() {
        let fast = Pca9685::new(Config::DEFAULT.with_frequency(10_000.0));
        assert_eq!(fast.prescale(), PRESCALE_MIN);

        let slow = Pca9685::new(Config::DEFAULT.with_frequency(1.0));
        assert_eq!(slow.prescale(), 255);
    }

    #[test]
    fn initialize_runs_every_step_then_waits() {
        let mut bus = FakeBus::new();
        let mut delay = FakeDelay::default();

        Pca9685::default()
            .initialize(&mut bus, &mut delay)
            .unwrap();

        assert_eq!(
            bus.writes(),
            &[
                (0x40, vec![0xFD, 0x10]),
                (0x40, vec![0x00, 0x30]),
                (0x40, vec![0x01, 0x04]),
                (0x40, vec![0xFE, 0x84]),
                (0x40, vec![0x00, 0x20]),
            ]
        );
        assert!(delay.total_us >= 500);
    }

    #[test]
    fn initialize_reports_the_failing_step() {
        let expected = [
            InitStep::Reset,
            InitStep::Sleep,
            InitStep::Mode2,
            InitStep::Prescaler,
            InitStep::Wakeup,
        ];

        for (index, step) in expected.iter().enumerate() {
            let mut bus = FakeBus::failing_at(index);
            let mut delay = FakeDelay::default();

            let result = Pca9685::default().initialize(&mut bus, &mut delay);

            assert_eq!(result, Err(Error::InitStepFailed(*step, BusError::Nack)));
            // Nothing after the failing write is attempted
            assert_eq!(bus.writes().len(), index + 1);
            assert_eq!(delay.calls, 0);
        }
    }

    #[test]
    fn sleep_failure_stops_before_mode2() {
        let mut bus = FakeBus::failing_at(1);
        let mut delay = FakeDelay::default();

        let result = Pca9685::default().initialize(&mut bus, &mut delay);

        assert_eq!(result, Err(Error::InitStepFailed(InitStep::Sleep, BusError::Nack)));
        assert!(bus.writes().iter().all(|(_, bytes)| bytes[0] != 0x01 && bytes[0] != 0xFE));
    }

    #[test]
    fn uses_configured_address() {
        let mut bus = FakeBus::new();
        let driver = Pca9685::new(Config::DEFAULT.with_address(0x47));

        driver.disable_channel(&mut bus, 0).unwrap();

        assert_eq!(bus.writes(), &[(0x47, vec![0x08, 0x00, 0x10])]);
    }

    #[test]
    fn disable_channel_sets_full_off_bit() {
        let mut bus = FakeBus::new();

        Pca9685::default().disable_channel(&mut bus, 15).unwrap();

        assert_eq!(bus.writes(), &[(0x40, vec![0x44, 0x00, 0x10])]);
    }

    #[test]
    fn disable_all_uses_shared_register() {
        let mut bus = FakeBus::new();

        Pca9685::default().disable_all(&mut bus).unwrap();

        assert_eq!(bus.writes(), &[(0x40, vec![0xFD, 0x10])]);
    }

    #[test]
    fn channel_out_of_range_issues_no_transaction() {
        let driver = servo_window();
        let mut bus = FakeBus::new();

        for channel in [16u8, 17, 100, 255].iter().copied() {
            assert_eq!(
                driver.disable_channel(&mut bus, channel),
                Err(Error::ChannelOutOfRange(channel))
            );
            assert_eq!(
                driver.set_pulse(&mut bus, channel, 0),
                Err(Error::ChannelOutOfRange(channel))
            );
            assert_eq!(
                driver.set_duty_cycle(&mut bus, channel, 0.5),
                Err(Error::ChannelOutOfRange(channel))
            );
        }
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn duty_cycle_out_of_range_issues_no_transaction() {
        let driver = servo_window();
        let mut bus = FakeBus::new();

        assert_eq!(
            driver.set_duty_cycle(&mut bus, 0, -0.1),
            Err(Error::DutyCycleOutOfRange(Bound::TooLow))
        );
        assert_eq!(
            driver.set_duty_cycle(&mut bus, 0, 1.5),
            Err(Error::DutyCycleOutOfRange(Bound::TooHigh))
        );
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn points_boundaries_map_to_window_edges() {
        let driver = servo_window();

        assert_eq!(driver.map_points(0), Ok(205));
        assert_eq!(driver.map_points(410), Ok(615));
        assert_eq!(driver.map_points(411), Err(Bound::TooHigh));
        assert_eq!(driver.map_points(u16::MAX), Err(Bound::TooHigh));
    }

    #[test]
    fn points_above_range_are_rejected_without_writing() {
        let driver = servo_window();
        let mut bus = FakeBus::new();

        assert_eq!(
            driver.set_pulse(&mut bus, 0, 411),
            Err(Error::PulseCountOutOfRange(Bound::TooHigh))
        );
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn half_duty_cycle_on_channel_3() {
        let driver = servo_window();
        let mut bus = FakeBus::new();

        driver.set_duty_cycle(&mut bus, 3, 0.5).unwrap();

        assert_eq!(bus.writes(), &[(0x40, vec![0x14, 0x9A, 0x01])]);
    }

    #[test]
    fn written_count_decodes_to_mapped_duty_cycle() {
        let driver = servo_window();
        let range = driver.config().calibration.range() as f32;

        for step in 0..=20 {
            let duty_cycle = step as f32 / 20.0;
            let mut bus = FakeBus::new();
            driver.set_duty_cycle(&mut bus, 7, duty_cycle).unwrap();

            let bytes = &bus.writes()[0].1;
            assert_eq!(bytes[0], 0x08 + 7 * 4);
            let written = Ticks12::from([bytes[1], bytes[2]]).into_u16() as i32;
            let expected = driver.map_points((duty_cycle * range).round() as u16).unwrap() as i32;
            assert!((written - expected).abs() <= 1);
        }
    }

    #[test]
    fn repeated_set_pulse_is_identical() {
        let driver = servo_window();
        let mut bus = FakeBus::new();

        driver.set_pulse(&mut bus, 9, 123).unwrap();
        driver.set_pulse(&mut bus, 9, 123).unwrap();

        assert_eq!(bus.writes().len(), 2);
        assert_eq!(bus.writes()[0], bus.writes()[1]);
    }

    #[test]
    fn transport_failure_is_propagated() {
        let driver = servo_window();
        let mut bus = FakeBus::failing_at(0);

        assert_eq!(
            driver.set_pulse(&mut bus, 0, 10),
            Err(Error::Transport(BusError::Nack))
        );
    }

    #[test]
    fn register_errors_keep_their_meaning() {
        assert_eq!(
            Error::from(i2c::Error::Bus(BusError::Nack)),
            Error::Transport(BusError::Nack)
        );
        assert_eq!(
            Error::<BusError>::from(i2c::Error::ChannelOutOfRange(16)),
            Error::ChannelOutOfRange(16)
        );
        assert_eq!(
            Error::<BusError>::from(i2c::Error::ExceedingPayload(6)),
            Error::PayloadTooLarge(6)
        );
    }
}
