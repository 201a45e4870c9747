//! Recording fakes for the hardware handles used in unit tests

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::Write;

use crate::timer::Instance;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusError {
    Nack,
}

/// I2C bus recording every attempted write, optionally failing one of them
#[derive(Default)]
pub struct FakeBus {
    writes: Vec<(u8, Vec<u8>)>,
    fail_at: Option<usize>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the write with the given (zero-based) index
    pub fn failing_at(index: usize) -> Self {
        Self {
            writes: Vec::new(),
            fail_at: Some(index),
        }
    }

    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }
}

impl Write for FakeBus {
    type Error = BusError;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        let index = self.writes.len();
        self.writes.push((addr, bytes.to_vec()));
        match self.fail_at {
            Some(fail_at) if fail_at == index => Err(BusError::Nack),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeDelay {
    pub total_us: u32,
    pub calls: usize,
}

impl DelayUs<u16> for FakeDelay {
    fn delay_us(&mut self, us: u16) {
        self.total_us += us as u32;
        self.calls += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOp {
    Enable(u8),
    Disable(u8),
    SetCompare(u8, u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejected;

/// Timer recording every request, optionally rejecting all of them
#[derive(Default)]
pub struct FakeTimer {
    pub ops: Vec<TimerOp>,
    pub reject: bool,
}

impl FakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            ops: Vec::new(),
            reject: true,
        }
    }

    fn record(&mut self, op: TimerOp) -> Result<(), Rejected> {
        self.ops.push(op);
        if self.reject {
            Err(Rejected)
        } else {
            Ok(())
        }
    }
}

impl Instance for FakeTimer {
    type Error = Rejected;

    fn enable(&mut self, channel: u8) -> Result<(), Rejected> {
        self.record(TimerOp::Enable(channel))
    }

    fn disable(&mut self, channel: u8) -> Result<(), Rejected> {
        self.record(TimerOp::Disable(channel))
    }

    fn set_compare(&mut self, channel: u8, count: u16) -> Result<(), Rejected> {
        self.record(TimerOp::SetCompare(channel, count))
    }
}
