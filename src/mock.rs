//! A scripted bus emulating the controller side of the handshake, for
//! wire-level tests without hardware.

extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use core::convert::Infallible;

use crate::bus::{ApolloBus, Ctl};

/// One byte observed on the bus, classified by the ChipDataSelect level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wire {
    Cmd(u8),
    Data(u8),
}

/// Emulates the controller: Acknowledge asserts (goes low) when DataStrobe
/// falls and releases when it rises, completing one byte per strobe cycle.
pub(crate) struct MockBus {
    /// Every byte the host wrote, in order
    pub wire: Vec<Wire>,
    /// Bytes the controller will answer to reads
    pub reads: VecDeque<u8>,
    /// Bytes the controller will still acknowledge; `None` = unlimited
    pub ack_budget: Option<usize>,
    /// Rising edges seen on the WakeUp line
    pub wakeups: usize,
    /// Falling edges seen on the Reset line
    pub resets: usize,
    levels: [bool; 6],
    ack_asserted: bool,
    data: u8,
    data_fresh: bool,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            wire: Vec::new(),
            reads: VecDeque::new(),
            ack_budget: None,
            wakeups: 0,
            resets: 0,
            // idle: strobe and reset high, everything else low
            levels: [false, false, true, true, false, true],
            ack_asserted: false,
            data: 0,
            data_fresh: false,
        }
    }

    /// Current level of a control line without the trait's `&mut` ceremony
    pub fn level(&self, line: Ctl) -> bool {
        self.levels[index(line)]
    }

    /// The command bytes seen so far
    pub fn cmds(&self) -> Vec<u8> {
        self.wire
            .iter()
            .filter_map(|w| match w {
                Wire::Cmd(c) => Some(*c),
                Wire::Data(_) => None,
            })
            .collect()
    }

    fn may_ack(&self) -> bool {
        self.ack_budget.map_or(true, |left| left > 0)
    }

    fn byte_done(&mut self) {
        if let Some(left) = self.ack_budget.as_mut() {
            *left -= 1;
        }
        if self.data_fresh && !self.level(Ctl::ReadWrite) {
            let byte = self.data;
            if self.level(Ctl::ChipDataSelect) {
                self.wire.push(Wire::Cmd(byte));
            } else {
                self.wire.push(Wire::Data(byte));
            }
            self.data_fresh = false;
        }
    }
}

fn index(line: Ctl) -> usize {
    match line {
        Ctl::ChipDataSelect => 0,
        Ctl::ReadWrite => 1,
        Ctl::DataStrobe => 2,
        Ctl::Acknowledge => 3,
        Ctl::WakeUp => 4,
        Ctl::Reset => 5,
    }
}

impl ApolloBus for MockBus {
    type Error = Infallible;

    fn set_ctl(&mut self, line: Ctl, high: bool) -> Result<(), Self::Error> {
        let was = self.levels[index(line)];
        self.levels[index(line)] = high;
        match line {
            Ctl::DataStrobe => {
                if was && !high && self.may_ack() {
                    self.ack_asserted = true;
                } else if !was && high && self.ack_asserted {
                    self.ack_asserted = false;
                    self.byte_done();
                }
            }
            Ctl::WakeUp if !was && high => self.wakeups += 1,
            Ctl::Reset if was && !high => self.resets += 1,
            _ => {}
        }
        Ok(())
    }

    fn ctl(&mut self, line: Ctl) -> Result<bool, Self::Error> {
        if line == Ctl::Acknowledge {
            Ok(!self.ack_asserted)
        } else {
            Ok(self.levels[index(line)])
        }
    }

    fn write_data(&mut self, value: u8) -> Result<(), Self::Error> {
        self.data = value;
        self.data_fresh = true;
        Ok(())
    }

    fn read_data(&mut self) -> Result<u8, Self::Error> {
        Ok(self.reads.pop_front().unwrap_or(0xFF))
    }
}
