//! Byte transport and command framing on top of [`ApolloBus`].
//!
//! The controller has no clock: every byte is qualified by a DataStrobe pulse
//! and flow-controlled by the Acknowledge line, so this module is the single
//! place where pin sequencing and handshake timing are enforced. All higher
//! layers move every byte through [`ApolloInterface::send_byte`] /
//! [`ApolloInterface::read_byte`].

use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;

use crate::bus::{ApolloBus, Ctl};
use crate::error::{AckWait, ErrorKind};
use crate::log::warn_log;
use crate::traits::Command;

/// What to do when the controller misses an acknowledge deadline
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Fail the whole sequence with [`ErrorKind::AckTimeout`].
    #[default]
    Abort,
    /// Log and keep going, like the original EB600/lBook drivers did.
    ///
    /// A stuck bus then desynchronizes the remainder of a multi-byte
    /// command; only useful for bring-up debugging.
    Continue,
}

/// Transport tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Poll budget per acknowledge edge, at roughly one poll per microsecond
    pub ack_retries: u32,
    /// Recovery policy on a missed acknowledge
    pub ack_policy: AckPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            // ~5 ms, far beyond the worst observed acknowledge latency
            ack_retries: 5_000,
            ack_policy: AckPolicy::default(),
        }
    }
}

/// The wire interface of the Apollo controller
pub(crate) struct ApolloInterface<BUS, DELAY> {
    bus: BUS,
    config: TransportConfig,
    _delay: PhantomData<DELAY>,
}

impl<BUS, DELAY> ApolloInterface<BUS, DELAY>
where
    BUS: ApolloBus,
    DELAY: DelayNs,
{
    pub fn new(bus: BUS, config: TransportConfig) -> Self {
        ApolloInterface {
            bus,
            config,
            _delay: PhantomData,
        }
    }

    /// Give the bus back, e.g. when unbinding the device
    pub fn release(self) -> BUS {
        self.bus
    }

    pub fn init_bus(&mut self) -> Result<(), ErrorKind<BUS::Error>> {
        Ok(self.bus.init()?)
    }

    pub fn set_ctl(&mut self, line: Ctl, high: bool) -> Result<(), ErrorKind<BUS::Error>> {
        Ok(self.bus.set_ctl(line, high)?)
    }

    /// Bounded spin until Acknowledge reaches the wanted edge.
    ///
    /// Acknowledge is asserted low. This is a busy-wait with a retry
    /// counter, not a hardware timer; each poll sleeps one microsecond.
    fn wait_for_ack(
        &mut self,
        delay: &mut DELAY,
        edge: AckWait,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        let wanted = match edge {
            AckWait::Assert => false,
            AckWait::Release => true,
        };
        for _ in 0..self.config.ack_retries {
            if self.bus.ctl(Ctl::Acknowledge)? == wanted {
                return Ok(());
            }
            delay.delay_us(1);
        }
        match self.config.ack_policy {
            AckPolicy::Abort => Err(ErrorKind::AckTimeout(edge)),
            AckPolicy::Continue => {
                warn_log!("apollo: acknowledge timeout, continuing anyway");
                Ok(())
            }
        }
    }

    /// Send one byte: drive the data lines, then pulse DataStrobe low/high
    /// with a full acknowledge round trip on each edge.
    pub fn send_byte(&mut self, delay: &mut DELAY, value: u8) -> Result<(), ErrorKind<BUS::Error>> {
        self.bus.write_data(value)?;
        self.bus.set_ctl(Ctl::DataStrobe, false)?;
        self.wait_for_ack(delay, AckWait::Assert)?;
        self.bus.set_ctl(Ctl::DataStrobe, true)?;
        self.wait_for_ack(delay, AckWait::Release)
    }

    /// Receive one byte, sampling the data lines mid-handshake instead of
    /// driving them
    pub fn read_byte(&mut self, delay: &mut DELAY) -> Result<u8, ErrorKind<BUS::Error>> {
        self.bus.set_ctl(Ctl::ReadWrite, true)?;
        self.bus.set_ctl(Ctl::DataStrobe, false)?;
        self.wait_for_ack(delay, AckWait::Assert)?;
        let value = self.bus.read_data()?;
        self.bus.set_ctl(Ctl::DataStrobe, true)?;
        self.wait_for_ack(delay, AckWait::Release)?;
        self.bus.set_ctl(Ctl::ReadWrite, false)?;
        Ok(value)
    }

    /// Basic function for sending [Commands](Command): the command byte
    /// framed by ChipDataSelect
    pub fn cmd<T: Command>(
        &mut self,
        delay: &mut DELAY,
        command: T,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        self.bus.set_ctl(Ctl::ChipDataSelect, true)?;
        self.send_byte(delay, command.address())?;
        Ok(self.bus.set_ctl(Ctl::ChipDataSelect, false)?)
    }

    /// Basic function for sending one u8 of data over the bus
    pub fn data(&mut self, delay: &mut DELAY, value: u8) -> Result<(), ErrorKind<BUS::Error>> {
        self.send_byte(delay, value)
    }

    /// Basic function for sending [Commands](Command) and the data belonging
    /// to it
    pub fn cmd_with_data<T: Command>(
        &mut self,
        delay: &mut DELAY,
        command: T,
        data: &[u8],
    ) -> Result<(), ErrorKind<BUS::Error>> {
        self.cmd(delay, command)?;
        for &byte in data {
            self.send_byte(delay, byte)?;
        }
        Ok(())
    }

    /// The standby exit handshake: raise WakeUp, settle, then one strobe
    /// cycle so the controller re-arms its acknowledge logic
    pub fn wakeup(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        // in case we were just powered off
        delay.delay_us(600);
        self.bus.set_ctl(Ctl::WakeUp, true)?;
        delay.delay_us(100);
        self.bus.set_ctl(Ctl::DataStrobe, false)?;
        self.wait_for_ack(delay, AckWait::Assert)?;
        self.bus.set_ctl(Ctl::DataStrobe, true)?;
        self.wait_for_ack(delay, AckWait::Release)
    }

    /// Pulse the active-low reset line
    pub fn hard_reset(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.bus.set_ctl(Ctl::Reset, false)?;
        delay.delay_us(20);
        self.bus.set_ctl(Ctl::Reset, true)?;
        delay.delay_us(20);
        Ok(())
    }
}
