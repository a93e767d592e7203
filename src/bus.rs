//! Board-side access to the Apollo bus.
//!
//! The controller is wired as a byte-wide parallel data path plus six control
//! lines. The two known boards differ only in the data path: the lBook V3
//! latches the byte behind a memory-mapped port ([`MappedPort`]) while the
//! EB600 drives eight discrete GPIOs and turns them around for reads
//! ([`PinOctet`]). Control lines are plain [`embedded_hal`] pins on both.
//!
//! Everything above this module goes through [`ApolloBus`]; no upper layer
//! ever touches a pin directly.

use core::convert::Infallible;
use core::fmt::{Display, Formatter};

use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// The logical control lines of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctl {
    /// High while a command byte is on the bus, low for data
    ChipDataSelect,
    /// High for controller-to-host transfers
    ReadWrite,
    /// Active-low strobe qualifying the byte on the data lines
    DataStrobe,
    /// Controller acknowledge, asserted low. The only input line.
    Acknowledge,
    /// Wake-up request out of standby
    WakeUp,
    /// Active-low controller reset
    Reset,
}

impl Ctl {
    fn index(self) -> usize {
        match self {
            Ctl::ChipDataSelect => 0,
            Ctl::ReadWrite => 1,
            Ctl::DataStrobe => 2,
            Ctl::Acknowledge => 3,
            Ctl::WakeUp => 4,
            Ctl::Reset => 5,
        }
    }
}

/// Register-level access to the controller, implemented per board.
///
/// Replaces the operations table the platform code used to hand to the
/// driver: named control pins with get/set semantics and a byte-wide data
/// path. Implementations must not have side effects beyond the physical
/// lines.
pub trait ApolloBus {
    type Error;

    /// Bring the lines to their idle levels (strobe and reset high, the
    /// rest low). Called once during driver probe.
    fn init(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Drive a control line
    fn set_ctl(&mut self, line: Ctl, high: bool) -> Result<(), Self::Error>;

    /// Sample a control line. For output lines this reads back the latch.
    fn ctl(&mut self, line: Ctl) -> Result<bool, Self::Error>;

    /// Present a byte on the data lines
    fn write_data(&mut self, value: u8) -> Result<(), Self::Error>;

    /// Sample the data lines, turning them around first where the board
    /// requires it
    fn read_data(&mut self) -> Result<u8, Self::Error>;
}

/// The byte-wide data path of the bus
pub trait DataBus {
    type Error;

    fn write(&mut self, value: u8) -> Result<(), Self::Error>;
    fn read(&mut self) -> Result<u8, Self::Error>;
}

/// A data line whose direction can be switched at runtime.
///
/// `embedded-hal` 1.0 has no trait for this, so boards wire their
/// HAL-specific dynamic pins up to this one.
pub trait IoPin {
    type Error;

    fn make_output(&mut self) -> Result<(), Self::Error>;
    fn make_input(&mut self) -> Result<(), Self::Error>;
    fn write(&mut self, high: bool) -> Result<(), Self::Error>;
    fn read(&mut self) -> Result<bool, Self::Error>;
}

/// Memory-mapped byte port (lBook V3 wiring).
///
/// The data lines live behind an external latch; a volatile byte access
/// drives or samples all eight at once.
pub struct MappedPort {
    port: *mut u8,
}

impl MappedPort {
    /// Create a port over a memory-mapped register.
    ///
    /// # Safety
    ///
    /// `port` must be valid for volatile byte reads and writes for the
    /// lifetime of the bus binding and must not alias memory used by
    /// anything else.
    pub const unsafe fn new(port: *mut u8) -> Self {
        MappedPort { port }
    }
}

// SAFETY: the port is an exclusively owned MMIO register, not shared memory.
unsafe impl Send for MappedPort {}

impl DataBus for MappedPort {
    type Error = Infallible;

    fn write(&mut self, value: u8) -> Result<(), Self::Error> {
        // SAFETY: valid for volatile access per the `new` contract
        unsafe { self.port.write_volatile(value) };
        Ok(())
    }

    fn read(&mut self) -> Result<u8, Self::Error> {
        // SAFETY: valid for volatile access per the `new` contract
        Ok(unsafe { self.port.read_volatile() })
    }
}

/// Eight discrete GPIOs as the data byte, least significant bit first
/// (EB600 wiring). Reads reconfigure the lines to inputs and restore them
/// afterwards, like the original port-direction pokes.
pub struct PinOctet<P: IoPin> {
    pins: [P; 8],
    outputs: bool,
}

impl<P: IoPin> PinOctet<P> {
    pub fn new(pins: [P; 8]) -> Self {
        PinOctet {
            pins,
            outputs: false,
        }
    }

    pub fn release(self) -> [P; 8] {
        self.pins
    }
}

impl<P: IoPin> DataBus for PinOctet<P> {
    type Error = P::Error;

    fn write(&mut self, value: u8) -> Result<(), Self::Error> {
        if !self.outputs {
            for pin in &mut self.pins {
                pin.make_output()?;
            }
            self.outputs = true;
        }
        for (i, pin) in self.pins.iter_mut().enumerate() {
            pin.write(value & (1 << i) != 0)?;
        }
        Ok(())
    }

    fn read(&mut self) -> Result<u8, Self::Error> {
        for pin in &mut self.pins {
            pin.make_input()?;
        }
        let mut value = 0;
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if pin.read()? {
                value |= 1 << i;
            }
        }
        // the bus idles driven
        for pin in &mut self.pins {
            pin.make_output()?;
        }
        self.outputs = true;
        Ok(value)
    }
}

/// Error raised by [`GpioBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError<D, E> {
    /// Data path error
    Data(D),
    /// Control line error
    Ctl(E),
}

impl<D: Display, E: Display> Display for BusError<D, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::Data(err) => Display::fmt(err, f),
            BusError::Ctl(err) => Display::fmt(err, f),
        }
    }
}

/// An [`ApolloBus`] composed from a [`DataBus`] and six control GPIOs.
///
/// All control pins must share one error type; in practice they come out of
/// one SoC GPIO block.
pub struct GpioBus<DB, CD, RW, DS, ACK, WUP, RST> {
    data: DB,
    cd: CD,
    rw: RW,
    ds: DS,
    ack: ACK,
    wup: WUP,
    rst: RST,
    /// Last driven level per output line, so `ctl` can read the latch back
    latch: [bool; 6],
}

impl<DB, CD, RW, DS, ACK, WUP, RST> GpioBus<DB, CD, RW, DS, ACK, WUP, RST> {
    pub fn new(data: DB, cd: CD, rw: RW, ds: DS, ack: ACK, wup: WUP, rst: RST) -> Self {
        GpioBus {
            data,
            cd,
            rw,
            ds,
            ack,
            wup,
            rst,
            latch: [false; 6],
        }
    }

    /// Give the pins back, e.g. when unbinding the device
    #[allow(clippy::type_complexity)]
    pub fn release(self) -> (DB, CD, RW, DS, ACK, WUP, RST) {
        (
            self.data, self.cd, self.rw, self.ds, self.ack, self.wup, self.rst,
        )
    }
}

impl<DB, CD, RW, DS, ACK, WUP, RST, E> ApolloBus for GpioBus<DB, CD, RW, DS, ACK, WUP, RST>
where
    DB: DataBus,
    CD: OutputPin<Error = E>,
    RW: OutputPin<Error = E>,
    DS: OutputPin<Error = E>,
    ACK: InputPin<Error = E>,
    WUP: OutputPin<Error = E>,
    RST: OutputPin<Error = E>,
{
    type Error = BusError<DB::Error, E>;

    fn init(&mut self) -> Result<(), Self::Error> {
        // idle levels: strobe and reset released (both active low)
        self.set_ctl(Ctl::ChipDataSelect, false)?;
        self.set_ctl(Ctl::ReadWrite, false)?;
        self.set_ctl(Ctl::DataStrobe, true)?;
        self.set_ctl(Ctl::WakeUp, false)?;
        self.set_ctl(Ctl::Reset, true)
    }

    fn set_ctl(&mut self, line: Ctl, high: bool) -> Result<(), Self::Error> {
        let state = PinState::from(high);
        match line {
            Ctl::ChipDataSelect => self.cd.set_state(state),
            Ctl::ReadWrite => self.rw.set_state(state),
            Ctl::DataStrobe => self.ds.set_state(state),
            Ctl::WakeUp => self.wup.set_state(state),
            Ctl::Reset => self.rst.set_state(state),
            // the acknowledge line is input-only
            Ctl::Acknowledge => return Ok(()),
        }
        .map_err(BusError::Ctl)?;
        self.latch[line.index()] = high;
        Ok(())
    }

    fn ctl(&mut self, line: Ctl) -> Result<bool, Self::Error> {
        match line {
            Ctl::Acknowledge => self.ack.is_high().map_err(BusError::Ctl),
            _ => Ok(self.latch[line.index()]),
        }
    }

    fn write_data(&mut self, value: u8) -> Result<(), Self::Error> {
        self.data.write(value).map_err(BusError::Data)
    }

    fn read_data(&mut self) -> Result<u8, Self::Error> {
        self.data.read().map_err(BusError::Data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::vec::Vec;

    use embedded_hal_mock::eh1::pin::{Mock as PinMock, State, Transaction};

    /// Direction-switchable pin good enough for the octet tests
    struct SimPin {
        level: bool,
        input_level: bool,
        is_output: bool,
        direction_flips: usize,
    }

    impl SimPin {
        fn new(input_level: bool) -> Self {
            SimPin {
                level: false,
                input_level,
                is_output: false,
                direction_flips: 0,
            }
        }
    }

    impl IoPin for SimPin {
        type Error = Infallible;

        fn make_output(&mut self) -> Result<(), Self::Error> {
            if !self.is_output {
                self.direction_flips += 1;
            }
            self.is_output = true;
            Ok(())
        }

        fn make_input(&mut self) -> Result<(), Self::Error> {
            if self.is_output {
                self.direction_flips += 1;
            }
            self.is_output = false;
            Ok(())
        }

        fn write(&mut self, high: bool) -> Result<(), Self::Error> {
            assert!(self.is_output, "write to an input pin");
            self.level = high;
            Ok(())
        }

        fn read(&mut self) -> Result<bool, Self::Error> {
            assert!(!self.is_output, "read from an output pin");
            Ok(self.input_level)
        }
    }

    #[test]
    fn octet_write_sets_bits() {
        let pins: [SimPin; 8] = core::array::from_fn(|_| SimPin::new(false));
        let mut octet = PinOctet::new(pins);
        octet.write(0xA5).unwrap();
        let pins = octet.release();
        let driven: Vec<bool> = pins.iter().map(|p| p.level).collect();
        assert_eq!(
            driven,
            [true, false, true, false, false, true, false, true] // 0xA5, lsb first
        );
    }

    #[test]
    fn octet_read_turns_lines_around() {
        let pins: [SimPin; 8] = core::array::from_fn(|i| SimPin::new(i % 2 == 0));
        let mut octet = PinOctet::new(pins);
        octet.write(0x00).unwrap();
        assert_eq!(octet.read().unwrap(), 0x55);
        // out (write) -> in -> out again
        let pins = octet.release();
        assert!(pins.iter().all(|p| p.is_output));
        assert!(pins.iter().all(|p| p.direction_flips == 3));
    }

    #[test]
    fn mapped_port_roundtrip() {
        let mut cell: u8 = 0;
        // SAFETY: cell outlives the port and nothing else aliases it
        let mut port = unsafe { MappedPort::new(&mut cell as *mut u8) };
        port.write(0x42).unwrap();
        assert_eq!(port.read().unwrap(), 0x42);
    }

    #[test]
    fn gpio_bus_routes_ctl_lines() {
        let mut cell: u8 = 0;
        let data = unsafe { MappedPort::new(&mut cell as *mut u8) };

        let cd = PinMock::new(&[Transaction::set(State::High), Transaction::set(State::Low)]);
        let rw = PinMock::new(&[]);
        let ds = PinMock::new(&[Transaction::set(State::Low)]);
        let ack = PinMock::new(&[Transaction::get(State::Low)]);
        let wup = PinMock::new(&[]);
        let rst = PinMock::new(&[]);

        let mut bus = GpioBus::new(data, cd, rw, ds, ack, wup, rst);

        bus.set_ctl(Ctl::ChipDataSelect, true).unwrap();
        assert!(bus.ctl(Ctl::ChipDataSelect).unwrap());
        bus.set_ctl(Ctl::ChipDataSelect, false).unwrap();
        bus.set_ctl(Ctl::DataStrobe, false).unwrap();
        assert!(!bus.ctl(Ctl::Acknowledge).unwrap());

        bus.write_data(0x5A).unwrap();
        assert_eq!(cell, 0x5A);

        let (_, mut cd, mut rw, mut ds, mut ack, mut wup, mut rst) = bus.release();
        cd.done();
        rw.done();
        ds.done();
        ack.done();
        wup.done();
        rst.done();
    }
}
