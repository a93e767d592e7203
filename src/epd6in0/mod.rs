//! Driver for the 6.0" Apollo e-ink panel (600x800) of the EB600 and
//! lBook/Jinke eReader V3.
//!
//! # Example
//!
//!```ignore
//!use eink_apollo::epd6in0::{Epd6in0, GEOMETRY, WIDTH};
//!use eink_apollo::prelude::*;
//!
//!// Setup EPD over the board bus (see the bus module for the two wirings)
//!let mut epd = Epd6in0::new(bus, &mut delay)?;
//!
//!// One byte per pixel, low two bits significant
//!let mut frame = [Color::White.get_byte_value(); GEOMETRY.buffer_len()];
//!
//!// Display the full frame
//!epd.update_frame(&frame, &mut delay)?;
//!
//!// Or just the rows that changed
//!epd.update_partial_frame(&frame, Rect::rows(0, 15, WIDTH), &mut delay)?;
//!
//!// Set the EPD to sleep
//!epd.enter_sleep_mode(&mut delay)?;
//!```

use embedded_hal::delay::DelayNs;

use crate::attrs::{self, Attr, Options};
use crate::bus::{ApolloBus, Ctl};
use crate::color::{Bpp, Packer};
use crate::defio::Geometry;
use crate::error::ErrorKind;
use crate::framebuffer::Framebuffer;
use crate::interface::ApolloInterface;
use crate::log::{debug, error_log, trace};
use crate::rect::Rect;
use crate::traits::{DisplayRotation, PowerMode};
use crate::TransportConfig;

pub(crate) mod command;
use self::command::Command;

/// Width of the panel in pixels
pub const WIDTH: u16 = 600;
/// Height of the panel in pixels
pub const HEIGHT: u16 = 800;
/// Geometry of the byte-per-pixel framebuffer
pub const GEOMETRY: Geometry = Geometry::new(WIDTH, HEIGHT);
/// Size of the waveform flash behind the controller
pub const WAVEFORM_FLASH_SIZE: u32 = 2 * 1024 * 1024;
/// The byte a DISPLAY_SIZE query answers for this panel class
pub const DISPLAY_SIZE_CODE: u8 = 0x06;

/// Probe attempts while the controller still answers 0xFF out of reset
const STATUS_RETRIES: usize = 100;

/// Epd6in0 driver
pub struct Epd6in0<BUS, DELAY> {
    /// Bus interface
    interface: ApolloInterface<BUS, DELAY>,
    /// Refresh policy
    options: Options,
    /// Power/display mode, mutated only by the mode sequencing below
    mode: PowerMode,
    rotation: DisplayRotation,
    bpp: Bpp,
}

impl<BUS, DELAY> Epd6in0<BUS, DELAY>
where
    BUS: ApolloBus,
    DELAY: DelayNs,
{
    /// Creates and probes the driver with default options.
    ///
    /// This already initialises the device: it is reset, checked for
    /// presence and left displaying a white screen.
    pub fn new(bus: BUS, delay: &mut DELAY) -> Result<Self, ErrorKind<BUS::Error>> {
        Self::with_config(bus, delay, Options::default(), TransportConfig::default())
    }

    /// Like [`new`](Self::new) with explicit refresh policy and transport
    /// tuning
    pub fn with_config(
        bus: BUS,
        delay: &mut DELAY,
        options: Options,
        transport: TransportConfig,
    ) -> Result<Self, ErrorKind<BUS::Error>> {
        let mut epd = Epd6in0 {
            interface: ApolloInterface::new(bus, transport),
            options,
            mode: PowerMode::Unknown,
            rotation: DisplayRotation::default(),
            bpp: Bpp::Two,
        };

        epd.init(delay)?;

        Ok(epd)
    }

    fn init(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.interface.init_bus()?;
        self.interface.hard_reset(delay)?;

        // the controller answers 0xFF until it is out of reset
        let mut status = 0xFF;
        for _ in 0..STATUS_RETRIES {
            self.enter_normal_mode(delay)?;
            status = self.status(delay)?;
            if status != 0xFF {
                break;
            }
            delay.delay_us(100);
        }
        if status == 0xFF {
            error_log!("apollo: controller stuck in reset");
            return Err(ErrorKind::ControllerNotDetected { status });
        }

        self.interface.cmd(delay, Command::DisplaySize)?;
        let size = self.interface.read_byte(delay)?;
        if size != DISPLAY_SIZE_CODE {
            error_log!("apollo: display size probe answered {}", size);
            return Err(ErrorKind::ControllerNotDetected { status: size });
        }

        self.set_depth(self.bpp, delay)?;
        self.interface
            .cmd_with_data(delay, Command::EraseDisplay, &[0x01])?;
        if self.options.use_sleep_mode {
            self.enter_sleep_mode(delay)?;
        }
        debug!("apollo: controller up, status {}", status);
        Ok(())
    }

    /// Give the bus back, e.g. when unbinding the device
    pub fn release(self) -> BUS {
        self.interface.release()
    }

    pub fn width(&self) -> u16 {
        WIDTH
    }

    pub fn height(&self) -> u16 {
        HEIGHT
    }

    /// Current power/display mode
    pub fn power_mode(&self) -> PowerMode {
        self.mode
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn bpp(&self) -> Bpp {
        self.bpp
    }

    pub fn rotation(&self) -> DisplayRotation {
        self.rotation
    }

    /// NORMAL_MODE plus the orientation byte; afterwards the controller
    /// accepts picture data
    pub fn enter_normal_mode(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.interface.set_ctl(Ctl::ChipDataSelect, false)?;
        self.interface.set_ctl(Ctl::ReadWrite, false)?;

        self.interface.cmd(delay, Command::NormalMode)?;
        self.interface.cmd(delay, Command::Orientation)?;
        self.interface.data(delay, self.rotation.orientation_code())?;
        self.mode = PowerMode::Normal;
        Ok(())
    }

    /// Put the controller into its low-power mode; the next transfer wakes
    /// it again
    pub fn enter_sleep_mode(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.interface.cmd(delay, Command::SleepMode)?;
        self.mode = PowerMode::Sleep;
        Ok(())
    }

    /// Sleep only when the `use_sleep_mode` policy asks for it
    pub fn ensure_sleep_mode(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        if self.options.use_sleep_mode && self.mode != PowerMode::Sleep {
            self.enter_sleep_mode(delay)?;
        }
        Ok(())
    }

    /// Bring the controller into a mode that accepts picture data,
    /// whatever state it was left in
    pub fn ensure_normal_mode(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        match self.mode {
            PowerMode::Normal => Ok(()),
            PowerMode::Sleep | PowerMode::Unknown => self.enter_normal_mode(delay),
            PowerMode::Standby => {
                self.interface.wakeup(delay)?;
                self.enter_normal_mode(delay)
            }
        }
    }

    fn finish_transfer(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.ensure_sleep_mode(delay)
    }

    /// Transmit and display a full frame.
    ///
    /// `buffer` is the byte-per-pixel framebuffer of
    /// [`GEOMETRY.buffer_len()`](Geometry::buffer_len) bytes.
    pub fn update_frame(
        &mut self,
        buffer: &[u8],
        delay: &mut DELAY,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        assert_eq!(buffer.len(), GEOMETRY.buffer_len());
        trace!("apollo: full frame update");
        self.ensure_normal_mode(delay)?;

        if self.options.manual_refresh {
            self.interface.cmd(delay, Command::ManualRefresh)?;
        }

        self.interface.cmd(delay, Command::LoadPicture)?;
        let mut packer = Packer::new(self.bpp);
        for &pixel in buffer {
            if let Some(byte) = packer.push(pixel) {
                self.interface.data(delay, byte)?;
            }
        }
        debug_assert!(packer.is_flushed());
        self.interface.cmd(delay, Command::StopLoading)?;
        self.interface.cmd(delay, Command::DisplayPicture)?;

        self.finish_transfer(delay)
    }

    /// Transmit and display a sub-rectangle of the frame.
    ///
    /// `area` is snapped outwards to the controller's 4-pixel grid and
    /// clipped to the panel; `buffer` is still the full framebuffer.
    pub fn update_partial_frame(
        &mut self,
        buffer: &[u8],
        area: Rect,
        delay: &mut DELAY,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        assert_eq!(buffer.len(), GEOMETRY.buffer_len());
        let area = area.align4().clip(WIDTH, HEIGHT);
        trace!("apollo: partial update rows {}..{}", area.y1, area.y2);
        self.ensure_normal_mode(delay)?;

        if self.options.manual_refresh {
            self.interface.cmd(delay, Command::ManualRefresh)?;
        }

        self.interface.cmd(delay, Command::LoadPartialPicture)?;
        for byte in [
            (area.x1 >> 8) as u8,
            area.x1 as u8,
            (area.y1 >> 8) as u8,
            area.y1 as u8,
            (area.x2 >> 8) as u8,
            area.x2 as u8,
            (area.y2 >> 8) as u8,
            area.y2 as u8,
        ] {
            self.interface.data(delay, byte)?;
        }

        let mut packer = Packer::new(self.bpp);
        for y in area.y1..=area.y2 {
            for x in area.x1..=area.x2 {
                let pixel = buffer[y as usize * WIDTH as usize + x as usize];
                if let Some(byte) = packer.push(pixel) {
                    self.interface.data(delay, byte)?;
                }
            }
        }
        // aligned width and height keep the stream at whole bytes
        debug_assert!(packer.is_flushed());
        self.interface.cmd(delay, Command::StopLoading)?;
        self.interface.cmd(delay, Command::DisplayPartialPicture)?;

        self.finish_transfer(delay)
    }

    /// Clear the panel to white without touching any framebuffer
    pub fn erase_display(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.ensure_normal_mode(delay)?;
        self.interface
            .cmd_with_data(delay, Command::EraseDisplay, &[0x01])?;
        self.finish_transfer(delay)
    }

    /// Set the panel orientation for subsequent picture loads
    pub fn set_rotation(
        &mut self,
        rotation: DisplayRotation,
        delay: &mut DELAY,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        self.rotation = rotation;
        self.ensure_normal_mode(delay)?;
        self.interface.cmd(delay, Command::Orientation)?;
        self.interface.data(delay, rotation.orientation_code())
    }

    /// Set the wire depth of the pixel stream
    pub fn set_depth(&mut self, bpp: Bpp, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.bpp = bpp;
        self.ensure_normal_mode(delay)?;
        self.interface
            .cmd_with_data(delay, Command::SetDepth, &[bpp.depth_code()])
    }

    /// Status byte of the controller
    pub fn status(&mut self, delay: &mut DELAY) -> Result<u8, ErrorKind<BUS::Error>> {
        self.interface.cmd(delay, Command::GetStatus)?;
        self.interface.read_byte(delay)
    }

    /// Controller temperature in degrees Celsius
    pub fn temperature(&mut self, delay: &mut DELAY) -> Result<i8, ErrorKind<BUS::Error>> {
        self.interface.cmd(delay, Command::ReadTemperature)?;
        Ok(self.interface.read_byte(delay)? as i8)
    }

    /// Controller firmware version byte
    pub fn version(&mut self, delay: &mut DELAY) -> Result<u8, ErrorKind<BUS::Error>> {
        self.interface.cmd(delay, Command::VersionNumber)?;
        self.interface.read_byte(delay)
    }

    /// Read from the waveform flash. Out-of-range offsets truncate the
    /// request instead of failing; returns the number of bytes read.
    pub fn read_waveforms(
        &mut self,
        offset: u32,
        buf: &mut [u8],
        delay: &mut DELAY,
    ) -> Result<usize, ErrorKind<BUS::Error>> {
        self.ensure_normal_mode(delay)?;
        let count = clamp_flash(offset, buf.len());
        for (i, slot) in buf[..count].iter_mut().enumerate() {
            self.interface.cmd(delay, Command::ReadFromFlash)?;
            self.send_flash_addr(offset + i as u32, delay)?;
            *slot = self.interface.read_byte(delay)?;
        }
        self.finish_transfer(delay)?;
        Ok(count)
    }

    /// Write to the waveform flash, with the same clamp-not-reject offset
    /// handling as [`read_waveforms`](Self::read_waveforms)
    pub fn write_waveforms(
        &mut self,
        offset: u32,
        data: &[u8],
        delay: &mut DELAY,
    ) -> Result<usize, ErrorKind<BUS::Error>> {
        self.ensure_normal_mode(delay)?;
        let count = clamp_flash(offset, data.len());
        for (i, &byte) in data[..count].iter().enumerate() {
            self.interface.cmd(delay, Command::WriteToFlash)?;
            self.send_flash_addr(offset + i as u32, delay)?;
            self.interface.data(delay, byte)?;
        }
        self.finish_transfer(delay)?;
        Ok(count)
    }

    fn send_flash_addr(
        &mut self,
        addr: u32,
        delay: &mut DELAY,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        self.interface.data(delay, (addr >> 16) as u8)?;
        self.interface.data(delay, (addr >> 8) as u8)?;
        self.interface.data(delay, addr as u8)
    }

    /// Power-management hook: deep power-down.
    ///
    /// Cancel pending deferred work first
    /// ([`Framebuffer::cancel_pending`]); leaving standby needs the full
    /// wake-up handshake, which [`resume`](Self::resume) performs.
    pub fn suspend(&mut self, delay: &mut DELAY) -> Result<(), ErrorKind<BUS::Error>> {
        self.interface.cmd(delay, Command::StandbyMode)?;
        self.mode = PowerMode::Standby;
        Ok(())
    }

    /// Power-management hook: wake from standby and restore the
    /// policy-selected mode before any transfer is accepted.
    ///
    /// Returns the controller's status byte after the wake-up.
    pub fn resume(&mut self, delay: &mut DELAY) -> Result<u8, ErrorKind<BUS::Error>> {
        self.interface.wakeup(delay)?;
        if self.options.use_sleep_mode {
            self.enter_sleep_mode(delay)?;
        } else {
            self.enter_normal_mode(delay)?;
        }
        let status = self.status(delay)?;
        debug!("apollo: status after resume {}", status);
        Ok(status)
    }

    /// Write one runtime attribute from its textual form.
    ///
    /// Unknown keys and out-of-bounds values are rejected with
    /// [`ErrorKind::InvalidRange`] and change nothing.
    pub fn write_attr(
        &mut self,
        fb: &mut Framebuffer<'_>,
        key: &str,
        value: &str,
    ) -> Result<(), ErrorKind<BUS::Error>> {
        let attr = Attr::from_key(key).ok_or(ErrorKind::InvalidRange)?;
        match attr {
            Attr::DefioDelay => {
                let ms = attrs::parse_number(value).ok_or(ErrorKind::InvalidRange)?;
                fb.set_defio_delay_ms(ms);
                Ok(())
            }
            _ => self
                .options
                .write_attr(attr, value, fb.geometry().pages() as u16),
        }
    }

    /// Read one runtime attribute, booleans as 0/1, the delay in
    /// milliseconds
    pub fn read_attr(&self, fb: &Framebuffer<'_>, key: &str) -> Option<u32> {
        let attr = Attr::from_key(key)?;
        match attr {
            Attr::DefioDelay => Some(fb.defio_delay_ms()),
            _ => self.options.read_attr(attr),
        }
    }
}

fn clamp_flash(offset: u32, len: usize) -> usize {
    if offset >= WAVEFORM_FLASH_SIZE {
        0
    } else {
        len.min((WAVEFORM_FLASH_SIZE - offset) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::mock::{MockBus, Wire};

    extern crate std;
    use std::vec;
    use std::vec::Vec;

    use embedded_hal_mock::eh1::delay::NoopDelay;

    /// A bus whose controller answers the probe
    fn probed_bus() -> MockBus {
        let mut bus = MockBus::new();
        bus.reads.push_back(0x00); // GET_STATUS
        bus.reads.push_back(DISPLAY_SIZE_CODE); // DISPLAY_SIZE
        bus
    }

    fn new_epd(bus: MockBus) -> Epd6in0<MockBus, NoopDelay> {
        Epd6in0::new(bus, &mut NoopDelay::new()).unwrap()
    }

    /// Commands issued after (and excluding) the probe sequence
    fn cmds_after_probe(bus: &MockBus, probe_cmds: usize) -> Vec<u8> {
        bus.cmds()[probe_cmds..].to_vec()
    }

    const PROBE_CMDS: usize = 6; // F0 F5 AA E2 F3 A3

    #[test]
    fn probe_sequence() {
        let epd = new_epd(probed_bus());
        assert_eq!(epd.power_mode(), PowerMode::Normal);

        let bus = epd.release();
        assert_eq!(bus.resets, 1);
        assert_eq!(bus.cmds(), [0xF0, 0xF5, 0xAA, 0xE2, 0xF3, 0xA3]);
        // orientation, depth and erase arguments
        let data: Vec<u8> = bus
            .wire
            .iter()
            .filter_map(|w| match w {
                Wire::Data(d) => Some(*d),
                Wire::Cmd(_) => None,
            })
            .collect();
        assert_eq!(data, [0x01, 0x02, 0x01]);
    }

    #[test]
    fn probe_rejects_wrong_display_size() {
        let mut bus = MockBus::new();
        bus.reads.push_back(0x00);
        bus.reads.push_back(0x05);
        let err = Epd6in0::new(bus, &mut NoopDelay::new()).err().unwrap();
        assert_eq!(err, ErrorKind::ControllerNotDetected { status: 0x05 });
    }

    #[test]
    fn probe_gives_up_on_stuck_controller() {
        // every read answers 0xFF, like a controller held in reset
        let err = Epd6in0::new(MockBus::new(), &mut NoopDelay::new())
            .err()
            .unwrap();
        assert_eq!(err, ErrorKind::ControllerNotDetected { status: 0xFF });
    }

    #[test]
    fn full_update_streams_the_whole_frame() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        let frame = vec![Color::White.get_byte_value(); GEOMETRY.buffer_len()];
        epd.update_frame(&frame, &mut delay).unwrap();

        let bus = epd.release();
        assert_eq!(cmds_after_probe(&bus, PROBE_CMDS), [0xA0, 0xA1, 0xA2]);

        // 4 pixels per byte at 2 bpp, all white
        let pixel_bytes: Vec<u8> = bus
            .wire
            .iter()
            .skip_while(|w| **w != Wire::Cmd(0xA0))
            .filter_map(|w| match w {
                Wire::Data(d) => Some(*d),
                Wire::Cmd(_) => None,
            })
            .collect();
        assert_eq!(pixel_bytes.len(), GEOMETRY.buffer_len() / 4);
        assert!(pixel_bytes.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn partial_update_sends_aligned_coordinates() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        let mut frame = vec![0u8; GEOMETRY.buffer_len()];
        // one dark pixel inside the requested area
        frame[8 * WIDTH as usize + 4] = 0b01;

        epd.update_partial_frame(&frame, Rect::new(5, 9, 6, 9), &mut delay)
            .unwrap();

        let bus = epd.release();
        assert_eq!(cmds_after_probe(&bus, PROBE_CMDS), [0xB0, 0xA1, 0xB1]);

        let data: Vec<u8> = bus
            .wire
            .iter()
            .skip_while(|w| **w != Wire::Cmd(0xB0))
            .filter_map(|w| match w {
                Wire::Data(d) => Some(*d),
                Wire::Cmd(_) => None,
            })
            .collect();
        // (5,9,6,9) snaps to (4,8)..(7,11), big-endian 16 bit each
        assert_eq!(&data[..8], [0, 4, 0, 8, 0, 7, 0, 11]);
        // 4x4 pixels at 2 bpp = 4 bytes; the dark pixel leads the first byte
        assert_eq!(data.len(), 8 + 4);
        assert_eq!(data[8], 0b01_00_00_00);
    }

    #[test]
    fn manual_refresh_precedes_the_load() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());
        epd.options_mut().manual_refresh = true;

        let frame = vec![0u8; GEOMETRY.buffer_len()];
        epd.update_partial_frame(&frame, Rect::new(0, 0, 3, 3), &mut delay)
            .unwrap();

        let bus = epd.release();
        assert_eq!(cmds_after_probe(&bus, PROBE_CMDS), [0xFC, 0xB0, 0xA1, 0xB1]);
    }

    #[test]
    fn ensure_normal_mode_from_every_state() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        // Normal -> Normal is a no-op
        epd.ensure_normal_mode(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Normal);

        epd.enter_sleep_mode(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Sleep);
        epd.ensure_normal_mode(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Normal);

        epd.suspend(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Standby);
        epd.ensure_normal_mode(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Normal);

        // standby exit went through the wake-up handshake
        assert_eq!(epd.release().wakeups, 1);
    }

    #[test]
    fn ensure_sleep_is_a_noop_without_the_policy() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());
        let before = epd.power_mode();

        epd.ensure_sleep_mode(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), before);
        let bus = epd.release();
        assert_eq!(bus.cmds().len(), PROBE_CMDS);
    }

    #[test]
    fn sleep_policy_wraps_every_transfer() {
        let mut delay = NoopDelay::new();
        let options = Options {
            use_sleep_mode: true,
            ..Options::default()
        };
        let mut epd = Epd6in0::with_config(
            probed_bus(),
            &mut delay,
            options,
            TransportConfig::default(),
        )
        .unwrap();
        // probe left it asleep per policy
        assert_eq!(epd.power_mode(), PowerMode::Sleep);

        let frame = vec![0u8; GEOMETRY.buffer_len()];
        epd.update_frame(&frame, &mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Sleep);

        let bus = epd.release();
        // F1 from probe, then wake (F0 F5), load, and sleep again
        assert_eq!(
            cmds_after_probe(&bus, PROBE_CMDS + 1),
            [0xF0, 0xF5, 0xA0, 0xA1, 0xA2, 0xF1]
        );
    }

    #[test]
    fn flash_reads_clamp_at_the_region_end() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        let mut buf = [0u8; 8];
        // only two bytes left before the end of the 2 MiB region
        let offset = WAVEFORM_FLASH_SIZE - 2;
        // no reads seeded: the mock answers 0xFF for both
        let count = epd.read_waveforms(offset, &mut buf, &mut delay).unwrap();
        assert_eq!(count, 2);

        let bus = epd.release();
        let cmds = cmds_after_probe(&bus, PROBE_CMDS);
        assert_eq!(cmds, [0x02, 0x02]);

        let data: Vec<u8> = bus
            .wire
            .iter()
            .skip_while(|w| **w != Wire::Cmd(0x02))
            .filter_map(|w| match w {
                Wire::Data(d) => Some(*d),
                Wire::Cmd(_) => None,
            })
            .collect();
        // 24-bit big-endian addresses of the last two flash bytes
        assert_eq!(data, [0x1F, 0xFF, 0xFE, 0x1F, 0xFF, 0xFF]);
    }

    #[test]
    fn flash_reads_beyond_the_region_are_empty() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());
        let mut buf = [0u8; 4];
        let count = epd
            .read_waveforms(WAVEFORM_FLASH_SIZE, &mut buf, &mut delay)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn flash_write_sends_address_then_byte() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        let count = epd.write_waveforms(0x010203, &[0x42], &mut delay).unwrap();
        assert_eq!(count, 1);

        let bus = epd.release();
        assert_eq!(cmds_after_probe(&bus, PROBE_CMDS), [0x01]);
        let data: Vec<u8> = bus
            .wire
            .iter()
            .skip_while(|w| **w != Wire::Cmd(0x01))
            .filter_map(|w| match w {
                Wire::Data(d) => Some(*d),
                Wire::Cmd(_) => None,
            })
            .collect();
        assert_eq!(data, [0x01, 0x02, 0x03, 0x42]);
    }

    #[test]
    fn suspend_resume_restores_normal_mode() {
        let mut delay = NoopDelay::new();
        let mut epd = new_epd(probed_bus());

        epd.suspend(&mut delay).unwrap();
        assert_eq!(epd.power_mode(), PowerMode::Standby);

        // no reads seeded, so the post-resume status query answers 0xFF
        assert_eq!(epd.resume(&mut delay).unwrap(), 0xFF);
        assert_eq!(epd.power_mode(), PowerMode::Normal);

        let bus = epd.release();
        assert_eq!(bus.wakeups, 1);
        // standby, then normal mode + orientation + status query
        assert_eq!(cmds_after_probe(&bus, PROBE_CMDS), [0xF2, 0xF0, 0xF5, 0xAA]);
    }

    #[test]
    fn temperature_is_signed() {
        let mut delay = NoopDelay::new();
        let mut bus = probed_bus();
        bus.reads.push_back(0xFB); // -5 degrees
        let mut epd = new_epd(bus);
        assert_eq!(epd.temperature(&mut delay).unwrap(), -5);
    }
}
