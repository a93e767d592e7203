//! Runtime-tunable driver options.
//!
//! This is the crate's rendering of the original drivers' sysfs attribute
//! files: small text key/value controls, parsed and bounds-checked
//! synchronously, leaving state untouched on a bad write.

use crate::error::ErrorKind;

/// Tick rate of the deferred-flush clock
pub const TICK_HZ: u32 = 100;

/// Default deferred-flush delay in ticks (half a second)
pub const DEFAULT_DEFIO_DELAY: u32 = TICK_HZ / 2;

/// Default dirty-page count at which a flush becomes one full refresh,
/// about half of the panel's framebuffer
pub const DEFAULT_REFRESH_THRESHOLD: u16 = 60;

/// Refresh policy of one display instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Ask the controller for a manual (flashing) refresh before each load
    pub manual_refresh: bool,
    /// Let the coalescer emit partial-rectangle updates
    pub partial_update: bool,
    /// Put the controller to sleep after every transfer
    pub use_sleep_mode: bool,
    /// Distinct dirty pages at which partial updates give way to one full
    /// refresh
    pub refresh_threshold: u16,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            manual_refresh: false,
            partial_update: true,
            use_sleep_mode: false,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }
}

/// Names of the runtime attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    ManualRefresh,
    PartialUpdate,
    UseSleepMode,
    RefreshThreshold,
    DefioDelay,
}

impl Attr {
    /// Look an attribute up by its textual key
    pub fn from_key(key: &str) -> Option<Attr> {
        match key {
            "manual_refresh" => Some(Attr::ManualRefresh),
            "partial_update" => Some(Attr::PartialUpdate),
            "use_sleep_mode" => Some(Attr::UseSleepMode),
            // the threshold went by both names over the driver's life
            "refresh_threshold" | "manual_refresh_threshold" => Some(Attr::RefreshThreshold),
            "defio_delay" => Some(Attr::DefioDelay),
            _ => None,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Attr::ManualRefresh => "manual_refresh",
            Attr::PartialUpdate => "partial_update",
            Attr::UseSleepMode => "use_sleep_mode",
            Attr::RefreshThreshold => "refresh_threshold",
            Attr::DefioDelay => "defio_delay",
        }
    }
}

impl Options {
    /// Parse and store one attribute value; a rejected write changes
    /// nothing.
    ///
    /// [`Attr::DefioDelay`] lives with the framebuffer
    /// (see [`Framebuffer::set_defio_delay_ms`]) and is rejected here.
    ///
    /// [`Framebuffer::set_defio_delay_ms`]:
    /// crate::framebuffer::Framebuffer::set_defio_delay_ms
    pub fn write_attr<E>(
        &mut self,
        attr: Attr,
        value: &str,
        max_pages: u16,
    ) -> Result<(), ErrorKind<E>> {
        let number = parse_number(value).ok_or(ErrorKind::InvalidRange)?;
        match attr {
            Attr::ManualRefresh => self.manual_refresh = parse_bool(number)?,
            Attr::PartialUpdate => self.partial_update = parse_bool(number)?,
            Attr::UseSleepMode => self.use_sleep_mode = parse_bool(number)?,
            Attr::RefreshThreshold => {
                if number == 0 || number > max_pages as u32 {
                    return Err(ErrorKind::InvalidRange);
                }
                self.refresh_threshold = number as u16;
            }
            Attr::DefioDelay => return Err(ErrorKind::InvalidRange),
        }
        Ok(())
    }

    /// Current value of an attribute, booleans as 0/1
    pub fn read_attr(&self, attr: Attr) -> Option<u32> {
        match attr {
            Attr::ManualRefresh => Some(self.manual_refresh as u32),
            Attr::PartialUpdate => Some(self.partial_update as u32),
            Attr::UseSleepMode => Some(self.use_sleep_mode as u32),
            Attr::RefreshThreshold => Some(self.refresh_threshold as u32),
            Attr::DefioDelay => None,
        }
    }
}

pub(crate) fn parse_number(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

fn parse_bool<E>(number: u32) -> Result<bool, ErrorKind<E>> {
    match number {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ErrorKind::InvalidRange),
    }
}

/// Milliseconds to flush-clock ticks, with the original's one-tick floor
pub(crate) fn ms_to_ticks(ms: u32) -> u32 {
    let ticks = (ms as u64 * TICK_HZ as u64 / 1000) as u32;
    if ticks == 0 {
        1
    } else {
        ticks
    }
}

pub(crate) fn ticks_to_ms(ticks: u32) -> u32 {
    (ticks as u64 * 1000 / TICK_HZ as u64) as u32
}
