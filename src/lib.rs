//! A driver for the Apollo (Hecuba) e-ink display controller as found in the
//! Netronix EB600 and lBook/Jinke eReader V3 e-book readers.
//!
//! The controller sits on a byte-wide parallel bus with six control lines and
//! a per-byte acknowledge handshake; there is no SPI and no clock. This driver
//! was built using [`embedded-hal`] traits for the control lines and a small
//! board trait ([`bus::ApolloBus`]) for the data path, of which two wirings
//! are provided: a memory-mapped byte port ([`bus::MappedPort`], lBook V3) and
//! eight discrete GPIOs ([`bus::PinOctet`], EB600).
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal/~1.0
//!
//! # Requirements
//!
//! - The bus is exclusively owned by the driver; nothing else may touch those
//!   pins while the driver is bound.
//! - The framebuffer is one byte per pixel with the low `bpp` bits
//!   significant; wherever a buffer is used it always needs to be of the size
//!   `width * height` (600 * 800 for this panel).
//!
//! # Examples
//!
//! ```ignore
//! use eink_apollo::epd6in0::{Epd6in0, GEOMETRY};
//! use eink_apollo::framebuffer::Framebuffer;
//! use eink_apollo::prelude::*;
//!
//! let bus = /* board specific, see the bus module */;
//! let mut epd = Epd6in0::new(bus, &mut delay)?;
//!
//! let mut vram = [0x03u8; GEOMETRY.buffer_len()];
//! let mut fb = Framebuffer::new(&mut vram, GEOMETRY)?;
//!
//! // draw something, then let the deferred flush push it out
//! fb.fill_rect(Rect::new(0, 0, 599, 15), Color::Black, now());
//! while !fb.service(now(), &mut epd, &mut delay)? { /* tick */ }
//!
//! epd.ensure_sleep_mode(&mut delay)?;
//! ```
#![no_std]

pub mod attrs;
pub mod bus;
pub mod color;
pub mod defio;
pub mod epd6in0;
pub mod error;
pub mod framebuffer;
mod interface;
mod log;
pub mod rect;
mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use crate::interface::{AckPolicy, TransportConfig};

pub mod prelude {
    pub use crate::attrs::{Attr, Options};
    pub use crate::bus::{ApolloBus, Ctl, DataBus, GpioBus, IoPin, MappedPort, PinOctet};
    pub use crate::color::{Bpp, Color};
    pub use crate::defio::{Geometry, UpdatePlan};
    pub use crate::error::{AckWait, ErrorKind};
    pub use crate::framebuffer::Framebuffer;
    pub use crate::rect::Rect;
    pub use crate::traits::{DisplayRotation, PowerMode};
    pub use crate::{AckPolicy, TransportConfig};
}
