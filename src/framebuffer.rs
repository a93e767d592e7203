//! Byte-per-pixel framebuffer front-end.
//!
//! Drawing lands in ordinary memory and only marks pages dirty; the panel is
//! touched when the deferred flush window expires and [`Framebuffer::service`]
//! pushes the coalesced damage through the driver. Rapid writes before the
//! window elapses collapse into one flush.

use embedded_hal::delay::DelayNs;

use crate::attrs::{ms_to_ticks, ticks_to_ms, DEFAULT_DEFIO_DELAY};
use crate::bus::ApolloBus;
use crate::color::Color;
use crate::defio::{DeferredIo, Geometry, UpdatePlan};
use crate::epd6in0::Epd6in0;
use crate::error::ErrorKind;
use crate::log::debug;
use crate::rect::Rect;

#[cfg(feature = "graphics")]
use crate::traits::DisplayRotation;
#[cfg(feature = "graphics")]
use embedded_graphics_core::prelude::*;

/// Error found while building a [`Framebuffer`]
#[derive(Debug)]
pub enum FramebufferError {
    /// The provided buffer was too small
    BufferTooSmall,
}

/// A framebuffer over a caller-provided buffer, one byte per pixel
pub struct Framebuffer<'a> {
    buf: &'a mut [u8],
    geom: Geometry,
    defio: DeferredIo,
    #[cfg(feature = "graphics")]
    rotation: DisplayRotation,
}

impl<'a> Framebuffer<'a> {
    /// You must allocate the buffer by yourself; it must hold at least
    /// [`Geometry::buffer_len`] bytes.
    pub fn new(buf: &'a mut [u8], geom: Geometry) -> Result<Self, FramebufferError> {
        if buf.len() < geom.buffer_len() {
            return Err(FramebufferError::BufferTooSmall);
        }
        Ok(Framebuffer {
            buf,
            geom,
            defio: DeferredIo::new(DEFAULT_DEFIO_DELAY),
            #[cfg(feature = "graphics")]
            rotation: DisplayRotation::default(),
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    /// The pixel bytes, e.g. for handing to the driver directly
    pub fn buffer(&self) -> &[u8] {
        &self.buf[..self.geom.buffer_len()]
    }

    /// Deferred-flush delay in milliseconds
    pub fn defio_delay_ms(&self) -> u32 {
        ticks_to_ms(self.defio.delay_ticks())
    }

    /// Set the deferred-flush delay; floors at one tick like the original
    pub fn set_defio_delay_ms(&mut self, ms: u32) {
        self.defio.set_delay_ticks(ms_to_ticks(ms));
    }

    /// The slow seek-and-write path. Writes past the end are clamped;
    /// returns the number of bytes stored.
    pub fn write(&mut self, offset: usize, data: &[u8], now: u64) -> usize {
        let len = self.geom.buffer_len();
        if offset >= len {
            return 0;
        }
        let count = data.len().min(len - offset);
        self.buf[offset..offset + count].copy_from_slice(&data[..count]);
        self.defio.touch_bytes(&self.geom, offset, count, now);
        count
    }

    /// Read back pixel bytes, clamped like [`write`](Self::write)
    pub fn read(&self, offset: usize, out: &mut [u8]) -> usize {
        let len = self.geom.buffer_len();
        if offset >= len {
            return 0;
        }
        let count = out.len().min(len - offset);
        out[..count].copy_from_slice(&self.buf[offset..offset + count]);
        count
    }

    /// Fill a rectangle with one color
    pub fn fill_rect(&mut self, rect: Rect, color: Color, now: u64) {
        if rect.x1 >= self.geom.width || rect.y1 >= self.geom.height {
            return;
        }
        let rect = rect.clip(self.geom.width, self.geom.height);
        let width = self.geom.width as usize;
        let value = color.get_byte_value();
        for y in rect.y1..=rect.y2 {
            let start = y as usize * width + rect.x1 as usize;
            let len = rect.width() as usize;
            self.buf[start..start + len].fill(value);
            self.defio.mark_bytes(&self.geom, start, len);
        }
        self.defio.schedule(now);
    }

    /// Copy a rectangle to another position, overlap-safe
    pub fn copy_area(&mut self, src: Rect, dst_x: u16, dst_y: u16, now: u64) {
        if src.x1 >= self.geom.width || src.y1 >= self.geom.height {
            return;
        }
        let src = src.clip(self.geom.width, self.geom.height);
        if dst_x >= self.geom.width || dst_y >= self.geom.height {
            return;
        }
        let cols = src.width().min(self.geom.width - dst_x) as usize;
        let rows = src.height().min(self.geom.height - dst_y) as usize;
        let width = self.geom.width as usize;

        for i in 0..rows {
            // walk backwards when moving down so overlapping rows survive
            let row = if dst_y > src.y1 { rows - 1 - i } else { i };
            let s = (src.y1 as usize + row) * width + src.x1 as usize;
            let d = (dst_y as usize + row) * width + dst_x as usize;
            self.buf.copy_within(s..s + cols, d);
            self.defio.mark_bytes(&self.geom, d, cols);
        }
        self.defio.schedule(now);
    }

    /// Expand a monochrome bitmap (rows padded to whole bytes, MSB first,
    /// set bits = foreground) into the framebuffer
    #[allow(clippy::too_many_arguments)]
    pub fn image_blit(
        &mut self,
        mono: &[u8],
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        fg: Color,
        bg: Color,
        now: u64,
    ) {
        if x >= self.geom.width || y >= self.geom.height {
            return;
        }
        let stride = (w as usize + 7) / 8;
        let width = self.geom.width as usize;
        for row in 0..h {
            if y + row >= self.geom.height {
                break;
            }
            let cols = w.min(self.geom.width - x) as usize;
            let start = (y + row) as usize * width + x as usize;
            for col in 0..cols {
                let bit = mono[row as usize * stride + col / 8] >> (7 - col % 8) & 1;
                self.buf[start + col] = if bit != 0 {
                    fg.get_byte_value()
                } else {
                    bg.get_byte_value()
                };
            }
            self.defio.mark_bytes(&self.geom, start, cols);
        }
        self.defio.schedule(now);
    }

    /// (Re)arm the deferred flush, e.g. after drawing through
    /// [`embedded_graphics_core::draw_target::DrawTarget`]
    pub fn schedule(&mut self, now: u64) {
        self.defio.schedule(now);
    }

    /// Is a flush queued?
    pub fn is_pending(&self) -> bool {
        self.defio.is_pending()
    }

    /// Drop queued damage, e.g. right before `suspend`
    pub fn cancel_pending(&mut self) {
        self.defio.cancel();
    }

    /// Drain the deferred flush: once the debounce window has elapsed, fold
    /// the dirty pages into a plan and push it through the driver.
    ///
    /// Returns whether anything went out to the panel. `now` is the host's
    /// tick counter at [`crate::attrs::TICK_HZ`].
    pub fn service<BUS, DELAY>(
        &mut self,
        now: u64,
        epd: &mut Epd6in0<BUS, DELAY>,
        delay: &mut DELAY,
    ) -> Result<bool, ErrorKind<BUS::Error>>
    where
        BUS: ApolloBus,
        DELAY: DelayNs,
    {
        if !self.defio.due(now) {
            return Ok(false);
        }
        let plan = self.defio.take_plan(&self.geom, epd.options());
        let frame = &self.buf[..self.geom.buffer_len()];
        match plan {
            UpdatePlan::None => Ok(false),
            UpdatePlan::Full => {
                debug!("apollo: deferred flush, full refresh");
                epd.update_frame(frame, delay)?;
                Ok(true)
            }
            UpdatePlan::Partial(bands) => {
                debug!("apollo: deferred flush, {} band(s)", bands.len());
                for band in &bands {
                    epd.update_partial_frame(frame, *band, delay)?;
                }
                Ok(true)
            }
        }
    }
}

#[cfg(feature = "graphics")]
impl Framebuffer<'_> {
    /// Set the drawing rotation.
    ///
    /// This only concerns future drawing made through [`DrawTarget`]; the
    /// panel-side orientation is the driver's
    /// [`set_rotation`](crate::epd6in0::Epd6in0::set_rotation).
    pub fn set_rotation(&mut self, rotation: DisplayRotation) {
        self.rotation = rotation;
    }

    /// Get current drawing rotation
    pub fn rotation(&self) -> DisplayRotation {
        self.rotation
    }

    /// Set a specific pixel, marking its page dirty
    pub fn set_pixel(&mut self, pixel: Pixel<Color>) {
        let Pixel(point, color) = pixel;
        let width = self.geom.width as i32;
        let height = self.geom.height as i32;

        let (x, y) = match self.rotation {
            DisplayRotation::Rotate0 => (point.x, point.y),
            DisplayRotation::Rotate90 => (width - 1 - point.y, point.x),
            DisplayRotation::Rotate180 => (width - 1 - point.x, height - 1 - point.y),
            DisplayRotation::Rotate270 => (point.y, height - 1 - point.x),
        };

        // anything out of range is silently dropped
        if x < 0 || x >= width || y < 0 || y >= height {
            return;
        }

        let index = y as usize * width as usize + x as usize;
        self.buf[index] = color.get_byte_value();
        self.defio.mark_bytes(&self.geom, index, 1);
    }
}

#[cfg(feature = "graphics")]
impl DrawTarget for Framebuffer<'_> {
    type Color = Color;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel);
        }
        Ok(())
    }
}

#[cfg(feature = "graphics")]
impl OriginDimensions for Framebuffer<'_> {
    fn size(&self) -> Size {
        match self.rotation {
            DisplayRotation::Rotate0 | DisplayRotation::Rotate180 => {
                Size::new(self.geom.width as u32, self.geom.height as u32)
            }
            DisplayRotation::Rotate90 | DisplayRotation::Rotate270 => {
                Size::new(self.geom.height as u32, self.geom.width as u32)
            }
        }
    }
}
