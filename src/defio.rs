//! Dirty-page tracking, coalescing and the deferred flush window.
//!
//! Framebuffer writes land in ordinary memory; what goes out to the panel is
//! decided here. Touched pages are collected in a bitmap, a debounce deadline
//! is (re)armed on every write, and when it expires the dirty set is folded
//! into either one full refresh or a bounded list of row bands.
//!
//! Coalescing adjacent pages amortizes the fixed per-rectangle protocol cost
//! (8 coordinate bytes plus the mode checks); the refresh threshold bounds
//! the worst case against one full-screen update.

use bit_field::BitField;
use heapless::Vec;

use crate::attrs::Options;
use crate::rect::Rect;

/// Size of one dirty-tracking page in bytes, matching the MMU pages the
/// original deferred-io path watched
pub const PAGE_SIZE: usize = 4096;

/// Most bands a single flush may carry; denser damage becomes a full refresh
pub const MAX_BANDS: usize = 16;

const PAGE_WORDS: usize = 8;
const PAGE_CAPACITY: usize = PAGE_WORDS * 32;

/// Geometry of the byte-per-pixel framebuffer, used for page → row math.
///
/// Runtime-parameterized so the coalescer can be exercised at small sizes;
/// the panel constant lives in [`crate::epd6in0::GEOMETRY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Panel width in pixels (bytes per framebuffer row)
    pub width: u16,
    /// Panel height in pixels
    pub height: u16,
    /// Dirty-tracking page size in bytes
    pub page_size: usize,
}

impl Geometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Geometry {
            width,
            height,
            page_size: PAGE_SIZE,
        }
    }

    pub const fn with_page_size(width: u16, height: u16, page_size: usize) -> Self {
        Geometry {
            width,
            height,
            page_size,
        }
    }

    /// Length of the byte-per-pixel framebuffer
    pub const fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of dirty-tracking pages covering the framebuffer
    pub const fn pages(&self) -> usize {
        (self.buffer_len() + self.page_size - 1) / self.page_size
    }

    pub(crate) fn page_of(&self, offset: usize) -> usize {
        offset / self.page_size
    }

    /// The row range covered by a contiguous page run, clipped to the panel
    fn page_rows(&self, start_page: usize, end_page: usize) -> (u16, u16) {
        let y1 = start_page * self.page_size / self.width as usize;
        let mut y2 = ((end_page + 1) * self.page_size - 1) / self.width as usize;
        if y2 >= self.height as usize {
            y2 = self.height as usize - 1;
        }
        (y1 as u16, y2 as u16)
    }
}

/// Fixed-capacity set of dirty page indices
struct PageSet {
    words: [u32; PAGE_WORDS],
    count: u16,
    overflow: bool,
}

impl PageSet {
    const fn new() -> Self {
        PageSet {
            words: [0; PAGE_WORDS],
            count: 0,
            overflow: false,
        }
    }

    fn insert(&mut self, page: usize) {
        if page >= PAGE_CAPACITY {
            self.overflow = true;
            return;
        }
        if !self.words[page / 32].get_bit(page % 32) {
            self.words[page / 32].set_bit(page % 32, true);
            self.count += 1;
        }
    }

    fn len(&self) -> usize {
        self.count as usize
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn overflowed(&self) -> bool {
        self.overflow
    }

    fn clear(&mut self) {
        *self = PageSet::new();
    }

    /// Dirty pages in index order
    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..PAGE_CAPACITY).filter(|&page| self.words[page / 32].get_bit(page % 32))
    }
}

/// What the coalescer decided to push to the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Nothing dirty
    None,
    /// One full-screen refresh
    Full,
    /// Pairwise disjoint row bands, 4-aligned and clipped to the panel
    Partial(Vec<Rect, MAX_BANDS>),
}

/// Debounced dirty tracker behind the framebuffer.
///
/// A write marks pages and re-arms the deadline, superseding a pending
/// flush; a single consumer drains it once the deadline passes. Time is the
/// host's monotonic tick counter at [`crate::attrs::TICK_HZ`].
pub struct DeferredIo {
    pages: PageSet,
    deadline: Option<u64>,
    delay_ticks: u32,
}

impl DeferredIo {
    pub fn new(delay_ticks: u32) -> Self {
        DeferredIo {
            pages: PageSet::new(),
            deadline: None,
            delay_ticks,
        }
    }

    pub fn delay_ticks(&self) -> u32 {
        self.delay_ticks
    }

    pub fn set_delay_ticks(&mut self, ticks: u32) {
        self.delay_ticks = ticks;
    }

    /// Mark the pages under a byte range dirty without touching the deadline
    pub(crate) fn mark_bytes(&mut self, geom: &Geometry, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let first = geom.page_of(offset);
        let last = geom.page_of(offset + len - 1);
        for page in first..=last {
            self.pages.insert(page);
        }
    }

    /// (Re)arm the flush deadline
    pub fn schedule(&mut self, now: u64) {
        self.deadline = Some(now + self.delay_ticks as u64);
    }

    /// Mark dirty and re-arm in one go
    pub(crate) fn touch_bytes(&mut self, geom: &Geometry, offset: usize, len: usize, now: u64) {
        self.mark_bytes(geom, offset, len);
        self.schedule(now);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Has the debounce window elapsed?
    pub fn due(&self, now: u64) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Drop the pending deadline and any accumulated damage (used on
    /// suspend; callers wanting the damage out call `service` first)
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pages.clear();
    }

    /// Fold the dirty set into an update plan and clear it.
    ///
    /// Contiguous page runs become full-width row bands; bands that overlap
    /// after grid alignment are merged, so the result is pairwise disjoint
    /// while still covering every dirty page.
    // TODO: track damaged columns as well so narrow updates stop paying for
    // full-width bands
    pub fn take_plan(&mut self, geom: &Geometry, options: &Options) -> UpdatePlan {
        self.deadline = None;

        if self.pages.is_empty() && !self.pages.overflowed() {
            return UpdatePlan::None;
        }

        let full = !options.partial_update
            || self.pages.overflowed()
            || self.pages.len() >= options.refresh_threshold as usize;
        if full {
            self.pages.clear();
            return UpdatePlan::Full;
        }

        let mut bands: Vec<Rect, MAX_BANDS> = Vec::new();
        let mut run: Option<(usize, usize)> = None;
        let mut spill = false;

        for page in self.pages.iter() {
            run = match run {
                None => Some((page, page)),
                Some((start, end)) if page == end + 1 => Some((start, page)),
                Some((start, end)) => {
                    spill |= push_band(&mut bands, geom, start, end).is_err();
                    Some((page, page))
                }
            };
        }
        if let Some((start, end)) = run {
            spill |= push_band(&mut bands, geom, start, end).is_err();
        }

        self.pages.clear();

        if spill {
            UpdatePlan::Full
        } else {
            UpdatePlan::Partial(bands)
        }
    }
}

/// Append one page run as an aligned band, merging into the previous band
/// when alignment made them overlap
fn push_band(
    bands: &mut Vec<Rect, MAX_BANDS>,
    geom: &Geometry,
    start_page: usize,
    end_page: usize,
) -> Result<(), ()> {
    let (y1, y2) = geom.page_rows(start_page, end_page);
    let band = Rect::rows(y1, y2, geom.width)
        .align4()
        .clip(geom.width, geom.height);

    if let Some(last) = bands.last_mut() {
        if band.y1 <= last.y2 {
            last.y2 = last.y2.max(band.y2);
            return Ok(());
        }
    }
    bands.push(band).map_err(|_| ())
}
