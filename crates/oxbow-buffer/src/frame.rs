//! Buffer frame management.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use oxbow_common::page::{PageNum, NO_PAGE, PAGE_SIZE};

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single page.
///
/// Each frame contains:
/// - The actual page data (PAGE_SIZE bytes)
/// - Metadata for buffer management (fix count, dirty flag)
/// - Per-policy replacement metadata (recency stamp, reference count,
///   reference bit)
pub struct Frame {
    /// Frame identifier.
    frame_id: FrameId,
    /// The page currently cached in this frame (NO_PAGE = empty).
    page_num: AtomicI32,
    /// Page data buffer.
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
    /// Number of outstanding pins by clients.
    fix_count: AtomicU32,
    /// Whether the page has been modified since the last write-back.
    dirty: AtomicBool,
    /// Recency stamp for LRU replacement (value of the pool tick at last pin).
    hit_tick: AtomicU64,
    /// Reference count for LFU replacement.
    ref_count: AtomicU32,
    /// Reference bit for CLOCK replacement.
    reference_bit: AtomicBool,
}

impl Frame {
    /// Creates a new empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_num: AtomicI32::new(NO_PAGE),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
            fix_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            hit_tick: AtomicU64::new(0),
            ref_count: AtomicU32::new(0),
            reference_bit: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page cached in this frame, or None if the frame is empty.
    #[inline]
    pub fn page_num(&self) -> Option<PageNum> {
        let n = self.page_num.load(Ordering::Acquire);
        if n == NO_PAGE {
            None
        } else {
            Some(n)
        }
    }

    /// Sets the page cached in this frame.
    #[inline]
    pub fn set_page_num(&self, page_num: Option<PageNum>) {
        self.page_num
            .store(page_num.unwrap_or(NO_PAGE), Ordering::Release);
    }

    /// Returns true if this frame holds no page.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_num.load(Ordering::Acquire) == NO_PAGE
    }

    /// Returns the current fix count.
    #[inline]
    pub fn fix_count(&self) -> u32 {
        self.fix_count.load(Ordering::Acquire)
    }

    /// Increments the fix count and returns the previous value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.fix_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrements the fix count and returns the new value.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.fix_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Underflow protection: restore to 0
            self.fix_count.store(0, Ordering::Release);
            return 0;
        }
        prev - 1
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.fix_count.load(Ordering::Acquire) > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Marks this frame dirty or clean.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Returns the LRU recency stamp.
    #[inline]
    pub fn hit_tick(&self) -> u64 {
        self.hit_tick.load(Ordering::Relaxed)
    }

    /// Sets the LRU recency stamp.
    #[inline]
    pub fn set_hit_tick(&self, tick: u64) {
        self.hit_tick.store(tick, Ordering::Relaxed);
    }

    /// Returns the LFU reference count.
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Relaxed)
    }

    /// Increments the LFU reference count.
    #[inline]
    pub fn bump_ref(&self) {
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the CLOCK reference bit.
    #[inline]
    pub fn reference_bit(&self) -> bool {
        self.reference_bit.load(Ordering::Relaxed)
    }

    /// Sets the CLOCK reference bit.
    #[inline]
    pub fn set_reference_bit(&self, value: bool) {
        self.reference_bit.store(value, Ordering::Relaxed);
    }

    /// Reads the page data.
    #[inline]
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Writes to the page data.
    #[inline]
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Installs a freshly loaded page: one pin, clean, replacement
    /// metadata cleared. Policy-specific metadata is stamped separately
    /// by the replacer.
    ///
    /// The caller is responsible for having filled the data buffer first.
    pub fn install(&self, page_num: PageNum) {
        self.page_num.store(page_num, Ordering::Release);
        self.fix_count.store(1, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.hit_tick.store(0, Ordering::Relaxed);
        self.ref_count.store(0, Ordering::Relaxed);
        self.reference_bit.store(false, Ordering::Relaxed);
    }

    /// Resets the frame to the empty state, zeroing the buffer.
    pub fn reset(&self) {
        self.page_num.store(NO_PAGE, Ordering::Release);
        self.fix_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.hit_tick.store(0, Ordering::Relaxed);
        self.ref_count.store(0, Ordering::Relaxed);
        self.reference_bit.store(false, Ordering::Relaxed);
        let mut data = self.data.write();
        data.fill(0);
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("page_num", &self.page_num())
            .field("fix_count", &self.fix_count())
            .field("dirty", &self.is_dirty())
            .field("hit_tick", &self.hit_tick())
            .field("ref_count", &self.ref_count())
            .field("reference_bit", &self.reference_bit())
            .finish()
    }
}
