//! Buffer pool manager.

use crate::frame::{Frame, FrameId};
use crate::page_table::PageTable;
use crate::policy::{ReplacementPolicy, Replacer};
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use sysinfo::System;
use oxbow_common::page::{PageNum, NO_PAGE, PAGE_SIZE};
use oxbow_common::{OxbowError, Result, StorageConfig};
use oxbow_storage::PageStore;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// Replacement policy used to pick eviction victims.
    pub policy: ReplacementPolicy,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: 1024,
            policy: ReplacementPolicy::default(),
        }
    }
}

impl BufferPoolConfig {
    /// Derives a pool configuration from storage settings, with the
    /// default replacement policy.
    pub fn from_storage(config: &StorageConfig) -> Self {
        Self {
            num_frames: config.buffer_pool_pages,
            policy: ReplacementPolicy::default(),
        }
    }

    /// Replaces the replacement policy.
    pub fn with_policy(mut self, policy: ReplacementPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Buffer pool manager.
///
/// Caches fixed-size pages from a [`PageStore`] in a bounded frame table,
/// with:
/// - Page number to frame ID mapping
/// - Free frame list for cold frames
/// - Pluggable replacement (FIFO, LRU, LRU-K, LFU, CLOCK) for eviction
/// - Fix counting so in-use pages are never evicted
/// - Dirty tracking with write-back on eviction, force, and flush
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Backing store; the pool issues every page read and write-back itself.
    store: Box<dyn PageStore>,
    /// Array of frames; the sole in-memory representation of cached pages.
    frames: Vec<Frame>,
    /// Page number to frame ID mapping.
    page_table: PageTable,
    /// Frames never yet populated, popped in ascending index order.
    free_list: Mutex<Vec<FrameId>>,
    /// Victim selector.
    replacer: Replacer,
    /// Cleared once shutdown completes.
    open: AtomicBool,
    /// Pages loaded from disk since open; doubles as the FIFO cursor.
    loads: AtomicU64,
    /// Pins served since open; stamps LRU recency.
    tick: AtomicU64,
    /// Block writes issued since open.
    write_count: AtomicU64,
}

impl BufferPool {
    /// Opens a buffer pool over the given store.
    pub fn open(store: Box<dyn PageStore>, config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| Frame::new(FrameId(i as u32)))
            .collect();

        // Reversed so pop() hands out frame 0 first
        let free_list: Vec<_> = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        debug!(
            "opened buffer pool: {} frames, {:?} replacement",
            num_frames, config.policy
        );

        Self {
            replacer: Replacer::new(config.policy),
            config,
            store,
            frames,
            page_table: PageTable::new(num_frames),
            free_list: Mutex::new(free_list),
            open: AtomicBool::new(true),
            loads: AtomicU64::new(0),
            tick: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        }
    }

    /// Returns a frame count sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames to ensure useful caching even on low-memory
    /// systems. No upper limit.
    pub fn auto_sized_frames() -> usize {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        (target_bytes / PAGE_SIZE).max(1_000)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the active replacement policy.
    pub fn policy(&self) -> ReplacementPolicy {
        self.replacer.policy()
    }

    /// Returns true until shutdown completes.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Returns the number of never-populated frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Checks if a page is resident in the pool.
    pub fn contains(&self, page_num: PageNum) -> bool {
        self.page_table.contains(page_num)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(OxbowError::PoolNotOpen)
        }
    }

    /// Pins a page, loading it from the store if it is not resident.
    ///
    /// On a miss with no free frame the replacement policy picks an
    /// unpinned victim, which is written back first when dirty. The
    /// returned handle is valid until the matching
    /// [`unpin_page`](BufferPool::unpin_page); prefer
    /// [`pin`](BufferPool::pin) for a handle that releases itself.
    pub fn pin_page(&self, page_num: PageNum) -> Result<PageHandle<'_>> {
        if !self.is_open() {
            // A pin on a closed pool reports the page, not the pool;
            // callers depend on this mapping.
            return Err(OxbowError::PageNotPinned(page_num));
        }
        if page_num < 0 {
            return Err(OxbowError::NegativePageNum(page_num));
        }

        // Hit path
        if let Some(frame_id) = self.page_table.get(page_num) {
            let frame = &self.frames[frame_id.0 as usize];
            frame.pin();
            let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
            self.replacer.note_hit(frame, tick);
            return Ok(PageHandle { page_num, frame });
        }

        // Miss: claim a frame (free first, then eviction)
        let frame_id = self.allocate_frame()?;
        let frame = &self.frames[frame_id.0 as usize];

        if let Err(e) = self.load_into(frame, page_num) {
            // No frame may stay half populated after a failed read
            frame.reset();
            self.free_list.lock().push(frame_id);
            return Err(e);
        }

        frame.install(page_num);
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        self.replacer.note_install(frame, tick);
        self.page_table.insert(page_num, frame_id);
        self.loads.fetch_add(1, Ordering::AcqRel);

        trace!("installed page {} into {}", page_num, frame_id);
        Ok(PageHandle { page_num, frame })
    }

    /// Pins a page and returns a guard that unpins on drop.
    pub fn pin(&self, page_num: PageNum) -> Result<PinnedPage<'_>> {
        let handle = self.pin_page(page_num)?;
        Ok(PinnedPage { pool: self, handle })
    }

    /// Claims a frame for an incoming page.
    ///
    /// Tries the free list first, then asks the policy for a victim.
    /// A dirty victim is written back before its frame is reused.
    fn allocate_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        let loads = self.loads.load(Ordering::Acquire);
        let victim_id = self
            .replacer
            .select_victim(&self.frames, loads)
            .ok_or(OxbowError::NoEvictableFrame)?;
        let frame = &self.frames[victim_id.0 as usize];

        if let Some(old_page) = frame.page_num() {
            if frame.is_dirty() {
                trace!("evicting dirty page {} from {}", old_page, victim_id);
                let data = frame.read_data();
                self.store.write_block(old_page, &data)?;
                drop(data);
                frame.set_dirty(false);
                self.write_count.fetch_add(1, Ordering::AcqRel);
            } else {
                trace!("evicting clean page {} from {}", old_page, victim_id);
            }
            self.page_table.remove(old_page);
        }

        Ok(victim_id)
    }

    /// Reads a page from the store into a frame's buffer, growing the
    /// store first so pins of brand-new pages succeed.
    fn load_into(&self, frame: &Frame, page_num: PageNum) -> Result<()> {
        self.store.ensure_capacity(page_num)?;
        let mut data = frame.write_data();
        self.store.read_block(page_num, &mut data)
    }

    /// Releases one pin on the page behind `handle`.
    pub fn unpin_page(&self, handle: &PageHandle<'_>) -> Result<()> {
        self.ensure_open()?;

        let page_num = handle.page_num;
        let frame_id = self
            .page_table
            .get(page_num)
            .ok_or(OxbowError::PageNotResident(page_num))?;
        let frame = &self.frames[frame_id.0 as usize];

        if frame.fix_count() == 0 {
            return Err(OxbowError::PageNotPinned(page_num));
        }
        frame.unpin();
        Ok(())
    }

    /// Marks the page behind `handle` as modified.
    pub fn mark_dirty(&self, handle: &PageHandle<'_>) -> Result<()> {
        self.ensure_open()?;

        let page_num = handle.page_num;
        let frame_id = self
            .page_table
            .get(page_num)
            .ok_or(OxbowError::PageNotResident(page_num))?;
        self.frames[frame_id.0 as usize].set_dirty(true);
        Ok(())
    }

    /// Writes the page behind `handle` to the store unconditionally and
    /// clears its dirty bit.
    pub fn force_page(&self, handle: &PageHandle<'_>) -> Result<()> {
        self.ensure_open()?;

        let page_num = handle.page_num;
        let frame_id = self
            .page_table
            .get(page_num)
            .ok_or(OxbowError::PageNotResident(page_num))?;
        let frame = &self.frames[frame_id.0 as usize];

        let data = frame.read_data();
        self.store.write_block(page_num, &data)?;
        drop(data);
        frame.set_dirty(false);
        self.write_count.fetch_add(1, Ordering::AcqRel);

        trace!("forced page {} to disk", page_num);
        Ok(())
    }

    /// Writes back every dirty unpinned frame and clears its dirty bit.
    ///
    /// Pinned frames are skipped even when dirty; they stay dirty.
    pub fn flush_all(&self) -> Result<()> {
        self.ensure_open()?;
        self.flush_unpinned()
    }

    fn flush_unpinned(&self) -> Result<()> {
        let mut flushed = 0;
        for frame in &self.frames {
            if frame.fix_count() != 0 || !frame.is_dirty() {
                continue;
            }
            let Some(page_num) = frame.page_num() else {
                continue;
            };
            let data = frame.read_data();
            self.store.write_block(page_num, &data)?;
            drop(data);
            frame.set_dirty(false);
            self.write_count.fetch_add(1, Ordering::AcqRel);
            flushed += 1;
        }
        if flushed > 0 {
            debug!("flushed {} dirty pages", flushed);
        }
        Ok(())
    }

    /// Shuts the pool down: flushes dirty unpinned frames, empties the
    /// frame table, and refuses further operations.
    ///
    /// Fails without touching pool state while any page is pinned, so a
    /// caller can unpin and retry.
    pub fn shutdown(&self) -> Result<()> {
        if !self.is_open() {
            return Err(OxbowError::PoolAlreadyClosed);
        }

        let pinned = self.frames.iter().filter(|f| f.is_pinned()).count();
        if pinned > 0 {
            return Err(OxbowError::PinnedPagesInBuffer { count: pinned });
        }

        self.flush_unpinned()?;

        for frame in &self.frames {
            frame.reset();
        }
        self.page_table.clear();
        let mut free_list = self.free_list.lock();
        *free_list = (0..self.config.num_frames)
            .rev()
            .map(|i| FrameId(i as u32))
            .collect();
        drop(free_list);

        self.open.store(false, Ordering::Release);
        debug!("buffer pool shut down");
        Ok(())
    }

    /// Returns the page cached in each frame, in frame order.
    /// Empty frames report [`NO_PAGE`].
    pub fn frame_contents(&self) -> Vec<PageNum> {
        self.frames
            .iter()
            .map(|f| f.page_num().unwrap_or(NO_PAGE))
            .collect()
    }

    /// Returns the dirty flag of each frame, in frame order.
    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.is_dirty()).collect()
    }

    /// Returns the fix count of each frame, in frame order.
    pub fn fix_counts(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.fix_count()).collect()
    }

    /// Returns the read I/O figure: one more than the number of pages
    /// loaded from disk since open.
    ///
    /// The off-by-one is a compatibility convention existing callers
    /// depend on; it reports 1 before the first load.
    pub fn read_io_count(&self) -> u64 {
        self.loads.load(Ordering::Acquire) + 1
    }

    /// Returns the exact number of block writes issued since open.
    pub fn write_io_count(&self) -> u64 {
        self.write_count.load(Ordering::Acquire)
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;
        for frame in &self.frames {
            if frame.is_empty() {
                continue;
            }
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: self.free_count(),
            used_frames: self.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Best-effort flush for a pool dropped while open
        if self.is_open() {
            let _ = self.flush_unpinned();
        }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of never-populated frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// Non-owning view of a pinned page.
///
/// The pool owns the underlying buffer; the handle is valid from the pin
/// that produced it until the matching unpin. Writes through
/// [`data_mut`](PageHandle::data_mut) must be followed by
/// [`BufferPool::mark_dirty`] to be written back.
pub struct PageHandle<'a> {
    page_num: PageNum,
    frame: &'a Frame,
}

impl<'a> PageHandle<'a> {
    /// Returns the page number.
    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    /// Returns read access to the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }

    /// Returns write access to the page data.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>> {
        self.frame.write_data()
    }
}

/// RAII pin: a [`PageHandle`] that releases its pin on drop.
pub struct PinnedPage<'a> {
    pool: &'a BufferPool,
    handle: PageHandle<'a>,
}

impl<'a> PinnedPage<'a> {
    /// Returns the page number.
    pub fn page_num(&self) -> PageNum {
        self.handle.page_num()
    }

    /// Returns the underlying handle.
    pub fn handle(&self) -> &PageHandle<'a> {
        &self.handle
    }

    /// Returns read access to the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>> {
        self.handle.data()
    }

    /// Returns write access to the page data.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>> {
        self.handle.data_mut()
    }

    /// Marks the page as modified.
    pub fn mark_dirty(&self) -> Result<()> {
        self.pool.mark_dirty(&self.handle)
    }

    /// Writes the page to the store unconditionally.
    pub fn force(&self) -> Result<()> {
        self.pool.force_page(&self.handle)
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        let _ = self.pool.unpin_page(&self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    /// In-memory page store that records every block write.
    struct MockStore {
        inner: Mutex<MockStoreInner>,
        fail_reads: AtomicBool,
    }

    struct MockStoreInner {
        pages: HashMap<PageNum, Box<[u8; PAGE_SIZE]>>,
        num_pages: u32,
        writes: Vec<PageNum>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                inner: Mutex::new(MockStoreInner {
                    pages: HashMap::new(),
                    num_pages: 0,
                    writes: Vec::new(),
                }),
                fail_reads: AtomicBool::new(false),
            }
        }

        fn writes(&self) -> Vec<PageNum> {
            self.inner.lock().writes.clone()
        }

        fn page_byte(&self, page_num: PageNum, offset: usize) -> u8 {
            self.inner.lock().pages.get(&page_num).map_or(0, |p| p[offset])
        }

        fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::Release);
        }
    }

    impl PageStore for MockStore {
        fn num_pages(&self) -> Result<u32> {
            Ok(self.inner.lock().num_pages)
        }

        fn ensure_capacity(&self, page_num: PageNum) -> Result<()> {
            let mut inner = self.inner.lock();
            let wanted = page_num as u32 + 1;
            if inner.num_pages < wanted {
                inner.num_pages = wanted;
            }
            Ok(())
        }

        fn read_block(&self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
            if self.fail_reads.load(Ordering::Acquire) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected read fault").into());
            }
            let inner = self.inner.lock();
            if page_num as u32 >= inner.num_pages {
                return Err(OxbowError::ReadOutOfBounds(page_num));
            }
            match inner.pages.get(&page_num) {
                Some(page) => buf.copy_from_slice(&page[..]),
                None => buf.fill(0),
            }
            Ok(())
        }

        fn write_block(&self, page_num: PageNum, buf: &[u8; PAGE_SIZE]) -> Result<()> {
            let mut inner = self.inner.lock();
            let mut page = Box::new([0u8; PAGE_SIZE]);
            page.copy_from_slice(buf);
            inner.pages.insert(page_num, page);
            inner.writes.push(page_num);
            if page_num as u32 >= inner.num_pages {
                inner.num_pages = page_num as u32 + 1;
            }
            Ok(())
        }
    }

    fn create_test_pool(num_frames: usize, policy: ReplacementPolicy) -> BufferPool {
        BufferPool::open(
            Box::new(MockStore::new()),
            BufferPoolConfig { num_frames, policy },
        )
    }

    /// Pool plus a second reference to its mock store for inspection.
    fn create_observed_pool(
        num_frames: usize,
        policy: ReplacementPolicy,
    ) -> (BufferPool, std::sync::Arc<MockStore>) {
        let store = std::sync::Arc::new(MockStore::new());
        let pool = BufferPool::open(
            Box::new(SharedStore(store.clone())),
            BufferPoolConfig { num_frames, policy },
        );
        (pool, store)
    }

    struct SharedStore(std::sync::Arc<MockStore>);

    impl PageStore for SharedStore {
        fn num_pages(&self) -> Result<u32> {
            self.0.num_pages()
        }
        fn ensure_capacity(&self, page_num: PageNum) -> Result<()> {
            self.0.ensure_capacity(page_num)
        }
        fn read_block(&self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
            self.0.read_block(page_num, buf)
        }
        fn write_block(&self, page_num: PageNum, buf: &[u8; PAGE_SIZE]) -> Result<()> {
            self.0.write_block(page_num, buf)
        }
    }

    #[test]
    fn test_pool_open_state() {
        let pool = create_test_pool(10, ReplacementPolicy::Lru);

        assert!(pool.is_open());
        assert_eq!(pool.num_frames(), 10);
        assert_eq!(pool.free_count(), 10);
        assert_eq!(pool.page_count(), 0);
        assert_eq!(pool.policy(), ReplacementPolicy::Lru);
        assert_eq!(pool.frame_contents(), vec![NO_PAGE; 10]);
        assert_eq!(pool.dirty_flags(), vec![false; 10]);
        assert_eq!(pool.fix_counts(), vec![0; 10]);
        // Legacy figure: 1 before any load
        assert_eq!(pool.read_io_count(), 1);
        assert_eq!(pool.write_io_count(), 0);
    }

    #[test]
    fn test_pin_miss_installs_page() {
        let pool = create_test_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(5).unwrap();
        assert_eq!(handle.page_num(), 5);
        assert!(pool.contains(5));
        assert_eq!(pool.frame_contents(), vec![5, NO_PAGE, NO_PAGE]);
        assert_eq!(pool.fix_counts(), vec![1, 0, 0]);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.read_io_count(), 2);
    }

    #[test]
    fn test_pin_hit_increments_fix_count() {
        let pool = create_test_pool(3, ReplacementPolicy::Lru);

        let h1 = pool.pin_page(5).unwrap();
        let h2 = pool.pin_page(5).unwrap();
        assert_eq!(pool.fix_counts(), vec![2, 0, 0]);
        // Second pin was a hit: no extra load
        assert_eq!(pool.read_io_count(), 2);

        pool.unpin_page(&h2).unwrap();
        pool.unpin_page(&h1).unwrap();
        assert_eq!(pool.fix_counts(), vec![0, 0, 0]);
    }

    #[test]
    fn test_pin_fills_frames_in_order() {
        let pool = create_test_pool(3, ReplacementPolicy::Fifo);

        for page in 1..=3 {
            let handle = pool.pin_page(page).unwrap();
            pool.unpin_page(&handle).unwrap();
        }
        assert_eq!(pool.frame_contents(), vec![1, 2, 3]);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pin_negative_page_num() {
        let pool = create_test_pool(3, ReplacementPolicy::Lru);

        let result = pool.pin_page(-1);
        assert!(matches!(result, Err(OxbowError::NegativePageNum(-1))));
    }

    #[test]
    fn test_unpin_errors() {
        let pool = create_test_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        pool.unpin_page(&handle).unwrap();

        // Page resident but no outstanding pin
        let result = pool.unpin_page(&handle);
        assert!(matches!(result, Err(OxbowError::PageNotPinned(1))));
    }

    #[test]
    fn test_unpin_nonresident_page() {
        let pool = create_test_pool(1, ReplacementPolicy::Fifo);

        let h1 = pool.pin_page(1).unwrap();
        pool.unpin_page(&h1).unwrap();
        // Evicts page 1; the stale handle now misses
        let _h2 = pool.pin_page(2).unwrap();

        let result = pool.unpin_page(&h1);
        assert!(matches!(result, Err(OxbowError::PageNotResident(1))));
    }

    #[test]
    fn test_mark_dirty_and_flush_all() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        pool.mark_dirty(&handle).unwrap();
        assert_eq!(pool.dirty_flags(), vec![true, false, false]);
        pool.unpin_page(&handle).unwrap();

        pool.flush_all().unwrap();
        assert_eq!(pool.dirty_flags(), vec![false, false, false]);
        assert_eq!(store.writes(), vec![1]);
        assert_eq!(pool.write_io_count(), 1);

        // Nothing dirty: flush again writes nothing
        pool.flush_all().unwrap();
        assert_eq!(pool.write_io_count(), 1);
    }

    #[test]
    fn test_flush_all_skips_pinned_dirty_frames() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        let pinned = pool.pin_page(1).unwrap();
        pool.mark_dirty(&pinned).unwrap();

        let unpinned = pool.pin_page(2).unwrap();
        pool.mark_dirty(&unpinned).unwrap();
        pool.unpin_page(&unpinned).unwrap();

        pool.flush_all().unwrap();

        // Only the unpinned dirty page went out; the pinned one stays dirty
        assert_eq!(store.writes(), vec![2]);
        assert_eq!(pool.dirty_flags(), vec![true, false, false]);
    }

    #[test]
    fn test_force_page_writes_unconditionally() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        // Clean page: force still writes
        pool.force_page(&handle).unwrap();
        assert_eq!(store.writes(), vec![1]);
        assert_eq!(pool.write_io_count(), 1);

        pool.mark_dirty(&handle).unwrap();
        pool.force_page(&handle).unwrap();
        assert_eq!(store.writes(), vec![1, 1]);
        assert!(!pool.dirty_flags()[0]);
    }

    #[test]
    fn test_force_round_trip_through_store() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        handle.data_mut()[0] = 0xAB;
        pool.mark_dirty(&handle).unwrap();
        pool.force_page(&handle).unwrap();
        pool.unpin_page(&handle).unwrap();

        assert_eq!(store.page_byte(1, 0), 0xAB);
    }

    #[test]
    fn test_eviction_writes_back_dirty_victim() {
        let (pool, store) = create_observed_pool(1, ReplacementPolicy::Fifo);

        let handle = pool.pin_page(1).unwrap();
        handle.data_mut()[0] = 0x42;
        pool.mark_dirty(&handle).unwrap();
        pool.unpin_page(&handle).unwrap();

        // Page 2 evicts page 1, which must be written back first
        let _h2 = pool.pin_page(2).unwrap();

        assert_eq!(store.writes(), vec![1]);
        assert_eq!(pool.write_io_count(), 1);
        assert_eq!(store.page_byte(1, 0), 0x42);
        assert_eq!(pool.frame_contents(), vec![2]);
    }

    #[test]
    fn test_eviction_clean_victim_no_write() {
        let (pool, store) = create_observed_pool(1, ReplacementPolicy::Fifo);

        let handle = pool.pin_page(1).unwrap();
        pool.unpin_page(&handle).unwrap();
        let _h2 = pool.pin_page(2).unwrap();

        assert!(store.writes().is_empty());
        assert_eq!(pool.write_io_count(), 0);
    }

    #[test]
    fn test_no_evictable_frame() {
        let pool = create_test_pool(2, ReplacementPolicy::Fifo);

        let _h1 = pool.pin_page(1).unwrap();
        let _h2 = pool.pin_page(2).unwrap();

        let result = pool.pin_page(3);
        assert!(matches!(result, Err(OxbowError::NoEvictableFrame)));
        // Pool state untouched by the failed pin
        assert_eq!(pool.frame_contents(), vec![1, 2]);
        assert_eq!(pool.fix_counts(), vec![1, 1]);
    }

    #[test]
    fn test_pinned_page_survives_eviction_pressure() {
        let pool = create_test_pool(2, ReplacementPolicy::Fifo);

        let _h1 = pool.pin_page(1).unwrap(); // stays pinned
        let h2 = pool.pin_page(2).unwrap();
        pool.unpin_page(&h2).unwrap();

        let _h3 = pool.pin_page(3).unwrap();

        // Page 2's slot was reused; page 1 is untouchable
        assert_eq!(pool.frame_contents(), vec![1, 3]);
        assert_eq!(pool.fix_counts(), vec![1, 1]);
    }

    #[test]
    fn test_failed_read_rolls_back_frame() {
        let (pool, store) = create_observed_pool(2, ReplacementPolicy::Lru);

        store.set_fail_reads(true);
        assert!(pool.pin_page(1).is_err());

        // The claimed frame went back to the free list, empty
        assert_eq!(pool.frame_contents(), vec![NO_PAGE, NO_PAGE]);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.page_count(), 0);
        assert_eq!(pool.read_io_count(), 1);

        store.set_fail_reads(false);
        let handle = pool.pin_page(1).unwrap();
        assert_eq!(handle.page_num(), 1);
    }

    #[test]
    fn test_shutdown_with_pinned_page_fails() {
        let pool = create_test_pool(2, ReplacementPolicy::Fifo);

        let handle = pool.pin_page(1).unwrap();

        let result = pool.shutdown();
        assert!(matches!(
            result,
            Err(OxbowError::PinnedPagesInBuffer { count: 1 })
        ));
        // State preserved: the pool still works
        assert!(pool.is_open());
        assert_eq!(pool.frame_contents(), vec![1, NO_PAGE]);

        pool.unpin_page(&handle).unwrap();
        pool.shutdown().unwrap();
        assert!(!pool.is_open());
    }

    #[test]
    fn test_shutdown_flushes_dirty_pages() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        pool.mark_dirty(&handle).unwrap();
        pool.unpin_page(&handle).unwrap();

        pool.shutdown().unwrap();
        assert_eq!(store.writes(), vec![1]);
        assert_eq!(pool.frame_contents(), vec![NO_PAGE, NO_PAGE, NO_PAGE]);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_operations_after_shutdown() {
        let pool = create_test_pool(2, ReplacementPolicy::Lru);

        let handle = pool.pin_page(1).unwrap();
        pool.unpin_page(&handle).unwrap();
        pool.shutdown().unwrap();

        assert!(matches!(
            pool.pin_page(1),
            Err(OxbowError::PageNotPinned(1))
        ));
        assert!(matches!(pool.flush_all(), Err(OxbowError::PoolNotOpen)));
        assert!(matches!(
            pool.unpin_page(&handle),
            Err(OxbowError::PoolNotOpen)
        ));
        assert!(matches!(pool.shutdown(), Err(OxbowError::PoolAlreadyClosed)));
    }

    #[test]
    fn test_pinned_page_guard_unpins_on_drop() {
        let pool = create_test_pool(3, ReplacementPolicy::Lru);

        {
            let page = pool.pin(1).unwrap();
            assert_eq!(page.page_num(), 1);
            assert_eq!(pool.fix_counts(), vec![1, 0, 0]);
        }

        assert_eq!(pool.fix_counts(), vec![0, 0, 0]);
    }

    #[test]
    fn test_pinned_page_guard_write_path() {
        let (pool, store) = create_observed_pool(3, ReplacementPolicy::Lru);

        {
            let page = pool.pin(1).unwrap();
            page.data_mut()[7] = 0x99;
            page.mark_dirty().unwrap();
        }

        pool.flush_all().unwrap();
        assert_eq!(store.page_byte(1, 7), 0x99);
    }

    #[test]
    fn test_stats() {
        let pool = create_test_pool(10, ReplacementPolicy::Lru);

        for page in 0..5 {
            let handle = pool.pin_page(page).unwrap();
            if page % 2 == 0 {
                pool.mark_dirty(&handle).unwrap();
                pool.unpin_page(&handle).unwrap();
            }
            // Odd pages remain pinned
        }

        let stats = pool.stats();
        assert_eq!(stats.total_frames, 10);
        assert_eq!(stats.free_frames, 5);
        assert_eq!(stats.used_frames, 5);
        assert_eq!(stats.pinned_frames, 2); // Pages 1, 3
        assert_eq!(stats.dirty_frames, 3); // Pages 0, 2, 4
    }

    #[test]
    fn test_config_from_storage() {
        let storage = StorageConfig {
            buffer_pool_pages: 64,
            ..Default::default()
        };

        let config = BufferPoolConfig::from_storage(&storage);
        assert_eq!(config.num_frames, 64);
        assert_eq!(config.policy, ReplacementPolicy::default());

        let config = BufferPoolConfig::from_storage(&storage)
            .with_policy(ReplacementPolicy::Clock);
        assert_eq!(config.policy, ReplacementPolicy::Clock);

        let pool = BufferPool::open(Box::new(MockStore::new()), config);
        assert_eq!(pool.num_frames(), 64);
        assert_eq!(pool.policy(), ReplacementPolicy::Clock);
    }

    #[test]
    fn test_auto_sized_frames_floor() {
        let frames = BufferPool::auto_sized_frames();
        assert!(frames >= 1_000);
    }

    #[test]
    fn test_read_io_count_tracks_loads_only() {
        let pool = create_test_pool(2, ReplacementPolicy::Lru);

        let h1 = pool.pin_page(1).unwrap();
        pool.unpin_page(&h1).unwrap();
        let h1 = pool.pin_page(1).unwrap(); // hit
        pool.unpin_page(&h1).unwrap();
        let h2 = pool.pin_page(2).unwrap(); // load
        pool.unpin_page(&h2).unwrap();

        // 2 loads, reported with the +1 convention
        assert_eq!(pool.read_io_count(), 3);
    }
}
