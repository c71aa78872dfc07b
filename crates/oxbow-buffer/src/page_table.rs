//! Page table mapping resident page numbers to frame IDs.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::collections::HashMap;
use oxbow_common::page::PageNum;

/// Residency index for the buffer pool.
///
/// Maps each cached page to the single frame holding it; a page is in
/// the table exactly while it is resident, so no two frames ever claim
/// the same page.
pub struct PageTable {
    inner: Mutex<HashMap<PageNum, FrameId>>,
}

impl PageTable {
    /// Creates a new page table with capacity for the given number of frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Looks up a page and returns the frame holding it, if resident.
    pub fn get(&self, page_num: PageNum) -> Option<FrameId> {
        self.inner.lock().get(&page_num).copied()
    }

    /// Inserts a page-to-frame mapping, replacing any previous entry.
    pub fn insert(&self, page_num: PageNum, frame_id: FrameId) {
        self.inner.lock().insert(page_num, frame_id);
    }

    /// Removes a page mapping. Returns the frame it occupied, if any.
    pub fn remove(&self, page_num: PageNum) -> Option<FrameId> {
        self.inner.lock().remove(&page_num)
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_num: PageNum) -> bool {
        self.inner.lock().contains_key(&page_num)
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no pages are resident.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Removes every mapping.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
