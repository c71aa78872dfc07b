//! Page addressing for OxbowDB storage.

/// Size of a disk page in bytes (4 KB).
///
/// Every buffer frame and every block transferred by the storage layer is
/// exactly this many bytes.
pub const PAGE_SIZE: usize = 4 * 1024;

/// Address of a page within the page file (0-indexed).
///
/// Real pages are non-negative; the type is signed so that [`NO_PAGE`] can
/// travel through the same channels as a page number, which is what callers
/// of the frame-inspection API expect.
pub type PageNum = i32;

/// Sentinel page number reported for a frame that holds no page.
pub const NO_PAGE: PageNum = -1;

/// Byte offset of a page within the page file.
pub fn page_offset(page_num: PageNum) -> u64 {
    debug_assert!(page_num >= 0);
    page_num as u64 * PAGE_SIZE as u64
}
