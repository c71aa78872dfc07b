//! Page file management: block-exact I/O over a single page-addressed file.

use log::debug;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use oxbow_common::page::{page_offset, PageNum, PAGE_SIZE};
use oxbow_common::{OxbowError, Result, StorageConfig};

/// Block-level storage interface consumed by the buffer pool.
///
/// Pages are addressed by non-negative integers; every transfer moves
/// exactly [`PAGE_SIZE`] bytes.
pub trait PageStore: Send + Sync {
    /// Returns the number of pages currently in the store.
    fn num_pages(&self) -> Result<u32>;

    /// Grows the store with zeroed pages until `page_num` is addressable.
    /// No-op if the page already exists.
    fn ensure_capacity(&self, page_num: PageNum) -> Result<()>;

    /// Fills `buf` with the contents of the given page.
    fn read_block(&self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Persists `buf` at the given page's block position.
    fn write_block(&self, page_num: PageNum, buf: &[u8; PAGE_SIZE]) -> Result<()>;
}

/// A page file on disk.
///
/// Opening is idempotent: the file is created on first open and reopened
/// in place afterwards. All methods take `&self`; the handle and the
/// cached page count live behind a mutex.
pub struct PageFile {
    /// Path to the file.
    path: PathBuf,
    /// Enable fsync after writes.
    fsync_enabled: bool,
    /// Open handle and cached page count.
    inner: Mutex<PageFileInner>,
}

struct PageFileInner {
    file: File,
    num_pages: u32,
}

impl PageFile {
    /// Opens (or creates) the page file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        debug!("opened page file {:?} with {} pages", path, num_pages);

        Ok(Self {
            path,
            fsync_enabled: true,
            inner: Mutex::new(PageFileInner { file, num_pages }),
        })
    }

    /// Opens (or creates) the page file named `file_name` under the
    /// configured data directory, honoring the config's fsync setting.
    ///
    /// The data directory is created if missing.
    pub fn open_in(config: &StorageConfig, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let file = Self::open(config.data_dir.join(file_name))?;
        Ok(file.with_fsync(config.fsync_enabled))
    }

    /// Toggles fsync-after-write. On by default.
    pub fn with_fsync(mut self, enabled: bool) -> Self {
        self.fsync_enabled = enabled;
        self
    }

    /// Returns the path of the page file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one zeroed page and returns its page number.
    pub fn allocate_page(&self) -> Result<PageNum> {
        let mut inner = self.inner.lock();
        let page_num = inner.num_pages as PageNum;

        inner.file.seek(SeekFrom::Start(page_offset(page_num)))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }
        inner.num_pages += 1;

        Ok(page_num)
    }

    fn check_page_num(page_num: PageNum) -> Result<()> {
        if page_num < 0 {
            return Err(OxbowError::NegativePageNum(page_num));
        }
        Ok(())
    }
}

impl PageStore for PageFile {
    fn num_pages(&self) -> Result<u32> {
        Ok(self.inner.lock().num_pages)
    }

    fn ensure_capacity(&self, page_num: PageNum) -> Result<()> {
        Self::check_page_num(page_num)?;

        let mut inner = self.inner.lock();
        let wanted = page_num as u32 + 1;
        if inner.num_pages >= wanted {
            return Ok(());
        }

        debug!(
            "growing page file {:?} from {} to {} pages",
            self.path, inner.num_pages, wanted
        );

        let offset = inner.num_pages as u64 * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        let zeroes = [0u8; PAGE_SIZE];
        for _ in inner.num_pages..wanted {
            inner.file.write_all(&zeroes)?;
        }
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }
        inner.num_pages = wanted;

        Ok(())
    }

    fn read_block(&self, page_num: PageNum, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        Self::check_page_num(page_num)?;

        let mut inner = self.inner.lock();
        if page_num as u32 >= inner.num_pages {
            return Err(OxbowError::ReadOutOfBounds(page_num));
        }

        inner.file.seek(SeekFrom::Start(page_offset(page_num)))?;
        inner.file.read_exact(buf)?;

        Ok(())
    }

    fn write_block(&self, page_num: PageNum, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        Self::check_page_num(page_num)?;

        let mut inner = self.inner.lock();
        inner.file.seek(SeekFrom::Start(page_offset(page_num)))?;
        inner.file.write_all(buf)?;
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        // Writing past EOF extends the file
        if page_num as u32 >= inner.num_pages {
            inner.num_pages = page_num as u32 + 1;
        }

        Ok(())
    }
}

impl Drop for PageFile {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        let _ = inner.file.sync_all();
    }
}
