//! Maps logical page ids onto a single backing file.
//!
//! Physical layout: physical page 0 is a small disk-meta page (allocation
//! counters), and pages are grouped into extents of [`BITMAP_SIZE`] logical
//! pages each, every extent prefixed by one [`BitmapPage`] tracking which of
//! its data pages are in use:
//!
//! ```text
//! phys(0) = meta
//! phys(1) = bitmap for extent 0
//! phys(2..2+BITMAP_SIZE) = data pages of extent 0
//! phys(2+BITMAP_SIZE) = bitmap for extent 1
//! ...
//! ```
//!
//! which collapses to `phys(L) = 2 + L + L / BITMAP_SIZE` for logical page
//! `L`. Grounded on `src/storage/disk_manager.cpp` from the original
//! implementation; positional file I/O is grounded on the nervusdb pager
//! reference (`FileExt::read_at`/`write_at` rather than a shared cursor).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use super::bitmap::BitmapPage;
use super::PageId;
use crate::config::{BITMAP_SIZE, MAX_VALID_PAGE_ID, PAGE_SIZE};
use crate::error::{Error, Result};

const META_MAGIC: u32 = 0x4d45_5441; // "META"
const META_PHYSICAL_PAGE: u64 = 0;

/// Disk-resident allocation counters, kept mirrored in memory and flushed
/// back to physical page 0 after every structural change.
struct DiskMeta {
    num_allocated_pages: u32,
    num_extents: u32,
}

impl DiskMeta {
    fn encode(&self) -> [u8; PAGE_SIZE] {
        let mut buf = [0u8; PAGE_SIZE];
        buf[0..4].copy_from_slice(&META_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.num_allocated_pages.to_le_bytes());
        buf[8..12].copy_from_slice(&self.num_extents.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; PAGE_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != META_MAGIC {
            return Err(Error::InvalidMagic { what: "disk meta page" });
        }
        Ok(Self {
            num_allocated_pages: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            num_extents: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
        })
    }
}

/// Owns the backing file and performs all logical<->physical page
/// translation, extent creation and bitmap bookkeeping.
pub struct DiskManager {
    path: PathBuf,
    file: File,
    meta: DiskMeta,
}

impl DiskManager {
    /// Open (creating if absent) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| Error::OpenFailed { path: path.clone(), source })?;

        let len = file.metadata()?.len();
        let meta = if len == 0 {
            debug!("initializing new database file at {:?}", path);
            let meta = DiskMeta { num_allocated_pages: 0, num_extents: 0 };
            file.write_at(&meta.encode(), META_PHYSICAL_PAGE * PAGE_SIZE as u64)?;
            meta
        } else {
            let mut buf = [0u8; PAGE_SIZE];
            read_physical(&file, META_PHYSICAL_PAGE, &mut buf)?;
            DiskMeta::decode(&buf)?
        };

        Ok(Self { path, file, meta })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn physical_page(logical: PageId) -> u64 {
        let l = logical as u64;
        2 + l + l / BITMAP_SIZE as u64
    }

    fn bitmap_physical_page(extent: u32) -> u64 {
        1 + extent as u64 * (BITMAP_SIZE as u64 + 1)
    }

    fn flush_meta(&self) -> Result<()> {
        write_physical(&self.file, META_PHYSICAL_PAGE, &self.meta.encode())?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Read logical page `page_id` into `buf`. Pages never written to are
    /// returned zero-filled rather than erroring.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let phys = Self::physical_page(page_id);
        trace!("read_page logical={page_id} physical={phys}");
        read_physical(&self.file, phys, buf)
    }

    /// Write `buf` to logical page `page_id` and flush it durably.
    pub fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let phys = Self::physical_page(page_id);
        trace!("write_page logical={page_id} physical={phys}");
        write_physical(&self.file, phys, buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Allocate and return a new logical page id, opening a fresh extent if
    /// the last one is full or none exists yet.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if self.meta.num_allocated_pages as i64 >= MAX_VALID_PAGE_ID as i64 {
            return Err(Error::BufferPoolExhausted);
        }

        let mut extent = self.meta.num_extents.saturating_sub(1);
        let mut bitmap_buf = [0u8; PAGE_SIZE];

        let need_new_extent = if self.meta.num_extents == 0 {
            true
        } else {
            read_physical(&self.file, Self::bitmap_physical_page(extent), &mut bitmap_buf)?;
            BitmapPage::new(&mut bitmap_buf).is_full()
        };

        if need_new_extent {
            extent = self.meta.num_extents;
            bitmap_buf = [0u8; PAGE_SIZE];
            BitmapPage::init(&mut bitmap_buf);
            self.meta.num_extents += 1;
        }

        let offset = {
            let mut bitmap = BitmapPage::new(&mut bitmap_buf);
            bitmap.allocate_page().ok_or(Error::BufferPoolExhausted)?
        };
        write_physical(&self.file, Self::bitmap_physical_page(extent), &bitmap_buf)?;

        self.meta.num_allocated_pages += 1;
        self.flush_meta()?;

        let logical = extent as u64 * BITMAP_SIZE as u64 + offset as u64;
        debug!("allocate_page -> {logical}");
        Ok(logical as PageId)
    }

    /// Mark `page_id` free. A no-op if it is already free.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        let l = page_id as u64;
        let extent = (l / BITMAP_SIZE as u64) as u32;
        let offset = (l % BITMAP_SIZE as u64) as u32;

        let mut bitmap_buf = [0u8; PAGE_SIZE];
        read_physical(&self.file, Self::bitmap_physical_page(extent), &mut bitmap_buf)?;
        let freed = {
            let mut bitmap = BitmapPage::new(&mut bitmap_buf);
            bitmap.deallocate_page(offset)
        };
        if freed {
            write_physical(&self.file, Self::bitmap_physical_page(extent), &bitmap_buf)?;
            self.meta.num_allocated_pages -= 1;
            self.flush_meta()?;
        }
        Ok(())
    }

    /// Whether `page_id` is currently free according to its extent's bitmap.
    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        let l = page_id as u64;
        let extent = (l / BITMAP_SIZE as u64) as u32;
        let offset = (l % BITMAP_SIZE as u64) as u32;
        if extent >= self.meta.num_extents {
            return Ok(true);
        }
        let mut bitmap_buf = [0u8; PAGE_SIZE];
        read_physical(&self.file, Self::bitmap_physical_page(extent), &mut bitmap_buf)?;
        Ok(BitmapPage::new(&mut bitmap_buf).is_page_free(offset))
    }
}

fn read_physical(file: &File, physical_page: u64, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
    let offset = physical_page * PAGE_SIZE as u64;
    match file.read_at(buf, offset) {
        Ok(n) if n == PAGE_SIZE => Ok(()),
        Ok(n) => {
            // short read past current EOF: treat the unread tail as zero.
            buf[n..].fill(0);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            buf.fill(0);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_physical(file: &File, physical_page: u64, buf: &[u8; PAGE_SIZE]) -> Result<()> {
    let offset = physical_page * PAGE_SIZE as u64;
    file.write_all_at(buf, offset)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocate_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("db")).unwrap();
        let pid = dm.allocate_page().unwrap();
        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(pid, &mut out).unwrap();
        assert_eq!(out, [0u8; PAGE_SIZE]);

        let mut payload = [0u8; PAGE_SIZE];
        payload[0] = 42;
        dm.write_page(pid, &payload).unwrap();
        dm.read_page(pid, &mut out).unwrap();
        assert_eq!(out[0], 42);
    }

    #[test]
    fn allocation_crosses_extent_boundary() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("db")).unwrap();
        let mut last = -1;
        for _ in 0..(BITMAP_SIZE + 5) {
            last = dm.allocate_page().unwrap();
        }
        assert_eq!(last, BITMAP_SIZE as PageId + 4);
        assert_eq!(dm.meta.num_extents, 2);
    }

    #[test]
    fn deallocate_then_reallocate_reuses_page() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::open(dir.path().join("db")).unwrap();
        let a = dm.allocate_page().unwrap();
        let _b = dm.allocate_page().unwrap();
        dm.deallocate_page(a).unwrap();
        let c = dm.allocate_page().unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn reopening_preserves_allocation_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let pid = {
            let mut dm = DiskManager::open(&path).unwrap();
            dm.allocate_page().unwrap()
        };
        let mut dm = DiskManager::open(&path).unwrap();
        assert!(!dm.is_page_free(pid).unwrap());
        let next = dm.allocate_page().unwrap();
        assert_ne!(next, pid);
    }
}
