//! Disk layer: fixed-size pages, bitmap-based extent allocation, and the
//! file-backed [`DiskManager`] that turns logical page ids into positioned
//! reads/writes.
//!
//! Grounded on `src/page/bitmap_page.cpp` and `src/page/disk_file_meta_page.cpp`.

mod bitmap;
mod manager;

pub use bitmap::BitmapPage;
pub use manager::DiskManager;

/// A logical page number, unique within one database file.
pub type PageId = i32;
