//! Logical address space: arbitrary byte windows over a physical store.

use std::sync::Arc;

use crate::store::PhysicalStore;
use crate::{Error, Result};

/// Disc sector size: the unit of physical reads issued below this layer.
pub const SECTOR_SIZE: usize = 0x8000;

/// Arbitrary-window reader over a [`PhysicalStore`].
///
/// Splits any `(offset, length)` request into sector-aligned physical
/// reads and reassembles them, so callers never observe sector rounding.
/// Cloning is cheap; the store is shared.
#[derive(Clone)]
pub struct AddressSpace {
    store: Arc<dyn PhysicalStore>,
    sector_size: usize,
    base: u64,
    size: u64,
}

impl AddressSpace {
    pub fn new(store: Arc<dyn PhysicalStore>) -> Self {
        let size = store.size();
        Self {
            store,
            sector_size: SECTOR_SIZE,
            base: 0,
            size,
        }
    }

    /// Override the physical read granularity (hashed contents use their
    /// 0x10000-byte block size).
    pub fn with_sector_size(mut self, sector_size: usize) -> Self {
        assert!(sector_size != 0, "sector size must be non-zero");
        self.sector_size = sector_size;
        self
    }

    /// Scope a view to the byte range `[offset, offset + length)` of this
    /// space. The store is shared; only the window shifts. This is how a
    /// single content's region of a disc image is handed to the
    /// decryption engine.
    pub fn narrow(&self, offset: u64, length: u64) -> Result<AddressSpace> {
        self.check(offset, length)?;
        Ok(Self {
            store: self.store.clone(),
            sector_size: self.sector_size,
            base: self.base + offset,
            size: length,
        })
    }

    /// Declared size of this view.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn check(&self, offset: u64, length: u64) -> Result<()> {
        if offset
            .checked_add(length)
            .is_none_or(|end| end > self.size)
        {
            return Err(Error::OutOfBounds {
                offset,
                length,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Read `length` bytes at `offset`.
    ///
    /// The request is served as a loop of sector-sized physical reads,
    /// each sliced down to the part inside the window. A physical short
    /// read before the declared size is satisfied is fatal.
    pub fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.check(offset, length as u64)?;

        let sector_size = self.sector_size as u64;
        let store_size = self.store.size();
        let mut out = Vec::with_capacity(length);
        let mut sector = vec![0u8; self.sector_size];
        let mut pos = self.base + offset;
        let end = pos + length as u64;

        while pos < end {
            let start = pos / sector_size * sector_size;
            // The final sector of the store may be partial.
            let want = sector_size.min(store_size - start) as usize;
            let got = self.store.read_at(start, &mut sector[..want])?;

            let lo = (pos - start) as usize;
            let hi = (end - start).min(want as u64) as usize;
            if got < hi {
                return Err(Error::ShortRead {
                    offset: start,
                    expected: hi,
                    actual: got,
                });
            }

            out.extend_from_slice(&sector[lo..hi]);
            pos = start + hi as u64;
        }
        Ok(out)
    }
}
