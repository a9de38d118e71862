//! Sector-remapped compressed container ("WUX").
//!
//! Identical sectors of a dump are stored once; an index table maps every
//! logical sector to the physical sector that actually holds its bytes.
//!
//! ## Layout
//! ```text
//! [0x00] magic0 "WUX0"                      (u32 LE)
//! [0x04] magic1 0x1099D02E                  (u32 LE)
//! [0x08] sector size                        (u32 LE)
//! [0x0C] flags                              (u32 LE)
//! [0x10] uncompressed total size            (u64 LE)
//! [0x18] reserved                           (8 bytes)
//! [0x20] index table, one u32 LE per logical sector,
//!        ceil(uncompressed_size / sector_size) entries
//! [ aligned up to the next sector boundary ]
//!        sector data
//! ```
//!
//! An index entry of `0xFFFF_FFFF` marks a logical sector with no backing
//! data; it reads as zeros without touching the file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::PhysicalStore;
use crate::{Error, Result};

/// First magic field, "WUX0".
pub const WUX_MAGIC_0: u32 = 0x3058_5557;
/// Second magic field.
pub const WUX_MAGIC_1: u32 = 0x1099_D02E;

const HEADER_SIZE: u64 = 0x20;

/// Logical sector with no backing physical sector; reads as zeros.
const UNMAPPED: u32 = u32::MAX;

/// Compressed container with sector remapping.
#[derive(Debug)]
pub struct WuxStore {
    file: Mutex<File>,
    sector_size: u64,
    uncompressed_size: u64,
    data_offset: u64,
    // Loaded once at open; read-only afterwards, shared without locking.
    index: Vec<u32>,
}

impl WuxStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::InvalidHeader("file shorter than the container header")
            } else {
                Error::Io(e)
            }
        })?;

        let magic0 = u32::from_le_bytes(header[0x00..0x04].try_into().unwrap());
        let magic1 = u32::from_le_bytes(header[0x04..0x08].try_into().unwrap());
        if magic0 != WUX_MAGIC_0 || magic1 != WUX_MAGIC_1 {
            let mut found = [0u8; 8];
            found.copy_from_slice(&header[..8]);
            return Err(Error::BadMagic { found });
        }

        let sector_size = u32::from_le_bytes(header[0x08..0x0C].try_into().unwrap()) as u64;
        let _flags = u32::from_le_bytes(header[0x0C..0x10].try_into().unwrap());
        let uncompressed_size = u64::from_le_bytes(header[0x10..0x18].try_into().unwrap());
        if sector_size == 0 || sector_size % 16 != 0 {
            return Err(Error::InvalidHeader("sector size is not a cipher multiple"));
        }

        // Everything below derives deterministically from the header.
        let entries = uncompressed_size.div_ceil(sector_size);
        let mut raw = vec![0u8; entries as usize * 4];
        file.read_exact(&mut raw).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::InvalidHeader("index table shorter than the declared entry count")
            } else {
                Error::Io(e)
            }
        })?;
        let index = raw
            .chunks_exact(4)
            .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
            .collect();

        let table_end = HEADER_SIZE + entries * 4;
        let data_offset = table_end.div_ceil(sector_size) * sector_size;
        log::debug!(
            "wux: {entries} sectors of {sector_size:#x} bytes, data at {data_offset:#x}"
        );

        Ok(Self {
            file: Mutex::new(file),
            sector_size,
            uncompressed_size,
            data_offset,
            index,
        })
    }
}

impl PhysicalStore for WuxStore {
    fn read_at(&self, mut offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut read = 0;
        while read < buf.len() && offset < self.uncompressed_size {
            let sector = (offset / self.sector_size) as usize;
            let within = offset % self.sector_size;

            // One physical read per logical sector; a request never crosses
            // a sector boundary in a single read.
            let want = (self.sector_size - within)
                .min((buf.len() - read) as u64)
                .min(self.uncompressed_size - offset) as usize;
            let chunk = &mut buf[read..read + want];

            match self.index[sector] {
                UNMAPPED => chunk.fill(0),
                physical => {
                    let pos = self.data_offset + physical as u64 * self.sector_size + within;
                    let mut file = self.file.lock().unwrap();
                    file.seek(SeekFrom::Start(pos))?;
                    file.read_exact(chunk).map_err(|e| {
                        if e.kind() == io::ErrorKind::UnexpectedEof {
                            Error::ShortRead {
                                offset: pos,
                                expected: want,
                                actual: 0,
                            }
                        } else {
                            Error::Io(e)
                        }
                    })?;
                }
            }

            read += want;
            offset += want as u64;
        }
        Ok(read)
    }

    fn size(&self) -> u64 {
        self.uncompressed_size
    }
}
