use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use super::PhysicalStore;
use crate::{Error, Result};

/// Fixed-size shard files concatenated into one logical image.
///
/// Dump tools split large images into parts of a fixed size; only the last
/// part may be shorter. A read that spans a part boundary continues into
/// the next file, closing the previous handle first.
#[derive(Debug)]
pub struct SplitStore {
    shards: Vec<PathBuf>,
    shard_size: u64,
    size: u64,
}

impl SplitStore {
    /// Open a shard set in logical order.
    ///
    /// Every shard must exist up front; a missing file is a configuration
    /// error, never a short read. All shards but the last must fill the
    /// declared shard size exactly.
    pub fn open(shards: Vec<PathBuf>, shard_size: u64) -> Result<Self> {
        if shard_size == 0 {
            return Err(Error::InvalidHeader("shard size is zero"));
        }

        let mut size = 0;
        for (i, path) in shards.iter().enumerate() {
            let meta = match path.metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(Error::MissingShard(path.clone()));
                }
                Err(e) => return Err(Error::Io(e)),
            };
            if i + 1 < shards.len() && meta.len() != shard_size {
                return Err(Error::InvalidHeader(
                    "shard shorter than the declared shard size",
                ));
            }
            size += meta.len();
        }

        Ok(Self {
            shards,
            shard_size,
            size,
        })
    }
}

impl PhysicalStore for SplitStore {
    fn read_at(&self, mut offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut read = 0;
        while read < buf.len() && offset < self.size {
            let shard = (offset / self.shard_size) as usize;
            let within = offset % self.shard_size;
            let path = &self.shards[shard];

            // One handle at a time: the previous shard's file is dropped
            // before the next one opens.
            let mut file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(Error::MissingShard(path.clone()));
                }
                Err(e) => return Err(Error::Io(e)),
            };
            file.seek(SeekFrom::Start(within))?;

            let in_shard = (self.shard_size - within).min((buf.len() - read) as u64) as usize;
            let mut taken = 0;
            while taken < in_shard {
                match file.read(&mut buf[read + taken..read + in_shard])? {
                    0 => break,
                    n => taken += n,
                }
            }
            if taken == 0 {
                break;
            }
            read += taken;
            offset += taken as u64;
        }
        Ok(read)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
