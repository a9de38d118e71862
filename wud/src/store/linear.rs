use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::PhysicalStore;
use crate::Result;

/// Single raw image file with identity offset mapping.
pub struct LinearStore {
    // Seek+read must stay paired; the handle is shared across requests.
    file: Mutex<File>,
    size: u64,
}

impl LinearStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl PhysicalStore for LinearStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;

        let mut read = 0;
        while read < buf.len() {
            match file.read(&mut buf[read..])? {
                0 => break,
                n => read += n,
            }
        }
        Ok(read)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
