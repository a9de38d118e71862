//! Content metadata consumed from the title-metadata (TMD) layer.
//!
//! Parsing the TMD and ticket binaries stays upstream; the decryption
//! engine only borrows the results collected here.

use std::sync::Arc;

use sha1::{Digest, Sha1};

use crate::decrypt::{BLOCK_SIZE, HASHES_PER_BLOCK, PAYLOAD_SIZE};
use crate::{Error, Result};

/// One content record, as carried by a TMD.
#[derive(Clone, Debug)]
pub struct ContentEntry {
    pub id: u32,
    /// 16-bit content index; seeds the fixed IV and the hash-table tweak.
    pub index: u16,
    /// Size on disc (ciphertext size for encrypted contents). Hashed
    /// contents are whole multiples of the 0x10000-byte block size.
    pub size: u64,
    pub hashed: bool,
    pub encrypted: bool,
    /// SHA-1 reference hash from the TMD record. For hashed contents this
    /// covers the content's H3 table.
    pub hash: [u8; 20],
}

impl ContentEntry {
    /// Number of 0x10000-byte physical blocks a hashed content occupies.
    pub fn block_count(&self) -> u64 {
        self.size / BLOCK_SIZE as u64
    }

    /// Size of the decrypted view: hashed contents lose the 0x400-byte
    /// hash area of every block, everything else decrypts 1:1.
    pub fn decrypted_size(&self) -> u64 {
        if self.hashed {
            self.block_count() * PAYLOAD_SIZE as u64
        } else {
            self.size
        }
    }
}

/// Outer reference hashes ("H3") for one hashed content.
///
/// One 20-byte SHA-1 entry per group of 16 blocks. The engine verifies
/// every decrypted H0 table against its group's entry, chaining the
/// per-block tables up to this externally trusted root. Read-only after
/// construction and shareable across concurrent readers.
#[derive(Clone)]
pub struct H3Table {
    data: Arc<[u8]>,
}

impl H3Table {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() || data.len() % 20 != 0 {
            return Err(Error::Parse("H3 table length is not a multiple of 20"));
        }
        Ok(Self { data: data.into() })
    }

    /// Reference hash for the group containing physical block `block`.
    pub fn group_hash(&self, block: u64) -> Result<&[u8]> {
        let start = (block / HASHES_PER_BLOCK as u64) as usize * 20;
        self.data.get(start..start + 20).ok_or(Error::OutOfBounds {
            offset: start as u64,
            length: 20,
            size: self.data.len() as u64,
        })
    }

    /// Check the table against the TMD's reference hash for the content.
    pub fn matches(&self, expected: &[u8; 20]) -> bool {
        let digest: [u8; 20] = Sha1::digest(&self.data).into();
        digest == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_hash_indexes_by_block_group() {
        let mut data = vec![0u8; 40];
        data[20..].fill(0xAB);
        let table = H3Table::new(data).unwrap();

        assert_eq!(table.group_hash(0).unwrap(), &[0u8; 20]);
        assert_eq!(table.group_hash(15).unwrap(), &[0u8; 20]);
        assert_eq!(table.group_hash(16).unwrap(), &[0xABu8; 20]);
        assert!(table.group_hash(32).is_err());
    }

    #[test]
    fn decrypted_size_strips_hash_areas() {
        let entry = ContentEntry {
            id: 0,
            index: 0,
            size: 0x20000,
            hashed: true,
            encrypted: true,
            hash: [0; 20],
        };
        assert_eq!(entry.block_count(), 2);
        assert_eq!(entry.decrypted_size(), 2 * 0xFC00);
    }

    #[test]
    fn matches_compares_table_digest() {
        let data = vec![0x11u8; 20];
        let digest: [u8; 20] = Sha1::digest(&data).into();
        let table = H3Table::new(data).unwrap();
        assert!(table.matches(&digest));
        assert!(!table.matches(&[0; 20]));
    }
}
