//! Content decryption engines: plain CBC sectors and the nested hash-tree
//! protocol.
//!
//! Plain contents are decrypted in independent 0x8000-byte sectors (or as
//! one chained CBC stream when read sequentially). Hashed contents are
//! laid out in 0x10000-byte blocks whose first 0x400 bytes hold a table of
//! sixteen SHA-1 hashes ("H0"); the table entry for a block doubles as the
//! IV of its 0xFC00-byte payload, so a payload that fails verification
//! also fails to decrypt to a matching hash. Each decrypted table is in
//! turn checked against the externally supplied H3 hash for its group,
//! chaining everything up to the TMD's trusted root.

use std::io::{self, Read};

use sha1::{Digest, Sha1};

use crate::address::{AddressSpace, SECTOR_SIZE};
use crate::crypto::{content_iv, decrypt_cbc, offset_iv};
use crate::title::{ContentEntry, H3Table};
use crate::{Error, Result};

/// Physical block size of hashed contents.
pub const BLOCK_SIZE: usize = 0x10000;
/// Hash area at the head of every hashed block: 16 SHA-1 entries.
pub const HASHES_SIZE: usize = 0x400;
/// Decrypted payload carried by one hashed block.
pub const PAYLOAD_SIZE: usize = BLOCK_SIZE - HASHES_SIZE;
/// H0 entries per hash area; also the number of blocks per H3 group.
pub const HASHES_PER_BLOCK: usize = 16;

/// What to do when a hash check fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerifyMode {
    /// Abort the read on the first mismatch.
    #[default]
    Strict,
    /// Log a warning and keep the (possibly corrupt) bytes. This matches
    /// the legacy tooling around this format; opt in only when diffing
    /// known-damaged images.
    Lenient,
}

/// Per-request decryption engine for one content.
///
/// Created cheaply per read request; the address space and hash table it
/// holds are shared handles. Offsets passed to [`read`](Self::read) are
/// positions in the decrypted view of the content.
#[derive(Clone)]
pub struct ContentDecrypter {
    space: AddressSpace,
    key: [u8; 16],
    content: ContentEntry,
    hashes: Option<H3Table>,
    mode: VerifyMode,
}

impl ContentDecrypter {
    /// `space` must be scoped to the content's byte range on disc (see
    /// [`AddressSpace::narrow`]).
    pub fn new(space: AddressSpace, key: [u8; 16], content: ContentEntry) -> Self {
        Self {
            space,
            key,
            content,
            hashes: None,
            mode: VerifyMode::default(),
        }
    }

    /// Attach the outer reference hashes required for hashed contents.
    pub fn with_hashes(mut self, hashes: H3Table) -> Self {
        self.hashes = Some(hashes);
        self
    }

    pub fn verify_mode(mut self, mode: VerifyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn content(&self) -> &ContentEntry {
        &self.content
    }

    /// Size of the decrypted view this engine exposes.
    pub fn size(&self) -> u64 {
        self.content.decrypted_size()
    }

    /// Natural alignment unit of the decrypted view. Requests that start
    /// and end on this unit decrypt without clipping work.
    pub fn chunk_unit(&self) -> usize {
        if self.content.hashed && self.content.encrypted {
            PAYLOAD_SIZE
        } else {
            SECTOR_SIZE
        }
    }

    /// Read `length` plaintext bytes at `offset` of the decrypted view.
    ///
    /// The window may start and end anywhere inside the content; sector
    /// and block alignment is handled here.
    pub fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let size = self.size();
        if offset
            .checked_add(length as u64)
            .is_none_or(|end| end > size)
        {
            return Err(Error::OutOfBounds {
                offset,
                length: length as u64,
                size,
            });
        }

        if !self.content.encrypted {
            return self.space.read(offset, length);
        }
        if self.content.hashed {
            self.read_hashed(offset, length)
        } else {
            self.read_plain(offset, length)
        }
    }

    /// Random-access plain mode: every sector decrypts independently with
    /// an IV derived from its absolute byte offset.
    fn read_plain(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let sector = SECTOR_SIZE as u64;
        let mut out = Vec::with_capacity(length);
        let mut pos = offset;
        let end = offset + length as u64;

        while pos < end {
            let start = pos / sector * sector;
            let avail = sector.min(self.content.size - start) as usize;
            let mut buf = self.space.read(start, avail)?;
            decrypt_cbc(&self.key, &offset_iv(start), &mut buf)?;

            let lo = (pos - start) as usize;
            let hi = (end - start).min(avail as u64) as usize;
            out.extend_from_slice(&buf[lo..hi]);
            pos = start + hi as u64;
        }
        Ok(out)
    }

    /// Hash-tree mode: decrypt whole 0x10000-byte blocks, verify each
    /// against the embedded tree, concatenate the payload windows.
    fn read_hashed(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let hashes = self
            .hashes
            .as_ref()
            .ok_or(Error::Parse("hashed content without an H3 table"))?;

        let payload = PAYLOAD_SIZE as u64;
        let mut out = Vec::with_capacity(length);
        let mut pos = offset;
        let end = offset + length as u64;

        while pos < end {
            let block = pos / payload;
            let plain = self.decrypt_block(block, hashes)?;

            let lo = (pos - block * payload) as usize;
            let hi = (end - block * payload).min(payload) as usize;
            out.extend_from_slice(&plain[lo..hi]);
            pos = block * payload + hi as u64;
        }
        Ok(out)
    }

    /// Decrypt and verify one physical block, returning its 0xFC00-byte
    /// payload.
    fn decrypt_block(&self, block: u64, hashes: &H3Table) -> Result<Vec<u8>> {
        let raw = self.space.read(block * BLOCK_SIZE as u64, BLOCK_SIZE)?;

        // The hash area is CBC-encrypted under the fixed per-content IV,
        // with the content index additionally folded into its first two
        // plaintext bytes during encryption. Undo both.
        let mut table = raw[..HASHES_SIZE].to_vec();
        decrypt_cbc(&self.key, &content_iv(self.content.index), &mut table)?;
        let index = self.content.index.to_be_bytes();
        table[0] ^= index[0];
        table[1] ^= index[1];

        // H0 slot for this block: its hash seeds the payload IV.
        let slot = block as usize % HASHES_PER_BLOCK * 20;
        let h0: [u8; 20] = table[slot..slot + 20].try_into().unwrap();
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&h0[..16]);

        let mut payload = raw[HASHES_SIZE..].to_vec();
        decrypt_cbc(&self.key, &iv, &mut payload)?;

        let actual: [u8; 20] = Sha1::digest(&payload).into();
        if actual != h0 {
            self.flag(Error::PayloadHashMismatch {
                block,
                expected: h0,
                actual,
            })?;
        }

        // Chain the table itself up to the trusted root.
        let table_digest: [u8; 20] = Sha1::digest(&table).into();
        let expected: [u8; 20] = hashes.group_hash(block)?.try_into().unwrap();
        if table_digest != expected {
            self.flag(Error::HashTableMismatch {
                block,
                expected,
                actual: table_digest,
            })?;
        }

        Ok(payload)
    }

    /// Apply the verification policy to an integrity failure.
    fn flag(&self, err: Error) -> Result<()> {
        match self.mode {
            VerifyMode::Strict => Err(err),
            VerifyMode::Lenient => {
                log::warn!("{err}");
                Ok(())
            }
        }
    }

    /// Sequential CBC stream over a plain content: the first sector is
    /// keyed by the fixed per-content IV, every later sector chains off
    /// the last 16 ciphertext bytes of the previous one, exactly as the
    /// data was encrypted as one continuous stream.
    pub fn sequential_reader(&self) -> Result<SequentialReader> {
        if self.content.hashed || !self.content.encrypted {
            return Err(Error::Parse(
                "sequential streaming applies to plain encrypted contents",
            ));
        }
        Ok(SequentialReader {
            dec: self.clone(),
            iv: content_iv(self.content.index),
            pos: 0,
            buf: Vec::new(),
            buf_pos: 0,
        })
    }
}

/// Chained-IV streaming decryptor returned by
/// [`ContentDecrypter::sequential_reader`].
pub struct SequentialReader {
    dec: ContentDecrypter,
    iv: [u8; 16],
    pos: u64,
    buf: Vec<u8>,
    buf_pos: usize,
}

impl SequentialReader {
    fn fill(&mut self) -> Result<()> {
        let size = self.dec.content.size;
        if self.pos >= size {
            return Ok(());
        }

        let want = (size - self.pos).min(SECTOR_SIZE as u64) as usize;
        if want < 16 || want % 16 != 0 {
            return Err(Error::Parse("content size is not 16-byte aligned"));
        }
        let mut buf = self.dec.space.read(self.pos, want)?;
        // The next sector chains off this one's final ciphertext block.
        let next_iv: [u8; 16] = buf[want - 16..].try_into().unwrap();
        decrypt_cbc(&self.dec.key, &self.iv, &mut buf)?;

        self.iv = next_iv;
        self.pos += want as u64;
        self.buf = buf;
        self.buf_pos = 0;
        Ok(())
    }
}

impl Read for SequentialReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.buf_pos == self.buf.len() {
            self.buf.clear();
            self.buf_pos = 0;
            self.fill().map_err(io::Error::from)?;
            if self.buf.is_empty() {
                return Ok(0);
            }
        }

        let n = out.len().min(self.buf.len() - self.buf_pos);
        out[..n].copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + n]);
        self.buf_pos += n;
        Ok(n)
    }
}
