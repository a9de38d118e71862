//! Physical storage backends.
//!
//! A [`PhysicalStore`] answers raw byte-range reads over one of the three
//! on-disk layouts an image can arrive in:
//!
//! - [`LinearStore`] - a single raw dump file, identity offset mapping,
//! - [`SplitStore`] - fixed-size dump parts concatenated logically,
//! - [`WuxStore`] - a compressed container whose logical sectors are
//!   stored at remapped physical sector indices.
//!
//! Stores expose ciphertext exactly as stored; decryption happens above
//! them, behind an [`AddressSpace`](crate::address::AddressSpace).

mod linear;
mod split;
mod wux;

pub use linear::LinearStore;
pub use split::SplitStore;
pub use wux::{WUX_MAGIC_0, WUX_MAGIC_1, WuxStore};

use crate::Result;

/// Raw byte-range reader over an on-disk image layout.
///
/// Implementations are shareable across threads; a store that keeps one
/// file handle serializes its seek+read pair internally.
pub trait PhysicalStore: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`, returning how many bytes
    /// were read. Returning fewer bytes than requested is only valid at
    /// end of storage; callers decide whether that end is premature.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Declared size of the logical byte range this store exposes.
    fn size(&self) -> u64;
}
