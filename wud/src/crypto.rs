//! AES-128-CBC primitive and the IV derivation policies used by disc
//! contents.
//!
//! The format only ever uses one cipher, AES-128-CBC over whole 16-byte
//! blocks, but three IV policies:
//!
//! - a fixed per-content IV (the content index, big-endian, in the first
//!   two bytes) for sequential streams and hash-table areas,
//! - a per-offset IV for independently decryptable sectors,
//! - the first 16 bytes of an H0 hash entry for hashed payloads (derived
//!   in [`decrypt`](crate::decrypt), not here).

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

use crate::{Error, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Decrypt `data` in place with AES-128-CBC.
///
/// `data` must be a multiple of 16 bytes; nothing in the format decrypts
/// partial cipher blocks.
pub fn decrypt_cbc(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) -> Result<()> {
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| Error::Parse("ciphertext length is not 16-byte aligned"))?;
    Ok(())
}

/// IV for sequential content streams and hash-table areas: the content
/// index, big-endian, in the first two bytes of a zeroed buffer.
pub fn content_iv(index: u16) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&index.to_be_bytes());
    iv
}

/// IV for independently decryptable sectors: the absolute byte offset
/// shifted right by 16, big-endian, in the last 8 bytes of a zeroed buffer.
///
/// The shift turns the offset into its 0x10000-granular ordinal, which is
/// how the original encryptor keyed sectors for random access.
pub fn offset_iv(offset: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&(offset >> 16).to_be_bytes());
    iv
}

/// Unwrap an encrypted title key with the device common key.
///
/// One AES-CBC call with IV = title id (big-endian) followed by zeros.
/// This is the only piece of ticket handling the core performs; everything
/// else about tickets stays upstream.
pub fn decrypt_title_key(
    common_key: &[u8; 16],
    title_id: u64,
    encrypted: &[u8; 16],
) -> Result<[u8; 16]> {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&title_id.to_be_bytes());
    let mut key = *encrypted;
    decrypt_cbc(common_key, &iv, &mut key)?;
    Ok(key)
}
