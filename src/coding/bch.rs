//! CLTU codeblock check byte.
//!
//! Each CLTU codeblock is 7 data bytes followed by one check byte from the
//! (63,56) modified BCH code of CCSDS 231.0-B, computed bit-serially with
//! generator x^8 + x^7 + x^5 + x^3 + 1.

use crate::{Error, Result};

/// Codeblock length including the check byte.
pub const BLOCK_LEN: usize = 8;
/// Data bytes per codeblock.
pub const DATA_LEN: usize = 7;

const POLY: u8 = 0xa9;
const PRESET: u8 = 0xad;

fn checksum(data: &[u8; DATA_LEN]) -> u8 {
    let mut reg = PRESET;
    for &b in data {
        reg ^= b;
        for _ in 0..8 {
            reg = if reg & 0x80 != 0 { (reg << 1) ^ POLY } else { reg << 1 };
        }
    }
    // the check byte position is clocked through as zero
    for _ in 0..8 {
        reg = if reg & 0x80 != 0 { (reg << 1) ^ POLY } else { reg << 1 };
    }
    reg
}

pub(crate) fn encode_block_exact(block: [u8; DATA_LEN]) -> [u8; BLOCK_LEN] {
    let mut out = [0u8; BLOCK_LEN];
    out[..DATA_LEN].copy_from_slice(&block);
    out[DATA_LEN] = checksum(&block);
    out
}

/// Append the check byte to a 7-byte data block.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when `block` is not exactly [`DATA_LEN`] bytes.
pub fn encode_block(block: &[u8]) -> Result<[u8; BLOCK_LEN]> {
    let data: [u8; DATA_LEN] = block.try_into().map_err(|_| {
        Error::LengthMismatch(format!(
            "BCH codeblock data is {DATA_LEN} bytes, got {}",
            block.len()
        ))
    })?;
    Ok(encode_block_exact(data))
}

/// Verify a codeblock's check byte and return the 7 data bytes.
///
/// # Errors
///
/// [`Error::LengthMismatch`] when `block` is not exactly [`BLOCK_LEN`]
/// bytes; [`Error::Checksum`] when the check byte does not match.
pub fn decode_block(block: &[u8]) -> Result<[u8; DATA_LEN]> {
    if block.len() != BLOCK_LEN {
        return Err(Error::LengthMismatch(format!(
            "BCH codeblock is {BLOCK_LEN} bytes, got {}",
            block.len()
        )));
    }
    let mut data = [0u8; DATA_LEN];
    data.copy_from_slice(&block[..DATA_LEN]);
    let want = checksum(&data);
    if want != block[DATA_LEN] {
        return Err(Error::Checksum(format!(
            "BCH check byte mismatch: computed {want:#04x}, found {:#04x}",
            block[DATA_LEN]
        )));
    }
    Ok(data)
}
