//! Length-hiding padding: bucket plaintext lengths into a small set of
//! sizes so ciphertext length reveals only a coarse range, not the exact
//! plaintext size.

use crate::error::Error;

/// `pad_bucket(1) == 32`, doubling chunk granularity as `len` grows past each
/// power-of-two boundary above 256.
pub fn pad_bucket(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_power: usize = 1 << (log2_round_down(len - 1) + 1);
    let chunk: usize = if next_power <= 256 { 32 } else { next_power / 8 };
    chunk * (((len - 1) / chunk) + 1)
}

fn log2_round_down(x: usize) -> u32 {
    if x == 0 {
        0
    } else {
        (x as f64).log2().floor() as u32
    }
}

/// `len_be(2B) || plaintext || zero padding`, total length `2 + pad_bucket(len)`.
pub fn pad(plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let len = plaintext.len();
    if len == 0 || len > u16::MAX as usize {
        return Err(Error::InvalidPlaintextLength);
    }
    let target = pad_bucket(len);
    let mut out = Vec::with_capacity(2 + target);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(2 + target, 0);
    Ok(out)
}

/// Inverse of [`pad`]. Rejects a length prefix that doesn't land on the
/// expected bucket boundary for the padded buffer's actual size, and rejects
/// a declared length longer than the buffer it claims to be padding.
pub fn unpad(padded: &[u8]) -> Result<Vec<u8>, Error> {
    if padded.len() < 2 {
        return Err(Error::InvalidPadding);
    }
    let declared_len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if declared_len == 0 || 2 + declared_len > padded.len() {
        return Err(Error::InvalidPadding);
    }
    if padded.len() != 2 + pad_bucket(declared_len) {
        return Err(Error::InvalidPadding);
    }
    Ok(padded[2..2 + declared_len].to_vec())
}
