//! NR ciphering algorithms (TS 33.501 annex D.2)
//!
//! All algorithms are stream ciphers, the same call ciphers and deciphers.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

use super::{snow3g, zuc, Key128};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// 128-NEA1, SNOW 3G based
pub fn nea1(key: &Key128, count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    snow3g::f8(key, count, bearer, direction, data);
}

/// 128-NEA2, AES-128 in counter mode
///
/// The initial counter block is `COUNT | BEARER | DIRECTION | 0..0`.
pub fn nea2(key: &Key128, count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = ((bearer & 0x1f) << 3) | ((direction & 0x1) << 2);

    let mut cipher = Aes128Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(data);
}

/// 128-NEA3, ZUC based
pub fn nea3(key: &Key128, count: u32, bearer: u8, direction: u8, data: &mut [u8]) {
    zuc::eea3(key, count, bearer, direction, data);
}
