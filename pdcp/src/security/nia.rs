//! NR integrity algorithms (TS 33.501 annex D.3)

use aes::Aes128;
use cmac::{Cmac, Mac};

use super::{snow3g, zuc, Key128};
use crate::header::MAC_I_LEN;

/// 128-NIA1, SNOW 3G based
pub fn nia1(key: &Key128, count: u32, bearer: u8, direction: u8, msg: &[u8]) -> [u8; MAC_I_LEN] {
    let fresh = ((bearer & 0x1f) as u32) << 27;
    snow3g::f9(key, count, fresh, direction, msg).to_be_bytes()
}

/// 128-NIA2, AES-128 CMAC truncated to 32 bits
pub fn nia2(key: &Key128, count: u32, bearer: u8, direction: u8, msg: &[u8]) -> [u8; MAC_I_LEN] {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(&count.to_be_bytes());
    mac.update(&[((bearer & 0x1f) << 3) | ((direction & 0x1) << 2), 0, 0, 0]);
    mac.update(msg);

    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_I_LEN];
    out.copy_from_slice(&tag[..MAC_I_LEN]);
    out
}

/// 128-NIA3, ZUC based
pub fn nia3(key: &Key128, count: u32, bearer: u8, direction: u8, msg: &[u8]) -> [u8; MAC_I_LEN] {
    zuc::eia3(key, count, bearer, direction, msg).to_be_bytes()
}
