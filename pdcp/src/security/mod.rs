//! Ciphering and integrity protection of PDCP PDUs
//!
//! The engine selects the key set by bearer type (RRC keys for SRBs, UP keys
//! for DRBs) and feeds COUNT, BEARER and DIRECTION to the configured NEA/NIA
//! algorithm.

pub mod nea;
pub mod nia;
pub mod snow3g;
pub mod zuc;

use std::fmt;

use bytes::{BufMut, Bytes};
use common::types::{Direction, RbId, RbType, SnSize};
use common::utils::bytes_to_hex;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::header::{self, MAC_I_LEN};
use crate::PdcpError;

/// 128-bit AS key
pub type Key128 = [u8; 16];

/// NR integrity algorithm identity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum IntegrityAlgorithm {
    /// Null integrity, every PDU verifies
    #[default]
    Nia0 = 0,
    Nia1 = 1,
    Nia2 = 2,
    Nia3 = 3,
}

/// NR ciphering algorithm identity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum CipheringAlgorithm {
    /// Null ciphering
    #[default]
    Nea0 = 0,
    Nea1 = 1,
    Nea2 = 2,
    Nea3 = 3,
}

impl TryFrom<u8> for IntegrityAlgorithm {
    type Error = PdcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        IntegrityAlgorithm::from_u8(value).ok_or_else(|| {
            PdcpError::InvalidConfiguration(format!("unknown integrity algorithm NIA{}", value))
        })
    }
}

impl From<IntegrityAlgorithm> for u8 {
    fn from(value: IntegrityAlgorithm) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for CipheringAlgorithm {
    type Error = PdcpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CipheringAlgorithm::from_u8(value).ok_or_else(|| {
            PdcpError::InvalidConfiguration(format!("unknown ciphering algorithm NEA{}", value))
        })
    }
}

impl From<CipheringAlgorithm> for u8 {
    fn from(value: CipheringAlgorithm) -> Self {
        value as u8
    }
}

/// Security context of a bearer as provided by RRC
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    pub integ_algo: IntegrityAlgorithm,
    pub cipher_algo: CipheringAlgorithm,
    pub k_rrc_int: Key128,
    pub k_rrc_enc: Key128,
    pub k_up_int: Key128,
    pub k_up_enc: Key128,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("integ_algo", &self.integ_algo)
            .field("cipher_algo", &self.cipher_algo)
            .finish_non_exhaustive()
    }
}

/// Per-bearer security engine
pub struct SecurityEngine {
    config: SecurityConfig,
    rb_type: RbType,
    bearer: u8,
    direction: u8,
    integrity_enabled: bool,
    ciphering_enabled: bool,
}

impl SecurityEngine {
    /// Create an engine for one bearer, protection starts disabled
    pub fn new(config: SecurityConfig, rb_type: RbType, rb_id: RbId, direction: Direction) -> Self {
        Self {
            config,
            rb_type,
            bearer: rb_id.bearer(),
            direction: direction.as_bit(),
            integrity_enabled: false,
            ciphering_enabled: false,
        }
    }

    /// Replace algorithms and keys
    pub fn configure(&mut self, config: SecurityConfig) {
        debug!(
            "Security configured: {:?}, {:?}",
            config.integ_algo, config.cipher_algo
        );
        self.config = config;
    }

    /// Switch integrity verification and deciphering on or off
    pub fn set_enabled(&mut self, integrity: bool, ciphering: bool) {
        self.integrity_enabled = integrity;
        self.ciphering_enabled = ciphering;
    }

    pub fn integrity_enabled(&self) -> bool {
        self.integrity_enabled
    }

    pub fn ciphering_enabled(&self) -> bool {
        self.ciphering_enabled
    }

    /// SRB PDUs always carry a MAC-I, DRB PDUs only with integrity enabled
    pub fn has_mac(&self) -> bool {
        self.rb_type == RbType::Srb || self.integrity_enabled
    }

    fn int_key(&self) -> &Key128 {
        match self.rb_type {
            RbType::Srb => &self.config.k_rrc_int,
            RbType::Drb => &self.config.k_up_int,
        }
    }

    fn enc_key(&self) -> &Key128 {
        match self.rb_type {
            RbType::Srb => &self.config.k_rrc_enc,
            RbType::Drb => &self.config.k_up_enc,
        }
    }

    /// XOR `data` with the keystream of the configured algorithm
    pub fn apply_keystream(&self, count: u32, data: &mut [u8]) {
        let key = self.enc_key();
        match self.config.cipher_algo {
            CipheringAlgorithm::Nea0 => {}
            CipheringAlgorithm::Nea1 => nea::nea1(key, count, self.bearer, self.direction, data),
            CipheringAlgorithm::Nea2 => nea::nea2(key, count, self.bearer, self.direction, data),
            CipheringAlgorithm::Nea3 => nea::nea3(key, count, self.bearer, self.direction, data),
        }
    }

    /// Decipher the region following the header, no-op unless ciphering is enabled
    pub fn decipher(&self, count: u32, data: &mut [u8]) {
        if !self.ciphering_enabled {
            return;
        }
        trace!(
            "Decipher: COUNT={}, bearer={}, dir={}, len={}",
            count,
            self.bearer,
            self.direction,
            data.len()
        );
        self.apply_keystream(count, data);
    }

    /// MAC-I over `message` (header + plaintext data), zero for NIA0
    pub fn compute_mac(&self, count: u32, message: &[u8]) -> [u8; MAC_I_LEN] {
        let key = self.int_key();
        match self.config.integ_algo {
            IntegrityAlgorithm::Nia0 => [0; MAC_I_LEN],
            IntegrityAlgorithm::Nia1 => nia::nia1(key, count, self.bearer, self.direction, message),
            IntegrityAlgorithm::Nia2 => nia::nia2(key, count, self.bearer, self.direction, message),
            IntegrityAlgorithm::Nia3 => nia::nia3(key, count, self.bearer, self.direction, message),
        }
    }

    /// Build a data PDU for `sdu` the way a peer transmitter protects it
    ///
    /// The MAC-I covers header and SDU, ciphering covers SDU and MAC-I.
    pub fn protect_pdu(&self, sn_size: SnSize, count: u32, sdu: &[u8]) -> Bytes {
        let mut pdu = header::write_header(sn_size, count & sn_size.sn_mask());
        pdu.put_slice(sdu);
        if self.has_mac() {
            let mac = self.compute_mac(count, &pdu);
            pdu.put_slice(&mac);
        }
        if self.ciphering_enabled {
            self.apply_keystream(count, &mut pdu[sn_size.header_len()..]);
        }
        pdu.freeze()
    }

    /// Check the received MAC-I, NIA0 always passes
    pub fn verify_integrity(&self, count: u32, message: &[u8], mac: &[u8; MAC_I_LEN]) -> bool {
        if self.config.integ_algo == IntegrityAlgorithm::Nia0 {
            return true;
        }

        let expected = self.compute_mac(count, message);
        let is_valid = expected.iter().zip(mac.iter()).all(|(a, b)| a == b);
        if is_valid {
            trace!("Integrity check passed: COUNT={}", count);
        } else {
            error!(
                bearer = self.bearer,
                dir = self.direction,
                "Integrity check failed: COUNT={}, MAC expected={}, found={}, msg len={}",
                count,
                bytes_to_hex(&expected),
                bytes_to_hex(mac),
                message.len()
            );
        }
        is_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(
        integ_algo: IntegrityAlgorithm,
        cipher_algo: CipheringAlgorithm,
    ) -> SecurityConfig {
        SecurityConfig {
            integ_algo,
            cipher_algo,
            k_rrc_int: [0x01; 16],
            k_rrc_enc: [0x02; 16],
            k_up_int: [0x03; 16],
            k_up_enc: [0x04; 16],
        }
    }

    #[test]
    fn test_algorithm_ids() {
        assert_eq!(IntegrityAlgorithm::try_from(2), Ok(IntegrityAlgorithm::Nia2));
        assert_eq!(CipheringAlgorithm::try_from(3), Ok(CipheringAlgorithm::Nea3));
        assert!(matches!(
            IntegrityAlgorithm::try_from(4),
            Err(PdcpError::InvalidConfiguration(_))
        ));
        assert!(CipheringAlgorithm::try_from(7).is_err());
        assert_eq!(u8::from(CipheringAlgorithm::Nea1), 1);
    }

    #[test]
    fn test_debug_hides_keys() {
        let cfg = test_config(IntegrityAlgorithm::Nia2, CipheringAlgorithm::Nea2);
        let s = format!("{:?}", cfg);
        assert!(s.contains("Nia2"));
        assert!(!s.contains("k_up_enc"));
    }

    #[test]
    fn test_nia0_always_valid() {
        let engine = SecurityEngine::new(
            SecurityConfig::default(),
            RbType::Srb,
            RbId::new(1).unwrap(),
            Direction::Uplink,
        );
        assert!(engine.has_mac());
        assert_eq!(engine.compute_mac(0, b"abc"), [0; 4]);
        assert!(engine.verify_integrity(0, b"abc", &[0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_verify_integrity() {
        let rb_id = RbId::new(3).unwrap();
        for algo in [IntegrityAlgorithm::Nia1, IntegrityAlgorithm::Nia2, IntegrityAlgorithm::Nia3] {
            let engine = SecurityEngine::new(
                test_config(algo, CipheringAlgorithm::Nea0),
                RbType::Drb,
                rb_id,
                Direction::Uplink,
            );
            let msg = b"\x80\x05payload";
            let mut mac = engine.compute_mac(5, msg);
            assert!(engine.verify_integrity(5, msg, &mac));
            assert!(!engine.verify_integrity(6, msg, &mac));
            mac[3] ^= 0x01;
            assert!(!engine.verify_integrity(5, msg, &mac));
        }
    }

    #[test]
    fn test_key_selection_by_bearer_type() {
        let cfg = test_config(IntegrityAlgorithm::Nia2, CipheringAlgorithm::Nea2);
        let rb_id = RbId::new(1).unwrap();
        let srb = SecurityEngine::new(cfg.clone(), RbType::Srb, rb_id, Direction::Uplink);
        let drb = SecurityEngine::new(cfg, RbType::Drb, rb_id, Direction::Uplink);

        assert_ne!(srb.compute_mac(0, b"msg"), drb.compute_mac(0, b"msg"));
        assert_eq!(drb.compute_mac(0, b"msg"), nia::nia2(&[0x03; 16], 0, 0, 0, b"msg"));

        let mut a = *b"ciphered";
        let mut b = *b"ciphered";
        srb.apply_keystream(9, &mut a);
        drb.apply_keystream(9, &mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_decipher_respects_enable_flag() {
        let mut engine = SecurityEngine::new(
            test_config(IntegrityAlgorithm::Nia0, CipheringAlgorithm::Nea2),
            RbType::Drb,
            RbId::new(2).unwrap(),
            Direction::Downlink,
        );
        let mut data = *b"plain";
        engine.decipher(1, &mut data);
        assert_eq!(&data, b"plain");

        engine.set_enabled(false, true);
        engine.apply_keystream(1, &mut data);
        engine.decipher(1, &mut data);
        assert_eq!(&data, b"plain");
        assert!(!engine.has_mac());
    }
}
