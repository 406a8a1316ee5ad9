//! Common Types for the PDCP bearer
//!
//! Defines fundamental types shared by the PDCP entity and its drivers

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use thiserror::Error;

/// Errors raised when building a bearer type from a raw value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Invalid PDCP SN size: {0} bits (must be 12 or 18)")]
    InvalidSnSize(u8),

    #[error("Invalid radio bearer id: {0} (must be 1-32)")]
    InvalidRbId(u8),
}

/// UE index used to tag log output of per-bearer entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UeIndex(pub u32);

/// PDCP sequence number length in bits
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum SnSize {
    /// 12 bit SN, 2 byte data PDU header
    Size12 = 12,
    /// 18 bit SN, 3 byte data PDU header
    Size18 = 18,
}

impl SnSize {
    /// Number of SN bits
    pub fn bits(&self) -> u32 {
        *self as u32
    }

    /// Data PDU header length in bytes
    pub fn header_len(&self) -> usize {
        match self {
            SnSize::Size12 => 2,
            SnSize::Size18 => 3,
        }
    }

    /// Number of distinct SN values (2^bits)
    pub fn cardinality(&self) -> u32 {
        1 << self.bits()
    }

    /// Half of the SN space, as used by the window discrimination rule
    pub fn window_size(&self) -> u32 {
        1 << (self.bits() - 1)
    }

    /// Mask selecting the SN part of a COUNT
    pub fn sn_mask(&self) -> u32 {
        self.cardinality() - 1
    }
}

impl TryFrom<u8> for SnSize {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SnSize::from_u8(value).ok_or(TypeError::InvalidSnSize(value))
    }
}

impl From<SnSize> for u8 {
    fn from(value: SnSize) -> Self {
        value as u8
    }
}

/// Security direction bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// UE to network
    Uplink = 0,
    /// Network to UE
    Downlink = 1,
}

impl Direction {
    /// Value of the 1-bit DIRECTION input of the security algorithms
    pub fn as_bit(&self) -> u8 {
        *self as u8
    }
}

/// Radio bearer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RbType {
    /// Signalling radio bearer (control plane)
    Srb,
    /// Data radio bearer (user plane)
    Drb,
}

/// Radio bearer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RbId(u8);

impl RbId {
    /// Maximum radio bearer identity
    pub const MAX: u8 = 32;

    /// Create a new radio bearer id with validation
    pub fn new(value: u8) -> Option<Self> {
        if (1..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Get the radio bearer id
    pub fn value(&self) -> u8 {
        self.0
    }

    /// BEARER input of the security algorithms (RB identity - 1)
    pub fn bearer(&self) -> u8 {
        self.0 - 1
    }
}

impl TryFrom<u8> for RbId {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RbId::new(value).ok_or(TypeError::InvalidRbId(value))
    }
}

impl From<RbId> for u8 {
    fn from(value: RbId) -> Self {
        value.0
    }
}

/// RLC mode of the bearer carrying the PDCP PDUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RlcMode {
    /// Unacknowledged Mode
    Um,
    /// Acknowledged Mode
    Am,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sn_size_properties() {
        assert_eq!(SnSize::Size12.header_len(), 2);
        assert_eq!(SnSize::Size18.header_len(), 3);
        assert_eq!(SnSize::Size12.window_size(), 2048);
        assert_eq!(SnSize::Size18.window_size(), 131072);
        assert_eq!(SnSize::Size12.sn_mask(), 0xfff);
        assert_eq!(SnSize::Size18.cardinality(), 262144);
    }

    #[test]
    fn test_sn_size_conversion() {
        assert_eq!(SnSize::try_from(12), Ok(SnSize::Size12));
        assert_eq!(SnSize::try_from(18), Ok(SnSize::Size18));
        assert_eq!(SnSize::try_from(16), Err(TypeError::InvalidSnSize(16)));
        assert_eq!(u8::from(SnSize::Size18), 18);
    }

    #[test]
    fn test_rb_id_validation() {
        assert!(RbId::new(0).is_none());
        assert!(RbId::new(33).is_none());
        let rb = RbId::new(1).unwrap();
        assert_eq!(rb.bearer(), 0);
        assert_eq!(RbId::new(32).unwrap().bearer(), 31);
    }
}
