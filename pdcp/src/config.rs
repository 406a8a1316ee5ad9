//! PDCP receiving entity configuration

use common::types::{Direction, RbId, RbType, RlcMode, SnSize, UeIndex};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// t-Reordering value as signalled by RRC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TReorderingRepr", into = "TReorderingRepr")]
pub enum TReordering {
    /// Timer duration in milliseconds, `Ms(0)` expires immediately
    Ms(u32),
    /// Timer is never started
    Infinity,
}

impl TReordering {
    /// True if the timer is configured to expire immediately
    pub fn is_zero(&self) -> bool {
        matches!(self, TReordering::Ms(0))
    }

    /// Timer duration, `None` for infinity
    pub fn duration(&self) -> Option<Duration> {
        match self {
            TReordering::Ms(ms) => Some(Duration::from_millis(*ms as u64)),
            TReordering::Infinity => None,
        }
    }
}

/// Wire representation: either a number of milliseconds or `"infinity"`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TReorderingRepr {
    Ms(u32),
    Named(String),
}

impl TryFrom<TReorderingRepr> for TReordering {
    type Error = String;

    fn try_from(value: TReorderingRepr) -> Result<Self, Self::Error> {
        match value {
            TReorderingRepr::Ms(ms) => Ok(TReordering::Ms(ms)),
            TReorderingRepr::Named(name) if name.eq_ignore_ascii_case("infinity") => {
                Ok(TReordering::Infinity)
            }
            TReorderingRepr::Named(name) => Err(format!("invalid t-Reordering value: {}", name)),
        }
    }
}

impl From<TReordering> for TReorderingRepr {
    fn from(value: TReordering) -> Self {
        match value {
            TReordering::Ms(ms) => TReorderingRepr::Ms(ms),
            TReordering::Infinity => TReorderingRepr::Named("infinity".to_string()),
        }
    }
}

/// PDCP receiving entity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdcpRxConfig {
    /// UE the bearer belongs to, used for log context
    #[serde(default = "default_ue_index")]
    pub ue_index: UeIndex,
    /// Radio bearer type
    pub rb_type: RbType,
    /// Radio bearer identity
    pub rb_id: RbId,
    /// SN size in bits (12 or 18)
    pub sn_size: SnSize,
    /// RLC mode of the lower layer bearer
    pub rlc_mode: RlcMode,
    /// Direction of the received PDUs
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Reordering timer
    pub t_reordering: TReordering,
}

fn default_ue_index() -> UeIndex {
    UeIndex(0)
}

fn default_direction() -> Direction {
    Direction::Uplink
}

impl PdcpRxConfig {
    /// Infinite t-Reordering with an RLC UM bearer leaves gaps open forever
    pub fn has_reordering_mismatch(&self) -> bool {
        self.t_reordering == TReordering::Infinity && self.rlc_mode == RlcMode::Um
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_t_reordering_duration() {
        assert_eq!(TReordering::Ms(35).duration(), Some(Duration::from_millis(35)));
        assert_eq!(TReordering::Infinity.duration(), None);
        assert!(TReordering::Ms(0).is_zero());
        assert!(!TReordering::Infinity.is_zero());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "rb_type": "drb",
            "rb_id": 1,
            "sn_size": 18,
            "rlc_mode": "am",
            "t_reordering": "infinity"
        }"#;
        let cfg: PdcpRxConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.sn_size, SnSize::Size18);
        assert_eq!(cfg.t_reordering, TReordering::Infinity);
        assert_eq!(cfg.direction, Direction::Uplink);
        assert!(!cfg.has_reordering_mismatch());

        let json = r#"{
            "rb_type": "srb",
            "rb_id": 2,
            "sn_size": 12,
            "rlc_mode": "um",
            "t_reordering": 35
        }"#;
        let cfg: PdcpRxConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.t_reordering, TReordering::Ms(35));
        assert_eq!(cfg.rb_id.bearer(), 1);
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let json = r#"{
            "rb_type": "drb",
            "rb_id": 1,
            "sn_size": 16,
            "rlc_mode": "am",
            "t_reordering": 10
        }"#;
        assert!(serde_json::from_str::<PdcpRxConfig>(json).is_err());

        let json = r#"{
            "rb_type": "drb",
            "rb_id": 1,
            "sn_size": 12,
            "rlc_mode": "am",
            "t_reordering": "forever"
        }"#;
        assert!(serde_json::from_str::<PdcpRxConfig>(json).is_err());
    }

    #[test]
    fn test_reordering_mismatch() {
        let cfg = PdcpRxConfig {
            ue_index: UeIndex(0),
            rb_type: RbType::Drb,
            rb_id: RbId::new(1).unwrap(),
            sn_size: SnSize::Size12,
            rlc_mode: RlcMode::Um,
            direction: Direction::Uplink,
            t_reordering: TReordering::Infinity,
        };
        assert!(cfg.has_reordering_mismatch());
    }
}
