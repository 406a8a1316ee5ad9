//! Packet Data Convergence Protocol (PDCP) Receive Side
//!
//! Implements the 5G NR PDCP receiving entity according to 3GPP TS 38.323:
//! header parsing, deciphering, integrity verification, reordering and
//! in-order delivery of SDUs to the upper layers.

pub mod config;
pub mod header;
pub mod metrics;
pub mod notifier;
pub mod rx;
pub mod rx_window;
pub mod security;
pub mod task;
pub mod timer;

use thiserror::Error;

pub use config::{PdcpRxConfig, TReordering};
pub use metrics::PdcpRxMetrics;
pub use notifier::{RxControlEvent, RxUpperControlNotifier, RxUpperDataNotifier};
pub use rx::{PdcpEntityRx, RxState};
pub use security::{CipheringAlgorithm, IntegrityAlgorithm, SecurityConfig};
pub use task::{spawn_rx_task, PdcpRxHandle};
pub use timer::{ExpiryToken, ManualTimer, TokioTimer, UniqueTimer};

/// Errors of the PDCP receiving entity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdcpError {
    #[error("Malformed PDU: length={len}, header length={header_len}")]
    MalformedPdu { len: usize, header_len: usize },

    #[error("Stale PDU: RCVD_COUNT={rcvd_count} below RX_DELIV={rx_deliv}")]
    StalePdu { rcvd_count: u32, rx_deliv: u32 },

    /// RCVD_SN would need an HFN below 0, no COUNT exists for it
    #[error("PDU before the first HFN: RCVD_SN={rcvd_sn}, RX_DELIV={rx_deliv}")]
    BeforeFirstHfn { rcvd_sn: u32, rx_deliv: u32 },

    #[error("Duplicate PDU: COUNT={0} already buffered")]
    DuplicatePdu(u32),

    #[error("Integrity verification failed: COUNT={0}")]
    IntegrityFailure(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal fault: {0}")]
    InternalFault(String),

    #[error("Entity stopped")]
    Stopped,
}

impl PdcpError {
    /// True for PDUs discarded by the reception window (stale or duplicate)
    pub fn is_discard(&self) -> bool {
        matches!(
            self,
            PdcpError::StalePdu { .. }
                | PdcpError::BeforeFirstHfn { .. }
                | PdcpError::DuplicatePdu(_)
        )
    }
}

impl From<common::TypeError> for PdcpError {
    fn from(err: common::TypeError) -> Self {
        PdcpError::InvalidConfiguration(err.to_string())
    }
}
