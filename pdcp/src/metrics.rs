//! Receive side counters of a PDCP entity

use serde::Serialize;

/// Counters accumulated since creation or the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdcpRxMetrics {
    /// PDUs received from the lower layer
    pub num_pdus: u64,
    pub num_pdu_bytes: u64,
    /// PDUs dropped: malformed, stale, duplicate or failed integrity
    pub num_dropped_pdus: u64,
    pub num_integrity_verified_pdus: u64,
    pub num_integrity_failed_pdus: u64,
    /// Expiries of a running t-Reordering timer, 0 ms t-Reordering never counts
    pub num_t_reordering_timeouts: u64,
    /// SDUs delivered to the upper layer
    pub num_sdus: u64,
    pub num_sdu_bytes: u64,
}

impl PdcpRxMetrics {
    pub(crate) fn add_pdu(&mut self, len: usize) {
        self.num_pdus += 1;
        self.num_pdu_bytes += len as u64;
    }

    pub(crate) fn add_dropped_pdu(&mut self) {
        self.num_dropped_pdus += 1;
    }

    pub(crate) fn add_integrity_verified(&mut self) {
        self.num_integrity_verified_pdus += 1;
    }

    pub(crate) fn add_integrity_failed(&mut self) {
        self.num_integrity_failed_pdus += 1;
        self.num_dropped_pdus += 1;
    }

    pub(crate) fn add_t_reordering_timeout(&mut self) {
        self.num_t_reordering_timeouts += 1;
    }

    pub(crate) fn add_sdu(&mut self, len: usize) {
        self.num_sdus += 1;
        self.num_sdu_bytes += len as u64;
    }

    /// Clear all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
