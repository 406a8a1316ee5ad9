//! PDCP receiving entity (TS 38.323 section 5.2.2)
//!
//! State variables:
//! - RX_NEXT: COUNT of the next PDU expected
//! - RX_DELIV: COUNT of the first SDU not yet delivered
//! - RX_REORD: COUNT following the PDU that started t-Reordering

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::{PdcpRxConfig, TReordering};
use crate::header;
use crate::metrics::PdcpRxMetrics;
use crate::notifier::{RxUpperControlNotifier, RxUpperDataNotifier};
use crate::rx_window::RxWindow;
use crate::security::{SecurityConfig, SecurityEngine};
use crate::timer::{ExpiryToken, UniqueTimer};
use crate::PdcpError;

/// Receive state variables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxState {
    pub rx_next: u32,
    pub rx_deliv: u32,
    pub rx_reord: u32,
}

/// Receiving side of one PDCP entity
pub struct PdcpEntityRx<T: UniqueTimer> {
    cfg: PdcpRxConfig,
    st: RxState,
    rx_window: RxWindow,
    security: SecurityEngine,
    /// None for infinite and zero t-Reordering
    reordering_timer: Option<T>,
    upper_dn: Box<dyn RxUpperDataNotifier + Send>,
    upper_cn: Box<dyn RxUpperControlNotifier + Send>,
    metrics: PdcpRxMetrics,
    stopped: bool,
}

impl<T: UniqueTimer> PdcpEntityRx<T> {
    /// Create the entity with all counters at zero and security disabled
    pub fn new(
        cfg: PdcpRxConfig,
        upper_dn: Box<dyn RxUpperDataNotifier + Send>,
        upper_cn: Box<dyn RxUpperControlNotifier + Send>,
        mut timer: T,
    ) -> Self {
        let reordering_timer = match cfg.t_reordering.duration() {
            Some(duration) if !duration.is_zero() => {
                timer.set_duration(duration);
                Some(timer)
            }
            _ => None,
        };

        if cfg.has_reordering_mismatch() {
            warn!(
                ue = cfg.ue_index.0,
                rb = cfg.rb_id.value(),
                "Possible PDCP misconfiguration: infinite t-Reordering with RLC UM bearer"
            );
        }

        info!(
            ue = cfg.ue_index.0,
            rb = cfg.rb_id.value(),
            "Created PDCP RX entity: {:?}, sn_size={}, t_reordering={:?}",
            cfg.rb_type,
            cfg.sn_size.bits(),
            cfg.t_reordering
        );

        let security = SecurityEngine::new(
            SecurityConfig::default(),
            cfg.rb_type,
            cfg.rb_id,
            cfg.direction,
        );
        Self {
            rx_window: RxWindow::new(cfg.sn_size),
            st: RxState::default(),
            security,
            reordering_timer,
            upper_dn,
            upper_cn,
            metrics: PdcpRxMetrics::default(),
            stopped: false,
            cfg,
        }
    }

    fn sn(&self, count: u32) -> u32 {
        count & self.cfg.sn_size.sn_mask()
    }

    fn hfn(&self, count: u32) -> u32 {
        count >> self.cfg.sn_size.bits()
    }

    fn count(&self, hfn: u32, sn: u32) -> u32 {
        (hfn << self.cfg.sn_size.bits()) | sn
    }

    /// RCVD_COUNT of a PDU, `None` if it would precede HFN 0
    fn rcvd_count(&self, rcvd_sn: u32) -> Option<u32> {
        let window = self.cfg.sn_size.window_size() as i64;
        let deliv_sn = self.sn(self.st.rx_deliv) as i64;
        let deliv_hfn = self.hfn(self.st.rx_deliv);

        let rcvd_hfn = if (rcvd_sn as i64) < deliv_sn - window {
            deliv_hfn.wrapping_add(1)
        } else if rcvd_sn as i64 >= deliv_sn + window {
            deliv_hfn.checked_sub(1)?
        } else {
            deliv_hfn
        };
        Some(self.count(rcvd_hfn, rcvd_sn))
    }

    /// Process one PDU from the lower layer
    ///
    /// Dropped PDUs are reported through the error, the entity stays usable.
    pub fn handle_pdu(&mut self, pdu: Bytes) -> Result<(), PdcpError> {
        if self.stopped {
            return Err(PdcpError::Stopped);
        }
        self.metrics.add_pdu(pdu.len());
        debug!(
            ue = self.cfg.ue_index.0,
            rb = self.cfg.rb_id.value(),
            "RX PDU ({} B), integrity={}, ciphering={}",
            pdu.len(),
            self.security.integrity_enabled(),
            self.security.ciphering_enabled()
        );
        trace!(
            "RX state: RX_NEXT={}, RX_DELIV={}, RX_REORD={}",
            self.st.rx_next,
            self.st.rx_deliv,
            self.st.rx_reord
        );

        let sn_size = self.cfg.sn_size;
        let hdr_len = sn_size.header_len();
        let ue = self.cfg.ue_index.0;
        let rb = self.cfg.rb_id.value();
        let rcvd_sn = header::parse_header(&pdu, sn_size).inspect_err(|e| {
            error!(ue, rb, "Dropping PDU: {}", e);
            self.metrics.add_dropped_pdu();
        })?;

        let Some(rcvd_count) = self.rcvd_count(rcvd_sn) else {
            debug!("RCVD_SN={} precedes the first HFN, dropping", rcvd_sn);
            self.metrics.add_dropped_pdu();
            return Err(PdcpError::BeforeFirstHfn {
                rcvd_sn,
                rx_deliv: self.st.rx_deliv,
            });
        };

        // Ciphering covers data and MAC-I, never the header
        let mut buf = BytesMut::from(pdu.as_ref());
        self.security.decipher(rcvd_count, &mut buf[hdr_len..]);

        if self.security.has_mac() {
            let mac = match header::strip_integrity_tag(&mut buf) {
                Some(mac) if buf.len() >= hdr_len => mac,
                _ => {
                    error!(ue, rb, "PDU too short for MAC-I: length={}", pdu.len());
                    self.metrics.add_dropped_pdu();
                    return Err(PdcpError::MalformedPdu {
                        len: pdu.len(),
                        header_len: hdr_len,
                    });
                }
            };

            // Integrity covers header and deciphered data
            if !self.security.verify_integrity(rcvd_count, &buf, &mac) {
                error!(
                    ue,
                    rb,
                    "Integrity failed, dropping PDU COUNT={}",
                    rcvd_count
                );
                self.metrics.add_integrity_failed();
                self.upper_cn.on_integrity_failure();
                return Err(PdcpError::IntegrityFailure(rcvd_count));
            }
            self.metrics.add_integrity_verified();
        }

        let mut sdu = buf.freeze();
        header::strip_header(&mut sdu, sn_size);

        if rcvd_count < self.st.rx_deliv {
            debug!(
                "Out-of-order after timeout, duplicate or COUNT wrap: RCVD_COUNT={}, RX_DELIV={}",
                rcvd_count, self.st.rx_deliv
            );
            self.metrics.add_dropped_pdu();
            return Err(PdcpError::StalePdu {
                rcvd_count,
                rx_deliv: self.st.rx_deliv,
            });
        }

        if !self.rx_window.insert(rcvd_count, sdu) {
            debug!("Duplicate PDU COUNT={}, dropping", rcvd_count);
            self.metrics.add_dropped_pdu();
            return Err(PdcpError::DuplicatePdu(rcvd_count));
        }

        if rcvd_count >= self.st.rx_next {
            self.st.rx_next = rcvd_count.wrapping_add(1);
        }

        if rcvd_count == self.st.rx_deliv {
            self.deliver_all_consecutive_counts();
        }

        if let Some(timer) = self.reordering_timer.as_mut() {
            if timer.is_running() && self.st.rx_deliv >= self.st.rx_reord {
                timer.stop();
                debug!(
                    "Stopped t-Reordering: RX_DELIV={}, RX_REORD={}",
                    self.st.rx_deliv, self.st.rx_reord
                );
            }
        }

        if self.cfg.t_reordering != TReordering::Infinity {
            self.st.rx_reord = self.st.rx_next;
            if self.cfg.t_reordering.is_zero() {
                self.on_t_reordering_expiry()?;
            } else if let Some(timer) = self.reordering_timer.as_mut() {
                if !timer.is_running() && self.st.rx_deliv < self.st.rx_next {
                    timer.run();
                    debug!(
                        "Started t-Reordering: RX_REORD={}, RX_DELIV={}, RX_NEXT={}",
                        self.st.rx_reord, self.st.rx_deliv, self.st.rx_next
                    );
                }
            }
        }

        trace!(
            "RX state: RX_NEXT={}, RX_DELIV={}, RX_REORD={}",
            self.st.rx_next,
            self.st.rx_deliv,
            self.st.rx_reord
        );
        Ok(())
    }

    /// Handle an expiry posted by the reordering timer
    ///
    /// Expiries of stopped or restarted runs are ignored.
    pub fn handle_reordering_timer_expiry(&mut self, token: ExpiryToken) -> Result<(), PdcpError> {
        if self.stopped {
            return Ok(());
        }
        let Some(timer) = self.reordering_timer.as_mut() else {
            return Ok(());
        };
        if !timer.consume_expiry(token) {
            debug!("Ignoring stale t-Reordering expiry");
            return Ok(());
        }
        self.metrics.add_t_reordering_timeout();
        self.on_t_reordering_expiry()
    }

    /// Expiry actions, also run inline for a 0 ms t-Reordering
    fn on_t_reordering_expiry(&mut self) -> Result<(), PdcpError> {
        debug!(
            "t-Reordering expired: RX_DELIV={}, RX_REORD={}, RX_NEXT={}",
            self.st.rx_deliv, self.st.rx_reord, self.st.rx_next
        );

        // Deliver everything below RX_REORD, gaps included
        let upper_dn = &mut self.upper_dn;
        let metrics = &mut self.metrics;
        self.rx_window
            .take_below(self.st.rx_deliv, self.st.rx_reord, |count, sdu| {
                deliver_sdu(&mut **upper_dn, metrics, count, sdu)
            });
        self.st.rx_deliv = self.st.rx_reord;

        self.deliver_all_consecutive_counts();

        if self.st.rx_deliv < self.st.rx_next {
            if self.cfg.t_reordering.is_zero() {
                error!(
                    ue = self.cfg.ue_index.0,
                    rb = self.cfg.rb_id.value(),
                    "t-Reordering of 0 ms would need a restart: RX_DELIV={}, RX_NEXT={}",
                    self.st.rx_deliv, self.st.rx_next
                );
                self.upper_cn.on_protocol_failure();
                return Err(PdcpError::InternalFault(format!(
                    "zero t-Reordering restart with RX_DELIV={} < RX_NEXT={}",
                    self.st.rx_deliv, self.st.rx_next
                )));
            }
            self.st.rx_reord = self.st.rx_next;
            if let Some(timer) = self.reordering_timer.as_mut() {
                timer.run();
            }
            debug!(
                "Restarted t-Reordering: RX_REORD={}, RX_DELIV={}",
                self.st.rx_reord, self.st.rx_deliv
            );
        }
        Ok(())
    }

    fn deliver_all_consecutive_counts(&mut self) {
        let upper_dn = &mut self.upper_dn;
        let metrics = &mut self.metrics;
        self.st.rx_deliv = self
            .rx_window
            .take_consecutive(self.st.rx_deliv, |count, sdu| {
                deliver_sdu(&mut **upper_dn, metrics, count, sdu)
            });
    }

    /// Install new algorithms and keys
    pub fn configure_security(&mut self, config: SecurityConfig) {
        info!(
            ue = self.cfg.ue_index.0,
            rb = self.cfg.rb_id.value(),
            "Configuring security: {:?}",
            config
        );
        self.security.configure(config);
    }

    /// Enable or disable integrity verification and deciphering
    pub fn set_security_enabled(&mut self, integrity: bool, ciphering: bool) {
        info!(
            ue = self.cfg.ue_index.0,
            rb = self.cfg.rb_id.value(),
            "Security enabled: integrity={}, ciphering={}",
            integrity,
            ciphering
        );
        self.security.set_enabled(integrity, ciphering);
    }

    /// Tear the entity down: stop the timer and discard buffered SDUs undelivered
    pub fn stop(&mut self) {
        if let Some(timer) = self.reordering_timer.as_mut() {
            timer.stop();
        }
        let discarded = self.rx_window.len();
        self.rx_window.clear();
        self.stopped = true;
        info!(
            ue = self.cfg.ue_index.0,
            rb = self.cfg.rb_id.value(),
            "Stopped PDCP RX entity, discarded {} buffered SDUs",
            discarded
        );
    }

    pub fn state(&self) -> RxState {
        self.st
    }

    pub fn config(&self) -> &PdcpRxConfig {
        &self.cfg
    }

    pub fn metrics(&self) -> PdcpRxMetrics {
        self.metrics.clone()
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Number of SDUs waiting in the reception buffer
    pub fn buffered_sdus(&self) -> usize {
        self.rx_window.len()
    }

    pub fn security(&self) -> &SecurityEngine {
        &self.security
    }

    /// Reordering timer, absent for infinite and zero t-Reordering
    pub fn reordering_timer(&self) -> Option<&T> {
        self.reordering_timer.as_ref()
    }

    pub fn reordering_timer_mut(&mut self) -> Option<&mut T> {
        self.reordering_timer.as_mut()
    }
}

fn deliver_sdu(
    upper_dn: &mut (dyn RxUpperDataNotifier + Send),
    metrics: &mut PdcpRxMetrics,
    count: u32,
    sdu: Bytes,
) {
    trace!("Delivering SDU COUNT={} ({} B)", count, sdu.len());
    metrics.add_sdu(sdu.len());
    upper_dn.on_new_sdu(sdu);
}
