//! Tokio task owning one receiving entity
//!
//! PDUs, queries and t-Reordering expiries all reach the entity through the
//! same task, so the entity needs no locking.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PdcpRxConfig;
use crate::metrics::PdcpRxMetrics;
use crate::notifier::{RxUpperControlNotifier, RxUpperDataNotifier};
use crate::rx::{PdcpEntityRx, RxState};
use crate::security::SecurityConfig;
use crate::timer::{ExpiryToken, TokioTimer};
use crate::PdcpError;

/// Requests handled by the RX task
#[derive(Debug)]
enum RxCommand {
    Pdu(Bytes),
    ConfigureSecurity(SecurityConfig),
    SetSecurityEnabled { integrity: bool, ciphering: bool },
    State(oneshot::Sender<RxState>),
    Metrics(oneshot::Sender<PdcpRxMetrics>),
    ResetMetrics,
    Stop,
}

/// Handle to a running RX task
pub struct PdcpRxHandle {
    cmd_tx: mpsc::UnboundedSender<RxCommand>,
    task: JoinHandle<()>,
}

/// Spawn the task for one bearer on the current runtime
pub fn spawn_rx_task(
    cfg: PdcpRxConfig,
    upper_dn: Box<dyn RxUpperDataNotifier + Send>,
    upper_cn: Box<dyn RxUpperControlNotifier + Send>,
) -> PdcpRxHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
    let entity = PdcpEntityRx::new(cfg, upper_dn, upper_cn, TokioTimer::new(expiry_tx));

    let task = tokio::spawn(run_rx_task(entity, cmd_rx, expiry_rx));
    PdcpRxHandle { cmd_tx, task }
}

async fn run_rx_task(
    mut entity: PdcpEntityRx<TokioTimer>,
    mut cmd_rx: mpsc::UnboundedReceiver<RxCommand>,
    mut expiry_rx: mpsc::UnboundedReceiver<ExpiryToken>,
) {
    info!("PDCP RX task started for RB {}", entity.config().rb_id.value());

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(RxCommand::Pdu(pdu)) => {
                    if let Err(e) = entity.handle_pdu(pdu) {
                        match e {
                            e if e.is_discard() => debug!("PDU discarded: {}", e),
                            PdcpError::IntegrityFailure(_) | PdcpError::MalformedPdu { .. } => {}
                            e => error!("PDU handling failed: {}", e),
                        }
                    }
                }
                Some(RxCommand::ConfigureSecurity(config)) => entity.configure_security(config),
                Some(RxCommand::SetSecurityEnabled { integrity, ciphering }) => {
                    entity.set_security_enabled(integrity, ciphering)
                }
                Some(RxCommand::State(reply)) => {
                    let _ = reply.send(entity.state());
                }
                Some(RxCommand::Metrics(reply)) => {
                    let _ = reply.send(entity.metrics());
                }
                Some(RxCommand::ResetMetrics) => entity.reset_metrics(),
                Some(RxCommand::Stop) => break,
                None => {
                    warn!("All PDCP RX handles dropped");
                    break;
                }
            },
            Some(token) = expiry_rx.recv() => {
                if let Err(e) = entity.handle_reordering_timer_expiry(token) {
                    error!("t-Reordering expiry failed: {}", e);
                }
            }
        }
    }

    entity.stop();
    info!("PDCP RX task stopped");
}

impl PdcpRxHandle {
    fn send(&self, cmd: RxCommand) -> Result<(), PdcpError> {
        self.cmd_tx.send(cmd).map_err(|_| PdcpError::Stopped)
    }

    /// Queue a PDU from the lower layer
    pub fn handle_pdu(&self, pdu: Bytes) -> Result<(), PdcpError> {
        self.send(RxCommand::Pdu(pdu))
    }

    pub fn configure_security(&self, config: SecurityConfig) -> Result<(), PdcpError> {
        self.send(RxCommand::ConfigureSecurity(config))
    }

    pub fn set_security_enabled(&self, integrity: bool, ciphering: bool) -> Result<(), PdcpError> {
        self.send(RxCommand::SetSecurityEnabled { integrity, ciphering })
    }

    /// Current state variables, after all previously queued PDUs
    pub async fn state(&self) -> Result<RxState, PdcpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RxCommand::State(reply_tx))?;
        reply_rx.await.map_err(|_| PdcpError::Stopped)
    }

    pub async fn metrics(&self) -> Result<PdcpRxMetrics, PdcpError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RxCommand::Metrics(reply_tx))?;
        reply_rx.await.map_err(|_| PdcpError::Stopped)
    }

    pub fn reset_metrics(&self) -> Result<(), PdcpError> {
        self.send(RxCommand::ResetMetrics)
    }

    /// Stop the task and wait for it; buffered SDUs are discarded
    pub async fn stop(self) -> Result<(), PdcpError> {
        // Task may already be gone, joining still reports how it ended
        let _ = self.send(RxCommand::Stop);
        self.task
            .await
            .map_err(|e| PdcpError::InternalFault(format!("RX task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TReordering;
    use crate::header::write_header;
    use crate::notifier::RxControlEvent;
    use bytes::{BufMut, BytesMut};
    use common::types::{Direction, RbId, RbType, RlcMode, SnSize, UeIndex};
    use std::time::Duration;

    fn cfg(t_reordering: TReordering) -> PdcpRxConfig {
        PdcpRxConfig {
            ue_index: UeIndex(0),
            rb_type: RbType::Drb,
            rb_id: RbId::new(4).unwrap(),
            sn_size: SnSize::Size12,
            rlc_mode: RlcMode::Am,
            direction: Direction::Uplink,
            t_reordering,
        }
    }

    fn pdu(sn: u32) -> Bytes {
        let mut pdu = write_header(SnSize::Size12, sn);
        pdu.put_u8(sn as u8);
        pdu.freeze()
    }

    fn spawn(
        t_reordering: TReordering,
    ) -> (
        PdcpRxHandle,
        mpsc::UnboundedReceiver<Bytes>,
        mpsc::UnboundedReceiver<RxControlEvent>,
    ) {
        let (sdu_tx, sdu_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = spawn_rx_task(cfg(t_reordering), Box::new(sdu_tx), Box::new(event_tx));
        (handle, sdu_rx, event_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_handled_on_task() {
        let (handle, mut sdus, _events) = spawn(TReordering::Ms(40));
        handle.handle_pdu(pdu(0)).unwrap();
        handle.handle_pdu(pdu(2)).unwrap();

        assert_eq!(sdus.recv().await.unwrap().as_ref(), &[0]);
        let st = handle.state().await.unwrap();
        assert_eq!(st.rx_deliv, 1);
        assert_eq!(st.rx_reord, 3);

        let start = tokio::time::Instant::now();
        assert_eq!(sdus.recv().await.unwrap().as_ref(), &[2]);
        assert!(start.elapsed() >= Duration::from_millis(40));

        let st = handle.state().await.unwrap();
        assert_eq!(st.rx_deliv, 3);
        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.num_t_reordering_timeouts, 1);
        assert_eq!(metrics.num_sdus, 2);

        handle.reset_metrics().unwrap();
        assert_eq!(handle.metrics().await.unwrap(), PdcpRxMetrics::default());
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_filled_before_expiry() {
        let (handle, mut sdus, _events) = spawn(TReordering::Ms(40));
        handle.handle_pdu(pdu(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.handle_pdu(pdu(0)).unwrap();

        assert_eq!(sdus.recv().await.unwrap().as_ref(), &[0]);
        assert_eq!(sdus.recv().await.unwrap().as_ref(), &[1]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.num_t_reordering_timeouts, 0);
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_delivers_nothing() {
        let (handle, mut sdus, _events) = spawn(TReordering::Ms(40));
        handle.handle_pdu(pdu(1)).unwrap();
        handle.handle_pdu(pdu(2)).unwrap();
        handle.stop().await.unwrap();

        // The entity and its notifier are gone once the task ended
        assert!(sdus.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_integrity_failure_reported() {
        let (handle, _sdus, mut events) = spawn(TReordering::Infinity);
        handle
            .configure_security(SecurityConfig {
                integ_algo: crate::security::IntegrityAlgorithm::Nia2,
                k_up_int: [0x5c; 16],
                ..SecurityConfig::default()
            })
            .unwrap();
        handle.set_security_enabled(true, false).unwrap();

        let mut bad = BytesMut::from(pdu(0).as_ref());
        bad.put_slice(&[0, 0, 0, 0]);
        handle.handle_pdu(bad.freeze()).unwrap();

        assert_eq!(events.recv().await, Some(RxControlEvent::IntegrityFailure));
        assert_eq!(handle.state().await.unwrap(), RxState::default());
        handle.stop().await.unwrap();
    }
}
