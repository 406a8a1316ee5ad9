//! Upper layer interfaces of the receiving entity

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives SDUs delivered in ascending COUNT order
pub trait RxUpperDataNotifier {
    fn on_new_sdu(&mut self, sdu: Bytes);
}

/// Receives failure indications (towards RRC)
pub trait RxUpperControlNotifier {
    fn on_integrity_failure(&mut self);
    fn on_protocol_failure(&mut self);
}

/// Control plane indication forwarded over a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxControlEvent {
    IntegrityFailure,
    ProtocolFailure,
}

impl RxUpperDataNotifier for mpsc::UnboundedSender<Bytes> {
    fn on_new_sdu(&mut self, sdu: Bytes) {
        if self.send(sdu).is_err() {
            warn!("Upper layer closed, dropping SDU");
        }
    }
}

impl RxUpperControlNotifier for mpsc::UnboundedSender<RxControlEvent> {
    fn on_integrity_failure(&mut self) {
        if self.send(RxControlEvent::IntegrityFailure).is_err() {
            warn!("Upper control layer closed, dropping integrity failure");
        }
    }

    fn on_protocol_failure(&mut self) {
        if self.send(RxControlEvent::ProtocolFailure).is_err() {
            warn!("Upper control layer closed, dropping protocol failure");
        }
    }
}
