//! Simulated peer transmitter producing a protected, reordered PDU stream

use bytes::Bytes;
use common::types::SnSize;
use pdcp::security::SecurityEngine;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::TrafficConfig;

/// Payload of the SDU with the given COUNT; the first 4 bytes carry the COUNT
pub fn sdu_payload(rng: &mut StdRng, count: u32, len: usize) -> Vec<u8> {
    let mut sdu = vec![0u8; len];
    sdu[..4].copy_from_slice(&count.to_be_bytes());
    rng.fill(&mut sdu[4..]);
    sdu
}

/// COUNT stamped into an SDU by [`sdu_payload`]
pub fn sdu_count(sdu: &[u8]) -> Option<u32> {
    let head: [u8; 4] = sdu.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(head))
}

/// Generated stream and what it contains
pub struct PduStream {
    pub pdus: Vec<Bytes>,
    pub lost: u32,
    pub duplicated: u32,
}

/// Protect `num_sdus` SDUs, then apply loss, duplication and local reordering
pub fn build_pdu_stream(
    engine: &SecurityEngine,
    sn_size: SnSize,
    traffic: &TrafficConfig,
) -> PduStream {
    let mut rng = StdRng::seed_from_u64(traffic.seed);
    let mut pdus = Vec::with_capacity(traffic.num_sdus as usize);
    let mut lost = 0;
    let mut duplicated = 0;

    for count in 0..traffic.num_sdus {
        let sdu = sdu_payload(&mut rng, count, traffic.sdu_len);
        let pdu = engine.protect_pdu(sn_size, count, &sdu);
        if rng.gen_bool(traffic.loss_rate) {
            lost += 1;
            continue;
        }
        if rng.gen_bool(traffic.duplicate_rate) {
            duplicated += 1;
            pdus.push(pdu.clone());
        }
        pdus.push(pdu);
    }

    for block in pdus.chunks_mut(traffic.reorder_depth) {
        block.shuffle(&mut rng);
    }

    debug!(
        "Generated {} PDUs ({} lost, {} duplicated)",
        pdus.len(),
        lost,
        duplicated
    );
    PduStream {
        pdus,
        lost,
        duplicated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Direction, RbId, RbType};
    use pdcp::header::parse_header;
    use pdcp::SecurityConfig;

    fn engine() -> SecurityEngine {
        SecurityEngine::new(
            SecurityConfig::default(),
            RbType::Drb,
            RbId::new(1).unwrap(),
            Direction::Uplink,
        )
    }

    #[test]
    fn test_lossless_stream_contains_every_sn_once() {
        let traffic = TrafficConfig {
            num_sdus: 100,
            reorder_depth: 10,
            ..TrafficConfig::default()
        };
        let stream = build_pdu_stream(&engine(), SnSize::Size12, &traffic);
        assert_eq!(stream.lost, 0);
        assert_eq!(stream.duplicated, 0);

        let mut sns: Vec<u32> = stream
            .pdus
            .iter()
            .map(|pdu| parse_header(pdu, SnSize::Size12).unwrap())
            .collect();
        assert_ne!(sns, (0..100).collect::<Vec<_>>());
        sns.sort_unstable();
        assert_eq!(sns, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stream_is_deterministic() {
        let traffic = TrafficConfig {
            num_sdus: 200,
            loss_rate: 0.1,
            duplicate_rate: 0.1,
            ..TrafficConfig::default()
        };
        let a = build_pdu_stream(&engine(), SnSize::Size18, &traffic);
        let b = build_pdu_stream(&engine(), SnSize::Size18, &traffic);
        assert_eq!(a.pdus, b.pdus);
        assert_eq!(a.pdus.len() as u32, 200 - a.lost + a.duplicated);
    }

    #[test]
    fn test_sdu_count_stamp() {
        let mut rng = StdRng::seed_from_u64(7);
        let sdu = sdu_payload(&mut rng, 0x01020304, 16);
        assert_eq!(sdu_count(&sdu), Some(0x01020304));
        assert_eq!(sdu_count(&[1, 2]), None);
    }
}
