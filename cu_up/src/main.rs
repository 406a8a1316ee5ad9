//! Albor Space CU-UP PDCP Receive Simulator
//!
//! Feeds a protected, lossy and reordered PDU stream into one PDCP receiving
//! entity and reports what reached the upper layer.

mod config;
mod traffic;

use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pdcp::security::SecurityEngine;
use pdcp::{spawn_rx_task, RxControlEvent, TReordering};

use crate::config::CuUpConfig;
use crate::traffic::{build_pdu_stream, sdu_count};

/// Albor Space CU-UP PDCP simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cu_up/cu_up.yml")]
    config: String,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of SDUs to send
    #[arg(long)]
    num_sdus: Option<u32>,

    /// Seed of the traffic generator
    #[arg(long)]
    seed: Option<u64>,

    /// PDU loss probability (0.0-1.0)
    #[arg(long)]
    loss_rate: Option<f64>,
}

/// Time allowed for the entity to settle after the last PDU
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut cfg = CuUpConfig::from_yaml_file(&args.config)?;
    if let Some(n) = args.num_sdus {
        cfg.traffic.num_sdus = n;
    }
    if let Some(seed) = args.seed {
        cfg.traffic.seed = seed;
    }
    if let Some(rate) = args.loss_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(anyhow!("Invalid loss rate: {}", rate));
        }
        cfg.traffic.loss_rate = rate;
    }

    // Initialize logging
    let log_level = args.log_level.unwrap_or_else(|| cfg.log.level.clone());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space CU-UP PDCP simulator");
    info!("Configuration file: {}", args.config);
    info!("Bearer configuration:");
    info!("  RB: {:?} {}", cfg.bearer.rb_type, cfg.bearer.rb_id.value());
    info!("  SN size: {} bits", cfg.bearer.sn_size.bits());
    info!("  RLC mode: {:?}", cfg.bearer.rlc_mode);
    info!("  t-Reordering: {:?}", cfg.bearer.t_reordering);
    info!(
        "  Traffic: {} SDUs of {} B, loss={}, duplicates={}, reorder depth={}",
        cfg.traffic.num_sdus,
        cfg.traffic.sdu_len,
        cfg.traffic.loss_rate,
        cfg.traffic.duplicate_rate,
        cfg.traffic.reorder_depth
    );

    let sec_cfg = cfg.security.to_security_config()?;

    // Peer transmitter protecting the stream with the same context
    let mut tx_engine = SecurityEngine::new(
        sec_cfg.clone(),
        cfg.bearer.rb_type,
        cfg.bearer.rb_id,
        cfg.bearer.direction,
    );
    tx_engine.set_enabled(cfg.security.integrity, cfg.security.ciphering);
    let stream = build_pdu_stream(&tx_engine, cfg.bearer.sn_size, &cfg.traffic);
    info!(
        "Generated {} PDUs ({} lost, {} duplicated)",
        stream.pdus.len(),
        stream.lost,
        stream.duplicated
    );

    let (sdu_tx, mut sdu_rx) = mpsc::unbounded_channel::<Bytes>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RxControlEvent>();
    let handle = spawn_rx_task(cfg.bearer.clone(), Box::new(sdu_tx), Box::new(event_tx));
    handle.configure_security(sec_cfg)?;
    handle.set_security_enabled(cfg.security.integrity, cfg.security.ciphering)?;

    // Upper layer: check in-order delivery
    let collector = tokio::spawn(async move {
        let mut delivered = 0u64;
        let mut out_of_order = 0u64;
        let mut last: Option<u32> = None;
        while let Some(sdu) = sdu_rx.recv().await {
            let count = sdu_count(&sdu);
            if let (Some(prev), Some(count)) = (last, count) {
                if count <= prev {
                    error!("SDU COUNT={} delivered after COUNT={}", count, prev);
                    out_of_order += 1;
                }
            }
            last = count.or(last);
            delivered += 1;
        }
        (delivered, out_of_order)
    });

    let control = tokio::spawn(async move {
        let mut failures = 0u64;
        while let Some(event) = event_rx.recv().await {
            warn!("Upper control indication: {:?}", event);
            failures += 1;
        }
        failures
    });

    for pdu in stream.pdus {
        handle.handle_pdu(pdu)?;
    }

    // Wait for t-Reordering to flush the remaining gaps
    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    loop {
        let st = handle.state().await?;
        if st.rx_deliv == st.rx_next {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            if cfg.bearer.t_reordering == TReordering::Infinity {
                warn!(
                    "Gaps remain with infinite t-Reordering: RX_DELIV={}, RX_NEXT={}",
                    st.rx_deliv, st.rx_next
                );
            } else {
                error!(
                    "Entity did not settle: RX_DELIV={}, RX_NEXT={}",
                    st.rx_deliv, st.rx_next
                );
            }
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let metrics = handle.metrics().await?;
    handle.stop().await?;
    let (delivered, out_of_order) = collector.await?;
    let failures = control.await?;

    info!("Delivered {} SDUs, {} control indications", delivered, failures);
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    if out_of_order > 0 {
        return Err(anyhow!("{} SDUs delivered out of order", out_of_order));
    }
    Ok(())
}
