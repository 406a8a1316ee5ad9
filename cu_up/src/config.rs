//! YAML configuration of the CU-UP PDCP simulator

use anyhow::{anyhow, Context};
use common::utils::parse_key_128;
use pdcp::security::Key128;
use pdcp::{CipheringAlgorithm, IntegrityAlgorithm, PdcpRxConfig, SecurityConfig};
use serde::{Deserialize, Serialize};

/// Top level simulator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CuUpConfig {
    /// Receiving bearer under test
    pub bearer: PdcpRxConfig,
    /// Security context shared by the simulated peer and the receiver
    #[serde(default)]
    pub security: SecuritySection,
    /// Generated PDU stream
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Security section, keys as hex strings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecuritySection {
    #[serde(default)]
    pub integrity: bool,
    #[serde(default)]
    pub ciphering: bool,
    /// NIA algorithm number (0-3)
    #[serde(default)]
    pub integ_algo: IntegrityAlgorithm,
    /// NEA algorithm number (0-3)
    #[serde(default)]
    pub cipher_algo: CipheringAlgorithm,
    pub k_rrc_int: Option<String>,
    pub k_rrc_enc: Option<String>,
    pub k_up_int: Option<String>,
    pub k_up_enc: Option<String>,
}

/// Shape of the PDU stream fed to the receiver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrafficConfig {
    #[serde(default = "default_num_sdus")]
    pub num_sdus: u32,
    #[serde(default = "default_sdu_len")]
    pub sdu_len: usize,
    /// Probability of a PDU being lost
    #[serde(default)]
    pub loss_rate: f64,
    /// Probability of a PDU being sent twice
    #[serde(default)]
    pub duplicate_rate: f64,
    /// PDUs are shuffled within blocks of this many
    #[serde(default = "default_reorder_depth")]
    pub reorder_depth: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            num_sdus: default_num_sdus(),
            sdu_len: default_sdu_len(),
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_depth: default_reorder_depth(),
            seed: default_seed(),
        }
    }
}

fn default_num_sdus() -> u32 {
    1000
}

fn default_sdu_len() -> usize {
    64
}

fn default_reorder_depth() -> usize {
    8
}

fn default_seed() -> u64 {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CuUpConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        let config: CuUpConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let t = &self.traffic;
        if !(0.0..=1.0).contains(&t.loss_rate) || !(0.0..=1.0).contains(&t.duplicate_rate) {
            return Err(anyhow!("loss_rate and duplicate_rate must lie in [0, 1]"));
        }
        if t.reorder_depth == 0 || t.reorder_depth as u32 >= self.bearer.sn_size.window_size() {
            return Err(anyhow!(
                "reorder_depth must be between 1 and {}",
                self.bearer.sn_size.window_size() - 1
            ));
        }
        if t.sdu_len < 4 {
            return Err(anyhow!("sdu_len must be at least 4 bytes"));
        }
        Ok(())
    }
}

fn parse_key(name: &str, hex: &Option<String>) -> anyhow::Result<Key128> {
    match hex {
        Some(hex) => parse_key_128(hex)
            .ok_or_else(|| anyhow!("Invalid {}: expected 32 hex digits", name)),
        None => Ok([0; 16]),
    }
}

impl SecuritySection {
    /// Decode keys into the security context, missing keys are all zero
    pub fn to_security_config(&self) -> anyhow::Result<SecurityConfig> {
        Ok(SecurityConfig {
            integ_algo: self.integ_algo,
            cipher_algo: self.cipher_algo,
            k_rrc_int: parse_key("k_rrc_int", &self.k_rrc_int)?,
            k_rrc_enc: parse_key("k_rrc_enc", &self.k_rrc_enc)?,
            k_up_int: parse_key("k_up_int", &self.k_up_int)?,
            k_up_enc: parse_key("k_up_enc", &self.k_up_enc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::SnSize;
    use pdcp::TReordering;

    const MINIMAL: &str = r#"
bearer:
  rb_type: srb
  rb_id: 1
  sn_size: 12
  rlc_mode: am
  t_reordering: infinity
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = CuUpConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(cfg.bearer.sn_size, SnSize::Size12);
        assert_eq!(cfg.bearer.t_reordering, TReordering::Infinity);
        assert!(!cfg.security.integrity);
        assert_eq!(cfg.traffic.num_sdus, 1000);
        assert_eq!(cfg.log.level, "info");

        let sec = cfg.security.to_security_config().unwrap();
        assert_eq!(sec, SecurityConfig::default());
    }

    #[test]
    fn test_sample_config_parses() {
        let cfg = CuUpConfig::from_yaml_str(include_str!("../cu_up.yml")).unwrap();
        assert_eq!(cfg.bearer.sn_size, SnSize::Size18);
        assert_eq!(cfg.bearer.t_reordering, TReordering::Ms(50));
        assert_eq!(cfg.security.integ_algo, IntegrityAlgorithm::Nia2);

        let sec = cfg.security.to_security_config().unwrap();
        assert_eq!(sec.k_up_int[0], 0x01);
        assert_eq!(sec.k_up_enc[15], 0x10);
        assert_eq!(sec.k_rrc_int, [0; 16]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_algo = format!("{}security:\n  integ_algo: 4\n", MINIMAL);
        assert!(CuUpConfig::from_yaml_str(&bad_algo).is_err());

        let bad_key = format!("{}security:\n  k_up_enc: \"0123\"\n", MINIMAL);
        let cfg = CuUpConfig::from_yaml_str(&bad_key).unwrap();
        assert!(cfg.security.to_security_config().is_err());

        let bad_rate = format!("{}traffic:\n  loss_rate: 1.5\n", MINIMAL);
        assert!(CuUpConfig::from_yaml_str(&bad_rate).is_err());

        let bad_depth = format!("{}traffic:\n  reorder_depth: 4096\n", MINIMAL);
        assert!(CuUpConfig::from_yaml_str(&bad_depth).is_err());
    }
}
