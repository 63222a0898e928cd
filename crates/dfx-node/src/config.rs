use crate::error::NodeError;
use dfx_core::amount::money_range;
use dfx_core::{format_amount, parse_amount, Amount, ChainParams, COIN};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

/// Serde adapter for amounts in TOML: written as a decimal string ("50",
/// "0.5"), read from a decimal string or a whole-coin integer.
/// The toml crate has no u128 support.
mod amount_toml {
    use super::*;

    pub fn serialize<S: Serializer>(val: &Amount, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_amount(*val))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        use serde::de::{self, Visitor};
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an amount as a decimal string or whole-coin integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                parse_amount(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                (v as u128)
                    .checked_mul(COIN)
                    .ok_or_else(|| E::custom("amount overflow"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                if v >= 0 {
                    self.visit_u64(v as u64)
                } else {
                    Err(E::custom("negative amount"))
                }
            }
        }

        d.deserialize_any(AmountVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Seeds the wallet's address derivation
    pub node_id: String,
    /// sled directory; `None` keeps everything in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub mempool: MempoolConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub coinbase_maturity: u64,
    #[serde(with = "amount_toml")]
    pub block_reward: Amount,
    #[serde(with = "amount_toml")]
    pub token_collateral: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolConfig {
    pub max_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        let params = ChainParams::default();
        Self {
            coinbase_maturity: params.coinbase_maturity,
            block_reward: params.block_reward,
            token_collateral: params.token_collateral,
        }
    }
}

impl ChainConfig {
    pub fn params(&self) -> ChainParams {
        ChainParams {
            coinbase_maturity: self.coinbase_maturity,
            block_reward: self.block_reward,
            token_collateral: self.token_collateral,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { max_size: 10_000 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl NodeConfig {
    /// In-memory node with default chain parameters.
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            data_dir: None,
            chain: ChainConfig::default(),
            mempool: MempoolConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Load config from TOML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self, NodeError> {
        let content = fs::read_to_string(path)?;
        let mut config: NodeConfig = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn load_from_env() -> Self {
        let node_id = std::env::var("DFX_NODE_ID")
            .unwrap_or_else(|_| format!("dfx-node-{}", std::process::id()));
        let mut config = Self::new(&node_id);
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("DFX_NODE_ID") {
            self.node_id = id;
        }
        if let Ok(dir) = std::env::var("DFX_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(level) = std::env::var("DFX_LOG") {
            self.log.level = level;
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), NodeError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.node_id.is_empty() {
            return Err("node_id cannot be empty".to_string());
        }
        if self.chain.block_reward == 0 || !money_range(self.chain.block_reward) {
            return Err("block_reward must be in (0, MAX_MONEY]".to_string());
        }
        if self.chain.token_collateral == 0 || !money_range(self.chain.token_collateral) {
            return Err("token_collateral must be in (0, MAX_MONEY]".to_string());
        }
        if self.mempool.max_size == 0 {
            return Err("mempool max_size must be positive".to_string());
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "unknown log level '{}' (expected one of {})",
                self.log.level,
                LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let config: NodeConfig = toml::from_str(
            r#"
            node_id = "alpha"

            [chain]
            coinbase_maturity = 10
            block_reward = "25.5"
            token_collateral = 1

            [mempool]
            max_size = 50

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.node_id, "alpha");
        assert_eq!(config.data_dir, None);
        assert_eq!(config.chain.coinbase_maturity, 10);
        assert_eq!(config.chain.block_reward, 2_550_000_000);
        assert_eq!(config.chain.token_collateral, COIN);
        assert_eq!(config.mempool.max_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_default() {
        let config: NodeConfig = toml::from_str(r#"node_id = "beta""#).unwrap();
        assert_eq!(config.chain.params(), ChainParams::default());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        let mut config = NodeConfig::new("gamma");
        config.chain.token_collateral = COIN / 2;
        config.save_to_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("token_collateral = \"0.5\""));
        let content: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(content, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NodeConfig::new("delta");
        config.log.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = NodeConfig::new("");
        assert!(config.validate().is_err());
        config.node_id = "x".to_string();
        config.mempool.max_size = 0;
        assert!(config.validate().is_err());
    }
}
