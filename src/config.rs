use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default scoring endpoint of the hosted fraud model.
pub const DEFAULT_ORACLE_URL: &str = "https://dex-9vfo.onrender.com/predict_fraud";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub oracle: OracleConfig,
    pub pipeline: PipelineConfig,
    pub database: DatabaseConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    /// Websocket endpoint carrying the pending-transaction subscription.
    pub ws_url: Option<String>,
    /// JSON-RPC endpoint used for contract calls.
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub private_key: Option<String>,
    /// Chain id the reporter key signs for. Fetched from the node on the
    /// first submission when unset.
    pub chain_id: Option<u64>,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OracleConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub max_response_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scores strictly above this value are reported on-chain.
    pub fraud_threshold: f64,
    /// Multiplier turning the fractional score into the on-chain integer.
    pub score_scale: u32,
    pub resolve_delay_ms: u64,
    pub resolve_attempts: u32,
    pub max_in_flight: usize,
    pub dedup_ttl_secs: u64,
    pub dedup_capacity: usize,
    pub report_timeout_secs: u64,
    /// Log a throughput summary every N observed transactions.
    pub stats_interval: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub path: String,
}

// Hand-written so the reporter key never ends up in logs.
impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("ws_url", &self.ws_url)
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("chain_id", &self.chain_id)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .finish()
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            rpc_url: None,
            contract_address: None,
            private_key: None,
            chain_id: None,
            reconnect_delay_secs: 5,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ORACLE_URL.into(),
            timeout_secs: 15,
            max_response_bytes: 64 * 1024,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fraud_threshold: 0.7,
            score_scale: 100,
            resolve_delay_ms: 500,
            resolve_attempts: 1,
            max_in_flight: 512,
            dedup_ttl_secs: 600,
            dedup_capacity: 50_000,
            report_timeout_secs: 120,
            stats_interval: 100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data/findings.db".into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings the pipeline cannot start without, checked by [`Config::validate`].
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub ws_url: String,
    pub rpc_url: String,
    pub contract_address: String,
    pub private_key: String,
    pub chain_id: Option<u64>,
}

impl Config {
    /// Load config from a TOML file. A missing file means all defaults;
    /// an unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&contents).map_err(|reason| ConfigError::Parse {
            path: path.display().to_string(),
            reason,
        })?;
        tracing::info!("Config loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Overlay process environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay settings from `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("WSS_PROVIDER") {
            self.chain.ws_url = Some(v);
        }
        if let Some(v) = get("RPC_URL") {
            self.chain.rpc_url = Some(v);
        }
        if let Some(v) = get("CONTRACT_ADDRESS") {
            self.chain.contract_address = Some(v);
        }
        if let Some(v) = get("PRIVATE_KEY") {
            self.chain.private_key = Some(v);
        }
        if let Some(v) = get("CHAIN_ID") {
            let id = v.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "CHAIN_ID",
                reason: e.to_string(),
            })?;
            self.chain.chain_id = Some(id);
        }
        if let Some(v) = get("ORACLE_URL") {
            self.oracle.url = v;
        }
        if let Some(v) = get("FRAUD_THRESHOLD") {
            self.pipeline.fraud_threshold = v.parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::Invalid {
                    key: "FRAUD_THRESHOLD",
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = get("FINDINGS_DB") {
            self.database.path = v;
        }
        Ok(())
    }

    /// Check required settings and value ranges.
    pub fn validate(&self) -> Result<ChainSettings, ConfigError> {
        let required = |value: &Option<String>, key: &'static str| {
            value.clone().ok_or(ConfigError::Missing(key))
        };
        let settings = ChainSettings {
            ws_url: endpoint(required(&self.chain.ws_url, "WSS_PROVIDER")?, "WSS_PROVIDER", &["ws", "wss"])?,
            rpc_url: endpoint(required(&self.chain.rpc_url, "RPC_URL")?, "RPC_URL", &["http", "https"])?,
            contract_address: required(&self.chain.contract_address, "CONTRACT_ADDRESS")?,
            private_key: required(&self.chain.private_key, "PRIVATE_KEY")?,
            chain_id: self.chain.chain_id,
        };

        let threshold = self.pipeline.fraud_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "fraud_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.pipeline.score_scale == 0 {
            return Err(ConfigError::Invalid {
                key: "score_scale",
                reason: "must be greater than zero".into(),
            });
        }
        if self.pipeline.resolve_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "resolve_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.oracle.url.is_empty() {
            return Err(ConfigError::Missing("ORACLE_URL"));
        }
        Ok(settings)
    }
}

/// Reject endpoints that are not URLs or use a scheme the client cannot speak.
fn endpoint(value: String, key: &'static str, schemes: &[&str]) -> Result<String, ConfigError> {
    let url = reqwest::Url::parse(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value:?}: {e}"),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("scheme {:?} is not one of {}", url.scheme(), schemes.join(", ")),
        });
    }
    Ok(value)
}

impl PipelineConfig {
    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_delay_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn complete_env() -> HashMap<String, String> {
        env(&[
            ("WSS_PROVIDER", "wss://node.example/ws"),
            ("RPC_URL", "https://node.example/rpc"),
            ("CONTRACT_ADDRESS", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            ("PRIVATE_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
        ])
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.fraud_threshold, 0.7);
        assert_eq!(config.pipeline.score_scale, 100);
        assert_eq!(config.pipeline.resolve_delay_ms, 500);
        assert_eq!(config.oracle.url, DEFAULT_ORACLE_URL);
    }

    #[test]
    fn env_overlay_fills_required_settings() {
        let vars = complete_env();
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        let settings = config.validate().unwrap();
        assert_eq!(settings.ws_url, "wss://node.example/ws");
        assert_eq!(settings.rpc_url, "https://node.example/rpc");
    }

    #[test]
    fn missing_private_key_is_fatal() {
        let mut vars = complete_env();
        vars.remove("PRIVATE_KEY");
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.validate().unwrap_err(), ConfigError::Missing("PRIVATE_KEY"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut vars = complete_env();
        vars.insert("WSS_PROVIDER".into(), "   ".into());
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.validate().unwrap_err(), ConfigError::Missing("WSS_PROVIDER"));
    }

    #[test]
    fn feed_endpoint_must_be_websocket() {
        for bad in ["https://node.example/ws", "node.example:8546", "not a url"] {
            let mut vars = complete_env();
            vars.insert("WSS_PROVIDER".into(), bad.into());
            let mut config = Config::default();
            config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { key: "WSS_PROVIDER", .. })),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn plain_ws_endpoint_accepted() {
        let mut vars = complete_env();
        vars.insert("WSS_PROVIDER".into(), "ws://127.0.0.1:8546".into());
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.validate().unwrap().ws_url, "ws://127.0.0.1:8546");
    }

    #[test]
    fn rpc_endpoint_must_be_http() {
        let mut vars = complete_env();
        vars.insert("RPC_URL".into(), "wss://node.example/ws".into());
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "RPC_URL", .. })
        ));
    }

    #[test]
    fn chain_id_from_env() {
        let mut vars = complete_env();
        vars.insert("CHAIN_ID".into(), "11155111".into());
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.validate().unwrap().chain_id, Some(11_155_111));

        let vars = env(&[("CHAIN_ID", "sepolia")]);
        let err = Config::default().apply_env_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHAIN_ID", .. }));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let vars = complete_env();
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        config.pipeline.fraud_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "fraud_threshold", .. })
        ));
    }

    #[test]
    fn unparsable_threshold_env_rejected() {
        let vars = env(&[("FRAUD_THRESHOLD", "high")]);
        let mut config = Config::default();
        let err = config.apply_env_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FRAUD_THRESHOLD", .. }));
    }

    #[test]
    fn toml_sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [chain]
            ws_url = "ws://127.0.0.1:8546"

            [pipeline]
            fraud_threshold = 0.85
            max_in_flight = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.ws_url.as_deref(), Some("ws://127.0.0.1:8546"));
        assert_eq!(config.pipeline.fraud_threshold, 0.85);
        assert_eq!(config.pipeline.max_in_flight, 8);
        assert_eq!(config.pipeline.score_scale, 100);
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let vars = complete_env();
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
        assert!(rendered.contains("<redacted>"));
    }
}
