//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub chain_list: ChainListConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub non_evm: NonEvmConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 钱包发现配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// EIP-6963 公告收集窗口
    pub announce_window_ms: u64,
}

/// 远程链列表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainListConfig {
    pub url: String,
    pub request_timeout_secs: u64,
}

/// 公共只读 RPC 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// 跨链余额聚合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// 同时查询的链数量上限
    pub max_concurrent_chains: usize,
    /// 单链超时，超时的链按零余额返回
    pub per_chain_timeout_ms: u64,
    pub include_testnets: bool,
}

/// 转账确认配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub receipt_poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
}

/// 非 EVM 链（Solana / Bitcoin）公共接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonEvmConfig {
    pub solana_rpc_url: String,
    pub mempool_api_url: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            announce_window_ms: std::env::var("DISCOVERY_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        }
    }
}

impl Default for ChainListConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("CHAIN_LIST_URL")
                .unwrap_or_else(|_| "https://chainid.network/chains.json".into()),
            request_timeout_secs: std::env::var("CHAIN_LIST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: std::env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connect_timeout_secs: std::env::var("RPC_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chains: std::env::var("AGGREGATION_MAX_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            per_chain_timeout_ms: std::env::var("AGGREGATION_CHAIN_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8_000),
            include_testnets: std::env::var("AGGREGATION_INCLUDE_TESTNETS")
                .ok()
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval_ms: std::env::var("RECEIPT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_500),
            confirmation_timeout_secs: std::env::var("CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl Default for NonEvmConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://solana.publicnode.com".into()),
            mempool_api_url: std::env::var("MEMPOOL_API_URL")
                .unwrap_or_else(|_| "https://mempool.space/api".into()),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            discovery: DiscoveryConfig::default(),
            chain_list: ChainListConfig::default(),
            rpc: RpcConfig::default(),
            aggregation: AggregationConfig::default(),
            transfer: TransferConfig::default(),
            non_evm: NonEvmConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                // 文件中缺失的段落回落到环境变量默认值
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.discovery.announce_window_ms == 0 {
            anyhow::bail!("DISCOVERY_WINDOW_MS must be greater than 0");
        }

        for (key, url) in [
            ("CHAIN_LIST_URL", &self.chain_list.url),
            ("SOLANA_RPC_URL", &self.non_evm.solana_rpc_url),
            ("MEMPOOL_API_URL", &self.non_evm.mempool_api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must be an http(s) URL", key);
            }
        }

        if self.aggregation.max_concurrent_chains == 0 {
            anyhow::bail!("AGGREGATION_MAX_CONCURRENCY must be at least 1");
        }

        if self.aggregation.per_chain_timeout_ms == 0 || self.rpc.request_timeout_secs == 0 {
            anyhow::bail!("timeouts must be greater than 0");
        }

        if self.transfer.receipt_poll_interval_ms == 0 {
            anyhow::bail!("RECEIPT_POLL_INTERVAL_MS must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_from_env() {
        let config = Config::from_env().unwrap();
        assert!(config.aggregation.max_concurrent_chains >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"
enable_file_logging = false

[discovery]
announce_window_ms = 250

[aggregation]
max_concurrent_chains = 3
per_chain_timeout_ms = 2000
include_testnets = false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.discovery.announce_window_ms, 250);
        assert_eq!(config.aggregation.max_concurrent_chains, 3);
        assert!(!config.aggregation.include_testnets);
        // 未写入文件的段落使用默认值
        assert!(config.transfer.receipt_poll_interval_ms > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_env() {
        let config = Config::from_env_and_file(Some("/nonexistent/ironwallet.toml")).unwrap();
        assert!(!config.chain_list.url.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::from_env().unwrap();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.aggregation.max_concurrent_chains = 0;
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.non_evm.mempool_api_url = "ftp://mempool".into();
        assert!(config.validate().is_err());
    }
}
