//! 公共只读 RPC 客户端
//!
//! - `JsonRpcClient`：HTTP JSON-RPC，实现 `RpcTransport`，用于"所有网络"聚合
//! - `PublicBalanceClient`：Solana JSON-RPC 与 mempool.space 余额查询

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{ProviderRpcError, RpcTransport};
use crate::config::{NonEvmConfig, RpcConfig};

/// 按配置构建共享 HTTP 客户端
pub fn build_http_client(config: &RpcConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// HTTP JSON-RPC 客户端
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: Option<i64>,
    #[serde(default)]
    message: String,
    data: Option<Value>,
}

#[async_trait]
impl RpcTransport for JsonRpcClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderRpcError::other(format!("RPC request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %self.url, %method, %status, "RPC endpoint returned error status");
            return Err(ProviderRpcError::other(format!("HTTP {}", status)));
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| ProviderRpcError::other(format!("Invalid RPC response: {}", e)))?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let parsed: RpcErrorObject = serde_json::from_value(error.clone())
                .unwrap_or(RpcErrorObject {
                    code: None,
                    message: error.to_string(),
                    data: None,
                });
            return Err(ProviderRpcError {
                code: parsed.code,
                message: parsed.message,
                data: parsed.data,
            });
        }

        Ok(body
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

/// 按链创建只读 RPC 通道
pub trait TransportFactory: Send + Sync {
    fn transport_for(&self, chain_id: &str, url: &str) -> Arc<dyn RpcTransport>;
}

/// 基于 reqwest 的默认实现（共享连接池）
pub struct HttpTransportFactory {
    http: reqwest::Client,
}

impl HttpTransportFactory {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn transport_for(&self, _chain_id: &str, url: &str) -> Arc<dyn RpcTransport> {
        Arc::new(JsonRpcClient::new(self.http.clone(), url))
    }
}

/// 非 EVM 链余额来源（返回最小单位）
#[async_trait]
pub trait NonEvmBalanceSource: Send + Sync {
    /// lamports
    async fn solana_lamports(&self, address: &str) -> Result<u64>;
    /// satoshis
    async fn bitcoin_sats(&self, address: &str) -> Result<u64>;
}

/// 公共接口余额客户端（Solana RPC + mempool.space）
pub struct PublicBalanceClient {
    http: reqwest::Client,
    solana: JsonRpcClient,
    mempool_api_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChainStats {
    #[serde(default)]
    funded_txo_sum: u64,
    #[serde(default)]
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct MempoolAddress {
    #[serde(default)]
    chain_stats: ChainStats,
}

impl PublicBalanceClient {
    pub fn new(http: reqwest::Client, config: &NonEvmConfig) -> Self {
        Self {
            solana: JsonRpcClient::new(http.clone(), &config.solana_rpc_url),
            http,
            mempool_api_url: config.mempool_api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl NonEvmBalanceSource for PublicBalanceClient {
    async fn solana_lamports(&self, address: &str) -> Result<u64> {
        let result = self
            .solana
            .request("getBalance", json!([address]))
            .await
            .map_err(|e| anyhow::anyhow!("Solana RPC error: {}", e))?;

        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("Invalid Solana RPC response"))
    }

    async fn bitcoin_sats(&self, address: &str) -> Result<u64> {
        let url = format!("{}/address/{}", self.mempool_api_url, address);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to query Bitcoin balance")?;

        if !response.status().is_success() {
            anyhow::bail!("mempool API returned HTTP {}", response.status());
        }

        let data: MempoolAddress = response
            .json()
            .await
            .context("Failed to parse mempool API response")?;

        Ok(data
            .chain_stats
            .funded_txo_sum
            .saturating_sub(data.chain_stats.spent_txo_sum))
    }
}
