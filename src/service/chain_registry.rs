//! 网络注册表
//!
//! 支持的网络来自 chainid.network 的社区链列表（每个会话只拉取一次），
//! 只保留热门主网/测试网并按热门程度排序，最后追加 Solana 与 Bitcoin。
//! 拉取失败时回落到内置网络表。注册表整体替换，读取方持有 `Arc` 快照。

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    config::ChainListConfig,
    domain::{
        chain_config::{
            allowed_chain_rank, bitcoin_network, builtin_networks, solana_network,
            CHAIN_DISPLAY_NAME, CHAIN_ICON_COLOR, CHAIN_ICON_MAP,
            DEFAULT_ICON_COLOR, DEFAULT_ICON_KEY, PUBLIC_READ_ONLY_RPC, RPC_OVERRIDE,
        },
        NativeCurrency, Network,
    },
    utils::chain_normalizer::chain_id_hex,
};

/// chains.json 中的一条
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainListEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub short_name: String,
    pub network_id: Option<u64>,
    pub native_currency: Option<ChainListCurrency>,
    #[serde(default)]
    pub rpc: Vec<String>,
    #[serde(default)]
    pub explorers: Vec<ChainListExplorer>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainListCurrency {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainListExplorer {
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// 按网络分组的下拉框数据
#[derive(Debug, Clone, Default)]
pub struct GroupedNetworks {
    pub mainnets: Vec<Network>,
    pub testnets: Vec<Network>,
}

/// 不可变的网络表（保持展示顺序）
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: Vec<Network>,
    index: HashMap<String, usize>,
}

impl NetworkRegistry {
    /// 同 chainId 后者覆盖前者，位置保持首次出现处
    pub fn new(networks: Vec<Network>) -> Self {
        let mut ordered: Vec<Network> = Vec::with_capacity(networks.len());
        let mut index = HashMap::new();
        for network in networks {
            match index.get(&network.chain_id) {
                Some(&pos) => ordered[pos] = network,
                None => {
                    index.insert(network.chain_id.clone(), ordered.len());
                    ordered.push(network);
                }
            }
        }
        Self {
            networks: ordered,
            index,
        }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_networks())
    }

    pub fn get(&self, chain_id: &str) -> Option<&Network> {
        self.index.get(chain_id).map(|&i| &self.networks[i])
    }

    pub fn contains(&self, chain_id: &str) -> bool {
        self.index.contains_key(chain_id)
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn grouped(&self) -> GroupedNetworks {
        let (testnets, mainnets) = self.networks.iter().cloned().partition(|n| n.is_testnet);
        GroupedNetworks { mainnets, testnets }
    }

    /// "所有网络"只读查询使用的 RPC；非 EVM 链没有
    pub fn public_rpc(&self, chain_id: &str) -> Option<String> {
        let network = self.get(chain_id)?;
        if !network.is_evm() {
            return None;
        }
        PUBLIC_READ_ONLY_RPC
            .get(chain_id)
            .map(|s| s.to_string())
            .or_else(|| network.rpc_urls.first().cloned())
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
    }

    /// 原生币精度，未知链按 18
    pub fn native_decimals(&self, chain_id: &str) -> u8 {
        self.get(chain_id)
            .map(|n| n.native_currency.decimals)
            .unwrap_or(18)
    }
}

/// 第一个不含模板变量的 http(s) RPC，去掉末尾 `/`
fn pick_public_rpc(rpc_list: &[String]) -> Option<String> {
    let first = rpc_list.first()?;
    let picked = rpc_list
        .iter()
        .find(|u| !u.contains("${") && (u.starts_with("http://") || u.starts_with("https://")))
        .unwrap_or(first);
    let trimmed = picked.trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// chains.json 条目转换为 `Network`
pub fn chain_list_entry_to_network(entry: &ChainListEntry) -> Option<Network> {
    let chain_id = chain_id_hex(entry.chain_id);
    let rpc = RPC_OVERRIDE
        .get(chain_id.as_str())
        .map(|s| s.to_string())
        .or_else(|| pick_public_rpc(&entry.rpc))?;

    let short_name = [&entry.short_name, &entry.chain, &entry.name]
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default();
    let currency = entry.native_currency.as_ref()?;

    let is_testnet = entry.chain_id != 1
        && (entry.network_id != Some(entry.chain_id)
            || entry.name.to_lowercase().contains("test"));

    Some(Network {
        chain_name: entry.name.clone(),
        display_name: Some(
            CHAIN_DISPLAY_NAME
                .get(chain_id.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| short_name.clone()),
        ),
        short_name,
        native_currency: NativeCurrency::new(&currency.name, &currency.symbol, currency.decimals),
        rpc_urls: vec![rpc],
        block_explorer_urls: entry.explorers.first().map(|e| vec![e.url.clone()]),
        icon_key: CHAIN_ICON_MAP
            .get(chain_id.as_str())
            .unwrap_or(&DEFAULT_ICON_KEY)
            .to_string(),
        icon_color: CHAIN_ICON_COLOR
            .get(chain_id.as_str())
            .unwrap_or(&DEFAULT_ICON_COLOR)
            .to_string(),
        is_testnet,
        chain_id,
    })
}

/// 过滤、转换、按热门程度排序，并追加非 EVM 网络
pub fn build_registry_from_chain_list(entries: &[ChainListEntry]) -> NetworkRegistry {
    let mut evm: Vec<(usize, Network)> = entries
        .iter()
        .filter(|c| {
            c.chain_id != 0
                && !c.short_name.is_empty()
                && c.native_currency
                    .as_ref()
                    .is_some_and(|n| !n.symbol.is_empty())
                && c.status.as_deref() != Some("deprecated")
                && !c.rpc.is_empty()
        })
        .filter_map(chain_list_entry_to_network)
        .filter_map(|n| allowed_chain_rank(&n.chain_id).map(|rank| (rank, n)))
        .collect();
    evm.sort_by_key(|(rank, _)| *rank);

    let mut networks: Vec<Network> = evm.into_iter().map(|(_, n)| n).collect();
    networks.push(solana_network());
    networks.push(bitcoin_network());
    NetworkRegistry::new(networks)
}

/// 网络注册表服务
pub struct ChainRegistry {
    snapshot: RwLock<Arc<NetworkRegistry>>,
    loaded: AtomicBool,
    http: reqwest::Client,
    config: ChainListConfig,
}

impl ChainRegistry {
    pub fn new(http: reqwest::Client, config: ChainListConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(NetworkRegistry::builtin())),
            loaded: AtomicBool::new(false),
            http,
            config,
        }
    }

    /// 固定网络表，不访问远端（测试与离线模式）
    pub fn with_registry(registry: NetworkRegistry) -> Self {
        let this = Self::new(reqwest::Client::new(), ChainListConfig::default());
        this.replace(registry);
        this.loaded.store(true, Ordering::SeqCst);
        this
    }

    pub fn snapshot(&self) -> Arc<NetworkRegistry> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, registry: NetworkRegistry) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(registry);
    }

    /// 拉取远端链列表；已加载且非强制时直接返回缓存
    pub async fn refresh(&self, force: bool) -> Arc<NetworkRegistry> {
        if !force && self.loaded.load(Ordering::SeqCst) {
            return self.snapshot();
        }

        match self.fetch_chain_list().await {
            Ok(entries) => {
                let registry = build_registry_from_chain_list(&entries);
                tracing::info!(
                    networks = registry.len(),
                    source = %self.config.url,
                    "Chain registry loaded"
                );
                self.replace(registry);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch chain list, using built-in networks");
                self.replace(NetworkRegistry::builtin());
            }
        }

        self.loaded.store(true, Ordering::SeqCst);
        self.snapshot()
    }

    async fn fetch_chain_list(&self) -> Result<Vec<ChainListEntry>> {
        let response = self
            .http
            .get(&self.config.url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .context("Failed to request chain list")?;

        if !response.status().is_success() {
            anyhow::bail!("chain list returned HTTP {}", response.status());
        }

        response
            .json::<Vec<ChainListEntry>>()
            .await
            .context("Failed to parse chain list")
    }
}
