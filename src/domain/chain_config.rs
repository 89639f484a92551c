//! 多链配置模块
//!
//! 内置网络表、公共只读 RPC、图标/展示名映射以及常见代币列表。
//! 远程链列表不可用时，注册表回落到这里的内置表。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{
    account::TokenListEntry,
    network::{NativeCurrency, Network, ALL_NETWORKS_CHAIN_ID, BITCOIN_CHAIN_ID, SOLANA_CHAIN_ID},
};

/// 未知链的图标 key 与主色
pub const DEFAULT_ICON_KEY: &str = "generic";
pub const DEFAULT_ICON_COLOR: &str = "#627EEA";

/// 按热门程度排序的主网白名单
pub const TOP_MAINNET_CHAIN_IDS: [&str; 20] = [
    "0x1",     // Ethereum
    "0x38",    // BNB Chain
    "0x89",    // Polygon
    "0xa4b1",  // Arbitrum One
    "0xa",     // Optimism
    "0x2105",  // Base
    "0xa86a",  // Avalanche C-Chain
    "0xfa",    // Fantom
    "0x144",   // zkSync Era
    "0xe708",  // Linea
    "0x19",    // Cronos
    "0x64",    // Gnosis
    "0x440",   // Metis
    "0xa4ec",  // Celo
    "0x1388",  // Mantle
    "0x82750", // Scroll
    "0x13e31", // Blast
    "0x8ae",   // Kava
    "0x169",   // Manta Pacific
    "0xcc",    // opBNB
];

/// 按热门程度排序的测试网白名单，排在主网之后
pub const TOP_TESTNET_CHAIN_IDS: [&str; 5] = [
    "0xaa36a7", // Ethereum Sepolia
    "0x13882",  // Polygon Amoy
    "0x66eee",  // Arbitrum Sepolia
    "0x14a34",  // Base Sepolia
    "0xaa37dc", // Optimism Sepolia
];

/// 白名单中的排序位置（主网在前，测试网在后）
pub fn allowed_chain_rank(chain_id: &str) -> Option<usize> {
    TOP_MAINNET_CHAIN_IDS
        .iter()
        .chain(TOP_TESTNET_CHAIN_IDS.iter())
        .position(|id| *id == chain_id)
}

/// 部署了 ENS 注册表的链
pub const ENS_CHAIN_IDS: [&str; 2] = ["0x1", "0xaa36a7"];

struct BuiltinChain {
    chain_id: &'static str,
    chain_name: &'static str,
    short_name: &'static str,
    currency: (&'static str, &'static str, u8),
    rpc: &'static str,
    explorer: &'static str,
    icon_key: &'static str,
    icon_color: &'static str,
    is_testnet: bool,
}

#[rustfmt::skip]
const BUILTIN_CHAINS: &[BuiltinChain] = &[
    // ========== 主网 ==========
    BuiltinChain { chain_id: "0x1", chain_name: "Ethereum Mainnet", short_name: "Ethereum", currency: ("Ether", "ETH", 18), rpc: "https://mainnet.infura.io/v3/", explorer: "https://etherscan.io", icon_key: "ethereum", icon_color: "#627EEA", is_testnet: false },
    BuiltinChain { chain_id: "0x89", chain_name: "Polygon", short_name: "Polygon", currency: ("POL", "POL", 18), rpc: "https://polygon-rpc.com", explorer: "https://polygonscan.com", icon_key: "polygon", icon_color: "#8247E5", is_testnet: false },
    BuiltinChain { chain_id: "0xa4b1", chain_name: "Arbitrum One", short_name: "Arbitrum", currency: ("Ether", "ETH", 18), rpc: "https://rpc.ankr.com/arbitrum", explorer: "https://arbiscan.io", icon_key: "arbitrum", icon_color: "#28A0F0", is_testnet: false },
    BuiltinChain { chain_id: "0xa", chain_name: "Optimism", short_name: "Optimism", currency: ("Ether", "ETH", 18), rpc: "https://mainnet.optimism.io", explorer: "https://optimistic.etherscan.io", icon_key: "optimism", icon_color: "#FF0420", is_testnet: false },
    BuiltinChain { chain_id: "0x38", chain_name: "BNB Smart Chain", short_name: "BSC", currency: ("BNB", "BNB", 18), rpc: "https://bsc-dataseed.binance.org", explorer: "https://bscscan.com", icon_key: "bnb", icon_color: "#F0B90B", is_testnet: false },
    BuiltinChain { chain_id: "0x2105", chain_name: "Base", short_name: "Base", currency: ("Ether", "ETH", 18), rpc: "https://mainnet.base.org", explorer: "https://basescan.org", icon_key: "base", icon_color: "#0052FF", is_testnet: false },
    BuiltinChain { chain_id: "0xa86a", chain_name: "Avalanche C-Chain", short_name: "Avalanche", currency: ("AVAX", "AVAX", 18), rpc: "https://rpc.ankr.com/avalanche", explorer: "https://snowtrace.io", icon_key: "avalanche", icon_color: "#E84142", is_testnet: false },
    BuiltinChain { chain_id: "0x144", chain_name: "zkSync Era", short_name: "zkSync", currency: ("Ether", "ETH", 18), rpc: "https://mainnet.era.zksync.io", explorer: "https://explorer.zksync.io", icon_key: "zkSync", icon_color: "#1E69FF", is_testnet: false },
    BuiltinChain { chain_id: "0xe708", chain_name: "Linea", short_name: "Linea", currency: ("Ether", "ETH", 18), rpc: "https://rpc.linea.build", explorer: "https://lineascan.build", icon_key: "linea", icon_color: "#121212", is_testnet: false },
    // ========== 测试网 ==========
    BuiltinChain { chain_id: "0xaa36a7", chain_name: "Sepolia", short_name: "Sepolia", currency: ("Sepolia Ether", "ETH", 18), rpc: "https://sepolia.infura.io/v3/", explorer: "https://sepolia.etherscan.io", icon_key: "ethereum", icon_color: "#627EEA", is_testnet: true },
    BuiltinChain { chain_id: "0x13882", chain_name: "Polygon Amoy", short_name: "Amoy", currency: ("POL", "POL", 18), rpc: "https://rpc-amoy.polygon.technology", explorer: "https://amoy.polygonscan.com", icon_key: "polygon", icon_color: "#8247E5", is_testnet: true },
    BuiltinChain { chain_id: "0x66eee", chain_name: "Arbitrum Sepolia", short_name: "Arb Sepolia", currency: ("Ether", "ETH", 18), rpc: "https://arbitrum-sepolia-rpc.publicnode.com", explorer: "https://sepolia.arbiscan.io", icon_key: "arbitrum", icon_color: "#28A0F0", is_testnet: true },
    BuiltinChain { chain_id: "0xaa37dc", chain_name: "Optimism Sepolia", short_name: "OP Sepolia", currency: ("Ether", "ETH", 18), rpc: "https://sepolia.optimism.io", explorer: "https://sepolia-optimism.etherscan.io", icon_key: "optimism", icon_color: "#FF0420", is_testnet: true },
    BuiltinChain { chain_id: "0x61", chain_name: "BSC Testnet", short_name: "BSC Test", currency: ("tBNB", "tBNB", 18), rpc: "https://data-seed-prebsc-1-s1.binance.org:8545", explorer: "https://testnet.bscscan.com", icon_key: "bnb", icon_color: "#F0B90B", is_testnet: true },
    BuiltinChain { chain_id: "0x14a34", chain_name: "Base Sepolia", short_name: "Base Sep", currency: ("Ether", "ETH", 18), rpc: "https://sepolia.base.org", explorer: "https://sepolia.basescan.org", icon_key: "base", icon_color: "#0052FF", is_testnet: true },
    BuiltinChain { chain_id: "0xa869", chain_name: "Avalanche Fuji", short_name: "Fuji", currency: ("AVAX", "AVAX", 18), rpc: "https://rpc.ankr.com/avalanche_fuji", explorer: "https://testnet.snowtrace.io", icon_key: "avalanche", icon_color: "#E84142", is_testnet: true },
    BuiltinChain { chain_id: "0x12c", chain_name: "zkSync Sepolia", short_name: "zkSync Sep", currency: ("Ether", "ETH", 18), rpc: "https://sepolia.era.zksync.dev", explorer: "https://sepolia.explorer.zksync.io", icon_key: "zkSync", icon_color: "#1E69FF", is_testnet: true },
    BuiltinChain { chain_id: "0xe705", chain_name: "Linea Sepolia", short_name: "Linea Sep", currency: ("Ether", "ETH", 18), rpc: "https://rpc.sepolia.linea.build", explorer: "https://sepolia.lineascan.build", icon_key: "linea", icon_color: "#121212", is_testnet: true },
];

impl BuiltinChain {
    fn to_network(&self) -> Network {
        let (name, symbol, decimals) = self.currency;
        Network {
            chain_id: self.chain_id.to_string(),
            chain_name: self.chain_name.to_string(),
            short_name: self.short_name.to_string(),
            display_name: CHAIN_DISPLAY_NAME.get(self.chain_id).map(|s| s.to_string()),
            native_currency: NativeCurrency::new(name, symbol, decimals),
            rpc_urls: vec![self.rpc.to_string()],
            block_explorer_urls: Some(vec![self.explorer.to_string()]),
            icon_key: self.icon_key.to_string(),
            icon_color: self.icon_color.to_string(),
            is_testnet: self.is_testnet,
        }
    }
}

/// Solana 主网描述
pub fn solana_network() -> Network {
    Network {
        chain_id: SOLANA_CHAIN_ID.to_string(),
        chain_name: "Solana".to_string(),
        short_name: "Solana".to_string(),
        display_name: Some("Solana".to_string()),
        native_currency: NativeCurrency::new("SOL", "SOL", 9),
        rpc_urls: vec!["https://solana.publicnode.com".to_string()],
        block_explorer_urls: Some(vec!["https://explorer.solana.com".to_string()]),
        icon_key: "solana".to_string(),
        icon_color: "#9945FF".to_string(),
        is_testnet: false,
    }
}

/// Bitcoin 主网描述
pub fn bitcoin_network() -> Network {
    Network {
        chain_id: BITCOIN_CHAIN_ID.to_string(),
        chain_name: "Bitcoin".to_string(),
        short_name: "Bitcoin".to_string(),
        display_name: Some("Bitcoin".to_string()),
        native_currency: NativeCurrency::new("Bitcoin", "BTC", 8),
        rpc_urls: vec!["https://mempool.space/api".to_string()],
        block_explorer_urls: Some(vec!["https://mempool.space".to_string()]),
        icon_key: "bitcoin".to_string(),
        icon_color: "#F7931A".to_string(),
        is_testnet: false,
    }
}

/// 内置网络表：EVM 主网、Solana、Bitcoin、EVM 测试网
pub fn builtin_networks() -> Vec<Network> {
    let mut networks: Vec<Network> = BUILTIN_CHAINS
        .iter()
        .filter(|c| !c.is_testnet)
        .map(BuiltinChain::to_network)
        .collect();
    networks.push(solana_network());
    networks.push(bitcoin_network());
    networks.extend(
        BUILTIN_CHAINS
            .iter()
            .filter(|c| c.is_testnet)
            .map(BuiltinChain::to_network),
    );
    networks
}

/// chainId -> iconKey
pub static CHAIN_ICON_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    BUILTIN_CHAINS
        .iter()
        .map(|c| (c.chain_id, c.icon_key))
        .collect()
});

/// chainId -> 图标主色
pub static CHAIN_ICON_COLOR: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    BUILTIN_CHAINS
        .iter()
        .map(|c| (c.chain_id, c.icon_color))
        .collect()
});

/// chainId -> 下拉框展示名
pub static CHAIN_DISPLAY_NAME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("0x1", "Ethereum"),
        ("0x38", "BNB Chain"),
        ("0x89", "Polygon"),
        ("0xa4b1", "Arbitrum"),
        ("0xa", "Optimism"),
        ("0x2105", "Base"),
        ("0xa86a", "Avalanche"),
        ("0xfa", "Fantom"),
        ("0x144", "zkSync Era"),
        ("0xe708", "Linea"),
        ("0x19", "Cronos"),
        ("0x64", "Gnosis"),
        ("0x440", "Metis"),
        ("0xa4ec", "Celo"),
        ("0x1388", "Mantle"),
        ("0x82750", "Scroll"),
        ("0x13e31", "Blast"),
        ("0x8ae", "Kava"),
        ("0x169", "Manta Pacific"),
        ("0xcc", "opBNB"),
        ("0xaa36a7", "Sepolia"),
        ("0x13882", "Polygon Amoy"),
        ("0x66eee", "Arbitrum Sepolia"),
        ("0x14a34", "Base Sepolia"),
        ("0xaa37dc", "Optimism Sepolia"),
    ])
});

/// 官方 RPC 已知不可用（401/429/500）时的公开替代
pub static RPC_OVERRIDE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("0xa4b1", "https://rpc.ankr.com/arbitrum"),
        ("0x66eee", "https://arbitrum-sepolia-rpc.publicnode.com"),
        ("0xfa", "https://rpc.ankr.com/fantom"),
        ("0xa86a", "https://rpc.ankr.com/avalanche"),
        ("0xa869", "https://rpc.ankr.com/avalanche_fuji"),
    ])
});

/// "所有网络"只读查询使用的公开 RPC（无需 API Key）。
/// 钱包切链仍使用网络自身的 rpcUrls。
pub static PUBLIC_READ_ONLY_RPC: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("0x1", "https://rpc.ankr.com/eth"),
        ("0x89", "https://polygon-rpc.com"),
        ("0xa4b1", "https://rpc.ankr.com/arbitrum"),
        ("0xa", "https://mainnet.optimism.io"),
        ("0x38", "https://bsc-dataseed.binance.org"),
        ("0x2105", "https://mainnet.base.org"),
        ("0xa86a", "https://rpc.ankr.com/avalanche"),
        ("0x144", "https://mainnet.era.zksync.io"),
        ("0xe708", "https://rpc.linea.build"),
        ("0xaa36a7", "https://ethereum-sepolia.publicnode.com"),
        ("0x13882", "https://rpc-amoy.polygon.technology"),
        ("0x66eee", "https://arbitrum-sepolia-rpc.publicnode.com"),
        ("0xaa37dc", "https://sepolia.optimism.io"),
        ("0x61", "https://data-seed-prebsc-1-s1.binance.org:8545"),
        ("0x14a34", "https://sepolia.base.org"),
        ("0xa869", "https://rpc.ankr.com/avalanche_fuji"),
        ("0x12c", "https://sepolia.era.zksync.dev"),
        ("0xe705", "https://rpc.sepolia.linea.build"),
    ])
});

#[rustfmt::skip]
const COMMON_TOKENS: &[(&str, &[(&str, &str, &str)])] = &[
    ("0x1", &[
        ("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", "USD Coin"),
        ("0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT", "Tether USD"),
        ("0x6B175474E89094C44Da98b954EedeAC495271d0F", "DAI", "Dai Stablecoin"),
        ("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", "WBTC", "Wrapped BTC"),
    ]),
    ("0xaa36a7", &[
        ("0xfFf9976782d46CC05630D1f6eBAb18b2324d6B14", "WETH", "Wrapped Ether"),
        ("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238", "USDC", "USD Coin"),
    ]),
    ("0x89", &[
        ("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", "USDC", "USD Coin"),
        ("0xc2132D05D31c914a87C6611C10748AEb04B58e8F", "USDT", "Tether USD"),
        ("0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063", "DAI", "Dai Stablecoin"),
        ("0x1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6", "WBTC", "Wrapped BTC"),
    ]),
    ("0xa4b1", &[
        ("0xaf88d065e77c8cC2239327C5EDb3A432268e5831", "USDC", "USD Coin"),
        ("0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", "USDT", "Tether USD"),
        ("0xDA10009cBd5D07dd0CeCc66161FC93D7c9000da1", "DAI", "Dai Stablecoin"),
        ("0x2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f", "WBTC", "Wrapped BTC"),
    ]),
    ("0xa", &[
        ("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85", "USDC", "USD Coin"),
        ("0x94b008aA00579c1307B0EF2c499aD98a8ce58e58", "USDT", "Tether USD"),
        ("0xDA10009cBd5D07dd0CeCc66161FC93D7c9000da1", "DAI", "Dai Stablecoin"),
        ("0x68f180fcCe6836688e9084f035309E29Bf0A2095", "WBTC", "Wrapped BTC"),
    ]),
    ("0x38", &[
        ("0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", "USDC", "USD Coin"),
        ("0x55d398326f99059fF775485246999027B3197955", "USDT", "Tether USD"),
        ("0x1AF3F329e8BE154074D8769D1FFa4eE058B1DBc3", "DAI", "Dai Stablecoin"),
        ("0x7130d2A12B9BCbFAe4f2634d864A1Ee1Ce3Ead9c", "BTCB", "Binance BTC"),
    ]),
    ("0x2105", &[
        ("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "USDC", "USD Coin"),
        ("0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb", "DAI", "Dai Stablecoin"),
    ]),
    ("0xa86a", &[
        ("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E", "USDC", "USD Coin"),
        ("0x9702230A8Ea53601f5cD2dc00fDBc13d4dF4A8c7", "USDT", "Tether USD"),
        ("0xd586E7F844cEa2F87f50152665BCbc2C279D8d70", "DAI", "Dai Stablecoin"),
        ("0x152b9d0FdC40C096757F570A51E494bd4b943E50", "BTC.b", "Bitcoin"),
    ]),
    ("0x144", &[
        ("0x3355df6D4c9C3035724Fd0e3914dE96A5a83aaf4", "USDC", "USD Coin"),
        ("0x493257fD37EDB34451f62EDf8D2a0C418852bA4C", "USDT", "Tether USD"),
    ]),
    ("0xe708", &[
        ("0x176211869cA2b568f2A7D4EE941E073a821EE1ff", "USDC", "USD Coin"),
        ("0xA219439258ca9da29E9Cc4cE5596924745e12B93", "USDT", "Tether USD"),
    ]),
];

/// chainId -> 候选代币（地址统一小写）
static TOKEN_LISTS: Lazy<HashMap<&'static str, Vec<TokenListEntry>>> = Lazy::new(|| {
    COMMON_TOKENS
        .iter()
        .map(|(chain_id, tokens)| {
            let entries = tokens
                .iter()
                .map(|(address, symbol, name)| TokenListEntry {
                    address: address.to_lowercase(),
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    decimals: None,
                })
                .collect();
            (*chain_id, entries)
        })
        .collect()
});

/// 指定链的候选代币列表；非 EVM 与"所有网络"返回空
pub fn token_list_for_chain(chain_id: &str) -> &'static [TokenListEntry] {
    if matches!(
        chain_id,
        SOLANA_CHAIN_ID | BITCOIN_CHAIN_ID | ALL_NETWORKS_CHAIN_ID
    ) {
        return &[];
    }
    TOKEN_LISTS
        .get(chain_id)
        .map(|list| list.as_slice())
        .unwrap_or(&[])
}
