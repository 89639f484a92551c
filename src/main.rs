//! IronWallet 命令行入口
//!
//! 无界面驱动：加载网络表，并可对给定地址做一次"所有网络"余额聚合。
//!
//! ```text
//! ironwallet [--force-refresh] [--solana <addr>] [--bitcoin <addr>] [<evm-address>...]
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ironwallet::{
    config::Config,
    infrastructure::{
        logging::init_logging,
        rpc_client::{build_http_client, HttpTransportFactory, PublicBalanceClient},
    },
    service::{AddressSet, BalanceAggregator, ChainRegistry},
    utils::address_validator::AddressValidator,
};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Multi-chain wallet balance driver", long_about = None)]
struct Args {
    /// 忽略缓存，重新拉取 chains.json
    #[arg(long)]
    force_refresh: bool,
    /// Solana 公钥（base58）
    #[arg(long, value_parser = parse_solana_address)]
    solana: Option<String>,
    /// Bitcoin 地址
    #[arg(long, value_parser = parse_bitcoin_address)]
    bitcoin: Option<String>,
    /// EVM 地址
    #[arg(value_parser = parse_evm_address)]
    addresses: Vec<String>,
}

impl Args {
    fn address_set(&self) -> AddressSet {
        AddressSet {
            evm: self.addresses.clone(),
            solana: self.solana.clone(),
            bitcoin: self.bitcoin.clone(),
        }
    }
}

fn parse_evm_address(value: &str) -> Result<String, String> {
    if AddressValidator::is_evm_address(value) {
        Ok(value.to_string())
    } else {
        Err(format!("Invalid EVM address: {}", value))
    }
}

fn parse_solana_address(value: &str) -> Result<String, String> {
    if AddressValidator::is_solana_address(value) {
        Ok(value.to_string())
    } else {
        Err(format!("Invalid Solana address: {}", value))
    }
}

fn parse_bitcoin_address(value: &str) -> Result<String, String> {
    if AddressValidator::is_bitcoin_address(value) {
        Ok(value.to_string())
    } else {
        Err(format!("Invalid Bitcoin address: {}", value))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // guard 必须活到进程结束，否则文件日志会丢
    let _log_guard =
        init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    tracing::info!(config = ?config_path, "Starting IronWallet");

    let http = build_http_client(&config.rpc);
    let chains = ChainRegistry::new(http.clone(), config.chain_list.clone());
    let registry = chains.refresh(args.force_refresh).await;

    let grouped = registry.grouped();
    println!("Mainnets ({}):", grouped.mainnets.len());
    for network in &grouped.mainnets {
        println!("  {:<12} {}", network.chain_id, network.label());
    }
    println!("Testnets ({}):", grouped.testnets.len());
    for network in &grouped.testnets {
        println!("  {:<12} {}", network.chain_id, network.label());
    }

    let addresses = args.address_set();
    if addresses.is_empty() {
        return Ok(());
    }

    let aggregator = BalanceAggregator::new(
        Arc::new(HttpTransportFactory::new(http.clone())),
        Arc::new(PublicBalanceClient::new(http, &config.non_evm)),
        config.aggregation.clone(),
    );
    let rows = aggregator
        .fetch_all_networks(&registry, &addresses)
        .await;

    println!("{}", serde_json::to_string_pretty(&rows)?);
    tracing::info!(chains = rows.len(), "Aggregation finished");
    Ok(())
}
