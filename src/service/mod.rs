pub mod balance_aggregator;
pub mod chain_registry;
pub mod non_evm;
pub mod provider_detector; // 钱包发现（EIP-6963 + 注入 provider）
pub mod transfer_dispatcher;
pub mod wallet_session; // 会话状态机

pub use balance_aggregator::{AddressSet, BalanceAggregator};
pub use chain_registry::{ChainRegistry, NetworkRegistry};
pub use non_evm::NonEvmSessions;
pub use provider_detector::ProviderDetector;
pub use transfer_dispatcher::{TransferDispatcher, TransferForm};
pub use wallet_session::{WalletSession, WalletView};
