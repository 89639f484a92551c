pub mod event_bus;
pub mod evm_reader;
pub mod logging;
pub mod provider;
pub mod rpc_client;
pub mod session_storage;
