//! 代币转账集成测试

mod common;

use std::sync::Arc;

use common::*;
use ironwallet::{
    config::TransferConfig,
    domain::ProviderOrigin,
    error::WalletError,
    infrastructure::{
        event_bus::{EventBus, InMemoryEventBus},
        provider::{ProviderRpcError, ProviderSigner},
    },
    service::transfer_dispatcher::{
        SignerSource, SubmissionPath, TransferDispatcher, TransferForm, CONFIRMED_NOTICE,
        DEFAULT_DECIMALS_NOTICE, SUBMITTED_NOTICE, SWAPPED_NOTICE,
    },
    utils::units::parse_amount,
};
use serde_json::{json, Value};

const TOKEN: &str = "0x3333333333333333333333333333333333333333";
const TX_HASH: &str = "0x5e1d3a76fbf824220eafc8c8bd4fb5a3bf81a04a8e6c7f2c1b1d3e4f5a6b7c8d";

fn uint_word(value: u64) -> String {
    format!("0x{:064x}", value)
}

struct FixedSigner(ProviderSigner);

impl SignerSource for FixedSigner {
    fn active_signer(&self) -> Option<ProviderSigner> {
        Some(self.0.clone())
    }
}

fn fast_config() -> TransferConfig {
    TransferConfig {
        receipt_poll_interval_ms: 1,
        confirmation_timeout_secs: 5,
    }
}

/// 代币合约 + 6 位精度 + 一次空回执后确认
fn token_wallet() -> Arc<MockWalletHandle> {
    let handle = MockWalletHandle::metamask();
    handle.mark_contract(TOKEN);
    handle.set_default("eth_call", json!(uint_word(6)));
    handle.set_default("eth_sendTransaction", json!(TX_HASH));
    handle.push_response("eth_getTransactionReceipt", Ok(Value::Null));
    handle.set_default(
        "eth_getTransactionReceipt",
        json!({ "status": "0x1", "blockNumber": "0x10" }),
    );
    handle
}

fn dispatcher_for(handle: &Arc<MockWalletHandle>) -> (TransferDispatcher, Arc<InMemoryEventBus>) {
    let events = Arc::new(InMemoryEventBus::new());
    let signer = ProviderSigner::new(handle.clone(), ALICE, "0x1");
    let dispatcher =
        TransferDispatcher::new(Arc::new(FixedSigner(signer)), events.clone(), fast_config());
    (dispatcher, events)
}

#[tokio::test]
async fn test_transfer_raw_path() {
    let handle = token_wallet();
    let (dispatcher, events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(TOKEN, "1.5", BOB);

    let receipt = dispatcher.send(&mut form).await.unwrap();

    assert_eq!(receipt.tx_hash, TX_HASH);
    assert_eq!(receipt.decimals, 6);
    assert_eq!(receipt.path, SubmissionPath::Raw);
    assert_eq!(receipt.block_number, Some(16));
    assert!(receipt.notices.is_empty());

    let sent = handle.calls("eth_sendTransaction");
    assert_eq!(sent.len(), 1);
    let tx = &sent[0][0];
    assert_eq!(tx["to"], TOKEN);
    assert_eq!(tx["from"], ALICE);
    let data = tx["data"].as_str().unwrap();
    assert!(data.starts_with("0xa9059cbb"));
    // 1.5 * 10^6
    assert!(data.ends_with(&format!("{:064x}", 1_500_000u64)));
    assert_eq!(handle.call_count("eth_getTransactionReceipt"), 2);

    let notices: Vec<String> = events.notices().into_iter().map(|(_, m)| m).collect();
    assert!(notices.contains(&SUBMITTED_NOTICE.to_string()));
    assert!(notices.contains(&CONFIRMED_NOTICE.to_string()));

    let history = events.get_event_history(10, 0).await.unwrap();
    let types: Vec<&str> = history.iter().map(|e| e.event.event_type()).collect();
    assert!(types.contains(&"TransferSubmitted"));
    assert!(types.contains(&"TransferConfirmed"));
}

#[tokio::test]
async fn test_swapped_addresses_are_corrected() {
    let handle = token_wallet();
    let (dispatcher, events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(BOB, "2", TOKEN);

    let receipt = dispatcher.send(&mut form).await.unwrap();

    assert_eq!(form.token_address, TOKEN);
    assert_eq!(form.to_address, BOB);
    assert_eq!(receipt.token_address, TOKEN);
    assert_eq!(receipt.notices, vec![SWAPPED_NOTICE.to_string()]);
    assert_eq!(handle.calls("eth_sendTransaction")[0][0]["to"], TOKEN);
    assert!(events
        .notices()
        .iter()
        .any(|(_, m)| m == SWAPPED_NOTICE));
}

#[tokio::test]
async fn test_no_contract_on_either_side() {
    let handle = token_wallet();
    let (dispatcher, _events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(ALICE, "1", BOB);

    let err = dispatcher.send(&mut form).await.unwrap_err();

    assert_eq!(
        err,
        WalletError::InvalidToken("Token Address must be a contract address.".into())
    );
    assert_eq!(handle.call_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_decimals_failure_falls_back_to_18() {
    let handle = MockWalletHandle::metamask();
    handle.mark_contract(TOKEN);
    handle.set_default("eth_sendTransaction", json!(TX_HASH));
    handle.set_default("eth_getTransactionReceipt", json!({ "status": "0x1" }));
    let (dispatcher, _events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(TOKEN, "2", BOB);

    let receipt = dispatcher.send(&mut form).await.unwrap();

    assert_eq!(receipt.decimals, 18);
    assert_eq!(receipt.block_number, None);
    assert_eq!(receipt.notices, vec![DEFAULT_DECIMALS_NOTICE.to_string()]);
    let data = handle.calls("eth_sendTransaction")[0][0]["data"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(data.ends_with(&format!("{:064x}", 2_000_000_000_000_000_000u64)));
}

#[tokio::test]
async fn test_cannot_include_data_uses_typed_path() {
    let handle = token_wallet();
    handle.push_response(
        "eth_sendTransaction",
        Err(ProviderRpcError::other(
            "External transactions to internal accounts cannot include data",
        )),
    );
    handle.set_default("eth_estimateGas", json!("0xfde8"));
    let (dispatcher, _events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(TOKEN, "1", BOB);

    let receipt = dispatcher.send(&mut form).await.unwrap();

    assert_eq!(receipt.path, SubmissionPath::Typed);
    let sent = handle.calls("eth_sendTransaction");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1][0]["gas"], "0xfde8");
    assert_eq!(sent[1][0]["value"], "0x0");
    assert_eq!(handle.call_count("eth_estimateGas"), 1);
}

#[tokio::test]
async fn test_user_rejection_is_classified() {
    let handle = token_wallet();
    handle.push_response(
        "eth_sendTransaction",
        Err(ProviderRpcError::new(4001, "User denied transaction signature.")),
    );
    let (dispatcher, events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(TOKEN, "1", BOB);

    let err = dispatcher.send(&mut form).await.unwrap_err();

    assert_eq!(err, WalletError::UserRejected);
    assert_eq!(handle.call_count("eth_getTransactionReceipt"), 0);
    assert!(!events.notices().is_empty());
}

#[tokio::test]
async fn test_reverted_transaction() {
    let handle = token_wallet();
    handle.set_default("eth_getTransactionReceipt", json!({ "status": "0x0" }));
    let (dispatcher, _events) = dispatcher_for(&handle);
    let mut form = TransferForm::new(TOKEN, "1", BOB);

    let err = dispatcher.send(&mut form).await.unwrap_err();
    assert_eq!(err, WalletError::ProviderError("transaction reverted".into()));
}

#[tokio::test]
async fn test_invalid_amounts_are_rejected() {
    let handle = token_wallet();
    let (dispatcher, _events) = dispatcher_for(&handle);

    for amount in ["0", "-1", "abc", "", "1e3"] {
        let mut form = TransferForm::new(TOKEN, amount, BOB);
        let err = dispatcher.send(&mut form).await.unwrap_err();
        let expected = parse_amount(amount, 18).unwrap_err().to_string();
        assert_eq!(err, WalletError::InvalidInput(expected), "amount {:?}", amount);
    }
    assert_eq!(handle.call_count("eth_getCode"), 0);
}

#[tokio::test]
async fn test_transfer_requires_connected_session() {
    let wallet = build_wallet(default_non_evm());
    let dispatcher = TransferDispatcher::new(
        Arc::new(wallet.session.clone()),
        wallet.events.clone(),
        fast_config(),
    );
    let mut form = TransferForm::new(TOKEN, "1", BOB);

    let err = dispatcher.send(&mut form).await.unwrap_err();
    assert_eq!(err, WalletError::NotConnected);
}

#[tokio::test]
async fn test_confirmation_refreshes_session() {
    let wallet = build_wallet(default_non_evm());
    let handle = token_wallet();
    wallet
        .session
        .connect(&wallet_provider(
            "eip6963-metamask",
            handle.clone(),
            ProviderOrigin::Announced,
        ))
        .await
        .unwrap();

    let session = Arc::new(wallet.session.clone());
    let dispatcher = TransferDispatcher::new(session.clone(), wallet.events.clone(), fast_config())
        .with_observer(session);

    let balance_reads = handle.call_count("eth_getBalance");
    let mut form = TransferForm::new(TOKEN, "1", BOB);
    dispatcher.send(&mut form).await.unwrap();

    assert_eq!(handle.calls("eth_sendTransaction")[0][0]["from"], ALICE);
    assert!(handle.call_count("eth_getBalance") > balance_reads);
}
