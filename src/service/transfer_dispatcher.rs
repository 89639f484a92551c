//! 代币转账
//!
//! 使用会话当前签名者发送 ERC20 `transfer`：
//! 1. 通过 `eth_getCode` 校验代币地址与收款地址的角色，明显填反时自动交换
//! 2. `decimals()` 失败按 18 位处理
//! 3. 先走原始 `eth_sendTransaction`；部分钱包拒绝带 data 的内部账户交易时，
//!    改走模拟 + 估算 gas + 显式 gas 的发送路径
//! 4. 轮询回执直到确认或超时

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::TransferConfig,
    error::{WalletError, WalletResult},
    infrastructure::{
        event_bus::{EventBus, NoticeLevel, WalletEvent},
        evm_reader::{encode_transfer, parse_address, to_hex_data, EvmReader, DEFAULT_TOKEN_DECIMALS},
        provider::{ProviderRpcError, ProviderSigner},
    },
    utils::{
        address_validator::AddressValidator,
        units::{parse_amount, parse_hex_quantity},
    },
};

pub const SWAPPED_NOTICE: &str =
    "Token Address and To Address were swapped; corrected and sending.";
pub const DEFAULT_DECIMALS_NOTICE: &str = "Using 18 decimals for amount.";
pub const SUBMITTED_NOTICE: &str = "Transaction submitted, waiting for confirmation...";
pub const CONFIRMED_NOTICE: &str = "Transaction sent successfully!";

static CANNOT_INCLUDE_DATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)internal accounts cannot include data|cannot include data").unwrap()
});

/// 转账表单（交换地址时会被改写）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferForm {
    pub token_address: String,
    pub amount: String,
    pub to_address: String,
}

impl TransferForm {
    pub fn new(token_address: &str, amount: &str, to_address: &str) -> Self {
        Self {
            token_address: token_address.trim().to_string(),
            amount: amount.trim().to_string(),
            to_address: to_address.trim().to_string(),
        }
    }
}

/// 提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPath {
    /// 原始 eth_sendTransaction
    Raw,
    /// 模拟 + 估算 gas 后发送
    Typed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub token_address: String,
    pub to_address: String,
    pub amount: String,
    pub decimals: u8,
    pub path: SubmissionPath,
    pub block_number: Option<u64>,
    /// 非致命提示
    pub notices: Vec<String>,
}

/// 当前签名者来源（由钱包会话实现）
pub trait SignerSource: Send + Sync {
    fn active_signer(&self) -> Option<ProviderSigner>;
}

/// 转账确认后的回调
#[async_trait]
pub trait TransferObserver: Send + Sync {
    async fn on_transfer_confirmed(&self, receipt: &TransferReceipt);
}

/// 钱包错误归类
pub fn classify_transfer_error(error: &ProviderRpcError) -> WalletError {
    if error.is_user_rejected() {
        return WalletError::UserRejected;
    }
    let detail = error.detail_message();
    if detail.to_lowercase().contains("insufficient") || detail.contains("INSUFFICIENT_FUNDS") {
        return WalletError::InsufficientFunds;
    }
    WalletError::ProviderError(detail)
}

/// 钱包不接受带 data 的原始交易
pub fn is_cannot_include_data(error: &ProviderRpcError) -> bool {
    CANNOT_INCLUDE_DATA_RE.is_match(&error.detail_message())
}

pub struct TransferDispatcher {
    signer_source: Arc<dyn SignerSource>,
    events: Arc<dyn EventBus>,
    observer: Option<Arc<dyn TransferObserver>>,
    config: TransferConfig,
}

impl TransferDispatcher {
    pub fn new(
        signer_source: Arc<dyn SignerSource>,
        events: Arc<dyn EventBus>,
        config: TransferConfig,
    ) -> Self {
        Self {
            signer_source,
            events,
            observer: None,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    async fn publish(&self, event: WalletEvent) {
        if let Err(e) = self.events.publish(event).await {
            tracing::error!(error = ?e, "Failed to publish transfer event");
        }
    }

    async fn notice(&self, level: NoticeLevel, message: &str) {
        self.publish(WalletEvent::notice(level, message)).await;
    }

    /// 发送转账并等待确认
    pub async fn send(&self, form: &mut TransferForm) -> WalletResult<TransferReceipt> {
        match self.execute(form).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Transfer failed");
                self.notice(NoticeLevel::Error, &e.user_message()).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, form: &mut TransferForm) -> WalletResult<TransferReceipt> {
        let signer = self
            .signer_source
            .active_signer()
            .ok_or(WalletError::NotConnected)?;

        for (label, address) in [("Token Address", &form.token_address), ("To Address", &form.to_address)] {
            if !AddressValidator::is_evm_address(address) {
                return Err(WalletError::InvalidInput(format!("{} is not a valid address", label)));
            }
        }
        // 精度未知前先按 18 位校验格式，发任何请求之前拒绝非法金额
        parse_amount(&form.amount, DEFAULT_TOKEN_DECIMALS)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;

        let mut notices = Vec::new();
        let reader = EvmReader::new(signer.handle.as_ref());

        let (token_code, to_code) = futures::join!(
            reader.has_code(&form.token_address),
            reader.has_code(&form.to_address),
        );
        let token_is_contract = token_code.map_err(|e| classify_transfer_error(&e))?;
        let to_is_contract = to_code.map_err(|e| classify_transfer_error(&e))?;

        if !token_is_contract {
            if !to_is_contract {
                return Err(WalletError::InvalidToken(
                    "Token Address must be a contract address.".into(),
                ));
            }
            std::mem::swap(&mut form.token_address, &mut form.to_address);
            tracing::info!(token = %form.token_address, to = %form.to_address, "Swapped token and recipient addresses");
            notices.push(SWAPPED_NOTICE.to_string());
            self.notice(NoticeLevel::Info, SWAPPED_NOTICE).await;
        }

        let decimals = match reader.decimals(&form.token_address).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(token = %form.token_address, error = %e, "decimals() failed, assuming 18");
                notices.push(DEFAULT_DECIMALS_NOTICE.to_string());
                self.notice(NoticeLevel::Warning, DEFAULT_DECIMALS_NOTICE).await;
                DEFAULT_TOKEN_DECIMALS
            }
        };

        let amount = parse_amount(&form.amount, decimals)
            .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
        let recipient = parse_address(&form.to_address)
            .ok_or_else(|| WalletError::InvalidInput("To Address is not a valid address".into()))?;
        let data = to_hex_data(&encode_transfer(recipient, amount));

        let (tx_hash, path) = match signer
            .send_transaction(json!({ "to": form.token_address, "data": data }))
            .await
        {
            Ok(hash) => (hash, SubmissionPath::Raw),
            Err(e) if is_cannot_include_data(&e) => {
                tracing::info!(error = %e, "Wallet refused raw data transaction, retrying with estimated gas");
                let hash = self.send_typed(&signer, &form.token_address, &data).await?;
                (hash, SubmissionPath::Typed)
            }
            Err(e) => return Err(classify_transfer_error(&e)),
        };

        tracing::info!(%tx_hash, ?path, token = %form.token_address, to = %form.to_address, "Transfer submitted");
        self.publish(WalletEvent::TransferSubmitted {
            tx_hash: tx_hash.clone(),
            token_address: form.token_address.clone(),
            to_address: form.to_address.clone(),
        })
        .await;
        self.notice(NoticeLevel::Info, SUBMITTED_NOTICE).await;

        let block_number = self.wait_for_receipt(&signer, &tx_hash).await?;

        let receipt = TransferReceipt {
            tx_hash,
            token_address: form.token_address.clone(),
            to_address: form.to_address.clone(),
            amount: form.amount.clone(),
            decimals,
            path,
            block_number,
            notices,
        };

        self.publish(WalletEvent::TransferConfirmed {
            tx_hash: receipt.tx_hash.clone(),
            block_number,
        })
        .await;
        self.notice(NoticeLevel::Success, CONFIRMED_NOTICE).await;

        if let Some(observer) = &self.observer {
            observer.on_transfer_confirmed(&receipt).await;
        }

        Ok(receipt)
    }

    /// 模拟调用、估算 gas，再带显式 gas 发送
    async fn send_typed(
        &self,
        signer: &ProviderSigner,
        token: &str,
        data: &str,
    ) -> WalletResult<String> {
        let call = json!({ "from": signer.address, "to": token, "data": data });

        signer
            .handle
            .request("eth_call", json!([call, "latest"]))
            .await
            .map_err(|e| classify_transfer_error(&e))?;

        let gas = signer
            .handle
            .request("eth_estimateGas", json!([call]))
            .await
            .map_err(|e| classify_transfer_error(&e))?;
        let gas = gas
            .as_str()
            .ok_or_else(|| WalletError::ProviderError("Invalid eth_estimateGas response".into()))?
            .to_string();

        signer
            .send_transaction(json!({
                "to": token,
                "data": data,
                "gas": gas,
                "value": "0x0",
            }))
            .await
            .map_err(|e| classify_transfer_error(&e))
    }

    /// 轮询回执；返回区块号
    async fn wait_for_receipt(
        &self,
        signer: &ProviderSigner,
        tx_hash: &str,
    ) -> WalletResult<Option<u64>> {
        let interval = Duration::from_millis(self.config.receipt_poll_interval_ms.max(1));
        let poll = async {
            loop {
                match signer
                    .handle
                    .request("eth_getTransactionReceipt", json!([tx_hash]))
                    .await
                {
                    Ok(Value::Null) => {}
                    Ok(receipt) => return Self::check_receipt(&receipt),
                    Err(e) => {
                        tracing::debug!(%tx_hash, error = %e, "Receipt poll failed, retrying");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        };

        tokio::time::timeout(Duration::from_secs(self.config.confirmation_timeout_secs), poll)
            .await
            .map_err(|_| WalletError::ProviderError("Transaction confirmation timed out".into()))?
    }

    fn check_receipt(receipt: &Value) -> WalletResult<Option<u64>> {
        if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
            return Err(WalletError::ProviderError("transaction reverted".into()));
        }
        Ok(receipt
            .get("blockNumber")
            .and_then(Value::as_str)
            .and_then(|raw| parse_hex_quantity(raw).ok())
            .map(|n| n.low_u64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transfer_error() {
        assert_eq!(
            classify_transfer_error(&ProviderRpcError::new(4001, "User rejected")),
            WalletError::UserRejected
        );
        assert_eq!(
            classify_transfer_error(&ProviderRpcError::other("ACTION_REJECTED")),
            WalletError::UserRejected
        );
        assert_eq!(
            classify_transfer_error(&ProviderRpcError::new(-32000, "insufficient funds for gas")),
            WalletError::InsufficientFunds
        );
        assert_eq!(
            classify_transfer_error(&ProviderRpcError::other("INSUFFICIENT_FUNDS")),
            WalletError::InsufficientFunds
        );
        assert_eq!(
            classify_transfer_error(
                &ProviderRpcError::other("").with_data(json!({ "message": "nonce too low" }))
            ),
            WalletError::ProviderError("nonce too low".into())
        );
    }

    #[test]
    fn test_cannot_include_data_detection() {
        assert!(is_cannot_include_data(&ProviderRpcError::other(
            "External transactions to internal accounts cannot include data"
        )));
        assert!(is_cannot_include_data(&ProviderRpcError::other("Cannot include data")));
        assert!(!is_cannot_include_data(&ProviderRpcError::other("execution reverted")));
    }

    #[test]
    fn test_check_receipt() {
        assert_eq!(
            TransferDispatcher::check_receipt(&json!({ "status": "0x1", "blockNumber": "0x10" })),
            Ok(Some(16))
        );
        assert_eq!(
            TransferDispatcher::check_receipt(&json!({ "status": "0x0" })),
            Err(WalletError::ProviderError("transaction reverted".into()))
        );
    }
}
