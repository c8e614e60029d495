pub mod monitor;

use crate::chain::{ContractCall, ReceiptSource, TransactionSender};
use crate::core::{
    AgentError, AgentResult, ConfirmationState, PendingTransaction, REVERT_PHRASE,
    TX_DEADLINE_SECS, USER_REJECTION_PHRASES,
};
use chrono::{DateTime, Duration, Utc};
use ethers::types::U256;
use log::{info, warn};
use std::sync::Arc;

pub use monitor::{ConfirmationMonitor, MonitorConfig};

/// Unix deadline `TX_DEADLINE_SECS` after `now`.
pub fn deadline_from(now: DateTime<Utc>) -> U256 {
    let deadline = now + Duration::seconds(TX_DEADLINE_SECS);
    U256::from(deadline.timestamp().max(0) as u64)
}

/// Deadline for a call being built right now. Call it at submission time.
pub fn deadline_from_now() -> U256 {
    deadline_from(Utc::now())
}

/// Sorts a wallet or node error message into rejection, revert, or generic failure.
pub fn classify_submission_error(message: &str) -> AgentError {
    let lower = message.to_lowercase();
    if USER_REJECTION_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
    {
        AgentError::UserRejected(message.to_string())
    } else if lower.contains(REVERT_PHRASE) {
        AgentError::ExecutionReverted {
            hash: None,
            message: message.to_string(),
        }
    } else {
        AgentError::TransactionFailed(message.to_string())
    }
}

/// Submits contract calls through the signing wallet and waits for their receipts.
pub struct TransactionIssuer {
    sender: Arc<dyn TransactionSender>,
    monitor: ConfirmationMonitor,
}

impl TransactionIssuer {
    pub fn new(
        sender: Arc<dyn TransactionSender>,
        receipts: Arc<dyn ReceiptSource>,
        monitor_config: Option<MonitorConfig>,
    ) -> Self {
        Self {
            sender,
            monitor: ConfirmationMonitor::new(receipts, monitor_config),
        }
    }

    /// Asks the wallet to sign and broadcast `call`.
    pub async fn submit(&self, call: &ContractCall) -> AgentResult<PendingTransaction> {
        info!(
            "Submitting {} on {:?}",
            call.function_name(),
            call.target()
        );

        let hash = self.sender.submit(call).await.map_err(|e| match e {
            AgentError::TransactionFailed(message) | AgentError::Rpc(message) => {
                classify_submission_error(&message)
            }
            other => other,
        });
        let hash = match hash {
            Ok(hash) => hash,
            Err(e) => {
                warn!("{} was not submitted: {}", call.function_name(), e);
                return Err(e);
            }
        };

        info!("Transaction sent: {:?}", hash);
        let token = match call {
            ContractCall::Approve { token, .. } => Some(*token),
            _ => None,
        };
        Ok(PendingTransaction::new(hash, call.kind(), token))
    }

    pub async fn await_confirmation(&self, pending: &PendingTransaction) -> ConfirmationState {
        self.monitor.wait_for(pending.hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryChain;
    use crate::core::TxKind;
    use chrono::TimeZone;
    use ethers::types::Address;
    use test_case::test_case;

    #[test_case("User rejected the request." => "UserRejected")]
    #[test_case("MetaMask Tx Signature: User denied transaction signature." => "UserRejected")]
    #[test_case("ACTION_REJECTED" => "UserRejected")]
    #[test_case("execution reverted: STF" => "ExecutionReverted")]
    #[test_case("nonce too low" => "TransactionFailed")]
    fn test_classify_submission_error(message: &str) -> &'static str {
        match classify_submission_error(message) {
            AgentError::UserRejected(_) => "UserRejected",
            AgentError::ExecutionReverted { .. } => "ExecutionReverted",
            AgentError::TransactionFailed(_) => "TransactionFailed",
            _ => "other",
        }
    }

    #[test]
    fn test_deadline_is_ten_minutes_out() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(deadline_from(now), U256::from(1_700_000_600u64));
    }

    #[tokio::test]
    async fn test_submit_records_kind_and_token() {
        let chain = Arc::new(InMemoryChain::new(1, Address::repeat_byte(0xee)));
        let issuer = TransactionIssuer::new(
            chain.clone(),
            chain.clone(),
            Some(MonitorConfig {
                check_interval_ms: 1,
            }),
        );
        let call = ContractCall::Approve {
            token: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            amount: U256::from(3),
        };

        let pending = issuer.submit(&call).await.unwrap();
        assert_eq!(pending.kind, TxKind::Approve);
        assert_eq!(pending.token, Some(Address::repeat_byte(1)));
        assert_eq!(pending.confirmation_state, ConfirmationState::Pending);
        assert_eq!(
            issuer.await_confirmation(&pending).await,
            ConfirmationState::Confirmed
        );
    }

    #[tokio::test]
    async fn test_submit_classifies_wallet_rejection() {
        let chain = Arc::new(InMemoryChain::new(1, Address::repeat_byte(0xee)));
        chain.reject_next(TxKind::Approve, "User rejected the request.");
        let issuer = TransactionIssuer::new(chain.clone(), chain.clone(), None);
        let call = ContractCall::Approve {
            token: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            amount: U256::from(3),
        };

        let err = issuer.submit(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::UserRejected(_)));
        assert!(chain.submissions().is_empty());
    }
}
