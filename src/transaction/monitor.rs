use crate::chain::ReceiptSource;
use crate::core::{ConfirmationState, DEFAULT_RECEIPT_POLL_MS};
use ethers::types::H256;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Receipt polling configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between receipt checks (milliseconds)
    pub check_interval_ms: u64,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: DEFAULT_RECEIPT_POLL_MS,
        }
    }
}

/// Waits for a submitted transaction to be mined.
///
/// There is no timeout: a transaction that is never mined keeps the caller
/// waiting until the caller drops the future.
pub struct ConfirmationMonitor {
    receipts: Arc<dyn ReceiptSource>,
    config: MonitorConfig,
}

impl ConfirmationMonitor {
    pub fn new(receipts: Arc<dyn ReceiptSource>, config: Option<MonitorConfig>) -> Self {
        Self {
            receipts,
            config: config.unwrap_or_default(),
        }
    }

    /// Resolves to `Confirmed` or `Failed`, never `Pending`.
    pub async fn wait_for(&self, hash: H256) -> ConfirmationState {
        let check_interval = self.config.poll_interval();

        loop {
            match self.receipts.receipt_status(hash).await {
                Ok(Some(true)) => {
                    info!("Transaction confirmed: {:?}", hash);
                    return ConfirmationState::Confirmed;
                }
                Ok(Some(false)) => {
                    warn!("Transaction reverted: {:?}", hash);
                    return ConfirmationState::Failed;
                }
                Ok(None) => {
                    debug!("Transaction {:?} not yet mined, checking again...", hash);
                }
                Err(e) => {
                    warn!("Error checking transaction status: {}", e);
                }
            }

            sleep(check_interval).await;
        }
    }
}
