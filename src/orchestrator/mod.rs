//! Swap and add-liquidity orchestration.
//!
//! Each orchestrator owns one `SessionCell`. A call to `call_swap` or
//! `call_add_liquidity` starts a session, then drives it step by step: every
//! asynchronous result is turned into an event and fed through the session's
//! reducer, so the published session is always a valid state of its machine.

pub mod liquidity;
pub mod session;
pub mod swap;

use crate::chain::{
    ChainReader, Connection, ContractCall, ReceiptSource, TransactionSender, WalletContext,
};
use crate::core::{AgentError, AgentResult, Config, ConfirmationState, TOKEN_CACHE_TTL};
use crate::math::{PoolMath, UniswapV3Math};
use crate::transaction::{MonitorConfig, TransactionIssuer};
use ethers::types::Address;
use log::warn;
use std::sync::Arc;

pub use liquidity::{LiquidityEvent, LiquidityOrchestrator, LiquiditySession, LiquidityStep};
pub use session::{SessionCell, SessionState};
pub use swap::{SwapEvent, SwapOrchestrator, SwapSession, SwapStep};

/// Collaborators injected into both orchestrators.
#[derive(Clone)]
pub struct OrchestratorContext {
    pub reader: Arc<dyn ChainReader>,
    pub sender: Arc<dyn TransactionSender>,
    pub receipts: Arc<dyn ReceiptSource>,
    pub wallet: Arc<dyn WalletContext>,
    pub math: Arc<dyn PoolMath>,
    pub agent: Address,
    pub monitor: MonitorConfig,
    pub disconnect_on_revert: bool,
    pub token_cache_ttl_secs: u64,
}

impl OrchestratorContext {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        sender: Arc<dyn TransactionSender>,
        receipts: Arc<dyn ReceiptSource>,
        wallet: Arc<dyn WalletContext>,
        agent: Address,
    ) -> Self {
        Self {
            reader,
            sender,
            receipts,
            wallet,
            math: Arc::new(UniswapV3Math::new()),
            agent,
            monitor: MonitorConfig::default(),
            disconnect_on_revert: true,
            token_cache_ttl_secs: TOKEN_CACHE_TTL,
        }
    }

    /// Context where one chain backend serves reads, writes and receipts.
    pub fn from_chain<C>(chain: Arc<C>, wallet: Arc<dyn WalletContext>, agent: Address) -> Self
    where
        C: ChainReader + TransactionSender + ReceiptSource + 'static,
    {
        Self::new(chain.clone(), chain.clone(), chain, wallet, agent)
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.monitor = MonitorConfig {
            check_interval_ms: config.receipt_poll_interval_ms,
        };
        self.disconnect_on_revert = config.disconnect_on_revert;
        self.token_cache_ttl_secs = config.token_cache_ttl_secs;
        self
    }

    pub fn with_math(mut self, math: Arc<dyn PoolMath>) -> Self {
        self.math = math;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn issuer(&self) -> TransactionIssuer {
        TransactionIssuer::new(
            self.sender.clone(),
            self.receipts.clone(),
            Some(self.monitor.clone()),
        )
    }

    /// The wallet's current identity, as captured when a session starts.
    pub fn connection(&self) -> AgentResult<Connection> {
        match (self.wallet.address(), self.wallet.chain_id()) {
            (Some(address), Some(chain_id)) => Ok(Connection { address, chain_id }),
            _ => Err(AgentError::WalletNotConnected),
        }
    }

    /// Fails with `ConnectionLost` if the wallet no longer matches `expected`.
    pub fn ensure_connection(&self, expected: &Connection) -> AgentResult<()> {
        match (self.wallet.address(), self.wallet.chain_id()) {
            (None, _) | (_, None) => Err(AgentError::ConnectionLost(
                "wallet disconnected".to_string(),
            )),
            (Some(address), _) if address != expected.address => Err(AgentError::ConnectionLost(
                format!("account changed to {:?}", address),
            )),
            (_, Some(chain_id)) if chain_id != expected.chain_id => {
                Err(AgentError::ConnectionLost(format!(
                    "chain changed from {} to {}",
                    expected.chain_id, chain_id
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn validate_agent(&self) -> AgentResult<()> {
        if self.agent.is_zero() {
            return Err(AgentError::ConfigError(
                "Agent contract address is not set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a flow stopped driving its session.
#[derive(Debug)]
pub(crate) enum Halt {
    /// Session was reset, replaced, or already moved to its error step.
    Stopped,
    /// A submitted transaction reverted; the session already holds the error.
    Reverted,
    Failed(AgentError),
}

impl From<AgentError> for Halt {
    fn from(err: AgentError) -> Self {
        Halt::Failed(err)
    }
}

/// Applies `event` and hands back the new session, or stops the flow if the
/// session is gone or has failed.
pub(crate) fn advance<S: SessionState>(
    cell: &SessionCell<S>,
    id: u64,
    event: S::Event,
) -> Result<S, Halt> {
    match cell.apply(id, event) {
        Some(session) if session.is_failed() => Err(Halt::Stopped),
        Some(session) => Ok(session),
        None => Err(Halt::Stopped),
    }
}

/// Submits `call`, records it, and waits for its receipt.
pub(crate) async fn drive_transaction<S: SessionState>(
    cell: &SessionCell<S>,
    issuer: &TransactionIssuer,
    id: u64,
    call: ContractCall,
) -> Result<S, Halt> {
    let pending = issuer.submit(&call).await?;
    let hash = pending.hash;
    advance(cell, id, S::tx_submitted(pending.clone()))?;

    match issuer.await_confirmation(&pending).await {
        ConfirmationState::Confirmed => advance(cell, id, S::tx_confirmed(hash)),
        ConfirmationState::Failed => {
            let error = AgentError::ExecutionReverted {
                hash: Some(hash),
                message: format!(
                    "execution reverted: {} transaction {:?} failed on-chain",
                    call.function_name(),
                    hash
                ),
            };
            match cell.apply(id, S::tx_failed(hash, error)) {
                Some(_) => Err(Halt::Reverted),
                None => Err(Halt::Stopped),
            }
        }
        ConfirmationState::Pending => {
            warn!("Confirmation for {:?} ended while still pending", hash);
            Err(Halt::Stopped)
        }
    }
}

/// Runs `flow` for session `id` until it finishes or the session is replaced,
/// then records any failure the flow returned.
pub(crate) async fn run_session<S, F>(cell: &SessionCell<S>, id: u64, flow: F) -> Option<Halt>
where
    S: SessionState,
    F: std::future::Future<Output = Result<(), Halt>>,
{
    let outcome = tokio::select! {
        _ = cell.superseded(id) => return None,
        outcome = flow => outcome,
    };

    match outcome {
        Ok(()) => None,
        Err(Halt::Failed(error)) => {
            warn!("Session {} failed: {}", id, error);
            cell.apply(id, S::failed(error));
            None
        }
        Err(halt) => Some(halt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{InMemoryChain, WalletSession};

    fn context(wallet: Arc<WalletSession>) -> OrchestratorContext {
        let chain = Arc::new(InMemoryChain::new(1, Address::repeat_byte(0xee)));
        OrchestratorContext::from_chain(chain, wallet, Address::repeat_byte(0xa6))
    }

    #[test]
    fn test_connection_requires_wallet() {
        let ctx = context(Arc::new(WalletSession::disconnected()));
        assert_eq!(ctx.connection().unwrap_err(), AgentError::WalletNotConnected);
    }

    #[test]
    fn test_ensure_connection_detects_changes() {
        let wallet = Arc::new(WalletSession::connected(Address::repeat_byte(0xee), 1));
        let ctx = context(wallet.clone());
        let conn = ctx.connection().unwrap();
        assert!(ctx.ensure_connection(&conn).is_ok());

        wallet.switch_chain(10);
        assert!(matches!(
            ctx.ensure_connection(&conn),
            Err(AgentError::ConnectionLost(_))
        ));

        wallet.disconnect();
        assert!(matches!(
            ctx.ensure_connection(&conn),
            Err(AgentError::ConnectionLost(_))
        ));
    }

    #[test]
    fn test_config_overrides() {
        let ctx = context(Arc::new(WalletSession::disconnected())).with_config(&Config {
            receipt_poll_interval_ms: 5,
            disconnect_on_revert: false,
            ..Config::default()
        });
        assert_eq!(ctx.monitor.check_interval_ms, 5);
        assert!(!ctx.disconnect_on_revert);
    }
}
