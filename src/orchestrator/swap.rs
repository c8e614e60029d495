use super::session::{SessionCell, SessionState};
use super::{advance, drive_transaction, run_session, Halt, OrchestratorContext};
use crate::allowance::AllowanceChecker;
use crate::chain::ContractCall;
use crate::core::{
    tick_spacing_for_fee, AgentError, AgentResult, ConfirmationState, PendingTransaction,
    QuoteResult, SwapParams, TxKind, MAX_SLIPPAGE_BPS, SWAP_FEE_TIER, SWAP_SLIPPAGE_BPS,
};
use crate::discovery::PoolStateReader;
use crate::quotes::QuoteCalculator;
use crate::transaction::{deadline_from_now, TransactionIssuer};
use crate::utils::{parse_units, validate_amount};
use ethers::types::{H256, U256};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapStep {
    Idle,
    Quoting,
    CheckingApproval,
    Approving,
    Swapping,
    Complete,
    Error,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStep::Idle => "idle",
            SwapStep::Quoting => "quoting",
            SwapStep::CheckingApproval => "checking-approval",
            SwapStep::Approving => "approving",
            SwapStep::Swapping => "swapping",
            SwapStep::Complete => "complete",
            SwapStep::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub enum SwapEvent {
    Start(SwapParams),
    /// Input failed validation before any chain call.
    Rejected {
        params: SwapParams,
        error: AgentError,
    },
    Quoted(QuoteResult),
    AllowanceRead(U256),
    TxSubmitted(PendingTransaction),
    TxConfirmed(H256),
    TxFailed {
        hash: H256,
        error: AgentError,
    },
    Failed(AgentError),
}

impl SwapEvent {
    fn name(&self) -> &'static str {
        match self {
            SwapEvent::Start(_) => "start",
            SwapEvent::Rejected { .. } => "rejected",
            SwapEvent::Quoted(_) => "quoted",
            SwapEvent::AllowanceRead(_) => "allowance-read",
            SwapEvent::TxSubmitted(_) => "tx-submitted",
            SwapEvent::TxConfirmed(_) => "tx-confirmed",
            SwapEvent::TxFailed { .. } => "tx-failed",
            SwapEvent::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSession {
    pub id: u64,
    pub step: SwapStep,
    pub params: Option<SwapParams>,
    pub quote: Option<QuoteResult>,
    /// Allowance observed at the approval decision.
    pub allowance: Option<U256>,
    pub last_error: Option<AgentError>,
    pub transactions: Vec<PendingTransaction>,
}

impl SwapSession {
    pub fn approve_tx_hash(&self) -> Option<H256> {
        self.tx_hash(TxKind::Approve)
    }

    pub fn swap_tx_hash(&self) -> Option<H256> {
        self.tx_hash(TxKind::Swap)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.step, SwapStep::Complete | SwapStep::Error)
    }

    fn tx_hash(&self, kind: TxKind) -> Option<H256> {
        self.transactions
            .iter()
            .rev()
            .find(|tx| tx.kind == kind)
            .map(|tx| tx.hash)
    }

    fn with_step(&self, step: SwapStep) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }

    fn invalid(&self, event: &SwapEvent) -> AgentError {
        AgentError::InvalidTransition {
            step: self.step.to_string(),
            event: event.name().to_string(),
        }
    }

    fn pending_hash(&self) -> Option<H256> {
        self.transactions
            .last()
            .filter(|tx| tx.confirmation_state == ConfirmationState::Pending)
            .map(|tx| tx.hash)
    }

    fn mark_last(&mut self, state: ConfirmationState) {
        if let Some(tx) = self.transactions.last_mut() {
            tx.confirmation_state = state;
        }
    }
}

impl SessionState for SwapSession {
    type Event = SwapEvent;

    fn idle(id: u64) -> Self {
        Self {
            id,
            step: SwapStep::Idle,
            params: None,
            quote: None,
            allowance: None,
            last_error: None,
            transactions: Vec::new(),
        }
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn is_in_flight(&self) -> bool {
        !matches!(
            self.step,
            SwapStep::Idle | SwapStep::Complete | SwapStep::Error
        )
    }

    fn is_failed(&self) -> bool {
        self.step == SwapStep::Error
    }

    fn reduce(&self, event: SwapEvent) -> AgentResult<Self> {
        use SwapStep::*;

        match (self.step, event) {
            (Idle, SwapEvent::Start(params)) => Ok(Self {
                params: Some(params),
                ..self.with_step(Quoting)
            }),
            (Idle, SwapEvent::Rejected { params, error }) => Ok(Self {
                params: Some(params),
                last_error: Some(error),
                ..self.with_step(Error)
            }),
            (Quoting, SwapEvent::Quoted(quote)) => Ok(Self {
                quote: Some(quote),
                ..self.with_step(CheckingApproval)
            }),
            (CheckingApproval, SwapEvent::AllowanceRead(amount)) => {
                let required = self
                    .quote
                    .as_ref()
                    .map(|q| q.input_amount)
                    .unwrap_or_default();
                let next = if amount < required { Approving } else { Swapping };
                Ok(Self {
                    allowance: Some(amount),
                    ..self.with_step(next)
                })
            }
            (Approving, SwapEvent::TxSubmitted(tx))
                if tx.kind == TxKind::Approve && self.pending_hash().is_none() =>
            {
                let mut next = self.clone();
                next.transactions.push(tx);
                Ok(next)
            }
            (Swapping, SwapEvent::TxSubmitted(tx))
                if tx.kind == TxKind::Swap && self.pending_hash().is_none() =>
            {
                let mut next = self.clone();
                next.transactions.push(tx);
                Ok(next)
            }
            (step @ (Approving | Swapping), SwapEvent::TxConfirmed(hash))
                if self.pending_hash() == Some(hash) =>
            {
                let mut next = self.with_step(if step == Approving { Swapping } else { Complete });
                next.mark_last(ConfirmationState::Confirmed);
                Ok(next)
            }
            (step, SwapEvent::TxFailed { hash, error })
                if step != Complete && step != Error && self.pending_hash() == Some(hash) =>
            {
                let mut next = self.with_step(Error);
                next.mark_last(ConfirmationState::Failed);
                next.last_error = Some(error);
                Ok(next)
            }
            (step, SwapEvent::Failed(error)) if step != Complete && step != Error => Ok(Self {
                last_error: Some(error),
                ..self.with_step(Error)
            }),
            (_, event) => Err(self.invalid(&event)),
        }
    }

    fn fail(&self, error: AgentError) -> Self {
        Self {
            last_error: Some(error),
            ..self.with_step(SwapStep::Error)
        }
    }

    fn tx_submitted(tx: PendingTransaction) -> SwapEvent {
        SwapEvent::TxSubmitted(tx)
    }

    fn tx_confirmed(hash: H256) -> SwapEvent {
        SwapEvent::TxConfirmed(hash)
    }

    fn tx_failed(hash: H256, error: AgentError) -> SwapEvent {
        SwapEvent::TxFailed { hash, error }
    }

    fn failed(error: AgentError) -> SwapEvent {
        SwapEvent::Failed(error)
    }
}

/// Drives quote → allowance check → (approve) → swap through the agent contract.
pub struct SwapOrchestrator {
    ctx: OrchestratorContext,
    pools: PoolStateReader,
    quotes: QuoteCalculator,
    allowances: AllowanceChecker,
    issuer: TransactionIssuer,
    cell: SessionCell<SwapSession>,
}

impl SwapOrchestrator {
    pub fn new(ctx: OrchestratorContext) -> Self {
        Self {
            pools: PoolStateReader::new(ctx.reader.clone(), ctx.token_cache_ttl_secs),
            quotes: QuoteCalculator::new(ctx.math.clone()),
            allowances: AllowanceChecker::new(ctx.reader.clone()),
            issuer: ctx.issuer(),
            cell: SessionCell::new(),
            ctx,
        }
    }

    pub fn session(&self) -> SwapSession {
        self.cell.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SwapSession> {
        self.cell.subscribe()
    }

    /// Abandons the current session. A transaction already broadcast is not
    /// cancelled; its outcome is simply ignored.
    pub fn reset_swap(&self) -> SwapSession {
        info!("Swap session reset");
        self.cell.reset()
    }

    /// Runs a swap session to completion and returns its final state.
    ///
    /// Only fails when another swap session is still in flight; every other
    /// failure is reported through the session's error step.
    pub async fn call_swap(&self, params: SwapParams) -> AgentResult<SwapSession> {
        let start = match self.validate(&params) {
            Ok(()) => SwapEvent::Start(params.clone()),
            Err(error) => SwapEvent::Rejected {
                params: params.clone(),
                error,
            },
        };
        let session = self.cell.begin(start)?;
        if session.is_terminal() {
            return Ok(session);
        }

        info!(
            "Swap session {}: {} of {:?} -> {:?}",
            session.id, params.amount_in, params.token_in, params.token_out
        );
        run_session(&self.cell, session.id, self.drive(session.id, params)).await;
        Ok(self.cell.settle(session.id))
    }

    fn validate(&self, params: &SwapParams) -> AgentResult<()> {
        self.ctx.connection()?;
        self.ctx.validate_agent()?;
        if params.token_in.is_zero() || params.token_out.is_zero() {
            return Err(AgentError::InvalidInput(
                "Both token addresses are required".to_string(),
            ));
        }
        if params.token_in == params.token_out {
            return Err(AgentError::InvalidInput(
                "Cannot swap a token for itself".to_string(),
            ));
        }
        validate_amount(&params.amount_in)?;

        let fee = params.fee_tier.unwrap_or(SWAP_FEE_TIER);
        if tick_spacing_for_fee(fee).is_none() {
            return Err(AgentError::InvalidInput(format!(
                "Unsupported fee tier {}",
                fee
            )));
        }
        if params.slippage_bps.unwrap_or(SWAP_SLIPPAGE_BPS) > MAX_SLIPPAGE_BPS {
            return Err(AgentError::InvalidInput(
                "Slippage cannot exceed 100%".to_string(),
            ));
        }
        Ok(())
    }

    async fn drive(&self, id: u64, params: SwapParams) -> Result<(), Halt> {
        let conn = self.ctx.connection()?;
        let agent = self.ctx.agent;
        let fee = params.fee_tier.unwrap_or(SWAP_FEE_TIER);
        let slippage = params.slippage_bps.unwrap_or(SWAP_SLIPPAGE_BPS);

        // quoting
        self.ctx.ensure_connection(&conn)?;
        let pool = self
            .pools
            .get_pool_snapshot(params.token_in, params.token_out, fee)
            .await?
            .into_result()?;
        let decimals = pool
            .token(params.token_in)
            .map(|t| t.decimals)
            .ok_or_else(|| AgentError::Quote("input token is not in the pool".to_string()))?;
        let amount_in = parse_units(&params.amount_in, decimals)?;
        let quote = self
            .quotes
            .compute_quote(Some(&pool), params.token_in, amount_in, slippage)
            .ok_or_else(|| {
                AgentError::Quote(format!(
                    "no quote for {} of {:?} in pool {:?}",
                    params.amount_in, params.token_in, pool.address
                ))
            })?;
        info!(
            "Quoted {} -> {} (min {})",
            quote.input_amount, quote.estimated_output, quote.minimum_output
        );
        advance(&self.cell, id, SwapEvent::Quoted(quote.clone()))?;

        // checking-approval
        self.ctx.ensure_connection(&conn)?;
        let allowance = self
            .allowances
            .check_allowance(params.token_in, conn.address, agent)
            .await?;
        let session = advance(&self.cell, id, SwapEvent::AllowanceRead(allowance.amount))?;

        if session.step == SwapStep::Approving {
            self.ctx.ensure_connection(&conn)?;
            let call = ContractCall::Approve {
                token: params.token_in,
                spender: agent,
                amount: quote.input_amount,
            };
            drive_transaction(&self.cell, &self.issuer, id, call).await?;
        } else {
            info!(
                "Allowance {} covers {}, skipping approval",
                allowance.amount, quote.input_amount
            );
        }

        // swapping
        self.ctx.ensure_connection(&conn)?;
        let call = ContractCall::ExactInputSwap {
            agent,
            token_in: params.token_in,
            token_out: params.token_out,
            fee,
            amount_in: quote.input_amount,
            amount_out_minimum: quote.minimum_output,
            deadline: deadline_from_now(),
        };
        drive_transaction(&self.cell, &self.issuer, id, call).await?;

        info!("Swap session {} complete", id);
        Ok(())
    }
}
