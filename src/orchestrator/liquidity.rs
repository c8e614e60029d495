use super::session::{SessionCell, SessionState};
use super::{advance, drive_transaction, run_session, Halt, OrchestratorContext};
use crate::allowance::AllowanceChecker;
use crate::chain::{ContractCall, WalletContext};
use crate::core::{
    tick_spacing_for_fee, AgentError, AgentResult, ConfirmationState, LiquidityParams,
    PendingTransaction, PoolSnapshot, PositionPlan, TokenDescriptor, TxKind,
    LIQUIDITY_FEE_TIER, LIQUIDITY_SLIPPAGE_BPS, LIQUIDITY_TICK_HALF_WIDTH,
};
use crate::discovery::PoolStateReader;
use crate::math::tick_math::{MAX_TICK, MIN_TICK};
use crate::math::PoolMath;
use crate::quotes::minimum_output_for;
use crate::transaction::{deadline_from_now, TransactionIssuer};
use crate::utils::{format_units, parse_units, validate_amount};
use ethers::types::{Address, H256, U256};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiquidityStep {
    Idle,
    CheckingBalances,
    CheckingApprovals,
    ApprovingToken0,
    ApprovingToken1,
    AddingLiquidity,
    Complete,
    Error,
}

impl fmt::Display for LiquidityStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LiquidityStep::Idle => "idle",
            LiquidityStep::CheckingBalances => "checking-balances",
            LiquidityStep::CheckingApprovals => "checking-approvals",
            LiquidityStep::ApprovingToken0 => "approving-token0",
            LiquidityStep::ApprovingToken1 => "approving-token1",
            LiquidityStep::AddingLiquidity => "adding-liquidity",
            LiquidityStep::Complete => "complete",
            LiquidityStep::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub enum LiquidityEvent {
    Start(LiquidityParams),
    Rejected {
        params: LiquidityParams,
        error: AgentError,
    },
    /// Balances cover the request and the position has been sized.
    Planned(PositionPlan),
    AllowancesRead {
        amount0: U256,
        amount1: U256,
    },
    /// Fresh token1 read taken after token0's approval confirmed.
    Token1AllowanceRead(U256),
    TxSubmitted(PendingTransaction),
    TxConfirmed(H256),
    TxFailed {
        hash: H256,
        error: AgentError,
    },
    Failed(AgentError),
}

impl LiquidityEvent {
    fn name(&self) -> &'static str {
        match self {
            LiquidityEvent::Start(_) => "start",
            LiquidityEvent::Rejected { .. } => "rejected",
            LiquidityEvent::Planned(_) => "planned",
            LiquidityEvent::AllowancesRead { .. } => "allowances-read",
            LiquidityEvent::Token1AllowanceRead(_) => "token1-allowance-read",
            LiquidityEvent::TxSubmitted(_) => "tx-submitted",
            LiquidityEvent::TxConfirmed(_) => "tx-confirmed",
            LiquidityEvent::TxFailed { .. } => "tx-failed",
            LiquidityEvent::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquiditySession {
    pub id: u64,
    pub step: LiquidityStep,
    pub params: Option<LiquidityParams>,
    pub plan: Option<PositionPlan>,
    pub last_error: Option<AgentError>,
    pub transactions: Vec<PendingTransaction>,
}

impl LiquiditySession {
    pub fn approval_tx_hash(&self, token: Address) -> Option<H256> {
        self.transactions
            .iter()
            .find(|tx| tx.kind == TxKind::Approve && tx.token == Some(token))
            .map(|tx| tx.hash)
    }

    pub fn add_liquidity_tx_hash(&self) -> Option<H256> {
        self.transactions
            .iter()
            .find(|tx| tx.kind == TxKind::AddLiquidity)
            .map(|tx| tx.hash)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.step, LiquidityStep::Complete | LiquidityStep::Error)
    }

    fn with_step(&self, step: LiquidityStep) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }

    fn invalid(&self, event: &LiquidityEvent) -> AgentError {
        AgentError::InvalidTransition {
            step: self.step.to_string(),
            event: event.name().to_string(),
        }
    }

    fn last_tx(&self) -> Option<&PendingTransaction> {
        self.transactions.last()
    }

    fn pending_hash(&self) -> Option<H256> {
        self.last_tx()
            .filter(|tx| tx.confirmation_state == ConfirmationState::Pending)
            .map(|tx| tx.hash)
    }

    /// Kind and token the current step is allowed to submit.
    fn expected_tx(&self) -> Option<(TxKind, Option<Address>)> {
        let plan = self.plan.as_ref()?;
        match self.step {
            LiquidityStep::ApprovingToken0 => Some((TxKind::Approve, Some(plan.token0.address))),
            LiquidityStep::ApprovingToken1 => Some((TxKind::Approve, Some(plan.token1.address))),
            LiquidityStep::AddingLiquidity => Some((TxKind::AddLiquidity, None)),
            _ => None,
        }
    }

    /// token0's approval has been submitted and confirmed in this step.
    fn token0_approved(&self) -> bool {
        self.step == LiquidityStep::ApprovingToken0
            && self.last_tx().map_or(false, |tx| {
                tx.kind == TxKind::Approve
                    && tx.confirmation_state == ConfirmationState::Confirmed
            })
    }

    fn after_token0(&self, amount1: U256) -> LiquidityStep {
        match &self.plan {
            Some(plan) if amount1 < plan.amount1 => LiquidityStep::ApprovingToken1,
            _ => LiquidityStep::AddingLiquidity,
        }
    }

    fn mark_last(&mut self, state: ConfirmationState) {
        if let Some(tx) = self.transactions.last_mut() {
            tx.confirmation_state = state;
        }
    }
}

impl SessionState for LiquiditySession {
    type Event = LiquidityEvent;

    fn idle(id: u64) -> Self {
        Self {
            id,
            step: LiquidityStep::Idle,
            params: None,
            plan: None,
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
            LiquidityStep::Idle | LiquidityStep::Complete | LiquidityStep::Error
        )
    }

    fn is_failed(&self) -> bool {
        self.step == LiquidityStep::Error
    }

    fn reduce(&self, event: LiquidityEvent) -> AgentResult<Self> {
        use LiquidityStep::*;

        match (self.step, event) {
            (Idle, LiquidityEvent::Start(params)) => Ok(Self {
                params: Some(params),
                ..self.with_step(CheckingBalances)
            }),
            (Idle, LiquidityEvent::Rejected { params, error }) => Ok(Self {
                params: Some(params),
                last_error: Some(error),
                ..self.with_step(Error)
            }),
            (CheckingBalances, LiquidityEvent::Planned(plan)) => Ok(Self {
                plan: Some(plan),
                ..self.with_step(CheckingApprovals)
            }),
            (CheckingApprovals, LiquidityEvent::AllowancesRead { amount0, amount1 }) => {
                let plan = self.plan.as_ref().ok_or_else(|| {
                    self.invalid(&LiquidityEvent::AllowancesRead { amount0, amount1 })
                })?;
                let next = if amount0 < plan.amount0 {
                    ApprovingToken0
                } else if amount1 < plan.amount1 {
                    ApprovingToken1
                } else {
                    AddingLiquidity
                };
                Ok(self.with_step(next))
            }
            (ApprovingToken0, LiquidityEvent::Token1AllowanceRead(amount1))
                if self.token0_approved() =>
            {
                Ok(self.with_step(self.after_token0(amount1)))
            }
            (_, LiquidityEvent::TxSubmitted(tx))
                if self.pending_hash().is_none()
                    && !self.token0_approved()
                    && self.expected_tx() == Some((tx.kind, tx.token)) =>
            {
                let mut next = self.clone();
                next.transactions.push(tx);
                Ok(next)
            }
            (step, LiquidityEvent::TxConfirmed(hash)) if self.pending_hash() == Some(hash) => {
                let next_step = match step {
                    // stays until token1's allowance is read again
                    ApprovingToken0 => ApprovingToken0,
                    ApprovingToken1 => AddingLiquidity,
                    _ => Complete,
                };
                let mut next = self.with_step(next_step);
                next.mark_last(ConfirmationState::Confirmed);
                Ok(next)
            }
            (step, LiquidityEvent::TxFailed { hash, error })
                if step != Complete && step != Error && self.pending_hash() == Some(hash) =>
            {
                let mut next = self.with_step(Error);
                next.mark_last(ConfirmationState::Failed);
                next.last_error = Some(error);
                Ok(next)
            }
            (step, LiquidityEvent::Failed(error)) if step != Complete && step != Error => {
                Ok(Self {
                    last_error: Some(error),
                    ..self.with_step(Error)
                })
            }
            (_, event) => Err(self.invalid(&event)),
        }
    }

    fn fail(&self, error: AgentError) -> Self {
        Self {
            last_error: Some(error),
            ..self.with_step(LiquidityStep::Error)
        }
    }

    fn tx_submitted(tx: PendingTransaction) -> LiquidityEvent {
        LiquidityEvent::TxSubmitted(tx)
    }

    fn tx_confirmed(hash: H256) -> LiquidityEvent {
        LiquidityEvent::TxConfirmed(hash)
    }

    fn tx_failed(hash: H256, error: AgentError) -> LiquidityEvent {
        LiquidityEvent::TxFailed { hash, error }
    }

    fn failed(error: AgentError) -> LiquidityEvent {
        LiquidityEvent::Failed(error)
    }
}

/// Drives balances → position sizing → approvals → add-liquidity.
pub struct LiquidityOrchestrator {
    ctx: OrchestratorContext,
    pools: PoolStateReader,
    allowances: AllowanceChecker,
    issuer: TransactionIssuer,
    cell: SessionCell<LiquiditySession>,
}

impl LiquidityOrchestrator {
    pub fn new(ctx: OrchestratorContext) -> Self {
        Self {
            pools: PoolStateReader::new(ctx.reader.clone(), ctx.token_cache_ttl_secs),
            allowances: AllowanceChecker::new(ctx.reader.clone()),
            issuer: ctx.issuer(),
            cell: SessionCell::new(),
            ctx,
        }
    }

    pub fn session(&self) -> LiquiditySession {
        self.cell.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiquiditySession> {
        self.cell.subscribe()
    }

    pub fn reset_liquidity(&self) -> LiquiditySession {
        info!("Liquidity session reset");
        self.cell.reset()
    }

    /// Runs an add-liquidity session to completion and returns its final state.
    ///
    /// Only fails when another liquidity session is still in flight.
    pub async fn call_add_liquidity(&self, params: LiquidityParams) -> AgentResult<LiquiditySession> {
        let start = match self.validate(&params) {
            Ok(()) => LiquidityEvent::Start(params.clone()),
            Err(error) => LiquidityEvent::Rejected {
                params: params.clone(),
                error,
            },
        };
        let session = self.cell.begin(start)?;
        if session.is_terminal() {
            return Ok(session);
        }

        info!(
            "Liquidity session {}: {} of {:?} + {} of {:?}",
            session.id, params.amount_a, params.token_a, params.amount_b, params.token_b
        );
        if let Some(Halt::Reverted) =
            run_session(&self.cell, session.id, self.drive(session.id, params)).await
        {
            if self.ctx.disconnect_on_revert {
                warn!("Add-liquidity flow reverted on-chain, disconnecting wallet");
                self.ctx.wallet.disconnect();
            }
        }
        Ok(self.cell.settle(session.id))
    }

    fn validate(&self, params: &LiquidityParams) -> AgentResult<()> {
        if params.token_a.is_zero() || params.token_b.is_zero() {
            return Err(AgentError::InvalidInput(
                "Both token addresses are required".to_string(),
            ));
        }
        if params.token_a == params.token_b {
            return Err(AgentError::InvalidInput(
                "Tokens must differ".to_string(),
            ));
        }
        validate_amount(&params.amount_a)?;
        validate_amount(&params.amount_b)?;
        self.ctx.connection()?;
        self.ctx.validate_agent()?;

        let fee = params.fee_tier.unwrap_or(LIQUIDITY_FEE_TIER);
        if tick_spacing_for_fee(fee).is_none() {
            return Err(AgentError::InvalidInput(format!(
                "Unsupported fee tier {}",
                fee
            )));
        }
        Ok(())
    }

    async fn drive(&self, id: u64, params: LiquidityParams) -> Result<(), Halt> {
        let conn = self.ctx.connection()?;
        let agent = self.ctx.agent;
        let fee = params.fee_tier.unwrap_or(LIQUIDITY_FEE_TIER);

        // checking-balances
        self.ctx.ensure_connection(&conn)?;
        let (desc_a, desc_b) = futures::try_join!(
            self.pools.token_descriptor(params.token_a),
            self.pools.token_descriptor(params.token_b)
        )?;
        let desc_a = desc_a
            .ok_or_else(|| AgentError::TokenMetadataPending(format!("{:?}", params.token_a)))?;
        let desc_b = desc_b
            .ok_or_else(|| AgentError::TokenMetadataPending(format!("{:?}", params.token_b)))?;
        let amount_a = parse_units(&params.amount_a, desc_a.decimals)?;
        let amount_b = parse_units(&params.amount_b, desc_b.decimals)?;

        let (balance_a, balance_b) = futures::try_join!(
            self.ctx.reader.balance_of(params.token_a, conn.address),
            self.ctx.reader.balance_of(params.token_b, conn.address)
        )?;
        check_balances(
            (&desc_a, amount_a, balance_a),
            (&desc_b, amount_b, balance_b),
        )?;

        let pool = self
            .pools
            .get_pool_snapshot(params.token_a, params.token_b, fee)
            .await?
            .into_result()?;
        let plan = self.plan_position(&pool, params.token_a, amount_a, amount_b)?;
        info!(
            "Position [{}, {}]: {} {} + {} {} (min {} / {})",
            plan.tick_lower,
            plan.tick_upper,
            format_units(plan.amount0, plan.token0.decimals),
            plan.token0.symbol,
            format_units(plan.amount1, plan.token1.decimals),
            plan.token1.symbol,
            plan.amount0_min,
            plan.amount1_min
        );
        advance(&self.cell, id, LiquidityEvent::Planned(plan.clone()))?;

        // checking-approvals
        self.ctx.ensure_connection(&conn)?;
        let (allowance0, allowance1) = self
            .allowances
            .check_pair(plan.token0.address, plan.token1.address, conn.address, agent)
            .await?;
        let mut session = advance(
            &self.cell,
            id,
            LiquidityEvent::AllowancesRead {
                amount0: allowance0.amount,
                amount1: allowance1.amount,
            },
        )?;

        if session.step == LiquidityStep::ApprovingToken0 {
            self.ctx.ensure_connection(&conn)?;
            let call = ContractCall::Approve {
                token: plan.token0.address,
                spender: agent,
                amount: plan.amount0,
            };
            drive_transaction(&self.cell, &self.issuer, id, call).await?;

            self.ctx.ensure_connection(&conn)?;
            let fresh = self
                .allowances
                .check_allowance(plan.token1.address, conn.address, agent)
                .await?;
            session = advance(&self.cell, id, LiquidityEvent::Token1AllowanceRead(fresh.amount))?;
        }

        if session.step == LiquidityStep::ApprovingToken1 {
            self.ctx.ensure_connection(&conn)?;
            let call = ContractCall::Approve {
                token: plan.token1.address,
                spender: agent,
                amount: plan.amount1,
            };
            drive_transaction(&self.cell, &self.issuer, id, call).await?;
        }

        // adding-liquidity
        self.ctx.ensure_connection(&conn)?;
        let call = ContractCall::AddLiquidity {
            agent,
            token0: plan.token0.address,
            token1: plan.token1.address,
            fee: plan.fee_tier,
            tick_lower: plan.tick_lower,
            tick_upper: plan.tick_upper,
            amount0_desired: plan.amount0,
            amount1_desired: plan.amount1,
            amount0_min: plan.amount0_min,
            amount1_min: plan.amount1_min,
            recipient: conn.address,
            deadline: deadline_from_now(),
        };
        drive_transaction(&self.cell, &self.issuer, id, call).await?;

        info!("Liquidity session {} complete", id);
        Ok(())
    }

    /// Sizes the position around the current tick, in token0/token1 order.
    fn plan_position(
        &self,
        pool: &PoolSnapshot,
        token_a: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> AgentResult<PositionPlan> {
        let (amount0_desired, amount1_desired) = if token_a == pool.token0.address {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };

        let (tick_lower, tick_upper) =
            position_ticks(self.ctx.math.as_ref(), pool.tick, pool.tick_spacing())?;

        let (amount0, amount1) = self.ctx.math.position_amounts(
            pool,
            tick_lower,
            tick_upper,
            amount0_desired,
            amount1_desired,
        )?;
        if amount0.is_zero() && amount1.is_zero() {
            return Err(AgentError::InvalidInput(
                "Amounts are too small to open a position at the current price".to_string(),
            ));
        }

        Ok(PositionPlan {
            pool: pool.address,
            token0: pool.token0.clone(),
            token1: pool.token1.clone(),
            fee_tier: pool.fee_tier,
            tick_lower,
            tick_upper,
            amount0_desired,
            amount1_desired,
            amount0,
            amount1,
            amount0_min: minimum_output_for(amount0, LIQUIDITY_SLIPPAGE_BPS)?,
            amount1_min: minimum_output_for(amount1, LIQUIDITY_SLIPPAGE_BPS)?,
        })
    }
}

/// Usable ticks `LIQUIDITY_TICK_HALF_WIDTH` either side of `tick`.
///
/// Near the tick bounds both sides can snap to the same usable tick; the range
/// is then widened by one spacing on whichever side stays in bounds.
fn position_ticks(math: &dyn PoolMath, tick: i32, spacing: i32) -> AgentResult<(i32, i32)> {
    let lower =
        math.nearest_usable_tick((tick - LIQUIDITY_TICK_HALF_WIDTH).max(MIN_TICK), spacing)?;
    let upper =
        math.nearest_usable_tick((tick + LIQUIDITY_TICK_HALF_WIDTH).min(MAX_TICK), spacing)?;
    if lower < upper {
        Ok((lower, upper))
    } else if upper + spacing <= MAX_TICK {
        Ok((lower, upper + spacing))
    } else {
        Ok((lower - spacing, upper))
    }
}

/// Fails with both required and available amounts when either balance is short.
fn check_balances(
    a: (&TokenDescriptor, U256, U256),
    b: (&TokenDescriptor, U256, U256),
) -> AgentResult<()> {
    let (first, second) = if a.0.address <= b.0.address { (a, b) } else { (b, a) };
    let (token0, required0, available0) = first;
    let (token1, required1, available1) = second;

    if available0 >= required0 && available1 >= required1 {
        return Ok(());
    }
    Err(AgentError::InsufficientBalance {
        symbol0: token0.symbol.clone(),
        required0: format_units(required0, token0.decimals),
        available0: format_units(available0, token0.decimals),
        symbol1: token1.symbol.clone(),
        required1: format_units(required1, token1.decimals),
        available1: format_units(available1, token1.decimals),
    })
}
