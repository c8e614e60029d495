use crate::core::{
    AgentError, ConfirmationState, ErrorKind, PendingTransaction, PoolSnapshot, QuoteResult,
    TokenDescriptor,
};
use crate::math::u256_to_big;
use crate::orchestrator::{LiquiditySession, LiquidityStep, SwapSession, SwapStep};
use crate::utils::{fee_tier_percent, format_number, format_units};
use colored::*;
use console::style;
use ethers::types::U256;
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::ToPrimitive;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Terminal rendering for pools, quotes and sessions
pub struct PoolDisplay;

impl PoolDisplay {
    pub fn display_pool(pool: &PoolSnapshot) {
        println!("\n{}", style("🏊 Pool").bold().underlined());
        println!(
            "{} {}/{} {}",
            style("►").cyan(),
            pool.token0.symbol.bold(),
            pool.token1.symbol.bold(),
            fee_tier_percent(pool.fee_tier).yellow()
        );
        println!("  Address: {}", style(format!("{:?}", pool.address)).dim());
        println!("  Current Tick: {}", pool.tick);
        println!("  Tick Spacing: {}", pool.tick_spacing());
        println!("  Liquidity: {}", format_number(pool.liquidity));
        if let Some(price) = spot_price(pool) {
            println!(
                "  Price: 1 {} = {:.6} {}",
                pool.token0.symbol, price, pool.token1.symbol
            );
        }
        println!();
    }

    pub fn display_quote(quote: &QuoteResult, pool: &PoolSnapshot) {
        let (Some(input), Some(output)) = (pool.token(quote.token_in), pool.token(quote.token_out))
        else {
            return;
        };

        println!(
            "{} {} {} → {} {}",
            style("►").cyan(),
            format_amount(quote.input_amount, input),
            input.symbol,
            format_amount(quote.estimated_output, output).bright_green().bold(),
            output.symbol
        );
        println!(
            "  Min Output: {} {} ({}% slippage)",
            format_amount(quote.minimum_output, output),
            output.symbol,
            quote.slippage_tolerance_bps as f64 / 100.0
        );
        println!(
            "  Pool: {} ({} fee)",
            style(format!("{:?}", pool.address)).dim(),
            fee_tier_percent(pool.fee_tier)
        );
        println!();
    }

    pub fn display_swap_session(session: &SwapSession) {
        match session.step {
            SwapStep::Complete => {
                println!("\n{}", "✅ Swap complete".bold().green());
            }
            SwapStep::Error => {
                println!("\n{}", "❌ Swap failed".bold().red());
            }
            step => {
                println!("\n{} {}", "⏳ Swap".bold().yellow(), step);
            }
        }

        for tx in &session.transactions {
            Self::display_transaction(tx);
        }
        if let Some(error) = &session.last_error {
            Self::display_error(error);
        }
    }

    pub fn display_liquidity_session(session: &LiquiditySession) {
        match session.step {
            LiquidityStep::Complete => {
                println!("\n{}", "✅ Liquidity added".bold().green());
            }
            LiquidityStep::Error => {
                println!("\n{}", "❌ Add liquidity failed".bold().red());
            }
            step => {
                println!("\n{} {}", "⏳ Liquidity".bold().yellow(), step);
            }
        }

        if let Some(plan) = &session.plan {
            println!(
                "  Range: ticks {} to {}",
                plan.tick_lower, plan.tick_upper
            );
            println!(
                "  Deposit: {} {} + {} {}",
                format_amount(plan.amount0, &plan.token0),
                plan.token0.symbol,
                format_amount(plan.amount1, &plan.token1),
                plan.token1.symbol
            );
        }
        for tx in &session.transactions {
            Self::display_transaction(tx);
        }
        if let Some(error) = &session.last_error {
            Self::display_error(error);
        }
    }

    pub fn display_error(error: &AgentError) {
        let message = error.to_string();
        let message = match error.kind() {
            ErrorKind::Validation | ErrorKind::UserRejected | ErrorKind::InsufficientBalance => {
                message.yellow()
            }
            _ => message.red(),
        };
        println!("  {} {}", style("Error:").bold().red(), message);
        if let Some(raw) = underlying_message(error) {
            println!("  {}", style(raw).dim());
        }
    }

    fn display_transaction(tx: &PendingTransaction) {
        let state = match tx.confirmation_state {
            ConfirmationState::Pending => "pending".yellow(),
            ConfirmationState::Confirmed => "confirmed".green(),
            ConfirmationState::Failed => "failed".red(),
        };
        println!(
            "  {} {} {}",
            style(format!("{:<14}", tx.kind.to_string())).cyan(),
            style(format!("{:?}", tx.hash)).dim(),
            state
        );
    }
}

/// Wallet or node message hidden behind the friendly error text.
fn underlying_message(error: &AgentError) -> Option<&str> {
    error
        .raw_message()
        .filter(|raw| !error.to_string().contains(raw))
}

/// Format a raw token amount with the token's decimals
pub fn format_amount(amount: U256, token: &TokenDescriptor) -> String {
    format_units(amount, token.decimals)
}

/// Human price of token0 in token1, from the pool's sqrt price.
pub fn spot_price(pool: &PoolSnapshot) -> Option<f64> {
    let sqrt = u256_to_big(pool.sqrt_price_x96).to_f64()? / 2f64.powi(96);
    let scale = 10f64.powi(pool.token0.decimals as i32 - pool.token1.decimals as i32);
    Some(sqrt * sqrt * scale)
}

/// Create a progress bar for long operations
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Mirrors session updates into the spinner message until the session
/// sender goes away or the returned handle is aborted.
pub fn follow_session<S, F>(mut rx: watch::Receiver<S>, pb: ProgressBar, describe: F) -> JoinHandle<()>
where
    S: Clone + Send + Sync + 'static,
    F: Fn(&S) -> String + Send + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let session = rx.borrow_and_update().clone();
            pb.set_message(describe(&session));
        }
    })
}

pub fn describe_swap_step(session: &SwapSession) -> String {
    match session.step {
        SwapStep::Idle => "Waiting...".to_string(),
        SwapStep::Quoting => "Fetching quote...".to_string(),
        SwapStep::CheckingApproval => "Checking allowance...".to_string(),
        SwapStep::Approving => "Approving token (confirm in wallet)...".to_string(),
        SwapStep::Swapping => "Swapping...".to_string(),
        SwapStep::Complete => "Swap confirmed".to_string(),
        SwapStep::Error => "Swap failed".to_string(),
    }
}

pub fn describe_liquidity_step(session: &LiquiditySession) -> String {
    let symbol = |first: bool| {
        session
            .plan
            .as_ref()
            .map(|p| if first { p.token0.symbol.clone() } else { p.token1.symbol.clone() })
            .unwrap_or_default()
    };

    match session.step {
        LiquidityStep::Idle => "Waiting...".to_string(),
        LiquidityStep::CheckingBalances => "Checking balances...".to_string(),
        LiquidityStep::CheckingApprovals => "Checking allowances...".to_string(),
        LiquidityStep::ApprovingToken0 => format!("Approving {}...", symbol(true)),
        LiquidityStep::ApprovingToken1 => format!("Approving {}...", symbol(false)),
        LiquidityStep::AddingLiquidity => "Adding liquidity...".to_string(),
        LiquidityStep::Complete => "Liquidity added".to_string(),
        LiquidityStep::Error => "Add liquidity failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::SessionState;
    use ethers::types::Address;

    #[test]
    fn test_rejection_shows_wallet_message() {
        let err = AgentError::UserRejected("MetaMask Tx Signature: User denied".to_string());
        assert_eq!(
            underlying_message(&err),
            Some("MetaMask Tx Signature: User denied")
        );
    }

    #[test]
    fn test_revert_message_is_not_repeated() {
        let err = AgentError::ExecutionReverted {
            hash: None,
            message: "execution reverted: STF".to_string(),
        };
        assert_eq!(underlying_message(&err), None);
        assert_eq!(underlying_message(&AgentError::WalletNotConnected), None);
    }

    #[test]
    fn test_spot_price_at_tick_zero() {
        let token = |b: u8, d: u8| TokenDescriptor::new(1, Address::repeat_byte(b), d, "T");
        let pool = PoolSnapshot {
            address: Address::repeat_byte(9),
            token0: token(1, 18),
            token1: token(2, 18),
            fee_tier: 100,
            sqrt_price_x96: U256::from(1u128 << 96),
            tick: 0,
            liquidity: 1,
        };

        let price = spot_price(&pool).unwrap();
        assert!((price - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_describe_idle_sessions() {
        assert_eq!(describe_swap_step(&SwapSession::idle(0)), "Waiting...");
        assert_eq!(
            describe_liquidity_step(&LiquiditySession::idle(0)),
            "Waiting..."
        );
    }
}
