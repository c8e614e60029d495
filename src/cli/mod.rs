use crate::core::{AgentError, AgentResult};
use clap::{Parser, Subcommand};
use ethers::types::Address;
use std::str::FromStr;

pub mod commands;
pub mod display;
pub mod runtime;
pub mod simulation;

pub use runtime::Runtime;

#[derive(Parser)]
#[command(name = "agent-swap")]
#[command(about = "Swap and provide liquidity on Uniswap V3 pools through an agent contract", long_about = None)]
pub struct Cli {
    /// Run against a seeded in-memory chain instead of RPC_URL
    #[arg(long, global = true)]
    pub simulate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the pool for a token pair and fee tier
    Pool(PoolArgs),

    /// Quote an exact-input swap at the pool's current price
    Quote(QuoteArgs),

    /// Swap through the agent contract (approving first if needed)
    Swap(SwapArgs),

    /// Add liquidity around the current price through the agent contract
    AddLiquidity(AddLiquidityArgs),
}

#[derive(Parser)]
pub struct PoolArgs {
    /// First token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_a: Address,

    /// Second token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_b: Address,

    /// Fee tier in hundredths of a bip (100 = 0.01%)
    #[arg(short, long, default_value = "100")]
    pub fee: u32,
}

#[derive(Parser)]
pub struct QuoteArgs {
    /// Input token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_in: Address,

    /// Output token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_out: Address,

    /// Amount to swap, in whole tokens (e.g. 1.5)
    pub amount: String,

    /// Slippage tolerance in basis points (default: 50 = 0.5%)
    #[arg(short, long, default_value = "50")]
    pub slippage: u16,

    /// Fee tier in hundredths of a bip (100 = 0.01%)
    #[arg(short, long, default_value = "100")]
    pub fee: u32,
}

#[derive(Parser)]
pub struct SwapArgs {
    /// Input token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_in: Address,

    /// Output token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_out: Address,

    /// Amount to swap, in whole tokens (e.g. 1.5)
    pub amount: String,

    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Print the final session as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct AddLiquidityArgs {
    /// First token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_a: Address,

    /// Amount of the first token, in whole tokens
    pub amount_a: String,

    /// Second token (address or known symbol)
    #[arg(value_parser = parse_token)]
    pub token_b: Address,

    /// Amount of the second token, in whole tokens
    pub amount_b: String,

    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Print the final session as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a token address or a well-known mainnet symbol.
pub fn parse_token_identifier(input: &str) -> AgentResult<Address> {
    if let Ok(address) = Address::from_str(input.trim()) {
        return Ok(address);
    }

    let known = match input.trim().to_uppercase().as_str() {
        "WETH" | "ETH" => simulation::WETH,
        "USDC" => simulation::USDC,
        "USDT" => "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        "DAI" => "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        _ => {
            return Err(AgentError::InvalidInput(format!(
                "'{}' is neither an address nor a known token",
                input
            )))
        }
    };
    Address::from_str(known).map_err(|e| AgentError::InvalidInput(e.to_string()))
}

fn parse_token(s: &str) -> Result<Address, String> {
    parse_token_identifier(s).map_err(|e| e.to_string())
}
