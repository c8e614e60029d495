pub mod allowance;
pub mod chain;
pub mod cli;
pub mod core;
pub mod discovery;
pub mod math;
pub mod orchestrator;
pub mod quotes;
pub mod transaction;
pub mod utils;

// Re-export commonly used types
pub use chain::{InMemoryChain, WalletSession};
pub use core::{AgentError, AgentResult, Config, LiquidityParams, QuoteResult, SwapParams};
pub use discovery::PoolStateReader;
pub use orchestrator::{
    LiquidityOrchestrator, LiquiditySession, OrchestratorContext, SwapOrchestrator, SwapSession,
};
pub use quotes::QuoteCalculator;
pub use transaction::TransactionIssuer;
