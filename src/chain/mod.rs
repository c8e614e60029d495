//! Collaborator interfaces for everything that touches the chain or the wallet.
//!
//! The orchestrators only see these traits; `EthersChain` backs them with a
//! JSON-RPC node and `InMemoryChain` with in-process state.

pub mod abi;
pub mod ethers_client;
pub mod memory;
pub mod wallet;

use crate::core::{AgentResult, TxKind};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

pub use ethers_client::EthersChain;
pub use memory::{InMemoryChain, SubmittedCall};
pub use wallet::{Connection, WalletSession};

/// The slot0 fields the orchestration needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Read-only contract calls.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn token_decimals(&self, token: Address) -> AgentResult<u8>;

    async fn token_symbol(&self, token: Address) -> AgentResult<String>;

    /// Factory lookup; the zero address means no pool exists.
    async fn get_pool(&self, token_a: Address, token_b: Address, fee_tier: u32)
        -> AgentResult<Address>;

    async fn slot0(&self, pool: Address) -> AgentResult<Slot0>;

    async fn liquidity(&self, pool: Address) -> AgentResult<u128>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address)
        -> AgentResult<U256>;

    async fn balance_of(&self, token: Address, owner: Address) -> AgentResult<U256>;

    fn chain_id(&self) -> u64;
}

/// State-changing contract calls. Submission asks the wallet for a signature.
#[async_trait::async_trait]
pub trait TransactionSender: Send + Sync {
    async fn submit(&self, call: &ContractCall) -> AgentResult<H256>;
}

/// Receipt lookup: `None` while the transaction is not mined,
/// `Some(true)` on success, `Some(false)` when it reverted.
#[async_trait::async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn receipt_status(&self, hash: H256) -> AgentResult<Option<bool>>;
}

/// Connected signing identity.
pub trait WalletContext: Send + Sync {
    fn address(&self) -> Option<Address>;

    fn chain_id(&self) -> Option<u64>;

    fn disconnect(&self);
}

/// A typed write call: target contract, ABI function and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    ExactInputSwap {
        agent: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
        amount_out_minimum: U256,
        deadline: U256,
    },
    AddLiquidity {
        agent: Address,
        token0: Address,
        token1: Address,
        fee: u32,
        tick_lower: i32,
        tick_upper: i32,
        amount0_desired: U256,
        amount1_desired: U256,
        amount0_min: U256,
        amount1_min: U256,
        recipient: Address,
        deadline: U256,
    },
}

impl ContractCall {
    pub fn target(&self) -> Address {
        match self {
            ContractCall::Approve { token, .. } => *token,
            ContractCall::ExactInputSwap { agent, .. } => *agent,
            ContractCall::AddLiquidity { agent, .. } => *agent,
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::Approve { .. } => "approve",
            ContractCall::ExactInputSwap { .. } => "swapExactInputSingle",
            ContractCall::AddLiquidity { .. } => "addLiquidity",
        }
    }

    pub fn kind(&self) -> TxKind {
        match self {
            ContractCall::Approve { .. } => TxKind::Approve,
            ContractCall::ExactInputSwap { .. } => TxKind::Swap,
            ContractCall::AddLiquidity { .. } => TxKind::AddLiquidity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_call_metadata() {
        let approve = ContractCall::Approve {
            token: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            amount: U256::from(5),
        };
        assert_eq!(approve.target(), Address::repeat_byte(1));
        assert_eq!(approve.function_name(), "approve");
        assert_eq!(approve.kind(), TxKind::Approve);
    }
}
