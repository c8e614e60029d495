#![allow(dead_code)]

use agent_swap::chain::{InMemoryChain, WalletSession};
use agent_swap::cli::simulation;
use agent_swap::orchestrator::{LiquidityOrchestrator, OrchestratorContext, SwapOrchestrator};
use agent_swap::transaction::MonitorConfig;
use ethers::types::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;

pub const CHAIN_ID: u64 = 1;

pub fn agent() -> Address {
    Address::repeat_byte(0xa6)
}

/// Sorts first: always token0 of the test pool.
pub fn token_a() -> Address {
    Address::repeat_byte(0x11)
}

pub fn token_b() -> Address {
    Address::repeat_byte(0x22)
}

pub fn usdc() -> Address {
    Address::from_str(simulation::USDC).unwrap()
}

pub fn weth() -> Address {
    Address::from_str(simulation::WETH).unwrap()
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub struct Harness {
    pub chain: Arc<InMemoryChain>,
    pub wallet: Arc<WalletSession>,
    pub signer: Address,
}

impl Harness {
    /// An 18/18-decimal pool priced 1:1 at tick 0, signer holding 100 of each token.
    pub fn new() -> Self {
        let signer = Address::repeat_byte(0x5e);
        let chain = InMemoryChain::new(CHAIN_ID, signer);
        chain.add_token(token_a(), 18, "AAA");
        chain.add_token(token_b(), 18, "BBB");
        chain.add_pool(
            Address::repeat_byte(0x99),
            token_a(),
            token_b(),
            100,
            U256::from(1u128 << 96),
            0,
            1_000_000_000_000_000_000_000_000,
        );
        chain.set_balance(token_a(), signer, ether(100));
        chain.set_balance(token_b(), signer, ether(100));
        Self::wrap(chain)
    }

    /// The USDC/WETH chain used by `--simulate`.
    pub fn seeded() -> Self {
        Self::wrap(simulation::seeded_chain(CHAIN_ID).unwrap())
    }

    fn wrap(chain: InMemoryChain) -> Self {
        let signer = chain.signer();
        Self {
            chain: Arc::new(chain),
            wallet: Arc::new(WalletSession::connected(signer, CHAIN_ID)),
            signer,
        }
    }

    pub fn context(&self) -> OrchestratorContext {
        OrchestratorContext::from_chain(self.chain.clone(), self.wallet.clone(), agent())
            .with_monitor(MonitorConfig {
                check_interval_ms: 1,
            })
    }

    pub fn swaps(&self) -> SwapOrchestrator {
        SwapOrchestrator::new(self.context())
    }

    pub fn liquidity(&self) -> LiquidityOrchestrator {
        LiquidityOrchestrator::new(self.context())
    }
}
