use super::abi::{AgentContract, Erc20, UniswapV3Factory, UniswapV3Pool};
use super::{ChainReader, ContractCall, ReceiptSource, Slot0, TransactionSender};
use crate::core::{AgentError, AgentResult};
use ethers::contract::ContractError;
use ethers::prelude::*;
use log::{debug, info};
use std::sync::Arc;

/// JSON-RPC backed chain access through an `ethers` middleware stack.
///
/// Reads go through the middleware's provider; writes are signed by whatever
/// signer the middleware carries (usually `SignerMiddleware<Provider<Http>, LocalWallet>`).
pub struct EthersChain<M> {
    client: Arc<M>,
    factory: Address,
    chain_id: u64,
}

impl<M: Middleware + 'static> EthersChain<M> {
    pub fn new(client: Arc<M>, factory: Address, chain_id: u64) -> Self {
        Self {
            client,
            factory,
            chain_id,
        }
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }
}

impl EthersChain<SignerMiddleware<Provider<Http>, LocalWallet>> {
    /// Connects to `rpc_url` and signs with `private_key`.
    pub fn connect(
        rpc_url: &str,
        private_key: &str,
        factory: Address,
        chain_id: u64,
    ) -> AgentResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AgentError::ConfigError(format!("Invalid RPC URL: {}", e)))?;
        let wallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| AgentError::ConfigError(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain_id);

        info!("Connected signer {:?} on chain {}", wallet.address(), chain_id);
        let client = SignerMiddleware::new(provider, wallet);
        Ok(Self::new(Arc::new(client), factory, chain_id))
    }
}

fn read_error<M: Middleware>(err: ContractError<M>) -> AgentError {
    AgentError::Rpc(err.to_string())
}

// Reverts caught during gas estimation carry the ABI-encoded reason; anything
// else keeps the raw wallet/node message for the issuer to classify.
fn submit_error<M: Middleware>(err: ContractError<M>) -> AgentError {
    if err.is_revert() {
        let message = match err.decode_revert::<String>() {
            Some(reason) => format!("execution reverted: {}", reason),
            None => err.to_string(),
        };
        return AgentError::ExecutionReverted {
            hash: None,
            message,
        };
    }
    AgentError::TransactionFailed(err.to_string())
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> ChainReader for EthersChain<M> {
    async fn token_decimals(&self, token: Address) -> AgentResult<u8> {
        let contract = Erc20::new(token, self.client.clone());
        contract.decimals().call().await.map_err(read_error)
    }

    async fn token_symbol(&self, token: Address) -> AgentResult<String> {
        let contract = Erc20::new(token, self.client.clone());
        contract.symbol().call().await.map_err(read_error)
    }

    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee_tier: u32,
    ) -> AgentResult<Address> {
        let factory = UniswapV3Factory::new(self.factory, self.client.clone());
        factory
            .get_pool(token_a, token_b, fee_tier)
            .call()
            .await
            .map_err(read_error)
    }

    async fn slot0(&self, pool: Address) -> AgentResult<Slot0> {
        let contract = UniswapV3Pool::new(pool, self.client.clone());
        let (sqrt_price_x96, tick, ..) = contract.slot_0().call().await.map_err(read_error)?;
        debug!("slot0 for {:?}: sqrtPriceX96={} tick={}", pool, sqrt_price_x96, tick);
        Ok(Slot0 {
            sqrt_price_x96,
            tick,
        })
    }

    async fn liquidity(&self, pool: Address) -> AgentResult<u128> {
        let contract = UniswapV3Pool::new(pool, self.client.clone());
        contract.liquidity().call().await.map_err(read_error)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> AgentResult<U256> {
        let contract = Erc20::new(token, self.client.clone());
        contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(read_error)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> AgentResult<U256> {
        let contract = Erc20::new(token, self.client.clone());
        contract.balance_of(owner).call().await.map_err(read_error)
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> TransactionSender for EthersChain<M> {
    async fn submit(&self, call: &ContractCall) -> AgentResult<H256> {
        debug!("Submitting {} to {:?}", call.function_name(), call.target());

        match call {
            ContractCall::Approve {
                token,
                spender,
                amount,
            } => {
                let contract = Erc20::new(*token, self.client.clone());
                let tx = contract.approve(*spender, *amount);
                let pending = tx.send().await.map_err(submit_error)?;
                Ok(pending.tx_hash())
            }
            ContractCall::ExactInputSwap {
                agent,
                token_in,
                token_out,
                fee,
                amount_in,
                amount_out_minimum,
                deadline,
            } => {
                let contract = AgentContract::new(*agent, self.client.clone());
                let tx = contract.swap_exact_input_single(
                    *token_in,
                    *token_out,
                    *fee,
                    *amount_in,
                    *amount_out_minimum,
                    *deadline,
                );
                let pending = tx.send().await.map_err(submit_error)?;
                Ok(pending.tx_hash())
            }
            ContractCall::AddLiquidity {
                agent,
                token0,
                token1,
                fee,
                tick_lower,
                tick_upper,
                amount0_desired,
                amount1_desired,
                amount0_min,
                amount1_min,
                recipient,
                deadline,
            } => {
                let contract = AgentContract::new(*agent, self.client.clone());
                let tx = contract.add_liquidity(
                    *token0,
                    *token1,
                    *fee,
                    *tick_lower,
                    *tick_upper,
                    *amount0_desired,
                    *amount1_desired,
                    *amount0_min,
                    *amount1_min,
                    *recipient,
                    *deadline,
                );
                let pending = tx.send().await.map_err(submit_error)?;
                Ok(pending.tx_hash())
            }
        }
    }
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> ReceiptSource for EthersChain<M> {
    async fn receipt_status(&self, hash: H256) -> AgentResult<Option<bool>> {
        let receipt = self
            .client
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| AgentError::Rpc(e.to_string()))?;

        // Pre-Byzantium receipts carry no status; being mined is all we get.
        Ok(receipt.map(|r| r.status.map(|s| s.as_u64() == 1).unwrap_or(true)))
    }
}
