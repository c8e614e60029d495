use super::{ChainReader, ContractCall, ReceiptSource, Slot0, TransactionSender};
use crate::core::{AgentError, AgentResult, TxKind};
use dashmap::DashMap;
use ethers::types::{Address, H256, U256};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
struct TokenEntry {
    decimals: Option<u8>,
    symbol: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    sqrt_price_x96: U256,
    tick: i32,
    liquidity: u128,
}

/// What happens to the next submission of a given kind.
#[derive(Debug, Clone)]
enum Script {
    Reject(String),
    Revert,
    Hold,
}

#[derive(Debug, Clone)]
struct ReceiptEntry {
    call: ContractCall,
    status: Option<bool>,
    applied: bool,
}

/// A call accepted by `InMemoryChain`, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCall {
    pub nonce: u64,
    pub hash: H256,
    pub call: ContractCall,
}

/// In-process chain with ERC-20 tokens, V3 pools and an agent contract.
///
/// Approvals take effect when their receipt is first observed as mined.
/// Individual submissions can be scripted to be rejected by the "wallet",
/// revert on-chain, or stay unmined until released.
pub struct InMemoryChain {
    chain_id: u64,
    signer: Address,
    tokens: DashMap<Address, TokenEntry>,
    balances: DashMap<(Address, Address), U256>,
    allowances: DashMap<(Address, Address, Address), U256>,
    pool_index: DashMap<(Address, Address, u32), Address>,
    pools: DashMap<Address, PoolEntry>,
    scripts: DashMap<TxKind, Script>,
    receipts: DashMap<H256, ReceiptEntry>,
    submissions: DashMap<u64, SubmittedCall>,
    nonce: AtomicU64,
    reads: AtomicU64,
    allowance_reads: AtomicU64,
}

impl InMemoryChain {
    pub fn new(chain_id: u64, signer: Address) -> Self {
        Self {
            chain_id,
            signer,
            tokens: DashMap::new(),
            balances: DashMap::new(),
            allowances: DashMap::new(),
            pool_index: DashMap::new(),
            pools: DashMap::new(),
            scripts: DashMap::new(),
            receipts: DashMap::new(),
            submissions: DashMap::new(),
            nonce: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            allowance_reads: AtomicU64::new(0),
        }
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn add_token(&self, token: Address, decimals: u8, symbol: &str) {
        self.tokens.insert(
            token,
            TokenEntry {
                decimals: Some(decimals),
                symbol: Some(symbol.to_string()),
            },
        );
    }

    /// Registers a token whose `decimals()` and `symbol()` calls fail.
    pub fn add_token_without_metadata(&self, token: Address) {
        self.tokens.insert(token, TokenEntry::default());
    }

    /// Registers a token whose `symbol()` call fails.
    pub fn add_token_without_symbol(&self, token: Address, decimals: u8) {
        self.tokens.insert(
            token,
            TokenEntry {
                decimals: Some(decimals),
                symbol: None,
            },
        );
    }

    pub fn add_pool(
        &self,
        pool: Address,
        token_a: Address,
        token_b: Address,
        fee_tier: u32,
        sqrt_price_x96: U256,
        tick: i32,
        liquidity: u128,
    ) {
        self.pool_index.insert(pool_key(token_a, token_b, fee_tier), pool);
        self.pools.insert(
            pool,
            PoolEntry {
                sqrt_price_x96,
                tick,
                liquidity,
            },
        );
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    /// The next submission of `kind` fails at signing with `message`.
    pub fn reject_next(&self, kind: TxKind, message: &str) {
        self.scripts.insert(kind, Script::Reject(message.to_string()));
    }

    /// The next submission of `kind` is mined with a failed status.
    pub fn revert_next(&self, kind: TxKind) {
        self.scripts.insert(kind, Script::Revert);
    }

    /// The next submission of `kind` stays unmined until `release` is called.
    pub fn hold_next(&self, kind: TxKind) {
        self.scripts.insert(kind, Script::Hold);
    }

    /// Mines every held transaction successfully, whether or not anyone is
    /// still watching its receipt.
    pub fn release(&self) {
        let mut mined = Vec::new();
        for mut entry in self.receipts.iter_mut() {
            if entry.status.is_none() {
                entry.status = Some(true);
                entry.applied = true;
                mined.push(entry.call.clone());
            }
        }
        for call in &mined {
            self.apply_effects(call);
        }
    }

    pub fn submissions(&self) -> Vec<SubmittedCall> {
        let mut calls: Vec<SubmittedCall> =
            self.submissions.iter().map(|e| e.value().clone()).collect();
        calls.sort_by_key(|c| c.nonce);
        calls
    }

    pub fn submissions_of(&self, kind: TxKind) -> Vec<SubmittedCall> {
        self.submissions()
            .into_iter()
            .filter(|c| c.call.kind() == kind)
            .collect()
    }

    pub fn allowance_reads(&self) -> u64 {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    /// Total contract reads of any kind.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    // Agent calls pull funds from the signer, so they revert without balance or allowance.
    fn would_revert(&self, call: &ContractCall) -> bool {
        let short = |token: Address, agent: Address, amount: U256| {
            let balance = self
                .balances
                .get(&(token, self.signer))
                .map(|b| *b)
                .unwrap_or_default();
            let allowance = self
                .allowances
                .get(&(token, self.signer, agent))
                .map(|a| *a)
                .unwrap_or_default();
            balance < amount || allowance < amount
        };

        match call {
            ContractCall::Approve { .. } => false,
            ContractCall::ExactInputSwap {
                agent,
                token_in,
                amount_in,
                ..
            } => short(*token_in, *agent, *amount_in),
            ContractCall::AddLiquidity {
                agent,
                token0,
                token1,
                amount0_desired,
                amount1_desired,
                ..
            } => short(*token0, *agent, *amount0_desired) || short(*token1, *agent, *amount1_desired),
        }
    }

    fn apply_effects(&self, call: &ContractCall) {
        match call {
            ContractCall::Approve {
                token,
                spender,
                amount,
            } => {
                self.allowances.insert((*token, self.signer, *spender), *amount);
            }
            ContractCall::ExactInputSwap {
                agent,
                token_in,
                amount_in,
                ..
            } => self.pull(*token_in, *agent, *amount_in),
            ContractCall::AddLiquidity {
                agent,
                token0,
                token1,
                amount0_desired,
                amount1_desired,
                ..
            } => {
                self.pull(*token0, *agent, *amount0_desired);
                self.pull(*token1, *agent, *amount1_desired);
            }
        }
    }

    // transferFrom(signer -> agent): spends both balance and allowance
    fn pull(&self, token: Address, agent: Address, amount: U256) {
        if let Some(mut balance) = self.balances.get_mut(&(token, self.signer)) {
            *balance = balance.saturating_sub(amount);
        }
        if let Some(mut allowance) = self.allowances.get_mut(&(token, self.signer, agent)) {
            *allowance = allowance.saturating_sub(amount);
        }
    }
}

fn pool_key(a: Address, b: Address, fee: u32) -> (Address, Address, u32) {
    if a <= b {
        (a, b, fee)
    } else {
        (b, a, fee)
    }
}

#[async_trait::async_trait]
impl ChainReader for InMemoryChain {
    async fn token_decimals(&self, token: Address) -> AgentResult<u8> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(&token)
            .and_then(|t| t.decimals)
            .ok_or_else(|| AgentError::Rpc(format!("decimals() reverted for {:?}", token)))
    }

    async fn token_symbol(&self, token: Address) -> AgentResult<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(&token)
            .and_then(|t| t.symbol.clone())
            .ok_or_else(|| AgentError::Rpc(format!("symbol() reverted for {:?}", token)))
    }

    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee_tier: u32,
    ) -> AgentResult<Address> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pool_index
            .get(&pool_key(token_a, token_b, fee_tier))
            .map(|p| *p)
            .unwrap_or_else(Address::zero))
    }

    async fn slot0(&self, pool: Address) -> AgentResult<Slot0> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pools
            .get(&pool)
            .map(|p| Slot0 {
                sqrt_price_x96: p.sqrt_price_x96,
                tick: p.tick,
            })
            .ok_or_else(|| AgentError::Rpc(format!("no contract at {:?}", pool)))
    }

    async fn liquidity(&self, pool: Address) -> AgentResult<u128> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pools
            .get(&pool)
            .map(|p| p.liquidity)
            .ok_or_else(|| AgentError::Rpc(format!("no contract at {:?}", pool)))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> AgentResult<U256> {
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .allowances
            .get(&(token, owner, spender))
            .map(|a| *a)
            .unwrap_or_default())
    }

    async fn balance_of(&self, token: Address, owner: Address) -> AgentResult<U256> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .balances
            .get(&(token, owner))
            .map(|b| *b)
            .unwrap_or_default())
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait::async_trait]
impl TransactionSender for InMemoryChain {
    async fn submit(&self, call: &ContractCall) -> AgentResult<H256> {
        let script = self.scripts.remove(&call.kind()).map(|(_, s)| s);
        if let Some(Script::Reject(message)) = &script {
            return Err(AgentError::TransactionFailed(message.clone()));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = H256::from_low_u64_be(nonce);
        let status = match script {
            Some(Script::Revert) => Some(false),
            Some(Script::Hold) => None,
            _ => Some(!self.would_revert(call)),
        };

        debug!("In-memory {} submitted as {:?}", call.function_name(), hash);
        self.receipts.insert(
            hash,
            ReceiptEntry {
                call: call.clone(),
                status,
                applied: false,
            },
        );
        self.submissions.insert(
            nonce,
            SubmittedCall {
                nonce,
                hash,
                call: call.clone(),
            },
        );
        Ok(hash)
    }
}

#[async_trait::async_trait]
impl ReceiptSource for InMemoryChain {
    async fn receipt_status(&self, hash: H256) -> AgentResult<Option<bool>> {
        let (status, to_apply) = {
            let mut entry = self
                .receipts
                .get_mut(&hash)
                .ok_or_else(|| AgentError::Rpc(format!("unknown transaction {:?}", hash)))?;
            let to_apply = if entry.status == Some(true) && !entry.applied {
                entry.applied = true;
                Some(entry.call.clone())
            } else {
                None
            };
            (entry.status, to_apply)
        };

        if let Some(call) = to_apply {
            self.apply_effects(&call);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_lookup_is_order_independent() {
        let chain = InMemoryChain::new(1, Address::repeat_byte(0xee));
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let pool = Address::repeat_byte(3);
        chain.add_pool(pool, b, a, 100, U256::from(1u128 << 96), 0, 10);

        assert_eq!(chain.get_pool(a, b, 100).await.unwrap(), pool);
        assert_eq!(chain.get_pool(b, a, 100).await.unwrap(), pool);
        assert_eq!(chain.get_pool(a, b, 500).await.unwrap(), Address::zero());
    }

    #[tokio::test]
    async fn test_approval_applies_on_receipt() {
        let signer = Address::repeat_byte(0xee);
        let chain = InMemoryChain::new(1, signer);
        let token = Address::repeat_byte(1);
        let spender = Address::repeat_byte(9);
        let call = ContractCall::Approve {
            token,
            spender,
            amount: U256::from(42),
        };

        let hash = chain.submit(&call).await.unwrap();
        assert_eq!(chain.allowance(token, signer, spender).await.unwrap(), U256::zero());
        assert_eq!(chain.receipt_status(hash).await.unwrap(), Some(true));
        assert_eq!(chain.allowance(token, signer, spender).await.unwrap(), U256::from(42));
        assert_eq!(chain.allowance_reads(), 2);
    }

    #[tokio::test]
    async fn test_scripts_apply_once() {
        let chain = InMemoryChain::new(1, Address::repeat_byte(0xee));
        let call = ContractCall::Approve {
            token: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            amount: U256::one(),
        };

        chain.reject_next(TxKind::Approve, "User rejected the request.");
        assert!(chain.submit(&call).await.is_err());

        chain.hold_next(TxKind::Approve);
        let held = chain.submit(&call).await.unwrap();
        assert_eq!(chain.receipt_status(held).await.unwrap(), None);
        chain.release();
        assert_eq!(chain.receipt_status(held).await.unwrap(), Some(true));

        chain.revert_next(TxKind::Approve);
        let reverted = chain.submit(&call).await.unwrap();
        assert_eq!(chain.receipt_status(reverted).await.unwrap(), Some(false));
        assert_eq!(chain.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_underfunded_swap_reverts() {
        let signer = Address::repeat_byte(0xee);
        let chain = InMemoryChain::new(1, signer);
        let token_in = Address::repeat_byte(1);
        let agent = Address::repeat_byte(9);
        let call = ContractCall::ExactInputSwap {
            agent,
            token_in,
            token_out: Address::repeat_byte(2),
            fee: 100,
            amount_in: U256::from(1_000),
            amount_out_minimum: U256::zero(),
            deadline: U256::from(u64::MAX),
        };

        chain.set_allowance(token_in, signer, agent, U256::from(1_000));
        let unfunded = chain.submit(&call).await.unwrap();
        assert_eq!(chain.receipt_status(unfunded).await.unwrap(), Some(false));

        chain.set_balance(token_in, signer, U256::from(1_000));
        let funded = chain.submit(&call).await.unwrap();
        assert_eq!(chain.receipt_status(funded).await.unwrap(), Some(true));
    }
}
