use crate::chain::ChainReader;
use crate::core::{Allowance, AgentResult};
use ethers::types::Address;
use log::debug;
use std::sync::Arc;

/// Reads ERC-20 allowances on demand. Results are never cached: every
/// approval decision is made against a read issued at that point.
pub struct AllowanceChecker {
    reader: Arc<dyn ChainReader>,
}

impl AllowanceChecker {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    pub async fn check_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> AgentResult<Allowance> {
        let amount = self.reader.allowance(token, owner, spender).await?;
        debug!(
            "Allowance of {:?} for {:?} on {:?}: {}",
            owner, spender, token, amount
        );
        Ok(Allowance {
            owner,
            spender,
            token,
            amount,
        })
    }

    /// Both allowances, read concurrently.
    pub async fn check_pair(
        &self,
        token0: Address,
        token1: Address,
        owner: Address,
        spender: Address,
    ) -> AgentResult<(Allowance, Allowance)> {
        futures::try_join!(
            self.check_allowance(token0, owner, spender),
            self.check_allowance(token1, owner, spender)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryChain;
    use ethers::types::U256;

    #[tokio::test]
    async fn test_reads_are_fresh() {
        let owner = Address::repeat_byte(0xee);
        let spender = Address::repeat_byte(0xa6);
        let token = Address::repeat_byte(0x01);
        let chain = Arc::new(InMemoryChain::new(1, owner));
        let checker = AllowanceChecker::new(chain.clone());

        let before = checker.check_allowance(token, owner, spender).await.unwrap();
        assert_eq!(before.amount, U256::zero());

        chain.set_allowance(token, owner, spender, U256::from(500));
        let after = checker.check_allowance(token, owner, spender).await.unwrap();
        assert!(after.covers(U256::from(500)));
        assert_eq!(chain.allowance_reads(), 2);
    }

    #[tokio::test]
    async fn test_check_pair() {
        let owner = Address::repeat_byte(0xee);
        let spender = Address::repeat_byte(0xa6);
        let chain = Arc::new(InMemoryChain::new(1, owner));
        chain.set_allowance(Address::repeat_byte(2), owner, spender, U256::from(7));
        let checker = AllowanceChecker::new(chain.clone());

        let (a0, a1) = checker
            .check_pair(Address::repeat_byte(1), Address::repeat_byte(2), owner, spender)
            .await
            .unwrap();
        assert_eq!(a0.amount, U256::zero());
        assert_eq!(a1.amount, U256::from(7));
        assert_eq!(a1.token, Address::repeat_byte(2));
    }
}
