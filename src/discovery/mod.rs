pub mod token_cache;

use crate::chain::ChainReader;
use crate::core::{AgentError, AgentResult, PoolSnapshot, TokenDescriptor, UNKNOWN_SYMBOL};
use crate::utils::fee_tier_percent;
use ethers::types::Address;
use log::{debug, info, warn};
use std::sync::Arc;

pub use token_cache::TokenCache;

/// Outcome of a pool lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolLookup {
    Ready(PoolSnapshot),
    /// Metadata for this token could not be read yet.
    Pending(Address),
    NotFound(String),
}

impl PoolLookup {
    /// Collapses a lookup into the error contract used by the orchestrators.
    pub fn into_result(self) -> AgentResult<PoolSnapshot> {
        match self {
            PoolLookup::Ready(pool) => Ok(pool),
            PoolLookup::Pending(token) => {
                Err(AgentError::TokenMetadataPending(format!("{:?}", token)))
            }
            PoolLookup::NotFound(message) => Err(AgentError::PoolNotFound(message)),
        }
    }
}

/// Reads token metadata and pool state for a pair and fee tier.
pub struct PoolStateReader {
    reader: Arc<dyn ChainReader>,
    cache: TokenCache,
}

impl PoolStateReader {
    pub fn new(reader: Arc<dyn ChainReader>, cache_ttl_secs: u64) -> Self {
        Self {
            reader,
            cache: TokenCache::new(cache_ttl_secs),
        }
    }

    /// Resolves decimals and symbol for `address`.
    ///
    /// Returns `None` when decimals cannot be read; a missing symbol is
    /// replaced by a placeholder and the descriptor is not cached.
    pub async fn token_descriptor(&self, address: Address) -> AgentResult<Option<TokenDescriptor>> {
        let chain_id = self.reader.chain_id();
        if let Some(token) = self.cache.get(chain_id, address) {
            return Ok(Some(token));
        }

        let (decimals, symbol) = futures::join!(
            self.reader.token_decimals(address),
            self.reader.token_symbol(address)
        );

        let decimals = match decimals {
            Ok(decimals) => decimals,
            Err(e) => {
                debug!("decimals() unavailable for {:?}: {}", address, e);
                return Ok(None);
            }
        };

        match symbol {
            Ok(symbol) => {
                let token = TokenDescriptor::new(chain_id, address, decimals, symbol);
                self.cache.set(token.clone());
                debug!("Cached {} ({} tokens cached)", token.symbol, self.cache.size());
                Ok(Some(token))
            }
            Err(e) => {
                warn!("symbol() unavailable for {:?}, using placeholder: {}", address, e);
                Ok(Some(TokenDescriptor::new(
                    chain_id,
                    address,
                    decimals,
                    UNKNOWN_SYMBOL,
                )))
            }
        }
    }

    pub async fn get_pool_snapshot(
        &self,
        token_a: Address,
        token_b: Address,
        fee_tier: u32,
    ) -> AgentResult<PoolLookup> {
        debug!(
            "Reading pool {:?}/{:?} at fee tier {}",
            token_a, token_b, fee_tier
        );

        let (desc_a, desc_b, pool_address) = futures::join!(
            self.token_descriptor(token_a),
            self.token_descriptor(token_b),
            self.reader.get_pool(token_a, token_b, fee_tier)
        );

        let desc_a = match desc_a? {
            Some(token) => token,
            None => return Ok(PoolLookup::Pending(token_a)),
        };
        let desc_b = match desc_b? {
            Some(token) => token,
            None => return Ok(PoolLookup::Pending(token_b)),
        };

        let pool_address = pool_address?;
        if pool_address.is_zero() {
            let message = format!(
                "No pool found for {}/{} with {} fee",
                desc_a.symbol,
                desc_b.symbol,
                fee_tier_percent(fee_tier)
            );
            info!("{}", message);
            return Ok(PoolLookup::NotFound(message));
        }

        let (slot0, liquidity) = futures::join!(
            self.reader.slot0(pool_address),
            self.reader.liquidity(pool_address)
        );
        let slot0 = slot0?;
        let liquidity = liquidity?;

        let snapshot = PoolSnapshot::new(
            pool_address,
            desc_a,
            desc_b,
            fee_tier,
            slot0.sqrt_price_x96,
            slot0.tick,
            liquidity,
        )?;
        debug!(
            "Pool {:?}: tick {}, liquidity {}",
            snapshot.address, snapshot.tick, snapshot.liquidity
        );

        Ok(PoolLookup::Ready(snapshot))
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}
