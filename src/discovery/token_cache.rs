use crate::core::TokenDescriptor;
use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    token: TokenDescriptor,
    expires_at: Instant,
}

/// Thread-safe cache of resolved token metadata, keyed by (chain id, address).
pub struct TokenCache {
    cache: Arc<DashMap<(u64, Address), CacheEntry>>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn get(&self, chain_id: u64, address: Address) -> Option<TokenDescriptor> {
        let key = (chain_id, address);
        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.token.clone());
            }
            drop(entry);
            self.cache.remove(&key);
        }
        None
    }

    pub fn set(&self, token: TokenDescriptor) {
        let entry = CacheEntry {
            expires_at: Instant::now() + self.ttl,
            token,
        };
        self.cache
            .insert((entry.token.chain_id, entry.token.address), entry);
    }

    pub fn size(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc(chain_id: u64) -> TokenDescriptor {
        TokenDescriptor::new(chain_id, Address::repeat_byte(0x0a), 6, "USDC")
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = TokenCache::new(60);
        cache.set(usdc(1));

        assert_eq!(cache.get(1, Address::repeat_byte(0x0a)), Some(usdc(1)));
        // same address on another chain is a different token
        assert_eq!(cache.get(10, Address::repeat_byte(0x0a)), None);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_cache_expiration() {
        let cache = TokenCache::new(0);
        cache.set(usdc(1));

        assert!(cache.get(1, Address::repeat_byte(0x0a)).is_none());
        assert_eq!(cache.size(), 0);
    }
}
