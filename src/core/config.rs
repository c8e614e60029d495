use crate::core::{constants::*, error::AgentResult, AgentError};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    pub factory_address: Address,
    pub agent_address: Option<Address>,
    pub receipt_poll_interval_ms: u64,
    pub disconnect_on_revert: bool,
    pub token_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> AgentResult<Self> {
        let rpc_url = env::var("RPC_URL")
            .or_else(|_| env::var("ETH_RPC_URL"))
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

        let factory_address = match env::var("FACTORY_ADDRESS") {
            Ok(raw) => parse_address("FACTORY_ADDRESS", &raw)?,
            Err(_) => *DEFAULT_FACTORY,
        };

        let agent_address = match env::var("AGENT_CONTRACT") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_address("AGENT_CONTRACT", &raw)?),
            _ => None,
        };

        Ok(Self {
            rpc_url,
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_default()
                .parse()
                .unwrap_or(1),
            factory_address,
            agent_address,
            receipt_poll_interval_ms: env::var("RECEIPT_POLL_INTERVAL_MS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(DEFAULT_RECEIPT_POLL_MS),
            disconnect_on_revert: env::var("DISCONNECT_ON_REVERT")
                .unwrap_or_default()
                .parse()
                .unwrap_or(true),
            token_cache_ttl_secs: env::var("TOKEN_CACHE_TTL_SECS")
                .unwrap_or_default()
                .parse()
                .unwrap_or(TOKEN_CACHE_TTL),
        })
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.agent_address.is_none() {
            return Err(AgentError::ConfigError(
                "AGENT_CONTRACT must be set".to_string(),
            ));
        }

        if self.receipt_poll_interval_ms == 0 {
            return Err(AgentError::ConfigError(
                "Receipt poll interval must be greater than 0".to_string(),
            ));
        }

        if self.chain_id == 0 {
            return Err(AgentError::ConfigError(
                "Chain id must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 1,
            factory_address: *DEFAULT_FACTORY,
            agent_address: None,
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_MS,
            disconnect_on_revert: true,
            token_cache_ttl_secs: TOKEN_CACHE_TTL,
        }
    }
}

fn parse_address(name: &str, raw: &str) -> AgentResult<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| AgentError::ConfigError(format!("{} is not a valid address: {}", name, e)))
}
