use super::simulation;
use crate::chain::{ChainReader, EthersChain, WalletSession};
use crate::core::{AgentError, AgentResult, Config};
use crate::discovery::PoolStateReader;
use crate::orchestrator::{LiquidityOrchestrator, OrchestratorContext, SwapOrchestrator};
use dialoguer::{theme::ColorfulTheme, Password};
use ethers::signers::Signer;
use log::{info, warn};
use std::env;
use std::sync::Arc;

/// Backend, wallet and orchestrator wiring for one CLI invocation.
pub struct Runtime {
    pub config: Config,
    pub wallet: Arc<WalletSession>,
    pub ctx: OrchestratorContext,
    pub simulated: bool,
}

impl Runtime {
    pub fn connect(config: Config, simulate: bool) -> AgentResult<Self> {
        if simulate {
            Self::simulated(config)
        } else {
            Self::rpc(config)
        }
    }

    fn simulated(mut config: Config) -> AgentResult<Self> {
        let chain = Arc::new(simulation::seeded_chain(config.chain_id)?);
        let agent = match config.agent_address {
            Some(agent) => agent,
            None => simulation::agent()?,
        };
        config.agent_address = Some(agent);

        let wallet = Arc::new(WalletSession::connected(chain.signer(), config.chain_id));
        info!("Simulating chain {} with signer {:?}", config.chain_id, chain.signer());
        let ctx = OrchestratorContext::from_chain(chain, wallet.clone(), agent).with_config(&config);

        Ok(Self {
            config,
            wallet,
            ctx,
            simulated: true,
        })
    }

    fn rpc(config: Config) -> AgentResult<Self> {
        config.validate()?;
        let agent = config
            .agent_address
            .ok_or_else(|| AgentError::ConfigError("AGENT_CONTRACT must be set".to_string()))?;

        let private_key = match env::var("PRIVATE_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                warn!("PRIVATE_KEY not set, prompting for it");
                Password::with_theme(&ColorfulTheme::default())
                    .with_prompt("Private key")
                    .interact()
                    .map_err(|e| AgentError::ConfigError(e.to_string()))?
            }
        };

        let chain = Arc::new(EthersChain::connect(
            &config.rpc_url,
            &private_key,
            config.factory_address,
            config.chain_id,
        )?);
        let signer = chain.client().signer().address();
        let wallet = Arc::new(WalletSession::connected(signer, chain.chain_id()));
        let ctx = OrchestratorContext::from_chain(chain, wallet.clone(), agent).with_config(&config);

        Ok(Self {
            config,
            wallet,
            ctx,
            simulated: false,
        })
    }

    pub fn pools(&self) -> PoolStateReader {
        PoolStateReader::new(self.ctx.reader.clone(), self.ctx.token_cache_ttl_secs)
    }

    pub fn swaps(&self) -> SwapOrchestrator {
        SwapOrchestrator::new(self.ctx.clone())
    }

    pub fn liquidity(&self) -> LiquidityOrchestrator {
        LiquidityOrchestrator::new(self.ctx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::WalletContext;

    #[test]
    fn test_simulated_runtime_is_connected() {
        let runtime = Runtime::connect(Config::default(), true).unwrap();
        assert!(runtime.simulated);
        assert_eq!(runtime.wallet.chain_id(), Some(1));
        assert_eq!(runtime.config.agent_address, Some(simulation::agent().unwrap()));
        assert!(runtime.ctx.validate_agent().is_ok());
    }
}
