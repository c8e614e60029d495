use super::WalletContext;
use ethers::types::Address;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub address: Address,
    pub chain_id: u64,
}

/// Observable wallet connection. Cloning the receiver side lets a UI follow
/// connects, chain switches and disconnects.
pub struct WalletSession {
    state: watch::Sender<Option<Connection>>,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    pub fn connected(address: Address, chain_id: u64) -> Self {
        let (state, _) = watch::channel(Some(Connection { address, chain_id }));
        Self { state }
    }

    pub fn connect(&self, address: Address, chain_id: u64) {
        info!("Wallet {:?} connected on chain {}", address, chain_id);
        self.state.send_replace(Some(Connection { address, chain_id }));
    }

    pub fn switch_chain(&self, chain_id: u64) {
        self.state.send_modify(|conn| {
            if let Some(conn) = conn {
                conn.chain_id = chain_id;
            }
        });
    }

    pub fn connection(&self) -> Option<Connection> {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Connection>> {
        self.state.subscribe()
    }
}

impl WalletContext for WalletSession {
    fn address(&self) -> Option<Address> {
        self.connection().map(|c| c.address)
    }

    fn chain_id(&self) -> Option<u64> {
        self.connection().map(|c| c.chain_id)
    }

    fn disconnect(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            warn!("Wallet {:?} disconnected", previous.address);
        }
    }
}
