//! Shared types for the assembly engine
//!
//! Configuration that crosses module boundaries is defined here and
//! threaded by value. Nothing in this crate keeps global mutable client
//! state; per-network settings travel with the client that uses them.

use crate::crypto;
use serde::{Deserialize, Serialize};

/// Network passphrases for the public and test networks
pub const PUBLIC_NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
pub const TEST_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Immutable per-client network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Network passphrase; its SHA-256 digest is the network id bound
    /// into every signed payload
    pub network_passphrase: String,
}

impl NetworkConfig {
    pub fn new(rpc_url: impl Into<String>, network_passphrase: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            network_passphrase: network_passphrase.into(),
        }
    }

    pub fn testnet(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, TEST_NETWORK_PASSPHRASE)
    }

    pub fn public(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, PUBLIC_NETWORK_PASSPHRASE)
    }

    /// 32-byte network identifier
    pub fn network_id(&self) -> [u8; 32] {
        crypto::network_id(&self.network_passphrase)
    }
}

/// Per-assembly behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Transaction validity window and total polling budget, in seconds
    pub timeout_secs: u64,
    /// Fixed polling interval, in milliseconds
    pub poll_interval_ms: u64,
    /// Allowed clock skew subtracted from the validity window start
    pub skew_secs: u64,
    /// Automatically run a restore sub-transaction when simulation
    /// reports archived state
    pub restore: bool,
    /// Sign even when the simulation classifies the call as read-only
    pub force: bool,
    /// Base inclusion fee in stroops, before the simulated resource fee
    pub base_fee: u32,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            poll_interval_ms: 1000,
            skew_secs: 5,
            restore: true,
            force: false,
            base_fee: 100,
        }
    }
}

impl AssemblyOptions {
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}
