//! Lumenkit
//!
//! Client-side transaction assembly and authorization engine for
//! Soroban-style smart-contract networks.
//!
//! # Architecture
//!
//! This crate provides:
//! - **tx**: Transaction assembly, simulation, signing, submission
//! - **auth**: Authorization entries, payload hashing, multi-signer merge
//! - **crypto**: Hashing, signature normalization, WebAuthn key extraction
//! - **rpc**: The network trait the assembler suspends on, plus an HTTP client
//! - **address**: Strkey account and contract addresses
//! - **xdr**: The canonical binary value codec
//! - **wallet**: Stored credential registry
//!
//! # Example
//!
//! ```rust,ignore
//! use lumenkit::tx::AssembledTransaction;
//! use lumenkit::rpc::HttpRpc;
//! use std::sync::Arc;
//!
//! let rpc = Arc::new(HttpRpc::new(&network.rpc_url)?);
//! let mut tx = AssembledTransaction::build(rpc, network, options, source, invocation)
//!     .await?
//!     .with_source_key(key);
//! tx.simulate().await?;
//! tx.sign()?;
//! let outcome = tx.send().await?;
//! ```

pub mod address;
pub mod auth;
pub mod crypto;
pub mod error;
pub mod rpc;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;
pub mod xdr;

// Re-export key types for convenience
pub use address::Address;
pub use error::{EngineError, EngineResult, ErrorCode};
pub use types::{AssemblyOptions, NetworkConfig};
pub use xdr::Value;

pub use auth::{
    build_payload_hash, derive_credential_contract_address, parse_signers, random_nonce,
    sign_auth_entry, sign_auth_entry_with, AuthEntry, Credentials, InvocationNode, SignatureValue,
    Signer, SignerDescriptor,
};
pub use rpc::{HttpRpc, LedgerRpc, TxStatus};
pub use tx::{AssembledTransaction, SignedTransaction, SubmitOutcome, Transaction};
