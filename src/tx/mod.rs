//! Transaction model
//!
//! The unsigned transaction, its simulated resource footprint, and the
//! signed envelope. A signed transaction is never mutated; re-signing
//! starts over from an unsigned clone.

pub mod assembler;

pub use assembler::{AssembledTransaction, SubmitOutcome};

use crate::address::Address;
use crate::auth::{AuthEntry, InvocationNode};
use crate::crypto::sha256;
use crate::error::{EngineError, EngineResult};
use crate::xdr::{self, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer as _, SigningKey};
use serde::{Deserialize, Serialize};

/// Envelope discriminator for transaction signature payloads
const ENVELOPE_TYPE_TX: u32 = 2;

/// Transaction validity window, Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

/// The single operation a transaction carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Invoke a contract function
    InvokeContract(InvocationNode),
    /// Revive archived storage entries named by the footprint
    RestoreFootprint,
}

impl Operation {
    pub fn to_value(&self) -> Value {
        match self {
            Operation::InvokeContract(invocation) => Value::Vec(vec![
                Value::symbol("InvokeContract"),
                invocation.to_value(),
            ]),
            Operation::RestoreFootprint => {
                Value::Vec(vec![Value::symbol("RestoreFootprint")])
            }
        }
    }
}

/// Storage keys a transaction reads and writes, as opaque encoded keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    #[serde(rename = "readOnly", default)]
    pub read_only: Vec<String>,
    #[serde(rename = "readWrite", default)]
    pub read_write: Vec<String>,
}

/// Simulated resource footprint and limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    pub footprint: Footprint,
    #[serde(default)]
    pub instructions: u64,
    #[serde(rename = "readBytes", default)]
    pub read_bytes: u64,
    #[serde(rename = "writeBytes", default)]
    pub write_bytes: u64,
}

/// An unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub source: Address,
    pub sequence: i64,
    /// Base inclusion fee plus the simulated resource fee, in stroops
    pub fee: u32,
    pub time_bounds: TimeBounds,
    pub operation: Operation,
    /// Required authorization entries, populated from simulation
    pub auth_entries: Vec<AuthEntry>,
    /// Resource footprint, populated from simulation
    pub resource_data: Option<ResourceData>,
    /// Minimum resource fee reported by simulation
    pub resource_fee: i64,
}

impl Transaction {
    /// Canonical value form; every field that affects execution is bound
    /// into the signature payload through this encoding.
    pub fn to_value(&self) -> Value {
        let resources = match &self.resource_data {
            None => Value::Void,
            Some(data) => Value::Vec(vec![
                Value::Vec(
                    data.footprint
                        .read_only
                        .iter()
                        .map(|k| Value::Str(k.clone()))
                        .collect(),
                ),
                Value::Vec(
                    data.footprint
                        .read_write
                        .iter()
                        .map(|k| Value::Str(k.clone()))
                        .collect(),
                ),
                Value::U64(data.instructions),
                Value::U64(data.read_bytes),
                Value::U64(data.write_bytes),
            ]),
        };

        Value::Vec(vec![
            Value::Address(self.source.clone()),
            Value::I64(self.sequence),
            Value::U32(self.fee),
            Value::U64(self.time_bounds.min_time),
            Value::U64(self.time_bounds.max_time),
            self.operation.to_value(),
            Value::Vec(self.auth_entries.iter().map(AuthEntry::to_value).collect()),
            resources,
            Value::I64(self.resource_fee),
        ])
    }

    /// The 32-byte hash the source account signs
    pub fn hash(&self, network_id: &[u8; 32]) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(256);
        preimage.extend_from_slice(network_id);
        preimage.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
        xdr::encode_into(&self.to_value(), &mut preimage);
        sha256(&preimage)
    }

    /// Base64 wire form of the canonical encoding
    pub fn encode_base64(&self) -> String {
        BASE64.encode(xdr::encode(&self.to_value()))
    }

    /// Apply the source account's signature, producing the immutable
    /// signed envelope
    pub fn sign(&self, key: &SigningKey, network_id: &[u8; 32]) -> EngineResult<SignedTransaction> {
        let Address::Account(source_key) = &self.source else {
            return Err(EngineError::signing_failed(
                "Source must be an account address",
            ));
        };
        if key.verifying_key().to_bytes() != *source_key {
            return Err(EngineError::signing_failed(
                "Signing key does not match the source account",
            ));
        }

        let hash = self.hash(network_id);
        let signature = key.sign(&hash);

        Ok(SignedTransaction {
            tx: self.clone(),
            public_key: *source_key,
            signature: signature.to_bytes(),
        })
    }
}

/// A transaction plus its source-account signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

impl SignedTransaction {
    /// Canonical envelope value: transaction, signer key, signature
    pub fn to_value(&self) -> Value {
        Value::Vec(vec![
            self.tx.to_value(),
            Value::Bytes(self.public_key.to_vec()),
            Value::Bytes(self.signature.to_vec()),
        ])
    }

    /// Base64 wire form for submission
    pub fn encode_base64(&self) -> String {
        BASE64.encode(xdr::encode(&self.to_value()))
    }

    /// Hex transaction id: the signed payload hash
    pub fn id(&self, network_id: &[u8; 32]) -> String {
        hex::encode(self.tx.hash(network_id))
    }
}
