//! Authorization-entry signing protocol
//!
//! An authorization entry pairs one credential record with one invocation
//! tree and proves a principal's consent to that subtree. This module
//! owns the invocation tree, the signer model, the canonical payload
//! preimage, the entry-signing merge logic, and the directory of signers
//! declared by on-chain rules.

pub mod directory;
pub mod entry;
pub mod payload;
pub mod signers;

pub use directory::{parse_signers, SignerDescriptor};
pub use entry::{random_nonce, sign_auth_entry, sign_auth_entry_with, AddressCredentials, AuthEntry, Credentials, SignatureValue};
pub use payload::{build_payload_hash, build_payload_preimage};
pub use signers::{derive_credential_contract_address, ExternalSigner, Signer};

use crate::address::Address;
use crate::error::{EngineError, EngineResult};
use crate::xdr::Value;

/// One node of an invocation tree: a contract call plus the nested calls
/// it authorizes. Immutable once built for a simulation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationNode {
    /// Target contract address
    pub contract: Address,
    /// Function name
    pub function: String,
    /// Ordered argument list; ordering is significant and never reordered
    pub args: Vec<Value>,
    /// Ordered sub-invocations authorized by this node
    pub sub_invocations: Vec<InvocationNode>,
}

impl InvocationNode {
    pub fn new(contract: Address, function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
            sub_invocations: Vec::new(),
        }
    }

    pub fn with_sub_invocation(mut self, sub: InvocationNode) -> Self {
        self.sub_invocations.push(sub);
        self
    }

    /// Canonical value-tree form, used for payload hashing and transport
    pub fn to_value(&self) -> Value {
        Value::Vec(vec![
            Value::Address(self.contract.clone()),
            Value::Symbol(self.function.clone()),
            Value::Vec(self.args.clone()),
            Value::Vec(self.sub_invocations.iter().map(|s| s.to_value()).collect()),
        ])
    }

    /// Rebuild an invocation node from its canonical value form
    pub fn from_value(value: &Value) -> EngineResult<Self> {
        let parts = value
            .as_vec()
            .filter(|v| v.len() == 4)
            .ok_or_else(|| EngineError::parse_error("Invocation node must be a 4-element sequence"))?;

        let contract = parts[0]
            .as_address()
            .ok_or_else(|| EngineError::parse_error("Invocation node missing contract address"))?
            .clone();
        let function = parts[1]
            .as_symbol()
            .ok_or_else(|| EngineError::parse_error("Invocation node missing function symbol"))?
            .to_string();
        let args = parts[2]
            .as_vec()
            .ok_or_else(|| EngineError::parse_error("Invocation node missing argument list"))?
            .to_vec();
        let subs = parts[3]
            .as_vec()
            .ok_or_else(|| EngineError::parse_error("Invocation node missing sub-invocations"))?
            .iter()
            .map(InvocationNode::from_value)
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self {
            contract,
            function,
            args,
            sub_invocations: subs,
        })
    }
}
