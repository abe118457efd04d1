//! Authorization entries and the entry-signing merge
//!
//! Signing is append-only: each signer contributes one slot in the
//! credential's signature map, and the map re-sorts by the binary
//! encoding of each signature key on every insertion, so the final order
//! is a function of key bytes rather than call order.
//!
//! Real bearer signatures are value-encoded and wrapped a second time as
//! an opaque byte string before insertion. Placeholder and delegated
//! markers are inserted as-is and stay structurally transparent. The
//! on-chain verifier depends on this asymmetry; collapsing the two paths
//! corrupts verification.

use super::payload::build_payload_hash;
use super::signers::Signer;
use super::InvocationNode;
use crate::address::Address;
use crate::error::{EngineError, EngineResult};
use crate::xdr::{self, Value};
use std::future::Future;

/// Credentials for one authorization entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Implicit trust from the transaction's source account
    SourceAccount,
    /// A principal that must produce signatures over the payload hash
    Address(AddressCredentials),
}

/// Address-credential record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCredentials {
    pub address: Address,
    /// Per-principal anti-replay counter bound into the signed payload
    pub nonce: i64,
    /// Last ledger sequence for which the signatures remain valid
    pub signature_expiration_ledger: u32,
    /// Void until signed; a map of (signature key, signature value)
    /// entries afterwards
    pub signature: Value,
}

/// One (credentials, invocation tree) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEntry {
    pub credentials: Credentials,
    pub invocation: InvocationNode,
}

/// A fresh anti-replay nonce for a new authorization entry. The network
/// rejects a reused (principal, nonce) pair, so collisions only cost a
/// retry.
pub fn random_nonce() -> i64 {
    rand::random()
}

impl AuthEntry {
    /// Entry for a principal that signs over the payload hash
    pub fn for_address(address: Address, nonce: i64, invocation: InvocationNode) -> Self {
        Self {
            credentials: Credentials::Address(AddressCredentials {
                address,
                nonce,
                signature_expiration_ledger: 0,
                signature: Value::Void,
            }),
            invocation,
        }
    }

    /// Entry trusted implicitly through the transaction source account
    pub fn for_source_account(invocation: InvocationNode) -> Self {
        Self {
            credentials: Credentials::SourceAccount,
            invocation,
        }
    }

    /// The Address-credential principal, if any
    pub fn address(&self) -> Option<&Address> {
        match &self.credentials {
            Credentials::Address(c) => Some(&c.address),
            Credentials::SourceAccount => None,
        }
    }

    /// True while an Address credential still has an empty signature
    pub fn is_unsigned(&self) -> bool {
        match &self.credentials {
            Credentials::Address(c) => c.signature.is_void(),
            Credentials::SourceAccount => false,
        }
    }

    /// Canonical value form, used for transport and hashing
    pub fn to_value(&self) -> Value {
        let credentials = match &self.credentials {
            Credentials::SourceAccount => Value::Vec(vec![Value::symbol("SourceAccount")]),
            Credentials::Address(c) => Value::Vec(vec![
                Value::symbol("Address"),
                Value::Address(c.address.clone()),
                Value::I64(c.nonce),
                Value::U32(c.signature_expiration_ledger),
                c.signature.clone(),
            ]),
        };
        Value::Vec(vec![credentials, self.invocation.to_value()])
    }

    /// Rebuild an entry from its canonical value form. Credentials are
    /// authorization-critical, so any shape mismatch is an error, never
    /// skipped.
    pub fn from_value(value: &Value) -> EngineResult<Self> {
        let parts = value
            .as_vec()
            .filter(|v| v.len() == 2)
            .ok_or_else(|| EngineError::parse_error("Auth entry must be a 2-element sequence"))?;

        let cred_parts = parts[0]
            .as_vec()
            .ok_or_else(|| EngineError::parse_error("Auth entry credentials must be a sequence"))?;
        let tag = cred_parts
            .first()
            .and_then(Value::as_symbol)
            .ok_or_else(|| EngineError::parse_error("Auth entry credentials missing tag"))?;

        let credentials = match tag {
            "SourceAccount" => Credentials::SourceAccount,
            "Address" => {
                if cred_parts.len() != 5 {
                    return Err(EngineError::parse_error(
                        "Address credentials must have 5 elements",
                    ));
                }
                let address = cred_parts[1]
                    .as_address()
                    .ok_or_else(|| EngineError::parse_error("Address credentials missing address"))?
                    .clone();
                let Value::I64(nonce) = &cred_parts[2] else {
                    return Err(EngineError::parse_error("Address credentials missing nonce"));
                };
                let Value::U32(expiration) = &cred_parts[3] else {
                    return Err(EngineError::parse_error(
                        "Address credentials missing expiration ledger",
                    ));
                };
                Credentials::Address(AddressCredentials {
                    address,
                    nonce: *nonce,
                    signature_expiration_ledger: *expiration,
                    signature: cred_parts[4].clone(),
                })
            }
            other => {
                return Err(EngineError::parse_error(format!(
                    "Unknown credentials tag: {}",
                    other
                )))
            }
        };

        Ok(Self {
            credentials,
            invocation: InvocationNode::from_value(&parts[1])?,
        })
    }
}

/// A signer's contribution to an entry's signature map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureValue {
    /// A real bearer signature record; encoded and wrapped as an opaque
    /// byte string on insertion
    Bearer(Value),
    /// A placeholder or delegated marker; inserted structurally as-is
    Transparent(Value),
}

/// Merge one signer's signature into an entry's credential record.
///
/// The entry's credentials must be the Address variant. The signature map
/// re-sorts across all signers collected so far; signing again with the
/// same key replaces that signer's slot.
pub fn sign_auth_entry(
    entry: &AuthEntry,
    signer: &Signer,
    signature: SignatureValue,
    expiration_ledger: u32,
) -> EngineResult<AuthEntry> {
    let Credentials::Address(creds) = &entry.credentials else {
        return Err(EngineError::signing_failed(
            "Only Address credentials can be signed",
        ));
    };

    let key = signer.signature_key();
    let value = match signature {
        SignatureValue::Bearer(inner) => Value::Bytes(xdr::encode(&inner)),
        SignatureValue::Transparent(inner) => inner,
    };

    let mut entries: Vec<(Value, Value)> = match &creds.signature {
        Value::Void => Vec::new(),
        Value::Map(existing) => existing.clone(),
        _ => {
            return Err(EngineError::signing_failed(
                "Credential signature is neither empty nor a signature map",
            ))
        }
    };

    let key_bytes = xdr::encode(&key);
    entries.retain(|(existing_key, _)| xdr::encode(existing_key) != key_bytes);
    entries.push((key, value));
    entries.sort_by(|(a, _), (b, _)| xdr::encode(a).cmp(&xdr::encode(b)));

    let mut signed = entry.clone();
    let Credentials::Address(creds) = &mut signed.credentials else {
        unreachable!("credentials variant checked above");
    };
    creds.signature_expiration_ledger = expiration_ledger;
    creds.signature = Value::Map(entries);
    Ok(signed)
}

/// Obtain a bearer signature asynchronously and merge it.
///
/// The payload hash is built first, the callback is awaited to
/// completion, and only then is the signature map touched; an aborted
/// callback leaves the entry untouched.
pub async fn sign_auth_entry_with<F, Fut>(
    entry: &AuthEntry,
    signer: &Signer,
    expiration_ledger: u32,
    network_id: &[u8; 32],
    sign: F,
) -> EngineResult<AuthEntry>
where
    F: FnOnce([u8; 32]) -> Fut,
    Fut: Future<Output = EngineResult<SignatureValue>>,
{
    let payload_hash = build_payload_hash(entry, expiration_ledger, network_id)?;
    let signature = sign(payload_hash).await?;
    sign_auth_entry(entry, signer, signature, expiration_ledger)
}
