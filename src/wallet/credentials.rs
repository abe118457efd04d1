//! Stored credential registry
//!
//! Tracks WebAuthn credentials registered through this wallet and the
//! smart-wallet contract each one controls. A credential is Pending
//! between registration and the deployment transaction reaching a
//! terminal status, then Deployed or Failed. The registry is
//! process-local; persistence belongs to the embedding application.

use crate::address::Address;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Deployment lifecycle of a stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// Registered; deployment not yet confirmed
    Pending,
    /// Smart-wallet contract confirmed on-chain
    Deployed,
    /// Deployment transaction reached a failed terminal status
    Failed,
}

/// One registered credential and the wallet contract it controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Raw credential id from the authenticator
    pub credential_id: Vec<u8>,
    /// Uncompressed secp256r1 public key, 65 bytes
    pub public_key: Vec<u8>,
    /// Smart-wallet contract address, set once deployed
    pub contract_address: Option<Address>,
    pub status: CredentialStatus,
    /// Failure detail when status is Failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub nickname: Option<String>,
    /// The wallet's default signing credential
    pub is_primary: bool,
}

lazy_static::lazy_static! {
    static ref CREDENTIALS: Mutex<HashMap<String, StoredCredential>> = Mutex::new(HashMap::new());
}

fn registry_key(credential_id: &[u8]) -> String {
    hex::encode(credential_id)
}

/// Register a fresh credential in the Pending state. The first
/// credential registered becomes primary.
pub fn register_credential(
    credential_id: &[u8],
    public_key: &[u8],
    nickname: Option<String>,
) -> EngineResult<StoredCredential> {
    if credential_id.is_empty() {
        return Err(EngineError::invalid_input("Credential id must not be empty"));
    }
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(EngineError::invalid_input(
            "Public key must be 65 bytes in uncompressed form",
        ));
    }

    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    let key = registry_key(credential_id);
    if registry.contains_key(&key) {
        return Err(EngineError::invalid_input("Credential is already registered"));
    }

    let credential = StoredCredential {
        credential_id: credential_id.to_vec(),
        public_key: public_key.to_vec(),
        contract_address: None,
        status: CredentialStatus::Pending,
        error: None,
        created_at: Utc::now(),
        last_used_at: None,
        nickname,
        is_primary: registry.is_empty(),
    };

    registry.insert(key, credential.clone());
    Ok(credential)
}

/// Record a confirmed deployment, attaching the wallet contract address
pub fn mark_credential_deployed(
    credential_id: &[u8],
    contract_address: Address,
) -> EngineResult<()> {
    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    let credential = registry
        .get_mut(&registry_key(credential_id))
        .ok_or_else(|| EngineError::invalid_input("Unknown credential"))?;

    credential.status = CredentialStatus::Deployed;
    credential.contract_address = Some(contract_address);
    credential.error = None;
    Ok(())
}

/// Record a failed deployment with its error detail
pub fn mark_credential_failed(credential_id: &[u8], error: impl Into<String>) -> EngineResult<()> {
    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    let credential = registry
        .get_mut(&registry_key(credential_id))
        .ok_or_else(|| EngineError::invalid_input("Unknown credential"))?;

    credential.status = CredentialStatus::Failed;
    credential.error = Some(error.into());
    Ok(())
}

/// Make one credential primary, clearing the flag on all others
pub fn set_primary_credential(credential_id: &[u8]) -> EngineResult<()> {
    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    let key = registry_key(credential_id);
    if !registry.contains_key(&key) {
        return Err(EngineError::invalid_input("Unknown credential"));
    }

    for (existing_key, credential) in registry.iter_mut() {
        credential.is_primary = *existing_key == key;
    }
    Ok(())
}

/// Stamp a credential's last-used time
pub fn touch_credential(credential_id: &[u8]) -> EngineResult<()> {
    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    let credential = registry
        .get_mut(&registry_key(credential_id))
        .ok_or_else(|| EngineError::invalid_input("Unknown credential"))?;

    credential.last_used_at = Some(Utc::now());
    Ok(())
}

pub fn get_credential(credential_id: &[u8]) -> Option<StoredCredential> {
    CREDENTIALS
        .lock()
        .ok()?
        .get(&registry_key(credential_id))
        .cloned()
}

/// All stored credentials, newest first
pub fn list_credentials() -> Vec<StoredCredential> {
    let Ok(registry) = CREDENTIALS.lock() else {
        return Vec::new();
    };
    let mut credentials: Vec<StoredCredential> = registry.values().cloned().collect();
    credentials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    credentials
}

pub fn delete_credential(credential_id: &[u8]) -> EngineResult<()> {
    let mut registry = CREDENTIALS
        .lock()
        .map_err(|_| EngineError::internal("Lock failed"))?;

    registry
        .remove(&registry_key(credential_id))
        .ok_or_else(|| EngineError::invalid_input("Unknown credential"))?;
    Ok(())
}
