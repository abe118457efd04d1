//! RPC collaborator
//!
//! The network surface the assembler suspends on: simulate, submit,
//! status polling, account lookup, and latest-ledger lookup. `HttpRpc`
//! speaks JSON-RPC 2.0 over HTTP; tests script a mock implementation of
//! the same trait.

use crate::auth::AuthEntry;
use crate::error::{EngineError, EngineResult};
use crate::tx::{ResourceData, SignedTransaction, Transaction};
use crate::utils::logging;
use crate::xdr::{self, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal and non-terminal transaction states reported by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    NotFound,
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    /// True once the network will not change its answer anymore
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Failed)
    }
}

/// Typed simulation response
#[derive(Debug, Clone, Default)]
pub struct SimulateResponse {
    pub error: Option<String>,
    pub resource_data: Option<ResourceData>,
    pub min_resource_fee: i64,
    pub auth: Vec<AuthEntry>,
    pub return_value: Option<Value>,
    pub restore_preamble: Option<RestorePreamble>,
    pub latest_ledger: u32,
}

/// Restore hint attached to a simulation that found archived state
#[derive(Debug, Clone)]
pub struct RestorePreamble {
    pub resource_data: ResourceData,
    pub min_resource_fee: i64,
}

/// Immediate submission outcome
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    pub id: String,
    pub status: String,
    pub error: Option<String>,
}

/// One status poll answer
#[derive(Debug, Clone)]
pub struct PollResponse {
    pub status: TxStatus,
    pub return_value: Option<Value>,
    pub error: Option<String>,
}

/// Account record
#[derive(Debug, Clone)]
pub struct AccountResponse {
    pub id: String,
    pub sequence: i64,
}

/// Latest closed ledger
#[derive(Debug, Clone, Copy)]
pub struct LatestLedgerResponse {
    pub sequence: u32,
}

/// The network round-trips the assembler suspends on
#[allow(async_fn_in_trait)]
pub trait LedgerRpc {
    async fn simulate(&self, tx: &Transaction) -> EngineResult<SimulateResponse>;
    async fn submit(&self, tx: &SignedTransaction) -> EngineResult<SubmitResponse>;
    async fn poll_status(&self, id: &str) -> EngineResult<PollResponse>;
    async fn get_account(&self, account_id: &str) -> EngineResult<AccountResponse>;
    async fn get_latest_ledger(&self) -> EngineResult<LatestLedgerResponse>;
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// JSON-RPC 2.0 client over HTTP
pub struct HttpRpc {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct RpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn send_request<P: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> EngineResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        logging::debug("rpc", "request").field("method", method).emit();

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::network_error(format!("RPC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::network_error(format!(
                "RPC returned status {}",
                response.status()
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| EngineError::parse_error(format!("Failed to parse RPC response: {}", e)))?;

        if let Some(error) = parsed.error {
            return Err(EngineError::network_error(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        parsed
            .result
            .ok_or_else(|| EngineError::network_error("RPC response missing result"))
    }
}

// Raw wire shapes, converted into the typed responses above

#[derive(Debug, Serialize)]
struct TransactionParam {
    transaction: String,
}

#[derive(Debug, Serialize)]
struct HashParam {
    hash: String,
}

#[derive(Debug, Serialize)]
struct AddressParam {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulateResponse {
    error: Option<String>,
    transaction_data: Option<ResourceData>,
    min_resource_fee: Option<String>,
    #[serde(default)]
    results: Vec<RawSimulateResult>,
    restore_preamble: Option<RawRestorePreamble>,
    #[serde(default)]
    latest_ledger: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulateResult {
    return_value: Option<String>,
    #[serde(default)]
    auth: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRestorePreamble {
    transaction_data: ResourceData,
    min_resource_fee: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubmitResponse {
    hash: String,
    status: String,
    error_result: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPollResponse {
    status: TxStatus,
    return_value: Option<String>,
    result_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAccountResponse {
    id: String,
    sequence: String,
}

#[derive(Debug, Deserialize)]
struct RawLatestLedgerResponse {
    sequence: u32,
}

fn parse_fee(raw: Option<&str>) -> EngineResult<i64> {
    match raw {
        None => Ok(0),
        Some(s) => s
            .parse::<i64>()
            .map_err(|e| EngineError::parse_error(format!("Invalid resource fee: {}", e))),
    }
}

fn decode_value_b64(raw: &str) -> EngineResult<Value> {
    let bytes = BASE64.decode(raw)?;
    Ok(xdr::decode(&bytes)?)
}

impl LedgerRpc for HttpRpc {
    async fn simulate(&self, tx: &Transaction) -> EngineResult<SimulateResponse> {
        let raw: RawSimulateResponse = self
            .send_request(
                "simulateTransaction",
                TransactionParam { transaction: tx.encode_base64() },
            )
            .await?;

        let mut auth = Vec::new();
        let mut return_value = None;
        if let Some(result) = raw.results.first() {
            for encoded in &result.auth {
                // Auth entries are authorization-critical; malformed
                // entries fail the simulation rather than being skipped
                auth.push(AuthEntry::from_value(&decode_value_b64(encoded)?)?);
            }
            if let Some(encoded) = &result.return_value {
                return_value = Some(decode_value_b64(encoded)?);
            }
        }

        let restore_preamble = match raw.restore_preamble {
            None => None,
            Some(preamble) => Some(RestorePreamble {
                min_resource_fee: parse_fee(Some(&preamble.min_resource_fee))?,
                resource_data: preamble.transaction_data,
            }),
        };

        Ok(SimulateResponse {
            error: raw.error,
            resource_data: raw.transaction_data,
            min_resource_fee: parse_fee(raw.min_resource_fee.as_deref())?,
            auth,
            return_value,
            restore_preamble,
            latest_ledger: raw.latest_ledger,
        })
    }

    async fn submit(&self, tx: &SignedTransaction) -> EngineResult<SubmitResponse> {
        let raw: RawSubmitResponse = self
            .send_request(
                "sendTransaction",
                TransactionParam { transaction: tx.encode_base64() },
            )
            .await?;

        Ok(SubmitResponse {
            id: raw.hash,
            status: raw.status,
            error: raw.error_result,
        })
    }

    async fn poll_status(&self, id: &str) -> EngineResult<PollResponse> {
        let raw: RawPollResponse = self
            .send_request("getTransaction", HashParam { hash: id.to_string() })
            .await?;

        let return_value = match &raw.return_value {
            None => None,
            Some(encoded) => Some(decode_value_b64(encoded)?),
        };

        Ok(PollResponse {
            status: raw.status,
            return_value,
            error: raw.result_error,
        })
    }

    async fn get_account(&self, account_id: &str) -> EngineResult<AccountResponse> {
        let raw: RawAccountResponse = self
            .send_request("getAccount", AddressParam { address: account_id.to_string() })
            .await?;

        let sequence = raw
            .sequence
            .parse::<i64>()
            .map_err(|e| EngineError::parse_error(format!("Invalid sequence number: {}", e)))?;

        Ok(AccountResponse { id: raw.id, sequence })
    }

    async fn get_latest_ledger(&self) -> EngineResult<LatestLedgerResponse> {
        let raw: RawLatestLedgerResponse = self.send_request("getLatestLedger", ()).await?;
        Ok(LatestLedgerResponse { sequence: raw.sequence })
    }
}
