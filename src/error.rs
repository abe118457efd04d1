//! Unified error types for the assembly engine
//!
//! All errors flow through this module for consistent handling.
//! Parsing of advisory data (unknown on-chain rule kinds) skips bad
//! entries instead of failing; authorization-critical fields never do.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all engine operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn signer_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignerInvalid, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionSigningFailed, msg)
    }

    pub fn simulation_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SimulationFailed, msg)
    }

    pub fn restore_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RestoreFailed, msg)
    }

    pub fn multiple_signers_required(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MultipleSignersRequired, msg)
    }

    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn transaction_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors: surfaced immediately, never retried
    InvalidInput,
    InvalidAddress,

    // Signing errors
    SignerInvalid,
    TransactionSigningFailed,

    // Simulation / assembly errors
    SimulationFailed,
    RestoreFailed,

    // Multi-party: additional non-account signers still required; callers
    // branch into a cooperative-signing flow on this code
    MultipleSignersRequired,

    // Network errors
    NetworkError,
    Timeout,
    TransactionFailed,

    // Parse errors
    ParseError,
    JsonError,
    HexError,
    XdrError,

    // Internal
    Internal,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// Conversions from common error types

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for EngineError {
    fn from(e: hex::FromHexError) -> Self {
        EngineError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EngineError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            EngineError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            EngineError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<base64::DecodeError> for EngineError {
    fn from(e: base64::DecodeError) -> Self {
        EngineError::new(ErrorCode::ParseError, format!("Base64 error: {}", e))
    }
}
