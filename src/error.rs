//! Error types for the discovery and registration workflow

use crate::models::OltId;
use crate::workflow::Phase;
use thiserror::Error;

/// Failure of a call into the provisioning service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection refused, DNS failure, timeout, etc.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response, carrying the service's `detail` message when it sent one.
    #[error("Service error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Deserialization error: {0}")]
    Decode(String),
}

/// Caller-side precondition failures, raised before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no OLT selected")]
    MissingOlt,

    #[error("no registration profile selected")]
    MissingProfile,

    #[error("no ONT selected for registration")]
    EmptySelection,

    #[error("discovered devices belong to OLT {scanned}, not {requested}")]
    OltMismatch { scanned: OltId, requested: OltId },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("A discovery scan is already in progress")]
    ScanInProgress,

    #[error("A registration batch is already in progress")]
    RegisterInProgress,

    #[error("Cannot {action} while {phase}")]
    InvalidState { action: &'static str, phase: Phase },

    #[error("Position {position} is out of range ({len} devices discovered)")]
    PositionOutOfRange { position: usize, len: usize },

    /// Both the live scan and the simulated fallback failed.
    #[error("Discovery failed: live scan: {live}; simulated scan: {simulated}")]
    ScanFailed {
        live: ServiceError,
        simulated: ServiceError,
    },

    /// No result came back for the batch. After a transport timeout the
    /// service may still have provisioned some or all of the entries.
    #[error("Registration batch submission failed: {0}")]
    Submission(#[source] ServiceError),

    #[error("Registration response does not match the submitted entries: {0}")]
    MisalignedResponse(String),
}

impl WorkflowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the operator can simply issue the same action again.
    pub fn is_retryable(&self) -> bool {
        match self {
            // a timed-out batch may be half provisioned, only a refused connection is safe
            Self::Submission(ServiceError::Transport(e)) => e.is_connect() && !e.is_timeout(),
            Self::Submission(ServiceError::Unavailable(_)) => true,
            Self::ScanInProgress | Self::RegisterInProgress => true,
            _ => false,
        }
    }
}
