//! Index registry errors.

use super::value::{IndexType, IndexValue, SessionId};
use crate::oid::Oid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors returned by index registration, release and removal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Index {value} is not allocated under {prefix}")]
    NotAllocated { prefix: Oid, value: IndexValue },

    #[error("Prefix {prefix} holds {registered} indexes, request was for {requested}")]
    WrongType {
        prefix: Oid,
        registered: IndexType,
        requested: IndexType,
    },

    #[error("Index {value} is already registered under {prefix}")]
    DuplicateValue { prefix: Oid, value: IndexValue },

    #[error(
        "Index {value} under {prefix} is held by {}, not {}",
        display_owner(.holder),
        display_owner(.requester)
    )]
    WrongOwner {
        prefix: Oid,
        value: IndexValue,
        holder: Option<SessionId>,
        requester: Option<SessionId>,
    },

    #[error("Index type {0} is not supported")]
    UnsupportedType(String),

    #[error("Could not allocate an index under {prefix}: {reason}")]
    AllocationFailed { prefix: Oid, reason: String },

    #[error("Delegation gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

fn display_owner(owner: &Option<SessionId>) -> String {
    match owner {
        Some(session) => session.to_string(),
        None => "nobody".to_string(),
    }
}

/// Discriminant of a `RegistryError`, used to match expected outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotAllocated,
    WrongType,
    DuplicateValue,
    WrongOwner,
    UnsupportedType,
    AllocationFailed,
    GatewayUnavailable,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotAllocated { .. } => ErrorKind::NotAllocated,
            RegistryError::WrongType { .. } => ErrorKind::WrongType,
            RegistryError::DuplicateValue { .. } => ErrorKind::DuplicateValue,
            RegistryError::WrongOwner { .. } => ErrorKind::WrongOwner,
            RegistryError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            RegistryError::AllocationFailed { .. } => ErrorKind::AllocationFailed,
            RegistryError::GatewayUnavailable(_) => ErrorKind::GatewayUnavailable,
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotAllocated => "not_allocated",
            ErrorKind::WrongType => "wrong_type",
            ErrorKind::DuplicateValue => "duplicate_value",
            ErrorKind::WrongOwner => "wrong_owner",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::AllocationFailed => "allocation_failed",
            ErrorKind::GatewayUnavailable => "gateway_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
