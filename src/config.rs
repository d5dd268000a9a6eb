use crate::index::{
    AllocationMode, ErrorKind, IndexRequest, IndexType, IndexValue, RegistryError, SessionId,
};
use crate::oid::{parse_oid, Oid};
use serde::{Deserialize, Serialize};

/// Role of the agent the operations are replayed against
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Authoritative agent with its own registry
    #[default]
    Master,
    /// Subagent forwarding every request to a master
    Subagent,
}

/// Top-level scenario configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub operations: Vec<OperationConfig>,
}

/// Shared general configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub role: AgentRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Kind of registry operation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Register,
    Release,
    Remove,
    ReleaseSession,
    Dump,
}

/// Expected result of an operation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Ok,
    NotAllocated,
    WrongType,
    DuplicateValue,
    WrongOwner,
    UnsupportedType,
    AllocationFailed,
    GatewayUnavailable,
}

impl Expectation {
    /// Whether an operation result satisfies this expectation
    pub fn is_met<T>(&self, outcome: &Result<T, RegistryError>) -> bool {
        match (self, outcome) {
            (Expectation::Ok, Ok(_)) => true,
            (Expectation::Ok, Err(_)) | (_, Ok(_)) => false,
            (expected, Err(e)) => expected.error_kind() == Some(e.kind()),
        }
    }

    fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Expectation::Ok => None,
            Expectation::NotAllocated => Some(ErrorKind::NotAllocated),
            Expectation::WrongType => Some(ErrorKind::WrongType),
            Expectation::DuplicateValue => Some(ErrorKind::DuplicateValue),
            Expectation::WrongOwner => Some(ErrorKind::WrongOwner),
            Expectation::UnsupportedType => Some(ErrorKind::UnsupportedType),
            Expectation::AllocationFailed => Some(ErrorKind::AllocationFailed),
            Expectation::GatewayUnavailable => Some(ErrorKind::GatewayUnavailable),
        }
    }
}

/// One registry operation as written in the scenario file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OperationConfig {
    pub op: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_yaml::Value>,
    /// Allocation mode of a register; defaults to exact with a value, any without
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AllocationMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<u64>,
    #[serde(default)]
    pub expect: Expectation,
}

/// Operation ready to run against an allocator
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Register {
        prefix: Oid,
        request: IndexRequest,
        owner: SessionId,
    },
    Release {
        prefix: Oid,
        value: IndexValue,
    },
    Remove {
        prefix: Oid,
        value: IndexValue,
        owner: Option<SessionId>,
    },
    ReleaseSession(SessionId),
    Dump,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.operations.is_empty() {
            return Err(ValidationError::InvalidScenario(
                "At least one operation is required".to_string(),
            ));
        }

        if let Some(level) = &self.general.log_level {
            if level.trim().is_empty() {
                return Err(ValidationError::InvalidGeneral(
                    "log_level cannot be empty".to_string(),
                ));
            }
        }

        for (position, operation) in self.operations.iter().enumerate() {
            operation.resolve(position + 1)?;
        }

        Ok(())
    }

    /// Resolve every operation in file order
    pub fn resolved_operations(&self) -> Result<Vec<(Operation, Expectation)>, ValidationError> {
        self.operations
            .iter()
            .enumerate()
            .map(|(position, operation)| {
                operation
                    .resolve(position + 1)
                    .map(|resolved| (resolved, operation.expect))
            })
            .collect()
    }
}

impl OperationConfig {
    /// Turn the written form into an `Operation`, checking that every field
    /// the operation needs is present and well-formed
    pub fn resolve(&self, position: usize) -> Result<Operation, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidOperation { position, reason };

        match self.op {
            OperationKind::Dump => Ok(Operation::Dump),
            OperationKind::ReleaseSession => {
                let session = self
                    .session
                    .ok_or_else(|| invalid("release_session requires a session".to_string()))?;
                Ok(Operation::ReleaseSession(SessionId(session)))
            }
            OperationKind::Register => {
                let prefix = self.prefix(position)?;
                let index_type = self.index_type(position)?;
                let owner = self
                    .session
                    .ok_or_else(|| invalid("register requires a session".to_string()))?;
                let request = match (self.mode, &self.value) {
                    (None | Some(AllocationMode::Exact), Some(raw)) => {
                        IndexRequest::Exact(parse_value(index_type, raw).map_err(invalid)?)
                    }
                    (Some(AllocationMode::Exact), None) => {
                        return Err(invalid("exact register requires a value".to_string()));
                    }
                    (None | Some(AllocationMode::Any), None) => IndexRequest::Any(index_type),
                    (Some(AllocationMode::New), None) => IndexRequest::New(index_type),
                    (Some(mode), Some(_)) => {
                        return Err(invalid(format!("{} register takes no value", mode)));
                    }
                };
                Ok(Operation::Register {
                    prefix,
                    request,
                    owner: SessionId(owner),
                })
            }
            OperationKind::Release | OperationKind::Remove => {
                let prefix = self.prefix(position)?;
                let index_type = self.index_type(position)?;
                let raw = self
                    .value
                    .as_ref()
                    .ok_or_else(|| invalid(format!("{:?} requires a value", self.op)))?;
                let value = parse_value(index_type, raw).map_err(invalid)?;
                if self.op == OperationKind::Release {
                    Ok(Operation::Release { prefix, value })
                } else {
                    Ok(Operation::Remove {
                        prefix,
                        value,
                        owner: self.session.map(SessionId),
                    })
                }
            }
        }
    }

    fn prefix(&self, position: usize) -> Result<Oid, ValidationError> {
        let text = self.prefix.as_deref().ok_or_else(|| ValidationError::InvalidOperation {
            position,
            reason: "prefix is required".to_string(),
        })?;
        text.parse::<Oid>().map_err(|e| ValidationError::InvalidOperation {
            position,
            reason: format!("{}", e),
        })
    }

    fn index_type(&self, position: usize) -> Result<IndexType, ValidationError> {
        let name = self.index_type.as_deref().ok_or_else(|| ValidationError::InvalidOperation {
            position,
            reason: "type is required".to_string(),
        })?;
        name.parse::<IndexType>()
            .map_err(|reason| ValidationError::InvalidOperation { position, reason })
    }
}

/// Interpret a YAML scalar as a value of the given index type
fn parse_value(index_type: IndexType, raw: &serde_yaml::Value) -> Result<IndexValue, String> {
    match index_type {
        IndexType::Integer => raw
            .as_i64()
            .map(IndexValue::Integer)
            .ok_or_else(|| format!("integer index value expected, found {:?}", raw)),
        IndexType::OctetString => match raw {
            serde_yaml::Value::String(text) => Ok(IndexValue::string(text)),
            serde_yaml::Value::Number(number) => Ok(IndexValue::string(&number.to_string())),
            other => Err(format!("string index value expected, found {:?}", other)),
        },
        IndexType::ObjectId => {
            let text = raw
                .as_str()
                .ok_or_else(|| format!("dotted OID index value expected, found {:?}", raw))?;
            parse_oid(text)
                .map(IndexValue::ObjectId)
                .map_err(|e| e.to_string())
        }
        other => Err(format!("{} values cannot be used as indexes", other)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("Invalid operation #{position}: {reason}")]
    InvalidOperation { position: usize, reason: String },
}
