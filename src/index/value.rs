//! Index value types.
//!
//! An index value is the per-row suffix appended to a table prefix. Three
//! SNMP syntaxes can be allocated (INTEGER, OCTET STRING and OBJECT
//! IDENTIFIER); the other SNMP syntaxes are named here so that requests for
//! them can be rejected with a typed error instead of being unrepresentable.

use super::error::RegistryError;
use crate::oid::format_oid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ASN.1 tag for INTEGER
pub const ASN_INTEGER: u8 = 0x02;
/// ASN.1 tag for OCTET STRING
pub const ASN_OCTET_STR: u8 = 0x04;
/// ASN.1 tag for NULL
pub const ASN_NULL: u8 = 0x05;
/// ASN.1 tag for OBJECT IDENTIFIER
pub const ASN_OBJECT_ID: u8 = 0x06;
/// SNMP application tags
pub const ASN_IPADDRESS: u8 = 0x40;
pub const ASN_COUNTER: u8 = 0x41;
pub const ASN_GAUGE: u8 = 0x42;
pub const ASN_TIMETICKS: u8 = 0x43;
pub const ASN_OPAQUE: u8 = 0x44;
pub const ASN_COUNTER64: u8 = 0x46;

/// SNMP value syntax of an index request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Integer,
    OctetString,
    ObjectId,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
    Null,
}

impl IndexType {
    /// Map an ASN.1/SNMP type tag onto an index type
    pub fn from_asn_tag(tag: u8) -> Option<IndexType> {
        match tag {
            ASN_INTEGER => Some(IndexType::Integer),
            ASN_OCTET_STR => Some(IndexType::OctetString),
            ASN_NULL => Some(IndexType::Null),
            ASN_OBJECT_ID => Some(IndexType::ObjectId),
            ASN_IPADDRESS => Some(IndexType::IpAddress),
            ASN_COUNTER => Some(IndexType::Counter32),
            ASN_GAUGE => Some(IndexType::Gauge32),
            ASN_TIMETICKS => Some(IndexType::TimeTicks),
            ASN_OPAQUE => Some(IndexType::Opaque),
            ASN_COUNTER64 => Some(IndexType::Counter64),
            _ => None,
        }
    }

    pub fn asn_tag(&self) -> u8 {
        match self {
            IndexType::Integer => ASN_INTEGER,
            IndexType::OctetString => ASN_OCTET_STR,
            IndexType::ObjectId => ASN_OBJECT_ID,
            IndexType::IpAddress => ASN_IPADDRESS,
            IndexType::Counter32 => ASN_COUNTER,
            IndexType::Gauge32 => ASN_GAUGE,
            IndexType::TimeTicks => ASN_TIMETICKS,
            IndexType::Opaque => ASN_OPAQUE,
            IndexType::Counter64 => ASN_COUNTER64,
            IndexType::Null => ASN_NULL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Integer => "integer",
            IndexType::OctetString => "string",
            IndexType::ObjectId => "oid",
            IndexType::IpAddress => "ip_address",
            IndexType::Counter32 => "counter32",
            IndexType::Gauge32 => "gauge32",
            IndexType::TimeTicks => "timeticks",
            IndexType::Opaque => "opaque",
            IndexType::Counter64 => "counter64",
            IndexType::Null => "null",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(IndexType::Integer),
            "string" | "octet_string" => Ok(IndexType::OctetString),
            "oid" | "object_id" => Ok(IndexType::ObjectId),
            "ip_address" | "ipaddress" => Ok(IndexType::IpAddress),
            "counter32" | "counter" => Ok(IndexType::Counter32),
            "gauge32" | "gauge" => Ok(IndexType::Gauge32),
            "timeticks" => Ok(IndexType::TimeTicks),
            "opaque" => Ok(IndexType::Opaque),
            "counter64" => Ok(IndexType::Counter64),
            "null" => Ok(IndexType::Null),
            other => Err(format!("Unknown index type: {}", other)),
        }
    }
}

/// A concrete index value.
///
/// Values of the same variant order by payload: integers numerically,
/// strings bytewise, OID suffixes by sub-identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(Vec<u32>),
}

impl IndexValue {
    pub fn index_type(&self) -> IndexType {
        match self {
            IndexValue::Integer(_) => IndexType::Integer,
            IndexValue::OctetString(_) => IndexType::OctetString,
            IndexValue::ObjectId(_) => IndexType::ObjectId,
        }
    }

    pub fn string(text: &str) -> Self {
        IndexValue::OctetString(text.as_bytes().to_vec())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            IndexValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            IndexValue::OctetString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_subids(&self) -> Option<&[u32]> {
        match self {
            IndexValue::ObjectId(subids) => Some(subids),
            _ => None,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Integer(value) => write!(f, "{}", value),
            IndexValue::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            IndexValue::ObjectId(subids) => f.write_str(&format_oid(subids)),
        }
    }
}

/// How a registration picks its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Allocate exactly the requested value
    Exact,
    /// Reuse a free value or generate the next one
    Any,
    /// Generate a value past the largest one, ignoring free values
    New,
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationMode::Exact => "exact",
            AllocationMode::Any => "any",
            AllocationMode::New => "new",
        };
        f.write_str(name)
    }
}

/// What a caller asks `register` for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRequest {
    /// This value and no other
    Exact(IndexValue),
    /// Any unused value of the given type
    Any(IndexType),
    /// A value never handed out before under the prefix
    New(IndexType),
}

impl IndexRequest {
    pub fn mode(&self) -> AllocationMode {
        match self {
            IndexRequest::Exact(_) => AllocationMode::Exact,
            IndexRequest::Any(_) => AllocationMode::Any,
            IndexRequest::New(_) => AllocationMode::New,
        }
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            IndexRequest::Exact(value) => value.index_type(),
            IndexRequest::Any(index_type) | IndexRequest::New(index_type) => *index_type,
        }
    }

    /// Build an ANY request from a raw ASN.1 tag
    pub fn any_of_tag(tag: u8) -> Result<IndexRequest, RegistryError> {
        Self::generated_of_tag(tag, IndexRequest::Any)
    }

    /// Build a NEW request from a raw ASN.1 tag
    pub fn new_of_tag(tag: u8) -> Result<IndexRequest, RegistryError> {
        Self::generated_of_tag(tag, IndexRequest::New)
    }

    fn generated_of_tag(
        tag: u8,
        build: fn(IndexType) -> IndexRequest,
    ) -> Result<IndexRequest, RegistryError> {
        IndexType::from_asn_tag(tag)
            .map(build)
            .ok_or_else(|| RegistryError::UnsupportedType(format!("tag 0x{:02x}", tag)))
    }
}

impl From<IndexValue> for IndexRequest {
    fn from(value: IndexValue) -> Self {
        IndexRequest::Exact(value)
    }
}

/// Opaque identity of the session an index is held for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}
