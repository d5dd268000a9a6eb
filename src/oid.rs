//! Object identifier helpers.
//!
//! Table prefixes and OID-typed index values are sequences of
//! sub-identifiers. This module provides the owned `Oid` type used as the
//! registry's prefix key, dotted-notation parsing and rendering, and the
//! comparison primitive the registry orders buckets by.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing dotted OID text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OidParseError {
    #[error("OID text is empty")]
    Empty,

    #[error("Invalid sub-identifier '{component}' in OID '{text}'")]
    InvalidComponent { text: String, component: String },
}

/// Compare two sub-identifier sequences.
///
/// Sequences are compared element by element; when one is a prefix of the
/// other, the shorter one sorts first.
pub fn compare_oids(a: &[u32], b: &[u32]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Render a sub-identifier sequence in dotted notation (e.g. `1.3.6.1`)
pub fn format_oid(subids: &[u32]) -> String {
    subids
        .iter()
        .map(|subid| subid.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse dotted notation into sub-identifiers.
///
/// A single leading dot is accepted (`.1.3.6.1`), as printed by most SNMP
/// tooling.
pub fn parse_oid(text: &str) -> Result<Vec<u32>, OidParseError> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if body.is_empty() {
        return Err(OidParseError::Empty);
    }

    body.split('.')
        .map(|component| {
            component
                .parse::<u32>()
                .map_err(|_| OidParseError::InvalidComponent {
                    text: text.to_string(),
                    component: component.to_string(),
                })
        })
        .collect()
}

/// An owned object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(subids: Vec<u32>) -> Self {
        Oid(subids)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new OID with `subid` appended
    pub fn child(&self, subid: u32) -> Oid {
        let mut subids = self.0.clone();
        subids.push(subid);
        Oid(subids)
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_oids(&self.0, &other.0)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_oid(&self.0))
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_oid(s).map(Oid)
    }
}

impl TryFrom<String> for Oid {
    type Error = OidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.to_string()
    }
}

impl From<Vec<u32>> for Oid {
    fn from(subids: Vec<u32>) -> Self {
        Oid(subids)
    }
}

impl From<&[u32]> for Oid {
    fn from(subids: &[u32]) -> Self {
        Oid(subids.to_vec())
    }
}
