//! Index value generation.
//!
//! When an ANY request finds no free value in a bucket, or for every NEW
//! request, a new value is derived from the bucket's largest value (or from
//! a per-type starting value when the bucket does not exist yet):
//!
//! - integers count up from 1
//! - strings run an `a..z` odometer starting at `aaaa`, growing by one
//!   character when the leftmost position carries
//! - OID suffixes count the last sub-identifier up to 255, then reset it to 1
//!   and carry leftwards

use super::error::RegistryError;
use super::value::{IndexType, IndexValue};
use crate::oid::Oid;

/// Starting value for string-typed buckets
pub const INITIAL_STRING_INDEX: &[u8] = b"aaaa";

/// Largest sub-identifier produced before carrying into the previous position
pub const OID_SUBID_CEILING: u32 = 255;

/// Space available for a default OID starting value
const OID_INITIAL_BUDGET_BYTES: usize = 40;

/// Length of the fallback OID starting value `1.1.1.1`
const OID_FALLBACK_LEN: usize = 4;

/// Leading sub-identifier that lets a full carry grow the suffix
const OID_GROWTH_MARKER: u32 = 2;

/// First value of a brand-new bucket
pub fn initial_value(index_type: IndexType, prefix: &Oid) -> Result<IndexValue, RegistryError> {
    match index_type {
        IndexType::Integer => Ok(IndexValue::Integer(1)),
        IndexType::OctetString => Ok(IndexValue::OctetString(INITIAL_STRING_INDEX.to_vec())),
        IndexType::ObjectId => Ok(IndexValue::ObjectId(initial_object_id(prefix))),
        other => Err(RegistryError::UnsupportedType(other.to_string())),
    }
}

/// Value following `previous` in its type's generation order
pub fn next_value(previous: &IndexValue, prefix: &Oid) -> Result<IndexValue, RegistryError> {
    match previous {
        IndexValue::Integer(value) => value
            .checked_add(1)
            .map(IndexValue::Integer)
            .ok_or_else(|| exhausted(prefix, "integer index space is exhausted")),
        IndexValue::OctetString(bytes) => Ok(IndexValue::OctetString(next_string(bytes))),
        IndexValue::ObjectId(subids) => next_object_id(subids)
            .map(IndexValue::ObjectId)
            .ok_or_else(|| exhausted(prefix, "OID index space is exhausted")),
    }
}

fn exhausted(prefix: &Oid, reason: &str) -> RegistryError {
    RegistryError::AllocationFailed {
        prefix: prefix.clone(),
        reason: reason.to_string(),
    }
}

fn initial_object_id(prefix: &Oid) -> Vec<u32> {
    let subid_size = std::mem::size_of::<u32>();
    if (prefix.len() + 1) * subid_size <= OID_INITIAL_BUDGET_BYTES {
        let mut subids = prefix.as_slice().to_vec();
        subids.push(1);
        subids
    } else {
        let len = (OID_INITIAL_BUDGET_BYTES / subid_size).min(OID_FALLBACK_LEN);
        vec![1; len]
    }
}

/// Increment a string as a base-26 counter over `a..z`.
///
/// Only the rightmost position is incremented. A position at `z` wraps to
/// `a` and carries left; a carry out of the first position prepends an `a`,
/// so `zzzz` is followed by `aaaaa`. Other bytes count up by one, except
/// 0xff which has no successor and carries like `z`.
pub fn next_string(previous: &[u8]) -> Vec<u8> {
    let mut next = previous.to_vec();
    let mut pos = next.len();
    loop {
        if pos == 0 {
            next.insert(0, b'a');
            break;
        }
        pos -= 1;
        match next[pos] {
            b'z' | u8::MAX => next[pos] = b'a',
            byte => {
                next[pos] = byte + 1;
                break;
            }
        }
    }
    next
}

/// Increment an OID suffix, carrying past 255.
///
/// A sub-identifier at 255 resets to 1 and carries into its left neighbour.
/// The first sub-identifier is special: when a carry arrives there while it
/// holds 2, it is reset to 1 and a trailing 1 is appended instead, so
/// `2.255.255` becomes `1.1.1.1`. A carry out of a first sub-identifier of
/// 255 has nowhere to go and yields `None`.
pub fn next_object_id(previous: &[u32]) -> Option<Vec<u32>> {
    let mut next = previous.to_vec();
    if next.is_empty() {
        return Some(vec![1]);
    }

    let mut pos = next.len() - 1;
    while next[pos] == OID_SUBID_CEILING {
        next[pos] = 1;
        if pos == 0 {
            return None;
        }
        pos -= 1;
        if pos == 0 && next[0] == OID_GROWTH_MARKER {
            next[0] = 1;
            next.push(1);
            return Some(next);
        }
    }
    next[pos] = next[pos].checked_add(1)?;
    Some(next)
}
