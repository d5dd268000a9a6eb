//! Index allocation registry.
//!
//! Allocated index values are kept per table prefix. Prefixes are held in
//! ascending OID order, and within a prefix the values are held in ascending
//! order together with the session currently holding each one. A value whose
//! holder is `None` has been released: it stays reserved in place so that a
//! later ANY request can hand it out again, and so that value generation
//! keeps counting from the largest value ever handed out.

use super::error::RegistryError;
use super::generator;
use super::value::{AllocationMode, IndexRequest, IndexType, IndexValue, SessionId};
use crate::oid::Oid;
use log::{debug, warn};
use std::collections::BTreeMap;

/// All values registered under one table prefix
#[derive(Debug, Clone)]
pub(crate) struct Bucket {
    pub(crate) index_type: IndexType,
    pub(crate) entries: BTreeMap<IndexValue, Option<SessionId>>,
}

impl Bucket {
    fn new(index_type: IndexType) -> Self {
        Bucket {
            index_type,
            entries: BTreeMap::new(),
        }
    }

    /// Hand an existing free value to `owner`, if there is one
    fn claim_free(&mut self, owner: SessionId) -> Option<IndexValue> {
        let (value, holder) = self.entries.iter_mut().find(|(_, holder)| holder.is_none())?;
        *holder = Some(owner);
        Some(value.clone())
    }

    /// Generate a value above the largest one in the bucket.
    ///
    /// Generation can wrap below existing values (string and OID carries),
    /// so the generator is stepped until it lands on an unused value.
    fn generate(&self, prefix: &Oid) -> Result<IndexValue, RegistryError> {
        let mut candidate = match self.entries.keys().next_back() {
            Some(last) => generator::next_value(last, prefix)?,
            None => generator::initial_value(self.index_type, prefix)?,
        };
        for _ in 0..=self.entries.len() {
            if !self.entries.contains_key(&candidate) {
                return Ok(candidate);
            }
            candidate = generator::next_value(&candidate, prefix)?;
        }
        Err(RegistryError::AllocationFailed {
            prefix: prefix.clone(),
            reason: "no unused value could be generated".to_string(),
        })
    }
}

/// Registry of allocated table indexes
#[derive(Debug, Default, Clone)]
pub struct IndexRegistry {
    buckets: BTreeMap<Oid, Bucket>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        IndexRegistry {
            buckets: BTreeMap::new(),
        }
    }

    /// Allocate an index value under `prefix` for `owner`.
    ///
    /// An exact request fails with `DuplicateValue` if the value is present
    /// at all, even when it is currently free. An ANY request hands out the
    /// lowest free value of the bucket, or generates a new one. A NEW request
    /// always generates past the largest value and leaves free values alone.
    pub fn register(
        &mut self,
        prefix: &Oid,
        request: IndexRequest,
        owner: SessionId,
    ) -> Result<IndexValue, RegistryError> {
        let requested = request.index_type();
        let mode = request.mode();

        if let Some(bucket) = self.buckets.get_mut(prefix) {
            if bucket.index_type != requested {
                warn!(
                    "Rejected {} index request under {}: prefix holds {} indexes",
                    requested, prefix, bucket.index_type
                );
                return Err(RegistryError::WrongType {
                    prefix: prefix.clone(),
                    registered: bucket.index_type,
                    requested,
                });
            }

            let value = match request {
                IndexRequest::Exact(value) => {
                    if bucket.entries.contains_key(&value) {
                        return Err(RegistryError::DuplicateValue {
                            prefix: prefix.clone(),
                            value,
                        });
                    }
                    value
                }
                IndexRequest::Any(_) | IndexRequest::New(_) => {
                    if mode == AllocationMode::Any {
                        if let Some(value) = bucket.claim_free(owner) {
                            debug!(
                                "Reassigned free index {} under {} to {}",
                                value, prefix, owner
                            );
                            return Ok(value);
                        }
                    }
                    bucket.generate(prefix)?
                }
            };

            bucket.entries.insert(value.clone(), Some(owner));
            debug!("Registered index {} under {} for {}", value, prefix, owner);
            return Ok(value);
        }

        let value = match request {
            IndexRequest::Exact(value) => value,
            IndexRequest::Any(index_type) | IndexRequest::New(index_type) => {
                generator::initial_value(index_type, prefix)?
            }
        };
        let mut bucket = Bucket::new(requested);
        bucket.entries.insert(value.clone(), Some(owner));
        self.buckets.insert(prefix.clone(), bucket);
        debug!("Registered index {} under new prefix {} for {}", value, prefix, owner);
        Ok(value)
    }

    /// Mark an allocated value as free, leaving it reserved in place
    pub fn release(&mut self, prefix: &Oid, value: &IndexValue) -> Result<(), RegistryError> {
        let holder = self.entry_mut(prefix, value)?;
        let previous = holder.take();
        debug!(
            "Released index {} under {} (was held by {:?})",
            value, prefix, previous
        );
        Ok(())
    }

    /// Forget a value entirely.
    ///
    /// Only the current holder may remove a value; `None` removes a value
    /// that is currently free. A prefix whose last value is removed
    /// disappears, along with the index type it was fixed to.
    pub fn remove(
        &mut self,
        prefix: &Oid,
        value: &IndexValue,
        owner: Option<SessionId>,
    ) -> Result<(), RegistryError> {
        let holder = *self.entry_mut(prefix, value)?;
        if holder != owner {
            return Err(RegistryError::WrongOwner {
                prefix: prefix.clone(),
                value: value.clone(),
                holder,
                requester: owner,
            });
        }

        if let Some(bucket) = self.buckets.get_mut(prefix) {
            bucket.entries.remove(value);
            if bucket.entries.is_empty() {
                self.buckets.remove(prefix);
                debug!("Removed last index under {}", prefix);
            }
        }
        debug!("Removed index {} under {}", value, prefix);
        Ok(())
    }

    /// Free every value held by `owner`; returns how many were released
    pub fn release_all(&mut self, owner: SessionId) -> usize {
        let mut released = 0;
        for holder in self
            .buckets
            .values_mut()
            .flat_map(|bucket| bucket.entries.values_mut())
        {
            if *holder == Some(owner) {
                *holder = None;
                released += 1;
            }
        }
        if released > 0 {
            debug!("Released {} index(es) held by {}", released, owner);
        }
        released
    }

    /// Drop every prefix and value
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Current holder of a value; `Some(None)` for a free value
    pub fn owner_of(&self, prefix: &Oid, value: &IndexValue) -> Option<Option<SessionId>> {
        self.buckets.get(prefix)?.entries.get(value).copied()
    }

    /// Index type a prefix is fixed to, if anything is registered under it
    pub fn bucket_type(&self, prefix: &Oid) -> Option<IndexType> {
        self.buckets.get(prefix).map(|bucket| bucket.index_type)
    }

    /// Values under `prefix` in ascending order, with their holders
    pub fn entries(&self, prefix: &Oid) -> Vec<(IndexValue, Option<SessionId>)> {
        self.buckets
            .get(prefix)
            .map(|bucket| {
                bucket
                    .entries
                    .iter()
                    .map(|(value, holder)| (value.clone(), *holder))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered prefixes in ascending order
    pub fn prefixes(&self) -> impl Iterator<Item = &Oid> {
        self.buckets.keys()
    }

    /// Total number of values, free or held
    pub fn len(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub(crate) fn buckets(&self) -> &BTreeMap<Oid, Bucket> {
        &self.buckets
    }

    fn entry_mut(
        &mut self,
        prefix: &Oid,
        value: &IndexValue,
    ) -> Result<&mut Option<SessionId>, RegistryError> {
        let not_allocated = || RegistryError::NotAllocated {
            prefix: prefix.clone(),
            value: value.clone(),
        };
        let bucket = self.buckets.get_mut(prefix).ok_or_else(not_allocated)?;
        if bucket.index_type != value.index_type() {
            return Err(RegistryError::WrongType {
                prefix: prefix.clone(),
                registered: bucket.index_type,
                requested: value.index_type(),
            });
        }
        bucket.entries.get_mut(value).ok_or_else(not_allocated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SessionId = SessionId(1);
    const B: SessionId = SessionId(2);

    fn oid(text: &str) -> Oid {
        text.parse().unwrap()
    }

    fn int(value: i64) -> IndexRequest {
        IndexRequest::Exact(IndexValue::Integer(value))
    }

    fn values(registry: &IndexRegistry, prefix: &Oid) -> Vec<IndexValue> {
        registry
            .entries(prefix)
            .into_iter()
            .map(|(value, _)| value)
            .collect()
    }

    #[test]
    fn test_prefixes_are_sorted() {
        let mut registry = IndexRegistry::new();
        for n in [20, 10, 40, 30] {
            registry
                .register(&oid(&format!("1.2.3.4.{}", n)), int(1), A)
                .unwrap();
        }
        let prefixes: Vec<String> = registry.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(
            prefixes,
            vec!["1.2.3.4.10", "1.2.3.4.20", "1.2.3.4.30", "1.2.3.4.40"]
        );
    }

    #[test]
    fn test_values_are_sorted_within_prefix() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.25");
        for text in ["eee", "aaa", "zzz", "mmm"] {
            registry
                .register(&table, IndexRequest::Exact(IndexValue::string(text)), A)
                .unwrap();
        }
        assert_eq!(
            values(&registry, &table),
            vec![
                IndexValue::string("aaa"),
                IndexValue::string("eee"),
                IndexValue::string("mmm"),
                IndexValue::string("zzz"),
            ]
        );
    }

    #[test]
    fn test_exact_duplicate_is_rejected() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        assert_eq!(registry.register(&table, int(10), A), Ok(IndexValue::Integer(10)));
        assert!(matches!(
            registry.register(&table, int(10), B),
            Err(RegistryError::DuplicateValue { .. })
        ));
        assert_eq!(registry.owner_of(&table, &IndexValue::Integer(10)), Some(Some(A)));
    }

    #[test]
    fn test_exact_duplicate_of_free_value_is_rejected() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        registry.register(&table, int(10), A).unwrap();
        registry.release(&table, &IndexValue::Integer(10)).unwrap();
        assert!(matches!(
            registry.register(&table, int(10), B),
            Err(RegistryError::DuplicateValue { .. })
        ));
    }

    #[test]
    fn test_any_integer_sequence() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        let any = || IndexRequest::Any(IndexType::Integer);

        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::Integer(1)));
        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::Integer(2)));
        assert_eq!(registry.register(&table, int(10), A), Ok(IndexValue::Integer(10)));
        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::Integer(11)));
        assert_eq!(registry.register(&table, int(5), A), Ok(IndexValue::Integer(5)));

        assert_eq!(
            values(&registry, &table),
            [1, 2, 5, 10, 11].map(IndexValue::Integer).to_vec()
        );
    }

    #[test]
    fn test_any_string_sequence() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.120");
        let any = || IndexRequest::Any(IndexType::OctetString);
        let exact = |text: &str| IndexRequest::Exact(IndexValue::string(text));

        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::string("aaaa")));
        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::string("aaab")));
        registry.register(&table, exact("aaaz"), A).unwrap();
        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::string("aaba")));
        registry.register(&table, exact("zzzz"), A).unwrap();
        assert_eq!(registry.register(&table, any(), A), Ok(IndexValue::string("aaaaa")));
    }

    #[test]
    fn test_generated_value_skips_existing_entries() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.120");
        let exact = |text: &str| IndexRequest::Exact(IndexValue::string(text));
        registry.register(&table, exact("aaaaa"), A).unwrap();
        registry.register(&table, exact("zzzz"), A).unwrap();

        // "zzzz" rolls over to "aaaaa", which is taken
        assert_eq!(
            registry.register(&table, IndexRequest::Any(IndexType::OctetString), A),
            Ok(IndexValue::string("aaaab"))
        );
    }

    #[test]
    fn test_any_oid_sequence() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.130");
        let any = || IndexRequest::Any(IndexType::ObjectId);
        let exact = |subids: &[u32]| IndexRequest::Exact(IndexValue::ObjectId(subids.to_vec()));

        assert_eq!(
            registry.register(&table, any(), A),
            Ok(IndexValue::ObjectId(vec![1, 2, 3, 4, 130, 1]))
        );
        assert_eq!(
            registry.register(&table, any(), A),
            Ok(IndexValue::ObjectId(vec![1, 2, 3, 4, 130, 2]))
        );
        registry.register(&table, exact(&[1, 2, 3, 4, 130, 255]), A).unwrap();
        assert_eq!(
            registry.register(&table, any(), A),
            Ok(IndexValue::ObjectId(vec![1, 2, 3, 4, 131, 1]))
        );
        registry.register(&table, exact(&[1, 2, 3, 4, 130, 100]), A).unwrap();
        assert!(matches!(
            registry.register(&table, exact(&[1, 2, 3, 4, 130, 100]), A),
            Err(RegistryError::DuplicateValue { .. })
        ));

        registry.register(&table, exact(&[2, 255, 255, 255, 255, 255]), A).unwrap();
        assert_eq!(
            registry.register(&table, any(), A),
            Ok(IndexValue::ObjectId(vec![1, 1, 1, 1, 1, 1, 1]))
        );
    }

    #[test]
    fn test_any_reuses_free_value_before_generating() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.3.6.1.2.1.2.2");
        for value in 1..=3 {
            registry.register(&table, int(value), A).unwrap();
        }
        registry.release(&table, &IndexValue::Integer(2)).unwrap();

        assert_eq!(
            registry.register(&table, IndexRequest::Any(IndexType::Integer), B),
            Ok(IndexValue::Integer(2))
        );
        assert_eq!(registry.owner_of(&table, &IndexValue::Integer(2)), Some(Some(B)));
        assert_eq!(registry.len(), 3);

        assert_eq!(
            registry.register(&table, IndexRequest::Any(IndexType::Integer), B),
            Ok(IndexValue::Integer(4))
        );
    }

    #[test]
    fn test_new_skips_free_values() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.3.6.1.2.1.2.2");
        for value in 1..=3 {
            registry.register(&table, int(value), A).unwrap();
        }
        registry.release(&table, &IndexValue::Integer(2)).unwrap();

        assert_eq!(
            registry.register(&table, IndexRequest::New(IndexType::Integer), B),
            Ok(IndexValue::Integer(4))
        );
        assert_eq!(registry.owner_of(&table, &IndexValue::Integer(2)), Some(None));
        assert_eq!(registry.len(), 4);

        // The hole is still there for the next ANY request
        assert_eq!(
            registry.register(&table, IndexRequest::Any(IndexType::Integer), B),
            Ok(IndexValue::Integer(2))
        );
    }

    #[test]
    fn test_new_on_empty_prefix_starts_from_initial_value() {
        let mut registry = IndexRegistry::new();
        let strings = oid("1.2.3.4.150");
        assert_eq!(
            registry.register(&strings, IndexRequest::New(IndexType::OctetString), A),
            Ok(IndexValue::string("aaaa"))
        );
        assert!(matches!(
            registry.register(&oid("1.2.3.4.151"), IndexRequest::New(IndexType::Opaque), A),
            Err(RegistryError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_wrong_type_leaves_registry_unchanged() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.120");
        registry
            .register(&table, IndexRequest::Exact(IndexValue::string("eth0")), A)
            .unwrap();

        assert!(matches!(
            registry.register(&table, int(1), A),
            Err(RegistryError::WrongType {
                registered: IndexType::OctetString,
                requested: IndexType::Integer,
                ..
            })
        ));
        assert!(matches!(
            registry.register(&table, IndexRequest::Any(IndexType::ObjectId), A),
            Err(RegistryError::WrongType { .. })
        ));
        assert_eq!(values(&registry, &table), vec![IndexValue::string("eth0")]);
        assert_eq!(registry.bucket_type(&table), Some(IndexType::OctetString));
    }

    #[test]
    fn test_unsupported_type() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.140");
        assert!(matches!(
            registry.register(&table, IndexRequest::Any(IndexType::IpAddress), A),
            Err(RegistryError::UnsupportedType(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_keeps_value_in_place() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        registry.register(&table, int(7), A).unwrap();

        registry.release(&table, &IndexValue::Integer(7)).unwrap();
        assert_eq!(registry.owner_of(&table, &IndexValue::Integer(7)), Some(None));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_errors() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        assert!(matches!(
            registry.release(&table, &IndexValue::Integer(1)),
            Err(RegistryError::NotAllocated { .. })
        ));

        registry.register(&table, int(1), A).unwrap();
        assert!(matches!(
            registry.release(&table, &IndexValue::Integer(2)),
            Err(RegistryError::NotAllocated { .. })
        ));
        assert!(matches!(
            registry.release(&table, &IndexValue::string("a")),
            Err(RegistryError::WrongType { .. })
        ));
    }

    #[test]
    fn test_remove_requires_holder() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        registry.register(&table, int(1), A).unwrap();

        assert!(matches!(
            registry.remove(&table, &IndexValue::Integer(1), Some(B)),
            Err(RegistryError::WrongOwner { holder: Some(A), requester: Some(B), .. })
        ));
        assert!(matches!(
            registry.remove(&table, &IndexValue::Integer(1), None),
            Err(RegistryError::WrongOwner { .. })
        ));
        registry.remove(&table, &IndexValue::Integer(1), Some(A)).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_free_value() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        registry.register(&table, int(1), A).unwrap();
        registry.register(&table, int(2), A).unwrap();
        registry.release(&table, &IndexValue::Integer(2)).unwrap();

        registry.remove(&table, &IndexValue::Integer(2), None).unwrap();
        assert_eq!(values(&registry, &table), vec![IndexValue::Integer(1)]);
    }

    #[test]
    fn test_remove_middle_and_first_values() {
        let mut registry = IndexRegistry::new();
        let before = oid("1.2.3.4.5");
        let table = oid("1.2.3.4.6");
        registry.register(&before, int(1), A).unwrap();
        registry.register(&before, int(2), A).unwrap();
        for value in 1..=3 {
            registry.register(&table, int(value), A).unwrap();
        }

        registry.remove(&table, &IndexValue::Integer(2), Some(A)).unwrap();
        assert_eq!(
            values(&registry, &table),
            vec![IndexValue::Integer(1), IndexValue::Integer(3)]
        );

        registry.remove(&table, &IndexValue::Integer(1), Some(A)).unwrap();
        assert_eq!(values(&registry, &table), vec![IndexValue::Integer(3)]);

        let prefixes: Vec<&Oid> = registry.prefixes().collect();
        assert_eq!(prefixes, vec![&before, &table]);
        assert_eq!(
            values(&registry, &before),
            vec![IndexValue::Integer(1), IndexValue::Integer(2)]
        );
    }

    #[test]
    fn test_emptied_prefix_forgets_its_type() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.2.3.4.110");
        registry.register(&table, int(1), A).unwrap();
        registry.remove(&table, &IndexValue::Integer(1), Some(A)).unwrap();
        assert_eq!(registry.bucket_type(&table), None);

        assert_eq!(
            registry.register(&table, IndexRequest::Any(IndexType::OctetString), A),
            Ok(IndexValue::string("aaaa"))
        );
    }

    #[test]
    fn test_release_all() {
        let mut registry = IndexRegistry::new();
        registry.register(&oid("1.2.3.4.10"), int(1), A).unwrap();
        registry.register(&oid("1.2.3.4.20"), int(1), A).unwrap();
        registry.register(&oid("1.2.3.4.20"), int(2), B).unwrap();
        registry
            .register(&oid("1.2.3.4.30"), IndexRequest::Any(IndexType::OctetString), A)
            .unwrap();

        assert_eq!(registry.release_all(A), 3);
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.owner_of(&oid("1.2.3.4.10"), &IndexValue::Integer(1)),
            Some(None)
        );
        assert_eq!(
            registry.owner_of(&oid("1.2.3.4.20"), &IndexValue::Integer(2)),
            Some(Some(B))
        );
        assert_eq!(registry.release_all(A), 0);
    }

    #[test]
    fn test_clear() {
        let mut registry = IndexRegistry::new();
        registry.register(&oid("1.2.3"), int(1), A).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
