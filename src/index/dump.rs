//! Registry diagnostics.
//!
//! Read-only traversal of the registry, in ascending prefix order and then
//! ascending value order. Two views are built on top of it: the operator
//! text report and a serializable snapshot.

use super::registry::IndexRegistry;
use super::value::{IndexType, IndexValue, SessionId};
use crate::oid::Oid;
use serde::Serialize;

/// Receives the registry contents in order
pub trait RegistryVisitor {
    fn visit_prefix(&mut self, prefix: &Oid, index_type: IndexType);
    fn visit_value(&mut self, value: &IndexValue, holder: Option<SessionId>);
}

impl IndexRegistry {
    /// Walk every prefix and value without modifying anything
    pub fn walk<V: RegistryVisitor>(&self, visitor: &mut V) {
        for (prefix, bucket) in self.buckets() {
            visitor.visit_prefix(prefix, bucket.index_type);
            for (value, holder) in &bucket.entries {
                visitor.visit_value(value, *holder);
            }
        }
    }

    /// Human-readable allocation report; free values are parenthesised
    pub fn dump(&self) -> String {
        let mut report = TextReport::default();
        self.walk(&mut report);
        report.finish()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();
        self.walk(&mut snapshot);
        snapshot
    }
}

/// Builds the text report
#[derive(Debug, Default)]
pub struct TextReport {
    out: String,
}

impl TextReport {
    pub fn finish(self) -> String {
        self.out
    }
}

impl RegistryVisitor for TextReport {
    fn visit_prefix(&mut self, prefix: &Oid, _index_type: IndexType) {
        if self.out.is_empty() {
            self.out.push_str("Index Allocations:\n");
        }
        self.out.push_str(&format!("{} indexes:\n", prefix));
    }

    fn visit_value(&mut self, value: &IndexValue, holder: Option<SessionId>) {
        let line = match holder {
            Some(_) => format!("      {}", value),
            None => format!("    ( {} )", value),
        };
        self.out.push_str(&line);
        self.out.push('\n');
    }
}

/// Serializable copy of the registry contents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub prefixes: Vec<PrefixSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefixSnapshot {
    pub prefix: Oid,
    pub index_type: IndexType,
    pub values: Vec<ValueSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSnapshot {
    pub value: String,
    pub holder: Option<SessionId>,
}

impl RegistrySnapshot {
    /// Number of values not held by any session
    pub fn free_count(&self) -> usize {
        self.prefixes
            .iter()
            .flat_map(|prefix| prefix.values.iter())
            .filter(|value| value.holder.is_none())
            .count()
    }
}

impl RegistryVisitor for RegistrySnapshot {
    fn visit_prefix(&mut self, prefix: &Oid, index_type: IndexType) {
        self.prefixes.push(PrefixSnapshot {
            prefix: prefix.clone(),
            index_type,
            values: Vec::new(),
        });
    }

    fn visit_value(&mut self, value: &IndexValue, holder: Option<SessionId>) {
        if let Some(current) = self.prefixes.last_mut() {
            current.values.push(ValueSnapshot {
                value: value.to_string(),
                holder,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::value::IndexRequest;

    fn oid(text: &str) -> Oid {
        text.parse().unwrap()
    }

    #[test]
    fn test_empty_dump() {
        let registry = IndexRegistry::new();
        assert_eq!(registry.dump(), "");
        assert!(registry.snapshot().prefixes.is_empty());
    }

    #[test]
    fn test_dump_marks_free_values() {
        let mut registry = IndexRegistry::new();
        let ints = oid("1.2.3.4.110");
        let strings = oid("1.2.3.4.120");
        registry
            .register(&ints, IndexRequest::Exact(IndexValue::Integer(5)), SessionId(1))
            .unwrap();
        registry
            .register(&ints, IndexRequest::Exact(IndexValue::Integer(6)), SessionId(1))
            .unwrap();
        registry
            .register(&strings, IndexRequest::Exact(IndexValue::string("eth0")), SessionId(2))
            .unwrap();
        registry.release(&ints, &IndexValue::Integer(6)).unwrap();

        let expected = "Index Allocations:\n\
                        1.2.3.4.110 indexes:\n      5\n    ( 6 )\n\
                        1.2.3.4.120 indexes:\n      eth0\n";
        assert_eq!(registry.dump(), expected);
    }

    #[test]
    fn test_snapshot() {
        let mut registry = IndexRegistry::new();
        let table = oid("1.3.6.1.4.1.99");
        registry
            .register(&table, IndexRequest::Any(IndexType::ObjectId), SessionId(3))
            .unwrap();
        registry
            .register(&table, IndexRequest::Any(IndexType::ObjectId), SessionId(3))
            .unwrap();
        registry.release_all(SessionId(3));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.prefixes.len(), 1);
        assert_eq!(snapshot.prefixes[0].index_type, IndexType::ObjectId);
        assert_eq!(snapshot.prefixes[0].values[0].value, "1.3.6.1.4.1.99.1");
        assert_eq!(snapshot.prefixes[0].values[1].value, "1.3.6.1.4.1.99.2");
        assert_eq!(snapshot.free_count(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["prefixes"][0]["prefix"], "1.3.6.1.4.1.99");
        assert_eq!(json["prefixes"][0]["index_type"], "object_id");
        assert!(json["prefixes"][0]["values"][0]["holder"].is_null());
    }
}
