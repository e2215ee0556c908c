// In-process attribute source.
//
// Holds attribute definitions and values in a DashMap. Failures can be
// injected per attribute for reads and writes, and for enumeration as a
// whole, which makes it the source of choice for tests and demos.

use std::future;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde_json::Value;

use super::{AttributeDescriptor, AttributeSource, SourceError};

#[derive(Debug, Clone)]
struct MemoryAttribute {
    type_name: String,
    readable: bool,
    writable: bool,
    description: Option<String>,
    value: Value,
    read_failure: Option<SourceError>,
    write_failure: Option<SourceError>,
    reads: u64,
}

/// A write the source received, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub entity: String,
    pub attribute: String,
    pub value: Value,
}

type Key = (String, String);

fn key(entity: &str, attribute: &str) -> Key {
    (entity.to_owned(), attribute.to_owned())
}

/// Attribute source backed by process memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    attributes: DashMap<Key, MemoryAttribute>,
    enumerate_failure: ArcSwapOption<SourceError>,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Definitions ─────────────────────────────────────────────────

    /// Define (or redefine) an attribute from a descriptor.
    pub fn insert(&self, descriptor: AttributeDescriptor, value: Value) {
        self.attributes.insert(
            key(&descriptor.entity, &descriptor.name),
            MemoryAttribute {
                type_name: descriptor.type_name,
                readable: descriptor.readable,
                writable: descriptor.writable,
                description: descriptor.description,
                value,
                read_failure: None,
                write_failure: None,
                reads: 0,
            },
        );
    }

    /// Define a readable, read-only attribute.
    pub fn define(&self, entity: &str, attribute: &str, type_name: &str, value: Value) {
        self.insert(descriptor(entity, attribute, type_name, false), value);
    }

    /// Define a readable, writable attribute.
    pub fn define_writable(&self, entity: &str, attribute: &str, type_name: &str, value: Value) {
        self.insert(descriptor(entity, attribute, type_name, true), value);
    }

    /// Remove an attribute. Subsequent reads fail permanently.
    pub fn remove(&self, entity: &str, attribute: &str) -> bool {
        self.attributes.remove(&key(entity, attribute)).is_some()
    }

    // ── Values ──────────────────────────────────────────────────────

    /// Change an attribute's value from the source side. Returns `false` if
    /// the attribute is not defined.
    pub fn set(&self, entity: &str, attribute: &str, value: Value) -> bool {
        let Some(mut attr) = self.attributes.get_mut(&key(entity, attribute)) else {
            return false;
        };
        attr.value = value;
        true
    }

    pub fn value(&self, entity: &str, attribute: &str) -> Option<Value> {
        self.attributes
            .get(&key(entity, attribute))
            .map(|attr| attr.value.clone())
    }

    /// Number of `get_value` calls that reached this attribute, including
    /// failed ones.
    pub fn read_count(&self, entity: &str, attribute: &str) -> u64 {
        self.attributes
            .get(&key(entity, attribute))
            .map_or(0, |attr| attr.reads)
    }

    /// Every `set_value` call received so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Failure injection ───────────────────────────────────────────

    pub fn fail_reads(&self, entity: &str, attribute: &str, error: SourceError) {
        if let Some(mut attr) = self.attributes.get_mut(&key(entity, attribute)) {
            attr.read_failure = Some(error);
        }
    }

    pub fn fail_writes(&self, entity: &str, attribute: &str, error: SourceError) {
        if let Some(mut attr) = self.attributes.get_mut(&key(entity, attribute)) {
            attr.write_failure = Some(error);
        }
    }

    pub fn clear_failures(&self, entity: &str, attribute: &str) {
        if let Some(mut attr) = self.attributes.get_mut(&key(entity, attribute)) {
            attr.read_failure = None;
            attr.write_failure = None;
        }
    }

    pub fn fail_enumeration(&self, error: Option<SourceError>) {
        self.enumerate_failure.store(error.map(Arc::new));
    }

    // ── Source operations ───────────────────────────────────────────

    fn list(&self) -> Result<Vec<AttributeDescriptor>, SourceError> {
        if let Some(err) = self.enumerate_failure.load_full() {
            return Err((*err).clone());
        }
        let mut out: Vec<AttributeDescriptor> = self
            .attributes
            .iter()
            .map(|entry| {
                let ((entity, name), attr) = entry.pair();
                AttributeDescriptor {
                    entity: entity.clone(),
                    name: name.clone(),
                    type_name: attr.type_name.clone(),
                    readable: attr.readable,
                    writable: attr.writable,
                    description: attr.description.clone(),
                }
            })
            .collect();
        out.sort_by(|a, b| (&a.entity, &a.name).cmp(&(&b.entity, &b.name)));
        Ok(out)
    }

    fn read(&self, entity: &str, attribute: &str) -> Result<Value, SourceError> {
        let mut attr = self
            .attributes
            .get_mut(&key(entity, attribute))
            .ok_or_else(|| SourceError::permanent(format!("no attribute {attribute} on {entity}")))?;
        attr.reads += 1;
        if let Some(err) = &attr.read_failure {
            return Err(err.clone());
        }
        if !attr.readable {
            return Err(SourceError::other(format!("{attribute} on {entity} is not readable")));
        }
        Ok(attr.value.clone())
    }

    fn write(&self, entity: &str, attribute: &str, value: Value) -> Result<(), SourceError> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedWrite {
                entity: entity.to_owned(),
                attribute: attribute.to_owned(),
                value: value.clone(),
            });

        let mut attr = self
            .attributes
            .get_mut(&key(entity, attribute))
            .ok_or_else(|| SourceError::permanent(format!("no attribute {attribute} on {entity}")))?;
        if let Some(err) = &attr.write_failure {
            return Err(err.clone());
        }
        if !attr.writable {
            return Err(SourceError::other(format!("{attribute} on {entity} is read-only")));
        }
        attr.value = value;
        Ok(())
    }
}

fn descriptor(entity: &str, attribute: &str, type_name: &str, writable: bool) -> AttributeDescriptor {
    AttributeDescriptor {
        entity: entity.to_owned(),
        name: attribute.to_owned(),
        type_name: type_name.to_owned(),
        readable: true,
        writable,
        description: None,
    }
}

impl AttributeSource for MemorySource {
    fn enumerate(&self) -> impl Future<Output = Result<Vec<AttributeDescriptor>, SourceError>> + Send {
        future::ready(self.list())
    }

    fn get_value(
        &self,
        entity: &str,
        attribute: &str,
    ) -> impl Future<Output = Result<Value, SourceError>> + Send {
        future::ready(self.read(entity, attribute))
    }

    fn set_value(
        &self,
        entity: &str,
        attribute: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), SourceError>> + Send {
        future::ready(self.write(entity, attribute, value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const CACHE: &str = "app:type=Cache,name=main";

    #[tokio::test]
    async fn enumerate_is_sorted() {
        let source = MemorySource::new();
        source.define("b:type=X", "z", "int", json!(1));
        source.define("a:type=X", "y", "int", json!(2));
        source.define("a:type=X", "x", "int", json!(3));

        let names: Vec<_> = source
            .enumerate()
            .await
            .unwrap()
            .into_iter()
            .map(|d| format!("{}/{}", d.entity, d.name))
            .collect();
        assert_eq!(names, ["a:type=X/x", "a:type=X/y", "b:type=X/z"]);
    }

    #[tokio::test]
    async fn injected_read_failure_is_counted() {
        let source = MemorySource::new();
        source.define(CACHE, "size", "int", json!(10));
        source.fail_reads(CACHE, "size", SourceError::transient("down"));

        let err = source.get_value(CACHE, "size").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.read_count(CACHE, "size"), 1);

        source.clear_failures(CACHE, "size");
        assert_eq!(source.get_value(CACHE, "size").await.unwrap(), json!(10));
        assert_eq!(source.read_count(CACHE, "size"), 2);
    }

    #[tokio::test]
    async fn missing_attribute_is_permanent() {
        let source = MemorySource::new();
        let err = source.get_value(CACHE, "size").await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn writes_are_recorded_even_when_rejected() {
        let source = MemorySource::new();
        source.define(CACHE, "label", "java.lang.String", json!("a"));
        source.define_writable(CACHE, "size", "int", json!(10));

        source.set_value(CACHE, "size", json!(20)).await.unwrap();
        assert!(source.set_value(CACHE, "label", json!("b")).await.is_err());

        assert_eq!(source.value(CACHE, "size"), Some(json!(20)));
        assert_eq!(source.value(CACHE, "label"), Some(json!("a")));
        assert_eq!(source.writes().len(), 2);
    }

    #[tokio::test]
    async fn enumeration_failure_can_be_injected() {
        let source = MemorySource::new();
        source.fail_enumeration(Some(SourceError::transient("agent down")));
        assert!(source.enumerate().await.is_err());
        source.fail_enumeration(None);
        assert!(source.enumerate().await.unwrap().is_empty());
    }
}
