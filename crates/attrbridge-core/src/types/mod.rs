// ── Type factory registry ──
//
// Maps source type names (`int`, `java.lang.String`, ...) to factories
// that know the node data type and how to coerce and compare raw values.
// The registry is filled once at startup and shared read-only behind an
// `Arc` afterwards.

mod defaults;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{trace, warn};

use crate::availability::AvailabilityTracker;
use crate::error::CoreError;
use crate::model::{AccessLevel, AttributeRef, DataType, Node, NodeId, Variable, Variant};
use crate::source::{AttributeDescriptor, AttributeSource};
use crate::store::normalize_path;

pub use defaults::ScalarTypeFactory;

/// Builds typed values for a family of source type names.
pub trait TypeFactory: Send + Sync {
    /// Source type names this factory handles.
    fn supported_types(&self) -> Vec<String>;

    /// Data type advertised by nodes built with this factory.
    fn data_type(&self) -> DataType;

    /// Convert a raw source value. `Ok(None)` means the source has no value.
    fn coerce(&self, raw: &Value) -> Result<Option<Variant>, CoreError> {
        self.data_type().coerce(raw)
    }

    /// Null-safe equality: two absent values are equal, absent and present
    /// are not. Floating-point values compare by bit pattern, so a NaN
    /// reading equals the previous NaN.
    fn values_equal(&self, a: Option<&Variant>, b: Option<&Variant>) -> bool {
        match (a, b) {
            (Some(Variant::Float(x)), Some(Variant::Float(y))) => x.to_bits() == y.to_bits(),
            (Some(Variant::Double(x)), Some(Variant::Double(y))) => x.to_bits() == y.to_bits(),
            _ => a == b,
        }
    }
}

/// Everything [`TypeFactoryRegistry::build`] needs besides the descriptor.
pub struct BuildContext<'a, S> {
    pub namespace_index: u16,
    pub source: &'a S,
    pub availability: &'a AvailabilityTracker,
}

/// Source type name to factory table.
#[derive(Clone, Default)]
pub struct TypeFactoryRegistry {
    factories: HashMap<String, Arc<dyn TypeFactory>>,
}

impl TypeFactoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the scalar factories for the common Java type names.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for factory in defaults::scalar_factories() {
            registry.register(Arc::new(factory));
        }
        registry
    }

    /// Register `factory` under every type name it supports. A later
    /// registration for the same name replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn TypeFactory>) {
        for name in factory.supported_types() {
            self.factories.insert(name, Arc::clone(&factory));
        }
    }

    pub fn is_supported(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn TypeFactory>> {
        self.factories.get(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the variable node for one attribute under the folder at `path`.
    ///
    /// The initial value is fetched from the source. A transient failure
    /// still yields a node, degraded to a read-only [`UNAVAILABLE`] string and
    /// reported to the availability tracker. Any other failure yields a node
    /// with no value. Only an unsupported type name is an error.
    ///
    /// [`UNAVAILABLE`]: crate::model::UNAVAILABLE
    pub async fn build<S: AttributeSource>(
        &self,
        ctx: &BuildContext<'_, S>,
        path: &str,
        descriptor: &AttributeDescriptor,
    ) -> Result<Node, CoreError> {
        let factory = self
            .get(&descriptor.type_name)
            .ok_or_else(|| CoreError::UnsupportedType {
                type_name: descriptor.type_name.clone(),
            })?;

        let path = normalize_path(path);
        let id = NodeId::new(ctx.namespace_index, path.as_str()).child(&descriptor.name);
        let access = if descriptor.writable {
            AccessLevel::ReadWrite
        } else {
            AccessLevel::ReadOnly
        };
        let attribute = AttributeRef {
            entity: descriptor.entity.clone(),
            attribute: descriptor.name.clone(),
            source_type: descriptor.type_name.clone(),
        };
        let mut variable = Variable::new(attribute, factory.data_type(), access);

        match ctx
            .source
            .get_value(&descriptor.entity, &descriptor.name)
            .await
        {
            Ok(raw) => match factory.coerce(&raw) {
                Ok(value) => {
                    trace!(node = %id, value = ?value, "initial value");
                    variable.set_value(value, Utc::now());
                    ctx.availability.mark_available(&id);
                }
                Err(e) => {
                    warn!(
                        node = %id,
                        entity = %descriptor.entity,
                        attribute = %descriptor.name,
                        error = %e,
                        "initial value has wrong type"
                    );
                }
            },
            Err(e) if e.is_transient() => {
                warn!(
                    node = %id,
                    entity = %descriptor.entity,
                    attribute = %descriptor.name,
                    error = %e,
                    "attribute unavailable at build"
                );
                variable.degrade(Utc::now());
                ctx.availability.mark_unavailable(&id);
            }
            Err(e) => {
                warn!(
                    node = %id,
                    entity = %descriptor.entity,
                    attribute = %descriptor.name,
                    error = %e,
                    "initial fetch failed"
                );
            }
        }

        Ok(Node::variable(id, descriptor.name.clone(), variable)
            .with_description(descriptor.description.clone()))
    }
}

impl std::fmt::Debug for TypeFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeFactoryRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::UNAVAILABLE;
    use crate::source::{MemorySource, SourceError};
    use serde_json::json;

    const CACHE: &str = "app:type=Cache,name=main";

    fn descriptor(name: &str, type_name: &str, writable: bool) -> AttributeDescriptor {
        AttributeDescriptor {
            entity: CACHE.into(),
            name: name.into(),
            type_name: type_name.into(),
            readable: true,
            writable,
            description: Some("cache entries".into()),
        }
    }

    struct Lenient;

    impl TypeFactory for Lenient {
        fn supported_types(&self) -> Vec<String> {
            vec!["int".into()]
        }

        fn data_type(&self) -> DataType {
            DataType::Int64
        }
    }

    #[test]
    fn defaults_cover_primitive_and_boxed_names() {
        let registry = TypeFactoryRegistry::with_defaults();
        for name in ["java.lang.String", "int", "long", "double", "boolean", "java.lang.Integer"] {
            assert!(registry.is_supported(name), "{name} should be supported");
        }
        assert!(!registry.is_supported("java.util.Date"));
        assert_eq!(registry.get("int").unwrap().data_type(), DataType::Int32);

        let names = registry.type_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = TypeFactoryRegistry::with_defaults();
        registry.register(Arc::new(Lenient));
        assert_eq!(registry.get("int").unwrap().data_type(), DataType::Int64);
        assert_eq!(registry.get("long").unwrap().data_type(), DataType::Int64);
    }

    #[test]
    fn nan_equals_itself() {
        let registry = TypeFactoryRegistry::with_defaults();
        let double = registry.get("double").unwrap();
        let nan = Variant::Double(f64::NAN);
        assert!(double.values_equal(Some(&nan), Some(&nan)));
        assert!(!double.values_equal(Some(&nan), Some(&Variant::Double(1.0))));
        assert!(!double.values_equal(Some(&nan), None));
        assert!(double.values_equal(None, None));

        let float = registry.get("float").unwrap();
        let nan = Variant::Float(f32::NAN);
        assert!(float.values_equal(Some(&nan), Some(&nan)));
    }

    #[tokio::test]
    async fn build_fetches_initial_value() {
        let source = MemorySource::new();
        source.define_writable(CACHE, "size", "int", json!(10));
        let availability = AvailabilityTracker::new();
        let ctx = BuildContext {
            namespace_index: 2,
            source: &source,
            availability: &availability,
        };

        let node = TypeFactoryRegistry::with_defaults()
            .build(&ctx, "/app/Cache/main", &descriptor("size", "int", true))
            .await
            .unwrap();

        assert_eq!(node.id, NodeId::new(2, "app/Cache/main/size"));
        assert_eq!(node.description.as_deref(), Some("cache entries"));
        let var = node.as_variable().unwrap();
        assert_eq!(var.value, Some(Variant::Int32(10)));
        assert_eq!(var.access, AccessLevel::ReadWrite);
        assert!(var.source_timestamp.is_some());
        assert_eq!(availability.unavailable_count(), 0);
    }

    #[tokio::test]
    async fn transient_failure_degrades_node() {
        let source = MemorySource::new();
        source.define_writable(CACHE, "size", "int", json!(10));
        source.fail_reads(CACHE, "size", SourceError::transient("getter threw"));
        let availability = AvailabilityTracker::new();
        let ctx = BuildContext {
            namespace_index: 2,
            source: &source,
            availability: &availability,
        };

        let node = TypeFactoryRegistry::with_defaults()
            .build(&ctx, "app/Cache/main", &descriptor("size", "int", true))
            .await
            .unwrap();

        let var = node.as_variable().unwrap();
        assert_eq!(var.value, Some(Variant::String(UNAVAILABLE.into())));
        assert_eq!(var.data_type, DataType::String);
        assert_eq!(var.access, AccessLevel::ReadOnly);
        assert_eq!(var.declared_type, DataType::Int32);
        assert!(availability.is_unavailable(&node.id));
    }

    #[tokio::test]
    async fn other_failures_leave_node_without_value() {
        let source = MemorySource::new();
        source.define(CACHE, "hits", "long", json!("not a number"));
        let availability = AvailabilityTracker::new();
        let ctx = BuildContext {
            namespace_index: 2,
            source: &source,
            availability: &availability,
        };
        let registry = TypeFactoryRegistry::with_defaults();

        let mismatched = registry
            .build(&ctx, "app/Cache/main", &descriptor("hits", "long", false))
            .await
            .unwrap();
        assert_eq!(mismatched.as_variable().unwrap().value, None);

        let missing = registry
            .build(&ctx, "app/Cache/main", &descriptor("gone", "int", false))
            .await
            .unwrap();
        assert_eq!(missing.as_variable().unwrap().value, None);
        assert_eq!(missing.as_variable().unwrap().data_type, DataType::Int32);
        assert_eq!(availability.unavailable_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_type_is_an_error() {
        let source = MemorySource::new();
        let availability = AvailabilityTracker::new();
        let ctx = BuildContext {
            namespace_index: 2,
            source: &source,
            availability: &availability,
        };
        let err = TypeFactoryRegistry::with_defaults()
            .build(&ctx, "app", &descriptor("when", "java.util.Date", false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedType { .. }));
    }
}
