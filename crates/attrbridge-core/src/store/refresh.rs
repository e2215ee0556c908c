// ── Variable value operations ──
//
// Value-level mutations used by the polling worker and the namespace
// facade. All of them run under a single shard lock and never await.

use chrono::Utc;

use super::NamespaceTree;
use crate::model::{AttributeRef, DataValue, NodeId, StatusCode, Variant};
use crate::types::TypeFactory;

impl NamespaceTree {
    /// Apply a freshly polled value. Returns `Some(true)` if the stored value
    /// changed, `Some(false)` if it compared equal, `None` if `id` is not a
    /// variable.
    pub fn apply_polled_value(
        &self,
        id: &NodeId,
        value: Option<Variant>,
        factory: &dyn TypeFactory,
    ) -> Option<bool> {
        let mut node = self.nodes.get_mut(id)?;
        let variable = node.as_variable_mut()?;
        if factory.values_equal(variable.value.as_ref(), value.as_ref()) {
            return Some(false);
        }
        variable.set_value(value, Utc::now());
        drop(node);
        self.bump();
        Some(true)
    }

    /// Degrade a variable to the unavailable marker. Returns `false` if `id`
    /// is not a variable.
    pub fn degrade_variable(&self, id: &NodeId) -> bool {
        self.update(id, |node| {
            let Some(variable) = node.as_variable_mut() else {
                return false;
            };
            variable.degrade(Utc::now());
            true
        })
        .unwrap_or(false)
    }

    /// Restore a variable's declared type and access, optionally seeding a
    /// value. Returns `false` if `id` is not a variable.
    pub fn restore_variable(&self, id: &NodeId, value: Option<Variant>) -> bool {
        self.update(id, |node| {
            let Some(variable) = node.as_variable_mut() else {
                return false;
            };
            variable.restore();
            if value.is_some() {
                variable.set_value(value, Utc::now());
            }
            true
        })
        .unwrap_or(false)
    }

    /// Current value of a variable.
    pub fn read_value(&self, id: &NodeId) -> Result<DataValue, StatusCode> {
        self.with_node(id, |node| {
            node.as_variable()
                .map(crate::model::Variable::data_value)
                .ok_or(StatusCode::BadAttributeIdInvalid)
        })
        .unwrap_or(Err(StatusCode::BadNodeIdUnknown))
    }

    /// Store an externally written value. On success returns the source
    /// attribute the write must be mirrored to.
    pub fn write_variable(&self, id: &NodeId, value: Variant) -> Result<AttributeRef, StatusCode> {
        let mut node = self.nodes.get_mut(id).ok_or(StatusCode::BadNodeIdUnknown)?;
        let variable = node.as_variable_mut().ok_or(StatusCode::BadNotWritable)?;
        if !variable.is_writable() {
            return Err(StatusCode::BadNotWritable);
        }
        if value.data_type() != variable.data_type {
            return Err(StatusCode::BadTypeMismatch);
        }
        variable.set_value(Some(value), Utc::now());
        let target = variable.attribute.clone();
        drop(node);
        self.bump();
        Ok(target)
    }
}
