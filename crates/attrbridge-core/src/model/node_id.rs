// ── Node identity ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identity of a node: namespace index plus a string identifier.
///
/// Folder identifiers are the cumulative slash path from the root
/// (`app/Cache/main`); variables append their attribute name
/// (`app/Cache/main/size`). Rendered as `ns=2;s=app/Cache/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace_index: u16,
    pub identifier: String,
}

impl NodeId {
    pub fn new(namespace_index: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: identifier.into(),
        }
    }

    /// Identifier of a direct child named `segment`.
    pub fn child(&self, segment: &str) -> Self {
        if self.identifier.is_empty() {
            return Self::new(self.namespace_index, segment);
        }
        Self::new(
            self.namespace_index,
            format!("{}/{segment}", self.identifier),
        )
    }

    /// Parse `ns=<n>;s=<id>`, `s=<id>`, or a bare identifier. The latter two
    /// forms take `default_namespace`.
    pub fn parse_with_default(input: &str, default_namespace: u16) -> Result<Self, CoreError> {
        if input.starts_with("ns=") {
            return input.parse();
        }
        let identifier = input.strip_prefix("s=").unwrap_or(input);
        if identifier.is_empty() {
            return Err(CoreError::InvalidNodeId {
                input: input.to_owned(),
                reason: "empty identifier".into(),
            });
        }
        Ok(Self::new(default_namespace, identifier))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};s={}", self.namespace_index, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidNodeId {
            input: s.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = s.strip_prefix("ns=").ok_or_else(|| invalid("expected 'ns=' prefix"))?;
        let (index, identifier) = rest
            .split_once(";s=")
            .ok_or_else(|| invalid("expected ';s=' separator"))?;
        let namespace_index = index
            .parse::<u16>()
            .map_err(|e| invalid(&format!("bad namespace index: {e}")))?;
        if identifier.is_empty() {
            return Err(invalid("empty identifier"));
        }
        Ok(Self::new(namespace_index, identifier))
    }
}
