// ── Runtime namespace configuration ──
//
// Describes how the tree is named and how it is kept in sync. Never touches
// disk: `attrbridge-config` (or a test) builds a `NamespaceConfig` and hands
// it to `Namespace::build`.

use std::time::Duration;

use crate::error::CoreError;

/// Default refresh delay between the end of one cycle and the start of the next.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// What happens to nodes the worker has marked Unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Unavailable nodes stay skipped until `Namespace::mark_available`.
    #[default]
    Manual,
    /// Every `every_cycles` cycles, fetch Unavailable nodes once and
    /// restore those that answer.
    Probe { every_cycles: u32 },
}

/// Which entity domains are folded into the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    /// Exact domain names to keep. Empty keeps every domain.
    pub include_domains: Vec<String>,
    /// Exact domain names to drop. Wins over `include_domains`.
    pub exclude_domains: Vec<String>,
}

impl EntityFilter {
    pub fn accepts(&self, domain: &str) -> bool {
        if self.exclude_domains.iter().any(|d| d == domain) {
            return false;
        }
        self.include_domains.is_empty() || self.include_domains.iter().any(|d| d == domain)
    }
}

/// Configuration for one namespace.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// Namespace index stamped on every node id.
    pub namespace_index: u16,
    /// Namespace URI advertised to the protocol layer.
    pub namespace_uri: String,
    /// Browse name and identifier of the root folder.
    pub root_name: String,
    pub root_description: String,
    pub refresh_interval: Duration,
    pub recovery: RecoveryPolicy,
    pub filter: EntityFilter,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            namespace_index: 2,
            namespace_uri: "urn:attrbridge:attributes".into(),
            root_name: "attributes".into(),
            root_description: "Attribute root node.".into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            recovery: RecoveryPolicy::Manual,
            filter: EntityFilter::default(),
        }
    }
}

impl NamespaceConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.root_name.is_empty() || self.root_name.contains('/') {
            return Err(CoreError::Config {
                message: format!("root name '{}' must be a single non-empty segment", self.root_name),
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(CoreError::Config {
                message: "refresh interval must be greater than zero".into(),
            });
        }
        if matches!(self.recovery, RecoveryPolicy::Probe { every_cycles: 0 }) {
            return Err(CoreError::Config {
                message: "probe recovery needs every_cycles >= 1".into(),
            });
        }
        Ok(())
    }
}
