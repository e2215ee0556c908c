// attrbridge-api: Async client for Jolokia-style JSON attribute agents.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::JolokiaClient;
pub use error::Error;
pub use models::MBeanAttribute;
pub use transport::{TlsMode, TransportConfig};
