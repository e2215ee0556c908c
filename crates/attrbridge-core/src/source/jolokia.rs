// Jolokia agent as an attribute source.

use attrbridge_api::JolokiaClient;
use serde_json::Value;

use super::{AttributeDescriptor, AttributeSource, SourceError, SourceErrorKind};

impl From<attrbridge_api::Error> for SourceError {
    fn from(err: attrbridge_api::Error) -> Self {
        let kind = if err.is_transient() {
            SourceErrorKind::Transient
        } else if err.is_not_found() {
            SourceErrorKind::Permanent
        } else {
            SourceErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

impl AttributeSource for JolokiaClient {
    async fn enumerate(&self) -> Result<Vec<AttributeDescriptor>, SourceError> {
        let attributes = self.list().await?;
        Ok(attributes
            .into_iter()
            .map(|a| AttributeDescriptor {
                entity: a.mbean,
                name: a.name,
                type_name: a.type_name,
                readable: true,
                writable: a.writable,
                description: a.description,
            })
            .collect())
    }

    async fn get_value(&self, entity: &str, attribute: &str) -> Result<Value, SourceError> {
        Ok(self.read(entity, attribute).await?)
    }

    async fn set_value(&self, entity: &str, attribute: &str, value: Value) -> Result<(), SourceError> {
        self.write(entity, attribute, &value).await?;
        Ok(())
    }
}
