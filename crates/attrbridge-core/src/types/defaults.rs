// Built-in scalar factories.

use super::TypeFactory;
use crate::model::DataType;

/// A factory for one scalar data type under a fixed set of source names.
#[derive(Debug, Clone)]
pub struct ScalarTypeFactory {
    data_type: DataType,
    names: Vec<String>,
}

impl ScalarTypeFactory {
    pub fn new<'a>(data_type: DataType, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            data_type,
            names: names.into_iter().map(str::to_owned).collect(),
        }
    }
}

impl TypeFactory for ScalarTypeFactory {
    fn supported_types(&self) -> Vec<String> {
        self.names.clone()
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }
}

pub(super) fn scalar_factories() -> Vec<ScalarTypeFactory> {
    vec![
        ScalarTypeFactory::new(DataType::String, ["java.lang.String", "string"]),
        ScalarTypeFactory::new(DataType::Int32, ["int", "java.lang.Integer"]),
        ScalarTypeFactory::new(DataType::Int64, ["long", "java.lang.Long"]),
        ScalarTypeFactory::new(DataType::Double, ["double", "java.lang.Double"]),
        ScalarTypeFactory::new(DataType::Float, ["float", "java.lang.Float"]),
        ScalarTypeFactory::new(DataType::Int16, ["short", "java.lang.Short"]),
        ScalarTypeFactory::new(DataType::SByte, ["byte", "java.lang.Byte"]),
        ScalarTypeFactory::new(DataType::Boolean, ["boolean", "java.lang.Boolean"]),
    ]
}
