//! Registered type mappings.

use serde::Serialize;
use tabled::Tabled;

use attrbridge_core::{DataType, TypeFactoryRegistry};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TypeMapping {
    source_type: String,
    data_type: DataType,
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Source type")]
    source_type: String,
    #[tabled(rename = "Data type")]
    data_type: String,
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let registry = TypeFactoryRegistry::with_defaults();
    let mappings: Vec<TypeMapping> = registry
        .type_names()
        .into_iter()
        .filter_map(|name| {
            let data_type = registry.get(&name)?.data_type();
            Some(TypeMapping {
                source_type: name,
                data_type,
            })
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &mappings,
        |m| TypeRow {
            source_type: m.source_type.clone(),
            data_type: m.data_type.to_string(),
        },
        |m| m.source_type.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
