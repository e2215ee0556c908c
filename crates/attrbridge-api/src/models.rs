// Jolokia wire types.
//
// Requests are tagged by `type`; every response is wrapped in the same
// `{ status, value, error_type, error }` envelope regardless of HTTP status.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single bulk-capable Jolokia request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum JolokiaRequest<'a> {
    Read {
        mbean: &'a str,
        attribute: &'a str,
    },
    Write {
        mbean: &'a str,
        attribute: &'a str,
        value: &'a Value,
    },
}

/// Response envelope shared by every request type.
#[derive(Debug, Deserialize)]
pub(crate) struct JolokiaResponse {
    pub status: u16,
    #[serde(default)]
    pub value: Value,
    pub error_type: Option<String>,
    pub error: Option<String>,
}

/// `attr` entry of a `list` response.
#[derive(Debug, Deserialize)]
pub(crate) struct AttributeInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub rw: bool,
    pub desc: Option<String>,
}

/// One MBean in a `list` response. Operations and notifications are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct MBeanInfo {
    #[serde(default)]
    pub attr: BTreeMap<String, AttributeInfo>,
}

/// `value` of a `list` response: domain -> key property list -> MBean.
pub(crate) type ListValue = BTreeMap<String, BTreeMap<String, MBeanInfo>>;

/// A flattened attribute description from the agent's `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MBeanAttribute {
    /// Full object name, `domain:key=value,...`.
    pub mbean: String,
    pub name: String,
    /// Java type name as reported by the agent (`int`, `java.lang.String`, ...).
    pub type_name: String,
    pub writable: bool,
    pub description: Option<String>,
}

pub(crate) fn flatten_list(list: ListValue) -> Vec<MBeanAttribute> {
    let mut out = Vec::new();
    for (domain, beans) in list {
        for (keys, info) in beans {
            let mbean = format!("{domain}:{keys}");
            for (name, attr) in info.attr {
                out.push(MBeanAttribute {
                    mbean: mbean.clone(),
                    name,
                    type_name: attr.type_name,
                    writable: attr.rw,
                    description: attr.desc.filter(|d| !d.is_empty()),
                });
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_request_is_tagged() {
        let req = JolokiaRequest::Read {
            mbean: "java.lang:type=Memory",
            attribute: "Verbose",
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "type": "read", "mbean": "java.lang:type=Memory", "attribute": "Verbose" })
        );
    }

    #[test]
    fn flatten_skips_beans_without_attributes() {
        let list: ListValue = serde_json::from_value(json!({
            "app": {
                "name=main,type=Cache": {
                    "desc": "cache",
                    "attr": { "size": { "type": "int", "rw": true, "desc": "" } },
                    "op": {}
                },
                "type=Empty": { "op": {} }
            }
        }))
        .unwrap();

        let attrs = flatten_list(list);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].mbean, "app:name=main,type=Cache");
        assert!(attrs[0].writable);
        assert!(attrs[0].description.is_none());
    }
}
