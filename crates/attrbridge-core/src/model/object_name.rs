// ── Entity object names ──
//
// Source entities are named `domain:key=value,key=value`. Values may be
// quoted, in which case commas and equals signs inside the quotes are
// literal.

use std::fmt;

use crate::error::CoreError;

/// A parsed entity name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub domain: String,
    /// Key properties in the order they appeared. Quoted values are unquoted.
    pub properties: Vec<(String, String)>,
}

impl ObjectName {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidObjectName {
            name: name.to_owned(),
            reason,
        };

        let (domain, keys) = name
            .split_once(':')
            .ok_or_else(|| invalid("missing ':' after domain".into()))?;
        if domain.is_empty() {
            return Err(invalid("empty domain".into()));
        }

        let mut properties = Vec::new();
        for pair in split_unquoted(keys, ',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("key property '{pair}' has no '='")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid(format!("key property '{pair}' has an empty key")));
            }
            properties.push((key.to_owned(), unquote(value.trim())));
        }
        if properties.is_empty() {
            return Err(invalid("no key properties".into()));
        }

        Ok(Self {
            domain: domain.to_owned(),
            properties,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Name with key properties sorted, so differently ordered spellings of
    /// the same entity compare equal.
    pub fn canonical_name(&self) -> String {
        let mut props: Vec<_> = self.properties.iter().collect();
        props.sort();
        let keys: Vec<String> = props.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}:{}", self.domain, keys.join(","))
    }

    /// Folder path for this entity: the domain with `.` turned into `/`,
    /// then the `type` property, then `name` if present.
    pub fn tree_path(&self) -> Result<String, CoreError> {
        let kind = self.get("type").ok_or_else(|| CoreError::InvalidObjectName {
            name: self.to_string(),
            reason: "missing 'type' key property".into(),
        })?;

        let mut path = self.domain.replace('.', "/");
        path.push('/');
        path.push_str(kind);
        if let Some(name) = self.get("name") {
            path.push('/');
            path.push_str(name);
        }
        Ok(path)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (i, (k, v)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

fn split_unquoted(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_domain_and_properties() {
        let name = ObjectName::parse("app:type=Cache,name=main").unwrap();
        assert_eq!(name.domain, "app");
        assert_eq!(name.get("type"), Some("Cache"));
        assert_eq!(name.get("name"), Some("main"));
        assert_eq!(name.tree_path().unwrap(), "app/Cache/main");
    }

    #[test]
    fn dotted_domain_becomes_nested_path() {
        let name = ObjectName::parse("java.lang:type=Memory").unwrap();
        assert_eq!(name.tree_path().unwrap(), "java/lang/Memory");
    }

    #[test]
    fn quoted_values_may_contain_separators() {
        let name = ObjectName::parse(r#"app:type=Pool,name="a,b=c""#).unwrap();
        assert_eq!(name.get("name"), Some("a,b=c"));
        assert_eq!(name.properties.len(), 2);
    }

    #[test]
    fn canonical_name_sorts_keys() {
        let a = ObjectName::parse("app:type=Cache,name=main").unwrap();
        let b = ObjectName::parse("app:name=main,type=Cache").unwrap();
        assert_eq!(a.canonical_name(), b.canonical_name());
        assert_eq!(a.canonical_name(), "app:name=main,type=Cache");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert!(ObjectName::parse("no-colon").is_err());
        assert!(ObjectName::parse("app:type").is_err());
        assert!(ObjectName::parse("app:=x").is_err());
        assert!(ObjectName::parse(":type=x").is_err());
        assert!(ObjectName::parse("app:").is_err());
    }

    #[test]
    fn tree_path_requires_type() {
        let name = ObjectName::parse("app:name=main").unwrap();
        assert!(matches!(
            name.tree_path(),
            Err(CoreError::InvalidObjectName { .. })
        ));
    }
}
