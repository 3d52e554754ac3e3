//! Serialized graph values
//!
//! The graph extension returns every column as `agtype`: a JSON document
//! optionally followed by a type annotation such as `::vertex`, `::edge` or
//! `::path`. This module strips the trailing annotation, parses the payload
//! into a [`serde_json::Value`] tree, and walks that tree by [`KeyPath`].
//!
//! [`Agtype`] is the sqlx wire type used to bind cypher parameter maps and
//! to read result columns.

use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueFormat, PgValueRef, Postgres};
use sqlx::{Decode, Encode, Type};

use crate::error::{Error, Result};

/// Version byte of the binary agtype wire format
const AGTYPE_BINARY_VERSION: u8 = 1;

/// Remove a trailing `::typename` annotation from a serialized value
///
/// Only a suffix made of word characters is removed, so text such as
/// `"a::b"` (a quoted string) is left untouched.
pub fn strip_type_annotation(raw: &str) -> &str {
    let trimmed = raw.trim_end();
    match trimmed.rfind("::") {
        Some(pos) => {
            let suffix = &trimmed[pos + 2..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_alphanumeric() || c == '_') {
                trimmed[..pos].trim_end()
            } else {
                trimmed
            }
        }
        None => trimmed,
    }
}

/// Parse a serialized graph value into a structured tree
pub fn parse_payload(raw: &str) -> Result<Value> {
    let payload = strip_type_annotation(raw);
    serde_json::from_str(payload).map_err(|e| {
        Error::MalformedPayload(format!("{} (payload: {})", e, truncate(payload, 80)))
    })
}

/// Parse a serialized scalar into text
///
/// Strings lose their JSON quoting, numbers and booleans are rendered as
/// text, and `null` becomes `None`.
pub fn scalar_text(raw: &str) -> Result<Option<String>> {
    match parse_payload(raw)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(Error::MalformedPayload(format!(
            "expected a scalar, got {}",
            truncate(&other.to_string(), 80)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

/// Ordered sequence of keys used to navigate a parsed graph value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Create a key path from its keys
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// The empty path, which selects the whole value
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get the keys of this path
    pub fn keys(&self) -> &[String] {
        &self.0
    }

    /// Number of keys in the path
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk `value` key by key
    ///
    /// Objects are indexed by key, arrays by decimal position. Any step that
    /// does not resolve fails with [`Error::KeyPathNotFound`].
    pub fn navigate<'a>(&self, value: &'a Value) -> Result<&'a Value> {
        let mut current = value;
        for key in &self.0 {
            let next = match current {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| Error::KeyPathNotFound {
                path: self.to_string(),
                missing: key.clone(),
            })?;
        }
        Ok(current)
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for KeyPath {
    fn from(keys: [S; N]) -> Self {
        Self::new(keys)
    }
}

/// Raw `agtype` column or parameter
///
/// Holds the textual form. The binary wire format is a version byte
/// followed by that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agtype(pub String);

impl Agtype {
    /// Build a parameter map value from JSON
    pub fn from_json(value: &Value) -> Self {
        Self(value.to_string())
    }

    /// Get the serialized text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the serialized text
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Type<Postgres> for Agtype {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("agtype")
    }
}

impl Encode<'_, Postgres> for Agtype {
    fn encode_by_ref(
        &self,
        buf: &mut PgArgumentBuffer,
    ) -> std::result::Result<IsNull, BoxDynError> {
        buf.push(AGTYPE_BINARY_VERSION);
        buf.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }
}

impl<'r> Decode<'r, Postgres> for Agtype {
    fn decode(value: PgValueRef<'r>) -> std::result::Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => {
                let bytes = value.as_bytes()?;
                match bytes.split_first() {
                    Some((&AGTYPE_BINARY_VERSION, text)) => {
                        Ok(Self(std::str::from_utf8(text)?.to_owned()))
                    }
                    Some((version, _)) => {
                        Err(format!("unsupported agtype wire version {}", version).into())
                    }
                    None => Err("empty agtype value".into()),
                }
            }
            PgValueFormat::Text => Ok(Self(value.as_str()?.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_vertex_annotation() {
        let raw = r#"{"id": 1, "label": "Drug", "properties": {"name": "Ibuprofen"}}::vertex"#;
        assert!(strip_type_annotation(raw).ends_with('}'));
        assert_eq!(strip_type_annotation("\"D001\""), "\"D001\"");
        assert_eq!(strip_type_annotation("42::numeric"), "42");
        assert_eq!(strip_type_annotation("\"a::b\""), "\"a::b\"");
        assert_eq!(strip_type_annotation("[1, 2]::path  "), "[1, 2]");
    }

    #[test]
    fn test_parse_payload() {
        let value = parse_payload(
            r#"{"id": 844424930131969, "label": "Drug", "properties": {"name": "Ibuprofen", "id": "D001"}}::vertex"#,
        )
        .unwrap();
        assert_eq!(value["properties"]["name"], json!("Ibuprofen"));
        assert_eq!(value["label"], json!("Drug"));
    }

    #[test]
    fn test_parse_malformed_payload() {
        let err = parse_payload("{not json}::vertex").unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text("\"Aspirin\"").unwrap().as_deref(), Some("Aspirin"));
        assert_eq!(scalar_text("12").unwrap().as_deref(), Some("12"));
        assert_eq!(scalar_text("null").unwrap(), None);
        assert!(scalar_text("{\"a\": 1}").is_err());
    }

    #[test]
    fn test_key_path_navigation() {
        let value = json!({"properties": {"name": "Ibuprofen", "tags": ["nsaid", "otc"]}});

        let name = KeyPath::from(["properties", "name"]).navigate(&value).unwrap();
        assert_eq!(name, &json!("Ibuprofen"));

        let tag = KeyPath::from(["properties", "tags", "1"]).navigate(&value).unwrap();
        assert_eq!(tag, &json!("otc"));

        let whole = KeyPath::from(["properties"]).navigate(&value).unwrap();
        assert!(whole.is_object());

        assert_eq!(KeyPath::root().navigate(&value).unwrap(), &value);
    }

    #[test]
    fn test_key_path_missing_key() {
        let value = json!({"properties": {"name": "Ibuprofen"}});
        let err = KeyPath::from(["properties", "id"]).navigate(&value).unwrap_err();
        match err {
            Error::KeyPathNotFound { path, missing } => {
                assert_eq!(path, "properties.id");
                assert_eq!(missing, "id");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Indexing into a scalar fails at that step
        assert!(
            KeyPath::from(["properties", "name", "first"])
                .navigate(&value)
                .is_err()
        );
    }
}
