use crate::log::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source map document.
///
/// Only the fields that scope info is stored in are modelled. Every other
/// top-level field, such as `version`, `sources` or `mappings`, is kept in
/// `extra` and written back untouched.
///
/// # Examples
///
/// ```
/// use scopemap::SourceMap;
///
/// let map = SourceMap::from_json(r#"{"version":3,"names":["a"],"mappings":""}"#).unwrap();
///
/// assert_eq!(map.names.as_deref(), Some(&["a".to_string()][..]));
/// assert_eq!(map.extra["version"], 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    /// The shared name table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    /// One original scope token stream per source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_scopes: Option<Vec<String>>,
    /// The generated range token stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_ranges: Option<String>,
    /// The single token stream used by tagged strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    /// Every other top-level field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceMap {
    /// Create a new SourceMap with an empty name table.
    pub fn new() -> Self {
        Self {
            names: Some(vec![]),
            ..Self::default()
        }
    }

    /// Parse a SourceMap from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind `Json` if the text is not a JSON object
    /// or a modelled field has the wrong type.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize the SourceMap to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind `Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Remove every scope info field, leaving the name table and host fields.
    pub(crate) fn clear_scope_fields(&mut self) {
        self.original_scopes = None;
        self.generated_ranges = None;
        self.scopes = None;
    }
}

#[cfg(test)]
mod tests {
    use super::SourceMap;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_host_fields_survive() {
        let text = r#"{"version":3,"sources":["a.js"],"mappings":"AAAA","names":[],"x_custom":{"k":1}}"#;
        let map = SourceMap::from_json(text).unwrap();
        let back: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();

        assert_eq!(back["sources"], json!(["a.js"]));
        assert_eq!(back["mappings"], "AAAA");
        assert_eq!(back["x_custom"], json!({"k": 1}));
        assert!(back.get("scopes").is_none());
    }

    #[test]
    fn test_scope_fields_use_camel_case() {
        let mut map = SourceMap::new();
        map.original_scopes = Some(vec!["AACA".to_string()]);
        map.generated_ranges = Some("AAAA".to_string());
        let text = map.to_json().unwrap();

        assert!(text.contains(r#""originalScopes":["AACA"]"#));
        assert!(text.contains(r#""generatedRanges":"AAAA""#));
    }

    #[test]
    fn test_missing_names_is_none() {
        let map = SourceMap::from_json(r#"{"version":3}"#).unwrap();

        assert!(map.names.is_none());
    }

    #[test]
    fn test_invalid_json() {
        let error = SourceMap::from_json("[1, 2]").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Json);
    }

    #[test]
    fn test_clear_scope_fields() {
        let mut map = SourceMap::new();
        map.scopes = Some("BA".to_string());
        map.generated_ranges = Some("AAAA".to_string());
        map.clear_scope_fields();

        assert_eq!(map, SourceMap::new());
    }
}
