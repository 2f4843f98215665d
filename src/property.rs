//! Property bags
//!
//! Inputs and outputs cross the engine boundary as JSON objects keyed by the
//! wire-level property names (`organizationSlug`, `teamSlug`, ...).

use crate::error::EngineError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;

/// Wire-level property bag.
pub type PropertyMap = serde_json::Map<String, Value>;

/// True for a JSON string with at least one character.
pub fn is_non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}

/// Get a string property, if present and a string.
pub fn get_str<'a>(props: &'a PropertyMap, key: &str) -> Option<&'a str> {
    props.get(key).and_then(|v| v.as_str())
}

/// Get a string property or fail naming the key.
pub fn require_str(props: &PropertyMap, key: &str) -> Result<String> {
    get_str(props, key)
        .map(|s| s.to_string())
        .context(format!("Missing required property: {}", key))
}

/// Drop `null` entries; absent and null mean the same thing on the wire.
pub fn without_nulls(props: PropertyMap) -> PropertyMap {
    props.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// Keys whose values differ between two bags, in key order.
pub fn changed_keys(olds: &PropertyMap, news: &PropertyMap) -> Vec<String> {
    let keys: BTreeSet<&String> = olds.keys().chain(news.keys()).collect();
    keys.into_iter()
        .filter(|key| {
            let old = olds.get(*key).filter(|v| !v.is_null());
            let new = news.get(*key).filter(|v| !v.is_null());
            old != new
        })
        .cloned()
        .collect()
}

/// Required string output of a resolved resource.
pub fn string_output(outputs: &PropertyMap, key: &str) -> Result<String, EngineError> {
    get_str(outputs, key)
        .map(|s| s.to_string())
        .ok_or_else(|| EngineError::MissingOutput {
            property: key.to_string(),
        })
}

/// Optional string output of a resolved resource.
pub fn optional_string_output(outputs: &PropertyMap, key: &str) -> Option<String> {
    get_str(outputs, key).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_is_non_empty_string() {
        assert!(is_non_empty_string(Some(&json!("a"))));
        assert!(!is_non_empty_string(Some(&json!(""))));
        assert!(!is_non_empty_string(Some(&json!(1))));
        assert!(!is_non_empty_string(Some(&Value::Null)));
        assert!(!is_non_empty_string(None));
    }

    #[test]
    fn test_changed_keys_treats_null_as_absent() {
        let olds = map(json!({"name": "a", "slug": "s", "subjectPrefix": null}));
        let news = map(json!({"name": "b", "slug": "s", "teamSlug": "t"}));
        assert_eq!(changed_keys(&olds, &news), vec!["name", "teamSlug"]);
    }

    #[test]
    fn test_require_str_names_key() {
        let props = map(json!({"name": 3}));
        let err = require_str(&props, "name").unwrap_err();
        assert_eq!(err.to_string(), "Missing required property: name");
    }

    #[test]
    fn test_without_nulls() {
        let props = without_nulls(map(json!({"a": null, "b": "x"})));
        assert_eq!(props.len(), 1);
        assert!(props.contains_key("b"));
    }
}
