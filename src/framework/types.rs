use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How the host encodes a value that is only known after apply.
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

pub type Json = serde_json::Value;

/// An attribute value as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<T> {
    Null,
    Unknown,
    Known(T),
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Null
    }
}

impl<T> Value<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }

    /// Null or unknown, i.e. nothing usable yet.
    pub fn is_unset(&self) -> bool {
        !self.is_known()
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Value::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Value::Null => Value::Null,
            Value::Unknown => Value::Unknown,
            Value::Known(v) => Value::Known(f(v)),
        }
    }
}

impl<T: Clone> Value<T> {
    pub fn value_or(&self, default: T) -> T {
        self.as_known().cloned().unwrap_or(default)
    }
}

impl<T> From<Option<T>> for Value<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Value::Known(v),
            None => Value::Null,
        }
    }
}

impl Value<String> {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Known(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }

    /// Known and non-empty.
    pub fn non_empty(&self) -> Option<&str> {
        self.as_str().filter(|s| !s.is_empty())
    }
}

impl<T: Serialize> Serialize for Value<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
            Value::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Json::deserialize(deserializer)? {
            Json::Null => Ok(Value::Null),
            Json::String(s) if s == UNKNOWN_SENTINEL => Ok(Value::Unknown),
            other => serde_json::from_value(other)
                .map(Value::Known)
                .map_err(D::Error::custom),
        }
    }
}

pub fn is_unknown_json(v: &Json) -> bool {
    matches!(v, Json::String(s) if s == UNKNOWN_SENTINEL)
}

pub fn unknown_json() -> Json {
    Json::String(UNKNOWN_SENTINEL.to_string())
}

/// Whether any value nested in `v` is still unknown.
pub fn contains_unknown(v: &Json) -> bool {
    match v {
        Json::Array(items) => items.iter().any(contains_unknown),
        Json::Object(map) => map.values().any(contains_unknown),
        other => is_unknown_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct Model {
        name: Value<String>,
        port: Value<i64>,
        tags: Value<Vec<String>>,
    }

    #[test]
    fn decodes_null_unknown_and_known() {
        let m: Model = serde_json::from_value(json!({
            "name": "audit",
            "port": UNKNOWN_SENTINEL,
        }))
        .unwrap();
        assert_eq!(m.name, Value::string("audit"));
        assert!(m.port.is_unknown());
        assert!(m.tags.is_null());
    }

    #[test]
    fn encodes_back_to_host_representation() {
        let m = Model {
            name: Value::Null,
            port: Value::Unknown,
            tags: Value::Known(vec!["a".into()]),
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "name": null, "port": UNKNOWN_SENTINEL, "tags": ["a"] })
        );
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let res: Result<Model, _> = serde_json::from_value(json!({ "port": "not a number" }));
        assert!(res.is_err());
    }

    #[test]
    fn helpers() {
        let v: Value<String> = Some("x".to_string()).into();
        assert_eq!(v.as_str(), Some("x"));
        assert_eq!(Value::string("").non_empty(), None);
        assert_eq!(Value::<bool>::Unknown.value_or(true), true);
        assert!(contains_unknown(&json!({ "a": [1, UNKNOWN_SENTINEL] })));
        assert!(!contains_unknown(&json!({ "a": [1, "b"] })));
    }
}
