//! Small helpers for pulling typed values out of a node's JSON config map
//! with a default, since `serde_json::Map` access is otherwise verbose at
//! every call site.

use serde_json::{Map, Value};

pub fn config_str<'a>(config: &'a Map<String, Value>, key: &str, default: &'a str) -> String {
    config
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

pub fn config_u64(config: &Map<String, Value>, key: &str, default: u64) -> u64 {
    config.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub fn config_bool(config: &Map<String, Value>, key: &str, default: bool) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn input_str(input: &Value, key: &str) -> Option<String> {
    input.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn input_u64(input: &Value, key: &str) -> Option<u64> {
    input.get(key).and_then(Value::as_u64)
}
