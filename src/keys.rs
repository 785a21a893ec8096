use serde_json::{Map, Value};

/// `desiredProfitPercent` -> `desired_profit_percent`.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `desired_profit_percent` -> `desiredProfitPercent`.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' && !out.is_empty() {
            upper_next = true;
            continue;
        }
        if upper_next && ch.is_ascii_lowercase() {
            out.push(ch.to_ascii_uppercase());
        } else {
            if upper_next {
                out.push('_');
            }
            out.push(ch);
        }
        upper_next = false;
    }
    if upper_next {
        out.push('_');
    }
    out
}

fn map_keys(value: Value, f: fn(&str) -> String) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (k, v) in obj {
                out.insert(f(&k), map_keys(v, f));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_keys(v, f)).collect()),
        other => other,
    }
}

/// Converts every object key, at any depth, to snake_case.
pub fn keys_to_snake(value: Value) -> Value {
    map_keys(value, to_snake_case)
}

/// Converts every object key, at any depth, to camelCase.
pub fn keys_to_camel(value: Value) -> Value {
    map_keys(value, to_camel_case)
}
