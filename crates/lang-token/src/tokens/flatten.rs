use serde_json::{Map as JsonMap, Value};

use super::{FlatTokenMap, TokenError};

/// Separator between path segments in a flat token key.
pub const PATH_SEPARATOR: char = '.';

/// Flatten a nested JSON document into dotted-path keys.
///
/// Anything other than an object or array at the top level yields an empty
/// map. Scalars are stored by their string form and `null` becomes `""`.
pub fn flatten(document: &Value) -> FlatTokenMap {
    let mut out = FlatTokenMap::new();
    flatten_into(document, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatTokenMap) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                visit(child, join_path(prefix, name), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit(child, join_path(prefix, &index.to_string()), out);
            }
        }
        _ => {}
    }
}

fn visit(value: &Value, key: String, out: &mut FlatTokenMap) {
    match value {
        Value::Object(_) | Value::Array(_) => flatten_into(value, &key, out),
        scalar => {
            out.insert(key, scalar_to_string(scalar));
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{name}")
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        // containers never reach here
        other => other.to_string(),
    }
}

/// Rebuild the nested document encoded by a flat token map.
///
/// Keys are processed in map order. When a key passes through a path that
/// currently holds a scalar, the scalar is replaced by an object; when a key
/// lands on a path that currently holds an object, the object is replaced by
/// the value. The later key always wins. Use [`try_unflatten`] to have such
/// collisions reported instead.
pub fn unflatten(map: &FlatTokenMap) -> Value {
    let mut root = JsonMap::new();
    for (key, value) in map {
        insert_lenient(&mut root, key, Value::String(value.clone()));
    }
    Value::Object(root)
}

/// Strict counterpart of [`unflatten`]: fails on the first key whose path
/// collides with a scalar ancestor or with an existing nested object.
pub fn try_unflatten(map: &FlatTokenMap) -> Result<Value, TokenError> {
    let mut root = JsonMap::new();
    for (key, value) in map {
        insert_strict(&mut root, key, Value::String(value.clone()))?;
    }
    Ok(Value::Object(root))
}

fn insert_lenient(root: &mut JsonMap<String, Value>, key: &str, value: Value) {
    let segments: Vec<&str> = key.split(PATH_SEPARATOR).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        if !slot.is_object() {
            *slot = Value::Object(JsonMap::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        current = map;
    }
    current.insert((*last).to_string(), value);
}

fn insert_strict(
    root: &mut JsonMap<String, Value>,
    key: &str,
    value: Value,
) -> Result<(), TokenError> {
    let segments: Vec<&str> = key.split(PATH_SEPARATOR).collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(JsonMap::new()));
        current = match slot {
            Value::Object(map) => map,
            _ => {
                return Err(TokenError::ConflictingKey {
                    key: key.to_string(),
                    ancestor: segments[..=depth].join("."),
                });
            }
        };
    }

    if current.get(*last).is_some_and(Value::is_object) {
        return Err(TokenError::ConflictingKey { key: key.to_string(), ancestor: key.to_string() });
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn flat(entries: &[(&str, &str)]) -> FlatTokenMap {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn flattens_nested_objects_in_document_order() {
        let doc = json!({
            "home": { "title": "Home", "menu": { "open": "Open", "close": "Close" } },
            "about": "About"
        });
        let map = flatten(&doc);
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["home.title", "home.menu.open", "home.menu.close", "about"]);
        assert_eq!(map["home.menu.close"], "Close");
    }

    #[test]
    fn non_object_documents_flatten_to_nothing() {
        assert!(flatten(&Value::Null).is_empty());
        assert!(flatten(&json!("text")).is_empty());
        assert!(flatten(&json!(42)).is_empty());
        assert!(flatten(&json!({})).is_empty());
    }

    #[test]
    fn scalars_are_stringified() {
        let doc = json!({ "n": 3, "f": 1.5, "yes": true, "nothing": null, "s": "x" });
        let map = flatten(&doc);
        assert_eq!(map["n"], "3");
        assert_eq!(map["f"], "1.5");
        assert_eq!(map["yes"], "true");
        assert_eq!(map["nothing"], "");
        assert_eq!(map["s"], "x");
    }

    #[test]
    fn arrays_use_numeric_indices() {
        let doc = json!({ "steps": ["one", { "label": "two" }] });
        let map = flatten(&doc);
        assert_eq!(map, flat(&[("steps.0", "one"), ("steps.1.label", "two")]));
    }

    #[test]
    fn unflatten_rebuilds_nested_objects() {
        let map = flat(&[("a.x", "1"), ("a.y", "2"), ("b", "3")]);
        assert_eq!(unflatten(&map), json!({ "a": { "x": "1", "y": "2" }, "b": "3" }));
    }

    #[test]
    fn unflatten_of_empty_map_is_empty_object() {
        assert_eq!(unflatten(&FlatTokenMap::new()), json!({}));
    }

    #[test]
    fn unflatten_preserves_insertion_order() {
        let map = flat(&[("z.b", "1"), ("a", "2"), ("z.a", "3")]);
        let rendered = serde_json::to_string(&unflatten(&map)).unwrap();
        assert_eq!(rendered, r#"{"z":{"b":"1","a":"3"},"a":"2"}"#);
    }

    #[test]
    fn later_key_overwrites_scalar_ancestor() {
        let map = flat(&[("a", "scalar"), ("a.b", "nested")]);
        assert_eq!(unflatten(&map), json!({ "a": { "b": "nested" } }));
    }

    #[test]
    fn later_scalar_replaces_existing_object() {
        let map = flat(&[("a.b", "nested"), ("a", "scalar")]);
        assert_eq!(unflatten(&map), json!({ "a": "scalar" }));
    }

    #[test]
    fn strict_unflatten_reports_scalar_ancestor() {
        let map = flat(&[("a.b", "ok"), ("a.b.c", "deeper")]);
        let err = try_unflatten(&map).unwrap_err();
        assert_eq!(
            err,
            TokenError::ConflictingKey { key: "a.b.c".into(), ancestor: "a.b".into() }
        );
    }

    #[test]
    fn strict_unflatten_reports_object_overwrite() {
        let map = flat(&[("a.b", "nested"), ("a", "scalar")]);
        let err = try_unflatten(&map).unwrap_err();
        assert_eq!(err, TokenError::ConflictingKey { key: "a".into(), ancestor: "a".into() });
    }

    #[test]
    fn strict_unflatten_matches_lenient_without_conflicts() {
        let map = flat(&[("home.title", "Home"), ("home.body", "Body"), ("footer", "F")]);
        assert_eq!(try_unflatten(&map).unwrap(), unflatten(&map));
    }

    #[test]
    fn flatten_after_unflatten_is_identity() {
        let doc = json!({
            "nav": { "home": "Home", "items": ["a", "b"] },
            "empty": "",
            "count": 7
        });
        let map = flatten(&doc);
        assert_eq!(flatten(&unflatten(&map)), map);
    }
}
