//! Argument-tree helpers.
//!
//! # Responsibilities
//! - Decode form-encoded query strings into nested argument trees
//!   (bracketed-key convention, `a[b][c]=1` and `a[]=x` styles)
//! - Recursive overrule merge of two argument trees
//! - Path-based insertion into an existing tree
//!
//! # Design Decisions
//! - Trees are `serde_json` objects; `preserve_order` keeps key order stable
//! - Merge semantics: maps merge recursively, anything else is overruled by
//!   the right-hand side

use serde_json::{Map, Value};

/// Decode a raw query string into a nested argument tree.
///
/// `a=1&b[c]=2&d[]=x&d[]=y` becomes `{a: "1", b: {c: "2"}, d: ["x", "y"]}`.
pub fn parse_query_tree(query: &str) -> Map<String, Value> {
    let mut tree = Map::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        insert_pair(&mut tree, &name, &value);
    }
    tree
}

/// Ordered, de-duplicated top-level key names of a raw query string.
///
/// Bracketed names reduce to the segment before the first `[`, matching how
/// form decoding groups them under one top-level key.
pub fn top_level_keys(query: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for (name, _) in url::form_urlencoded::parse(query.as_bytes()) {
        let name: &str = &name;
        let top = match name.find('[') {
            Some(idx) => &name[..idx],
            None => name,
        };
        if top.is_empty() {
            continue;
        }
        if !keys.iter().any(|k| k == top) {
            keys.push(top.to_string());
        }
    }
    keys
}

/// Merge `overlay` into `base`. Nested maps merge recursively; on any other
/// conflict the overlay value wins.
pub fn merge_overrule(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_overrule(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Insert `value` at a dotted path, creating intermediate containers as
/// needed. A numeric segment addresses a sequence position (existing
/// position overwritten, out-of-range appended), any other segment a map
/// key; a scalar node on the way is replaced by a container.
pub fn set_by_dotted_path(tree: &mut Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => {}
        [leaf] => {
            tree.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = tree
                .entry((*head).to_string())
                .or_insert_with(|| container_for(rest[0]));
            set_in_value(entry, rest, value);
        }
    }
}

fn container_for(segment: &str) -> Value {
    if segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn set_in_value(node: &mut Value, segments: &[&str], value: Value) {
    let Some((&head, rest)) = segments.split_first() else {
        return;
    };

    if let (Value::Array(items), Ok(index)) = (&mut *node, head.parse::<usize>()) {
        if rest.is_empty() {
            if index < items.len() {
                items[index] = value;
            } else {
                items.push(value);
            }
            return;
        }
        let len = items.len();
        let slot = if index < len {
            &mut items[index]
        } else {
            items.push(container_for(rest[0]));
            &mut items[len]
        };
        set_in_value(slot, rest, value);
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        if rest.is_empty() {
            map.insert(head.to_string(), value);
            return;
        }
        let entry = map
            .entry(head.to_string())
            .or_insert_with(|| container_for(rest[0]));
        set_in_value(entry, rest, value);
    }
}

fn insert_pair(tree: &mut Map<String, Value>, name: &str, value: &str) {
    let segments = split_bracketed(name);
    if let Some((head, rest)) = segments.split_first() {
        insert_nested(tree, head, rest, Value::String(value.to_string()));
    }
}

/// `a[b][c]` -> ["a", "b", "c"]; `a[]` -> ["a", ""].
fn split_bracketed(name: &str) -> Vec<String> {
    let Some(idx) = name.find('[') else {
        return vec![name.to_string()];
    };
    let mut segments = vec![name[..idx].to_string()];
    let mut current = String::new();
    let mut in_bracket = false;
    for ch in name[idx..].chars() {
        match ch {
            '[' if !in_bracket => {
                in_bracket = true;
                current.clear();
            }
            ']' if in_bracket => {
                in_bracket = false;
                segments.push(current.clone());
            }
            other => current.push(other),
        }
    }
    segments
}

fn insert_nested(tree: &mut Map<String, Value>, head: &str, rest: &[String], value: Value) {
    if rest.is_empty() {
        tree.insert(head.to_string(), value);
        return;
    }

    let next = &rest[0];
    if next.is_empty() {
        // "name[]" appends to a sequence under `head`
        let entry = tree
            .entry(head.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            if rest.len() == 1 {
                items.push(value);
            } else {
                let mut child = Map::new();
                insert_nested(&mut child, &rest[1], &rest[2..], value);
                items.push(Value::Object(child));
            }
        }
        return;
    }

    let entry = tree
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(child) = entry {
        insert_nested(child, next, &rest[1..], value);
    }
}
