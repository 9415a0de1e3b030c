//! Generic operations over untyped syntax trees.
//!
//! A [`SyntaxTree`] is the JSON value the parser produced. Nothing here knows the full
//! node schema; the only fields inspected are `id`, `nodeType`, `name` and `nodes`.

use serde_json::{Map, Number, Value};

/// A parsed (or analysed) tree in its JSON interchange form.
pub type SyntaxTree = Value;

/// `nodeType` tag of container declarations.
pub const CONTAINER_NODE_TYPE: &str = "ContractDefinition";

/// Returns the largest integer stored under an `id` key anywhere in `tree`, or 0.
pub fn find_max_id(tree: &SyntaxTree) -> u64 {
    fn walk(value: &Value, max_id: &mut u64) {
        match value {
            Value::Object(map) => {
                if let Some(id) = map.get("id").and_then(Value::as_u64) {
                    *max_id = (*max_id).max(id);
                }
                for child in map.values() {
                    walk(child, max_id);
                }
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, max_id);
                }
            }
            _ => {}
        }
    }

    let mut max_id = 0;
    walk(tree, &mut max_id);
    max_id
}

/// Adds `offset` to every integer `id` in `tree`, in place.
///
/// Only keys literally named `id` change. Cross references such as
/// `referencedDeclaration` or `scope` are left alone. Ids that would overflow saturate at
/// `u64::MAX`; callers that need uniqueness use [`try_renumber_ids`].
pub fn renumber_ids(tree: &mut SyntaxTree, offset: u64) {
    match tree {
        Value::Object(map) => {
            if let Some(id_value) = map.get_mut("id") {
                if let Some(id) = id_value.as_u64() {
                    *id_value = Value::Number(Number::from(id.saturating_add(offset)));
                }
            }
            for child in map.values_mut() {
                renumber_ids(child, offset);
            }
        }
        Value::Array(items) => {
            for item in items {
                renumber_ids(item, offset);
            }
        }
        _ => {}
    }
}

/// Like [`renumber_ids`], but leaves `tree` untouched and returns `false` when some id
/// plus `offset` would not fit in a `u64`.
pub fn try_renumber_ids(tree: &mut SyntaxTree, offset: u64) -> bool {
    if find_max_id(tree).checked_add(offset).is_none() {
        return false;
    }
    renumber_ids(tree, offset);
    true
}

/// Every integer `id` in `tree`, in traversal order.
pub fn collect_ids(tree: &SyntaxTree) -> Vec<u64> {
    fn walk(value: &Value, ids: &mut Vec<u64>) {
        match value {
            Value::Object(map) => {
                if let Some(id) = map.get("id").and_then(Value::as_u64) {
                    ids.push(id);
                }
                for child in map.values() {
                    walk(child, ids);
                }
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, ids);
                }
            }
            _ => {}
        }
    }

    let mut ids = Vec::new();
    walk(tree, &mut ids);
    ids
}

pub fn node_type(node: &Value) -> Option<&str> {
    node.get("nodeType").and_then(Value::as_str)
}

pub fn node_name(node: &Value) -> Option<&str> {
    node.get("name").and_then(Value::as_str)
}

pub fn node_id(node: &Value) -> Option<u64> {
    node.get("id").and_then(Value::as_u64)
}

pub fn is_container(node: &Value) -> bool {
    node_type(node) == Some(CONTAINER_NODE_TYPE)
}

/// The ordered member list of a container (or the top-level list of a source unit).
pub fn child_nodes(node: &Value) -> Option<&Vec<Value>> {
    node.get("nodes").and_then(Value::as_array)
}

pub fn child_nodes_mut(node: &mut Value) -> Option<&mut Vec<Value>> {
    node.get_mut("nodes").and_then(Value::as_array_mut)
}

/// Looks up a direct member of a container by name.
pub fn find_member<'a>(container: &'a Value, name: &str) -> Option<&'a Value> {
    child_nodes(container)?
        .iter()
        .find(|member| node_name(member) == Some(name))
}

/// Returns a copy of `value` with the bookkeeping keys (`id`, `src`) removed at every level.
///
/// Two subtrees that differ only in numbering and source positions compare equal afterwards.
pub fn strip_positions(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "src")
                .map(|(key, child)| (key.clone(), strip_positions(child)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_positions).collect()),
        other => other.clone(),
    }
}
