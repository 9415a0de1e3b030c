//! Grafting fragment members into a container.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::tree::{child_nodes_mut, collect_ids, node_id, node_name, node_type, SyntaxTree};
use crate::Result;

/// What happens when a fragment member collides with an existing container member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// Append everything; duplicates are left for the analyzer to reject.
    #[default]
    Append,
    /// Swap colliding members in place, reusing their ids so references to them still hold.
    Replace,
}

/// Top-level ids of the members a merge inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub appended: Vec<u64>,
    pub replaced: Vec<u64>,
}

/// Identity of a container member for conflict detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConflictKey {
    Function {
        name: String,
        signature: Vec<String>,
        kind: String,
    },
    Named {
        node_type: String,
        name: String,
    },
}

fn conflict_key(member: &Value) -> Option<ConflictKey> {
    let name = node_name(member).unwrap_or_default().to_string();
    match node_type(member)? {
        "FunctionDefinition" => Some(ConflictKey::Function {
            name,
            signature: parameter_signature(member),
            kind: member
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or("function")
                .to_string(),
        }),
        node_type @ ("VariableDeclaration"
        | "EventDefinition"
        | "ErrorDefinition"
        | "ModifierDefinition"
        | "StructDefinition"
        | "EnumDefinition"
        | "UserDefinedValueTypeDefinition") => Some(ConflictKey::Named {
            node_type: node_type.to_string(),
            name,
        }),
        _ => None,
    }
}

/// Keys that differ between a parse-only type name and the same type name after analysis.
const SIGNATURE_NOISE: &[&str] = &["id", "src", "typeDescriptions", "referencedDeclaration"];

/// Parameter types as the parser wrote them, so parsed fragments and analyzed targets
/// produce the same key.
fn parameter_signature(function: &Value) -> Vec<String> {
    function["parameters"]["parameters"]
        .as_array()
        .map_or(&[][..], Vec::as_slice)
        .iter()
        .map(|parameter| type_shape(&parameter["typeName"]).to_string())
        .collect()
}

fn type_shape(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !SIGNATURE_NOISE.contains(&key.as_str()))
                .map(|(key, child)| (key.clone(), type_shape(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(type_shape).collect()),
        other => other.clone(),
    }
}

/// Rewrites `node`'s ids, in traversal order, to the ids in `snapshot`. Ids beyond the
/// snapshot keep their current values.
fn adopt_ids(node: &mut Value, snapshot: &mut std::slice::Iter<'_, u64>) {
    match node {
        Value::Object(map) => {
            if let Some(id_value) = map.get_mut("id") {
                if id_value.is_u64() {
                    if let Some(&reused) = snapshot.next() {
                        *id_value = Value::Number(Number::from(reused));
                    }
                }
            }
            for child in map.values_mut() {
                adopt_ids(child, snapshot);
            }
        }
        Value::Array(items) => {
            for item in items {
                adopt_ids(item, snapshot);
            }
        }
        _ => {}
    }
}

/// Adds `members` to `container`'s `nodes` list.
///
/// Members must already be numbered above every id in the target. Under
/// [`ConflictStrategy::Replace`] a member that collides with an existing one takes its slot
/// and its ids; the leftovers keep their fresh ids, so uniqueness still holds.
pub fn merge_members(
    container: &mut SyntaxTree,
    members: Vec<SyntaxTree>,
    strategy: ConflictStrategy,
) -> Result<MergeReport> {
    let existing = child_nodes_mut(container).ok_or_else(|| {
        crate::err_msg!(
            InvalidContractStructure,
            "target contract has no member list"
        )
    })?;
    let mut report = MergeReport::default();

    let mut slots: HashMap<ConflictKey, usize> = HashMap::new();
    if strategy == ConflictStrategy::Replace {
        for (index, member) in existing.iter().enumerate() {
            if let Some(key) = conflict_key(member) {
                slots.entry(key).or_insert(index);
            }
        }
    }

    for mut member in members {
        let slot = conflict_key(&member).and_then(|key| slots.remove(&key));
        match slot {
            Some(index) => {
                let snapshot = collect_ids(&existing[index]);
                adopt_ids(&mut member, &mut snapshot.iter());
                report.replaced.extend(node_id(&member));
                existing[index] = member;
            }
            None => {
                report.appended.extend(node_id(&member));
                existing.push(member);
            }
        }
    }

    Ok(report)
}
