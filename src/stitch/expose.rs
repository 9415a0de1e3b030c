//! Widening member visibility so stitched code can reach it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::{child_nodes_mut, is_container, node_id, node_name, node_type, SyntaxTree};
use crate::{Result, StitchError};

/// A family of container members [`expose_members`] may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberKind {
    /// State variables.
    Variables,
    /// Ordinary functions. Constructors, modifiers, fallback and receive are never touched.
    Functions,
}

impl MemberKind {
    fn matches(self, member: &Value) -> bool {
        match (self, node_type(member)) {
            (MemberKind::Variables, Some("VariableDeclaration")) => true,
            (MemberKind::Functions, Some("FunctionDefinition")) => {
                member.get("kind").and_then(Value::as_str).unwrap_or("function") == "function"
            }
            _ => false,
        }
    }
}

fn is_hidden(member: &Value) -> bool {
    matches!(
        member.get("visibility").and_then(Value::as_str),
        Some("private" | "internal")
    )
}

/// Makes private and internal members of the given kinds public, in place.
///
/// With `container_name` only the first container so named is touched; otherwise every
/// container in the unit. Returns the ids of the members that changed, in tree order.
pub fn expose_members(
    tree: &mut SyntaxTree,
    container_name: Option<&str>,
    kinds: &[MemberKind],
) -> Result<Vec<u64>> {
    let nodes = child_nodes_mut(tree).ok_or_else(|| {
        crate::err_msg!(
            InvalidContractStructure,
            "target tree has no top-level nodes list"
        )
    })?;

    let mut containers: Vec<&mut Value> =
        nodes.iter_mut().filter(|node| is_container(node)).collect();
    if containers.is_empty() {
        return Err(crate::err_msg!(
            InvalidContractStructure,
            "target tree contains no contract definitions"
        ));
    }
    if let Some(name) = container_name {
        let position = containers
            .iter()
            .position(|node| node_name(node) == Some(name))
            .ok_or_else(|| StitchError::container_not_found(name))?;
        containers = vec![containers.swap_remove(position)];
    }

    let mut changed = Vec::new();
    for container in containers {
        let Some(members) = child_nodes_mut(container) else {
            continue;
        };
        for member in members.iter_mut() {
            if !kinds.iter().any(|kind| kind.matches(member)) || !is_hidden(member) {
                continue;
            }
            if let Some(map) = member.as_object_mut() {
                map.insert("visibility".into(), Value::from("public"));
            }
            changed.extend(node_id(member));
        }
    }
    Ok(changed)
}
