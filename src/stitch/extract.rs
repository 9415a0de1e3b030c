//! Pulling declarations out of a parsed, wrapped fragment.

use crate::tree::{child_nodes, is_container, node_name, SyntaxTree};
use crate::{Result, StitchError};

/// The member declarations of the synthetic container named `container`, in source order.
///
/// `NoNodesFound` when the container is missing or holds nothing (an empty or comment-only
/// fragment).
pub fn extract_members(wrapped: &SyntaxTree, container: &str) -> Result<Vec<SyntaxTree>> {
    let synthetic = child_nodes(wrapped)
        .into_iter()
        .flatten()
        .find(|node| is_container(node) && node_name(node) == Some(container))
        .ok_or_else(|| {
            crate::err_msg!(
                NoNodesFound,
                "fragment tree has no synthetic contract '{}'",
                container
            )
        })?;

    members_of(synthetic)
}

/// The member declarations of an already parsed fragment unit.
///
/// The donor is the container named `preferred`, or else the unit's last container.
pub fn extract_donor_members(unit: &SyntaxTree, preferred: &str) -> Result<Vec<SyntaxTree>> {
    let containers: Vec<&SyntaxTree> = child_nodes(unit)
        .into_iter()
        .flatten()
        .filter(|node| is_container(node))
        .collect();
    let donor = containers
        .iter()
        .find(|node| node_name(node) == Some(preferred))
        .or_else(|| containers.last())
        .ok_or_else(|| crate::err_msg!(NoNodesFound, "fragment tree contains no contract"))?;
    members_of(donor)
}

fn members_of(container: &SyntaxTree) -> Result<Vec<SyntaxTree>> {
    let members = child_nodes(container).cloned().unwrap_or_default();
    if members.is_empty() {
        return Err(crate::err_msg!(NoNodesFound, "fragment contains no declarations"));
    }
    Ok(members)
}

/// Like [`extract_members`], with each declaration serialized on its own.
pub fn to_ast_nodes(wrapped: &SyntaxTree, container: &str) -> Result<Vec<String>> {
    extract_members(wrapped, container)?
        .iter()
        .map(|member| serde_json::to_string(member).map_err(StitchError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::ErrorType;

    fn wrapped(members: Value) -> SyntaxTree {
        json!({
            "id": 9, "nodeType": "SourceUnit", "nodes": [
                {"id": 0, "nodeType": "PragmaDirective"},
                {"id": 8, "nodeType": "ContractDefinition", "name": "__StitchFragment",
                 "nodes": members}
            ]
        })
    }

    #[test]
    fn members_come_back_in_order() {
        let tree = wrapped(json!([
            {"id": 3, "nodeType": "FunctionDefinition", "name": "a"},
            {"id": 7, "nodeType": "FunctionDefinition", "name": "b"}
        ]));
        let members = extract_members(&tree, "__StitchFragment").unwrap();
        let names: Vec<_> = members.iter().filter_map(node_name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn serialized_nodes_reparse_independently() {
        let tree = wrapped(json!([{"id": 3, "nodeType": "VariableDeclaration", "name": "x"}]));
        let nodes = to_ast_nodes(&tree, "__StitchFragment").unwrap();
        let back: Value = serde_json::from_str(&nodes[0]).unwrap();
        assert_eq!(back["name"], "x");
    }

    #[test]
    fn empty_or_missing_container_is_no_nodes_found() {
        let err = extract_members(&wrapped(json!([])), "__StitchFragment").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NoNodesFound);

        let err = extract_members(&wrapped(json!([])), "Other").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NoNodesFound);
    }

    #[test]
    fn donors_fall_back_to_the_last_container() {
        let unit = json!({
            "id": 9, "nodeType": "SourceUnit", "nodes": [
                {"id": 2, "nodeType": "ContractDefinition", "name": "A",
                 "nodes": [{"id": 1, "nodeType": "VariableDeclaration", "name": "a"}]},
                {"id": 4, "nodeType": "ContractDefinition", "name": "B",
                 "nodes": [{"id": 3, "nodeType": "VariableDeclaration", "name": "b"}]}
            ]
        });
        let by_name = extract_donor_members(&unit, "A").unwrap();
        assert_eq!(node_name(&by_name[0]), Some("a"));
        let fallback = extract_donor_members(&unit, "__StitchFragment").unwrap();
        assert_eq!(node_name(&fallback[0]), Some("b"));

        let bare = json!({"id": 0, "nodeType": "SourceUnit", "nodes": []});
        let err = extract_donor_members(&bare, "__StitchFragment").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NoNodesFound);
    }
}
