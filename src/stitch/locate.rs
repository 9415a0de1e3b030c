//! Choosing the container a fragment is stitched into.

use serde::{Deserialize, Serialize};

use crate::tree::{child_nodes, is_container, node_name, SyntaxTree};
use crate::{Result, StitchError};

/// Which container to use when the caller does not name one.
///
/// This is a convenience heuristic, not a content-aware choice. Callers that care about a
/// particular container in a multi-container file should name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerPolicy {
    /// The last container in the file. Derived and consuming contracts usually come last.
    #[default]
    Last,
    First,
    /// The container with the most members; ties go to the later one.
    MostMembers,
}

impl ContainerPolicy {
    fn choose<'a>(
        self,
        candidates: impl Iterator<Item = (usize, &'a SyntaxTree)>,
    ) -> Option<usize> {
        match self {
            ContainerPolicy::Last => candidates.last().map(|(index, _)| index),
            ContainerPolicy::First => candidates.map(|(index, _)| index).next(),
            ContainerPolicy::MostMembers => candidates
                .max_by_key(|(_, node)| child_nodes(node).map_or(0, Vec::len))
                .map(|(index, _)| index),
        }
    }
}

/// Index, within the target's top-level `nodes`, of the container to stitch into.
///
/// With a name, the first container so named; otherwise the one `policy` selects.
pub fn find_target_container_index(
    target: &SyntaxTree,
    name: Option<&str>,
    policy: ContainerPolicy,
) -> Result<usize> {
    let nodes = child_nodes(target).ok_or_else(|| {
        crate::err_msg!(
            InvalidContractStructure,
            "target tree has no top-level nodes list"
        )
    })?;
    let containers = nodes.iter().enumerate().filter(|(_, node)| is_container(node));

    match name {
        Some(name) => containers
            .filter(|(_, node)| node_name(node) == Some(name))
            .map(|(index, _)| index)
            .next()
            .ok_or_else(|| StitchError::container_not_found(name)),
        None => policy.choose(containers).ok_or_else(|| {
            crate::err_msg!(InvalidContractStructure, "No ContractDefinition found")
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorType;

    fn unit() -> SyntaxTree {
        json!({
            "id": 10, "nodeType": "SourceUnit", "nodes": [
                {"id": 0, "nodeType": "PragmaDirective"},
                {"id": 3, "nodeType": "ContractDefinition", "name": "First",
                 "nodes": [{"id": 1}, {"id": 2}]},
                {"id": 5, "nodeType": "ContractDefinition", "name": "Second", "nodes": [{"id": 4}]},
                {"id": 6, "nodeType": "StructDefinition", "name": "Loose"},
                {"id": 9, "nodeType": "ContractDefinition", "name": "Target",
                 "nodes": [{"id": 7}, {"id": 8}]}
            ]
        })
    }

    #[test]
    fn policies_pick_their_container() {
        let tree = unit();
        assert_eq!(find_target_container_index(&tree, None, ContainerPolicy::Last).unwrap(), 4);
        assert_eq!(find_target_container_index(&tree, None, ContainerPolicy::First).unwrap(), 1);
        assert_eq!(
            find_target_container_index(&tree, None, ContainerPolicy::MostMembers).unwrap(),
            4
        );
    }

    #[test]
    fn names_override_the_policy() {
        let tree = unit();
        let index = find_target_container_index(&tree, Some("Second"), ContainerPolicy::Last);
        assert_eq!(index.unwrap(), 2);

        // Only containers count, even when another node has the name.
        let err = find_target_container_index(&tree, Some("Loose"), ContainerPolicy::Last)
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidContractStructure);
        assert_eq!(err.subject(), Some("Loose"));
        assert_eq!(err.message(), "Contract 'Loose' not found");
    }

    #[test]
    fn no_containers_or_no_nodes_is_invalid_structure() {
        let empty = json!({
            "id": 1, "nodeType": "SourceUnit",
            "nodes": [{"id": 0, "nodeType": "PragmaDirective"}]
        });
        let err = find_target_container_index(&empty, None, ContainerPolicy::Last).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidContractStructure);

        let malformed = json!({"nodeType": "SourceUnit", "children": []});
        let err = find_target_container_index(&malformed, None, ContainerPolicy::First)
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidContractStructure);
    }

    #[test]
    fn policy_names_deserialize_camel_case() {
        let policy: ContainerPolicy = serde_json::from_str("\"mostMembers\"").unwrap();
        assert_eq!(policy, ContainerPolicy::MostMembers);
    }
}
