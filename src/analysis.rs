//! Reference semantic analyzer.
//!
//! Accepts a serialized source unit, resolves names and types, and returns the same tree
//! with solc-style annotations merged into its nodes. Rejections come back as
//! `AnalysisFailed` whose message is the diagnostic list, one `<Kind>: <message>` per line.
//!
//! The analyzer is intentionally partial: it understands the subset of the language the
//! reference parser produces, reports what it can prove wrong, and leaves types it cannot
//! derive as null descriptions rather than guessing.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::tree::{node_id, SyntaxTree};
use crate::Result;

mod resolver;
pub mod scope;
pub mod types;

use resolver::{Annotations, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    JsonError,
    DeclarationError,
    TypeError,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::JsonError => "JSONError",
            DiagnosticKind::DeclarationError => "DeclarationError",
            DiagnosticKind::TypeError => "TypeError",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    fn json(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::JsonError,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Node types the analyzer accepts. Anything else is rejected up front.
const KNOWN_NODE_TYPES: &[&str] = &[
    "ArrayTypeName",
    "Assignment",
    "BinaryOperation",
    "Block",
    "Break",
    "Conditional",
    "Continue",
    "ContractDefinition",
    "DoWhileStatement",
    "ElementaryTypeName",
    "ElementaryTypeNameExpression",
    "EmitStatement",
    "EnumDefinition",
    "EnumValue",
    "ErrorDefinition",
    "EventDefinition",
    "ExpressionStatement",
    "ForStatement",
    "FunctionCall",
    "FunctionCallOptions",
    "FunctionDefinition",
    "FunctionTypeName",
    "Identifier",
    "IdentifierPath",
    "IfStatement",
    "ImportDirective",
    "IndexAccess",
    "IndexRangeAccess",
    "InheritanceSpecifier",
    "InlineAssembly",
    "Literal",
    "Mapping",
    "MemberAccess",
    "ModifierDefinition",
    "ModifierInvocation",
    "NewExpression",
    "OverrideSpecifier",
    "ParameterList",
    "PlaceholderStatement",
    "PragmaDirective",
    "Return",
    "RevertStatement",
    "SourceUnit",
    "StructDefinition",
    "StructuredDocumentation",
    "TryCatchClause",
    "TryStatement",
    "TupleExpression",
    "UnaryOperation",
    "UncheckedBlock",
    "UserDefinedTypeName",
    "UserDefinedValueTypeDefinition",
    "UsingForDirective",
    "VariableDeclaration",
    "VariableDeclarationStatement",
    "WhileStatement",
];

/// Analyzes a serialized source unit named `source_name`.
pub fn analyze(tree_json: &str, source_name: &str) -> Result<SyntaxTree> {
    let mut unit: Value = serde_json::from_str(tree_json)
        .map_err(|err| failure(&[Diagnostic::json(err.to_string())]))?;

    let problems = validate(&unit);
    if !problems.is_empty() {
        return Err(failure(&problems));
    }
    if let Some(fields) = unit.as_object_mut() {
        fields
            .entry("absolutePath")
            .or_insert_with(|| Value::String(source_name.to_string()));
    }

    let (annotations, diagnostics) = Resolver::new(&unit).run();
    if !diagnostics.is_empty() {
        debug!(source_name, count = diagnostics.len(), "analysis rejected source unit");
        return Err(failure(&diagnostics));
    }

    apply(&mut unit, &annotations);
    debug!(source_name, annotated = annotations.len(), "analysis succeeded");
    Ok(unit)
}

fn failure(diagnostics: &[Diagnostic]) -> crate::StitchError {
    let text = diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    crate::err_msg!(AnalysisFailed, text)
}

/// Structural checks the resolver relies on.
fn validate(unit: &Value) -> Vec<Diagnostic> {
    if unit.get("nodeType").and_then(Value::as_str) != Some("SourceUnit") {
        return vec![Diagnostic::json("Expected a SourceUnit at the root of the AST.")];
    }
    if !unit.get("nodes").is_some_and(Value::is_array) {
        return vec![Diagnostic::json("SourceUnit has no \"nodes\" list.")];
    }

    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    check_nodes(unit, &mut seen, &mut reported, &mut problems);
    problems
}

fn check_nodes(
    value: &Value,
    seen: &mut HashSet<u64>,
    reported: &mut HashSet<String>,
    problems: &mut Vec<Diagnostic>,
) {
    match value {
        Value::Object(fields) => {
            if let Some(tag) = fields.get("nodeType") {
                let tag = tag.as_str().unwrap_or("<non-string>");
                let mut report = |message: String| {
                    if reported.insert(message.clone()) {
                        problems.push(Diagnostic::json(message));
                    }
                };
                if !KNOWN_NODE_TYPES.contains(&tag) {
                    report(format!("Unknown node type \"{tag}\"."));
                }
                match node_id(value) {
                    Some(id) if !seen.insert(id) => report(format!("Node id {id} is not unique.")),
                    Some(_) => {}
                    None => report(format!("Node of type \"{tag}\" has no valid id.")),
                }
            }
            for child in fields.values() {
                check_nodes(child, seen, reported, problems);
            }
        }
        Value::Array(items) => {
            for item in items {
                check_nodes(item, seen, reported, problems);
            }
        }
        _ => {}
    }
}

fn apply(value: &mut Value, annotations: &Annotations) {
    match value {
        Value::Object(fields) => {
            if let Some(extra) = fields
                .get("id")
                .and_then(Value::as_u64)
                .and_then(|id| annotations.get(&id))
            {
                for (key, annotation) in extra {
                    fields.insert(key.clone(), annotation.clone());
                }
            }
            for child in fields.values_mut() {
                apply(child, annotations);
            }
        }
        Value::Array(items) => {
            for item in items {
                apply(item, annotations);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse;
    use crate::tree::find_member;
    use crate::ErrorType;

    fn analyze_source(source: &str) -> Result<SyntaxTree> {
        let unit = parse(source, "Test.sol", 256).unwrap();
        analyze(&unit.to_string(), "Test.sol")
    }

    #[test]
    fn identifiers_resolve_to_state_variables() {
        let unit = analyze_source(
            "contract C { uint256 private x; function f() public view returns (uint256) { return x + 1; } }",
        )
        .unwrap();
        let contract = &unit["nodes"][0];
        let x = &contract["nodes"][0];
        let ret = &contract["nodes"][1]["body"]["statements"][0];
        let operand = &ret["expression"]["leftExpression"];
        assert_eq!(operand["referencedDeclaration"], x["id"]);
        assert_eq!(operand["typeDescriptions"]["typeString"], "uint256");
        assert_eq!(ret["expression"]["typeDescriptions"]["typeString"], "uint256");
        assert_eq!(ret["functionReturnParameters"], contract["nodes"][1]["returnParameters"]["id"]);
    }

    #[test]
    fn undeclared_identifiers_are_rejected() {
        let err = analyze_source("contract C { function f() public { y = 1; } }").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::AnalysisFailed);
        assert_eq!(err.message(), "DeclarationError: Undeclared identifier \"y\".");
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let tree = serde_json::json!({
            "id": 2, "nodeType": "SourceUnit", "nodes": [
                {"id": 1, "nodeType": "ContractDefinition", "name": "A",
                 "nodes": [], "baseContracts": []},
                {"id": 1, "nodeType": "ContractDefinition", "name": "B",
                 "nodes": [], "baseContracts": []}
            ]
        });
        let err = analyze(&tree.to_string(), "Dup.sol").unwrap_err();
        assert_eq!(err.message(), "JSONError: Node id 1 is not unique.");
    }

    #[test]
    fn unknown_node_types_and_roots_are_rejected() {
        let err = analyze(r#"{"id": 0, "nodeType": "Program", "nodes": []}"#, "X.sol").unwrap_err();
        assert!(err.message().starts_with("JSONError: Expected a SourceUnit"));

        let tree = serde_json::json!({
            "id": 1, "nodeType": "SourceUnit", "nodes": [{"id": 0, "nodeType": "Banana"}]
        });
        let err = analyze(&tree.to_string(), "X.sol").unwrap_err();
        assert_eq!(err.message(), "JSONError: Unknown node type \"Banana\".");

        let err = analyze("{not json", "X.sol").unwrap_err();
        assert!(err.message().starts_with("JSONError:"));
    }

    #[test]
    fn inherited_members_resolve_but_private_ones_do_not() {
        let ok = analyze_source(
            "contract A { uint256 internal shared; } contract B is A { function f() public view returns (uint256) { return shared; } }",
        )
        .unwrap();
        let b = &ok["nodes"][1];
        let a_id = &ok["nodes"][0]["id"];
        assert_eq!(b["linearizedBaseContracts"][1], *a_id);
        assert_eq!(b["baseContracts"][0]["baseName"]["referencedDeclaration"], *a_id);

        let err = analyze_source(
            "contract A { uint256 private hidden; } contract B is A { function f() public view returns (uint256) { return hidden; } }",
        )
        .unwrap_err();
        assert!(err.message().contains("Undeclared identifier \"hidden\""));
    }

    #[test]
    fn bases_must_be_declared_first() {
        let err = analyze_source("contract B is A {} contract A {}").unwrap_err();
        assert!(err.message().contains("has to precede definition of derived contract"));
    }

    #[test]
    fn overloads_are_allowed_but_exact_duplicates_are_not() {
        assert!(analyze_source(
            "contract C { function f(uint256 a) public {} function f(bool b) public {} }"
        )
        .is_ok());

        let err = analyze_source(
            "contract C { function f(uint256 a) public {} function f(uint256 b) public {} }",
        )
        .unwrap_err();
        assert!(err
            .message()
            .contains("Function with same name and parameter types defined twice"));

        let err = analyze_source("contract C { uint256 x; bool x; }").unwrap_err();
        assert!(err.message().contains("Identifier already declared"));
    }

    #[test]
    fn return_checks() {
        let err = analyze_source(
            "contract C { function f() public pure returns (uint256) { return (1, 2); } }",
        )
        .unwrap_err();
        assert!(err.message().starts_with("TypeError: Different number of arguments"));

        let err = analyze_source(
            "contract C { function f() public pure returns (uint256) { return true; } }",
        )
        .unwrap_err();
        assert!(err
            .message()
            .contains("Return argument type bool is not implicitly convertible"));
    }

    #[test]
    fn magic_globals_and_modifiers_resolve() {
        let unit = analyze_source(
            "contract C { address owner; modifier onlyOwner() { require(msg.sender == owner, \"no\"); _; } function f() public onlyOwner {} }",
        )
        .unwrap();
        let contract = &unit["nodes"][0];
        let modifier = find_member(contract, "onlyOwner").unwrap();
        let call = &modifier["body"]["statements"][0]["expression"];
        assert_eq!(call["expression"]["referencedDeclaration"], -18);
        assert_eq!(call["kind"], "functionCall");
        let sender = &call["arguments"][0]["leftExpression"];
        assert_eq!(sender["typeDescriptions"]["typeString"], "address");

        let f = find_member(contract, "f").unwrap();
        assert_eq!(f["modifiers"][0]["modifierName"]["referencedDeclaration"], modifier["id"]);
    }

    #[test]
    fn structs_and_enums_get_canonical_names() {
        let unit = analyze_source(
            "contract C { struct P { uint256 a; } enum E { X, Y } P p; function f() public view returns (uint256) { return p.a; } }",
        )
        .unwrap();
        let contract = &unit["nodes"][0];
        assert_eq!(contract["nodes"][0]["canonicalName"], "C.P");
        assert_eq!(contract["nodes"][1]["canonicalName"], "C.E");
        let p = &contract["nodes"][2];
        assert_eq!(p["typeDescriptions"]["typeString"], "struct P storage ref");
        let read = &contract["nodes"][3]["body"]["statements"][0]["expression"];
        assert_eq!(read["referencedDeclaration"], contract["nodes"][0]["members"][0]["id"]);
        assert_eq!(unit["exportedSymbols"]["C"][0], contract["id"]);
    }

    #[test]
    fn abstract_functions_clear_fully_implemented() {
        let unit = analyze_source(
            "abstract contract A { function f() public virtual; } contract B is A { function f() public override {} }",
        )
        .unwrap();
        assert_eq!(unit["nodes"][0]["fullyImplemented"], false);
        assert_eq!(unit["nodes"][1]["fullyImplemented"], true);
    }
}
