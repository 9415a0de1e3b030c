//! The reference analyzer as seen through the public entry points.

mod common;

use ast_stitch::analysis::analyze;
use ast_stitch::tree::{collect_ids, find_member};
use ast_stitch::{ErrorType, Stitcher};
use common::*;
use serde_json::json;

#[test]
fn malformed_json_is_a_json_error() {
    let err = analyze("{ not json", "A.sol").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::AnalysisFailed);
    assert!(err.message().starts_with("JSONError: "));
}

#[test]
fn missing_absolute_path_is_filled_in() {
    let mut unit = parse("contract A { uint256 x; }");
    unit.as_object_mut().unwrap().remove("absolutePath");
    let analyzed = Stitcher::new().analyze_tree(&unit, "Named.sol").unwrap();
    assert_eq!(analyzed["absolutePath"], "Named.sol");
}

#[test]
fn analysis_adds_annotations_but_never_ids() {
    let unit = parse(MY_CONTRACT);
    let analyzed = Stitcher::new().analyze_tree(&unit, "Contract.sol").unwrap();
    assert_eq!(collect_ids(&analyzed), collect_ids(&unit));

    let my_contract = contract(&analyzed, "MyContract");
    assert_eq!(my_contract["name"], "MyContract");
    assert_eq!(my_contract["scope"], analyzed["id"]);
    assert_eq!(my_contract["fullyImplemented"], true);
    assert_eq!(
        analyzed["exportedSymbols"]["MyContract"],
        json!([my_contract["id"]])
    );
}

#[test]
fn analysis_is_deterministic() {
    let unit = parse(MY_CONTRACT);
    let stitcher = Stitcher::new();
    let merged = stitcher.stitch_tree(EXPLOIT, &unit, None).unwrap().tree;
    let first = stitcher.analyze_tree(&merged, "Contract.sol").unwrap();
    let second = stitcher.analyze_tree(&merged, "Contract.sol").unwrap();
    assert_eq!(first, second);
}

#[test]
fn every_diagnostic_is_reported_on_its_own_line() {
    let fragment = "function f() public { a = 1; b = 2; }";
    let err = Stitcher::new()
        .stitch_into_source(fragment, MY_CONTRACT, None, None)
        .unwrap_err();
    let lines: Vec<&str> = err.message().lines().collect();
    assert_eq!(
        lines,
        [
            "DeclarationError: Undeclared identifier \"a\".",
            "DeclarationError: Undeclared identifier \"b\".",
        ]
    );
}

#[test]
fn private_state_of_a_base_is_out_of_reach() {
    let target = r#"pragma solidity ^0.8.0;

contract Base {
    uint256 private hidden;
}

contract Derived is Base {
}
"#;
    let err = Stitcher::new()
        .stitch_into_source(
            "function peek() public view returns (uint256) { return hidden; }",
            target,
            None,
            Some("Derived"),
        )
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::AnalysisFailed);
    assert!(err.message().contains("\"hidden\""));

    // The same fragment works from inside the declaring contract.
    Stitcher::new()
        .stitch_into_source(
            "function peek() public view returns (uint256) { return hidden; }",
            target,
            None,
            Some("Base"),
        )
        .unwrap();
}

#[test]
fn mismatched_return_types_are_type_errors() {
    let err = Stitcher::new()
        .stitch_into_source(
            "function flag() public pure returns (bool) { return 1; }",
            MY_CONTRACT,
            None,
            None,
        )
        .unwrap_err();
    assert!(err.message().starts_with("TypeError: "));
    assert!(err.message().contains("not implicitly convertible"));
}

#[test]
fn fragment_locals_shadow_nothing_outside_their_function() {
    let fragment = r#"
        function sum(uint256 n) public pure returns (uint256 total) {
            for (uint256 i = 0; i < n; i++) {
                total += i;
            }
        }
        function again() public view returns (uint256) { return secretValue; }
    "#;
    let analyzed = Stitcher::new()
        .stitch_into_source(fragment, MY_CONTRACT, None, None)
        .unwrap();
    let my_contract = contract(&analyzed, "MyContract");
    let sum = find_member(my_contract, "sum").unwrap();
    let loop_statement = &sum["body"]["statements"][0];
    let increment = &loop_statement["body"]["statements"][0]["expression"];
    assert_eq!(
        increment["leftHandSide"]["referencedDeclaration"],
        sum["returnParameters"]["parameters"][0]["id"]
    );
    assert_eq!(
        increment["rightHandSide"]["referencedDeclaration"],
        loop_statement["initializationExpression"]["declarations"][0]["id"]
    );
}
