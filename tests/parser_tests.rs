// tests/parser_tests.rs

mod common;

use ast_stitch::tree::{collect_ids, find_max_id};
use ast_stitch::{ErrorType, Stitcher};
use common::{contract, parse, MY_CONTRACT};
use miette::Diagnostic;

// ---
// Tree shape
// ---

#[test]
fn root_is_a_source_unit_with_the_highest_id() {
    let unit = parse(MY_CONTRACT);
    assert_eq!(unit["nodeType"], "SourceUnit");
    assert_eq!(unit["id"].as_u64(), Some(find_max_id(&unit)));
    assert_eq!(unit["license"], "MIT");

    let mut ids = collect_ids(&unit);
    ids.sort_unstable();
    assert_eq!(ids, (0..=find_max_id(&unit)).collect::<Vec<_>>());
}

#[test]
fn contract_members_keep_source_order() {
    let unit = parse(MY_CONTRACT);
    let my_contract = contract(&unit, "MyContract");
    assert_eq!(my_contract["contractKind"], "contract");
    let members = my_contract["nodes"].as_array().unwrap();
    assert_eq!(members[0]["nodeType"], "VariableDeclaration");
    assert_eq!(members[0]["visibility"], "private");
    assert_eq!(members[0]["stateVariable"], true);
    assert_eq!(members[1]["nodeType"], "FunctionDefinition");
    assert_eq!(members[1]["stateMutability"], "view");
}

#[test]
fn src_ranges_point_into_the_source() {
    let source = "contract A { uint256 x; }";
    let unit = parse(source);
    let variable = &contract(&unit, "A")["nodes"][0];
    let src = variable["src"].as_str().unwrap();
    let parts: Vec<usize> = src.split(':').map(|part| part.parse().unwrap()).collect();
    assert_eq!(&source[parts[0]..parts[0] + parts[1]], "uint256 x;");
    assert_eq!(parts[2], 0);
}

#[test]
fn parsing_is_purely_syntactic() {
    let unit = parse("contract A { function f() public returns (bool) { return nowhere + 1; } }");
    assert_eq!(contract(&unit, "A")["nodes"][0]["name"], "f");
}

#[test]
fn inheritance_and_imports_are_recorded() {
    let unit = parse(
        "import \"./Base.sol\";\nabstract contract Child is Base(1), Other { function g() public virtual; }",
    );
    assert_eq!(unit["nodes"][0]["nodeType"], "ImportDirective");
    let child = contract(&unit, "Child");
    assert_eq!(child["abstract"], true);
    let bases = child["baseContracts"].as_array().unwrap();
    assert_eq!(bases.len(), 2);
    assert_eq!(bases[0]["baseName"]["name"], "Base");
    assert_eq!(bases[1]["baseName"]["name"], "Other");
    assert_eq!(child["nodes"][0]["implemented"], false);
}

// ---
// Failures
// ---

#[test]
fn syntax_errors_carry_a_labelled_span() {
    let err = Stitcher::new()
        .parse_source_ast("contract A { uint256 = 1; }", Some("Broken.sol"))
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::ParseFailed);
    assert!(err.message().contains("Broken.sol"));
    assert_eq!(err.code().unwrap().to_string(), "stitch::parse");
    assert!(err.source_code().is_some());
    assert_eq!(err.labels().map(|labels| labels.count()), Some(1));
}

#[test]
fn unterminated_contracts_fail() {
    let err = Stitcher::new()
        .parse_source_ast("contract A {", None)
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::ParseFailed);
}

#[test]
fn reports_render_through_miette() {
    let err = Stitcher::new()
        .parse_source_ast("contract { }", Some("Nameless.sol"))
        .unwrap_err();
    let report = miette::Report::new(err);
    let rendered = format!("{report:?}");
    assert!(rendered.contains("Parse failed"));
}
