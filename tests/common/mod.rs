//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ast_stitch::tree::{child_nodes, is_container, node_name};
use ast_stitch::{Stitcher, SyntaxTree};
use serde_json::Value;
use walkdir::WalkDir;

pub const MY_CONTRACT: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.0;

contract MyContract {
    uint256 private secretValue;

    function getSecret() public view returns (uint256) {
        return secretValue;
    }
}
"#;

pub const EXPLOIT: &str =
    "function exploit() public view returns (uint256) { return secretValue * 2; }";

pub const THREE_CONTRACTS: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.0;

contract First {
    uint256 internal a;
}

contract Second {
    uint256 internal b;
}

contract Target {
    uint256 internal c;
}
"#;

pub const EXPOSED: &str = "uint256 public exposed;";

pub const WITH_C: &str = r#"pragma solidity ^0.8.0;

contract Holder {
    function c() public {}
}
"#;

/// Routes `tracing` output through the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn parse(source: &str) -> SyntaxTree {
    Stitcher::new()
        .parse_source_ast(source, None)
        .expect("fixture source parses")
}

/// The top-level contract named `name`.
pub fn contract<'a>(unit: &'a Value, name: &str) -> &'a Value {
    child_nodes(unit)
        .into_iter()
        .flatten()
        .find(|node| is_container(node) && node_name(node) == Some(name))
        .unwrap_or_else(|| panic!("no contract {name}"))
}

/// Member names of a contract, in order.
pub fn member_names(contract: &Value) -> Vec<String> {
    child_nodes(contract)
        .into_iter()
        .flatten()
        .map(|member| node_name(member).unwrap_or_default().to_string())
        .collect()
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Every `.sol` file under `dir`, sorted, with its contents.
pub fn load_sources(dir: &Path) -> Vec<(PathBuf, String)> {
    let mut sources: Vec<(PathBuf, String)> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sol"))
        .map(|entry| {
            let path = entry.path().to_path_buf();
            let source = std::fs::read_to_string(&path)
                .unwrap_or_else(|err| panic!("cannot read {}: {err}", path.display()));
            (path, source)
        })
        .collect();
    sources.sort();
    sources
}
