//! Syntax-level stitching of declaration fragments into parsed contracts.
//!
//! A fragment such as `function peek() public view returns (uint256) { return secret; }` is
//! invalid on its own. The stitcher parses it in isolation, renumbers its nodes above every
//! id in a target tree, grafts its declarations into one of the target's contracts, and only
//! then asks a semantic analyzer whether the result makes sense. Parsing and analysis sit
//! behind [`CompilerSession`]; the crate ships a reference session for a Solidity subset.

pub use crate::config::StitchConfig;
pub use crate::diagnostics::{ErrorContext, ErrorType, Result, StitchError};
pub use crate::engine::Stitcher;
pub use crate::session::{CompilerSession, ReferenceSession, SessionFactory, SessionOptions};
pub use crate::stitch::{
    ConflictStrategy, ContainerPolicy, Fragment, MemberKind, MergeReport, StitchOutcome,
};
pub use crate::tree::SyntaxTree;

pub mod analysis;
pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod session;
pub mod stitch;
pub mod syntax;
pub mod tree;
