//! Compiler sessions.
//!
//! A [`CompilerSession`] is the handle through which the pipeline reaches the syntax parser
//! and the semantic analyzer. Sessions are opened per call by a [`SessionFactory`] and
//! released when dropped, whatever the exit path. [`SessionOptions`] is the factory for the
//! bundled [`ReferenceSession`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analysis;
use crate::syntax::parser;
use crate::tree::SyntaxTree;
use crate::Result;

/// The two external collaborators of the stitcher behind one handle.
pub trait CompilerSession {
    /// Parse `source` into a syntax tree. Syntax errors are `ParseFailed`.
    fn parse(&mut self, source: &str, source_name: &str) -> Result<SyntaxTree>;

    /// Analyze a serialized tree. Rejections are `AnalysisFailed` carrying the analyzer's
    /// diagnostics verbatim.
    fn analyze(&mut self, tree_json: &str, source_name: &str) -> Result<SyntaxTree>;
}

impl<S: CompilerSession + ?Sized> CompilerSession for Box<S> {
    fn parse(&mut self, source: &str, source_name: &str) -> Result<SyntaxTree> {
        (**self).parse(source, source_name)
    }

    fn analyze(&mut self, tree_json: &str, source_name: &str) -> Result<SyntaxTree> {
        (**self).analyze(tree_json, source_name)
    }
}

/// Opens a fresh session for each pipeline run.
pub trait SessionFactory {
    type Session: CompilerSession;

    /// Fails with `ParserInitFailed` when no session can be created.
    fn open_session(&self) -> Result<Self::Session>;
}

impl<F, S> SessionFactory for F
where
    F: Fn() -> Result<S>,
    S: CompilerSession,
{
    type Session = S;

    fn open_session(&self) -> Result<S> {
        self()
    }
}

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;
const MAX_NESTING_DEPTH_LIMIT: usize = 4096;

const KNOWN_EVM_VERSIONS: &[&str] = &[
    "homestead",
    "tangerineWhistle",
    "spuriousDragon",
    "byzantium",
    "constantinople",
    "petersburg",
    "istanbul",
    "berlin",
    "london",
    "paris",
    "shanghai",
    "cancun",
    "prague",
];

/// Options for the reference session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Bracket and statement nesting allowed before parsing gives up.
    pub max_nesting_depth: usize,
    /// Target EVM version label. Validated, otherwise informational.
    pub evm_version: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            evm_version: "paris".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_evm_version(mut self, version: impl Into<String>) -> Self {
        self.evm_version = version.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 || self.max_nesting_depth > MAX_NESTING_DEPTH_LIMIT {
            return Err(crate::err_msg!(
                ParserInitFailed,
                "maxNestingDepth must be between 1 and {}, got {}",
                MAX_NESTING_DEPTH_LIMIT,
                self.max_nesting_depth
            ));
        }
        if !KNOWN_EVM_VERSIONS.contains(&self.evm_version.as_str()) {
            return Err(crate::err_msg!(
                ParserInitFailed,
                "unknown evmVersion '{}'",
                self.evm_version
            ));
        }
        Ok(())
    }
}

impl SessionFactory for SessionOptions {
    type Session = ReferenceSession;

    fn open_session(&self) -> Result<ReferenceSession> {
        self.validate()?;
        let serial = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        trace!(session = serial, evm_version = %self.evm_version, "opened compiler session");
        Ok(ReferenceSession {
            options: self.clone(),
            serial,
        })
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Session backed by the bundled parser and analyzer.
#[derive(Debug)]
pub struct ReferenceSession {
    options: SessionOptions,
    serial: u64,
}

impl ReferenceSession {
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl CompilerSession for ReferenceSession {
    fn parse(&mut self, source: &str, source_name: &str) -> Result<SyntaxTree> {
        trace!(session = self.serial, source_name, bytes = source.len(), "parse");
        parser::parse(source, source_name, self.options.max_nesting_depth)
    }

    fn analyze(&mut self, tree_json: &str, source_name: &str) -> Result<SyntaxTree> {
        trace!(session = self.serial, source_name, bytes = tree_json.len(), "analyze");
        analysis::analyze(tree_json, source_name)
    }
}

impl Drop for ReferenceSession {
    fn drop(&mut self) {
        trace!(session = self.serial, "released compiler session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;

    #[test]
    fn default_options_open_a_session() {
        let mut session = SessionOptions::default().open_session().unwrap();
        let unit = session.parse("contract A {}", "A.sol").unwrap();
        assert_eq!(unit["nodes"][0]["name"], "A");
    }

    #[test]
    fn invalid_options_fail_to_open() {
        let err = SessionOptions::default()
            .with_max_nesting_depth(0)
            .open_session()
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParserInitFailed);

        let err = SessionOptions::default()
            .with_evm_version("frontier2")
            .open_session()
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParserInitFailed);
        assert!(err.message().contains("frontier2"));
    }

    #[test]
    fn options_deserialize_camel_case() {
        let options: SessionOptions =
            serde_json::from_str(r#"{"maxNestingDepth": 64, "evmVersion": "shanghai"}"#).unwrap();
        assert_eq!(options.max_nesting_depth, 64);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn closures_are_factories() {
        let factory = || SessionOptions::default().open_session();
        let mut session = factory.open_session().unwrap();
        assert!(session.parse("", "Empty.sol").is_ok());
    }
}
