//! Source parsing adapter.
//!
//! Turns source text into a [`SyntaxTree`] through whichever [`CompilerSession`] the
//! caller holds, and checks the result has the shape the rest of the pipeline expects:
//! a `SourceUnit` root with a top-level `nodes` list. The bundled reference parser lives
//! in [`parser`].

pub mod parser;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::CompilerSession;
use crate::tree::{self, SyntaxTree};
use crate::Result;

/// Byte range in a source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Renders the `src` attribute of a node: `start:length:fileIndex`.
    pub fn to_src(self, file_index: usize) -> String {
        format!("{}:{}:{}", self.start, self.end - self.start, file_index)
    }
}

/// Parses `source` with the session's syntax parser.
///
/// Syntax errors surface as `ParseFailed`; a parser result that is not a source unit with a
/// top-level node list is an `InvalidContractStructure`.
pub fn parse_source<S>(session: &mut S, source: &str, source_name: &str) -> Result<SyntaxTree>
where
    S: CompilerSession + ?Sized,
{
    let unit = session.parse(source, source_name)?;

    if tree::node_type(&unit) != Some("SourceUnit") || tree::child_nodes(&unit).is_none() {
        return Err(crate::err_msg!(
            InvalidContractStructure,
            "parser output for '{}' is not a SourceUnit with a nodes array",
            source_name
        ));
    }

    debug!(
        source_name,
        top_level_nodes = tree::child_nodes(&unit).map_or(0, Vec::len),
        max_id = tree::find_max_id(&unit),
        "parsed source"
    );
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::{SessionFactory, SessionOptions};
    use crate::{ErrorType, StitchError};

    struct FixedParser(SyntaxTree);

    impl CompilerSession for FixedParser {
        fn parse(&mut self, _source: &str, _source_name: &str) -> Result<SyntaxTree> {
            Ok(self.0.clone())
        }

        fn analyze(&mut self, _tree_json: &str, _source_name: &str) -> Result<SyntaxTree> {
            Err(crate::err_msg!(AnalysisFailed, "not supported"))
        }
    }

    #[test]
    fn span_renders_src_triples() {
        assert_eq!(Span::new(4, 10).to_src(0), "4:6:0");
        assert_eq!(Span::new(4, 10).join(Span::new(2, 5)), Span::new(2, 10));
    }

    #[test]
    fn reference_session_output_is_accepted() {
        let mut session = SessionOptions::default().open_session().unwrap();
        let unit = parse_source(&mut session, "contract A {}", "A.sol").unwrap();
        assert_eq!(unit["nodeType"], "SourceUnit");
    }

    #[test]
    fn foreign_shapes_are_rejected() {
        let mut session = FixedParser(json!({"nodeType": "Block", "statements": []}));
        let err: StitchError = parse_source(&mut session, "", "X.sol").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidContractStructure);
    }
}
