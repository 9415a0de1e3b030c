//! Hand-off from the stitcher to the semantic analyzer.

use tracing::debug;

use crate::session::CompilerSession;
use crate::tree::SyntaxTree;
use crate::{ErrorType, Result};

/// Serializes `tree` and runs the session's analyzer on it.
///
/// Analyzer rejections come back as `AnalysisFailed` with the diagnostics untouched. Any
/// other failure the analyzer raises is reported as `AnalysisFailed` too, with the original
/// error as its cause.
pub fn analyze_tree<S>(session: &mut S, tree: &SyntaxTree, source_name: &str) -> Result<SyntaxTree>
where
    S: CompilerSession + ?Sized,
{
    let text = serde_json::to_string(tree)?;
    debug!(source_name, bytes = text.len(), "submitting tree for analysis");

    session.analyze(&text, source_name).map_err(|err| {
        if err.error_type() == ErrorType::AnalysisFailed {
            err
        } else {
            let message = err.message().to_string();
            crate::err_msg!(AnalysisFailed, message).caused_by(err)
        }
    })
}
