use tracing::{debug, info_span};

use crate::bridge;
use crate::config::StitchConfig;
use crate::session::{SessionFactory, SessionOptions};
use crate::stitch::{self, extract, Fragment, MemberKind, StitchOutcome};
use crate::syntax::parse_source;
use crate::tree::SyntaxTree;
use crate::Result;

// ============================================================================
// STITCHER - the public entry points
// ============================================================================

/// Stitches fragments into targets and hands the result to the analyzer.
///
/// A `Stitcher` holds only its configuration and a session factory. Every call opens a
/// fresh compiler session, uses it, and drops it before returning, so one `Stitcher` can
/// serve any number of threads at once.
///
/// ```no_run
/// use ast_stitch::Stitcher;
///
/// let stitcher = Stitcher::new();
/// let analyzed = stitcher.stitch_into_source(
///     "function exploit() public view returns (uint256) { return secretValue * 2; }",
///     "contract MyContract { uint256 private secretValue; }",
///     None,
///     None,
/// )?;
/// # Ok::<(), ast_stitch::StitchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Stitcher<F = SessionOptions> {
    factory: F,
    config: StitchConfig,
}

impl Stitcher<SessionOptions> {
    /// Reference sessions with default options and the default configuration.
    pub fn new() -> Self {
        Self {
            factory: SessionOptions::default(),
            config: StitchConfig::default(),
        }
    }

    /// Reference sessions with default options; fails with `Config` if `config` is invalid.
    pub fn with_config(config: StitchConfig) -> Result<Self> {
        Self::with_factory(SessionOptions::default(), config)
    }
}

impl Default for Stitcher<SessionOptions> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SessionFactory> Stitcher<F> {
    /// Fails with `Config` if `config` does not validate.
    pub fn with_factory(factory: F, config: StitchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { factory, config })
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Stitches `fragment` into a copy of `target` and analyzes the result.
    ///
    /// The analyzer sees the target's `absolutePath`, or the configured source name when
    /// the tree has none.
    pub fn stitch_into_tree(
        &self,
        fragment: &str,
        target: &SyntaxTree,
        target_name: Option<&str>,
    ) -> Result<SyntaxTree> {
        let source_name = target
            .get("absolutePath")
            .and_then(|path| path.as_str())
            .unwrap_or(self.config.source_name.as_str())
            .to_string();
        let _span = info_span!(
            "stitch_into_tree",
            source_name = source_name.as_str(),
            target = ?target_name
        )
        .entered();

        let mut session = self.factory.open_session()?;
        let outcome =
            stitch::stitch_fragment(&mut session, target, fragment, target_name, &self.config)?;
        bridge::analyze_tree(&mut session, &outcome.tree, &source_name)
    }

    /// Parses `target_source` and continues as [`Stitcher::stitch_into_tree`].
    pub fn stitch_into_source(
        &self,
        fragment: &str,
        target_source: &str,
        source_name: Option<&str>,
        target_name: Option<&str>,
    ) -> Result<SyntaxTree> {
        let source_name = source_name.unwrap_or(self.config.source_name.as_str());
        let _span = info_span!("stitch_into_source", source_name, target = ?target_name).entered();

        let mut session = self.factory.open_session()?;
        let target = parse_source(&mut session, target_source, source_name)?;
        let outcome =
            stitch::stitch_fragment(&mut session, &target, fragment, target_name, &self.config)?;
        bridge::analyze_tree(&mut session, &outcome.tree, source_name)
    }

    /// Merge only: the stitched tree without analysis.
    pub fn stitch_tree(
        &self,
        fragment: &str,
        target: &SyntaxTree,
        target_name: Option<&str>,
    ) -> Result<StitchOutcome> {
        let _span = info_span!("stitch_tree", target = ?target_name).entered();
        let mut session = self.factory.open_session()?;
        stitch::stitch_fragment(&mut session, target, fragment, target_name, &self.config)
    }

    /// Merges the members of an already parsed fragment unit into a copy of `target`.
    ///
    /// No session is opened; the fragment was parsed elsewhere.
    pub fn stitch_fragment_tree(
        &self,
        fragment_unit: &SyntaxTree,
        target: &SyntaxTree,
        target_name: Option<&str>,
    ) -> Result<StitchOutcome> {
        let _span = info_span!("stitch_fragment_tree", target = ?target_name).entered();
        stitch::stitch_fragment_tree(target, fragment_unit, target_name, &self.config)
    }

    /// [`Stitcher::stitch_fragment_tree`] followed by analysis, named as in
    /// [`Stitcher::stitch_into_tree`].
    pub fn stitch_fragment_tree_into_tree(
        &self,
        fragment_unit: &SyntaxTree,
        target: &SyntaxTree,
        target_name: Option<&str>,
    ) -> Result<SyntaxTree> {
        let outcome = self.stitch_fragment_tree(fragment_unit, target, target_name)?;
        let source_name = target
            .get("absolutePath")
            .and_then(|path| path.as_str())
            .unwrap_or(self.config.source_name.as_str());
        self.analyze_tree(&outcome.tree, source_name)
    }

    /// A copy of `tree` with private and internal members of `kinds` made public.
    pub fn expose_members(
        &self,
        tree: &SyntaxTree,
        container_name: Option<&str>,
        kinds: &[MemberKind],
    ) -> Result<SyntaxTree> {
        let mut exposed = tree.clone();
        let changed = stitch::expose_members(&mut exposed, container_name, kinds)?;
        debug!(container = ?container_name, changed = changed.len(), "members exposed");
        Ok(exposed)
    }

    /// Parse-only tree of a full source.
    pub fn parse_source_ast(&self, source: &str, file_name: Option<&str>) -> Result<SyntaxTree> {
        let file_name = file_name.unwrap_or(self.config.source_name.as_str());
        let mut session = self.factory.open_session()?;
        parse_source(&mut session, source, file_name)
    }

    /// The fragment's declarations, each serialized as standalone JSON.
    pub fn to_ast_nodes(&self, fragment: &str) -> Result<Vec<String>> {
        let mut session = self.factory.open_session()?;
        let wrapped = Fragment::new(fragment).parse(&mut session, &self.config)?;
        let nodes = extract::to_ast_nodes(&wrapped, &self.config.fragment_container)?;
        debug!(count = nodes.len(), "extracted fragment nodes");
        Ok(nodes)
    }

    /// Runs the analyzer on an already merged (or any) tree.
    pub fn analyze_tree(&self, tree: &SyntaxTree, source_name: &str) -> Result<SyntaxTree> {
        let mut session = self.factory.open_session()?;
        bridge::analyze_tree(&mut session, tree, source_name)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::session::{CompilerSession, ReferenceSession};
    use crate::ErrorType;

    #[test]
    fn stitcher_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Stitcher>();
    }

    #[test]
    fn every_call_opens_its_own_session() {
        let opened = Cell::new(0);
        let factory = || {
            opened.set(opened.get() + 1);
            SessionOptions::default().open_session()
        };
        let stitcher = Stitcher::with_factory(factory, StitchConfig::default()).unwrap();
        stitcher.parse_source_ast("contract A {}", None).unwrap();
        stitcher.to_ast_nodes("uint256 x;").unwrap();
        assert_eq!(opened.get(), 2);
    }

    #[test]
    fn session_failures_surface_as_parser_init_failed() {
        let stitcher = Stitcher::with_factory(
            SessionOptions::default().with_max_nesting_depth(0),
            StitchConfig::default(),
        )
        .unwrap();
        let err = stitcher.to_ast_nodes("uint256 x;").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::ParserInitFailed);
    }

    #[test]
    fn invalid_configurations_are_rejected_up_front() {
        let config = StitchConfig::default().with_fragment_container("not a name");
        let err = Stitcher::with_config(config).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);

        let config = StitchConfig::default().with_pragma("^0.8.0; contract X {}");
        let err = Stitcher::with_factory(SessionOptions::default(), config).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[test]
    fn parse_source_ast_defaults_the_file_name() {
        let tree = Stitcher::new().parse_source_ast("contract A {}", None).unwrap();
        assert_eq!(tree["absolutePath"], "Contract.sol");
        let tree = Stitcher::new().parse_source_ast("contract A {}", Some("A.sol")).unwrap();
        assert_eq!(tree["absolutePath"], "A.sol");
    }

    #[test]
    fn boxed_sessions_work_as_factories() {
        let factory = || -> Result<Box<dyn CompilerSession>> {
            let session: ReferenceSession = SessionOptions::default().open_session()?;
            Ok(Box::new(session))
        };
        let stitcher = Stitcher::with_factory(factory, StitchConfig::default()).unwrap();
        let nodes = stitcher.to_ast_nodes("event Ping(uint256 value);").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn exposing_leaves_the_input_untouched() {
        let stitcher = Stitcher::new();
        let unit = stitcher
            .parse_source_ast("contract A { uint256 private x; function f() internal {} }", None)
            .unwrap();
        let exposed = stitcher
            .expose_members(&unit, None, &[MemberKind::Functions])
            .unwrap();
        assert_eq!(unit["nodes"][0]["nodes"][1]["visibility"], "internal");
        assert_eq!(exposed["nodes"][0]["nodes"][1]["visibility"], "public");
        assert_eq!(exposed["nodes"][0]["nodes"][0]["visibility"], "private");
    }
}
