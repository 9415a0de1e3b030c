//! The stitching pipeline.
//!
//! A fragment of bare declarations is wrapped in a synthetic contract, parsed on its own,
//! renumbered above every id in the target, and its members grafted into one of the
//! target's contracts. Each step is a plain function over trees:
//!
//! ```text
//! parse fragment -> max target id -> locate container -> renumber -> extract -> merge
//! ```
//!
//! Nothing here is semantic. The merged tree may reference names that do not exist or
//! mix types badly; that is for the analyzer to say.

pub mod expose;
pub mod extract;
pub mod locate;
pub mod merge;
pub mod wrapper;

use tracing::debug;

pub use expose::{expose_members, MemberKind};
pub use locate::{find_target_container_index, ContainerPolicy};
pub use merge::{merge_members, ConflictStrategy, MergeReport};

use crate::config::StitchConfig;
use crate::session::CompilerSession;
use crate::syntax::parse_source;
use crate::tree::{self, SyntaxTree};
use crate::Result;

/// One or more declarations not wrapped in a contract.
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    source: &'a str,
}

impl<'a> Fragment<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn wrapped_source(&self, config: &StitchConfig) -> String {
        wrapper::wrap_fragment_source(self.source, &config.fragment_container, &config.pragma)
    }

    /// Parses the wrapped fragment on its own. Syntax errors are `ParseFailed`.
    pub fn parse<S>(&self, session: &mut S, config: &StitchConfig) -> Result<SyntaxTree>
    where
        S: CompilerSession + ?Sized,
    {
        parse_source(session, &self.wrapped_source(config), &config.fragment_source_name)
    }
}

/// A merged tree and how it was produced.
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    pub tree: SyntaxTree,
    /// Index of the receiving container in the top-level `nodes`.
    pub container_index: usize,
    /// Amount added to every fragment id.
    pub offset: u64,
    pub report: MergeReport,
}

/// Stitches `fragment` into a copy of `target`.
///
/// `target` itself is never modified. The fragment is renumbered by `max id + 1`, so its
/// lowest id lands strictly above every id in the target even when the parser numbers
/// from zero.
pub fn stitch_fragment<S>(
    session: &mut S,
    target: &SyntaxTree,
    fragment: &str,
    container_name: Option<&str>,
    config: &StitchConfig,
) -> Result<StitchOutcome>
where
    S: CompilerSession + ?Sized,
{
    let wrapped = Fragment::new(fragment).parse(session, config)?;
    debug!(bytes = fragment.len(), "fragment parsed");
    graft(target, wrapped, container_name, config, |unit| {
        extract::extract_members(unit, &config.fragment_container)
    })
}

/// Stitches the members of an already parsed fragment unit into a copy of `target`.
///
/// The donor is the fragment container named in `config`, or else the unit's last
/// container. Neither input is modified.
pub fn stitch_fragment_tree(
    target: &SyntaxTree,
    fragment_unit: &SyntaxTree,
    container_name: Option<&str>,
    config: &StitchConfig,
) -> Result<StitchOutcome> {
    graft(target, fragment_unit.clone(), container_name, config, |unit| {
        extract::extract_donor_members(unit, &config.fragment_container)
    })
}

fn graft(
    target: &SyntaxTree,
    mut fragment_unit: SyntaxTree,
    container_name: Option<&str>,
    config: &StitchConfig,
    extract_members: impl FnOnce(&SyntaxTree) -> Result<Vec<SyntaxTree>>,
) -> Result<StitchOutcome> {
    let max_target_id = tree::find_max_id(target);
    let container_index =
        find_target_container_index(target, container_name, config.container_policy)?;
    debug!(
        max_target_id,
        container_index,
        container = ?container_name,
        policy = ?config.container_policy,
        "container located"
    );

    let offset = match max_target_id.checked_add(1) {
        Some(offset) if tree::try_renumber_ids(&mut fragment_unit, offset) => offset,
        _ => {
            return Err(crate::err_msg!(
                InvalidContractStructure,
                "target ids reach {}; fragment ids cannot be placed above them",
                max_target_id
            ))
        }
    };
    let members = extract_members(&fragment_unit)?;

    let mut merged = target.clone();
    let container = tree::child_nodes_mut(&mut merged)
        .and_then(|nodes| nodes.get_mut(container_index))
        .ok_or_else(|| {
            crate::err_msg!(
                InvalidContractStructure,
                "container index {} out of range",
                container_index
            )
        })?;
    let report = merge_members(container, members, config.conflict_strategy)?;
    debug!(
        offset,
        appended = report.appended.len(),
        replaced = report.replaced.len(),
        "fragment merged"
    );

    Ok(StitchOutcome {
        tree: merged,
        container_index,
        offset,
        report,
    })
}
