//! Pattern browsing.
//!
//! A Browse node holds a [`PatternSelection`]: named groups of patterns picked
//! from an upstream Mine node. Pattern ids are only meaningful within one
//! mining run, so when the upstream pattern set is recomputed every stored
//! pattern is matched structurally, by its canonical constraints over the
//! non-target attributes, and re-keyed to the id it has now.

use crate::schema::{default_of, parse, realign_typed};
use pipecore::{
    Config, OperationKind, PathTree, PatternSelection, PatternSet, PortType, Predecessor,
};
use piperuntime::{Contract, Operation, Ports};

/// Interactive selection of mined patterns.
pub struct BrowseOperation;

/// Input port carrying the pattern set.
const PATTERNS: usize = 1;

fn reconcile(selection: &mut PatternSelection, upstream: &PatternSet) {
    if selection.target_attrs != upstream.target_attrs
        || selection.target_kind != Some(upstream.target_kind)
    {
        tracing::debug!("Upstream targets changed; discarding pattern selection");
        *selection = PatternSelection::bound_to(upstream);
        return;
    }

    let targets = &upstream.target_attrs;
    let fresh: Vec<_> = upstream
        .patterns
        .iter()
        .map(|p| (p.core_constraints(targets), p))
        .collect();

    for group in &mut selection.groups {
        group.patterns = group
            .patterns
            .drain(..)
            .filter_map(|stored| {
                let core = stored.core_constraints(targets);
                fresh
                    .iter()
                    .find(|(constraints, _)| *constraints == core)
                    .map(|(_, matched)| pipecore::Pattern {
                        id: matched.id,
                        quality: matched.quality,
                        ..stored
                    })
            })
            .collect();
    }
    selection.groups.retain(|g| !g.patterns.is_empty());
}

impl Operation for BrowseOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Browse
    }

    fn contract(&self) -> Contract {
        Contract::new(
            Ports::Dual([PortType::Dataset, PortType::PatternSet]),
            Ports::Single(PortType::PatternSelection),
        )
        .display()
    }

    fn description(&self) -> &str {
        "Browse and curate mined patterns"
    }

    fn default_config(&self) -> Option<Config> {
        default_of::<PatternSelection>()
    }

    /// Both inputs, or a lone Mine node.
    fn check_arity(&self, predecessors: &[Predecessor<'_>]) -> bool {
        match predecessors {
            [_, _] => true,
            [only] => only.node.kind == OperationKind::Mine,
            _ => false,
        }
    }

    fn validate(&self, predecessors: &[Predecessor<'_>], config: &Config) -> bool {
        let Some(selection) = parse::<PatternSelection>(config) else {
            return false;
        };
        let upstream = predecessors.iter().find_map(|p| p.pattern_set());
        match upstream {
            Some(patterns) => {
                selection.target_attrs == patterns.target_attrs
                    && selection.target_kind.map_or(true, |k| k == patterns.target_kind)
            }
            None => true,
        }
    }

    fn realign(&self, tree: &PathTree, config: &Config) -> Config {
        let upstream = tree.input(PATTERNS).and_then(PathTree::pattern_set);
        match upstream {
            Some(upstream) => {
                realign_typed(config, |s: &mut PatternSelection| reconcile(s, upstream))
            }
            None => config.clone(),
        }
    }
}
