//! Graph optimization passes.
//!
//! Free functions over a [`Graph`] composing the normal-form rewrites
//! with region-level cleanup: common-subexpression elimination,
//! dead-node pruning, and a driver applying everything to a fixpoint.

use crate::error::IrError;
use crate::graph::normal_form::cse_node;
use crate::graph::{Graph, NodeKind, Region};

/// Counters for one [`optimize_graph`] run.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizationStats {
    pub rewrites_applied: usize,
    pub cse_merged: usize,
    pub nodes_pruned: usize,
}

impl OptimizationStats {
    pub fn total(&self) -> usize {
        self.rewrites_applied + self.cse_merged + self.nodes_pruned
    }
}

/// Merge congruent simple nodes in `region` and every nested region.
/// Returns the number of merged nodes.
pub fn eliminate_common_subexpressions(
    graph: &mut Graph,
    region: Region,
) -> Result<usize, IrError> {
    let mut merged = 0;
    let order = graph.topological_order(region);
    for node in order {
        if !graph.is_alive(node) {
            continue;
        }
        for sub in graph.kind(node).subregions() {
            merged += eliminate_common_subexpressions(graph, sub)?;
        }
        if matches!(graph.kind(node), NodeKind::Simple(_)) && cse_node(graph, node)? {
            merged += 1;
        }
    }
    Ok(merged)
}

/// Apply normalization, CSE and pruning until nothing changes.
pub fn optimize_graph(graph: &mut Graph) -> Result<OptimizationStats, IrError> {
    let mut stats = OptimizationStats::default();
    // A few rounds are always enough: each pass only shrinks the graph.
    for round in 0..3 {
        let rewrites = graph.normalize()?;
        stats.rewrites_applied += rewrites;

        let merged = eliminate_common_subexpressions(graph, graph.root())?;
        stats.cse_merged += merged;

        let pruned = graph.prune()?;
        stats.nodes_pruned += pruned;

        log::debug!(
            "optimize round {}: {} rewrites, {} cse merges, {} pruned",
            round,
            rewrites,
            merged,
            pruned
        );
        if rewrites == 0 && merged == 0 && pruned == 0 {
            break;
        }
    }
    Ok(stats)
}
