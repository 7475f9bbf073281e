//! Pretty printing and graph statistics.

use std::fmt::Write;

use crate::graph::{Graph, Node, NodeKind, Region};

/// Render the whole graph as an indented ASCII listing, one line per
/// node, subregions nested in braces.
pub fn view(graph: &Graph) -> String {
    let mut out = String::new();
    write_region(graph, graph.root(), 0, &mut out);
    out
}

fn write_region(graph: &Graph, region: Region, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let arguments: Vec<String> = (0..graph.n_arguments(region))
        .map(|index| format!("a{}:{}", index, graph.argument_type(region, index)))
        .collect();
    let _ = writeln!(out, "{}region {} [{}]", pad, region, arguments.join(", "));
    for node in graph.topological_order(region) {
        write_node(graph, node, depth + 1, out);
    }
    let results: Vec<String> = (0..graph.n_results(region))
        .map(|index| graph.result_origin(region, index).to_string())
        .collect();
    if !results.is_empty() {
        let _ = writeln!(out, "{}  -> [{}]", pad, results.join(", "));
    }
}

fn write_node(graph: &Graph, node: Node, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    let operands: Vec<String> = graph
        .operands(node)
        .iter()
        .map(|origin| origin.to_string())
        .collect();
    let label = match graph.kind(node) {
        NodeKind::Simple(op) => op.debug_string(),
        NodeKind::Gamma(_) => "gamma".to_string(),
        NodeKind::Theta(_) => "theta".to_string(),
        NodeKind::Lambda(_) => format!("lambda {}", graph.lambda_name(node)),
        NodeKind::Delta(_) => format!("delta {}", graph.delta_name(node)),
        NodeKind::Phi(_) => "phi".to_string(),
    };
    let _ = writeln!(
        out,
        "{}{} = {} ({})",
        pad,
        node,
        label,
        operands.join(", ")
    );
    for sub in graph.kind(node).subregions() {
        write_region(graph, sub, depth + 1, out);
    }
}

/// Node and region counts over a whole graph.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub simple_nodes: usize,
    pub structural_nodes: usize,
    pub regions: usize,
    pub max_depth: usize,
}

pub fn graph_stats(graph: &Graph) -> GraphStats {
    let mut stats = GraphStats::default();
    collect_stats(graph, graph.root(), 0, &mut stats);
    stats
}

fn collect_stats(graph: &Graph, region: Region, depth: usize, stats: &mut GraphStats) {
    stats.regions += 1;
    stats.max_depth = stats.max_depth.max(depth);
    for node in graph.region_nodes(region) {
        stats.nodes += 1;
        if graph.kind(*node).is_structural() {
            stats.structural_nodes += 1;
        } else {
            stats.simple_nodes += 1;
        }
        for sub in graph.kind(*node).subregions() {
            collect_stats(graph, sub, depth + 1, stats);
        }
    }
}
