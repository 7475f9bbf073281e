//! Structural validation.
//!
//! Checks the data-model invariants over a whole graph: edge locality
//! (every input's origin lives in the same region), per-region
//! acyclicity, edge type equality, structural-node mapping counts, and
//! flattened-binary associativity. Validation never mutates; it
//! reports everything it finds.

use crate::binary::FlattenedBinary;
use crate::error::IrError;
use crate::operator::Operator;
use crate::graph::{Graph, Node, NodeKind, Origin, Region, User};
use crate::types::Type;

/// Everything a validation sweep found.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<IrError>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate every region reachable from the root.
pub fn validate_graph(graph: &Graph) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_region(graph, graph.root(), &mut report);
    report
}

impl Graph {
    /// Shorthand returning the first violation, if any.
    pub fn validate(&self) -> Result<(), IrError> {
        let mut report = validate_graph(self);
        match report.errors.is_empty() {
            true => Ok(()),
            false => Err(report.errors.remove(0)),
        }
    }
}

fn validate_region(graph: &Graph, region: Region, report: &mut ValidationReport) {
    // The producer→consumer relation must be acyclic.
    if graph.try_topological_order(region).is_err() {
        report.errors.push(IrError::invariant(format!(
            "region {} contains a cycle",
            region
        )));
    }

    for node in graph.region_nodes(region) {
        for index in 0..graph.n_inputs(*node) {
            let origin = graph.operand(*node, index);
            check_edge(
                graph,
                region,
                origin,
                graph.input_type(*node, index).clone(),
                User::Input {
                    consumer: *node,
                    index,
                },
                report,
            );
        }
        validate_node(graph, *node, report);
        for sub in graph.kind(*node).subregions() {
            validate_region(graph, sub, report);
        }
    }

    for index in 0..graph.n_results(region) {
        let origin = graph.result_origin(region, index);
        check_edge(
            graph,
            region,
            origin,
            graph.result_type(region, index).clone(),
            User::Result { region, index },
            report,
        );
    }
}

fn check_edge(
    graph: &Graph,
    region: Region,
    origin: Origin,
    consumer_type: Type,
    user: User,
    report: &mut ValidationReport,
) {
    // Edges never cross region boundaries.
    let found = graph.origin_region(origin);
    if found != region {
        report.errors.push(IrError::RegionMismatch {
            expected: region.index(),
            found: found.index(),
        });
    }
    // Both endpoints agree on the type.
    let produced = graph.origin_type(origin);
    if *produced != consumer_type {
        report.errors.push(IrError::TypeMismatch {
            expected: consumer_type,
            found: produced.clone(),
        });
    }
    // Edge storage consistency: the origin's user list knows this edge.
    if !graph.users(origin).contains(&user) {
        report.errors.push(IrError::invariant(format!(
            "user list of {} is missing a consumer",
            origin
        )));
    }
}

fn mapping_error(
    report: &mut ValidationReport,
    node: Node,
    what: &str,
    expected: usize,
    actual: usize,
) {
    if expected != actual {
        report.errors.push(IrError::ArityMismatch {
            what: format!("{} of {}", what, node),
            expected,
            actual,
        });
    }
}

fn validate_node(graph: &Graph, node: Node, report: &mut ValidationReport) {
    match graph.kind(node) {
        NodeKind::Simple(op) => {
            if op.narguments() != graph.n_inputs(node) {
                report.errors.push(IrError::ArityMismatch {
                    what: format!("operands of {}", node),
                    expected: op.narguments(),
                    actual: graph.n_inputs(node),
                });
            }
            // Only associative operators may appear flattened.
            if let Some(flattened) = op.as_any().downcast_ref::<FlattenedBinary>() {
                if !flattened.operation().is_associative() {
                    report.errors.push(IrError::UnreducibleOperator {
                        operator: flattened.debug_string(),
                    });
                }
            }
        }
        NodeKind::Gamma(_) => {
            let n_entry = graph.gamma_n_entry_vars(node);
            let n_exit = graph.gamma_n_exit_vars(node);
            for sub in graph.gamma_subregions(node) {
                mapping_error(
                    report,
                    node,
                    "gamma entry mapping",
                    n_entry,
                    graph.n_arguments(*sub),
                );
                mapping_error(
                    report,
                    node,
                    "gamma exit mapping",
                    n_exit,
                    graph.n_results(*sub),
                );
            }
        }
        NodeKind::Theta(_) => {
            let sub = graph.theta_subregion(node);
            let n = graph.theta_n_loop_vars(node);
            mapping_error(report, node, "theta loop arguments", n, graph.n_arguments(sub));
            mapping_error(report, node, "theta loop results", n + 1, graph.n_results(sub));
            mapping_error(report, node, "theta outputs", n, graph.n_outputs(node));
            if graph.n_results(sub) > 0 && *graph.result_type(sub, 0) != Type::Control(2) {
                report.errors.push(IrError::TypeMismatch {
                    expected: Type::Control(2),
                    found: graph.result_type(sub, 0).clone(),
                });
            }
        }
        NodeKind::Lambda(data) => {
            let sub = data.subregion;
            mapping_error(
                report,
                node,
                "lambda context inputs",
                data.n_ctx,
                graph.n_inputs(node),
            );
            if let Type::Function { arguments, results } = &data.ty {
                mapping_error(
                    report,
                    node,
                    "lambda arguments",
                    data.n_ctx + arguments.len(),
                    graph.n_arguments(sub),
                );
                if data.finalized {
                    mapping_error(
                        report,
                        node,
                        "lambda results",
                        results.len(),
                        graph.n_results(sub),
                    );
                    mapping_error(report, node, "lambda outputs", 1, graph.n_outputs(node));
                }
            }
        }
        NodeKind::Delta(data) => {
            mapping_error(
                report,
                node,
                "delta context inputs",
                data.n_ctx,
                graph.n_inputs(node),
            );
            mapping_error(
                report,
                node,
                "delta arguments",
                data.n_ctx,
                graph.n_arguments(data.subregion),
            );
            if data.finalized {
                mapping_error(
                    report,
                    node,
                    "delta results",
                    1,
                    graph.n_results(data.subregion),
                );
                mapping_error(report, node, "delta outputs", 1, graph.n_outputs(node));
            }
        }
        NodeKind::Phi(data) => {
            let n_rec = data.rec_types.len();
            mapping_error(
                report,
                node,
                "phi context inputs",
                data.n_ctx,
                graph.n_inputs(node),
            );
            mapping_error(
                report,
                node,
                "phi arguments",
                n_rec + data.n_ctx,
                graph.n_arguments(data.subregion),
            );
            if data.finalized {
                mapping_error(
                    report,
                    node,
                    "phi results",
                    n_rec,
                    graph.n_results(data.subregion),
                );
                mapping_error(report, node, "phi outputs", n_rec, graph.n_outputs(node));
            }
        }
    }
}
