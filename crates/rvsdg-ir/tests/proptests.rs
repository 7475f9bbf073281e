//! Property-based tests for the RVSDG kernel.
//!
//! Random bitstring dataflow programs are lowered into a graph and the
//! structural invariants are checked across construction,
//! normalization, pruning and serialization.

use proptest::prelude::*;
use rvsdg_ir::ops::bitstring::{BitAdd, BitConstant, BitMul, BitSub};
use rvsdg_ir::{
    are_graphs_equivalent, deserialize_graph, eliminate_common_subexpressions,
    reduce_flattened_operands, serialize_graph, validate_graph, FlattenedReduction, Graph,
    GraphImport, Linkage, Origin, Type,
};

const WIDTH: u32 = 32;

// ===== Strategies for generating test data =====

/// One instruction of a straight-line bitstring program. Operand
/// indices select among previously defined values.
#[derive(Debug, Clone)]
enum Inst {
    Const(u64),
    Add(prop::sample::Index, prop::sample::Index),
    Mul(prop::sample::Index, prop::sample::Index),
    Sub(prop::sample::Index, prop::sample::Index),
}

fn arb_inst() -> impl Strategy<Value = Inst> {
    prop_oneof![
        any::<u64>().prop_map(Inst::Const),
        (any::<prop::sample::Index>(), any::<prop::sample::Index>())
            .prop_map(|(a, b)| Inst::Add(a, b)),
        (any::<prop::sample::Index>(), any::<prop::sample::Index>())
            .prop_map(|(a, b)| Inst::Mul(a, b)),
        (any::<prop::sample::Index>(), any::<prop::sample::Index>())
            .prop_map(|(a, b)| Inst::Sub(a, b)),
    ]
}

fn arb_program() -> impl Strategy<Value = Vec<Inst>> {
    prop::collection::vec(arb_inst(), 1..24)
}

/// Lower a program into a graph with two opaque inputs, exporting the
/// last value.
fn build_graph(program: &[Inst]) -> Result<Graph, rvsdg_ir::IrError> {
    let mut graph = Graph::new();
    let a = graph.add_import(GraphImport {
        name: "a".into(),
        linkage: Linkage::External,
        ty: Type::Bits(WIDTH),
    });
    let b = graph.add_import(GraphImport {
        name: "b".into(),
        linkage: Linkage::External,
        ty: Type::Bits(WIDTH),
    });
    let root = graph.root();
    let mut values: Vec<Origin> = vec![a, b];
    for inst in program {
        let origin = match inst {
            Inst::Const(value) => {
                graph.add_simple_node(root, Box::new(BitConstant::new(WIDTH, *value)), &[])?[0]
            }
            Inst::Add(left, right) => {
                let operands = [
                    values[left.index(values.len())],
                    values[right.index(values.len())],
                ];
                graph.add_simple_node(root, Box::new(BitAdd::new(WIDTH)), &operands)?[0]
            }
            Inst::Mul(left, right) => {
                let operands = [
                    values[left.index(values.len())],
                    values[right.index(values.len())],
                ];
                graph.add_simple_node(root, Box::new(BitMul::new(WIDTH)), &operands)?[0]
            }
            Inst::Sub(left, right) => {
                let operands = [
                    values[left.index(values.len())],
                    values[right.index(values.len())],
                ];
                graph.add_simple_node(root, Box::new(BitSub::new(WIDTH)), &operands)?[0]
            }
        };
        values.push(origin);
    }
    let exported = *values.last().expect("program is non-empty");
    graph.add_export(exported, "out")?;
    Ok(graph)
}

fn mask(value: u64) -> u64 {
    value & 0xffff_ffff
}

// ===== Property tests =====

proptest! {
    /// Region locality, acyclicity and edge typing hold for any
    /// construction sequence.
    #[test]
    fn prop_construction_preserves_invariants(program in arb_program()) {
        let graph = build_graph(&program).expect("construction succeeds");
        let report = validate_graph(&graph);
        prop_assert!(report.is_ok(), "validation errors: {:?}", report.errors);
    }

    /// Pruning reaches a fixpoint in one pass, and what remains
    /// still validates.
    #[test]
    fn prop_prune_is_idempotent(program in arb_program()) {
        let mut graph = build_graph(&program).expect("construction succeeds");
        graph.prune().expect("prune succeeds");
        let second = graph.prune().expect("second prune succeeds");
        prop_assert_eq!(second, 0);
        prop_assert!(validate_graph(&graph).is_ok());
    }

    /// Prune, serialize, parse, prune reproduces the same
    /// structure.
    #[test]
    fn prop_serialization_roundtrip(program in arb_program()) {
        let mut graph = build_graph(&program).expect("construction succeeds");
        graph.prune().expect("prune succeeds");
        let serialized = serialize_graph(&graph).expect("serialize succeeds");
        let json = serialized.to_json_compact().expect("encode succeeds");
        let parsed = rvsdg_ir::VersionedGraph::from_json(&json).expect("decode succeeds");
        let mut rebuilt = deserialize_graph(&parsed).expect("rebuild succeeds");
        rebuilt.prune().expect("prune succeeds");
        prop_assert!(are_graphs_equivalent(&graph, &rebuilt).expect("comparison succeeds"));
    }

    /// A second CSE sweep over an already-swept region merges
    /// nothing.
    #[test]
    fn prop_cse_is_idempotent(program in arb_program()) {
        let mut graph = build_graph(&program).expect("construction succeeds");
        let root = graph.root();
        eliminate_common_subexpressions(&mut graph, root).expect("cse succeeds");
        let second = eliminate_common_subexpressions(&mut graph, root).expect("cse succeeds");
        prop_assert_eq!(second, 0);
        prop_assert!(validate_graph(&graph).is_ok());
    }

    /// Normalization terminates and leaves a valid graph.
    #[test]
    fn prop_normalize_preserves_invariants(program in arb_program()) {
        let mut graph = build_graph(&program).expect("construction succeeds");
        graph.normalize().expect("normalize succeeds");
        graph.prune().expect("prune succeeds");
        prop_assert!(validate_graph(&graph).is_ok());
    }

    /// Constant chains fold completely during construction.
    #[test]
    fn prop_constant_chains_fold(values in prop::collection::vec(any::<u64>(), 2..8)) {
        let mut graph = Graph::new();
        let root = graph.root();
        let mut acc = graph
            .add_simple_node(root, Box::new(BitConstant::new(WIDTH, values[0])), &[])
            .expect("constant")[0];
        for value in &values[1..] {
            let rhs = graph
                .add_simple_node(root, Box::new(BitConstant::new(WIDTH, *value)), &[])
                .expect("constant")[0];
            acc = graph
                .add_simple_node(root, Box::new(BitAdd::new(WIDTH)), &[acc, rhs])
                .expect("add")[0];
        }
        let expected = mask(values.iter().fold(0u64, |a, v| a.wrapping_add(mask(*v))));
        let producer = acc.producer().expect("constant producer");
        let folded = graph
            .kind(producer)
            .operator()
            .and_then(|op| op.as_any().downcast_ref::<BitConstant>())
            .map(BitConstant::value);
        prop_assert_eq!(folded, Some(expected));
    }

    /// Linear and parallel collapse of a flattened operand list
    /// agree on the folded value.
    #[test]
    fn prop_flattened_reduction_orders_agree(values in prop::collection::vec(any::<u64>(), 2..10)) {
        let op = BitAdd::new(WIDTH);
        let build = |reduction: FlattenedReduction| -> u64 {
            let mut graph = Graph::new();
            let root = graph.root();
            let operands: Vec<Origin> = values
                .iter()
                .map(|value| {
                    graph
                        .add_simple_node(root, Box::new(BitConstant::new(WIDTH, *value)), &[])
                        .expect("constant")[0]
                })
                .collect();
            let out = reduce_flattened_operands(&mut graph, root, &op, &operands, reduction)
                .expect("reduction succeeds");
            let producer = out.producer().expect("folded constant");
            graph
                .kind(producer)
                .operator()
                .and_then(|op| op.as_any().downcast_ref::<BitConstant>())
                .map(BitConstant::value)
                .expect("folded to a constant")
        };
        let linear = build(FlattenedReduction::Linear);
        let parallel = build(FlattenedReduction::Parallel);
        prop_assert_eq!(linear, parallel);
    }
}
