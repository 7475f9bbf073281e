//! End-to-end scenarios over the whole kernel: construction, the
//! reduction catalogue, pruning, and serialization round trips.

use crate::ops::bitstring::{BitAdd, BitConstant, BitSlt};
use crate::ops::control::{ControlConstant, Match};
use crate::operator::Operator;
use crate::ops::memory::{Alloca, Load, MemStateMerge, Store};
use crate::{
    are_graphs_equivalent, deserialize_graph, normalize_theta, reduce_flattened, serialize_graph,
    BinaryNormalForm, FlattenedBinary, FlattenedReduction, Graph, GraphImport, Linkage, NormalForm,
    OperatorClass, Origin, Region, Type,
};

fn import(graph: &mut Graph, name: &str, ty: Type) -> Origin {
    graph.add_import(GraphImport {
        name: name.into(),
        linkage: Linkage::External,
        ty,
    })
}

fn count_nodes_of<T: 'static>(graph: &Graph, region: Region) -> usize {
    graph
        .region_nodes(region)
        .iter()
        .filter(|node| {
            graph
                .kind(**node)
                .operator()
                .map(|op| op.as_any().is::<T>())
                .unwrap_or(false)
        })
        .count()
}

/// Scenario: a chain of stores to distinct stack slots sharing one
/// state edge survives pruning; a dominated store to the same slot is
/// eliminated once store/store reduction is enabled.
#[test]
fn test_store_chain() {
    let mut graph = Graph::new();
    Store::normal_form(&mut graph).set_mutable(false);

    let state = import(&mut graph, "s", Type::MemoryState);
    let root = graph.root();
    let i32_ty = Type::Bits(32);
    let slots: Vec<Vec<Origin>> = (0..3)
        .map(|_| {
            graph
                .add_simple_node(root, Box::new(Alloca::new(i32_ty.clone())), &[])
                .unwrap()
        })
        .collect();
    let mut last_c_state = state;
    for (index, slot) in slots.iter().enumerate() {
        let value = graph
            .add_simple_node(
                root,
                Box::new(BitConstant::new(32, index as u64 + 1)),
                &[],
            )
            .unwrap();
        let outputs = graph
            .add_simple_node(
                root,
                Box::new(Store::new(i32_ty.clone(), 1)),
                &[slot[0], value[0], state],
            )
            .unwrap();
        last_c_state = outputs[0];
    }

    graph.prune().unwrap();
    assert_eq!(count_nodes_of::<Store>(&graph, root), 3);
    assert_eq!(count_nodes_of::<Alloca>(&graph, root), 3);

    // A fourth store to C, immediately after C←3.
    let four = graph
        .add_simple_node(root, Box::new(BitConstant::new(32, 4)), &[])
        .unwrap();
    graph
        .add_simple_node(
            root,
            Box::new(Store::new(i32_ty.clone(), 1)),
            &[slots[2][0], four[0], last_c_state],
        )
        .unwrap();
    assert_eq!(count_nodes_of::<Store>(&graph, root), 4);

    Store::normal_form(&mut graph).set_mutable(true);
    graph.normalize().unwrap();
    assert_eq!(count_nodes_of::<Store>(&graph, root), 3);
    // The dominated C←3 store is gone: no remaining store writes 3.
    for node in graph.region_nodes(root) {
        if graph
            .kind(*node)
            .operator()
            .map(|op| op.as_any().is::<Store>())
            .unwrap_or(false)
        {
            let value = graph.operand(*node, 1).producer().unwrap();
            let constant = graph
                .kind(value)
                .operator()
                .unwrap()
                .as_any()
                .downcast_ref::<BitConstant>()
                .unwrap();
            assert_ne!(constant.value(), 3);
        }
    }
}

/// Scenario: a second load from the same address under the first
/// load's state is rewired to the first load's value.
#[test]
fn test_redundant_load() {
    let mut graph = Graph::new();
    Load::normal_form(&mut graph).set_mutable(false);

    let p = import(&mut graph, "p", Type::Pointer);
    let s = import(&mut graph, "s", Type::MemoryState);
    let root = graph.root();
    let i32_ty = Type::Bits(32);
    let v1 = graph
        .add_simple_node(root, Box::new(Load::new(i32_ty.clone(), 1)), &[p, s])
        .unwrap();
    let v2 = graph
        .add_simple_node(root, Box::new(Load::new(i32_ty.clone(), 1)), &[p, v1[1]])
        .unwrap();
    graph.add_export(v2[0], "value").unwrap();
    graph.add_export(v2[1], "state").unwrap();
    assert_eq!(count_nodes_of::<Load>(&graph, root), 2);

    Load::normal_form(&mut graph).set_mutable(true);
    graph.normalize().unwrap();
    graph.prune().unwrap();

    assert_eq!(count_nodes_of::<Load>(&graph, root), 1);
    assert_eq!(graph.result_origin(root, 0), v1[0]);
    assert_eq!(graph.result_origin(root, 1), v1[1]);
}

fn passthrough_gamma_with_constant_predicate(choice: u32) -> (Graph, Origin, Origin) {
    let mut graph = Graph::new();
    let x = import(&mut graph, "x", Type::Bits(32));
    let y = import(&mut graph, "y", Type::Bits(32));
    let root = graph.root();
    let predicate = graph
        .add_simple_node(root, Box::new(ControlConstant::new(2, choice)), &[])
        .unwrap();
    let gamma = graph.add_gamma(root, predicate[0], 2).unwrap();
    let ex = graph.gamma_add_entry_var(gamma, x).unwrap();
    let ey = graph.gamma_add_entry_var(gamma, y).unwrap();
    // Alternative 0 passes x through, alternative 1 passes y through.
    let r0 = graph.gamma_entry_argument(gamma, ex, 0);
    let r1 = graph.gamma_entry_argument(gamma, ey, 1);
    let out = graph.gamma_add_exit_var(gamma, &[r0, r1]).unwrap();
    graph.add_export(out, "picked").unwrap();
    (graph, x, y)
}

/// Scenario: a γ with a constant predicate is folded into the chosen
/// alternative, and pruning erases every trace of it.
#[test]
fn test_gamma_constant_fold() {
    for (choice, expect_second) in [(0u32, false), (1u32, true)] {
        let (mut graph, x, y) = passthrough_gamma_with_constant_predicate(choice);
        let root = graph.root();
        graph.normalize().unwrap();
        let expected = if expect_second { y } else { x };
        assert_eq!(graph.result_origin(root, 0), expected);
        graph.prune().unwrap();
        assert!(graph.region_nodes(root).is_empty());
        assert!(graph.validate().is_ok());
    }
}

/// Scenario: a loop variable the body never rewrites is routed around
/// the loop; the counter keeps circulating.
#[test]
fn test_loop_invariance() {
    let mut graph = Graph::new();
    let i0 = import(&mut graph, "i0", Type::Bits(32));
    let n = import(&mut graph, "n", Type::Bits(32));
    let root = graph.root();
    let theta = graph.add_theta(root).unwrap();
    let iv = graph.theta_add_loop_var(theta, i0).unwrap();
    let nv = graph.theta_add_loop_var(theta, n).unwrap();
    let sub = graph.theta_subregion(theta);
    let i_arg = graph.theta_argument(theta, iv);
    let n_arg = graph.theta_argument(theta, nv);
    let one = graph
        .add_simple_node(sub, Box::new(BitConstant::new(32, 1)), &[])
        .unwrap();
    let next = graph
        .add_simple_node(sub, Box::new(BitAdd::new(32)), &[i_arg, one[0]])
        .unwrap();
    let more = graph
        .add_simple_node(sub, Box::new(BitSlt::new(32)), &[next[0], n_arg])
        .unwrap();
    let repeat = graph
        .add_simple_node(sub, Box::new(Match::new(1, [(1, 1)], 0, 2)), &[more[0]])
        .unwrap();
    graph.theta_set_loop_var_result(theta, iv, next[0]).unwrap();
    graph.theta_set_predicate(theta, repeat[0]).unwrap();
    graph.add_export(graph.theta_output(theta, iv), "i").unwrap();
    graph.add_export(graph.theta_output(theta, nv), "n").unwrap();

    graph.normalize().unwrap();

    // n's output is its input; i still circulates through the loop.
    assert_eq!(graph.result_origin(root, 1), n);
    assert_eq!(graph.n_users(graph.theta_output(theta, nv)), 0);
    assert_eq!(
        graph.result_origin(root, 0),
        graph.theta_output(theta, iv)
    );
    assert_ne!(graph.result_origin(sub, iv + 1), i_arg);
    assert!(graph.validate().is_ok());
}

/// Scenario: `(a+b)+(b+a)` with a commutative, associative operator
/// flattens and canonicalizes to `+ᶠ(a,a,b,b)`.
#[test]
fn test_cse_across_flattening() {
    let mut graph = Graph::new();
    let a = import(&mut graph, "a", Type::Bits(32));
    let b = import(&mut graph, "b", Type::Bits(32));
    let root = graph.root();
    let left = graph
        .add_simple_node(root, Box::new(BitAdd::new(32)), &[a, b])
        .unwrap();
    let right = graph
        .add_simple_node(root, Box::new(BitAdd::new(32)), &[b, a])
        .unwrap();
    // Commutative reorder exposes the common subexpression.
    assert_eq!(left, right);
    let total = graph
        .add_simple_node(root, Box::new(BitAdd::new(32)), &[left[0], right[0]])
        .unwrap();
    graph.add_export(total[0], "total").unwrap();

    let producer = total[0].producer().unwrap();
    let flattened = graph
        .kind(producer)
        .operator()
        .unwrap()
        .as_any()
        .downcast_ref::<FlattenedBinary>()
        .unwrap();
    assert_eq!(flattened.narguments(), 4);
    assert_eq!(graph.operands(producer), vec![a, a, b, b]);
}

/// Scenario: a φ group where both members reference each other keeps
/// both under pruning while either projection is exported.
#[test]
fn test_phi_well_formedness() {
    fn fn_ty() -> Type {
        Type::Function {
            arguments: vec![Type::Bits(32)],
            results: vec![Type::Bits(32)],
        }
    }

    let mut graph = Graph::new();
    let root = graph.root();
    let phi = graph.add_phi(root).unwrap();
    let fib = graph.phi_add_rec_var(phi, fn_ty()).unwrap();
    let helper = graph.phi_add_rec_var(phi, fn_ty()).unwrap();
    let sub = graph.phi_subregion(phi);

    let fib_lambda = graph
        .add_lambda(sub, "fib", fn_ty(), Linkage::Internal)
        .unwrap();
    graph
        .lambda_add_ctx_var(fib_lambda, graph.phi_rec_argument(phi, helper))
        .unwrap();
    let param = graph.lambda_parameter(fib_lambda, 0);
    let fib_def = graph.lambda_finalize(fib_lambda, &[param]).unwrap();

    let helper_lambda = graph
        .add_lambda(sub, "fib_helper", fn_ty(), Linkage::Internal)
        .unwrap();
    graph
        .lambda_add_ctx_var(helper_lambda, graph.phi_rec_argument(phi, fib))
        .unwrap();
    let param = graph.lambda_parameter(helper_lambda, 0);
    let helper_def = graph.lambda_finalize(helper_lambda, &[param]).unwrap();

    graph.phi_set_rec_var(phi, fib, fib_def).unwrap();
    graph.phi_set_rec_var(phi, helper, helper_def).unwrap();
    graph.phi_finalize(phi).unwrap();

    // Each output projects to its definition.
    assert_eq!(graph.result_origin(sub, fib), fib_def);
    assert_eq!(graph.result_origin(sub, helper), helper_def);

    graph.add_export(graph.phi_output(phi, fib), "fib").unwrap();
    graph
        .add_export(graph.phi_output(phi, helper), "fib_helper")
        .unwrap();
    graph.prune().unwrap();
    assert_eq!(graph.phi_n_rec_vars(phi), 2);
    assert!(graph.validate().is_ok());
}

/// Boundary: two identical stores back to back collapse into one.
#[test]
fn test_identical_store_pair_collapses() {
    let mut graph = Graph::new();
    Store::normal_form(&mut graph).set_mutable(false);

    let p = import(&mut graph, "p", Type::Pointer);
    let v = import(&mut graph, "v", Type::Bits(32));
    let s = import(&mut graph, "s", Type::MemoryState);
    let root = graph.root();
    let first = graph
        .add_simple_node(root, Box::new(Store::new(Type::Bits(32), 1)), &[p, v, s])
        .unwrap();
    let second = graph
        .add_simple_node(
            root,
            Box::new(Store::new(Type::Bits(32), 1)),
            &[p, v, first[0]],
        )
        .unwrap();
    graph.add_export(second[0], "s").unwrap();

    Store::normal_form(&mut graph).set_mutable(true);
    graph.normalize().unwrap();
    assert_eq!(count_nodes_of::<Store>(&graph, root), 1);
    // The surviving store reads the original state edge.
    let survivor = graph.result_origin(root, 0).producer().unwrap();
    assert_eq!(graph.operand(survivor, 2), s);
}

/// Boundary: a θ whose body leaves every loop variable untouched
/// reduces to a pass-through.
#[test]
fn test_fully_invariant_theta_is_a_noop() {
    let mut graph = Graph::new();
    let x = import(&mut graph, "x", Type::Bits(8));
    let y = import(&mut graph, "y", Type::Bits(8));
    let root = graph.root();
    let theta = graph.add_theta(root).unwrap();
    let xv = graph.theta_add_loop_var(theta, x).unwrap();
    let yv = graph.theta_add_loop_var(theta, y).unwrap();
    graph.add_export(graph.theta_output(theta, xv), "x").unwrap();
    graph.add_export(graph.theta_output(theta, yv), "y").unwrap();

    assert!(normalize_theta(&mut graph, theta).unwrap());
    assert_eq!(graph.result_origin(root, 0), x);
    assert_eq!(graph.result_origin(root, 1), y);
    assert_eq!(graph.theta_n_loop_vars(theta), 0);
}

/// Flatten → unflatten → flatten is the identity on the canonical
/// form.
#[test]
fn test_flatten_unflatten_roundtrip() {
    fn build() -> Graph {
        let mut graph = Graph::new();
        let operands: Vec<Origin> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| import(&mut graph, name, Type::Bits(32)))
            .collect();
        let root = graph.root();
        // Right-leaning chain: a + (b + (c + d)).
        let mut acc = operands[3];
        for &operand in operands[..3].iter().rev() {
            let sum = graph
                .add_simple_node(root, Box::new(BitAdd::new(32)), &[operand, acc])
                .unwrap();
            acc = sum[0];
        }
        graph.add_export(acc, "sum").unwrap();
        graph.prune().unwrap();
        graph
    }

    let flattened = build();
    {
        let root = flattened.root();
        assert_eq!(count_nodes_of::<FlattenedBinary>(&flattened, root), 1);
    }

    let mut rebuilt = build();
    let root = rebuilt.root();
    rebuilt
        .normal_form::<BinaryNormalForm>(OperatorClass::of::<BitAdd>())
        .set_flatten(false);
    reduce_flattened(&mut rebuilt, root, FlattenedReduction::Linear).unwrap();
    rebuilt.prune().unwrap();
    assert_eq!(count_nodes_of::<BitAdd>(&rebuilt, root), 3);

    rebuilt
        .normal_form::<BinaryNormalForm>(OperatorClass::of::<BitAdd>())
        .set_flatten(true);
    rebuilt.normalize().unwrap();
    rebuilt.prune().unwrap();
    assert!(are_graphs_equivalent(&flattened, &rebuilt).unwrap());
}

/// Round trip: build → prune → serialize → parse → prune preserves the
/// pruned structure exactly.
#[test]
fn test_serialization_roundtrip_after_prune() {
    let mut graph = Graph::new();
    let k = import(&mut graph, "k", Type::Bits(32));
    let root = graph.root();
    let ty = Type::Function {
        arguments: vec![Type::Bits(32), Type::Control(2)],
        results: vec![Type::Bits(32)],
    };
    let lambda = graph
        .add_lambda(root, "select_or_add", ty, Linkage::External)
        .unwrap();
    let ctx = graph.lambda_add_ctx_var(lambda, k).unwrap();
    let sub = graph.lambda_subregion(lambda);
    let value = graph.lambda_parameter(lambda, 0);
    let predicate = graph.lambda_parameter(lambda, 1);
    let gamma = graph.add_gamma(sub, predicate, 2).unwrap();
    let ev = graph.gamma_add_entry_var(gamma, value).unwrap();
    let ek = graph.gamma_add_entry_var(gamma, ctx).unwrap();
    let pass = graph.gamma_entry_argument(gamma, ev, 0);
    let v1 = graph.gamma_entry_argument(gamma, ev, 1);
    let k1 = graph.gamma_entry_argument(gamma, ek, 1);
    let sub1 = graph.gamma_subregion(gamma, 1);
    let sum = graph
        .add_simple_node(sub1, Box::new(BitAdd::new(32)), &[v1, k1])
        .unwrap();
    let out = graph.gamma_add_exit_var(gamma, &[pass, sum[0]]).unwrap();
    let lambda_out = graph.lambda_finalize(lambda, &[out]).unwrap();
    graph.add_export(lambda_out, "select_or_add").unwrap();

    graph.prune().unwrap();
    let serialized = serialize_graph(&graph).unwrap();
    let json = serialized.to_json_compact().unwrap();
    let parsed = crate::VersionedGraph::from_json(&json).unwrap();
    let mut rebuilt = deserialize_graph(&parsed).unwrap();
    rebuilt.prune().unwrap();
    assert!(are_graphs_equivalent(&graph, &rebuilt).unwrap());
    assert!(rebuilt.validate().is_ok());
}

/// A store inside a γ anchors the whole alternative against pruning.
#[test]
fn test_side_effect_anchor_inside_gamma() {
    let mut graph = Graph::new();
    let predicate = import(&mut graph, "p", Type::Control(2));
    let pointer = import(&mut graph, "ptr", Type::Pointer);
    let state = import(&mut graph, "s", Type::MemoryState);
    let root = graph.root();
    let gamma = graph.add_gamma(root, predicate, 2).unwrap();
    let ep = graph.gamma_add_entry_var(gamma, pointer).unwrap();
    let es = graph.gamma_add_entry_var(gamma, state).unwrap();
    let sub1 = graph.gamma_subregion(gamma, 1);
    let value = graph
        .add_simple_node(sub1, Box::new(BitConstant::new(32, 9)), &[])
        .unwrap();
    graph
        .add_simple_node(
            sub1,
            Box::new(Store::new(Type::Bits(32), 1)),
            &[
                graph.gamma_entry_argument(gamma, ep, 1),
                value[0],
                graph.gamma_entry_argument(gamma, es, 1),
            ],
        )
        .unwrap();

    // No exports at all: only the store keeps the gamma alive.
    graph.prune().unwrap();
    assert!(graph.is_alive(gamma));
    assert_eq!(count_nodes_of::<Store>(&graph, sub1), 1);
}

/// Mux-distributed stores merge back through a fresh state merge.
#[test]
fn test_store_mux_end_to_end() {
    let mut graph = Graph::new();
    Store::normal_form(&mut graph).set_mutable(false);
    let p = import(&mut graph, "p", Type::Pointer);
    let v = import(&mut graph, "v", Type::Bits(32));
    let s1 = import(&mut graph, "s1", Type::MemoryState);
    let s2 = import(&mut graph, "s2", Type::MemoryState);
    let root = graph.root();
    let merge = graph
        .add_simple_node(root, Box::new(MemStateMerge::new(2)), &[s1, s2])
        .unwrap();
    let stored = graph
        .add_simple_node(
            root,
            Box::new(Store::new(Type::Bits(32), 1)),
            &[p, v, merge[0]],
        )
        .unwrap();
    graph.add_export(stored[0], "s").unwrap();

    Store::normal_form(&mut graph).set_mutable(true);
    graph.normalize().unwrap();
    graph.prune().unwrap();

    assert_eq!(count_nodes_of::<Store>(&graph, root), 2);
    assert_eq!(count_nodes_of::<MemStateMerge>(&graph, root), 1);
}
