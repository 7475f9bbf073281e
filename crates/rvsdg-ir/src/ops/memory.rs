//! State-threaded memory operators.
//!
//! Stores and loads carry explicit `MemoryState` edges: a store
//! consumes one or more states and produces one state per input; a
//! load additionally produces the loaded value. [`MemStateMerge`]
//! joins parallel state edges back into one. The reduction catalogue
//! on these operators (store/store, store/alloca, store/mux,
//! load/store, load/load, load/alloca, duplicate-state elimination)
//! lives in [`StoreNormalForm`] and [`LoadNormalForm`].

use std::any::Any;

use crate::error::IrError;
use crate::graph::normal_form::{
    cse_node, find_congruent_node_except, NormalForm, NormalFormFlags,
};
use crate::graph::{Graph, Node, Origin, Region, User};
use crate::operator::{Operator, OperatorClass};
use crate::types::Type;

/// Reserve storage for a value of `value_type`; produces the slot
/// pointer and the slot's initial memory state.
#[derive(Debug, Clone)]
pub struct Alloca {
    value_type: Type,
    result_types: Vec<Type>,
}

impl Alloca {
    pub fn new(value_type: Type) -> Self {
        Alloca {
            value_type,
            result_types: vec![Type::Pointer, Type::MemoryState],
        }
    }

    pub fn value_type(&self) -> &Type {
        &self.value_type
    }

    pub fn normal_form(graph: &mut Graph) -> &mut AllocaNormalForm {
        graph.normal_form::<AllocaNormalForm>(OperatorClass::of::<Alloca>())
    }
}

impl Operator for Alloca {
    fn operand_types(&self) -> &[Type] {
        &[]
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("alloca[{}]", self.value_type)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<Alloca>()
            .map(|other| self.value_type == other.value_type)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<Alloca>()
    }

    fn default_normal_form(&self) -> Box<dyn NormalForm> {
        Box::new(AllocaNormalForm::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Store `value` through `address`, serializing against `nstates`
/// memory-state edges.
#[derive(Debug, Clone)]
pub struct Store {
    stored_type: Type,
    nstates: usize,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl Store {
    pub fn new(stored_type: Type, nstates: usize) -> Self {
        let mut operand_types = vec![Type::Pointer, stored_type.clone()];
        operand_types.extend(std::iter::repeat(Type::MemoryState).take(nstates));
        Store {
            stored_type,
            nstates,
            operand_types,
            result_types: vec![Type::MemoryState; nstates],
        }
    }

    pub fn stored_type(&self) -> &Type {
        &self.stored_type
    }

    pub fn nstates(&self) -> usize {
        self.nstates
    }

    pub fn normal_form(graph: &mut Graph) -> &mut StoreNormalForm {
        graph.normal_form::<StoreNormalForm>(OperatorClass::of::<Store>())
    }
}

impl Operator for Store {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("store[{}]", self.stored_type)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<Store>()
            .map(|other| self.stored_type == other.stored_type && self.nstates == other.nstates)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<Store>()
    }

    fn has_side_effects(&self) -> bool {
        true
    }

    fn default_normal_form(&self) -> Box<dyn NormalForm> {
        Box::new(StoreNormalForm::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Load a value of `loaded_type` through `address` under `nstates`
/// memory-state edges.
#[derive(Debug, Clone)]
pub struct Load {
    loaded_type: Type,
    nstates: usize,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl Load {
    pub fn new(loaded_type: Type, nstates: usize) -> Self {
        let mut operand_types = vec![Type::Pointer];
        operand_types.extend(std::iter::repeat(Type::MemoryState).take(nstates));
        let mut result_types = vec![loaded_type.clone()];
        result_types.extend(std::iter::repeat(Type::MemoryState).take(nstates));
        Load {
            loaded_type,
            nstates,
            operand_types,
            result_types,
        }
    }

    pub fn loaded_type(&self) -> &Type {
        &self.loaded_type
    }

    pub fn nstates(&self) -> usize {
        self.nstates
    }

    pub fn normal_form(graph: &mut Graph) -> &mut LoadNormalForm {
        graph.normal_form::<LoadNormalForm>(OperatorClass::of::<Load>())
    }
}

impl Operator for Load {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("load[{}]", self.loaded_type)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<Load>()
            .map(|other| self.loaded_type == other.loaded_type && self.nstates == other.nstates)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<Load>()
    }

    fn default_normal_form(&self) -> Box<dyn NormalForm> {
        Box::new(LoadNormalForm::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Join parallel memory-state edges into a single state.
#[derive(Debug, Clone)]
pub struct MemStateMerge {
    noperands: usize,
    operand_types: Vec<Type>,
    result_types: Vec<Type>,
}

impl MemStateMerge {
    pub fn new(noperands: usize) -> Self {
        MemStateMerge {
            noperands,
            operand_types: vec![Type::MemoryState; noperands],
            result_types: vec![Type::MemoryState],
        }
    }

    pub fn noperands(&self) -> usize {
        self.noperands
    }
}

impl Operator for MemStateMerge {
    fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    fn debug_string(&self) -> String {
        format!("memstatemerge[{}]", self.noperands)
    }

    fn eq_operator(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<MemStateMerge>()
            .map(|other| self.noperands == other.noperands)
            .unwrap_or(false)
    }

    fn copy_operator(&self) -> Box<dyn Operator> {
        Box::new(self.clone())
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::of::<MemStateMerge>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---- reduction helpers -------------------------------------------------

fn n_users_except(graph: &Graph, origin: Origin, except: Option<Node>) -> usize {
    graph
        .users(origin)
        .iter()
        .filter(|user| match (user, except) {
            (User::Input { consumer, .. }, Some(node)) => *consumer != node,
            _ => true,
        })
        .count()
}

/// The alloca producing `origin` as its pointer output.
fn alloca_behind_pointer(graph: &Graph, origin: Origin) -> Option<Node> {
    match origin {
        Origin::Output { producer, index: 0 } => graph
            .kind(producer)
            .operator()?
            .as_any()
            .downcast_ref::<Alloca>()
            .map(|_| producer),
        _ => None,
    }
}

/// The alloca producing `origin` as its initial-state output.
fn alloca_behind_state(graph: &Graph, origin: Origin) -> Option<Node> {
    match origin {
        Origin::Output { producer, index: 1 } => graph
            .kind(producer)
            .operator()?
            .as_any()
            .downcast_ref::<Alloca>()
            .map(|_| producer),
        _ => None,
    }
}

fn merge_behind(graph: &Graph, origin: Origin) -> Option<Node> {
    let producer = origin.producer()?;
    graph
        .kind(producer)
        .operator()?
        .as_any()
        .downcast_ref::<MemStateMerge>()
        .map(|_| producer)
}

/// A store to the same address whose state outputs exactly feed the
/// candidate state list and nothing else (`except` aside).
fn dominated_store(
    graph: &Graph,
    stored_type: &Type,
    address: Origin,
    states: &[Origin],
    except: Option<Node>,
) -> Option<Node> {
    let older = states.first()?.producer()?;
    let op = graph
        .kind(older)
        .operator()?
        .as_any()
        .downcast_ref::<Store>()?;
    if op.stored_type() != stored_type
        || op.nstates() != states.len()
        || graph.operand(older, 0) != address
    {
        return None;
    }
    for (index, state) in states.iter().enumerate() {
        let expected = Origin::Output {
            producer: older,
            index,
        };
        if *state != expected {
            return None;
        }
        if n_users_except(graph, expected, except) != 0 {
            return None;
        }
    }
    Some(older)
}

/// A single store producing every state in the list from `address`.
fn store_behind_states(
    graph: &Graph,
    loaded_type: &Type,
    address: Origin,
    states: &[Origin],
) -> Option<Node> {
    let store = states.first()?.producer()?;
    let op = graph
        .kind(store)
        .operator()?
        .as_any()
        .downcast_ref::<Store>()?;
    if op.stored_type() != loaded_type || graph.operand(store, 0) != address {
        return None;
    }
    let all_from_store = states
        .iter()
        .all(|state| state.producer() == Some(store));
    all_from_store.then_some(store)
}

/// A single earlier load from `address` producing every state in the
/// list.
fn load_behind_states(
    graph: &Graph,
    loaded_type: &Type,
    address: Origin,
    states: &[Origin],
) -> Option<Node> {
    let load = states.first()?.producer()?;
    let op = graph
        .kind(load)
        .operator()?
        .as_any()
        .downcast_ref::<Load>()?;
    if op.loaded_type() != loaded_type || graph.operand(load, 0) != address {
        return None;
    }
    let all_states = states.iter().all(|state| match state {
        Origin::Output { producer, index } => *producer == load && *index >= 1,
        _ => false,
    });
    all_states.then_some(load)
}

fn dedup_origins(origins: &[Origin]) -> Vec<Origin> {
    let mut unique = Vec::with_capacity(origins.len());
    for origin in origins {
        if !unique.contains(origin) {
            unique.push(*origin);
        }
    }
    unique
}

// ---- store normal form -------------------------------------------------

/// Normal form for [`Store`]: duplicate-state elimination, dominated
/// store removal, state-merge distribution and unrelated-alloca
/// bypassing, all individually toggleable.
#[derive(Debug)]
pub struct StoreNormalForm {
    flags: NormalFormFlags,
    pub store_store_reducible: bool,
    pub store_mux_reducible: bool,
    pub store_alloca_reducible: bool,
    pub multiple_origin_reducible: bool,
}

impl Default for StoreNormalForm {
    fn default() -> Self {
        StoreNormalForm {
            flags: NormalFormFlags::default(),
            store_store_reducible: true,
            store_mux_reducible: true,
            store_alloca_reducible: true,
            multiple_origin_reducible: true,
        }
    }
}

impl StoreNormalForm {
    pub fn set_store_store_reducible(&mut self, enable: bool) {
        self.store_store_reducible = enable;
    }

    pub fn set_store_mux_reducible(&mut self, enable: bool) {
        self.store_mux_reducible = enable;
    }

    pub fn set_store_alloca_reducible(&mut self, enable: bool) {
        self.store_alloca_reducible = enable;
    }

    pub fn set_multiple_origin_reducible(&mut self, enable: bool) {
        self.multiple_origin_reducible = enable;
    }

    /// Build a store over `states`, applying every enabled reduction.
    /// Returns one result origin per requested state edge.
    fn build_store(
        &self,
        graph: &mut Graph,
        region: Region,
        stored_type: &Type,
        address: Origin,
        value: Origin,
        states: &[Origin],
        except: Option<Node>,
    ) -> Result<Vec<Origin>, IrError> {
        if let Some(results) =
            self.try_reduce(graph, region, stored_type, address, value, states, except)?
        {
            return Ok(results);
        }
        let op = Store::new(stored_type.clone(), states.len());
        let mut operands = vec![address, value];
        operands.extend_from_slice(states);
        if self.flags.cse {
            if let Some(existing) =
                find_congruent_node_except(graph, region, &op, &operands, except)
            {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, Box::new(op), &operands)?;
        Ok(graph.outputs(node))
    }

    fn try_reduce(
        &self,
        graph: &mut Graph,
        region: Region,
        stored_type: &Type,
        address: Origin,
        value: Origin,
        states: &[Origin],
        except: Option<Node>,
    ) -> Result<Option<Vec<Origin>>, IrError> {
        if self.multiple_origin_reducible {
            let unique = dedup_origins(states);
            if unique.len() < states.len() {
                let reduced =
                    self.build_store(graph, region, stored_type, address, value, &unique, except)?;
                let results = states
                    .iter()
                    .map(|state| {
                        let slot = unique
                            .iter()
                            .position(|u| u == state)
                            .expect("state present in deduplicated list");
                        reduced[slot]
                    })
                    .collect();
                return Ok(Some(results));
            }
        }
        // A dominated older store is bypassed and deleted outright; on
        // the normalize path this is done by rebinding (see
        // normalize_node), since the older outputs still feed the node
        // being normalized.
        if self.store_store_reducible && except.is_none() {
            if let Some(older) = dominated_store(graph, stored_type, address, states, None) {
                let older_states: Vec<Origin> = graph.operands(older).split_off(2);
                graph.remove_node(older)?;
                let reduced = self.build_store(
                    graph,
                    region,
                    stored_type,
                    address,
                    value,
                    &older_states,
                    except,
                )?;
                return Ok(Some(reduced));
            }
        }
        if self.store_alloca_reducible {
            if let Some(owner) = alloca_behind_pointer(graph, address) {
                let mut passthrough: Vec<(usize, Origin)> = Vec::new();
                let mut consumed: Vec<(usize, Origin)> = Vec::new();
                for (index, state) in states.iter().enumerate() {
                    match alloca_behind_state(graph, *state) {
                        Some(other) if other != owner => passthrough.push((index, *state)),
                        _ => consumed.push((index, *state)),
                    }
                }
                if !passthrough.is_empty() && !consumed.is_empty() {
                    let consumed_states: Vec<Origin> =
                        consumed.iter().map(|(_, state)| *state).collect();
                    let reduced = self.build_store(
                        graph,
                        region,
                        stored_type,
                        address,
                        value,
                        &consumed_states,
                        except,
                    )?;
                    let mut results = vec![address; states.len()];
                    for (slot, state) in &passthrough {
                        results[*slot] = *state;
                    }
                    for (position, (slot, _)) in consumed.iter().enumerate() {
                        results[*slot] = reduced[position];
                    }
                    return Ok(Some(results));
                }
            }
        }
        if self.store_mux_reducible && states.len() == 1 {
            if let Some(merge) = merge_behind(graph, states[0]) {
                let merge_inputs = graph.operands(merge);
                let mut branch_states = Vec::with_capacity(merge_inputs.len());
                for state in &merge_inputs {
                    let reduced = self.build_store(
                        graph,
                        region,
                        stored_type,
                        address,
                        value,
                        std::slice::from_ref(state),
                        except,
                    )?;
                    branch_states.push(reduced[0]);
                }
                let merged = graph.add_simple_node(
                    region,
                    Box::new(MemStateMerge::new(branch_states.len())),
                    &branch_states,
                )?;
                return Ok(Some(vec![merged[0]]));
            }
        }
        Ok(None)
    }
}

impl NormalForm for StoreNormalForm {
    fn flags(&self) -> &NormalFormFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut NormalFormFlags {
        &mut self.flags
    }

    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        let store = match op.as_any().downcast_ref::<Store>() {
            Some(store) if self.flags.mutable => store,
            _ => {
                let node = graph.create_simple_node(region, op, operands)?;
                return Ok(graph.outputs(node));
            }
        };
        if operands.len() != op.narguments() {
            return Err(IrError::ArityMismatch {
                what: op.debug_string(),
                expected: op.narguments(),
                actual: operands.len(),
            });
        }
        for (operand, ty) in operands.iter().zip(op.operand_types()) {
            graph.check_origin(region, *operand, ty)?;
        }
        let stored_type = store.stored_type().clone();
        self.build_store(
            graph,
            region,
            &stored_type,
            operands[0],
            operands[1],
            &operands[2..],
            None,
        )
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if !self.flags.mutable {
            return Ok(false);
        }
        let stored_type = match graph
            .kind(node)
            .operator()
            .and_then(|op| op.as_any().downcast_ref::<Store>())
        {
            Some(store) => store.stored_type().clone(),
            None => return Ok(false),
        };
        let operands = graph.operands(node);
        let (address, value) = (operands[0], operands[1]);
        let states = &operands[2..];
        let region = graph.region_of(node);

        if self.store_store_reducible {
            if let Some(older) = dominated_store(graph, &stored_type, address, states, Some(node)) {
                let older_states: Vec<Origin> = graph.operands(older).split_off(2);
                for (offset, state) in older_states.iter().enumerate() {
                    graph.rebind(
                        User::Input {
                            consumer: node,
                            index: 2 + offset,
                        },
                        *state,
                    )?;
                }
                graph.remove_node(older)?;
                return Ok(true);
            }
        }
        if let Some(results) =
            self.try_reduce(graph, region, &stored_type, address, value, states, Some(node))?
        {
            for (index, replacement) in results.iter().enumerate() {
                let out = graph.output(node, index);
                graph.divert_users(out, *replacement)?;
            }
            graph.remove_node(node)?;
            return Ok(true);
        }
        if self.flags.cse {
            return cse_node(graph, node);
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---- load normal form --------------------------------------------------

/// Normal form for [`Load`]: forwarding from a dominating store,
/// reuse of an earlier load, duplicate-state elimination and
/// unrelated-alloca bypassing.
#[derive(Debug)]
pub struct LoadNormalForm {
    flags: NormalFormFlags,
    pub load_store_reducible: bool,
    pub load_load_reducible: bool,
    pub load_alloca_reducible: bool,
    pub multiple_origin_reducible: bool,
}

impl Default for LoadNormalForm {
    fn default() -> Self {
        LoadNormalForm {
            flags: NormalFormFlags::default(),
            load_store_reducible: true,
            load_load_reducible: true,
            load_alloca_reducible: true,
            multiple_origin_reducible: true,
        }
    }
}

impl LoadNormalForm {
    pub fn set_load_store_reducible(&mut self, enable: bool) {
        self.load_store_reducible = enable;
    }

    pub fn set_load_load_reducible(&mut self, enable: bool) {
        self.load_load_reducible = enable;
    }

    pub fn set_load_alloca_reducible(&mut self, enable: bool) {
        self.load_alloca_reducible = enable;
    }

    pub fn set_multiple_origin_reducible(&mut self, enable: bool) {
        self.multiple_origin_reducible = enable;
    }

    fn build_load(
        &self,
        graph: &mut Graph,
        region: Region,
        loaded_type: &Type,
        address: Origin,
        states: &[Origin],
        except: Option<Node>,
    ) -> Result<Vec<Origin>, IrError> {
        if let Some(results) =
            self.try_reduce(graph, region, loaded_type, address, states, except)?
        {
            return Ok(results);
        }
        let op = Load::new(loaded_type.clone(), states.len());
        let mut operands = vec![address];
        operands.extend_from_slice(states);
        if self.flags.cse {
            if let Some(existing) =
                find_congruent_node_except(graph, region, &op, &operands, except)
            {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, Box::new(op), &operands)?;
        Ok(graph.outputs(node))
    }

    fn try_reduce(
        &self,
        graph: &mut Graph,
        region: Region,
        loaded_type: &Type,
        address: Origin,
        states: &[Origin],
        except: Option<Node>,
    ) -> Result<Option<Vec<Origin>>, IrError> {
        if self.multiple_origin_reducible {
            let unique = dedup_origins(states);
            if unique.len() < states.len() {
                let reduced =
                    self.build_load(graph, region, loaded_type, address, &unique, except)?;
                let mut results = vec![reduced[0]];
                for state in states {
                    let slot = unique
                        .iter()
                        .position(|u| u == state)
                        .expect("state present in deduplicated list");
                    results.push(reduced[1 + slot]);
                }
                return Ok(Some(results));
            }
        }
        if self.load_store_reducible {
            if let Some(store) = store_behind_states(graph, loaded_type, address, states) {
                let mut results = vec![graph.operand(store, 1)];
                results.extend_from_slice(states);
                return Ok(Some(results));
            }
        }
        if self.load_load_reducible {
            if let Some(load) = load_behind_states(graph, loaded_type, address, states) {
                let mut results = vec![graph.output(load, 0)];
                results.extend_from_slice(states);
                return Ok(Some(results));
            }
        }
        if self.load_alloca_reducible {
            if let Some(owner) = alloca_behind_pointer(graph, address) {
                let mut passthrough: Vec<(usize, Origin)> = Vec::new();
                let mut consumed: Vec<(usize, Origin)> = Vec::new();
                for (index, state) in states.iter().enumerate() {
                    match alloca_behind_state(graph, *state) {
                        Some(other) if other != owner => passthrough.push((index, *state)),
                        _ => consumed.push((index, *state)),
                    }
                }
                if !passthrough.is_empty() && !consumed.is_empty() {
                    let consumed_states: Vec<Origin> =
                        consumed.iter().map(|(_, state)| *state).collect();
                    let reduced = self.build_load(
                        graph,
                        region,
                        loaded_type,
                        address,
                        &consumed_states,
                        except,
                    )?;
                    let mut results = vec![address; states.len() + 1];
                    results[0] = reduced[0];
                    for (slot, state) in &passthrough {
                        results[1 + *slot] = *state;
                    }
                    for (position, (slot, _)) in consumed.iter().enumerate() {
                        results[1 + *slot] = reduced[1 + position];
                    }
                    return Ok(Some(results));
                }
            }
        }
        Ok(None)
    }
}

impl NormalForm for LoadNormalForm {
    fn flags(&self) -> &NormalFormFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut NormalFormFlags {
        &mut self.flags
    }

    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        let load = match op.as_any().downcast_ref::<Load>() {
            Some(load) if self.flags.mutable => load,
            _ => {
                let node = graph.create_simple_node(region, op, operands)?;
                return Ok(graph.outputs(node));
            }
        };
        if operands.len() != op.narguments() {
            return Err(IrError::ArityMismatch {
                what: op.debug_string(),
                expected: op.narguments(),
                actual: operands.len(),
            });
        }
        for (operand, ty) in operands.iter().zip(op.operand_types()) {
            graph.check_origin(region, *operand, ty)?;
        }
        let loaded_type = load.loaded_type().clone();
        self.build_load(graph, region, &loaded_type, operands[0], &operands[1..], None)
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if !self.flags.mutable {
            return Ok(false);
        }
        let loaded_type = match graph
            .kind(node)
            .operator()
            .and_then(|op| op.as_any().downcast_ref::<Load>())
        {
            Some(load) => load.loaded_type().clone(),
            None => return Ok(false),
        };
        let operands = graph.operands(node);
        let address = operands[0];
        let states = &operands[1..];
        let region = graph.region_of(node);
        if let Some(results) =
            self.try_reduce(graph, region, &loaded_type, address, states, Some(node))?
        {
            for (index, replacement) in results.iter().enumerate() {
                let out = graph.output(node, index);
                graph.divert_users(out, *replacement)?;
            }
            graph.remove_node(node)?;
            return Ok(true);
        }
        if self.flags.cse {
            return cse_node(graph, node);
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---- alloca normal form ------------------------------------------------

/// Normal form for [`Alloca`]. CSE is off by default: equal-typed
/// allocations are distinct objects and must not merge.
#[derive(Debug)]
pub struct AllocaNormalForm {
    flags: NormalFormFlags,
}

impl Default for AllocaNormalForm {
    fn default() -> Self {
        AllocaNormalForm {
            flags: NormalFormFlags {
                mutable: true,
                cse: false,
            },
        }
    }
}

impl NormalForm for AllocaNormalForm {
    fn flags(&self) -> &NormalFormFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut NormalFormFlags {
        &mut self.flags
    }

    fn normalized_create(
        &self,
        graph: &mut Graph,
        region: Region,
        op: Box<dyn Operator>,
        operands: &[Origin],
    ) -> Result<Vec<Origin>, IrError> {
        if self.flags.mutable && self.flags.cse {
            if let Some(existing) =
                find_congruent_node_except(graph, region, op.as_ref(), operands, None)
            {
                return Ok(graph.outputs(existing));
            }
        }
        let node = graph.create_simple_node(region, op, operands)?;
        Ok(graph.outputs(node))
    }

    fn normalize_node(&self, graph: &mut Graph, node: Node) -> Result<bool, IrError> {
        if self.flags.mutable && self.flags.cse {
            return cse_node(graph, node);
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
