// Copyright 2025 Irreducible Inc.
//! Layer inference for a single circuit.
//!
//! A circuit is turned into a graph whose nodes are its wires plus a few synthetic ones:
//! relays carrying the hint inputs of every callee from layer 0 up to the call, one virtual
//! node per call standing for the callee's body, and one node per combined constraint. Every
//! used node lives on the contiguous layer range `min_layer..=max_layer`.

use std::{collections::VecDeque, ops::Range};

use rustc_hash::{FxHashMap, FxHashSet};
use stratum_field::Field;

use crate::{
	error::{Error, IrLocation},
	ir::{Circuit, Expression, Instruction},
};

/// What a node of the per-circuit graph stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Node {
	/// Wire 0. Never placed: constants become gate coefficients.
	One,
	Input,
	HintOutput,
	/// Hint input `slot` of the callee of call `call`.
	Relay { call: usize, slot: usize },
	Internal { insn: usize },
	Random,
	PublicInput { index: usize },
	Custom { insn: usize },
	CallOutput { call: usize, index: usize },
	Virtual { call: usize },
	Combined,
}

/// One sub-circuit call as seen by the caller.
#[derive(Debug, Clone)]
pub(super) struct Call {
	pub insn: usize,
	pub callee: usize,
	pub inputs: Vec<usize>,
	/// Relay nodes, one per hint input of the callee.
	pub relays: Range<usize>,
	pub outputs: Range<usize>,
	pub virtual_node: usize,
	/// Layer holding the callee's layer 0.
	pub start: usize,
	/// Layer holding the callee's output layer.
	pub end: usize,
	/// Whether the callee is instantiated at all.
	pub live: bool,
}

impl Call {
	/// Caller nodes making up the callee's layer 0, paired with the callee nodes they become.
	pub fn entry<'a>(&'a self, callee: &'a CircuitInfo) -> impl Iterator<Item = (usize, usize)> + 'a {
		self.inputs
			.iter()
			.enumerate()
			.map(|(j, &wire)| (wire, j + 1))
			.chain(self.relays.clone().zip(callee.hint_inputs.iter().copied()))
	}

	/// Caller nodes receiving the callee's outputs, paired with the callee's output nodes.
	pub fn exit<'a>(&'a self, callee: &'a CircuitInfo) -> impl Iterator<Item = (usize, usize)> + 'a {
		self.outputs.clone().zip(callee.outputs.iter().copied())
	}
}

/// The random linear combination of everything that must vanish at one layer.
#[derive(Debug, Clone)]
pub(super) struct Combined {
	pub node: usize,
	/// Constraint wires of the previous layer.
	pub wires: Vec<usize>,
	/// Calls whose callee exposes a combined constraint on the previous layer.
	pub calls: Vec<usize>,
	/// The combined constraint of the previous layer, chained in the root circuit.
	pub chained: Option<usize>,
}

#[derive(Debug)]
pub(super) struct CircuitInfo {
	pub id: usize,
	pub nodes: Vec<Node>,
	pub min_layer: Vec<usize>,
	pub calls: Vec<Call>,
	/// Own hint outputs in instruction order, then the relays of every call in call order.
	pub hint_inputs: Vec<usize>,
	pub outputs: Vec<usize>,
	pub output_layer: usize,
	/// Combined constraint of every layer that has one.
	pub combined: Vec<Option<Combined>>,
	/// Nodes living on each layer, ascending.
	pub layer_nodes: Vec<Vec<usize>>,
	layer_index: Vec<FxHashMap<usize, usize>>,
	output_index: FxHashMap<usize, usize>,
}

fn single_wire<F: Field>(
	circuit_id: usize,
	e: &Expression<F>,
	location: IrLocation,
) -> Result<usize, Error> {
	e.as_single_var()
		.ok_or_else(|| Error::malformed(circuit_id, location, "expected a single wire"))
}

impl CircuitInfo {
	/// Infers the layers of `circuit`. Every callee must already be in `callees`.
	pub fn analyze<F: Field>(
		id: usize,
		circuit: &Circuit<F>,
		callees: &FxHashMap<usize, CircuitInfo>,
		is_root: bool,
	) -> Result<Self, Error> {
		let num_wires = circuit.num_wires();
		let mut nodes = vec![Node::Input; num_wires];
		nodes[0] = Node::One;
		let mut calls = Vec::new();
		let mut own_hints = Vec::new();
		for (insn, (first, instruction)) in circuit.instructions_with_outputs().enumerate() {
			let outs = first..first + instruction.num_outputs();
			match instruction {
				Instruction::InternalVariable { .. } => nodes[first] = Node::Internal { insn },
				Instruction::Hint { .. } => {
					for wire in outs {
						nodes[wire] = Node::HintOutput;
						own_hints.push(wire);
					}
				}
				Instruction::SubCircuitCall {
					sub_circuit_id,
					inputs,
					..
				} => {
					let callee = callees.get(sub_circuit_id).ok_or_else(|| {
						Error::malformed(
							id,
							IrLocation::Instruction(insn),
							format!("circuit {sub_circuit_id} is not laid out before its caller"),
						)
					})?;
					let call = calls.len();
					for (index, wire) in outs.clone().enumerate() {
						nodes[wire] = Node::CallOutput { call, index };
					}
					let inputs = inputs
						.iter()
						.map(|e| single_wire(id, e, IrLocation::Instruction(insn)))
						.collect::<Result<Vec<_>, _>>()?;
					let num_relays = callee.hint_inputs.len();
					calls.push(Call {
						insn,
						callee: *sub_circuit_id,
						inputs,
						relays: 0..num_relays,
						outputs: outs,
						virtual_node: 0,
						start: 0,
						end: 0,
						live: false,
					});
				}
				Instruction::GetRandom => nodes[first] = Node::Random,
				Instruction::PublicInput { index } => {
					nodes[first] = Node::PublicInput { index: *index }
				}
				Instruction::CustomGate { .. } => nodes[first] = Node::Custom { insn },
			}
		}

		for (call_idx, call) in calls.iter_mut().enumerate() {
			let start = nodes.len();
			nodes.extend((0..call.relays.len()).map(|slot| Node::Relay {
				call: call_idx,
				slot,
			}));
			call.relays = start..nodes.len();
		}
		for (call_idx, call) in calls.iter_mut().enumerate() {
			call.virtual_node = nodes.len();
			nodes.push(Node::Virtual { call: call_idx });
		}
		let hint_inputs = own_hints
			.iter()
			.copied()
			.chain(calls.iter().flat_map(|call| call.relays.clone()))
			.collect::<Vec<_>>();
		let outputs = circuit
			.outputs
			.iter()
			.enumerate()
			.map(|(i, e)| single_wire(id, e, IrLocation::Output(i)))
			.collect::<Result<Vec<_>, _>>()?;
		let constraints = circuit
			.constraints
			.iter()
			.enumerate()
			.map(|(i, e)| single_wire(id, e, IrLocation::Constraint(i)))
			.collect::<Result<Vec<_>, _>>()?;

		let n = nodes.len();
		let mut succ = vec![Vec::new(); n];
		let mut pred = vec![Vec::new(); n];
		let mut advance = vec![1usize; n];
		let mut min_layer = vec![0usize; n];
		let mut edge = |from: usize, to: usize| {
			succ[from].push(to);
			pred[to].push(from);
		};
		for (insn, (first, instruction)) in circuit.instructions_with_outputs().enumerate() {
			match instruction {
				Instruction::InternalVariable { expr } => {
					expr.vars().for_each(|v| edge(v, first));
					if expr.vars().next().is_none() {
						min_layer[first] = 1;
					}
				}
				Instruction::CustomGate { inputs, .. } => {
					for e in inputs {
						edge(single_wire(id, e, IrLocation::Instruction(insn))?, first);
					}
				}
				Instruction::GetRandom | Instruction::PublicInput { .. } => min_layer[first] = 1,
				Instruction::Hint { .. } | Instruction::SubCircuitCall { .. } => {}
			}
		}
		for call in &calls {
			let callee = &callees[&call.callee];
			let node = call.virtual_node;
			for &wire in &call.inputs {
				edge(wire, node);
			}
			for relay in call.relays.clone() {
				edge(relay, node);
			}
			for wire in call.outputs.clone() {
				edge(node, wire);
			}
			advance[node] = callee.output_layer - 1;
			min_layer[node] = advance[node];
		}

		// Backwards reachability from everything the circuit must produce.
		let mut used = vec![false; n];
		let mut queue = VecDeque::new();
		let seeds = (1..=circuit.num_inputs)
			.chain(hint_inputs.iter().copied())
			.chain(outputs.iter().copied())
			.chain(constraints.iter().copied())
			.chain(
				calls
					.iter()
					.filter(|call| callees[&call.callee].has_combined())
					.map(|call| call.virtual_node),
			);
		for seed in seeds {
			if !used[seed] {
				used[seed] = true;
				queue.push_back(seed);
			}
		}
		while let Some(x) = queue.pop_front() {
			for &p in &pred[x] {
				if !used[p] {
					used[p] = true;
					queue.push_back(p);
				}
			}
		}
		for call in &mut calls {
			call.live = used[call.virtual_node];
			if call.live {
				call.outputs.clone().for_each(|wire| used[wire] = true);
			}
		}

		// Relays have no predecessors and every wire only reads earlier wires, so relays
		// followed by wires in id order, each call's virtual node just before its outputs, is
		// a topological order.
		let mut order = Vec::with_capacity(n);
		order.extend(calls.iter().flat_map(|call| call.relays.clone()));
		let mut call_at = calls
			.iter()
			.map(|call| (call.outputs.start, call.virtual_node))
			.collect::<FxHashMap<_, _>>();
		for wire in 1..num_wires {
			if let Some(node) = call_at.remove(&wire) {
				order.push(node);
			}
			order.push(wire);
		}
		for &x in &order {
			if !used[x] {
				continue;
			}
			for &y in &succ[x] {
				if used[y] {
					min_layer[y] = min_layer[y].max(min_layer[x] + advance[y]);
				}
			}
		}
		for call in calls.iter_mut().filter(|call| call.live) {
			let node = call.virtual_node;
			call.start = min_layer[node] - advance[node];
			call.end = min_layer[node] + 1;
		}

		let max_occurring = (0..n).filter(|&x| used[x]).map(|x| min_layer[x]).max().unwrap_or(0);
		let mut output_layer = outputs.iter().map(|&wire| min_layer[wire]).max().unwrap_or(0);
		for call in calls.iter().filter(|call| call.live) {
			output_layer = output_layer.max(call.end);
		}

		let mut buckets = vec![(Vec::new(), Vec::new()); max_occurring + 3];
		for &wire in &constraints {
			buckets[min_layer[wire] + 1].0.push(wire);
		}
		for (call_idx, call) in calls.iter().enumerate().filter(|(_, call)| call.live) {
			let callee = &callees[&call.callee];
			for (layer, combined) in callee.combined.iter().enumerate() {
				if combined.is_some() {
					buckets[call.start + layer + 1].1.push(call_idx);
				}
			}
		}
		let is_empty = |bucket: &(Vec<usize>, Vec<usize>)| bucket.0.is_empty() && bucket.1.is_empty();
		let chain_from = if is_root {
			let first = buckets.iter().position(|b| !is_empty(b)).ok_or_else(|| {
				Error::malformed(id, IrLocation::Circuit, "the root circuit has no constraint")
			})?;
			buckets.truncate(max_occurring + 2);
			Some(first)
		} else {
			None
		};

		let mut combined = Vec::with_capacity(buckets.len());
		let mut prev = None;
		for (layer, (wires, calls_here)) in buckets.into_iter().enumerate() {
			let chained = chain_from.is_some_and(|first| layer >= first);
			if wires.is_empty() && calls_here.is_empty() && !chained {
				combined.push(None);
				continue;
			}
			let node = nodes.len();
			nodes.push(Node::Combined);
			min_layer.push(layer);
			used.push(true);
			succ.push(Vec::new());
			advance.push(0);
			combined.push(Some(Combined {
				node,
				wires,
				calls: calls_here,
				chained: if chained { prev } else { None },
			}));
			prev = Some(node);
			if is_root {
				output_layer = output_layer.max(layer);
			} else {
				output_layer = output_layer.max(layer + 1);
			}
		}
		output_layer = output_layer.max(1);
		if !is_root {
			output_layer = bump_for_partial_outputs(&calls, &outputs, &min_layer, callees, output_layer);
		}
		combined.resize_with(output_layer + 1, || None);

		let n = nodes.len();
		let mut max_layer = min_layer.clone();
		for x in 0..n {
			if !used[x] {
				continue;
			}
			for &y in &succ[x] {
				if used[y] {
					max_layer[x] = max_layer[x].max(min_layer[y] - advance[y]);
				}
			}
		}
		for &wire in &outputs {
			max_layer[wire] = output_layer;
		}

		// Sources without inputs are produced as late as their first use allows.
		let pinned = outputs.iter().chain(&constraints).copied().collect::<FxHashSet<_>>();
		for x in 0..num_wires {
			let source = match nodes[x] {
				Node::Random | Node::PublicInput { .. } => true,
				Node::Internal { .. } => pred[x].is_empty(),
				_ => false,
			};
			if !source || !used[x] || pinned.contains(&x) {
				continue;
			}
			let latest = succ[x]
				.iter()
				.filter(|&&y| used[y])
				.map(|&y| min_layer[y] - advance[y])
				.min();
			if let Some(latest) = latest {
				min_layer[x] = min_layer[x].max(latest);
			}
		}

		let mut layer_nodes = vec![Vec::new(); output_layer + 1];
		for x in 0..n {
			if !used[x] || matches!(nodes[x], Node::One | Node::Virtual { .. }) {
				continue;
			}
			if max_layer[x] > output_layer || min_layer[x] > max_layer[x] {
				return Err(Error::inconsistent(
					id,
					max_layer[x],
					format!("node {x} lives on {}..={}", min_layer[x], max_layer[x]),
				));
			}
			for layer in min_layer[x]..=max_layer[x] {
				layer_nodes[layer].push(x);
			}
		}
		let layer_index = layer_nodes
			.iter()
			.map(|on_layer| on_layer.iter().enumerate().map(|(i, &x)| (x, i)).collect())
			.collect();
		let output_index = outputs.iter().enumerate().map(|(i, &x)| (x, i)).collect();

		tracing::trace!(
			circuit_id = id,
			output_layer,
			num_nodes = n,
			num_calls = calls.len(),
			num_hint_inputs = hint_inputs.len(),
			"inferred layers"
		);

		Ok(Self {
			id,
			nodes,
			min_layer,
			calls,
			hint_inputs,
			outputs,
			output_layer,
			combined,
			layer_nodes,
			layer_index,
			output_index,
		})
	}

	pub fn has_combined(&self) -> bool {
		self.combined.iter().any(Option::is_some)
	}

	/// Position of `node` in the node list of `layer`.
	pub fn index_of(&self, layer: usize, node: usize) -> Option<usize> {
		self.layer_index.get(layer)?.get(&node).copied()
	}

	/// Which output `node` is.
	pub fn output_position(&self, node: usize) -> Option<usize> {
		self.output_index.get(&node).copied()
	}
}

/// A call ending on the output layer must either feed only outputs there or none of them,
/// otherwise the output layer would hold wires the caller cannot name. One more layer
/// relays the outputs apart.
fn bump_for_partial_outputs(
	calls: &[Call],
	outputs: &[usize],
	min_layer: &[usize],
	callees: &FxHashMap<usize, CircuitInfo>,
	output_layer: usize,
) -> usize {
	let is_output = outputs.iter().copied().collect::<FxHashSet<_>>();
	for call in calls.iter().filter(|call| call.live) {
		if !call.outputs.clone().all(|wire| min_layer[wire] == output_layer) {
			continue;
		}
		let fed = call.outputs.clone().filter(|wire| is_output.contains(wire)).count();
		if (fed != 0 || callees[&call.callee].has_combined()) && fed != call.outputs.len() {
			return output_layer + 1;
		}
	}
	output_layer
}

#[cfg(test)]
mod tests {
	use stratum_field::M31;

	use super::*;

	fn var(v: usize) -> Expression<M31> {
		Expression::var(v)
	}

	fn analyze_root(circuit: &Circuit<M31>) -> CircuitInfo {
		CircuitInfo::analyze(0, circuit, &FxHashMap::default(), true).unwrap()
	}

	fn live_layers(info: &CircuitInfo, node: usize) -> Vec<usize> {
		(0..=info.output_layer)
			.filter(|&layer| info.index_of(layer, node).is_some())
			.collect()
	}

	#[test]
	fn test_product_check() {
		// w3 = x·y, w4 = w3 - z, constraint w4
		let circuit = Circuit {
			num_inputs: 3,
			instructions: vec![
				Instruction::InternalVariable {
					expr: &var(1) * &var(2),
				},
				Instruction::InternalVariable {
					expr: &var(4) - &var(3),
				},
			],
			constraints: vec![var(5)],
			outputs: vec![],
		};
		let info = analyze_root(&circuit);
		assert_eq!(&info.min_layer[1..6], &[0, 0, 0, 1, 2]);
		assert_eq!(live_layers(&info, 3), vec![0, 1]);
		assert_eq!(info.output_layer, 3);
		let last = info.combined[3].as_ref().unwrap();
		assert_eq!(last.wires, vec![5]);
		assert_eq!(info.layer_nodes[3], vec![last.node]);
		assert_eq!(info.layer_nodes[0], vec![1, 2, 3]);
		assert_eq!(info.layer_nodes[1], vec![3, 4]);
	}

	#[test]
	fn test_root_chains_combined_constraints() {
		// Constraint on an input (layer 0) and on a product (layer 1).
		let circuit = Circuit {
			num_inputs: 2,
			instructions: vec![Instruction::InternalVariable {
				expr: &var(1) * &var(2),
			}],
			constraints: vec![var(1), var(3)],
			outputs: vec![],
		};
		let info = analyze_root(&circuit);
		assert_eq!(info.output_layer, 2);
		let first = info.combined[1].as_ref().unwrap();
		let second = info.combined[2].as_ref().unwrap();
		assert_eq!(first.chained, None);
		assert_eq!(second.chained, Some(first.node));
		assert_eq!(second.wires, vec![3]);
	}

	#[test]
	fn test_root_without_constraints_is_rejected() {
		let circuit = Circuit::<M31> {
			num_inputs: 1,
			..Circuit::default()
		};
		let err = CircuitInfo::analyze(0, &circuit, &FxHashMap::default(), true).unwrap_err();
		assert!(matches!(err, Error::IrMalformed { .. }));
	}

	#[test]
	fn test_random_values_are_produced_late() {
		// w2 = random, w3 = x·x, w4 = w3·x, w5 = w4 + w2
		let circuit = Circuit {
			num_inputs: 1,
			instructions: vec![
				Instruction::GetRandom,
				Instruction::InternalVariable {
					expr: &var(1) * &var(1),
				},
				Instruction::InternalVariable {
					expr: &var(3) * &var(1),
				},
				Instruction::InternalVariable {
					expr: &var(4) + &var(2),
				},
			],
			constraints: vec![var(5)],
			outputs: vec![],
		};
		let info = analyze_root(&circuit);
		assert_eq!(info.min_layer[5], 3);
		assert_eq!(info.min_layer[2], 2);
		assert_eq!(live_layers(&info, 2), vec![2]);
	}

	#[test]
	fn test_calls_thread_hint_inputs() {
		// Callee: one input, a hint h, output w3 = x·h, constraint on h.
		let callee = Circuit {
			num_inputs: 1,
			instructions: vec![
				Instruction::Hint {
					hint_id: 1,
					inputs: vec![var(1)],
					num_outputs: 1,
				},
				Instruction::InternalVariable {
					expr: &var(1) * &var(2),
				},
			],
			constraints: vec![var(2)],
			outputs: vec![var(3)],
		};
		let callee = CircuitInfo::analyze(1, &callee, &FxHashMap::default(), false).unwrap();
		assert_eq!(callee.hint_inputs, vec![2]);
		// The constraint on `h` is combined at layer 1, which must stay inside the callee.
		assert_eq!(callee.output_layer, 2);
		assert!(callee.combined[1].is_some());

		let mut callees = FxHashMap::default();
		callees.insert(1, callee);
		// Root: w2 = x·x, w3 = call(w2), constraint w3.
		let root = Circuit {
			num_inputs: 1,
			instructions: vec![
				Instruction::InternalVariable {
					expr: &var(1) * &var(1),
				},
				Instruction::SubCircuitCall {
					sub_circuit_id: 1,
					inputs: vec![var(2)],
					num_outputs: 1,
				},
			],
			constraints: vec![var(3)],
			outputs: vec![],
		};
		let info = CircuitInfo::analyze(0, &root, &callees, true).unwrap();
		let call = &info.calls[0];
		assert!(call.live);
		assert_eq!((call.start, call.end), (1, 3));
		assert_eq!(call.relays.len(), 1);
		let relay = call.relays.start;
		assert_eq!(live_layers(&info, relay), vec![0, 1]);
		assert_eq!(info.hint_inputs, vec![relay]);
		// The callee's combined constraint at its layer 1 is read at root layer 3.
		assert_eq!(info.combined[3].as_ref().unwrap().calls, vec![0]);
		assert_eq!(info.output_layer, 4);
	}

	#[test]
	fn test_partially_used_call_on_the_output_layer() {
		// Callee returns (x·x, x + x).
		let callee = Circuit {
			num_inputs: 1,
			instructions: vec![
				Instruction::InternalVariable {
					expr: &var(1) * &var(1),
				},
				Instruction::InternalVariable {
					expr: &var(1) + &var(1),
				},
			],
			constraints: vec![],
			outputs: vec![var(2), var(3)],
		};
		let callee = CircuitInfo::analyze(1, &callee, &FxHashMap::default(), false).unwrap();
		let mut callees = FxHashMap::default();
		callees.insert(1, callee);
		// Caller forwards only the first output of the call.
		let caller = Circuit {
			num_inputs: 1,
			instructions: vec![Instruction::SubCircuitCall {
				sub_circuit_id: 1,
				inputs: vec![var(1)],
				num_outputs: 2,
			}],
			constraints: vec![],
			outputs: vec![var(2)],
		};
		let info = CircuitInfo::analyze(2, &caller, &callees, false).unwrap();
		assert_eq!(info.calls[0].end, 1);
		assert_eq!(info.layer_nodes[1], vec![2, 3]);
		assert_eq!(info.output_layer, 2);
		assert_eq!(info.layer_nodes[2], vec![2]);
	}
}
