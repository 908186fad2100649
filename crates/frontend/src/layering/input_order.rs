// Copyright 2025 Irreducible Inc.
use rustc_hash::FxHashMap;
use stratum_field::Field;

use super::{inference::CircuitInfo, layout::LayerLayout};
use crate::{
	error::Error,
	ir::{Instruction, RootCircuit},
};

/// Where the values computed by the witness solver go in the layer-0 vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOrder {
	/// Length of the layer-0 vector.
	pub input_len: usize,
	/// Slot of every input of the root circuit.
	pub inputs: Vec<usize>,
	/// Slots of the hint outputs of the root circuit, in instruction order.
	pub hints: Vec<HintSlots>,
}

/// Slots of the hint outputs produced by one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintSlots {
	/// The outputs of the hint instruction `insn`.
	Hint { insn: usize, slots: Vec<usize> },
	/// Everything hinted inside the callee of the call instruction `insn`.
	Call { insn: usize, inner: Vec<HintSlots> },
}

impl InputOrder {
	pub(super) fn record<F: Field>(
		rc: &RootCircuit<F>,
		infos: &FxHashMap<usize, CircuitInfo>,
		layout: &LayerLayout,
	) -> Result<Self, Error> {
		let root_id = RootCircuit::<F>::ROOT_ID;
		let root = &infos[&root_id];
		let by_node = layout
			.own_slots()
			.into_iter()
			.map(|(slot, idx)| (root.layer_nodes[0][idx], slot))
			.collect::<FxHashMap<_, _>>();
		let slot = |node: usize| {
			by_node.get(&node).copied().ok_or_else(|| {
				Error::inconsistent(root_id, 0, format!("node {node} has no input slot"))
			})
		};
		let inputs = (1..=rc.num_inputs()).map(slot).collect::<Result<Vec<_>, _>>()?;
		let hint_slots = root
			.hint_inputs
			.iter()
			.map(|&node| slot(node))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self {
			input_len: layout.size,
			inputs,
			hints: hint_tree(rc, infos, root_id, &hint_slots)?,
		})
	}
}

/// Distributes `slots`, one per hint input of the circuit, over its instructions.
fn hint_tree<F: Field>(
	rc: &RootCircuit<F>,
	infos: &FxHashMap<usize, CircuitInfo>,
	circuit_id: usize,
	slots: &[usize],
) -> Result<Vec<HintSlots>, Error> {
	let info = &infos[&circuit_id];
	let by_node = info
		.hint_inputs
		.iter()
		.copied()
		.zip(slots.iter().copied())
		.collect::<FxHashMap<_, _>>();
	let slot = |node: usize| {
		by_node.get(&node).copied().ok_or_else(|| {
			Error::inconsistent(circuit_id, 0, format!("node {node} is not a hint input"))
		})
	};
	let mut calls = info.calls.iter();
	let mut tree = Vec::new();
	for (insn, (first, instruction)) in rc.circuits[&circuit_id]
		.instructions_with_outputs()
		.enumerate()
	{
		match instruction {
			Instruction::Hint { num_outputs, .. } => tree.push(HintSlots::Hint {
				insn,
				slots: (first..first + num_outputs)
					.map(slot)
					.collect::<Result<Vec<_>, _>>()?,
			}),
			Instruction::SubCircuitCall { .. } => {
				let call = calls.next().ok_or_else(|| {
					Error::inconsistent(circuit_id, 0, format!("instruction #{insn} is an unknown call"))
				})?;
				let inner = call.relays.clone().map(slot).collect::<Result<Vec<_>, _>>()?;
				tree.push(HintSlots::Call {
					insn,
					inner: hint_tree(rc, infos, call.callee, &inner)?,
				});
			}
			_ => {}
		}
	}
	Ok(tree)
}
