// Copyright 2025 Irreducible Inc.

//! Size statistics of layered circuits and of the IR they are compiled from.

use std::fmt;

use stratum_core::LayeredCircuit;
use stratum_field::Field;

use crate::ir::{Instruction, RootCircuit};

/// Weight of one layer-0 slot in [`CircuitStat::total_cost`].
pub const COST_INPUT: usize = 1000;
/// Weight of one gate slot of a non-input layer.
pub const COST_VARIABLE: usize = 100;
/// Weight of one multiplication gate. Custom gates weigh the same.
pub const COST_MUL: usize = 10;
/// Weight of one addition gate.
pub const COST_ADD: usize = 3;
/// Weight of one constant gate.
pub const COST_CONST: usize = 3;

/// Various stats of a layered circuit that affect the prover performance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitStat {
	/// Number of distinct compiled layers.
	pub num_compiled_layers: usize,
	/// Number of layers, not counting the input layer.
	pub num_layers: usize,
	/// Length of the input vector.
	pub num_inputs: usize,
	/// Number of input slots some gate reads.
	pub num_used_inputs: usize,
	/// Gates owned by the compiled layers, counted once per compiled layer.
	pub num_total_mul: usize,
	pub num_total_add: usize,
	pub num_total_cst: usize,
	pub num_total_custom: usize,
	/// Gates of the flattened circuit, with every child placement counted.
	pub num_expanded_mul: usize,
	pub num_expanded_add: usize,
	pub num_expanded_cst: usize,
	pub num_expanded_custom: usize,
	/// Sum of the output lengths of all layers.
	pub num_total_gates: usize,
	/// Output slots some gate writes.
	pub num_used_gates: usize,
	/// Weighted cost estimate, see [`COST_INPUT`] and friends.
	pub total_cost: usize,
}

#[derive(Clone, Copy, Default)]
struct Expanded {
	mul: usize,
	add: usize,
	cst: usize,
	custom: usize,
}

impl CircuitStat {
	/// Collects the stats of a circuit that passes [`LayeredCircuit::validate`].
	pub fn collect<F>(circuit: &LayeredCircuit<F>) -> Self {
		let mut stat = Self {
			num_compiled_layers: circuit.circuits.len(),
			num_layers: circuit.layers.len(),
			num_inputs: circuit.input_len(),
			..Self::default()
		};

		let mut expanded: Vec<Expanded> = Vec::with_capacity(circuit.circuits.len());
		for layer in &circuit.circuits {
			let mut e = Expanded {
				mul: layer.muls.len(),
				add: layer.adds.len(),
				cst: layer.csts.len(),
				custom: layer.customs.len(),
			};
			stat.num_total_mul += e.mul;
			stat.num_total_add += e.add;
			stat.num_total_cst += e.cst;
			stat.num_total_custom += e.custom;
			for sub in &layer.sub_allocations {
				let child = expanded[sub.id];
				let n = sub.allocations.len();
				e.mul += child.mul * n;
				e.add += child.add * n;
				e.cst += child.cst * n;
				e.custom += child.custom * n;
			}
			expanded.push(e);
		}
		for &id in &circuit.layers {
			let e = expanded[id];
			stat.num_expanded_mul += e.mul;
			stat.num_expanded_add += e.add;
			stat.num_expanded_cst += e.cst;
			stat.num_expanded_custom += e.custom;
		}

		let masks = circuit.slot_masks();
		for &id in &circuit.layers {
			stat.num_total_gates += circuit.circuits[id].output_len;
			stat.num_used_gates += masks[id].written.iter().filter(|&&w| w).count();
		}
		if let Some(&first) = circuit.layers.first() {
			stat.num_used_inputs = masks[first].read.iter().filter(|&&r| r).count();
		}

		stat.total_cost = stat.num_inputs * COST_INPUT
			+ stat.num_total_gates * COST_VARIABLE
			+ (stat.num_expanded_mul + stat.num_expanded_custom) * COST_MUL
			+ stat.num_expanded_add * COST_ADD
			+ stat.num_expanded_cst * COST_CONST;
		stat
	}
}

/// Formats `n` with thousands separators.
fn fmt_num(n: usize) -> String {
	let s = n.to_string();
	let mut result = String::new();
	for (i, c) in s.chars().rev().enumerate() {
		if i > 0 && i % 3 == 0 {
			result.push(',');
		}
		result.push(c);
	}
	result.chars().rev().collect()
}

impl fmt::Display for CircuitStat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "Layers")?;
		writeln!(f, "├─ Layers: {}", fmt_num(self.num_layers))?;
		writeln!(f, "└─ Compiled layers: {}", fmt_num(self.num_compiled_layers))?;
		writeln!(f)?;

		writeln!(f, "Slots")?;
		writeln!(
			f,
			"├─ Inputs: {} used of {}",
			fmt_num(self.num_used_inputs),
			fmt_num(self.num_inputs)
		)?;
		let used_percent = if self.num_total_gates > 0 {
			self.num_used_gates as f64 / self.num_total_gates as f64 * 100.0
		} else {
			0.0
		};
		writeln!(
			f,
			"└─ Gate slots: {} used of {} ({:.1}%)",
			fmt_num(self.num_used_gates),
			fmt_num(self.num_total_gates),
			used_percent
		)?;
		writeln!(f)?;

		writeln!(f, "Gates (compiled / expanded)")?;
		writeln!(
			f,
			"├─ Mul: {} / {}",
			fmt_num(self.num_total_mul),
			fmt_num(self.num_expanded_mul)
		)?;
		writeln!(
			f,
			"├─ Add: {} / {}",
			fmt_num(self.num_total_add),
			fmt_num(self.num_expanded_add)
		)?;
		writeln!(
			f,
			"├─ Cst: {} / {}",
			fmt_num(self.num_total_cst),
			fmt_num(self.num_expanded_cst)
		)?;
		writeln!(
			f,
			"└─ Custom: {} / {}",
			fmt_num(self.num_total_custom),
			fmt_num(self.num_expanded_custom)
		)?;
		writeln!(f)?;

		writeln!(f, "Total cost: {}", fmt_num(self.total_cost))
	}
}

/// Size of an IR, summed over all of its circuits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrStat {
	/// Number of circuits, the root included.
	pub num_circuits: usize,
	/// Inputs of the root circuit.
	pub num_inputs: usize,
	pub num_instructions: usize,
	/// Number of hint instructions.
	pub num_hints: usize,
	/// Number of sub-circuit calls.
	pub num_calls: usize,
	pub num_constraints: usize,
	/// Wires of every circuit, constant wire included.
	pub num_wires: usize,
	/// Terms of every expression: instruction inputs, constraints and outputs.
	pub num_terms: usize,
}

impl IrStat {
	pub fn collect<F: Field>(rc: &RootCircuit<F>) -> Self {
		let mut stat = Self {
			num_circuits: rc.circuits.len(),
			num_inputs: rc.num_inputs(),
			..Self::default()
		};
		for circuit in rc.circuits.values() {
			stat.num_instructions += circuit.instructions.len();
			stat.num_constraints += circuit.constraints.len();
			stat.num_wires += circuit.num_wires();
			for insn in &circuit.instructions {
				match insn {
					Instruction::Hint { .. } => stat.num_hints += 1,
					Instruction::SubCircuitCall { .. } => stat.num_calls += 1,
					_ => {}
				}
				stat.num_terms += match insn {
					Instruction::InternalVariable { expr } => expr.len(),
					other => other.inputs().iter().map(|e| e.len()).sum(),
				};
			}
			stat.num_terms += circuit
				.constraints
				.iter()
				.chain(&circuit.outputs)
				.map(|e| e.len())
				.sum::<usize>();
		}
		stat
	}
}

impl fmt::Display for IrStat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "IR")?;
		writeln!(f, "├─ Circuits: {}", fmt_num(self.num_circuits))?;
		writeln!(f, "├─ Inputs: {}", fmt_num(self.num_inputs))?;
		writeln!(
			f,
			"├─ Instructions: {} ({} hints, {} calls)",
			fmt_num(self.num_instructions),
			fmt_num(self.num_hints),
			fmt_num(self.num_calls)
		)?;
		writeln!(f, "├─ Constraints: {}", fmt_num(self.num_constraints))?;
		writeln!(f, "├─ Wires: {}", fmt_num(self.num_wires))?;
		writeln!(f, "└─ Terms: {}", fmt_num(self.num_terms))
	}
}

#[cfg(test)]
mod tests {
	use stratum_core::{Allocation, Coef, CompiledLayer, Gate, SubAllocation};
	use stratum_field::{Field, M31};

	use super::*;
	use crate::ir::{Circuit, Expression};

	#[test]
	fn test_fmt_num() {
		assert_eq!(fmt_num(0), "0");
		assert_eq!(fmt_num(999), "999");
		assert_eq!(fmt_num(1000), "1,000");
		assert_eq!(fmt_num(1234567), "1,234,567");
	}

	#[test]
	fn test_children_are_expanded_per_placement() {
		let one = Coef::Constant(M31::ONE);
		let mut child = CompiledLayer::new(2, 1);
		child.muls.push(Gate {
			inputs: [0, 1],
			output: 0,
			coef: one.clone(),
		});
		let mut parent = CompiledLayer::new(4, 2);
		parent.sub_allocations.push(SubAllocation {
			id: 0,
			allocations: vec![
				Allocation {
					input_offset: 0,
					output_offset: 0,
				},
				Allocation {
					input_offset: 2,
					output_offset: 1,
				},
			],
		});
		parent.csts.push(Gate {
			inputs: [],
			output: 0,
			coef: one.clone(),
		});
		let mut top = CompiledLayer::new(2, 1);
		top.adds.push(Gate {
			inputs: [0],
			output: 0,
			coef: one,
		});
		let circuit = LayeredCircuit {
			num_public_inputs: 0,
			num_actual_outputs: 1,
			expected_num_output_zeroes: 1,
			circuits: vec![child, parent, top],
			layers: vec![1, 2],
		};
		circuit.validate().unwrap();

		let stat = CircuitStat::collect(&circuit);
		assert_eq!(stat.num_compiled_layers, 3);
		assert_eq!(stat.num_layers, 2);
		assert_eq!((stat.num_total_mul, stat.num_total_add, stat.num_total_cst), (1, 1, 1));
		assert_eq!((stat.num_expanded_mul, stat.num_expanded_add, stat.num_expanded_cst), (2, 1, 1));
		assert_eq!((stat.num_inputs, stat.num_used_inputs), (4, 4));
		assert_eq!((stat.num_total_gates, stat.num_used_gates), (3, 3));
		assert_eq!(stat.total_cost, 4 * COST_INPUT + 3 * COST_VARIABLE + 2 * COST_MUL + COST_ADD + COST_CONST);
		assert!(stat.to_string().contains("Total cost: 4,326"));
	}

	#[test]
	fn test_ir_stat() {
		let v = Expression::<M31>::var;
		let root = Circuit {
			num_inputs: 2,
			instructions: vec![Instruction::InternalVariable {
				expr: &v(1) * &v(2),
			}],
			constraints: vec![&v(3) - &v(1)],
			outputs: vec![],
		};
		let mut rc = RootCircuit::default();
		rc.circuits.insert(0, root);
		let stat = IrStat::collect(&rc);
		assert_eq!(stat.num_circuits, 1);
		assert_eq!(stat.num_inputs, 2);
		assert_eq!(stat.num_instructions, 1);
		assert_eq!(stat.num_constraints, 1);
		assert_eq!(stat.num_wires, 4);
		assert_eq!(stat.num_terms, 3);
	}
}
