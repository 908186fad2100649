// Copyright 2025 Irreducible Inc.
use rustc_hash::FxHashSet;
use stratum_field::Field;

use super::{Circuit, Expression, Instruction, RootCircuit};

impl<F: Field> RootCircuit<F> {
	/// Rewrites every circuit into the normal form expected by the layering compiler.
	///
	/// Constraints, custom gate inputs, sub-circuit inputs and outputs that are not a single
	/// wire are moved into a fresh [`Instruction::InternalVariable`]; so are repeated wires
	/// among the inputs of one sub-circuit call and among the outputs. Constraints may repeat.
	/// Wire ids are renumbered so every instruction still allocates the next block of ids.
	pub fn adjust_for_layering(&self) -> Self {
		Self {
			num_public_inputs: self.num_public_inputs,
			expected_num_output_zeroes: self.expected_num_output_zeroes,
			circuits: self
				.circuits
				.iter()
				.map(|(&id, circuit)| (id, Rewriter::new(circuit.num_inputs).rewrite(circuit)))
				.collect(),
		}
	}
}

struct Rewriter<F> {
	out: Circuit<F>,
	/// Old wire id to new wire id.
	map: Vec<usize>,
	next: usize,
}

impl<F: Field> Rewriter<F> {
	fn new(num_inputs: usize) -> Self {
		Self {
			out: Circuit {
				num_inputs,
				..Circuit::default()
			},
			map: (0..=num_inputs).collect(),
			next: num_inputs + 1,
		}
	}

	fn rewrite(mut self, circuit: &Circuit<F>) -> Circuit<F> {
		for insn in &circuit.instructions {
			let insn = match insn {
				Instruction::InternalVariable { expr } => Instruction::InternalVariable {
					expr: self.rename(expr),
				},
				Instruction::Hint {
					hint_id,
					inputs,
					num_outputs,
				} => Instruction::Hint {
					hint_id: *hint_id,
					inputs: inputs.iter().map(|e| self.rename(e)).collect(),
					num_outputs: *num_outputs,
				},
				Instruction::SubCircuitCall {
					sub_circuit_id,
					inputs,
					num_outputs,
				} => Instruction::SubCircuitCall {
					sub_circuit_id: *sub_circuit_id,
					inputs: self.single_wires(inputs, true),
					num_outputs: *num_outputs,
				},
				Instruction::CustomGate { gate_type, inputs } => Instruction::CustomGate {
					gate_type: *gate_type,
					inputs: self.single_wires(inputs, false),
				},
				Instruction::GetRandom => Instruction::GetRandom,
				Instruction::PublicInput { index } => Instruction::PublicInput { index: *index },
			};
			let num_outputs = insn.num_outputs();
			self.out.instructions.push(insn);
			self.map.extend(self.next..self.next + num_outputs);
			self.next += num_outputs;
		}
		self.out.constraints = self.single_wires(&circuit.constraints, false);
		self.out.outputs = self.single_wires(&circuit.outputs, true);
		self.out
	}

	fn rename(&self, expr: &Expression<F>) -> Expression<F> {
		expr.map_vars(|v| self.map[v])
	}

	/// Renames `exprs`, moving every one that is not a single (and, if `distinct`, not yet
	/// seen) wire into a new internal variable.
	fn single_wires(&mut self, exprs: &[Expression<F>], distinct: bool) -> Vec<Expression<F>> {
		let mut seen = FxHashSet::default();
		exprs
			.iter()
			.map(|e| {
				let e = self.rename(e);
				match e.as_single_var() {
					Some(vid) if !distinct || seen.insert(vid) => e,
					_ => {
						let vid = self.hoist(e);
						seen.insert(vid);
						Expression::var(vid)
					}
				}
			})
			.collect()
	}

	fn hoist(&mut self, expr: Expression<F>) -> usize {
		self.out
			.instructions
			.push(Instruction::InternalVariable { expr });
		self.next += 1;
		self.next - 1
	}
}
