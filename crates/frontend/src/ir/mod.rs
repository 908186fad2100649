// Copyright 2025 Irreducible Inc.
//! The intermediate representation produced by the builder and consumed by the layering
//! compiler and the witness solver.
//!
//! A [`RootCircuit`] is a map of [`Circuit`]s keyed by id, with id 0 as the entry point.
//! Inside a circuit wire 0 is the constant one, wires `1..=num_inputs` are the inputs and
//! every [`Instruction`] allocates its outputs as the next contiguous block of wire ids.

use std::collections::BTreeMap;

use stratum_field::Field;

mod adjust;
pub mod expr;
mod serialization;
mod validate;

pub use expr::{Expression, Term};

/// A single IR instruction. Its outputs are implied by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<F> {
	/// One output wire equal to `expr`.
	InternalVariable { expr: Expression<F> },
	/// Outputs computed off-circuit by the hint `hint_id`. They become layer-0 inputs of the
	/// layered circuit.
	Hint {
		hint_id: u64,
		inputs: Vec<Expression<F>>,
		num_outputs: usize,
	},
	/// Invokes another circuit of the same root.
	SubCircuitCall {
		sub_circuit_id: usize,
		inputs: Vec<Expression<F>>,
		num_outputs: usize,
	},
	/// One output wire holding a fresh random value per evaluation.
	GetRandom,
	/// One output wire holding the public input `index`.
	PublicInput { index: usize },
	/// One output wire computed by the custom gate `gate_type`.
	CustomGate {
		gate_type: u64,
		inputs: Vec<Expression<F>>,
	},
}

impl<F> Instruction<F> {
	pub fn num_outputs(&self) -> usize {
		match self {
			Instruction::Hint { num_outputs, .. }
			| Instruction::SubCircuitCall { num_outputs, .. } => *num_outputs,
			Instruction::InternalVariable { .. }
			| Instruction::GetRandom
			| Instruction::PublicInput { .. }
			| Instruction::CustomGate { .. } => 1,
		}
	}

	/// Every expression the instruction reads.
	pub fn inputs(&self) -> &[Expression<F>] {
		match self {
			Instruction::InternalVariable { expr } => std::slice::from_ref(expr),
			Instruction::Hint { inputs, .. }
			| Instruction::SubCircuitCall { inputs, .. }
			| Instruction::CustomGate { inputs, .. } => inputs,
			Instruction::GetRandom | Instruction::PublicInput { .. } => &[],
		}
	}
}

impl<F: Clone> Instruction<F> {
	/// The same instruction with every input expression passed through `f`.
	pub fn map_inputs(&self, mut f: impl FnMut(&Expression<F>) -> Expression<F>) -> Self {
		match self {
			Instruction::InternalVariable { expr } => Instruction::InternalVariable { expr: f(expr) },
			Instruction::Hint {
				hint_id,
				inputs,
				num_outputs,
			} => Instruction::Hint {
				hint_id: *hint_id,
				inputs: inputs.iter().map(&mut f).collect(),
				num_outputs: *num_outputs,
			},
			Instruction::SubCircuitCall {
				sub_circuit_id,
				inputs,
				num_outputs,
			} => Instruction::SubCircuitCall {
				sub_circuit_id: *sub_circuit_id,
				inputs: inputs.iter().map(&mut f).collect(),
				num_outputs: *num_outputs,
			},
			Instruction::CustomGate { gate_type, inputs } => Instruction::CustomGate {
				gate_type: *gate_type,
				inputs: inputs.iter().map(&mut f).collect(),
			},
			Instruction::GetRandom => Instruction::GetRandom,
			Instruction::PublicInput { index } => Instruction::PublicInput { index: *index },
		}
	}
}

/// A circuit: instructions, zero-asserted constraints and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit<F> {
	pub num_inputs: usize,
	pub instructions: Vec<Instruction<F>>,
	/// Expressions that must evaluate to zero.
	pub constraints: Vec<Expression<F>>,
	/// Values returned to the caller. Empty for the root circuit.
	pub outputs: Vec<Expression<F>>,
}

impl<F> Default for Circuit<F> {
	fn default() -> Self {
		Self {
			num_inputs: 0,
			instructions: Vec::new(),
			constraints: Vec::new(),
			outputs: Vec::new(),
		}
	}
}

impl<F> Circuit<F> {
	/// Number of wire ids in use, counting the constant wire 0.
	pub fn num_wires(&self) -> usize {
		1 + self.num_inputs
			+ self
				.instructions
				.iter()
				.map(Instruction::num_outputs)
				.sum::<usize>()
	}

	/// Every instruction together with the id of its first output wire.
	pub fn instructions_with_outputs(&self) -> impl Iterator<Item = (usize, &Instruction<F>)> {
		self.instructions
			.iter()
			.scan(1 + self.num_inputs, |next, insn| {
				let first = *next;
				*next += insn.num_outputs();
				Some((first, insn))
			})
	}

	/// Ids of the circuits this one calls, in instruction order, with repetition.
	pub fn callees(&self) -> impl Iterator<Item = usize> + '_ {
		self.instructions.iter().filter_map(|insn| match insn {
			Instruction::SubCircuitCall { sub_circuit_id, .. } => Some(*sub_circuit_id),
			_ => None,
		})
	}
}

/// The complete IR of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCircuit<F> {
	/// Number of public inputs the program reads through [`Instruction::PublicInput`].
	pub num_public_inputs: usize,
	/// Number of leading zero outputs the program expects of its compiled form.
	pub expected_num_output_zeroes: usize,
	pub circuits: BTreeMap<usize, Circuit<F>>,
}

impl<F> Default for RootCircuit<F> {
	fn default() -> Self {
		Self {
			num_public_inputs: 0,
			expected_num_output_zeroes: 0,
			circuits: BTreeMap::new(),
		}
	}
}

impl<F: Field> RootCircuit<F> {
	/// Id of the entry circuit.
	pub const ROOT_ID: usize = 0;

	pub fn root(&self) -> Option<&Circuit<F>> {
		self.circuits.get(&Self::ROOT_ID)
	}

	/// Number of inputs of the entry circuit.
	pub fn num_inputs(&self) -> usize {
		self.root().map_or(0, |c| c.num_inputs)
	}
}
