// Copyright 2025 Irreducible Inc.
//! The layered circuit: a sequence of homogeneous arithmetic layers connecting power-of-two
//! value vectors.
//!
//! A [`LayeredCircuit`] owns a table of [`CompiledLayer`]s. Every compiled layer maps an input
//! vector of `input_len` values to an output vector of `output_len` values through its own gates
//! plus any number of earlier compiled layers embedded at aligned offsets. The `layers` list picks
//! the compiled layer applied at each depth, starting from the circuit inputs.

use std::fmt::{self, Display, Formatter};

use rand::RngCore;
use stratum_field::Field;

use crate::LayeredCircuitError;

mod custom;
mod eval;
mod optimize;
mod serialization;
mod validate;

pub use custom::{CustomGateEvaluator, NoCustomGates};
pub use optimize::INLINE_GATE_LIMIT;
pub use serialization::LAYERED_CIRCUIT_MAGIC;
pub use validate::SlotMasks;

/// Multiplier of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coef<F> {
	/// A fixed field element.
	Constant(F),
	/// A verifier challenge, sampled afresh every time the gate is applied.
	Random,
	/// The public input with the given index.
	PublicInput(usize),
}

impl<F: Field> Coef<F> {
	/// Resolves the coefficient to a concrete value.
	pub fn sample(
		&self,
		rng: &mut impl RngCore,
		public_inputs: &[F],
	) -> Result<F, LayeredCircuitError> {
		match self {
			Coef::Constant(value) => Ok(*value),
			Coef::Random => Ok(F::random(rng)),
			Coef::PublicInput(index) => {
				public_inputs
					.get(*index)
					.copied()
					.ok_or(LayeredCircuitError::PublicInputOutOfRange {
						index: *index,
						num_public_inputs: public_inputs.len(),
					})
			}
		}
	}

	/// Returns the constant value, if this is a constant coefficient.
	pub fn as_constant(&self) -> Option<F> {
		match self {
			Coef::Constant(value) => Some(*value),
			_ => None,
		}
	}
}

impl<F: Display> Display for Coef<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Coef::Constant(value) => write!(f, "{value}"),
			Coef::Random => f.write_str("Random"),
			Coef::PublicInput(index) => write!(f, "PublicInput({index})"),
		}
	}
}

/// A gate with a fixed number of inputs: `out += coef * in[0] * ... * in[N-1]`.
///
/// With zero inputs the gate adds its coefficient to the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gate<F, const N: usize> {
	/// Indices into the layer's input vector.
	pub inputs: [usize; N],
	/// Index into the layer's output vector.
	pub output: usize,
	#[allow(missing_docs)]
	pub coef: Coef<F>,
}

/// `out += coef * in0 * in1`.
pub type GateMul<F> = Gate<F, 2>;
/// `out += coef * in`.
pub type GateAdd<F> = Gate<F, 1>;
/// `out += coef`.
pub type GateCst<F> = Gate<F, 0>;

/// `out += coef * g(inputs)` for a gate function `g` resolved by its type id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateCustom<F> {
	#[allow(missing_docs)]
	pub gate_type: u64,
	#[allow(missing_docs)]
	pub inputs: Vec<usize>,
	#[allow(missing_docs)]
	pub output: usize,
	#[allow(missing_docs)]
	pub coef: Coef<F>,
}

/// Placement of a child layer inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Allocation {
	/// Offset of the child's input window in the parent's input vector.
	pub input_offset: usize,
	/// Offset of the child's output window in the parent's output vector.
	pub output_offset: usize,
}

/// All placements of one child layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubAllocation {
	/// Id of the child compiled layer. Always smaller than the parent's id.
	pub id: usize,
	#[allow(missing_docs)]
	pub allocations: Vec<Allocation>,
}

/// One arithmetic layer, possibly composed of earlier compiled layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledLayer<F> {
	#[allow(missing_docs)]
	pub input_len: usize,
	#[allow(missing_docs)]
	pub output_len: usize,
	#[allow(missing_docs)]
	pub sub_allocations: Vec<SubAllocation>,
	#[allow(missing_docs)]
	pub muls: Vec<GateMul<F>>,
	#[allow(missing_docs)]
	pub adds: Vec<GateAdd<F>>,
	#[allow(missing_docs)]
	pub csts: Vec<GateCst<F>>,
	#[allow(missing_docs)]
	pub customs: Vec<GateCustom<F>>,
}

impl<F> CompiledLayer<F> {
	/// An empty layer with the given shape.
	pub fn new(input_len: usize, output_len: usize) -> Self {
		Self {
			input_len,
			output_len,
			sub_allocations: Vec::new(),
			muls: Vec::new(),
			adds: Vec::new(),
			csts: Vec::new(),
			customs: Vec::new(),
		}
	}

	/// Number of gates owned directly by this layer, children excluded.
	pub fn num_own_gates(&self) -> usize {
		self.muls.len() + self.adds.len() + self.csts.len() + self.customs.len()
	}
}

/// A compiled circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredCircuit<F> {
	#[allow(missing_docs)]
	pub num_public_inputs: usize,
	/// Number of meaningful output slots.
	pub num_actual_outputs: usize,
	/// The circuit is satisfied iff this many leading output slots are zero.
	pub expected_num_output_zeroes: usize,
	/// Compiled layers; children always precede their parents.
	pub circuits: Vec<CompiledLayer<F>>,
	/// Compiled layer id applied at each depth, from the input layer upwards.
	pub layers: Vec<usize>,
}

impl<F> LayeredCircuit<F> {
	/// Length of the input vector, i.e. the input length of the first layer.
	pub fn input_len(&self) -> usize {
		self.layers
			.first()
			.map_or(0, |&id| self.circuits[id].input_len)
	}

	/// Length of the final output vector.
	pub fn output_len(&self) -> usize {
		self.layers
			.last()
			.map_or(0, |&id| self.circuits[id].output_len)
	}

	/// Number of layers, not counting the input layer.
	pub fn depth(&self) -> usize {
		self.layers.len()
	}
}

impl<F: Display> Display for CompiledLayer<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		writeln!(f, "input={} output={}", self.input_len, self.output_len)?;
		for sub in &self.sub_allocations {
			writeln!(f, "apply circuit {} at:", sub.id)?;
			for a in &sub.allocations {
				writeln!(f, "    input_offset={} output_offset={}", a.input_offset, a.output_offset)?;
			}
		}
		for g in &self.muls {
			writeln!(f, "out{} += in{} * in{} * {}", g.output, g.inputs[0], g.inputs[1], g.coef)?;
		}
		for g in &self.adds {
			writeln!(f, "out{} += in{} * {}", g.output, g.inputs[0], g.coef)?;
		}
		for g in &self.csts {
			writeln!(f, "out{} += {}", g.output, g.coef)?;
		}
		for g in &self.customs {
			writeln!(f, "out{} += custom{}{:?} * {}", g.output, g.gate_type, g.inputs, g.coef)?;
		}
		Ok(())
	}
}

impl<F: Display> Display for LayeredCircuit<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for (i, circuit) in self.circuits.iter().enumerate() {
			write!(f, "Circuit {i}: {circuit}")?;
			writeln!(f, "================================")?;
		}
		writeln!(f, "Layers: {:?}", self.layers)
	}
}
