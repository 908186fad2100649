// Copyright 2025 Irreducible Inc.
//! Witness solving: runs the IR on an input assignment and lays out the results as the
//! layer-0 vector of the compiled circuit.

use rand::RngCore;
use stratum_core::{CustomGateEvaluator, Witness};
use stratum_field::Field;

use crate::{
	error::Error,
	hints::HintRegistry,
	ir::{Expression, Instruction, RootCircuit},
	layering::{HintSlots, InputOrder},
};

/// Computes layered-circuit witnesses from root circuit inputs.
///
/// The solver evaluates the IR the layered circuit was compiled from, calling hints as it
/// goes, and scatters the root inputs and every hint output into their layer-0 slots.
#[derive(Debug, Clone)]
pub struct WitnessSolver<F> {
	rc: RootCircuit<F>,
	input_order: InputOrder,
	check: bool,
}

impl<F: Field> WitnessSolver<F> {
	/// `rc` must be the circuit `input_order` was recorded for.
	pub fn new(rc: RootCircuit<F>, input_order: InputOrder, check: bool) -> Self {
		Self {
			rc,
			input_order,
			check,
		}
	}

	/// Where the solved values go in the layer-0 vector.
	pub fn input_order(&self) -> &InputOrder {
		&self.input_order
	}

	/// Number of inputs of the root circuit.
	pub fn num_inputs(&self) -> usize {
		self.rc.num_inputs()
	}

	/// Number of public inputs every assignment must carry.
	pub fn num_public_inputs(&self) -> usize {
		self.rc.num_public_inputs
	}

	/// Solves a single witness, checking every constraint when the solver was built to.
	pub fn solve(
		&self,
		inputs: &[F],
		public_inputs: &[F],
		hints: &HintRegistry,
		rng: &mut impl RngCore,
	) -> Result<Witness<F>, Error> {
		let layer0 = self.layer_zero(inputs, public_inputs, hints, rng, self.check)?;
		Ok(Witness::single(layer0, public_inputs))
	}

	/// Like [`Self::solve`] but never checks constraints.
	pub fn solve_unchecked(
		&self,
		inputs: &[F],
		public_inputs: &[F],
		hints: &HintRegistry,
		rng: &mut impl RngCore,
	) -> Result<Witness<F>, Error> {
		let layer0 = self.layer_zero(inputs, public_inputs, hints, rng, false)?;
		Ok(Witness::single(layer0, public_inputs))
	}

	/// Solves one witness per `(inputs, public_inputs)` assignment into a single batch.
	pub fn solve_batch<'a>(
		&self,
		assignments: impl IntoIterator<Item = (&'a [F], &'a [F])>,
		hints: &HintRegistry,
		rng: &mut impl RngCore,
	) -> Result<Witness<F>, Error> {
		let mut values = Vec::new();
		for (inputs, public_inputs) in assignments {
			values.extend(self.layer_zero(inputs, public_inputs, hints, rng, self.check)?);
			values.extend_from_slice(public_inputs);
		}
		Ok(Witness::new(
			self.input_order.input_len,
			self.rc.num_public_inputs,
			values,
		)?)
	}

	fn layer_zero(
		&self,
		inputs: &[F],
		public_inputs: &[F],
		hints: &HintRegistry,
		rng: &mut impl RngCore,
		check: bool,
	) -> Result<Vec<F>, Error> {
		check_count("inputs", self.rc.num_inputs(), inputs.len())?;
		check_count("public inputs", self.rc.num_public_inputs, public_inputs.len())?;

		let mut run = Run {
			rc: &self.rc,
			hints,
			public_inputs,
			rng,
			check,
			layer0: vec![F::ZERO; self.input_order.input_len],
		};
		for (&slot, &value) in self.input_order.inputs.iter().zip(inputs) {
			run.layer0[slot] = value;
		}
		run.circuit(RootCircuit::<F>::ROOT_ID, inputs, &self.input_order.hints)?;
		Ok(run.layer0)
	}
}

fn check_count(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
	if expected != actual {
		return Err(Error::InputCount {
			what,
			expected,
			actual,
		});
	}
	Ok(())
}

struct Run<'a, F, R> {
	rc: &'a RootCircuit<F>,
	hints: &'a HintRegistry,
	public_inputs: &'a [F],
	rng: &'a mut R,
	check: bool,
	layer0: Vec<F>,
}

impl<F: Field, R: RngCore> Run<'_, F, R> {
	/// Evaluates circuit `circuit_id` on `inputs` and returns its outputs.
	fn circuit(&mut self, circuit_id: usize, inputs: &[F], order: &[HintSlots]) -> Result<Vec<F>, Error> {
		let rc = self.rc;
		let circuit = rc.circuits.get(&circuit_id).ok_or_else(|| {
			Error::malformed(circuit_id, crate::IrLocation::Circuit, "unknown circuit")
		})?;
		let mut values = Vec::with_capacity(circuit.num_wires());
		values.push(F::ONE);
		values.extend_from_slice(inputs);

		let eval = |values: &[F], exprs: &[Expression<F>]| {
			exprs.iter().map(|e| e.evaluate(values)).collect::<Vec<_>>()
		};
		let mut order = order.iter();
		for (insn, instruction) in circuit.instructions.iter().enumerate() {
			match instruction {
				Instruction::InternalVariable { expr } => {
					let value = expr.evaluate(&values);
					values.push(value);
				}
				Instruction::Hint {
					hint_id,
					inputs,
					num_outputs,
				} => {
					let outputs = self.hints.call(*hint_id, &eval(&values, inputs), *num_outputs)?;
					let Some(HintSlots::Hint { insn: at, slots }) = order.next() else {
						return Err(missing_slots(circuit_id, insn));
					};
					if *at != insn || slots.len() != outputs.len() {
						return Err(missing_slots(circuit_id, insn));
					}
					for (&slot, &value) in slots.iter().zip(&outputs) {
						self.layer0[slot] = value;
					}
					values.extend(outputs);
				}
				Instruction::SubCircuitCall {
					sub_circuit_id,
					inputs,
					..
				} => {
					let Some(HintSlots::Call { insn: at, inner }) = order.next() else {
						return Err(missing_slots(circuit_id, insn));
					};
					if *at != insn {
						return Err(missing_slots(circuit_id, insn));
					}
					let outputs = self.circuit(*sub_circuit_id, &eval(&values, inputs), inner)?;
					values.extend(outputs);
				}
				Instruction::GetRandom => values.push(F::random(&mut *self.rng)),
				Instruction::PublicInput { index } => {
					let value = self.public_inputs.get(*index).copied().ok_or(Error::InputCount {
						what: "public inputs",
						expected: index + 1,
						actual: self.public_inputs.len(),
					})?;
					values.push(value);
				}
				Instruction::CustomGate { gate_type, inputs } => {
					let value = CustomGateEvaluator::<F>::evaluate_custom_gate(
						self.hints,
						*gate_type,
						&eval(&values, inputs),
					)?;
					values.push(value);
				}
			}
		}

		if self.check {
			if let Some(constraint_index) = circuit
				.constraints
				.iter()
				.position(|c| !c.evaluate(&values).is_zero())
			{
				tracing::debug!(circuit_id, constraint_index, "constraint not satisfied");
				return Err(Error::Unsatisfied {
					circuit_id,
					constraint_index,
				});
			}
		}
		Ok(eval(&values, &circuit.outputs))
	}
}

fn missing_slots(circuit_id: usize, insn: usize) -> Error {
	Error::inconsistent(circuit_id, 0, format!("no layer-0 slots recorded for instruction #{insn}"))
}
