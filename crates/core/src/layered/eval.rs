// Copyright 2025 Irreducible Inc.
//! Evaluation of a layered circuit on concrete values.

use rand::RngCore;
use stratum_field::Field;

use super::{CompiledLayer, CustomGateEvaluator, LayeredCircuit};
use crate::{LayeredCircuitError, Witness};

struct EvalContext<'a, F, R, C> {
	public_inputs: &'a [F],
	rng: &'a mut R,
	custom: &'a C,
}

impl<F: Field> LayeredCircuit<F> {
	/// Applies every layer in order and returns the final output vector.
	///
	/// `inputs` must have exactly [`Self::input_len`] values. Random coefficients are drawn
	/// from `rng` every time a gate carrying one is applied.
	pub fn evaluate<R: RngCore, C: CustomGateEvaluator<F>>(
		&self,
		inputs: &[F],
		public_inputs: &[F],
		rng: &mut R,
		custom: &C,
	) -> Result<Vec<F>, LayeredCircuitError> {
		if inputs.len() != self.input_len() {
			return Err(LayeredCircuitError::InputLengthMismatch {
				expected: self.input_len(),
				actual: inputs.len(),
			});
		}
		let mut ctx = EvalContext {
			public_inputs,
			rng,
			custom,
		};
		let mut current = inputs.to_vec();
		for (depth, &id) in self.layers.iter().enumerate() {
			let layer = self
				.circuits
				.get(id)
				.ok_or(LayeredCircuitError::UnknownLayer(id))?;
			if layer.input_len != current.len() {
				return Err(LayeredCircuitError::AdjacentLengthMismatch {
					index: depth,
					expected: layer.input_len,
					actual: current.len(),
				});
			}
			let mut next = vec![F::ZERO; layer.output_len];
			self.apply_layer(layer, &current, &mut next, &mut ctx)?;
			tracing::trace!(depth, id, "applied layer");
			current = next;
		}
		Ok(current)
	}

	/// Whether an output vector satisfies the circuit.
	pub fn is_satisfied_by(&self, outputs: &[F]) -> bool {
		outputs.len() >= self.expected_num_output_zeroes
			&& outputs[..self.expected_num_output_zeroes]
				.iter()
				.all(|value| value.is_zero())
	}

	/// Evaluates the circuit on every assignment held by `witness`.
	///
	/// Returns one satisfaction flag per assignment.
	pub fn run<R: RngCore, C: CustomGateEvaluator<F>>(
		&self,
		witness: &Witness<F>,
		rng: &mut R,
		custom: &C,
	) -> Result<Vec<bool>, LayeredCircuitError> {
		if witness.num_inputs_per_witness != self.input_len() {
			return Err(LayeredCircuitError::InputLengthMismatch {
				expected: self.input_len(),
				actual: witness.num_inputs_per_witness,
			});
		}
		witness
			.iter()
			.map(|(inputs, public_inputs)| {
				let outputs = self.evaluate(inputs, public_inputs, &mut *rng, custom)?;
				Ok(self.is_satisfied_by(&outputs))
			})
			.collect()
	}

	fn apply_layer<R: RngCore, C: CustomGateEvaluator<F>>(
		&self,
		layer: &CompiledLayer<F>,
		input: &[F],
		output: &mut [F],
		ctx: &mut EvalContext<'_, F, R, C>,
	) -> Result<(), LayeredCircuitError> {
		for g in &layer.muls {
			let coef = g.coef.sample(&mut *ctx.rng, ctx.public_inputs)?;
			output[g.output] += input[g.inputs[0]] * input[g.inputs[1]] * coef;
		}
		for g in &layer.adds {
			let coef = g.coef.sample(&mut *ctx.rng, ctx.public_inputs)?;
			output[g.output] += input[g.inputs[0]] * coef;
		}
		for g in &layer.csts {
			output[g.output] += g.coef.sample(&mut *ctx.rng, ctx.public_inputs)?;
		}
		for g in &layer.customs {
			let args = g.inputs.iter().map(|&i| input[i]).collect::<Vec<_>>();
			let value = ctx.custom.evaluate_custom_gate(g.gate_type, &args)?;
			let coef = g.coef.sample(&mut *ctx.rng, ctx.public_inputs)?;
			output[g.output] += value * coef;
		}
		for sub in &layer.sub_allocations {
			let child = self
				.circuits
				.get(sub.id)
				.ok_or(LayeredCircuitError::UnknownLayer(sub.id))?;
			for a in &sub.allocations {
				self.apply_layer(
					child,
					&input[a.input_offset..a.input_offset + child.input_len],
					&mut output[a.output_offset..a.output_offset + child.output_len],
					ctx,
				)?;
			}
		}
		Ok(())
	}
}
