// Copyright 2025 Irreducible Inc.

use stratum_field::Field;

use crate::LayeredCircuitError;

/// Resolves custom gate types to their gate functions.
///
/// A custom gate computes a single field element from its inputs. The same evaluator is used
/// when solving the witness and when evaluating the layered circuit, so both agree on the
/// semantics of every gate type.
pub trait CustomGateEvaluator<F: Field> {
	/// Evaluates the gate function of `gate_type` on `inputs`.
	fn evaluate_custom_gate(&self, gate_type: u64, inputs: &[F]) -> Result<F, LayeredCircuitError>;
}

/// An evaluator that knows no custom gates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCustomGates;

impl<F: Field> CustomGateEvaluator<F> for NoCustomGates {
	fn evaluate_custom_gate(&self, gate_type: u64, _inputs: &[F]) -> Result<F, LayeredCircuitError> {
		Err(LayeredCircuitError::UnknownCustomGate { gate_type })
	}
}

impl<F: Field, T: CustomGateEvaluator<F> + ?Sized> CustomGateEvaluator<F> for &T {
	fn evaluate_custom_gate(&self, gate_type: u64, inputs: &[F]) -> Result<F, LayeredCircuitError> {
		(**self).evaluate_custom_gate(gate_type, inputs)
	}
}
