// Copyright 2025 Irreducible Inc.
//! The compilation pipeline from IR to layered circuit.

use stratum_core::LayeredCircuit;
use stratum_field::Field;

use crate::{
	error::Error,
	ir::RootCircuit,
	layering::layer_circuit,
	options::CompileOptions,
	stat::{CircuitStat, IrStat},
	witness::WitnessSolver,
};

/// Everything produced by [`compile`].
#[derive(Debug, Clone)]
pub struct CompileResult<F> {
	/// The compiled circuit.
	pub layered: LayeredCircuit<F>,
	/// The IR after adjustment for layering, which is what `layered` was compiled from.
	pub ir: RootCircuit<F>,
	/// Solves witnesses of `layered` from inputs of the root circuit.
	pub solver: WitnessSolver<F>,
}

/// Compiles `rc` into a layered circuit.
///
/// The IR is validated, rewritten into layering normal form, validated again and layered.
/// The layered circuit is then optimized unless [`CompileOptions::optimize_layered`] is off.
pub fn compile<F: Field>(rc: &RootCircuit<F>, opts: &CompileOptions) -> Result<CompileResult<F>, Error> {
	let _span = tracing::info_span!("compile", field = %F::ID).entered();

	rc.validate()?;
	tracing::debug!(stat = ?IrStat::collect(rc), "validated the IR");

	let ir = rc.adjust_for_layering();
	ir.validate_for_layering()?;
	tracing::debug!(stat = ?IrStat::collect(&ir), "adjusted the IR for layering");

	let (mut layered, input_order) = layer_circuit(&ir)?;
	if opts.optimize_layered {
		layered.optimize();
	}
	if opts.validate_layered {
		layered.validate()?;
	}
	tracing::debug!(stat = ?CircuitStat::collect(&layered), "layered the circuit");

	let solver = WitnessSolver::new(ir.clone(), input_order, opts.check_witness);
	Ok(CompileResult {
		layered,
		ir,
		solver,
	})
}

#[cfg(test)]
mod tests {
	use rand::{SeedableRng, rngs::StdRng};
	use stratum_core::NoCustomGates;
	use stratum_field::{Gf2, M31};

	use super::*;
	use crate::{CircuitBuilder, HintRegistry, IrLocation, ir::Instruction};

	#[test]
	fn test_compile_validates_the_ir() {
		let b = CircuitBuilder::<M31>::new();
		let x = b.add_input();
		b.assert_is_zero(x);
		let mut rc = b.build().unwrap();
		if let Some(root) = rc.circuits.get_mut(&0) {
			root.instructions.push(Instruction::SubCircuitCall {
				sub_circuit_id: 7,
				inputs: vec![],
				num_outputs: 0,
			});
		}
		let err = compile(&rc, &CompileOptions::default()).unwrap_err();
		assert!(matches!(
			err,
			Error::IrMalformed {
				location: IrLocation::Instruction(_),
				..
			}
		));
	}

	#[test]
	fn test_compiled_circuit_is_valid() {
		let b = CircuitBuilder::<Gf2>::new();
		let x = b.add_input();
		let y = b.add_input();
		let z = b.xor(x, y);
		b.assert_is_zero(z);
		let result = compile(&b.build().unwrap(), &CompileOptions::default()).unwrap();
		result.layered.validate().unwrap();
		result.ir.validate_for_layering().unwrap();
		assert_eq!(result.layered.expected_num_output_zeroes, 1);
		assert_eq!(result.solver.num_inputs(), 2);
	}

	#[test]
	fn test_optimized_circuit_agrees_with_the_plain_one() {
		let b = CircuitBuilder::<M31>::new();
		let x = (0..8).map(|_| b.add_input()).collect::<Vec<_>>();
		let total = b.add_input();
		let squares = x
			.iter()
			.map(|&v| b.memorized_call("square", &v, &(), |b, v| b.mul(v, v)))
			.collect::<Vec<_>>();
		let sum = squares.into_iter().reduce(|a, c| b.add(a, c)).unwrap();
		b.assert_is_equal(sum, total);
		let rc = b.build().unwrap();

		let plain = compile(&rc, &CompileOptions {
			optimize_layered: false,
			..CompileOptions::default()
		})
		.unwrap();
		let optimized = compile(&rc, &CompileOptions::default()).unwrap();
		assert_eq!(optimized.layered.input_len(), plain.layered.input_len());
		assert_eq!(optimized.layered.layers.len(), plain.layered.layers.len());
		// A single product is small enough to be inlined everywhere.
		assert!(optimized.layered.circuits.len() < plain.layered.circuits.len());

		let mut rng = StdRng::seed_from_u64(5);
		let mut inputs = (1..=8).map(M31::new).collect::<Vec<_>>();
		inputs.push(M31::new((1..=8).map(|v| v * v).sum()));
		for result in [&plain, &optimized] {
			let witness = result
				.solver
				.solve(&inputs, &[], &HintRegistry::new(), &mut rng)
				.unwrap();
			assert_eq!(result.layered.run(&witness, &mut rng, &NoCustomGates).unwrap(), vec![true]);
		}
		inputs[8] += M31::ONE;
		for result in [&plain, &optimized] {
			let witness = result
				.solver
				.solve_unchecked(&inputs, &[], &HintRegistry::new(), &mut rng)
				.unwrap();
			assert_eq!(result.layered.run(&witness, &mut rng, &NoCustomGates).unwrap(), vec![false]);
		}
	}
}
