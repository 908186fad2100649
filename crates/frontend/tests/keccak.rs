// Copyright 2025 Irreducible Inc.
#[path = "common/keccak.rs"]
mod keccak;

use keccak::{keccak256, to_bits};
use rand::{SeedableRng, rngs::StdRng};
use sha3::{Digest, Keccak256};
use stratum_core::NoCustomGates;
use stratum_field::{Field, Gf2};
use stratum_frontend::{CircuitBuilder, CompileOptions, Error, HintRegistry, compile};

#[test]
fn test_keccak256_matches_reference() {
	let message = (0..64u8).map(|i| i.wrapping_mul(37) ^ 0x5a).collect::<Vec<_>>();
	let digest = Keccak256::digest(&message);

	let b = CircuitBuilder::<Gf2>::new();
	let message_bits = (0..message.len() * 8).map(|_| b.add_input()).collect::<Vec<_>>();
	let digest_bits = (0..256).map(|_| b.add_input()).collect::<Vec<_>>();
	let out = keccak256(&b, &message_bits);
	for (&computed, &expected) in out.iter().zip(&digest_bits) {
		b.assert_is_equal(computed, expected);
	}
	let result = compile(&b.build().unwrap(), &CompileOptions::default()).unwrap();

	let mut inputs = to_bits(&message);
	inputs.extend(to_bits(&digest));
	let mut rng = StdRng::seed_from_u64(0);
	let hints = HintRegistry::new();
	let witness = result.solver.solve(&inputs, &[], &hints, &mut rng).unwrap();
	assert!(result.layered.run(&witness, &mut rng, &NoCustomGates).unwrap()[0]);

	// Flip one digest bit.
	let last = inputs.len() - 1;
	inputs[last] += Gf2::ONE;
	assert!(matches!(
		result.solver.solve(&inputs, &[], &hints, &mut rng),
		Err(Error::Unsatisfied { .. })
	));

	// Random coefficients over GF(2) are 0 or 1, so every evaluation misses the mismatch with
	// probability 1/2. Some of 32 evaluations must catch it.
	let witness = result
		.solver
		.solve_unchecked(&inputs, &[], &hints, &mut rng)
		.unwrap();
	let rejections = (0..32)
		.filter(|_| !result.layered.run(&witness, &mut rng, &NoCustomGates).unwrap()[0])
		.count();
	assert!(rejections > 0);
}
