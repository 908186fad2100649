// Copyright 2025 Irreducible Inc.
use rand::{SeedableRng, rngs::StdRng};
use stratum_core::NoCustomGates;
use stratum_field::{Bn254, Field, M31};
use stratum_frontend::{
	CircuitBuilder, CompileOptions, CompileResult, Error, HintRegistry, Variable, compile,
	ir::RootCircuit,
};

fn compile_default<F: Field>(rc: &RootCircuit<F>) -> CompileResult<F> {
	compile(rc, &CompileOptions::default()).unwrap()
}

/// Solves with constraint checking, then evaluates the layered circuit on the witness.
fn check<F: Field>(result: &CompileResult<F>, inputs: &[F]) -> Result<bool, Error> {
	let mut rng = StdRng::seed_from_u64(42);
	let witness = result
		.solver
		.solve(inputs, &[], &HintRegistry::new(), &mut rng)?;
	Ok(result.layered.run(&witness, &mut rng, &NoCustomGates)?[0])
}

/// Whether the layered circuit accepts the witness solved without checking constraints.
fn layered_accepts<F: Field>(result: &CompileResult<F>, inputs: &[F]) -> bool {
	let mut rng = StdRng::seed_from_u64(43);
	let witness = result
		.solver
		.solve_unchecked(inputs, &[], &HintRegistry::new(), &mut rng)
		.unwrap();
	result
		.layered
		.run(&witness, &mut rng, &NoCustomGates)
		.unwrap()[0]
}

fn m31s(values: impl IntoIterator<Item = u32>) -> Vec<M31> {
	values.into_iter().map(M31::new).collect()
}

#[test]
fn test_bn254_equality() {
	let b = CircuitBuilder::<Bn254>::new();
	let x = b.add_input();
	let y = b.add_input();
	b.assert_is_equal(x, y);
	let result = compile_default(&b.build().unwrap());

	let a = Bn254::from_u64(123_456_789);
	assert!(check(&result, &[a, a]).unwrap());
	let other = a + Bn254::ONE;
	assert!(matches!(check(&result, &[a, other]), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&result, &[a, other]));
}

#[test]
fn test_m31_product() {
	let b = CircuitBuilder::<M31>::new();
	let x = b.add_input();
	let y = b.add_input();
	let z = b.add_input();
	let xy = b.mul(x, y);
	b.assert_is_equal(xy, z);
	let result = compile_default(&b.build().unwrap());

	assert!(check(&result, &m31s([3, 5, 15])).unwrap());
	// Products wrap around the modulus 2^31 - 1.
	let big = M31::new(1 << 30);
	assert!(check(&result, &[big, M31::new(2), M31::ONE]).unwrap());
	assert!(!layered_accepts(&result, &m31s([3, 5, 16])));
}

fn product_tree(b: &CircuitBuilder<M31>, mut values: Vec<Variable>) -> Variable {
	while values.len() > 1 {
		values = values
			.chunks(2)
			.map(|pair| match pair {
				[x, y] => b.mul(*x, *y),
				[x] => *x,
				_ => unreachable!(),
			})
			.collect();
	}
	values[0]
}

#[test]
fn test_set_equivalence() {
	const N: usize = 100;
	let b = CircuitBuilder::<M31>::new();
	let r = b.get_random_value();
	let left = (0..N).map(|_| b.add_input()).collect::<Vec<_>>();
	let right = (0..N).map(|_| b.add_input()).collect::<Vec<_>>();
	let shifted = |vars: &[Variable]| vars.iter().map(|&v| b.sub(r, v)).collect::<Vec<_>>();
	let lhs = product_tree(&b, shifted(&left));
	let rhs = product_tree(&b, shifted(&right));
	b.assert_is_equal(lhs, rhs);
	let result = compile_default(&b.build().unwrap());

	let values = (0..N as u32).map(|i| i * 7 + 3).collect::<Vec<_>>();
	let mut permuted = values.clone();
	permuted.rotate_left(37);
	permuted.swap(0, 50);
	let inputs = m31s(values.iter().chain(&permuted).copied());
	assert!(check(&result, &inputs).unwrap());

	let mut changed = permuted.clone();
	changed[10] = 1_000_000;
	let inputs = m31s(values.iter().chain(&changed).copied());
	assert!(matches!(check(&result, &inputs), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&result, &inputs));
}

fn full_adder(b: &CircuitBuilder<M31>, [x, y, carry_in]: [Variable; 3]) -> [Variable; 2] {
	let t = b.xor(x, y);
	let sum = b.xor(t, carry_in);
	let both = b.and(x, y);
	let propagated = b.and(t, carry_in);
	[sum, b.or(both, propagated)]
}

#[test]
fn test_four_bit_adder_is_memoized() {
	let b = CircuitBuilder::<M31>::new();
	let x = (0..4).map(|_| b.add_input()).collect::<Vec<_>>();
	let y = (0..4).map(|_| b.add_input()).collect::<Vec<_>>();
	let carry_in = b.add_input();
	let expected = (0..5).map(|_| b.add_input()).collect::<Vec<_>>();
	for &v in x.iter().chain(&y).chain([&carry_in]) {
		b.assert_is_bool(v);
	}

	let mut carry = carry_in;
	let mut sum = Vec::new();
	for i in 0..4 {
		let [s, c] = b.memorized_call("full_adder", &[x[i], y[i], carry], &(), full_adder);
		sum.push(s);
		carry = c;
	}
	sum.push(carry);
	for (&s, &e) in sum.iter().zip(&expected) {
		b.assert_is_equal(s, e);
	}
	let rc = b.build().unwrap();
	assert_eq!(rc.circuits.len(), 2);
	let result = compile_default(&rc);

	let bits = |value: u32, n: usize| (0..n).map(move |i| (value >> i) & 1);
	let assignments = (0..16u32)
		.flat_map(|x| (0..16u32).map(move |y| (x, y)))
		.map(|(x, y)| m31s(bits(x, 4).chain(bits(y, 4)).chain([0]).chain(bits(x + y, 5))))
		.collect::<Vec<_>>();
	let mut rng = StdRng::seed_from_u64(5);
	let witness = result
		.solver
		.solve_batch(
			assignments.iter().map(|a| (&a[..], &[][..])),
			&HintRegistry::new(),
			&mut rng,
		)
		.unwrap();
	assert_eq!(witness.num_witnesses, 256);
	let satisfied = result
		.layered
		.run(&witness, &mut rng, &NoCustomGates)
		.unwrap();
	assert!(satisfied.iter().all(|&ok| ok));

	// 9 + 9 with the carry in set is 19, not 18.
	let wrong = m31s(bits(9, 4).chain(bits(9, 4)).chain([1]).chain(bits(18, 5)));
	assert!(matches!(check(&result, &wrong), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&result, &wrong));
}

fn adder4(
	b: &CircuitBuilder<M31>,
	(x, y, carry_in): ([Variable; 4], [Variable; 4], Variable),
) -> Vec<Variable> {
	let mut carry = carry_in;
	let mut sum = Vec::with_capacity(5);
	for i in 0..4 {
		let [s, c] = b.memorized_call("full_adder", &[x[i], y[i], carry], &(), full_adder);
		sum.push(s);
		carry = c;
	}
	sum.push(carry);
	sum
}

#[test]
fn test_parallel_adders_share_compiled_layers() {
	const ADDERS: usize = 8;
	let b = CircuitBuilder::<M31>::new();
	let mut expected = Vec::new();
	for _ in 0..ADDERS {
		let x: [Variable; 4] = std::array::from_fn(|_| b.add_input());
		let y: [Variable; 4] = std::array::from_fn(|_| b.add_input());
		let carry_in = b.add_input();
		for &v in x.iter().chain(&y).chain([&carry_in]) {
			b.assert_is_bool(v);
		}
		let sum = b.memorized_call("adder4", &(x, y, carry_in), &(), adder4);
		for s in sum {
			let e = b.add_input();
			b.assert_is_equal(s, e);
			expected.push(e);
		}
	}
	let rc = b.build().unwrap();
	assert_eq!(rc.circuits.len(), 3);
	let plain = compile(&rc, &CompileOptions {
		optimize_layered: false,
		..CompileOptions::default()
	})
	.unwrap();
	let result = compile_default(&rc);
	assert!(result.layered.circuits.len() <= plain.layered.circuits.len());

	// Every root layer the adders straddle runs one compiled layer of the adder, placed once
	// per adder.
	let layered = &plain.layered;
	let mut depths = Vec::new();
	for &id in &layered.layers {
		match layered.circuits[id].sub_allocations.as_slice() {
			[] => {}
			[sub] => {
				assert_eq!(sub.allocations.len(), ADDERS);
				depths.push(sub.id);
			}
			subs => panic!("{} distinct children in one layer", subs.len()),
		}
	}
	assert!(depths.len() > 1);
	let mut distinct = depths.clone();
	distinct.sort_unstable();
	distinct.dedup();
	assert_eq!(distinct.len(), depths.len());
	// The first adder layer itself runs the first full adder.
	assert!(!layered.circuits[depths[0]].sub_allocations.is_empty());

	let bits = |value: u32, n: usize| (0..n).map(move |i| (value >> i) & 1);
	let operands = (0..ADDERS as u32).map(|i| (i * 5 % 16, (i * 11 + 3) % 16, i % 2));
	let mut values = Vec::new();
	for (x, y, c) in operands {
		values.extend(bits(x, 4).chain(bits(y, 4)).chain([c]).chain(bits(x + y + c, 5)));
	}
	assert!(check(&plain, &m31s(values.iter().copied())).unwrap());
	assert!(check(&result, &m31s(values.iter().copied())).unwrap());

	// The top bit of the third sum.
	let wrong = 2 * 14 + 13;
	values[wrong] ^= 1;
	let inputs = m31s(values.iter().copied());
	assert!(matches!(check(&result, &inputs), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&plain, &inputs));
	assert!(!layered_accepts(&result, &inputs));
}

/// `Σ num / den` of every fraction, as a single unreduced fraction.
fn sum_fractions(
	b: &CircuitBuilder<M31>,
	mut fractions: Vec<(Variable, Variable)>,
) -> (Variable, Variable) {
	while fractions.len() > 1 {
		fractions = fractions
			.chunks(2)
			.map(|pair| match pair {
				[(n1, d1), (n2, d2)] => {
					let lhs = b.mul(*n1, *d2);
					let rhs = b.mul(*n2, *d1);
					(b.add(lhs, rhs), b.mul(*d1, *d2))
				}
				[single] => *single,
				_ => unreachable!(),
			})
			.collect();
	}
	fractions[0]
}

#[test]
fn test_logup_lookup() {
	const ROWS: usize = 64;
	const QUERIES: usize = 64;
	let b = CircuitBuilder::<M31>::new();
	let keys = (0..ROWS).map(|_| b.add_input()).collect::<Vec<_>>();
	let values = (0..ROWS).map(|_| b.add_input()).collect::<Vec<_>>();
	let multiplicities = (0..ROWS).map(|_| b.add_input()).collect::<Vec<_>>();
	let query_keys = (0..QUERIES).map(|_| b.add_input()).collect::<Vec<_>>();
	let query_values = (0..QUERIES).map(|_| b.add_input()).collect::<Vec<_>>();
	let r = b.get_random_value();
	let alpha = b.get_random_value();
	let one = b.constant(M31::ONE);

	// Rows are folded into `key + alpha · value`, then Σ 1 / (r - q) = Σ m / (r - t).
	let fold = |key: Variable, value: Variable| {
		let scaled = b.mul(alpha, value);
		let row = b.add(key, scaled);
		b.sub(r, row)
	};
	let query_side = query_keys
		.iter()
		.zip(&query_values)
		.map(|(&k, &v)| (one, fold(k, v)))
		.collect();
	let table_side = keys
		.iter()
		.zip(&values)
		.zip(&multiplicities)
		.map(|((&k, &v), &m)| (m, fold(k, v)))
		.collect();
	let (qn, qd) = sum_fractions(&b, query_side);
	let (tn, td) = sum_fractions(&b, table_side);
	let lhs = b.mul(qn, td);
	let rhs = b.mul(tn, qd);
	b.assert_is_equal(lhs, rhs);
	let result = compile_default(&b.build().unwrap());

	let table_keys = (0..ROWS as u32).map(|i| 3 * i + 1).collect::<Vec<_>>();
	let table_values = (0..ROWS as u32).map(|i| i * i + 5).collect::<Vec<_>>();
	let query_rows = (0..QUERIES).map(|j| (j * 5 + j / 7) % ROWS).collect::<Vec<_>>();
	let mut counts = vec![0u32; ROWS];
	for &row in &query_rows {
		counts[row] += 1;
	}
	let looked_up_keys = query_rows.iter().map(|&row| table_keys[row]).collect::<Vec<_>>();
	let looked_up_values = query_rows.iter().map(|&row| table_values[row]).collect::<Vec<_>>();
	let assignment = |keys: &[u32], values: &[u32]| {
		m31s(
			table_keys
				.iter()
				.chain(&table_values)
				.chain(&counts)
				.chain(keys)
				.chain(values)
				.copied(),
		)
	};
	assert!(check(&result, &assignment(&looked_up_keys, &looked_up_values)).unwrap());

	// 2 is not a key, every key is 1 mod 3.
	let mut missing = looked_up_keys.clone();
	missing[17] = 2;
	let inputs = assignment(&missing, &looked_up_values);
	assert!(matches!(check(&result, &inputs), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&result, &inputs));

	// A present key paired with another row's value.
	let mut mismatched = looked_up_values.clone();
	mismatched[17] += 1;
	let inputs = assignment(&looked_up_keys, &mismatched);
	assert!(matches!(check(&result, &inputs), Err(Error::Unsatisfied { .. })));
	assert!(!layered_accepts(&result, &inputs));
}
