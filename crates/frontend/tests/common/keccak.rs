// Copyright 2025 Irreducible Inc.
//! Bit-level Keccak-256 over GF(2).
//!
//! A lane is 64 variables holding its bits, least significant first. XOR is addition and AND
//! is multiplication, so the whole permutation is built from sums and products.

use std::array;

use stratum_field::{Field, Gf2};
use stratum_frontend::{CircuitBuilder, Variable};

/// Rate of Keccak-256 in bytes.
pub const RATE_BYTES: usize = 136;

// ι round constants
const RC: [u64; 24] = [
	0x0000_0000_0000_0001,
	0x0000_0000_0000_8082,
	0x8000_0000_0000_808A,
	0x8000_0000_8000_8000,
	0x0000_0000_0000_808B,
	0x0000_0000_8000_0001,
	0x8000_0000_8000_8081,
	0x8000_0000_0000_8009,
	0x0000_0000_0000_008A,
	0x0000_0000_0000_0088,
	0x0000_0000_8000_8009,
	0x0000_0000_8000_000A,
	0x0000_0000_8000_808B,
	0x8000_0000_0000_008B,
	0x8000_0000_0000_8089,
	0x8000_0000_0000_8003,
	0x8000_0000_0000_8002,
	0x8000_0000_0000_0080,
	0x0000_0000_0000_800A,
	0x8000_0000_8000_000A,
	0x8000_0000_8000_8081,
	0x8000_0000_0000_8080,
	0x0000_0000_8000_0001,
	0x8000_0000_8000_8008,
];

// ρ rotation offsets r[x,y] in lane order (i = x + 5*y)
#[rustfmt::skip]
const R: [usize; 25] = [
	 0,  1, 62, 28, 27,
	36, 44,  6, 55, 20,
	 3, 10, 43, 25, 39,
	41, 45, 15, 21,  8,
	18,  2, 61, 56, 14,
];

const fn idx(x: usize, y: usize) -> usize {
	x + 5 * y
}

type Lane = [Variable; 64];

fn xor(b: &CircuitBuilder<Gf2>, a: &Lane, c: &Lane) -> Lane {
	array::from_fn(|z| b.add(a[z], c[z]))
}

fn rotl(lane: &Lane, n: usize) -> Lane {
	array::from_fn(|z| lane[(z + 64 - n) % 64])
}

/// The Keccak-f\[1600\] permutation.
pub fn keccak_f1600(b: &CircuitBuilder<Gf2>, state: &mut [Lane; 25]) {
	for round in 0..24 {
		theta(b, state);
		rho_pi(state);
		chi(b, state);
		iota(b, state, round);
	}
}

fn theta(b: &CircuitBuilder<Gf2>, state: &mut [Lane; 25]) {
	let c: [Lane; 5] = array::from_fn(|x| {
		array::from_fn(|z| b.sum(&array::from_fn::<_, 5, _>(|y| state[idx(x, y)][z])))
	});
	// D[x] = C[x-1] ^ rotl1(C[x+1])
	let d: [Lane; 5] = array::from_fn(|x| xor(b, &c[(x + 4) % 5], &rotl(&c[(x + 1) % 5], 1)));
	for y in 0..5 {
		for x in 0..5 {
			state[idx(x, y)] = xor(b, &state[idx(x, y)], &d[x]);
		}
	}
}

fn rho_pi(state: &mut [Lane; 25]) {
	let mut temp = *state;
	for y in 0..5 {
		for x in 0..5 {
			temp[idx(y, (2 * x + 3 * y) % 5)] = rotl(&state[idx(x, y)], R[idx(x, y)]);
		}
	}
	*state = temp;
}

fn chi(b: &CircuitBuilder<Gf2>, state: &mut [Lane; 25]) {
	for y in 0..5 {
		let row: [Lane; 5] = array::from_fn(|x| state[idx(x, y)]);
		for x in 0..5 {
			// a ^ (!b & c) = a + c + b·c over GF(2)
			let (a1, a2) = (&row[(x + 1) % 5], &row[(x + 2) % 5]);
			state[idx(x, y)] = array::from_fn(|z| {
				let and = b.mul(a1[z], a2[z]);
				b.sum(&[row[x][z], a2[z], and])
			});
		}
	}
}

fn iota(b: &CircuitBuilder<Gf2>, state: &mut [Lane; 25], round: usize) {
	let one = b.constant(Gf2::ONE);
	for z in 0..64 {
		if RC[round] >> z & 1 == 1 {
			state[0][z] = b.add(state[0][z], one);
		}
	}
}

/// Keccak-256 of a message shorter than one block, given as little-endian bits per byte.
///
/// Returns the 256 digest bits in the same order.
pub fn keccak256(b: &CircuitBuilder<Gf2>, message: &[Variable]) -> Vec<Variable> {
	assert!(message.len() % 8 == 0 && message.len() / 8 < RATE_BYTES);
	let zero = b.constant(Gf2::ZERO);
	let one = b.constant(Gf2::ONE);
	let mut bits = vec![zero; 1600];
	bits[..message.len()].copy_from_slice(message);
	// pad10*1 with the 0x01 domain byte
	bits[message.len()] = one;
	bits[RATE_BYTES * 8 - 1] = one;

	let mut state: [Lane; 25] = array::from_fn(|i| array::from_fn(|z| bits[64 * i + z]));
	keccak_f1600(b, &mut state);
	state[..4].iter().flatten().copied().collect()
}

/// Little-endian bits of every byte.
pub fn to_bits(bytes: &[u8]) -> Vec<Gf2> {
	bytes
		.iter()
		.flat_map(|&byte| (0..8).map(move |i| Gf2::new(byte >> i & 1 == 1)))
		.collect()
}
