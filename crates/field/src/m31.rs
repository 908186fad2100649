// Copyright 2025 Irreducible Inc.

use std::{
	fmt::{self, Display, Formatter},
	ops::{Add, Mul, Neg, Sub},
};

use num_bigint::BigUint;
use rand::RngCore;
use stratum_utils::{
	DeserializeBytes, SerializationError, SerializeBytes,
	bytes::{Buf, BufMut},
};

use crate::{Field, FieldId, field::impl_derived_ops};

/// The Mersenne prime `2^31 - 1`.
pub const M31_MODULUS: u32 = (1 << 31) - 1;

/// An element of the Mersenne-31 field, stored canonically in `[0, 2^31 - 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct M31(u32);

#[inline]
const fn reduce_u32(x: u32) -> u32 {
	let r = (x & M31_MODULUS) + (x >> 31);
	if r >= M31_MODULUS {
		r - M31_MODULUS
	} else {
		r
	}
}

#[inline]
const fn reduce_u64(x: u64) -> u32 {
	let p = M31_MODULUS as u64;
	let x = (x & p) + (x >> 31);
	let x = (x & p) + (x >> 31);
	let x = x as u32;
	if x >= M31_MODULUS {
		x - M31_MODULUS
	} else {
		x
	}
}

impl M31 {
	pub const fn new(value: u32) -> Self {
		Self(reduce_u32(value))
	}

	pub const fn val(self) -> u32 {
		self.0
	}
}

impl Display for M31 {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u32> for M31 {
	fn from(value: u32) -> Self {
		Self::new(value)
	}
}

impl Add for M31 {
	type Output = Self;

	#[inline]
	fn add(self, rhs: Self) -> Self {
		// Both operands are below 2^31, so the sum fits in a u32.
		Self(reduce_u32(self.0 + rhs.0))
	}
}

impl Sub for M31 {
	type Output = Self;

	#[inline]
	fn sub(self, rhs: Self) -> Self {
		Self(reduce_u32(self.0 + M31_MODULUS - rhs.0))
	}
}

impl Mul for M31 {
	type Output = Self;

	#[inline]
	fn mul(self, rhs: Self) -> Self {
		Self(reduce_u64(self.0 as u64 * rhs.0 as u64))
	}
}

impl Neg for M31 {
	type Output = Self;

	#[inline]
	fn neg(self) -> Self {
		if self.0 == 0 {
			self
		} else {
			Self(M31_MODULUS - self.0)
		}
	}
}

impl_derived_ops!(M31);

impl Field for M31 {
	const ID: FieldId = FieldId::M31;
	const ZERO: Self = Self(0);
	const ONE: Self = Self(1);
	const BYTE_LEN: usize = 4;

	fn modulus() -> BigUint {
		BigUint::from(M31_MODULUS)
	}

	fn invert(&self) -> Option<Self> {
		if self.0 == 0 {
			return None;
		}
		Some(self.pow(M31_MODULUS as u64 - 2))
	}

	fn from_u64(value: u64) -> Self {
		Self(reduce_u64(value))
	}

	fn from_biguint(value: &BigUint) -> Self {
		let reduced = value % BigUint::from(M31_MODULUS);
		Self(reduced.iter_u32_digits().next().unwrap_or(0))
	}

	fn to_biguint(&self) -> BigUint {
		BigUint::from(self.0)
	}

	fn random(mut rng: impl RngCore) -> Self {
		loop {
			let candidate = rng.next_u32() & M31_MODULUS;
			if candidate != M31_MODULUS {
				return Self(candidate);
			}
		}
	}
}

impl SerializeBytes for M31 {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(write_buf)
	}
}

impl DeserializeBytes for M31 {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let value = u32::deserialize(read_buf)?;
		if value >= M31_MODULUS {
			return Err(SerializationError::InvalidConstruction { name: "M31" });
		}
		Ok(Self(value))
	}
}
