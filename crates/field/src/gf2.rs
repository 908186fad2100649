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

/// The binary field with two elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gf2(u8);

impl Gf2 {
	pub const fn new(bit: bool) -> Self {
		Self(bit as u8)
	}

	pub const fn bit(self) -> bool {
		self.0 != 0
	}
}

impl Display for Gf2 {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<bool> for Gf2 {
	fn from(bit: bool) -> Self {
		Self::new(bit)
	}
}

impl Add for Gf2 {
	type Output = Self;

	#[inline]
	fn add(self, rhs: Self) -> Self {
		Self(self.0 ^ rhs.0)
	}
}

impl Sub for Gf2 {
	type Output = Self;

	#[inline]
	fn sub(self, rhs: Self) -> Self {
		Self(self.0 ^ rhs.0)
	}
}

impl Mul for Gf2 {
	type Output = Self;

	#[inline]
	fn mul(self, rhs: Self) -> Self {
		Self(self.0 & rhs.0)
	}
}

impl Neg for Gf2 {
	type Output = Self;

	#[inline]
	fn neg(self) -> Self {
		self
	}
}

impl_derived_ops!(Gf2);

impl Field for Gf2 {
	const ID: FieldId = FieldId::Gf2;
	const ZERO: Self = Self(0);
	const ONE: Self = Self(1);
	const BYTE_LEN: usize = 1;

	fn modulus() -> BigUint {
		BigUint::from(2u32)
	}

	fn invert(&self) -> Option<Self> {
		self.bit().then_some(*self)
	}

	fn from_u64(value: u64) -> Self {
		Self((value & 1) as u8)
	}

	fn from_biguint(value: &BigUint) -> Self {
		Self::new(value.bit(0))
	}

	fn to_biguint(&self) -> BigUint {
		BigUint::from(self.0)
	}

	fn random(mut rng: impl RngCore) -> Self {
		Self((rng.next_u32() & 1) as u8)
	}
}

impl SerializeBytes for Gf2 {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(write_buf)
	}
}

impl DeserializeBytes for Gf2 {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		match u8::deserialize(read_buf)? {
			0 => Ok(Self::ZERO),
			1 => Ok(Self::ONE),
			_ => Err(SerializationError::InvalidConstruction { name: "Gf2" }),
		}
	}
}
