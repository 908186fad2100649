// Copyright 2025 Irreducible Inc.

use std::{
	fmt::{self, Display, Formatter},
	ops::{Add, Mul, Neg, Sub},
};

use ark_bn254::Fr;
use ark_ff::{AdditiveGroup, BigInteger, Field as ArkField, PrimeField};
use num_bigint::BigUint;
use rand::RngCore;
use stratum_utils::{
	DeserializeBytes, SerializationError, SerializeBytes,
	bytes::{Buf, BufMut},
	serialization::assert_enough_space_for,
};

use crate::{Field, FieldId, field::impl_derived_ops};

/// The scalar field of the BN254 curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bn254(Fr);

impl Bn254 {
	pub fn new(inner: Fr) -> Self {
		Self(inner)
	}

	pub fn inner(&self) -> Fr {
		self.0
	}

	fn to_bytes_le(self) -> [u8; 32] {
		let mut out = [0u8; 32];
		let bytes = self.0.into_bigint().to_bytes_le();
		out[..bytes.len()].copy_from_slice(&bytes);
		out
	}
}

impl Display for Bn254 {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_biguint())
	}
}

impl From<Fr> for Bn254 {
	fn from(inner: Fr) -> Self {
		Self(inner)
	}
}

impl Add for Bn254 {
	type Output = Self;

	#[inline]
	fn add(self, rhs: Self) -> Self {
		Self(self.0 + rhs.0)
	}
}

impl Sub for Bn254 {
	type Output = Self;

	#[inline]
	fn sub(self, rhs: Self) -> Self {
		Self(self.0 - rhs.0)
	}
}

impl Mul for Bn254 {
	type Output = Self;

	#[inline]
	fn mul(self, rhs: Self) -> Self {
		Self(self.0 * rhs.0)
	}
}

impl Neg for Bn254 {
	type Output = Self;

	#[inline]
	fn neg(self) -> Self {
		Self(-self.0)
	}
}

impl_derived_ops!(Bn254);

impl Field for Bn254 {
	const ID: FieldId = FieldId::Bn254;
	const ZERO: Self = Self(<Fr as AdditiveGroup>::ZERO);
	const ONE: Self = Self(<Fr as ArkField>::ONE);
	const BYTE_LEN: usize = 32;

	fn modulus() -> BigUint {
		BigUint::from_bytes_le(&Fr::MODULUS.to_bytes_le())
	}

	fn invert(&self) -> Option<Self> {
		self.0.inverse().map(Self)
	}

	fn from_u64(value: u64) -> Self {
		Self(Fr::from(value))
	}

	fn from_biguint(value: &BigUint) -> Self {
		Self(Fr::from_le_bytes_mod_order(&value.to_bytes_le()))
	}

	fn to_biguint(&self) -> BigUint {
		BigUint::from_bytes_le(&self.0.into_bigint().to_bytes_le())
	}

	fn random(mut rng: impl RngCore) -> Self {
		// Twice the modulus width keeps the reduction bias negligible.
		let mut wide = [0u8; 64];
		rng.fill_bytes(&mut wide);
		Self(Fr::from_le_bytes_mod_order(&wide))
	}
}

impl SerializeBytes for Bn254 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, Self::BYTE_LEN)?;
		write_buf.put_slice(&self.to_bytes_le());
		Ok(())
	}
}

impl DeserializeBytes for Bn254 {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		let bytes = <[u8; 32]>::deserialize(read_buf)?;
		if BigUint::from_bytes_le(&bytes) >= Self::modulus() {
			return Err(SerializationError::InvalidConstruction { name: "Bn254" });
		}
		Ok(Self(Fr::from_le_bytes_mod_order(&bytes)))
	}
}
