// Copyright 2025 Irreducible Inc.

use std::{
	fmt::{self, Debug, Display, Formatter},
	hash::Hash,
	iter::{Product, Sum},
	ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
	str::FromStr,
};

use num_bigint::BigUint;
use rand::RngCore;
use stratum_utils::{DeserializeBytes, SerializeBytes};

use crate::FieldError;

/// Stable identifier of a supported field, used in binary headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum FieldId {
	M31 = 1,
	Bn254 = 2,
	Gf2 = 3,
}

impl FieldId {
	pub fn from_u64(id: u64) -> Option<Self> {
		match id {
			1 => Some(Self::M31),
			2 => Some(Self::Bn254),
			3 => Some(Self::Gf2),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::M31 => "m31",
			Self::Bn254 => "bn254",
			Self::Gf2 => "gf2",
		}
	}
}

impl Display for FieldId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for FieldId {
	type Err = FieldError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"m31" | "mersenne31" => Ok(Self::M31),
			"bn254" => Ok(Self::Bn254),
			"gf2" => Ok(Self::Gf2),
			_ => Err(FieldError::UnknownField(s.to_string())),
		}
	}
}

/// A prime field.
///
/// Elements are small `Copy` values with a canonical representation, so equality and
/// hashing are structural. Conversions to and from [`BigUint`] are meant for hint
/// boundaries and textual input, not for arithmetic.
pub trait Field:
	'static
	+ Copy
	+ Debug
	+ Display
	+ Default
	+ Eq
	+ Hash
	+ Send
	+ Sync
	+ Add<Output = Self>
	+ Sub<Output = Self>
	+ Mul<Output = Self>
	+ Neg<Output = Self>
	+ AddAssign
	+ SubAssign
	+ MulAssign
	+ Sum
	+ Product
	+ SerializeBytes
	+ DeserializeBytes
{
	const ID: FieldId;
	const ZERO: Self;
	const ONE: Self;
	/// Length of a serialized element in bytes.
	const BYTE_LEN: usize;

	/// The field order.
	fn modulus() -> BigUint;

	/// The field order as 32 little-endian bytes.
	fn modulus_bytes() -> [u8; 32] {
		let mut out = [0u8; 32];
		let bytes = Self::modulus().to_bytes_le();
		out[..bytes.len()].copy_from_slice(&bytes);
		out
	}

	/// Number of bits of the field order.
	fn bit_length() -> usize {
		Self::modulus().bits() as usize
	}

	fn is_zero(&self) -> bool {
		*self == Self::ZERO
	}

	fn is_one(&self) -> bool {
		*self == Self::ONE
	}

	/// Multiplicative inverse, `None` for zero.
	fn invert(&self) -> Option<Self>;

	fn try_inverse(&self) -> Result<Self, FieldError> {
		self.invert().ok_or(FieldError::DivideByZero)
	}

	fn from_u64(value: u64) -> Self;

	/// Reduces an arbitrary integer modulo the field order.
	fn from_biguint(value: &BigUint) -> Self;

	/// The canonical integer representative in `[0, modulus)`.
	fn to_biguint(&self) -> BigUint;

	/// Samples a uniformly random element.
	fn random(rng: impl RngCore) -> Self;

	fn from_i64(value: i64) -> Self {
		if value < 0 {
			-Self::from_u64(value.unsigned_abs())
		} else {
			Self::from_u64(value as u64)
		}
	}

	/// Parses a decimal integer, optionally negative, and reduces it into the field.
	fn from_interface(value: &str) -> Result<Self, FieldError> {
		let trimmed = value.trim();
		let (negative, digits) = match trimmed.strip_prefix('-') {
			Some(rest) => (true, rest),
			None => (false, trimmed),
		};
		let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10)
			.ok_or_else(|| FieldError::InvalidLiteral(value.to_string()))?;
		let element = Self::from_biguint(&magnitude);
		Ok(if negative { -element } else { element })
	}

	fn square(&self) -> Self {
		*self * *self
	}

	fn pow(&self, mut exp: u64) -> Self {
		let mut base = *self;
		let mut acc = Self::ONE;
		while exp > 0 {
			if exp & 1 == 1 {
				acc *= base;
			}
			base = base.square();
			exp >>= 1;
		}
		acc
	}
}

/// Implements the assigning operators and iterator folds in terms of the binary operators.
macro_rules! impl_derived_ops {
	($name:ty) => {
		impl std::ops::AddAssign for $name {
			fn add_assign(&mut self, rhs: Self) {
				*self = *self + rhs;
			}
		}

		impl std::ops::SubAssign for $name {
			fn sub_assign(&mut self, rhs: Self) {
				*self = *self - rhs;
			}
		}

		impl std::ops::MulAssign for $name {
			fn mul_assign(&mut self, rhs: Self) {
				*self = *self * rhs;
			}
		}

		impl std::iter::Sum for $name {
			fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
				iter.fold(<$name as $crate::Field>::ZERO, |acc, x| acc + x)
			}
		}

		impl std::iter::Product for $name {
			fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
				iter.fold(<$name as $crate::Field>::ONE, |acc, x| acc * x)
			}
		}
	};
}

pub(crate) use impl_derived_ops;
