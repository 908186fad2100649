// Copyright 2025 Irreducible Inc.
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use super::HintError;

/// Hints every registry understands. Their ids are contiguous from `0xCCC000000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum BuiltinHint {
	/// Copies its inputs.
	Identity = 0xccc000000000,
	/// `x / y` in the field, zero when `y` is zero.
	Div,
	Eq,
	NotEq,
	BoolOr,
	BoolAnd,
	BitOr,
	BitAnd,
	BitXor,
	/// `if c != 0 { a } else { b }`.
	Select,
	/// `x^y` in the field.
	Pow,
	/// Euclidean quotient of the integer representatives. Fails on division by zero.
	IntDiv,
	/// Euclidean remainder of the integer representatives. Fails on division by zero.
	Mod,
	ShiftL,
	ShiftR,
	LesserEq,
	GreaterEq,
	Lesser,
	Greater,
	/// Little-endian bits; the number of outputs is the bit width.
	ToBinary,
}

/// Width of the id range set aside for builtins.
const RESERVED_IDS: u64 = 100;

const ALL: [BuiltinHint; 20] = [
	BuiltinHint::Identity,
	BuiltinHint::Div,
	BuiltinHint::Eq,
	BuiltinHint::NotEq,
	BuiltinHint::BoolOr,
	BuiltinHint::BoolAnd,
	BuiltinHint::BitOr,
	BuiltinHint::BitAnd,
	BuiltinHint::BitXor,
	BuiltinHint::Select,
	BuiltinHint::Pow,
	BuiltinHint::IntDiv,
	BuiltinHint::Mod,
	BuiltinHint::ShiftL,
	BuiltinHint::ShiftR,
	BuiltinHint::LesserEq,
	BuiltinHint::GreaterEq,
	BuiltinHint::Lesser,
	BuiltinHint::Greater,
	BuiltinHint::ToBinary,
];

impl BuiltinHint {
	pub const fn id(self) -> u64 {
		self as u64
	}

	pub fn from_id(id: u64) -> Option<Self> {
		let offset = id.checked_sub(Self::Identity.id())?;
		ALL.get(usize::try_from(offset).ok()?).copied()
	}

	/// Whether `id` lies in the range reserved for builtins, used or not.
	pub fn is_reserved(id: u64) -> bool {
		(Self::Identity.id()..=Self::Identity.id() + RESERVED_IDS).contains(&id)
	}

	fn check_arity(self, num_inputs: usize, num_outputs: usize) -> Result<(), HintError> {
		match self {
			BuiltinHint::Identity if num_inputs == 0 || num_inputs != num_outputs => Err(
				HintError::Arity("identity takes as many outputs as inputs, at least one"),
			),
			BuiltinHint::Identity => Ok(()),
			BuiltinHint::Select if num_inputs != 3 || num_outputs != 1 => {
				Err(HintError::Arity("select takes 3 inputs and 1 output"))
			}
			BuiltinHint::Select => Ok(()),
			BuiltinHint::ToBinary if num_inputs != 1 || num_outputs == 0 => {
				Err(HintError::Arity("to_binary takes 1 input and at least 1 output"))
			}
			BuiltinHint::ToBinary => Ok(()),
			_ if num_inputs != 2 || num_outputs != 1 => {
				Err(HintError::Arity("binary operations take 2 inputs and 1 output"))
			}
			_ => Ok(()),
		}
	}

	/// Runs the builtin on canonical representatives modulo `modulus`.
	pub fn execute(
		self,
		modulus: &BigUint,
		inputs: &[BigUint],
		outputs: &mut [BigUint],
	) -> Result<(), HintError> {
		self.check_arity(inputs.len(), outputs.len())?;
		match self {
			BuiltinHint::Identity => outputs.clone_from_slice(inputs),
			BuiltinHint::Select => {
				outputs[0] = if inputs[0].is_zero() {
					inputs[2].clone()
				} else {
					inputs[1].clone()
				};
			}
			BuiltinHint::ToBinary => {
				let bits = outputs.len();
				let x = &inputs[0];
				if x.bits() > bits as u64 {
					return Err(HintError::InputTooLarge { bits });
				}
				for (i, out) in outputs.iter_mut().enumerate() {
					*out = BigUint::from(x.bit(i as u64));
				}
			}
			_ => {
				let result = self.binary(modulus, &inputs[0], &inputs[1])?;
				outputs[0] = result % modulus;
			}
		}
		Ok(())
	}

	fn binary(self, modulus: &BigUint, x: &BigUint, y: &BigUint) -> Result<BigUint, HintError> {
		let flag = |b: bool| BigUint::from(b as u8);
		Ok(match self {
			BuiltinHint::Div => {
				if y.is_zero() {
					BigUint::ZERO
				} else {
					x * y.modpow(&(modulus - 2u32), modulus)
				}
			}
			BuiltinHint::Eq => flag(x == y),
			BuiltinHint::NotEq => flag(x != y),
			BuiltinHint::BoolOr => flag(!x.is_zero() || !y.is_zero()),
			BuiltinHint::BoolAnd => flag(!x.is_zero() && !y.is_zero()),
			BuiltinHint::BitOr => x | y,
			BuiltinHint::BitAnd => x & y,
			BuiltinHint::BitXor => x ^ y,
			BuiltinHint::Pow => x.modpow(y, modulus),
			BuiltinHint::IntDiv | BuiltinHint::Mod if y.is_zero() => {
				return Err(HintError::DivideByZero);
			}
			BuiltinHint::IntDiv => x / y,
			BuiltinHint::Mod => x % y,
			BuiltinHint::ShiftL => shift_left(modulus, x, y),
			BuiltinHint::ShiftR => shift_right(modulus, x, y),
			BuiltinHint::LesserEq => flag(x <= y),
			BuiltinHint::GreaterEq => flag(x >= y),
			BuiltinHint::Lesser => flag(x < y),
			BuiltinHint::Greater => flag(x > y),
			BuiltinHint::Identity | BuiltinHint::Select | BuiltinHint::ToBinary => {
				unreachable!("{self:?} is not a binary operation")
			}
		})
	}
}

/// Shift amount of a circom-style shift, or `None` when it is negative (above `p / 2`).
fn shift_amount(modulus: &BigUint, k: &BigUint) -> Option<usize> {
	if k > &(modulus / 2u32) {
		return None;
	}
	Some(k.to_usize().unwrap_or(modulus.bits() as usize))
}

/// Circom `<<`: amounts above `p / 2` are negative shifts, results are truncated to the bit
/// width of `p`.
fn shift_left(modulus: &BigUint, x: &BigUint, k: &BigUint) -> BigUint {
	match shift_amount(modulus, k) {
		Some(shift) if shift >= 256 => BigUint::ZERO,
		Some(shift) => {
			let mask = (BigUint::one() << modulus.bits()) - 1u32;
			(x << shift) & mask
		}
		None => shift_right(modulus, x, &(modulus - k)),
	}
}

fn shift_right(modulus: &BigUint, x: &BigUint, k: &BigUint) -> BigUint {
	match shift_amount(modulus, k) {
		Some(shift) if shift >= 256 => BigUint::ZERO,
		Some(shift) => x >> shift,
		None => shift_left(modulus, x, &(modulus - k)),
	}
}

#[cfg(test)]
mod tests {
	use stratum_field::{Field, M31, M31_MODULUS};

	use super::*;

	fn run(hint: BuiltinHint, inputs: &[u64], num_outputs: usize) -> Result<Vec<u64>, HintError> {
		let inputs = inputs
			.iter()
			.map(|&x| M31::from_u64(x).to_biguint())
			.collect::<Vec<_>>();
		let mut outputs = vec![BigUint::ZERO; num_outputs];
		hint.execute(&M31::modulus(), &inputs, &mut outputs)?;
		Ok(outputs
			.iter()
			.map(|x| x.to_u64().expect("reduced output"))
			.collect())
	}

	#[test]
	fn test_ids_are_contiguous() {
		for (i, hint) in ALL.iter().enumerate() {
			assert_eq!(hint.id(), 0xccc000000000 + i as u64);
			assert_eq!(BuiltinHint::from_id(hint.id()), Some(*hint));
		}
		assert_eq!(BuiltinHint::Div.id(), 0xccc000000001);
		assert_eq!(BuiltinHint::from_id(0xccc000000000 + 20), None);
		assert!(BuiltinHint::is_reserved(0xccc000000000 + 20));
	}

	#[test]
	fn test_division() {
		assert_eq!(run(BuiltinHint::Div, &[6, 3], 1).unwrap(), vec![2]);
		assert_eq!(run(BuiltinHint::Div, &[1, 0], 1).unwrap(), vec![0]);
		let half = run(BuiltinHint::Div, &[1, 2], 1).unwrap()[0];
		assert_eq!(M31::from_u64(half) * M31::new(2), M31::ONE);
		assert_eq!(run(BuiltinHint::IntDiv, &[7, 2], 1).unwrap(), vec![3]);
		assert_eq!(run(BuiltinHint::Mod, &[7, 0], 1), Err(HintError::DivideByZero));
	}

	#[test]
	fn test_comparisons_use_integer_order() {
		let minus_one = M31_MODULUS as u64 - 1;
		assert_eq!(run(BuiltinHint::Lesser, &[3, minus_one], 1).unwrap(), vec![1]);
		assert_eq!(run(BuiltinHint::GreaterEq, &[3, 3], 1).unwrap(), vec![1]);
		assert_eq!(run(BuiltinHint::Greater, &[3, 3], 1).unwrap(), vec![0]);
		assert_eq!(run(BuiltinHint::Select, &[0, 5, 9], 1).unwrap(), vec![9]);
		assert_eq!(run(BuiltinHint::Pow, &[3, 4], 1).unwrap(), vec![81]);
	}

	#[test]
	fn test_circom_shifts() {
		assert_eq!(run(BuiltinHint::ShiftL, &[3, 2], 1).unwrap(), vec![12]);
		assert_eq!(run(BuiltinHint::ShiftR, &[12, 2], 1).unwrap(), vec![3]);
		// A shift by -1 is a shift in the other direction.
		let minus_one = M31_MODULUS as u64 - 1;
		assert_eq!(run(BuiltinHint::ShiftL, &[12, minus_one], 1).unwrap(), vec![6]);
		assert_eq!(run(BuiltinHint::ShiftR, &[3, minus_one], 1).unwrap(), vec![6]);
		// Bits beyond the width of the modulus are dropped.
		assert_eq!(run(BuiltinHint::ShiftL, &[1, 31], 1).unwrap(), vec![0]);
	}

	#[test]
	fn test_to_binary() {
		assert_eq!(run(BuiltinHint::ToBinary, &[5], 4).unwrap(), vec![1, 0, 1, 0]);
		assert_eq!(
			run(BuiltinHint::ToBinary, &[8], 3),
			Err(HintError::InputTooLarge { bits: 3 })
		);
	}

	#[test]
	fn test_arity() {
		assert!(matches!(run(BuiltinHint::Div, &[1, 2, 3], 1), Err(HintError::Arity(_))));
		assert!(matches!(run(BuiltinHint::Identity, &[1, 2], 1), Err(HintError::Arity(_))));
		assert_eq!(run(BuiltinHint::Identity, &[1, 2], 2).unwrap(), vec![1, 2]);
	}
}
