// Copyright 2025 Irreducible Inc.
use std::collections::BTreeMap;

use stratum_field::Field;
use stratum_utils::{
	DeserializeBytes, SerializationError, SerializeBytes,
	bytes::{Buf, BufMut},
};

use super::{Circuit, Expression, Instruction, RootCircuit, Term};
use crate::Error;

/// One-byte instruction opcodes. The builder only emits a subset.
mod opcode {
	pub const LIN_COMB: u8 = 1;
	pub const HINT: u8 = 7;
	pub const CONSTANT_LIKE: u8 = 8;
	pub const SUB_CIRCUIT_CALL: u8 = 9;
	pub const CUSTOM_GATE: u8 = 10;
}

const COEF_RANDOM: u8 = 2;
const COEF_PUBLIC_INPUT: u8 = 3;
const CONSTRAINT_ZERO: u8 = 1;

impl<F: Field> SerializeBytes for Term<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.vid0.serialize(&mut write_buf)?;
		self.vid1.serialize(&mut write_buf)?;
		self.coef.serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for Term<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let vid0 = usize::deserialize(&mut read_buf)?;
		let vid1 = usize::deserialize(&mut read_buf)?;
		Ok(Term::new(vid0, vid1, F::deserialize(read_buf)?))
	}
}

impl<F: Field> SerializeBytes for Expression<F> {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.terms().serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for Expression<F> {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(Expression::from_terms(Vec::<Term<F>>::deserialize(read_buf)?))
	}
}

impl<F: Field> SerializeBytes for Instruction<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Instruction::InternalVariable { expr } => {
				opcode::LIN_COMB.serialize(&mut write_buf)?;
				expr.serialize(write_buf)
			}
			Instruction::Hint {
				hint_id,
				inputs,
				num_outputs,
			} => {
				opcode::HINT.serialize(&mut write_buf)?;
				hint_id.serialize(&mut write_buf)?;
				inputs.serialize(&mut write_buf)?;
				num_outputs.serialize(write_buf)
			}
			Instruction::GetRandom => {
				opcode::CONSTANT_LIKE.serialize(&mut write_buf)?;
				COEF_RANDOM.serialize(write_buf)
			}
			Instruction::PublicInput { index } => {
				opcode::CONSTANT_LIKE.serialize(&mut write_buf)?;
				COEF_PUBLIC_INPUT.serialize(&mut write_buf)?;
				index.serialize(write_buf)
			}
			Instruction::SubCircuitCall {
				sub_circuit_id,
				inputs,
				num_outputs,
			} => {
				opcode::SUB_CIRCUIT_CALL.serialize(&mut write_buf)?;
				sub_circuit_id.serialize(&mut write_buf)?;
				inputs.serialize(&mut write_buf)?;
				num_outputs.serialize(write_buf)
			}
			Instruction::CustomGate { gate_type, inputs } => {
				opcode::CUSTOM_GATE.serialize(&mut write_buf)?;
				gate_type.serialize(&mut write_buf)?;
				inputs.serialize(write_buf)
			}
		}
	}
}

impl<F: Field> DeserializeBytes for Instruction<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let index = u8::deserialize(&mut read_buf)?;
		Ok(match index {
			opcode::LIN_COMB => Instruction::InternalVariable {
				expr: Expression::deserialize(read_buf)?,
			},
			opcode::HINT => Instruction::Hint {
				hint_id: u64::deserialize(&mut read_buf)?,
				inputs: Vec::deserialize(&mut read_buf)?,
				num_outputs: usize::deserialize(read_buf)?,
			},
			opcode::CONSTANT_LIKE => match u8::deserialize(&mut read_buf)? {
				COEF_RANDOM => Instruction::GetRandom,
				COEF_PUBLIC_INPUT => Instruction::PublicInput {
					index: usize::deserialize(read_buf)?,
				},
				index => {
					return Err(SerializationError::UnknownEnumVariant {
						name: "ConstantLike",
						index,
					});
				}
			},
			opcode::SUB_CIRCUIT_CALL => Instruction::SubCircuitCall {
				sub_circuit_id: usize::deserialize(&mut read_buf)?,
				inputs: Vec::deserialize(&mut read_buf)?,
				num_outputs: usize::deserialize(read_buf)?,
			},
			opcode::CUSTOM_GATE => Instruction::CustomGate {
				gate_type: u64::deserialize(&mut read_buf)?,
				inputs: Vec::deserialize(read_buf)?,
			},
			_ => {
				return Err(SerializationError::UnknownEnumVariant {
					name: "Instruction",
					index,
				});
			}
		})
	}
}

impl<F: Field> SerializeBytes for Circuit<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.num_inputs.serialize(&mut write_buf)?;
		self.instructions.serialize(&mut write_buf)?;
		self.constraints.len().serialize(&mut write_buf)?;
		for constraint in &self.constraints {
			CONSTRAINT_ZERO.serialize(&mut write_buf)?;
			constraint.serialize(&mut write_buf)?;
		}
		self.outputs.serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for Circuit<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let num_inputs = usize::deserialize(&mut read_buf)?;
		let instructions = Vec::deserialize(&mut read_buf)?;
		let num_constraints = usize::deserialize(&mut read_buf)?;
		let mut constraints = Vec::new();
		for _ in 0..num_constraints {
			match u8::deserialize(&mut read_buf)? {
				CONSTRAINT_ZERO => constraints.push(Expression::deserialize(&mut read_buf)?),
				index => {
					return Err(SerializationError::UnknownEnumVariant {
						name: "ConstraintType",
						index,
					});
				}
			}
		}
		Ok(Circuit {
			num_inputs,
			instructions,
			constraints,
			outputs: Vec::deserialize(read_buf)?,
		})
	}
}

impl<F: Field> SerializeBytes for RootCircuit<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		(F::ID as u64).serialize(&mut write_buf)?;
		self.num_public_inputs.serialize(&mut write_buf)?;
		self.expected_num_output_zeroes.serialize(&mut write_buf)?;
		self.circuits.len().serialize(&mut write_buf)?;
		for (id, circuit) in &self.circuits {
			id.serialize(&mut write_buf)?;
			circuit.serialize(&mut write_buf)?;
		}
		Ok(())
	}
}

impl<F: Field> DeserializeBytes for RootCircuit<F> {
	/// Fails with [`SerializationError::ModulusMismatch`] when the input was written for
	/// another field; [`RootCircuit::from_bytes`] reports that case more precisely.
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		if u64::deserialize(&mut read_buf)? != F::ID as u64 {
			return Err(SerializationError::ModulusMismatch);
		}
		let num_public_inputs = usize::deserialize(&mut read_buf)?;
		let expected_num_output_zeroes = usize::deserialize(&mut read_buf)?;
		let num_circuits = usize::deserialize(&mut read_buf)?;
		let mut circuits = BTreeMap::new();
		for _ in 0..num_circuits {
			let id = usize::deserialize(&mut read_buf)?;
			if circuits
				.insert(id, Circuit::deserialize(&mut read_buf)?)
				.is_some()
			{
				return Err(SerializationError::InvalidConstruction {
					name: "RootCircuit",
				});
			}
		}
		Ok(RootCircuit {
			num_public_inputs,
			expected_num_output_zeroes,
			circuits,
		})
	}
}

impl<F: Field> RootCircuit<F> {
	/// Decodes an IR file, reporting a field mismatch as [`Error::UnsupportedField`].
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
		let found = u64::deserialize(bytes)?;
		if found != F::ID as u64 {
			return Err(Error::UnsupportedField {
				expected: F::ID,
				found,
			});
		}
		Ok(Self::deserialize(bytes)?)
	}

	/// Encodes the IR into a fresh buffer.
	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		let mut buf = Vec::new();
		self.serialize(&mut buf)?;
		Ok(buf)
	}
}

#[cfg(test)]
mod tests {
	use stratum_field::{Bn254, FieldId, M31};

	use super::*;

	fn sample() -> RootCircuit<M31> {
		let x = Expression::<M31>::var(1);
		let sub = Circuit {
			num_inputs: 1,
			instructions: vec![Instruction::CustomGate {
				gate_type: 12345,
				inputs: vec![x.clone()],
			}],
			constraints: vec![],
			outputs: vec![Expression::var(2)],
		};
		let root = Circuit {
			num_inputs: 2,
			instructions: vec![
				Instruction::InternalVariable {
					expr: &(&x * &Expression::var(2)) + &Expression::constant(M31::new(7)),
				},
				Instruction::Hint {
					hint_id: 0xccc000000001,
					inputs: vec![Expression::constant(M31::ONE), x.clone()],
					num_outputs: 1,
				},
				Instruction::GetRandom,
				Instruction::PublicInput { index: 0 },
				Instruction::SubCircuitCall {
					sub_circuit_id: 1,
					inputs: vec![Expression::var(3)],
					num_outputs: 1,
				},
			],
			constraints: vec![Expression::var(7), Expression::var(7)],
			outputs: vec![],
		};
		RootCircuit {
			num_public_inputs: 1,
			expected_num_output_zeroes: 0,
			circuits: BTreeMap::from([(0, root), (1, sub)]),
		}
	}

	#[test]
	fn test_ir_survives_encoding() {
		let rc = sample();
		rc.validate().unwrap();
		let bytes = rc.to_bytes().unwrap();
		assert_eq!(&bytes[..8], &1u64.to_le_bytes());
		assert_eq!(RootCircuit::<M31>::from_bytes(&bytes).unwrap(), rc);
	}

	#[test]
	fn test_field_mismatch_is_unsupported() {
		let bytes = sample().to_bytes().unwrap();
		assert!(matches!(
			RootCircuit::<Bn254>::from_bytes(&bytes),
			Err(Error::UnsupportedField {
				expected: FieldId::Bn254,
				found: 1
			})
		));
	}

	#[test]
	fn test_foreign_opcodes_are_rejected() {
		// A `Mul` instruction (opcode 2) from a richer IR dialect.
		let buf = [2u8, 0, 0];
		assert_eq!(
			Instruction::<M31>::deserialize(buf.as_slice()),
			Err(SerializationError::UnknownEnumVariant {
				name: "Instruction",
				index: 2
			})
		);
	}
}
