// Copyright 2025 Irreducible Inc.

use stratum_field::Field;
use stratum_utils::{
	DeserializeBytes, SerializationError, SerializeBytes,
	bytes::{Buf, BufMut},
	serialization::{deserialize_magic, serialize_magic},
};

use super::{Allocation, Coef, CompiledLayer, Gate, GateCustom, LayeredCircuit, SubAllocation};

/// Header of a serialized [`LayeredCircuit`].
pub const LAYERED_CIRCUIT_MAGIC: u64 = 3698661824528533827;

impl<F: Field> SerializeBytes for Coef<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Coef::Constant(value) => {
				1u8.serialize(&mut write_buf)?;
				value.serialize(write_buf)
			}
			Coef::Random => 2u8.serialize(write_buf),
			Coef::PublicInput(index) => {
				3u8.serialize(&mut write_buf)?;
				index.serialize(write_buf)
			}
		}
	}
}

impl<F: Field> DeserializeBytes for Coef<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let index = u8::deserialize(&mut read_buf)?;
		match index {
			1 => Ok(Coef::Constant(F::deserialize(read_buf)?)),
			2 => Ok(Coef::Random),
			3 => Ok(Coef::PublicInput(usize::deserialize(read_buf)?)),
			_ => Err(SerializationError::UnknownEnumVariant {
				name: "Coef",
				index,
			}),
		}
	}
}

impl<F: Field, const N: usize> SerializeBytes for Gate<F, N> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		for input in &self.inputs {
			input.serialize(&mut write_buf)?;
		}
		self.output.serialize(&mut write_buf)?;
		self.coef.serialize(write_buf)
	}
}

impl<F: Field, const N: usize> DeserializeBytes for Gate<F, N> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let mut inputs = [0usize; N];
		for input in &mut inputs {
			*input = usize::deserialize(&mut read_buf)?;
		}
		Ok(Gate {
			inputs,
			output: usize::deserialize(&mut read_buf)?,
			coef: Coef::deserialize(read_buf)?,
		})
	}
}

impl<F: Field> SerializeBytes for GateCustom<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.gate_type.serialize(&mut write_buf)?;
		self.inputs.serialize(&mut write_buf)?;
		self.output.serialize(&mut write_buf)?;
		self.coef.serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for GateCustom<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(GateCustom {
			gate_type: u64::deserialize(&mut read_buf)?,
			inputs: Vec::deserialize(&mut read_buf)?,
			output: usize::deserialize(&mut read_buf)?,
			coef: Coef::deserialize(read_buf)?,
		})
	}
}

impl SerializeBytes for Allocation {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.input_offset.serialize(&mut write_buf)?;
		self.output_offset.serialize(write_buf)
	}
}

impl DeserializeBytes for Allocation {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(Allocation {
			input_offset: usize::deserialize(&mut read_buf)?,
			output_offset: usize::deserialize(read_buf)?,
		})
	}
}

impl SerializeBytes for SubAllocation {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.id.serialize(&mut write_buf)?;
		self.allocations.serialize(write_buf)
	}
}

impl DeserializeBytes for SubAllocation {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(SubAllocation {
			id: usize::deserialize(&mut read_buf)?,
			allocations: Vec::deserialize(read_buf)?,
		})
	}
}

impl<F: Field> SerializeBytes for CompiledLayer<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.input_len.serialize(&mut write_buf)?;
		self.output_len.serialize(&mut write_buf)?;
		self.sub_allocations.serialize(&mut write_buf)?;
		self.muls.serialize(&mut write_buf)?;
		self.adds.serialize(&mut write_buf)?;
		self.csts.serialize(&mut write_buf)?;
		self.customs.serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for CompiledLayer<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(CompiledLayer {
			input_len: usize::deserialize(&mut read_buf)?,
			output_len: usize::deserialize(&mut read_buf)?,
			sub_allocations: Vec::deserialize(&mut read_buf)?,
			muls: Vec::deserialize(&mut read_buf)?,
			adds: Vec::deserialize(&mut read_buf)?,
			csts: Vec::deserialize(&mut read_buf)?,
			customs: Vec::deserialize(read_buf)?,
		})
	}
}

impl<F: Field> SerializeBytes for LayeredCircuit<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		serialize_magic(LAYERED_CIRCUIT_MAGIC, &mut write_buf)?;
		F::modulus_bytes().serialize(&mut write_buf)?;
		self.num_public_inputs.serialize(&mut write_buf)?;
		self.num_actual_outputs.serialize(&mut write_buf)?;
		self.expected_num_output_zeroes.serialize(&mut write_buf)?;
		self.circuits.serialize(&mut write_buf)?;
		self.layers.serialize(write_buf)
	}
}

impl<F: Field> DeserializeBytes for LayeredCircuit<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		deserialize_magic(LAYERED_CIRCUIT_MAGIC, &mut read_buf)?;
		if <[u8; 32]>::deserialize(&mut read_buf)? != F::modulus_bytes() {
			return Err(SerializationError::ModulusMismatch);
		}
		Ok(LayeredCircuit {
			num_public_inputs: usize::deserialize(&mut read_buf)?,
			num_actual_outputs: usize::deserialize(&mut read_buf)?,
			expected_num_output_zeroes: usize::deserialize(&mut read_buf)?,
			circuits: Vec::deserialize(&mut read_buf)?,
			layers: Vec::deserialize(read_buf)?,
		})
	}
}
