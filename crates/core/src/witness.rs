// Copyright 2025 Irreducible Inc.
//! A batch of input assignments for a layered circuit.

use stratum_field::Field;
use stratum_utils::{
	DeserializeBytes, SerializationError, SerializeBytes,
	bytes::{Buf, BufMut},
};

use crate::LayeredCircuitError;

/// Input assignments for one or more independent evaluations of a layered circuit.
///
/// Values are stored witness by witness: the `num_inputs_per_witness` layer-0 inputs of the
/// first witness, then its `num_public_inputs_per_witness` public inputs, then the next
/// witness, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness<F> {
	#[allow(missing_docs)]
	pub num_witnesses: usize,
	#[allow(missing_docs)]
	pub num_inputs_per_witness: usize,
	#[allow(missing_docs)]
	pub num_public_inputs_per_witness: usize,
	#[allow(missing_docs)]
	pub values: Vec<F>,
}

impl<F: Field> Witness<F> {
	/// Builds a witness batch from interleaved values.
	///
	/// Fails if `values` is not a whole number of witnesses.
	pub fn new(
		num_inputs_per_witness: usize,
		num_public_inputs_per_witness: usize,
		values: Vec<F>,
	) -> Result<Self, LayeredCircuitError> {
		let stride = num_inputs_per_witness + num_public_inputs_per_witness;
		let num_witnesses = if stride == 0 { 0 } else { values.len() / stride };
		if num_witnesses * stride != values.len() {
			return Err(LayeredCircuitError::WitnessLengthMismatch {
				expected: num_witnesses * stride,
				actual: values.len(),
			});
		}
		Ok(Self {
			num_witnesses,
			num_inputs_per_witness,
			num_public_inputs_per_witness,
			values,
		})
	}

	/// A batch holding a single assignment.
	pub fn single(inputs: Vec<F>, public_inputs: &[F]) -> Self {
		let num_inputs_per_witness = inputs.len();
		let mut values = inputs;
		values.extend_from_slice(public_inputs);
		Self {
			num_witnesses: 1,
			num_inputs_per_witness,
			num_public_inputs_per_witness: public_inputs.len(),
			values,
		}
	}

	/// Iterates over `(inputs, public_inputs)` of every witness.
	pub fn iter(&self) -> impl Iterator<Item = (&[F], &[F])> {
		let stride = self.num_inputs_per_witness + self.num_public_inputs_per_witness;
		(0..self.num_witnesses).map(move |i| {
			let chunk = &self.values[i * stride..(i + 1) * stride];
			chunk.split_at(self.num_inputs_per_witness)
		})
	}
}

impl<F: Field> SerializeBytes for Witness<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.num_witnesses.serialize(&mut write_buf)?;
		self.num_inputs_per_witness.serialize(&mut write_buf)?;
		self.num_public_inputs_per_witness.serialize(&mut write_buf)?;
		F::modulus_bytes().serialize(&mut write_buf)?;
		self.values
			.iter()
			.try_for_each(|value| value.serialize(&mut write_buf))
	}
}

impl<F: Field> DeserializeBytes for Witness<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let num_witnesses = usize::deserialize(&mut read_buf)?;
		let num_inputs_per_witness = usize::deserialize(&mut read_buf)?;
		let num_public_inputs_per_witness = usize::deserialize(&mut read_buf)?;
		if <[u8; 32]>::deserialize(&mut read_buf)? != F::modulus_bytes() {
			return Err(SerializationError::ModulusMismatch);
		}
		let total = num_inputs_per_witness
			.checked_add(num_public_inputs_per_witness)
			.and_then(|stride| stride.checked_mul(num_witnesses))
			.ok_or(SerializationError::InvalidConstruction { name: "Witness" })?;
		if read_buf.remaining() < total.saturating_mul(F::BYTE_LEN) {
			return Err(SerializationError::NotEnoughBytes);
		}
		let values = (0..total)
			.map(|_| F::deserialize(&mut read_buf))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self {
			num_witnesses,
			num_inputs_per_witness,
			num_public_inputs_per_witness,
			values,
		})
	}
}
