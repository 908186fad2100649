// Copyright 2024-2025 Irreducible Inc.

//! Little-endian binary encoding shared by the layered circuit, witness and IR formats.
//!
//! Lengths and `usize` values are always encoded as `u64`, independent of the host pointer
//! width.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Serialize a value into a byte buffer.
pub trait SerializeBytes {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError>;
}

/// Deserialize a value from a byte buffer.
pub trait DeserializeBytes {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
	#[error("Write buffer is full")]
	WriteBufferFull,
	#[error("Not enough data in read buffer to deserialize")]
	NotEnoughBytes,
	#[error("Unknown enum variant index {name}::{index}")]
	UnknownEnumVariant { name: &'static str, index: u8 },
	#[error("FromUtf8Error: {0}")]
	FromUtf8Error(#[from] std::string::FromUtf8Error),
	#[error("Invalid construction of {name}")]
	InvalidConstruction { name: &'static str },
	#[error("Invalid magic number: expected {expected:#x}, got {actual:#x}")]
	InvalidMagic { expected: u64, actual: u64 },
	#[error("Field modulus in the data does not match the requested field")]
	ModulusMismatch,
	#[error("value {value} does not fit into usize")]
	UsizeTooLarge { value: u64 },
}

impl<T: SerializeBytes + ?Sized> SerializeBytes for &T {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		(**self).serialize(write_buf)
	}
}

impl SerializeBytes for usize {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		SerializeBytes::serialize(&(*self as u64), &mut write_buf)
	}
}

impl DeserializeBytes for usize {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let value: u64 = DeserializeBytes::deserialize(&mut read_buf)?;
		value
			.try_into()
			.map_err(|_| SerializationError::UsizeTooLarge { value })
	}
}

impl SerializeBytes for u64 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
		write_buf.put_u64_le(*self);
		Ok(())
	}
}

impl DeserializeBytes for u64 {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
		Ok(read_buf.get_u64_le())
	}
}

impl SerializeBytes for u32 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
		write_buf.put_u32_le(*self);
		Ok(())
	}
}

impl DeserializeBytes for u32 {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
		Ok(read_buf.get_u32_le())
	}
}

impl SerializeBytes for u8 {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, std::mem::size_of::<Self>())?;
		write_buf.put_u8(*self);
		Ok(())
	}
}

impl DeserializeBytes for u8 {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		assert_enough_data_for(&read_buf, std::mem::size_of::<Self>())?;
		Ok(read_buf.get_u8())
	}
}

impl SerializeBytes for bool {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		u8::serialize(&(*self as u8), write_buf)
	}
}

impl DeserializeBytes for bool {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(u8::deserialize(read_buf)? != 0)
	}
}

impl SerializeBytes for () {
	fn serialize(&self, _write_buf: impl BufMut) -> Result<(), SerializationError> {
		Ok(())
	}
}

impl SerializeBytes for str {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		let bytes = self.as_bytes();
		SerializeBytes::serialize(&bytes.len(), &mut write_buf)?;
		assert_enough_space_for(&write_buf, bytes.len())?;
		write_buf.put_slice(bytes);
		Ok(())
	}
}

impl SerializeBytes for String {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		SerializeBytes::serialize(self.as_str(), &mut write_buf)
	}
}

impl DeserializeBytes for String {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let len = DeserializeBytes::deserialize(&mut read_buf)?;
		assert_enough_data_for(&read_buf, len)?;
		Ok(Self::from_utf8(read_buf.copy_to_bytes(len).to_vec())?)
	}
}

impl<T: SerializeBytes> SerializeBytes for [T] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		SerializeBytes::serialize(&self.len(), &mut write_buf)?;
		self.iter()
			.try_for_each(|item| SerializeBytes::serialize(item, &mut write_buf))
	}
}

impl<T: SerializeBytes> SerializeBytes for Vec<T> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		SerializeBytes::serialize(self.as_slice(), &mut write_buf)
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Vec<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		let len: usize = DeserializeBytes::deserialize(&mut read_buf)?;
		// Every element occupies at least one byte, so a length beyond the remaining data is
		// necessarily corrupt. This keeps a bogus length from triggering a huge allocation.
		assert_enough_data_for(&read_buf, len)?;
		(0..len)
			.map(|_| DeserializeBytes::deserialize(&mut read_buf))
			.collect()
	}
}

impl<T: SerializeBytes> SerializeBytes for Option<T> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		match self {
			Some(value) => {
				SerializeBytes::serialize(&true, &mut write_buf)?;
				SerializeBytes::serialize(value, &mut write_buf)?;
			}
			None => {
				SerializeBytes::serialize(&false, write_buf)?;
			}
		}
		Ok(())
	}
}

impl<T: DeserializeBytes> DeserializeBytes for Option<T> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok(match bool::deserialize(&mut read_buf)? {
			true => Some(T::deserialize(&mut read_buf)?),
			false => None,
		})
	}
}

impl<U: SerializeBytes, V: SerializeBytes> SerializeBytes for (U, V) {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		U::serialize(&self.0, &mut write_buf)?;
		V::serialize(&self.1, write_buf)
	}
}

impl<U: DeserializeBytes, V: DeserializeBytes> DeserializeBytes for (U, V) {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError>
	where
		Self: Sized,
	{
		Ok((U::deserialize(&mut read_buf)?, V::deserialize(read_buf)?))
	}
}

impl<const N: usize> SerializeBytes for [u8; N] {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		assert_enough_space_for(&write_buf, N)?;
		write_buf.put_slice(self);
		Ok(())
	}
}

impl<const N: usize> DeserializeBytes for [u8; N] {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		assert_enough_data_for(&read_buf, N)?;
		let mut ret = [0u8; N];
		read_buf.copy_to_slice(&mut ret);
		Ok(ret)
	}
}

/// Writes `magic` as a u64 header.
pub fn serialize_magic(magic: u64, write_buf: impl BufMut) -> Result<(), SerializationError> {
	magic.serialize(write_buf)
}

/// Reads a u64 header and checks it against `expected`.
pub fn deserialize_magic(expected: u64, read_buf: impl Buf) -> Result<(), SerializationError> {
	let actual = u64::deserialize(read_buf)?;
	if actual != expected {
		return Err(SerializationError::InvalidMagic { expected, actual });
	}
	Ok(())
}

#[inline]
pub fn assert_enough_space_for(
	write_buf: &impl BufMut,
	size: usize,
) -> Result<(), SerializationError> {
	if write_buf.remaining_mut() < size {
		return Err(SerializationError::WriteBufferFull);
	}
	Ok(())
}

#[inline]
pub fn assert_enough_data_for(read_buf: &impl Buf, size: usize) -> Result<(), SerializationError> {
	if read_buf.remaining() < size {
		return Err(SerializationError::NotEnoughBytes);
	}
	Ok(())
}
