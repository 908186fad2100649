// Copyright 2025 Irreducible Inc.
//! Hint system.
//!
//! Hints are off-circuit computations whose results enter the circuit as fresh inputs. The
//! circuit must constrain them; a hint only makes the witness easy to find.
//!
//! Hints see field elements as their canonical integer representatives, so they can implement
//! integer operations such as bit decomposition or Euclidean division.

use num_bigint::BigUint;
use rustc_hash::FxHashMap;
use sha3::{Digest, Keccak256};
use stratum_core::{CustomGateEvaluator, LayeredCircuitError};
use stratum_field::Field;

use crate::Error;

mod builtin;

pub use builtin::BuiltinHint;

/// Failure of a single hint invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HintError {
	#[error("wrong arity: {0}")]
	Arity(&'static str),
	#[error("input does not fit in {bits} bits")]
	InputTooLarge { bits: usize },
	#[error("no hint registered under this id")]
	Unknown,
	#[error("division by zero")]
	DivideByZero,
	#[error("{0}")]
	Failed(String),
}

/// Hint handler.
pub trait Hint: Send + Sync {
	/// Computes `outputs` from `inputs`. All values are reduced modulo `modulus`.
	fn execute(
		&self,
		modulus: &BigUint,
		inputs: &[BigUint],
		outputs: &mut [BigUint],
	) -> Result<(), HintError>;
}

impl<T> Hint for T
where
	T: Fn(&BigUint, &[BigUint], &mut [BigUint]) -> Result<(), HintError> + Send + Sync,
{
	fn execute(
		&self,
		modulus: &BigUint,
		inputs: &[BigUint],
		outputs: &mut [BigUint],
	) -> Result<(), HintError> {
		self(modulus, inputs, outputs)
	}
}

/// Derives the id of a user hint from its registration key.
///
/// The id is the first 8 bytes of the Keccak-256 digest of the key, little-endian.
///
/// # Panics
///
/// If the id falls into the range reserved for [`BuiltinHint`]s.
pub fn hint_key_to_id(key: &str) -> u64 {
	let digest = Keccak256::digest(key.as_bytes());
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&digest[..8]);
	let id = u64::from_le_bytes(bytes);
	assert!(
		!BuiltinHint::is_reserved(id),
		"hint id {id:#x} of key {key:?} collides with a builtin hint id"
	);
	id
}

/// Registry of user hints and custom gate functions.
///
/// Builtin hints are always available and need no registration.
#[derive(Default)]
pub struct HintRegistry {
	hints: FxHashMap<u64, Box<dyn Hint>>,
	custom_gates: FxHashMap<u64, Box<dyn Hint>>,
}

impl HintRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `hint` under the id derived from `key` and returns that id.
	///
	/// # Panics
	///
	/// If a hint with the same id is already registered.
	pub fn register(&mut self, key: &str, hint: impl Hint + 'static) -> u64 {
		let id = hint_key_to_id(key);
		let previous = self.hints.insert(id, Box::new(hint));
		assert!(previous.is_none(), "hint {key:?} ({id:#x}) registered twice");
		id
	}

	/// Registers the function of custom gate `gate_type`. It must produce exactly one output.
	///
	/// # Panics
	///
	/// If the gate type is already registered.
	pub fn register_custom_gate(&mut self, gate_type: u64, gate: impl Hint + 'static) {
		let previous = self.custom_gates.insert(gate_type, Box::new(gate));
		assert!(previous.is_none(), "custom gate {gate_type} registered twice");
	}

	/// Whether `hint_id` names a builtin or a registered hint.
	pub fn contains(&self, hint_id: u64) -> bool {
		BuiltinHint::from_id(hint_id).is_some() || self.hints.contains_key(&hint_id)
	}

	/// Runs the hint `hint_id` on integer inputs.
	pub fn call_raw(
		&self,
		hint_id: u64,
		modulus: &BigUint,
		inputs: &[BigUint],
		num_outputs: usize,
	) -> Result<Vec<BigUint>, HintError> {
		let mut outputs = vec![BigUint::ZERO; num_outputs];
		match BuiltinHint::from_id(hint_id) {
			Some(builtin) => builtin.execute(modulus, inputs, &mut outputs)?,
			None => self
				.hints
				.get(&hint_id)
				.ok_or(HintError::Unknown)?
				.execute(modulus, inputs, &mut outputs)?,
		}
		Ok(outputs)
	}

	/// Runs the hint `hint_id` on field elements.
	pub fn call<F: Field>(
		&self,
		hint_id: u64,
		inputs: &[F],
		num_outputs: usize,
	) -> Result<Vec<F>, Error> {
		let inputs = inputs.iter().map(F::to_biguint).collect::<Vec<_>>();
		let outputs = self
			.call_raw(hint_id, &F::modulus(), &inputs, num_outputs)
			.map_err(|source| match source {
				HintError::DivideByZero => Error::DivideByZero,
				source => Error::HintFailed { hint_id, source },
			})?;
		Ok(outputs.iter().map(F::from_biguint).collect())
	}
}

impl<F: Field> CustomGateEvaluator<F> for HintRegistry {
	fn evaluate_custom_gate(&self, gate_type: u64, inputs: &[F]) -> Result<F, LayeredCircuitError> {
		let gate = self
			.custom_gates
			.get(&gate_type)
			.ok_or(LayeredCircuitError::UnknownCustomGate { gate_type })?;
		let inputs = inputs.iter().map(F::to_biguint).collect::<Vec<_>>();
		let mut output = [BigUint::ZERO];
		gate.execute(&F::modulus(), &inputs, &mut output)
			.map_err(|e| LayeredCircuitError::CustomGateFailed {
				gate_type,
				message: e.to_string(),
			})?;
		Ok(F::from_biguint(&output[0]))
	}
}
