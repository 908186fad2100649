// Copyright 2025 Irreducible Inc.
use std::fmt::{self, Display, Formatter};

use stratum_core::LayeredCircuitError;
use stratum_field::FieldId;
use stratum_utils::SerializationError;

use crate::hints::HintError;

/// Where inside a circuit an IR violation was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrLocation {
	/// The circuit as a whole.
	Circuit,
	/// The instruction with the given index.
	Instruction(usize),
	/// The constraint with the given index.
	Constraint(usize),
	/// The output with the given index.
	Output(usize),
}

impl Display for IrLocation {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			IrLocation::Circuit => write!(f, "circuit"),
			IrLocation::Instruction(i) => write!(f, "instruction #{i}"),
			IrLocation::Constraint(i) => write!(f, "constraint #{i}"),
			IrLocation::Output(i) => write!(f, "output #{i}"),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("malformed IR in circuit {circuit_id} at {location}: {reason}")]
	IrMalformed {
		circuit_id: usize,
		location: IrLocation,
		reason: String,
	},
	#[error("constraint #{constraint_index} of circuit {circuit_id} is not satisfied")]
	Unsatisfied {
		circuit_id: usize,
		constraint_index: usize,
	},
	#[error("hint {hint_id:#x} failed: {source}")]
	HintFailed {
		hint_id: u64,
		#[source]
		source: HintError,
	},
	#[error("division by zero")]
	DivideByZero,
	#[error("the input was produced for field {found}, expected {expected}")]
	UnsupportedField { expected: FieldId, found: u64 },
	#[error("inconsistent layout of circuit {circuit_id} at layer {layer}: {reason}")]
	InconsistentLayout {
		circuit_id: usize,
		layer: usize,
		reason: String,
	},
	#[error("sub-circuit digest collision for {name:?}")]
	Collision { name: String },
	#[error("expected {expected} {what}, got {actual}")]
	InputCount {
		what: &'static str,
		expected: usize,
		actual: usize,
	},
	#[error(transparent)]
	Serialization(#[from] SerializationError),
	#[error(transparent)]
	LayeredCircuit(#[from] LayeredCircuitError),
}

impl Error {
	pub(crate) fn malformed(circuit_id: usize, location: IrLocation, reason: impl Into<String>) -> Self {
		Error::IrMalformed {
			circuit_id,
			location,
			reason: reason.into(),
		}
	}

	pub(crate) fn inconsistent(circuit_id: usize, layer: usize, reason: impl Into<String>) -> Self {
		Error::InconsistentLayout {
			circuit_id,
			layer,
			reason: reason.into(),
		}
	}
}
