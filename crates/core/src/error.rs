// Copyright 2025 Irreducible Inc.
//! Hosts error definitions for the core crate.

/// Layered circuit related error.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayeredCircuitError {
	#[error("compiled layer {layer_id} {which} length {len} is not a power of two")]
	LengthNotPowerOfTwo {
		layer_id: usize,
		which: &'static str,
		len: usize,
	},
	#[error("compiled layer {layer_id} {gate_kind} gate #{gate_index} refers to out-of-range {port}")]
	GateOutOfRange {
		layer_id: usize,
		gate_kind: &'static str,
		gate_index: usize,
		port: &'static str,
	},
	#[error("compiled layer {layer_id} refers to child {child_id}, which is not an earlier layer")]
	ChildNotEarlier { layer_id: usize, child_id: usize },
	#[error(
		"compiled layer {layer_id} places child {child_id} at {offset} ({which}), which is misaligned or out of range"
	)]
	BadAllocation {
		layer_id: usize,
		child_id: usize,
		which: &'static str,
		offset: usize,
	},
	#[error("layer list refers to unknown compiled layer {0}")]
	UnknownLayer(usize),
	#[error("the circuit has no layers")]
	NoLayers,
	#[error("layer {index} expects {expected} inputs but the previous layer yields {actual}")]
	AdjacentLengthMismatch {
		index: usize,
		expected: usize,
		actual: usize,
	},
	#[error("layer {index} reads slot {slot}, which the previous layer never writes")]
	UninitializedInput { index: usize, slot: usize },
	#[error("public input coefficient {index} out of range ({num_public_inputs} public inputs)")]
	PublicInputOutOfRange {
		index: usize,
		num_public_inputs: usize,
	},
	#[error("expected {expected} inputs, got {actual}")]
	InputLengthMismatch { expected: usize, actual: usize },
	#[error("unknown custom gate type {gate_type}")]
	UnknownCustomGate { gate_type: u64 },
	#[error("custom gate type {gate_type} failed: {message}")]
	CustomGateFailed { gate_type: u64, message: String },
	#[error("witness holds {actual} values, expected {expected}")]
	WitnessLengthMismatch { expected: usize, actual: usize },
}
