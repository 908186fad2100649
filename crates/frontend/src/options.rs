// Copyright 2025 Irreducible Inc.
//! Builder and compiler knobs.

/// Options for the circuit builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
	/// A linear operand whose referenced wires span more estimated layers than this is
	/// materialized into its own wire before it takes part in a sum.
	pub compress_threshold_add: usize,
	/// Operands of a product with more terms than this, or whose term product exceeds it, are
	/// materialized before multiplying.
	pub compress_threshold_mul: usize,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			compress_threshold_add: 10,
			compress_threshold_mul: 40,
		}
	}
}

impl Options {
	/// Defaults overridden by `STRATUM_COMPRESS_THRESHOLD_ADD` and
	/// `STRATUM_COMPRESS_THRESHOLD_MUL`. Unparsable values are ignored.
	pub fn from_env() -> Self {
		let mut opts = Self::default();
		if let Some(value) = env_usize("STRATUM_COMPRESS_THRESHOLD_ADD") {
			opts.compress_threshold_add = value;
		}
		if let Some(value) = env_usize("STRATUM_COMPRESS_THRESHOLD_MUL") {
			opts.compress_threshold_mul = value;
		}
		opts
	}
}

fn env_usize(name: &str) -> Option<usize> {
	let raw = std::env::var(name).ok()?;
	match raw.trim().parse() {
		Ok(value) => Some(value),
		Err(_) => {
			tracing::warn!(name, raw, "ignoring unparsable threshold");
			None
		}
	}
}

/// Options for [`compile`](crate::compile).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
	/// Whether the produced witness solver checks every IR constraint while solving.
	pub check_witness: bool,
	/// Whether the layered circuit is structurally validated before it is returned.
	pub validate_layered: bool,
	/// Whether small children are inlined, unused layers dropped and duplicate gates merged.
	pub optimize_layered: bool,
}

impl Default for CompileOptions {
	fn default() -> Self {
		Self {
			check_witness: true,
			validate_layered: true,
			optimize_layered: true,
		}
	}
}
