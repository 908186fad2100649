// Copyright 2025 Irreducible Inc.
//! Memoized sub-circuit calls.

use std::{any::Any, rc::Rc};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use stratum_field::Field;
use stratum_utils::{SerializationError, SerializeBytes};

use super::{CircuitBuilder, Frame, Variable, Variables, constraints::Status};
use crate::{
	Error,
	ir::{Expression, Instruction},
};

/// A recorded sub-circuit together with what its callers need to know about it.
#[derive(Clone)]
struct Entry {
	circuit_id: usize,
	/// The exact bytes the digest was computed from.
	fingerprint: Vec<u8>,
	/// The value returned by the recording, over the variables of the sub-circuit.
	outputs: Rc<dyn Any>,
	/// Estimated layer of every output, relative to inputs at layer 1.
	output_layers: Vec<usize>,
	/// Per constraint bucket, the inputs the sub-circuit enforces.
	input_asserts: [Vec<usize>; 3],
	/// Outputs known to be boolean.
	output_bools: Vec<usize>,
}

/// Recorded sub-circuits by SHA-256 digest of their fingerprint.
#[derive(Default)]
pub(crate) struct Memo {
	entries: FxHashMap<[u8; 32], Entry>,
}

fn fingerprint<P: SerializeBytes + ?Sized>(
	name: &str,
	shape: &[u64],
	params: &P,
	flags: &[[bool; 3]],
) -> Result<Vec<u8>, SerializationError> {
	let mut buf = Vec::new();
	name.serialize(&mut buf)?;
	shape.serialize(&mut buf)?;
	params.serialize(&mut buf)?;
	for flag in flags.iter().flatten() {
		flag.serialize(&mut buf)?;
	}
	Ok(buf)
}

impl<F: Field> CircuitBuilder<F> {
	/// Calls `f` as a sub-circuit.
	///
	/// The first call with a given `name`, `params`, input shape and set of facts known about
	/// the inputs records `f` into a new circuit; later identical calls only emit another call
	/// to it. `f` receives the builder and fresh variables shaped like `inputs`, and must only
	/// return variables it created or received.
	///
	/// Facts flow both ways: inputs known to be boolean, zero or non-zero in the caller are
	/// known in the sub-circuit, inputs the sub-circuit constrains become known in the caller,
	/// and boolean outputs stay boolean.
	///
	/// # Panics
	///
	/// If `f` returns no variable.
	pub fn memorized_call<I, O, P>(
		&self,
		name: &str,
		inputs: &I,
		params: &P,
		f: impl FnOnce(&Self, I) -> O,
	) -> O
	where
		I: Variables,
		O: Variables,
		P: SerializeBytes + ?Sized,
	{
		let (input_exprs, flags) = {
			let mut shared = self.shared();
			let exprs = inputs
				.variables()
				.into_iter()
				.map(|v| shared.expr(v))
				.collect::<Vec<_>>();
			let constraints = &shared.frame().constraints;
			let flags = exprs
				.iter()
				.map(|e| constraints.buckets().map(|bucket| bucket.status(e).is_some()))
				.collect::<Vec<_>>();
			(exprs, flags)
		};

		let fingerprint = match fingerprint(name, &inputs.shape(), params, &flags) {
			Ok(fingerprint) => Some(fingerprint),
			Err(err) => {
				self.shared().error.get_or_insert(Error::from(err));
				None
			}
		};
		let digest: Option<[u8; 32]> = fingerprint.as_ref().map(|fp| Sha256::digest(fp).into());

		let cached = digest.and_then(|digest| {
			let mut shared = self.shared();
			let entry = shared.memo.entries.get(&digest)?;
			let matches = Some(&entry.fingerprint) == fingerprint.as_ref()
				&& entry.outputs.downcast_ref::<O>().is_some();
			if matches {
				Some(entry.clone())
			} else {
				tracing::warn!(name, "sub-circuit digest collision");
				shared.error.get_or_insert(Error::Collision {
					name: name.to_string(),
				});
				None
			}
		});

		match cached {
			Some(entry) => {
				let template = entry
					.outputs
					.downcast_ref::<O>()
					.expect("the entry was checked to hold this output type");
				let outputs = self.emit_call(&input_exprs, &entry);
				template.rebuild(&mut outputs.into_iter())
			}
			None => {
				let (entry, template) = self.record(inputs, &flags, f);
				let outputs = self.emit_call(&input_exprs, &entry);
				let rebuilt = template.rebuild(&mut outputs.into_iter());
				let mut shared = self.shared();
				if let (Some(digest), Some(fingerprint)) = (digest, fingerprint) {
					if shared.error.is_none() {
						tracing::debug!(name, circuit_id = entry.circuit_id, "recorded sub-circuit");
						shared.memo.entries.insert(
							digest,
							Entry {
								fingerprint,
								outputs: Rc::new(template),
								..entry
							},
						);
					}
				}
				rebuilt
			}
		}
	}

	/// Records `f` into a new circuit whose inputs are shaped like `inputs`.
	fn record<I: Variables, O: Variables>(
		&self,
		inputs: &I,
		flags: &[[bool; 3]],
		f: impl FnOnce(&Self, I) -> O,
	) -> (Entry, O) {
		let (frame_id, wires, sub_inputs) = {
			let mut shared = self.shared();
			let frame_id = shared.frames.push(Frame::new(false));
			shared.stack.push(frame_id);
			let frame = &mut shared.frames[frame_id];
			let wires = flags.iter().map(|_| frame.add_input()).collect::<Vec<_>>();
			for (&wire, flags) in wires.iter().zip(flags) {
				let e = Expression::var(wire);
				for (bucket, &known) in frame.constraints.buckets_mut().into_iter().zip(flags) {
					if known {
						bucket.insert(&e, Status::Marked);
					}
				}
			}
			let sub_inputs = wires
				.iter()
				.map(|&wire| shared.wire_var(wire))
				.collect::<Vec<Variable>>();
			(frame_id, wires, sub_inputs)
		};

		let outputs = f(self, inputs.rebuild(&mut sub_inputs.into_iter()));

		let mut shared = self.shared();
		let output_vars = outputs.variables();
		assert!(!output_vars.is_empty(), "a sub-circuit needs at least one output");
		let output_exprs = output_vars
			.iter()
			.map(|&v| shared.expr(v))
			.collect::<Vec<_>>();

		assert_eq!(shared.stack.pop(), Some(frame_id), "unbalanced sub-circuit frames");
		let frame = std::mem::replace(&mut shared.frames[frame_id], Frame::new(false));
		let output_layers = output_exprs.iter().map(|e| frame.layer_of(e)).collect();
		let output_bools = output_exprs
			.iter()
			.positions(|e| frame.constraints.bools.status(e).is_some())
			.collect();
		let input_asserts = frame.constraints.buckets().map(|bucket| {
			wires
				.iter()
				.positions(|&wire| bucket.status(&Expression::var(wire)) == Some(Status::Asserted))
				.collect()
		});

		let circuit = frame.into_circuit(output_exprs);
		let circuit_id = shared.circuits.len() + 1;
		shared.circuits.insert(circuit_id, circuit);
		let entry = Entry {
			circuit_id,
			fingerprint: Vec::new(),
			outputs: Rc::new(()),
			output_layers,
			input_asserts,
			output_bools,
		};
		(entry, outputs)
	}

	/// Emits a call to a recorded sub-circuit and returns its output variables.
	fn emit_call(&self, input_exprs: &[Expression<F>], entry: &Entry) -> Vec<Variable> {
		let mut shared = self.shared();
		let frame = shared.frame();
		let max_input_layer = input_exprs
			.iter()
			.map(|e| frame.layer_of(e))
			.max()
			.unwrap_or(1);
		let num_outputs = entry.output_layers.len();
		let first = frame.push(
			Instruction::SubCircuitCall {
				sub_circuit_id: entry.circuit_id,
				inputs: input_exprs.to_vec(),
				num_outputs,
			},
			0,
		);
		for (i, &layer) in entry.output_layers.iter().enumerate() {
			frame.layers[first + i] = max_input_layer + layer - 1;
		}

		for (bucket, asserted) in frame
			.constraints
			.buckets_mut()
			.into_iter()
			.zip(&entry.input_asserts)
		{
			for &i in asserted {
				bucket.insert(&input_exprs[i], Status::Marked);
			}
		}
		for &i in &entry.output_bools {
			frame
				.constraints
				.bools
				.insert(&Expression::var(first + i), Status::Marked);
		}

		(first..first + num_outputs)
			.map(|wire| shared.wire_var(wire))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use stratum_field::M31;

	use super::*;
	use crate::Options;

	fn builder() -> CircuitBuilder<M31> {
		CircuitBuilder::with_options(Options::default())
	}

	fn square(b: &CircuitBuilder<M31>, x: Variable) -> Variable {
		let x2 = b.mul(x, x);
		b.to_single_variable(x2)
	}

	#[test]
	fn test_identical_calls_share_a_circuit() {
		let b = builder();
		let x = b.add_input();
		let y = b.add_input();
		let sx = b.memorized_call("square", &x, &(), square);
		let sy = b.memorized_call("square", &y, &(), square);
		assert_ne!(sx, sy);
		b.assert_is_equal(sx, sy);
		let rc = b.build().unwrap();
		rc.validate().unwrap();
		assert_eq!(rc.circuits.len(), 2);
		assert_eq!(rc.root().unwrap().callees().collect::<Vec<_>>(), vec![1, 1]);
	}

	#[test]
	fn test_params_and_shapes_split_the_memo() {
		let b = builder();
		let xs = vec![b.add_input(), b.add_input()];
		let scaled = |b: &CircuitBuilder<M31>, xs: Vec<Variable>, k: u64| {
			xs.iter()
				.map(|&x| b.mul_constant(x, M31::from_u64(k)))
				.collect::<Vec<_>>()
		};
		let _ = b.memorized_call("scale", &xs, &2u64, |b, xs| scaled(b, xs, 2));
		let _ = b.memorized_call("scale", &xs, &3u64, |b, xs| scaled(b, xs, 3));
		let _ = b.memorized_call("scale", &xs, &3u64, |b, xs| scaled(b, xs, 3));
		let _ = b.memorized_call("scale", &vec![xs.clone()], &3u64, |b, xs: Vec<Vec<Variable>>| {
			scaled(b, xs[0].clone(), 3)
		});
		let rc = b.build().unwrap();
		assert_eq!(rc.circuits.len(), 4);
	}

	#[test]
	fn test_facts_cross_the_call_boundary() {
		let b = builder();
		let x = b.add_input();
		let check_bit = |b: &CircuitBuilder<M31>, x: Variable| {
			b.assert_is_bool(x);
			let one = b.constant(M31::ONE);
			let r = b.sub(one, x);
			b.mark_boolean(r);
			r
		};
		let r = b.memorized_call("check_bit", &x, &(), check_bit);
		// The sub-circuit enforces both facts, so the caller adds no constraint.
		assert!(b.is_boolean(x));
		assert!(b.is_boolean(r));
		b.assert_is_bool(x);
		// x is now known to be boolean, which makes this call a different circuit that
		// does not enforce it again.
		let _ = b.memorized_call("check_bit", &x, &(), check_bit);
		let rc = b.build().unwrap();
		assert!(rc.root().unwrap().constraints.is_empty());
		assert_eq!(rc.circuits.len(), 3);
		assert_eq!(rc.circuits[&1].constraints.len(), 1);
		assert!(rc.circuits[&2].constraints.is_empty());
	}

	#[test]
	fn test_output_layers_follow_the_callee() {
		let b = builder();
		let x = b.add_input();
		let x2 = b.mul(x, x);
		let x4 = b.mul(x2, x2);
		let deep = b.to_single_variable(x4);
		let out = b.memorized_call("square", &deep, &(), square);
		// deep is at layer 3 and the square sits one layer above the callee's inputs.
		assert_eq!(b.layer_of(out), 4);
	}

	#[test]
	fn test_output_type_mismatch_is_a_collision() {
		let b = builder();
		let x = b.add_input();
		let _ = b.memorized_call("f", &x, &(), square);
		let _ = b.memorized_call("f", &x, &(), |b, x| vec![square(b, x)]);
		assert!(matches!(b.build(), Err(Error::Collision { name }) if name == "f"));
	}

	#[test]
	#[should_panic(expected = "at least one output")]
	fn test_call_without_outputs_panics() {
		let b = builder();
		let x = b.add_input();
		b.memorized_call("assert_bit", &x, &(), |b, x| b.assert_is_bool(x));
	}
}
