// Copyright 2025 Irreducible Inc.

use super::{Coef, CompiledLayer, LayeredCircuit};
use crate::LayeredCircuitError;

impl<F> LayeredCircuit<F> {
	/// Checks the structural invariants of the circuit.
	///
	/// Every length is a power of two, every gate index is in range, children are earlier
	/// compiled layers placed at aligned, in-range windows, public input coefficients are in
	/// range, consecutive layers agree on lengths and no layer reads a slot its predecessor
	/// leaves unwritten.
	pub fn validate(&self) -> Result<(), LayeredCircuitError> {
		for (layer_id, layer) in self.circuits.iter().enumerate() {
			self.validate_layer(layer_id, layer)?;
		}
		if self.layers.is_empty() {
			return Err(LayeredCircuitError::NoLayers);
		}
		for &id in &self.layers {
			if id >= self.circuits.len() {
				return Err(LayeredCircuitError::UnknownLayer(id));
			}
		}
		let masks = self.slot_masks();
		for (index, pair) in self.layers.windows(2).enumerate() {
			let prev = &self.circuits[pair[0]];
			let cur = &self.circuits[pair[1]];
			if cur.input_len != prev.output_len {
				return Err(LayeredCircuitError::AdjacentLengthMismatch {
					index: index + 1,
					expected: cur.input_len,
					actual: prev.output_len,
				});
			}
			let (read, written) = (&masks[pair[1]].read, &masks[pair[0]].written);
			if let Some(slot) = (0..read.len()).find(|&slot| read[slot] && !written[slot]) {
				return Err(LayeredCircuitError::UninitializedInput {
					index: index + 1,
					slot,
				});
			}
		}
		Ok(())
	}

	fn validate_layer(
		&self,
		layer_id: usize,
		layer: &CompiledLayer<F>,
	) -> Result<(), LayeredCircuitError> {
		for (which, len) in [("input", layer.input_len), ("output", layer.output_len)] {
			if !len.is_power_of_two() {
				return Err(LayeredCircuitError::LengthNotPowerOfTwo {
					layer_id,
					which,
					len,
				});
			}
		}

		let out_of_range = |gate_kind: &'static str, gate_index: usize, port: &'static str| {
			LayeredCircuitError::GateOutOfRange {
				layer_id,
				gate_kind,
				gate_index,
				port,
			}
		};
		let gates = layer
			.muls
			.iter()
			.map(|g| ("mul", &g.inputs[..], g.output, &g.coef))
			.enumerate()
			.chain(
				layer
					.adds
					.iter()
					.map(|g| ("add", &g.inputs[..], g.output, &g.coef))
					.enumerate(),
			)
			.chain(
				layer
					.csts
					.iter()
					.map(|g| ("cst", &g.inputs[..], g.output, &g.coef))
					.enumerate(),
			)
			.chain(
				layer
					.customs
					.iter()
					.map(|g| ("custom", g.inputs.as_slice(), g.output, &g.coef))
					.enumerate(),
			);
		for (gate_index, (gate_kind, inputs, output, coef)) in gates {
			if inputs.iter().any(|&i| i >= layer.input_len) {
				return Err(out_of_range(gate_kind, gate_index, "input"));
			}
			if output >= layer.output_len {
				return Err(out_of_range(gate_kind, gate_index, "output"));
			}
			if let Coef::PublicInput(index) = *coef
				&& index >= self.num_public_inputs
			{
				return Err(LayeredCircuitError::PublicInputOutOfRange {
					index,
					num_public_inputs: self.num_public_inputs,
				});
			}
		}

		for sub in &layer.sub_allocations {
			if sub.id >= layer_id {
				return Err(LayeredCircuitError::ChildNotEarlier {
					layer_id,
					child_id: sub.id,
				});
			}
			let child = &self.circuits[sub.id];
			for a in &sub.allocations {
				let placements = [
					("input", a.input_offset, child.input_len, layer.input_len),
					("output", a.output_offset, child.output_len, layer.output_len),
				];
				for (which, offset, inner, outer) in placements {
					if offset % inner != 0 || offset + inner > outer {
						return Err(LayeredCircuitError::BadAllocation {
							layer_id,
							child_id: sub.id,
							which,
							offset,
						});
					}
				}
			}
		}
		Ok(())
	}
}

impl<F> LayeredCircuit<F> {
	/// Read and write masks of every compiled layer, indexed like `circuits`.
	///
	/// # Panics
	///
	/// On gate indices or allocations that [`Self::validate`] would reject.
	pub fn slot_masks(&self) -> Vec<SlotMasks> {
		let mut masks: Vec<SlotMasks> = Vec::with_capacity(self.circuits.len());
		for layer in &self.circuits {
			let layer_masks = SlotMasks::compute(layer, &masks);
			masks.push(layer_masks);
		}
		masks
	}
}

/// Input slots a compiled layer reads and output slots it writes, children included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMasks {
	#[allow(missing_docs)]
	pub read: Vec<bool>,
	#[allow(missing_docs)]
	pub written: Vec<bool>,
}

impl SlotMasks {
	/// `children` holds the masks of every earlier compiled layer.
	fn compute<F>(layer: &CompiledLayer<F>, children: &[SlotMasks]) -> Self {
		let mut read = vec![false; layer.input_len];
		let mut written = vec![false; layer.output_len];
		let reads = layer
			.muls
			.iter()
			.flat_map(|g| g.inputs)
			.chain(layer.adds.iter().map(|g| g.inputs[0]))
			.chain(layer.customs.iter().flat_map(|g| g.inputs.iter().copied()));
		for slot in reads {
			read[slot] = true;
		}
		let writes = layer
			.muls
			.iter()
			.map(|g| g.output)
			.chain(layer.adds.iter().map(|g| g.output))
			.chain(layer.csts.iter().map(|g| g.output))
			.chain(layer.customs.iter().map(|g| g.output));
		for slot in writes {
			written[slot] = true;
		}
		for sub in &layer.sub_allocations {
			let child = &children[sub.id];
			for a in &sub.allocations {
				for (j, &r) in child.read.iter().enumerate() {
					read[a.input_offset + j] |= r;
				}
				for (j, &w) in child.written.iter().enumerate() {
					written[a.output_offset + j] |= w;
				}
			}
		}
		Self { read, written }
	}
}
