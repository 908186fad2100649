// Copyright 2025 Irreducible Inc.
//! The layering compiler: turns an IR in layering normal form into a [`LayeredCircuit`].
//!
//! Circuits are processed callees first. For each one, [`inference`] assigns every wire the
//! range of layers it must be available on. Layouts are then solved top-down from the root:
//! a layer of a caller embeds the layers of the calls straddling it at aligned offsets, and
//! [`wire`] emits the gates between every pair of adjacent layouts, recursing into the
//! embedded calls. Both layouts and compiled layers are shared between identical calls.

use rustc_hash::FxHashMap;
use stratum_core::{CompiledLayer, LayeredCircuit};
use stratum_field::Field;
use stratum_utils::Pool;

use crate::{error::Error, ir::RootCircuit};

mod inference;
mod input_order;
mod layout;
mod wire;

use inference::CircuitInfo;
pub use input_order::{HintSlots, InputOrder};
use layout::LayerLayout;

pub(crate) struct Layering<'a, F> {
	rc: &'a RootCircuit<F>,
	infos: &'a FxHashMap<usize, CircuitInfo>,
	layouts: Pool<LayerLayout>,
	/// Layout id of every solved `(circuit, layer)`.
	solved: FxHashMap<(usize, usize), usize>,
	/// Compiled layer id of every connected pair of layouts.
	connected: FxHashMap<(usize, usize), usize>,
	compiled: Vec<CompiledLayer<F>>,
}

/// Compiles `rc`, which must pass [`RootCircuit::validate_for_layering`].
///
/// Returns the layered circuit and the slots its layer-0 vector assigns to the root inputs
/// and to every hint output.
pub fn layer_circuit<F: Field>(
	rc: &RootCircuit<F>,
) -> Result<(LayeredCircuit<F>, InputOrder), Error> {
	let root_id = RootCircuit::<F>::ROOT_ID;
	let mut infos = FxHashMap::default();
	for id in rc.topo_order()? {
		let info = CircuitInfo::analyze(id, &rc.circuits[&id], &infos, id == root_id)?;
		infos.insert(id, info);
	}
	let root = &infos[&root_id];

	let mut layering = Layering {
		rc,
		infos: &infos,
		layouts: Pool::default(),
		solved: FxHashMap::default(),
		connected: FxHashMap::default(),
		compiled: Vec::new(),
	};
	let layouts = (0..=root.output_layer)
		.map(|layer| layering.solve_layout(root_id, layer))
		.collect::<Result<Vec<_>, _>>()?;
	let layers = layouts
		.windows(2)
		.map(|pair| layering.connect(pair[0], pair[1]))
		.collect::<Result<Vec<_>, _>>()?;

	// The satisfaction check reads the final combined constraint from slot 0.
	let last = layering.layouts.get(layouts[root.output_layer]);
	let final_slot = root
		.combined
		.get(root.output_layer)
		.and_then(Option::as_ref)
		.and_then(|combined| root.index_of(root.output_layer, combined.node))
		.and_then(|idx| last.slot_of(idx));
	if final_slot != Some(0) || last.size != 1 {
		return Err(Error::inconsistent(
			root_id,
			root.output_layer,
			"the output layer must hold exactly the combined constraint",
		));
	}

	let input_order = InputOrder::record(rc, &infos, layering.layouts.get(layouts[0]))?;
	tracing::debug!(
		depth = layers.len(),
		num_layouts = layering.layouts.len(),
		num_compiled_layers = layering.compiled.len(),
		input_len = input_order.input_len,
		"layered the circuit"
	);
	Ok((
		LayeredCircuit {
			num_public_inputs: rc.num_public_inputs,
			num_actual_outputs: 1,
			expected_num_output_zeroes: 1,
			circuits: layering.compiled,
			layers,
		},
		input_order,
	))
}

#[cfg(test)]
mod tests {
	use rand::{SeedableRng, rngs::StdRng};
	use stratum_core::NoCustomGates;
	use stratum_field::{Field, M31};

	use super::*;
	use crate::{
		CircuitBuilder,
		ir::{Circuit, Expression, Instruction},
	};

	fn layer(rc: &RootCircuit<M31>) -> (LayeredCircuit<M31>, InputOrder) {
		let adjusted = rc.adjust_for_layering();
		adjusted.validate_for_layering().unwrap();
		let (circuit, order) = layer_circuit(&adjusted).unwrap();
		circuit.validate().unwrap();
		(circuit, order)
	}

	fn layer_zero(order: &InputOrder, inputs: &[u32]) -> Vec<M31> {
		let mut values = vec![M31::ZERO; order.input_len];
		for (&slot, &value) in order.inputs.iter().zip(inputs) {
			values[slot] = M31::new(value);
		}
		values
	}

	fn satisfied(circuit: &LayeredCircuit<M31>, inputs: &[M31]) -> bool {
		let mut rng = StdRng::seed_from_u64(7);
		let out = circuit
			.evaluate(inputs, &[], &mut rng, &NoCustomGates)
			.unwrap();
		circuit.is_satisfied_by(&out)
	}

	#[test]
	fn test_product_check() {
		let b = CircuitBuilder::<M31>::new();
		let x = b.add_input();
		let y = b.add_input();
		let z = b.add_input();
		let xy = b.mul(x, y);
		b.assert_is_equal(xy, z);
		let (circuit, order) = layer(&b.build().unwrap());
		assert_eq!(circuit.output_len(), 1);
		assert!(order.hints.is_empty());
		assert!(satisfied(&circuit, &layer_zero(&order, &[3, 5, 15])));
		assert!(!satisfied(&circuit, &layer_zero(&order, &[3, 5, 16])));
	}

	#[test]
	fn test_wires_are_relayed_across_layers() {
		let b = CircuitBuilder::<M31>::new();
		let x = b.add_input();
		let y = b.add_input();
		let x2 = b.mul(x, x);
		let x4 = b.mul(x2, x2);
		let x8 = b.mul(x4, x4);
		let sum = b.add(x8, x);
		b.assert_is_equal(sum, y);
		let (circuit, order) = layer(&b.build().unwrap());
		assert!(circuit.depth() >= 4);
		// 2^8 + 2 = 258
		assert!(satisfied(&circuit, &layer_zero(&order, &[2, 258])));
		assert!(!satisfied(&circuit, &layer_zero(&order, &[2, 257])));
	}

	#[test]
	fn test_identical_calls_share_compiled_layers() {
		let b = CircuitBuilder::<M31>::new();
		let inputs = (0..4).map(|_| b.add_input()).collect::<Vec<_>>();
		let square = |b: &CircuitBuilder<M31>, v: crate::Variable| {
			b.memorized_call("square", &v, &(), |b, v| b.mul(v, v))
		};
		let a = square(&b, inputs[0]);
		let c = square(&b, inputs[1]);
		let sum = b.add(a, c);
		b.assert_is_equal(sum, inputs[2]);
		b.assert_is_zero(inputs[3]);
		let rc = b.build().unwrap();
		assert_eq!(rc.circuits.len(), 2);
		let (circuit, order) = layer(&rc);
		let shared = circuit
			.circuits
			.iter()
			.flat_map(|layer| &layer.sub_allocations)
			.find(|sub| sub.allocations.len() == 2);
		assert!(shared.is_some());
		assert!(satisfied(&circuit, &layer_zero(&order, &[3, 4, 25, 0])));
		assert!(!satisfied(&circuit, &layer_zero(&order, &[3, 4, 25, 1])));
	}

	#[test]
	fn test_argument_order_does_not_split_compiled_layers() {
		const CALLS: usize = 8;
		let b = CircuitBuilder::<M31>::new();
		let x = (0..2 * CALLS).map(|_| b.add_input()).collect::<Vec<_>>();
		let expected = (0..CALLS).map(|_| b.add_input()).collect::<Vec<_>>();
		for i in 0..CALLS {
			// Odd calls pass the later wire first.
			let args = if i % 2 == 0 {
				[x[2 * i], x[2 * i + 1]]
			} else {
				[x[2 * i + 1], x[2 * i]]
			};
			let out = b.memorized_call("square_plus", &args, &(), |b, [a, c]| {
				let a2 = b.mul(a, a);
				b.add(a2, c)
			});
			b.assert_is_equal(out, expected[i]);
		}
		let rc = b.build().unwrap();
		assert_eq!(rc.circuits.len(), 2);
		let (circuit, order) = layer(&rc);

		let first = &circuit.circuits[circuit.layers[0]];
		assert_eq!(first.sub_allocations.len(), 1);
		assert_eq!(first.sub_allocations[0].allocations.len(), CALLS);

		let values = (1..=2 * CALLS as u32).collect::<Vec<_>>();
		let sums = (0..CALLS).map(|i| {
			let (a, c) = if i % 2 == 0 {
				(values[2 * i], values[2 * i + 1])
			} else {
				(values[2 * i + 1], values[2 * i])
			};
			a * a + c
		});
		let mut inputs = values.clone();
		inputs.extend(sums);
		assert!(satisfied(&circuit, &layer_zero(&order, &inputs)));
		inputs[2 * CALLS + 1] += 1;
		assert!(!satisfied(&circuit, &layer_zero(&order, &inputs)));
	}

	#[test]
	fn test_random_and_public_coefficients() {
		// w2 = random, w3 = public input 0, w4 = w1·w2 - w3·w2, constraint w4
		let v = Expression::<M31>::var;
		let root = Circuit {
			num_inputs: 1,
			instructions: vec![
				Instruction::GetRandom,
				Instruction::PublicInput { index: 0 },
				Instruction::InternalVariable {
					expr: &(&v(1) * &v(2)) - &(&v(3) * &v(2)),
				},
			],
			constraints: vec![v(4)],
			outputs: vec![],
		};
		let mut rc = RootCircuit {
			num_public_inputs: 1,
			..RootCircuit::default()
		};
		rc.circuits.insert(0, root);
		let (circuit, order) = layer(&rc);
		let mut rng = StdRng::seed_from_u64(1);
		let inputs = layer_zero(&order, &[9]);
		let out = circuit
			.evaluate(&inputs, &[M31::new(9)], &mut rng, &NoCustomGates)
			.unwrap();
		assert!(circuit.is_satisfied_by(&out));
		let out = circuit
			.evaluate(&inputs, &[M31::new(8)], &mut rng, &NoCustomGates)
			.unwrap();
		assert!(!circuit.is_satisfied_by(&out));
	}

	#[test]
	fn test_unconstrained_root_is_malformed() {
		let b = CircuitBuilder::<M31>::new();
		let x = b.add_input();
		let _ = b.mul(x, x);
		let rc = b.build().unwrap().adjust_for_layering();
		assert!(matches!(layer_circuit(&rc), Err(Error::IrMalformed { .. })));
	}
}
