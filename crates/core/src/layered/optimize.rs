// Copyright 2025 Irreducible Inc.
//! Semantics-preserving simplification of a layered circuit.
//!
//! Two rewrites run until neither changes anything:
//!
//! - compiled layers that are never applied are dropped;
//! - a child layer placed at most once, or owning at most [`INLINE_GATE_LIMIT`] gates and
//!   placements, is spliced into its parents at every allocation.
//!
//! Afterwards every layer's gates are sorted and gates with identical ports and constant
//! coefficients are merged. Random and public-input coefficients are kept apart since every
//! gate draws its own sample.

use stratum_field::Field;

use super::{Allocation, Coef, CompiledLayer, Gate, GateCustom, LayeredCircuit, SubAllocation};

/// Children with at most this many gates and placements are always inlined.
pub const INLINE_GATE_LIMIT: usize = 4;

impl<F: Field> LayeredCircuit<F> {
	/// Simplifies the circuit in place. Returns whether anything changed.
	///
	/// The input and output vectors of every depth are preserved, so input slots and
	/// evaluation results stay the same.
	pub fn optimize(&mut self) -> bool {
		let before = (self.circuits.len(), self.num_gates());
		let mut changed = false;
		while self.inline_children() {
			changed = true;
		}
		for layer in &mut self.circuits {
			changed |= layer.dedup_gates();
		}
		tracing::debug!(
			compiled_layers_before = before.0,
			compiled_layers_after = self.circuits.len(),
			gates_before = before.1,
			gates_after = self.num_gates(),
			"optimized the layered circuit"
		);
		changed
	}

	fn num_gates(&self) -> usize {
		self.circuits.iter().map(CompiledLayer::num_own_gates).sum()
	}

	/// One round of dead layer removal and child inlining.
	fn inline_children(&mut self) -> bool {
		let n = self.circuits.len();
		let mut in_layers = vec![false; n];
		let mut uses = vec![0usize; n];
		for &id in &self.layers {
			in_layers[id] = true;
			uses[id] += 2;
		}
		// Children precede parents, so a parent's count is final before it is propagated.
		for id in (0..n).rev() {
			if uses[id] == 0 {
				continue;
			}
			for sub in &self.circuits[id].sub_allocations {
				uses[sub.id] += sub.allocations.len();
			}
		}
		let inline = (0..n)
			.map(|id| {
				let small = self.circuits[id].num_parts() <= INLINE_GATE_LIMIT;
				!in_layers[id] && uses[id] > 0 && (uses[id] <= 1 || small)
			})
			.collect::<Vec<_>>();
		if uses.iter().all(|&u| u > 0) && !inline.contains(&true) {
			return false;
		}

		// Rebuild bottom-up: an inlined child is already flat when its parents splice it.
		let mut rebuilt: Vec<CompiledLayer<F>> = Vec::with_capacity(n);
		for id in 0..n {
			let old = &self.circuits[id];
			if uses[id] == 0 {
				rebuilt.push(CompiledLayer::new(old.input_len, old.output_len));
				continue;
			}
			let mut layer = CompiledLayer {
				input_len: old.input_len,
				output_len: old.output_len,
				sub_allocations: Vec::new(),
				muls: old.muls.clone(),
				adds: old.adds.clone(),
				csts: old.csts.clone(),
				customs: old.customs.clone(),
			};
			for sub in &old.sub_allocations {
				if inline[sub.id] {
					for &at in &sub.allocations {
						layer.splice(&rebuilt[sub.id], at);
					}
				} else {
					layer.place(sub.id, sub.allocations.iter().copied());
				}
			}
			rebuilt.push(layer);
		}

		let mut new_id = vec![usize::MAX; n];
		let mut circuits = Vec::new();
		for (id, layer) in rebuilt.into_iter().enumerate() {
			if uses[id] > 0 && !inline[id] {
				new_id[id] = circuits.len();
				circuits.push(layer);
			}
		}
		for layer in &mut circuits {
			for sub in &mut layer.sub_allocations {
				sub.id = new_id[sub.id];
			}
		}
		for id in &mut self.layers {
			*id = new_id[*id];
		}
		tracing::trace!(
			dropped = uses.iter().filter(|&&u| u == 0).count(),
			inlined = inline.iter().filter(|&&i| i).count(),
			"inlined child layers"
		);
		self.circuits = circuits;
		true
	}
}

impl<F: Field> CompiledLayer<F> {
	/// Own gates plus child placements.
	fn num_parts(&self) -> usize {
		self.num_own_gates()
			+ self
				.sub_allocations
				.iter()
				.map(|sub| sub.allocations.len())
				.sum::<usize>()
	}

	fn place(&mut self, id: usize, allocations: impl IntoIterator<Item = Allocation>) {
		match self.sub_allocations.iter_mut().find(|sub| sub.id == id) {
			Some(sub) => sub.allocations.extend(allocations),
			None => self.sub_allocations.push(SubAllocation {
				id,
				allocations: allocations.into_iter().collect(),
			}),
		}
	}

	/// Copies `child`'s gates and placements into this layer at `at`.
	fn splice(&mut self, child: &Self, at: Allocation) {
		let (i, o) = (at.input_offset, at.output_offset);
		self.muls.extend(child.muls.iter().map(|g| shifted(g, i, o)));
		self.adds.extend(child.adds.iter().map(|g| shifted(g, i, o)));
		self.csts.extend(child.csts.iter().map(|g| shifted(g, i, o)));
		self.customs
			.extend(child.customs.iter().map(|g| GateCustom {
				gate_type: g.gate_type,
				inputs: g.inputs.iter().map(|x| x + i).collect(),
				output: g.output + o,
				coef: g.coef.clone(),
			}));
		for sub in &child.sub_allocations {
			self.place(
				sub.id,
				sub.allocations.iter().map(|a| Allocation {
					input_offset: a.input_offset + i,
					output_offset: a.output_offset + o,
				}),
			);
		}
	}

	/// Sorts the gates and merges constant-coefficient gates sharing their ports.
	///
	/// Returns whether any gate was merged.
	pub fn dedup_gates(&mut self) -> bool {
		let before = self.num_own_gates();
		dedup_by_ports(&mut self.muls, |g| (g.output, g.inputs.to_vec()));
		dedup_by_ports(&mut self.adds, |g| (g.output, g.inputs.to_vec()));
		dedup_by_ports(&mut self.csts, |g| (g.output, Vec::new()));
		self.customs.sort_by(|a, b| {
			(a.output, a.gate_type, &a.inputs).cmp(&(b.output, b.gate_type, &b.inputs))
		});
		let mut customs: Vec<GateCustom<F>> = Vec::with_capacity(self.customs.len());
		for g in self.customs.drain(..) {
			if let Coef::Constant(value) = g.coef {
				let same = customs
					.iter_mut()
					.rev()
					.take_while(|p| {
						p.output == g.output && p.gate_type == g.gate_type && p.inputs == g.inputs
					})
					.find(|p| matches!(p.coef, Coef::Constant(_)));
				if let Some(GateCustom {
					coef: Coef::Constant(acc),
					..
				}) = same
				{
					*acc += value;
					continue;
				}
			}
			customs.push(g);
		}
		self.customs = customs;
		self.num_own_gates() != before
	}
}

fn shifted<F: Clone, const N: usize>(g: &Gate<F, N>, i: usize, o: usize) -> Gate<F, N> {
	Gate {
		inputs: g.inputs.map(|x| x + i),
		output: g.output + o,
		coef: g.coef.clone(),
	}
}

fn dedup_by_ports<F: Field, const N: usize>(
	gates: &mut Vec<Gate<F, N>>,
	ports: impl Fn(&Gate<F, N>) -> (usize, Vec<usize>),
) {
	gates.sort_by_key(|g| ports(g));
	let mut merged: Vec<Gate<F, N>> = Vec::with_capacity(gates.len());
	for g in gates.drain(..) {
		if let Coef::Constant(value) = g.coef {
			let key = ports(&g);
			let same = merged
				.iter_mut()
				.rev()
				.take_while(|p| ports(p) == key)
				.find(|p| matches!(p.coef, Coef::Constant(_)));
			if let Some(Gate {
				coef: Coef::Constant(acc),
				..
			}) = same
			{
				*acc += value;
				continue;
			}
		}
		merged.push(g);
	}
	*gates = merged;
}
