// Copyright 2025 Irreducible Inc.
//! Gates between two adjacent layouts of one circuit.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use stratum_core::{Allocation, Coef, CompiledLayer, Gate, GateCustom, SubAllocation};
use stratum_field::Field;

use super::{
	Layering,
	inference::{CircuitInfo, Node},
	layout::{EMPTY, LayerLayout, Placement, SubLayout},
};
use crate::{error::Error, ir::Instruction};

/// Slots of the own nodes of a layout, keyed by node.
struct Slots {
	circuit_id: usize,
	layer: usize,
	size: usize,
	by_node: FxHashMap<usize, usize>,
}

impl Slots {
	fn new(info: &CircuitInfo, layout: &LayerLayout) -> Result<Self, Error> {
		let on_layer = &info.layer_nodes[layout.layer];
		let by_node = layout
			.own_slots()
			.into_iter()
			.map(|(slot, idx)| (on_layer[idx], slot))
			.collect::<FxHashMap<_, _>>();
		if let Some(&missing) = on_layer.iter().find(|node| !by_node.contains_key(node)) {
			return Err(Error::inconsistent(
				info.id,
				layout.layer,
				format!("node {missing} has no slot"),
			));
		}
		Ok(Self {
			circuit_id: info.id,
			layer: layout.layer,
			size: layout.size,
			by_node,
		})
	}

	fn get(&self, node: usize) -> Result<usize, Error> {
		self.by_node.get(&node).copied().ok_or_else(|| {
			Error::inconsistent(self.circuit_id, self.layer, format!("node {node} has no slot"))
		})
	}
}

impl<F: Field> Layering<'_, F> {
	/// The layout of `layer` of the callee as seen through the caller nodes of `pairs`.
	///
	/// This is the callee's own layout of the layer when the caller placed the nodes exactly as
	/// that layout does at an aligned offset. Otherwise it is the smallest aligned window of
	/// `slots` holding the nodes.
	fn embed(
		&mut self,
		slots: &Slots,
		pairs: impl Iterator<Item = (usize, usize)>,
		callee: &CircuitInfo,
		layer: usize,
		call: usize,
	) -> Result<SubLayout, Error> {
		let entries = pairs
			.map(|(node, callee_node)| {
				let idx = callee.index_of(layer, callee_node).ok_or_else(|| {
					Error::inconsistent(callee.id, layer, format!("node {callee_node} is not on the layer"))
				})?;
				Ok((slots.get(node)?, idx))
			})
			.collect::<Result<Vec<_>, Error>>()?;

		let own = self.solve_layout(callee.id, layer)?;
		if let Placement::Dense(placement) = &self.layouts.get(own).placement {
			let size = placement.len();
			let offset = entries.first().and_then(|&(slot, idx)| {
				let at = placement.iter().position(|&i| i == idx)?;
				slot.checked_sub(at)
			});
			// Every slot of the reused layout must be one of the paired nodes.
			let covered = placement.iter().filter(|&&idx| idx != EMPTY).count() == entries.len();
			let matches = offset.is_some_and(|offset| {
				covered
					&& offset % size == 0
					&& offset + size <= slots.size
					&& entries
						.iter()
						.all(|&(slot, idx)| slot >= offset && placement.get(slot - offset) == Some(&idx))
			});
			if let (true, Some(offset)) = (matches, offset) {
				return Ok(SubLayout {
					id: own,
					offset,
					call,
				});
			}
		}

		let lo = entries.iter().map(|&(slot, _)| slot).min().unwrap_or(0);
		let hi = entries.iter().map(|&(slot, _)| slot).max().unwrap_or(0);
		let size = match lo ^ hi {
			0 => 1,
			diff => 1 << (usize::BITS - diff.leading_zeros()),
		};
		let offset = lo & !(size - 1);
		let mut placement = vec![EMPTY; size];
		for (slot, idx) in entries {
			placement[slot - offset] = idx;
		}
		let id = self.layouts.add(&LayerLayout {
			circuit_id: callee.id,
			layer,
			size,
			placement: Placement::Dense(placement),
		});
		Ok(SubLayout { id, offset, call })
	}

	/// Compiles the step from layout `a` to layout `b` and returns the compiled layer id.
	pub(super) fn connect(&mut self, a: usize, b: usize) -> Result<usize, Error> {
		if let Some(&id) = self.connected.get(&(a, b)) {
			return Ok(id);
		}
		let (la, lb) = (self.layouts.get(a).clone(), self.layouts.get(b).clone());
		let (circuit_id, cur, next) = (la.circuit_id, la.layer, lb.layer);
		if lb.circuit_id != circuit_id || next != cur + 1 {
			return Err(Error::inconsistent(
				circuit_id,
				cur,
				format!("cannot connect to layer {next} of circuit {}", lb.circuit_id),
			));
		}
		let (rc, infos) = (self.rc, self.infos);
		let info = &infos[&circuit_id];
		let circuit = &rc.circuits[&circuit_id];
		let from = Slots::new(info, &la)?;
		let to = Slots::new(info, &lb)?;
		let mut layer = CompiledLayer::new(la.size, lb.size);
		let one = Coef::Constant(F::ONE);

		let mut children = BTreeMap::<usize, Vec<Allocation>>::new();
		let mut entered = FxHashMap::default();
		for (call_idx, call) in info.calls.iter().enumerate() {
			if !call.live || call.start > cur || call.end < next {
				continue;
			}
			let callee = &infos[&call.callee];
			let input = if call.start == cur {
				self.embed(&from, call.entry(callee), callee, 0, call_idx)?
			} else {
				la.sub(call_idx).cloned().ok_or_else(|| {
					Error::inconsistent(circuit_id, cur, format!("call #{} is not embedded", call.insn))
				})?
			};
			let output = if call.end == next {
				self.embed(&to, call.exit(callee), callee, callee.output_layer, call_idx)?
			} else {
				lb.sub(call_idx).cloned().ok_or_else(|| {
					Error::inconsistent(circuit_id, next, format!("call #{} is not embedded", call.insn))
				})?
			};
			let child = self.connect(input.id, output.id)?;
			children.entry(child).or_default().push(Allocation {
				input_offset: input.offset,
				output_offset: output.offset,
			});
			entered.insert(call_idx, input);
		}
		layer.sub_allocations = children
			.into_iter()
			.map(|(id, allocations)| SubAllocation { id, allocations })
			.collect();

		for &x in &info.layer_nodes[next] {
			let out = to.get(x)?;
			if info.min_layer[x] < next {
				layer.adds.push(Gate {
					inputs: [from.get(x)?],
					output: out,
					coef: one.clone(),
				});
				continue;
			}
			match info.nodes[x] {
				Node::Internal { insn } => {
					let Some(Instruction::InternalVariable { expr }) = circuit.instructions.get(insn) else {
						return Err(Error::inconsistent(circuit_id, next, format!("node {x} is not a variable")));
					};
					for term in expr.terms() {
						let coef = Coef::Constant(term.coef);
						match term.degree() {
							0 => layer.csts.push(Gate {
								inputs: [],
								output: out,
								coef,
							}),
							1 => layer.adds.push(Gate {
								inputs: [from.get(term.vid0)?],
								output: out,
								coef,
							}),
							_ => layer.muls.push(Gate {
								inputs: [from.get(term.vid0)?, from.get(term.vid1)?],
								output: out,
								coef,
							}),
						}
					}
				}
				Node::Random => layer.csts.push(Gate {
					inputs: [],
					output: out,
					coef: Coef::Random,
				}),
				Node::PublicInput { index } => layer.csts.push(Gate {
					inputs: [],
					output: out,
					coef: Coef::PublicInput(index),
				}),
				Node::Custom { insn } => {
					let Some(Instruction::CustomGate { gate_type, inputs }) = circuit.instructions.get(insn)
					else {
						return Err(Error::inconsistent(circuit_id, next, format!("node {x} is not a custom gate")));
					};
					let inputs = inputs
						.iter()
						.map(|e| {
							e.as_single_var()
								.ok_or_else(|| Error::inconsistent(circuit_id, next, "custom gate input is not a wire"))
								.and_then(|wire| from.get(wire))
						})
						.collect::<Result<Vec<_>, _>>()?;
					layer.customs.push(GateCustom {
						gate_type: *gate_type,
						inputs,
						output: out,
						coef: one.clone(),
					});
				}
				// Written by the callee.
				Node::CallOutput { .. } => {}
				Node::Combined => {}
				_ => {
					return Err(Error::inconsistent(
						circuit_id,
						next,
						format!("node {x} cannot first appear on layer {next}"),
					));
				}
			}
		}

		if let Some(combined) = info.combined.get(next).and_then(Option::as_ref) {
			let out = to.get(combined.node)?;
			for &wire in &combined.wires {
				layer.adds.push(Gate {
					inputs: [from.get(wire)?],
					output: out,
					coef: Coef::Random,
				});
			}
			if let Some(prev) = combined.chained {
				layer.adds.push(Gate {
					inputs: [from.get(prev)?],
					output: out,
					coef: one.clone(),
				});
			}
			for &call_idx in &combined.calls {
				let call = &info.calls[call_idx];
				let callee = &infos[&call.callee];
				let callee_layer = cur - call.start;
				let slot = entered
					.get(&call_idx)
					.and_then(|sub: &SubLayout| {
						let node = callee.combined.get(callee_layer)?.as_ref()?.node;
						let idx = callee.index_of(callee_layer, node)?;
						Some(sub.offset + self.layouts.get(sub.id).slot_of(idx)?)
					})
					.ok_or_else(|| {
						Error::inconsistent(
							circuit_id,
							cur,
							format!("combined constraint of call #{} is not placed", call.insn),
						)
					})?;
				layer.adds.push(Gate {
					inputs: [slot],
					output: out,
					coef: one.clone(),
				});
			}
		}

		let id = self.compiled.len();
		self.compiled.push(layer);
		self.connected.insert((a, b), id);
		Ok(id)
	}
}
