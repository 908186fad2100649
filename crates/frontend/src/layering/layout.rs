// Copyright 2025 Irreducible Inc.
//! Placement of the nodes of one layer into a power-of-two slot vector.

use std::{cmp::Reverse, collections::BTreeMap};

use rustc_hash::FxHashMap;
use stratum_field::Field;

use super::Layering;
use crate::error::Error;

/// Marks a slot holding no node.
pub(super) const EMPTY: usize = usize::MAX;

/// The layout of a straddling call embedded in its caller's layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct SubLayout {
	pub id: usize,
	pub offset: usize,
	/// Index of the call among the caller's calls.
	pub call: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) enum Placement {
	/// Slot to position in the layer's node list, [`EMPTY`] for free slots.
	Dense(Vec<usize>),
	/// Own nodes by slot, plus the layouts of calls straddling the layer.
	Sparse {
		slots: BTreeMap<usize, usize>,
		subs: Vec<SubLayout>,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct LayerLayout {
	pub circuit_id: usize,
	pub layer: usize,
	pub size: usize,
	pub placement: Placement,
}

impl LayerLayout {
	/// `(slot, node position)` of every own node.
	pub fn own_slots(&self) -> Vec<(usize, usize)> {
		match &self.placement {
			Placement::Dense(slots) => slots
				.iter()
				.enumerate()
				.filter(|(_, idx)| **idx != EMPTY)
				.map(|(slot, &idx)| (slot, idx))
				.collect(),
			Placement::Sparse { slots, .. } => slots.iter().map(|(&slot, &idx)| (slot, idx)).collect(),
		}
	}

	/// The slot of the node at position `idx` of the layer's node list.
	pub fn slot_of(&self, idx: usize) -> Option<usize> {
		self.own_slots()
			.into_iter()
			.find_map(|(slot, i)| (i == idx).then_some(slot))
	}

	pub fn sub(&self, call: usize) -> Option<&SubLayout> {
		match &self.placement {
			Placement::Dense(_) => None,
			Placement::Sparse { subs, .. } => subs.iter().find(|sub| sub.call == call),
		}
	}
}

/// Packs power-of-two `slabs` and `loose` entries into one power-of-two vector.
///
/// Slabs are placed largest first at the lowest aligned offset where their occupied slots
/// land on free ones, or appended. Loose entries fill the remaining gaps in order.
pub(super) fn merge_layouts(mut slabs: Vec<Vec<usize>>, loose: &[usize]) -> Vec<usize> {
	slabs.sort_by_key(|slab| Reverse(slab.len()));
	let mut res: Vec<usize> = Vec::new();
	for slab in &slabs {
		debug_assert!(slab.len().is_power_of_two());
		let offset = (0..res.len()).step_by(slab.len()).find(|&offset| {
			slab.iter()
				.zip(&res[offset..offset + slab.len()])
				.all(|(&s, &r)| s == EMPTY || r == EMPTY)
		});
		match offset {
			Some(offset) => {
				for (i, &s) in slab.iter().enumerate() {
					if s != EMPTY {
						res[offset + i] = s;
					}
				}
			}
			None => res.extend_from_slice(slab),
		}
	}
	let mut loose = loose.iter().copied();
	for slot in res.iter_mut().filter(|slot| **slot == EMPTY) {
		match loose.next() {
			Some(idx) => *slot = idx,
			None => break,
		}
	}
	res.extend(loose);
	res.resize(res.len().next_power_of_two(), EMPTY);
	res
}

impl<F: Field> Layering<'_, F> {
	/// Lays out `layer` of circuit `circuit_id` and returns the layout id.
	pub(super) fn solve_layout(&mut self, circuit_id: usize, layer: usize) -> Result<usize, Error> {
		if let Some(&id) = self.solved.get(&(circuit_id, layer)) {
			return Ok(id);
		}
		let infos = self.infos;
		let info = &infos[&circuit_id];

		let mut middle = Vec::new();
		let mut starting = Vec::new();
		let mut ending = Vec::new();
		for (call_idx, call) in info.calls.iter().enumerate().filter(|(_, call)| call.live) {
			if call.start == layer {
				let callee = &infos[&call.callee];
				let id = self.solve_layout(call.callee, 0)?;
				let Placement::Dense(slots) = &self.layouts.get(id).placement else {
					return Err(Error::inconsistent(call.callee, 0, "the input layer embeds a call"));
				};
				// Rename the callee's input layout into caller nodes.
				let caller_node = call
					.entry(callee)
					.map(|(node, callee_node)| (callee_node, node))
					.collect::<FxHashMap<_, _>>();
				let renamed = slots
					.iter()
					.map(|&idx| {
						if idx == EMPTY {
							return Some(EMPTY);
						}
						let node = callee.layer_nodes[0][idx];
						caller_node.get(&node).and_then(|&x| info.index_of(layer, x))
					})
					.collect::<Option<Vec<_>>>();
				// Otherwise the inputs in argument order; the entry window is then cut from the
				// caller's layout instead.
				let slab = renamed.unwrap_or_else(|| {
					let mut slab = call
						.entry(callee)
						.filter_map(|(node, _)| info.index_of(layer, node))
						.collect::<Vec<_>>();
					slab.resize(slab.len().next_power_of_two(), EMPTY);
					slab
				});
				starting.push((call_idx, slab));
			}
			if call.start < layer && layer < call.end {
				let id = self.solve_layout(call.callee, layer - call.start)?;
				middle.push((call_idx, id));
			} else if call.end == layer {
				let callee = &infos[&call.callee];
				let id = self.solve_layout(call.callee, callee.output_layer)?;
				let Placement::Dense(slots) = &self.layouts.get(id).placement else {
					return Err(Error::inconsistent(
						call.callee,
						callee.output_layer,
						"the output layer embeds a call",
					));
				};
				// Rename the callee's output layout into caller nodes.
				let slab = slots
					.iter()
					.map(|&idx| {
						if idx == EMPTY {
							return Ok(EMPTY);
						}
						let node = callee.layer_nodes[callee.output_layer][idx];
						callee
							.output_position(node)
							.and_then(|k| info.index_of(layer, call.outputs.start + k))
							.ok_or_else(|| {
								Error::inconsistent(
									call.callee,
									callee.output_layer,
									format!("node {node} is not an output"),
								)
							})
					})
					.collect::<Result<Vec<_>, _>>()?;
				ending.push((call_idx, slab));
			}
		}

		let own = self.group_placement(circuit_id, layer, starting, ending)?;
		let placement = if middle.is_empty() {
			Placement::Dense(own)
		} else {
			let mut parts = Vec::with_capacity(middle.len() + 1);
			parts.push((own.len(), None));
			for &(call, id) in &middle {
				parts.push((self.layouts.get(id).size, Some((call, id))));
			}
			parts.sort_by_key(|&(size, _)| Reverse(size));
			let mut slots = BTreeMap::new();
			let mut subs = Vec::new();
			let mut offset = 0;
			for (size, part) in parts {
				match part {
					Some((call, id)) => subs.push(SubLayout { id, offset, call }),
					None => {
						if own.iter().all(|&idx| idx == EMPTY) {
							continue;
						}
						for (i, &idx) in own.iter().enumerate() {
							if idx != EMPTY {
								slots.insert(offset + i, idx);
							}
						}
					}
				}
				offset += size;
			}
			Placement::Sparse { slots, subs }
		};
		let size = match &placement {
			Placement::Dense(slots) => slots.len(),
			Placement::Sparse { slots, subs } => slots
				.keys()
				.map(|&slot| slot + 1)
				.chain(subs.iter().map(|sub| sub.offset + self.layouts.get(sub.id).size))
				.max()
				.unwrap_or(1)
				.next_power_of_two(),
		};
		let id = self.layouts.add(&LayerLayout {
			circuit_id,
			layer,
			size,
			placement,
		});
		self.solved.insert((circuit_id, layer), id);
		Ok(id)
	}

	/// Dense placement of the own nodes of a layer.
	///
	/// `starting` holds the input layout of every call starting on the layer and `ending` the
	/// output layout of every call ending on it, both renamed into node positions. An input
	/// layout is kept verbatim when its nodes are free and share a group, so that every call of
	/// a callee reads the same window. Otherwise the inputs of the call are still kept together
	/// in a group when they do not split an existing group and take whole output slabs of calls
	/// ending here.
	fn group_placement(
		&self,
		circuit_id: usize,
		layer: usize,
		starting: Vec<(usize, Vec<usize>)>,
		ending: Vec<(usize, Vec<usize>)>,
	) -> Result<Vec<usize>, Error> {
		let info = &self.infos[&circuit_id];
		let num_nodes = info.layer_nodes[layer].len();
		let position = |node: usize| {
			info.index_of(layer, node).ok_or_else(|| {
				Error::inconsistent(circuit_id, layer, format!("node {node} is not on the layer"))
			})
		};

		let mut from_call = vec![None; num_nodes];
		for (k, (call, _)) in ending.iter().enumerate() {
			for wire in info.calls[*call].outputs.clone() {
				from_call[position(wire)?] = Some(k);
			}
		}

		let mut requests = starting
			.into_iter()
			.map(|(call_idx, slab)| {
				let members = slab.iter().copied().filter(|&idx| idx != EMPTY).collect::<Vec<_>>();
				(call_idx, members, slab)
			})
			.collect::<Vec<_>>();
		requests.sort_by_key(|(call_idx, members, _)| (Reverse(members.len()), *call_idx));

		let mut group = vec![0usize; num_nodes];
		let mut parent = vec![0usize];
		let mut fixed = vec![false; num_nodes];
		let mut entry_slabs = Vec::new();
		for (_, members, slab) in requests {
			let Some(&first) = members.first() else {
				continue;
			};
			let g = group[first];
			if members.iter().any(|&m| group[m] != g || fixed[m]) {
				continue;
			}
			if members.iter().all(|&m| from_call[m].is_none()) {
				members.iter().for_each(|&m| fixed[m] = true);
				entry_slabs.push((g, slab));
				continue;
			}
			let mut taken = FxHashMap::<usize, usize>::default();
			for &m in &members {
				if let Some(k) = from_call[m] {
					*taken.entry(k).or_default() += 1;
				}
			}
			let splits_a_slab = taken
				.iter()
				.any(|(&k, &count)| count != info.calls[ending[k].0].outputs.len());
			if splits_a_slab {
				continue;
			}
			let new = parent.len();
			parent.push(g);
			members.iter().for_each(|&m| group[m] = new);
		}

		let num_groups = parent.len();
		let mut loose = vec![Vec::new(); num_groups];
		let mut slabs = vec![Vec::new(); num_groups];
		for idx in 0..num_nodes {
			if from_call[idx].is_none() && !fixed[idx] {
				loose[group[idx]].push(idx);
			}
		}
		for (call, slab) in ending {
			let wire = info.calls[call].outputs.start;
			slabs[group[position(wire)?]].push(slab);
		}
		for (g, slab) in entry_slabs {
			slabs[g].push(slab);
		}
		// Children are created after their parent, so a reverse sweep sees them first.
		for g in (1..num_groups).rev() {
			let placed = merge_layouts(std::mem::take(&mut slabs[g]), &loose[g]);
			slabs[parent[g]].push(placed);
		}
		Ok(merge_layouts(std::mem::take(&mut slabs[0]), &loose[0]))
	}
}
