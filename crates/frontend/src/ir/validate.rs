// Copyright 2025 Irreducible Inc.
use rustc_hash::{FxHashMap, FxHashSet};
use stratum_field::Field;

use super::{Circuit, Expression, Instruction, RootCircuit};
use crate::error::{Error, IrLocation};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
	InProgress,
	Done,
}

impl<F: Field> RootCircuit<F> {
	/// Checks the structural invariants every IR must satisfy.
	///
	/// Every referenced wire is allocated before it is read, sub-circuit calls refer to
	/// existing circuits with matching arities and form no cycle, public input indices are in
	/// range, the root has no outputs and every other circuit has at least one.
	pub fn validate(&self) -> Result<(), Error> {
		let Some(root) = self.root() else {
			return Err(Error::malformed(Self::ROOT_ID, IrLocation::Circuit, "missing root circuit"));
		};
		if !root.outputs.is_empty() {
			return Err(Error::malformed(
				Self::ROOT_ID,
				IrLocation::Circuit,
				"the root circuit must not have outputs",
			));
		}
		for (&id, circuit) in &self.circuits {
			if id != Self::ROOT_ID && circuit.outputs.is_empty() {
				return Err(Error::malformed(id, IrLocation::Circuit, "a sub-circuit needs outputs"));
			}
			self.validate_circuit(id, circuit)?;
		}
		self.topo_order()?;
		Ok(())
	}

	/// [`Self::validate`] plus the normal form established by
	/// [`Self::adjust_for_layering`].
	///
	/// Outputs are distinct single wires, constraints are single wires, sub-circuit inputs are
	/// distinct single wires and custom gate inputs are single wires.
	pub fn validate_for_layering(&self) -> Result<(), Error> {
		self.validate()?;
		for (&id, circuit) in &self.circuits {
			check_single_wires(id, &circuit.outputs, true, IrLocation::Output)?;
			check_single_wires(id, &circuit.constraints, false, IrLocation::Constraint)?;
			for (i, insn) in circuit.instructions.iter().enumerate() {
				match insn {
					Instruction::SubCircuitCall { inputs, .. } => {
						check_single_wires(id, inputs, true, |_| IrLocation::Instruction(i))?;
					}
					Instruction::CustomGate { inputs, .. } => {
						check_single_wires(id, inputs, false, |_| IrLocation::Instruction(i))?;
					}
					_ => {}
				}
			}
		}
		Ok(())
	}

	/// Ids of every circuit reachable from the root, callees before their callers.
	pub(crate) fn topo_order(&self) -> Result<Vec<usize>, Error> {
		let mut state = FxHashMap::default();
		let mut order = Vec::with_capacity(self.circuits.len());
		self.visit(Self::ROOT_ID, &mut state, &mut order)?;
		Ok(order)
	}

	fn visit(
		&self,
		id: usize,
		state: &mut FxHashMap<usize, Visit>,
		order: &mut Vec<usize>,
	) -> Result<(), Error> {
		match state.get(&id) {
			Some(Visit::Done) => return Ok(()),
			Some(Visit::InProgress) => {
				return Err(Error::malformed(id, IrLocation::Circuit, "recursive sub-circuit call"));
			}
			None => {}
		}
		let circuit = self
			.circuits
			.get(&id)
			.ok_or_else(|| Error::malformed(id, IrLocation::Circuit, "missing circuit"))?;
		state.insert(id, Visit::InProgress);
		for callee in circuit.callees() {
			self.visit(callee, state, order)?;
		}
		state.insert(id, Visit::Done);
		order.push(id);
		Ok(())
	}

	fn validate_circuit(&self, id: usize, circuit: &Circuit<F>) -> Result<(), Error> {
		let in_range = |exprs: &[Expression<F>], bound: usize| {
			exprs.iter().all(|e| e.vars().all(|v| v < bound))
		};
		for (i, (first_out, insn)) in circuit.instructions_with_outputs().enumerate() {
			let at = IrLocation::Instruction(i);
			if !in_range(insn.inputs(), first_out) {
				return Err(Error::malformed(id, at, "reads a wire that is not yet allocated"));
			}
			match insn {
				Instruction::SubCircuitCall {
					sub_circuit_id,
					inputs,
					num_outputs,
				} => {
					let callee = self.circuits.get(sub_circuit_id).ok_or_else(|| {
						Error::malformed(id, at, format!("calls missing circuit {sub_circuit_id}"))
					})?;
					if inputs.len() != callee.num_inputs || *num_outputs != callee.outputs.len() {
						return Err(Error::malformed(
							id,
							at,
							format!("arity does not match circuit {sub_circuit_id}"),
						));
					}
				}
				Instruction::Hint { num_outputs: 0, .. } => {
					return Err(Error::malformed(id, at, "a hint needs outputs"));
				}
				Instruction::PublicInput { index } if *index >= self.num_public_inputs => {
					return Err(Error::malformed(
						id,
						at,
						format!(
							"public input {index} out of range ({} public inputs)",
							self.num_public_inputs
						),
					));
				}
				_ => {}
			}
		}
		let num_wires = circuit.num_wires();
		for (i, c) in circuit.constraints.iter().enumerate() {
			if !in_range(std::slice::from_ref(c), num_wires) {
				return Err(Error::malformed(id, IrLocation::Constraint(i), "unallocated wire"));
			}
		}
		for (i, o) in circuit.outputs.iter().enumerate() {
			if !in_range(std::slice::from_ref(o), num_wires) {
				return Err(Error::malformed(id, IrLocation::Output(i), "unallocated wire"));
			}
		}
		Ok(())
	}
}

fn check_single_wires<F: Field>(
	circuit_id: usize,
	exprs: &[Expression<F>],
	distinct: bool,
	location: impl Fn(usize) -> IrLocation,
) -> Result<(), Error> {
	let mut seen = FxHashSet::default();
	for (i, e) in exprs.iter().enumerate() {
		let Some(vid) = e.as_single_var() else {
			return Err(Error::malformed(circuit_id, location(i), "expected a single wire"));
		};
		if distinct && !seen.insert(vid) {
			return Err(Error::malformed(circuit_id, location(i), format!("wire {vid} repeats")));
		}
	}
	Ok(())
}
