// Copyright 2025 Irreducible Inc.
//! Recording circuits into the IR.

use std::{
	cell::{RefCell, RefMut},
	collections::BTreeMap,
	rc::Rc,
};

use cranelift_entity::{PrimaryMap, entity_impl};
use rustc_hash::FxHashMap;
use stratum_field::Field;

use crate::{
	Error, Options,
	ir::{Circuit, Expression, Instruction, RootCircuit, Term},
};

mod constraints;
mod ops;
mod sub_circuit;
mod variables;

use constraints::ConstraintSet;
pub use variables::Variables;

/// Handle to a value of the circuit under construction.
///
/// A variable stands for an arbitrary quadratic expression over the wires of the circuit it
/// was created in; the builder decides when it is materialized into a wire of its own.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Variable(u32);
entity_impl!(Variable);

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
struct FrameId(u32);
entity_impl!(FrameId);

struct VarData<F> {
	frame: FrameId,
	expr: Expression<F>,
}

/// A circuit being recorded.
///
/// Wire ids are provisional: root inputs may be declared at any time, so they are moved in
/// front of every other wire when the frame is turned into a [`Circuit`].
pub(crate) struct Frame<F> {
	/// Provisional ids of the inputs, in declaration order.
	inputs: Vec<usize>,
	instructions: Vec<Instruction<F>>,
	/// Estimated layer of every provisional wire id. Wire 0 sits at layer 0, inputs at 1.
	layers: Vec<usize>,
	/// Expressions already materialized, normalized to carry no constant and a leading
	/// coefficient of one.
	hoisted: FxHashMap<Expression<F>, usize>,
	pub(crate) constraints: ConstraintSet<F>,
	is_root: bool,
}

impl<F: Field> Frame<F> {
	fn new(is_root: bool) -> Self {
		Self {
			inputs: Vec::new(),
			instructions: Vec::new(),
			layers: vec![0],
			hoisted: FxHashMap::default(),
			constraints: ConstraintSet::default(),
			is_root,
		}
	}

	fn alloc(&mut self, n: usize, layer: usize) -> usize {
		let first = self.layers.len();
		self.layers.resize(first + n, layer);
		first
	}

	fn add_input(&mut self) -> usize {
		let id = self.alloc(1, 1);
		self.inputs.push(id);
		id
	}

	/// Records `insn` and returns the id of its first output.
	fn push(&mut self, insn: Instruction<F>, layer: usize) -> usize {
		let first = self.alloc(insn.num_outputs(), layer);
		self.instructions.push(insn);
		first
	}

	pub(crate) fn layer_of(&self, expr: &Expression<F>) -> usize {
		expr.vars().map(|v| self.layers[v]).max().unwrap_or(0).max(1)
	}

	/// Difference between the deepest and the shallowest wire the expression reads.
	pub(crate) fn layer_span(&self, expr: &Expression<F>) -> usize {
		let (min, max) = expr
			.vars()
			.map(|v| self.layers[v])
			.fold((usize::MAX, 0), |(lo, hi), l| (lo.min(l), hi.max(l)));
		max.saturating_sub(min)
	}

	/// Rewrites `expr` as `c · w + k` for a wire `w`, materializing `w` unless an equivalent
	/// expression was materialized before. Constants and scaled wires are returned unchanged.
	pub(crate) fn hoist(&mut self, expr: &Expression<F>) -> Expression<F> {
		let (constant, rest): (Vec<Term<F>>, Vec<Term<F>>) =
			expr.terms().iter().partition(|t| t.degree() == 0);
		match rest.as_slice() {
			[] => return expr.clone(),
			[t] if t.degree() == 1 => return expr.clone(),
			_ => {}
		}
		let lead = rest[0].coef;
		let inv = lead
			.invert()
			.expect("canonical expressions carry no zero coefficient");
		let normalized = Expression::from_terms(rest.iter().map(|t| Term {
			coef: t.coef * inv,
			..*t
		}));
		let wire = match self.hoisted.get(&normalized) {
			Some(&wire) => wire,
			None => {
				let layer = self.layer_of(&normalized) + 1;
				let wire = self.push(
					Instruction::InternalVariable {
						expr: normalized.clone(),
					},
					layer,
				);
				self.hoisted.insert(normalized, wire);
				wire
			}
		};
		Expression::from_terms(
			constant
				.into_iter()
				.chain(std::iter::once(Term::linear(wire, lead))),
		)
	}

	/// Lowers the recorded assertions and renumbers the wires so inputs come first.
	fn into_circuit(mut self, outputs: Vec<Expression<F>>) -> Circuit<F> {
		let constraints = self.lower_constraints();

		let mut map = vec![0; self.layers.len()];
		for (i, &wire) in self.inputs.iter().enumerate() {
			map[wire] = i + 1;
		}
		let mut next = self.inputs.len() + 1;
		for slot in map.iter_mut().skip(1) {
			if *slot == 0 {
				*slot = next;
				next += 1;
			}
		}
		let rename = |e: &Expression<F>| e.map_vars(|v| map[v]);
		Circuit {
			num_inputs: self.inputs.len(),
			instructions: self
				.instructions
				.iter()
				.map(|insn| insn.map_inputs(rename))
				.collect(),
			constraints: constraints.iter().map(rename).collect(),
			outputs: outputs.iter().map(rename).collect(),
		}
	}
}

pub(crate) struct Shared<F> {
	opts: Options,
	vars: PrimaryMap<Variable, VarData<F>>,
	frames: PrimaryMap<FrameId, Frame<F>>,
	/// Frames being recorded; the last one is current.
	stack: Vec<FrameId>,
	/// Finished sub-circuits by id.
	circuits: BTreeMap<usize, Circuit<F>>,
	memo: sub_circuit::Memo,
	num_public_inputs: usize,
	/// First error detected while recording, reported by [`CircuitBuilder::build`].
	error: Option<Error>,
}

impl<F: Field> Shared<F> {
	fn current_id(&self) -> FrameId {
		*self
			.stack
			.last()
			.expect("the root frame lives until build")
	}

	pub(crate) fn frame(&mut self) -> &mut Frame<F> {
		let id = self.current_id();
		&mut self.frames[id]
	}

	/// The expression behind `v`.
	///
	/// # Panics
	///
	/// If `v` belongs to another circuit than the one being recorded.
	pub(crate) fn expr(&self, v: Variable) -> Expression<F> {
		let data = &self.vars[v];
		assert!(
			data.frame == self.current_id(),
			"variable {v:?} belongs to another circuit than the one being recorded"
		);
		data.expr.clone()
	}

	pub(crate) fn var(&mut self, expr: Expression<F>) -> Variable {
		let frame = self.current_id();
		self.vars.push(VarData { frame, expr })
	}

	fn wire_var(&mut self, wire: usize) -> Variable {
		self.var(Expression::var(wire))
	}

	pub(crate) fn push(&mut self, insn: Instruction<F>, layer: usize) -> Vec<Variable> {
		let n = insn.num_outputs();
		let first = self.frame().push(insn, layer);
		(first..first + n).map(|w| self.wire_var(w)).collect()
	}

	pub(crate) fn opts(&self) -> &Options {
		&self.opts
	}
}

/// Records a program into a [`RootCircuit`].
///
/// Operations take and return [`Variable`]s. Arithmetic is kept symbolic as long as the
/// expression stays quadratic, and is materialized into internal wires when a product would
/// exceed degree two or when an operand grows past the compression thresholds of
/// [`Options`]. Assertions are collected per circuit and lowered into zero constraints when
/// the circuit is finished.
///
/// Cloning the builder clones the handle, not the circuit. [`Self::memorized_call`] records
/// a sub-circuit through the same handle.
///
/// [`Self::build`] consumes the recorded state and can only be called once.
pub struct CircuitBuilder<F: Field> {
	shared: Rc<RefCell<Option<Shared<F>>>>,
}

impl<F: Field> Clone for CircuitBuilder<F> {
	fn clone(&self) -> Self {
		Self {
			shared: self.shared.clone(),
		}
	}
}

impl<F: Field> Default for CircuitBuilder<F> {
	fn default() -> Self {
		Self::new()
	}
}

impl<F: Field> CircuitBuilder<F> {
	/// Creates a builder configured from the environment, see [`Options::from_env`].
	pub fn new() -> Self {
		Self::with_options(Options::from_env())
	}

	pub fn with_options(opts: Options) -> Self {
		let mut frames = PrimaryMap::new();
		let root = frames.push(Frame::new(true));
		Self {
			shared: Rc::new(RefCell::new(Some(Shared {
				opts,
				vars: PrimaryMap::new(),
				frames,
				stack: vec![root],
				circuits: BTreeMap::new(),
				memo: Default::default(),
				num_public_inputs: 0,
				error: None,
			}))),
		}
	}

	pub(crate) fn shared(&self) -> RefMut<'_, Shared<F>> {
		RefMut::map(self.shared.borrow_mut(), |shared| {
			shared
				.as_mut()
				.expect("CircuitBuilder used after build")
		})
	}

	/// Finishes the recording and returns the IR.
	///
	/// Fails with [`Error::Collision`] if two different sub-circuit calls shared a memoization
	/// digest.
	///
	/// # Preconditions
	///
	/// Must be called only once, from outside of any [`Self::memorized_call`].
	pub fn build(&self) -> Result<RootCircuit<F>, Error> {
		let shared = self.shared.borrow_mut().take();
		let Some(mut shared) = shared else {
			panic!("CircuitBuilder::build called twice");
		};
		if let Some(error) = shared.error.take() {
			return Err(error);
		}
		assert_eq!(shared.stack.len(), 1, "build called inside a sub-circuit");
		let root_id = shared.stack[0];
		let root = std::mem::replace(&mut shared.frames[root_id], Frame::new(true));
		let mut circuits = shared.circuits;
		circuits.insert(RootCircuit::<F>::ROOT_ID, root.into_circuit(Vec::new()));
		let rc = RootCircuit {
			num_public_inputs: shared.num_public_inputs,
			expected_num_output_zeroes: 0,
			circuits,
		};
		tracing::debug!(
			num_circuits = rc.circuits.len(),
			num_inputs = rc.num_inputs(),
			"built IR"
		);
		Ok(rc)
	}

	/// Declares a new private input of the root circuit.
	///
	/// # Panics
	///
	/// If called while recording a sub-circuit.
	pub fn add_input(&self) -> Variable {
		let mut shared = self.shared();
		assert!(shared.frame().is_root, "inputs can only be added to the root circuit");
		let wire = shared.frame().add_input();
		shared.wire_var(wire)
	}

	/// Declares the next public input. Its value is supplied with the witness and enters the
	/// layered circuit as a coefficient.
	///
	/// # Panics
	///
	/// If called while recording a sub-circuit.
	pub fn public_input(&self) -> Variable {
		let mut shared = self.shared();
		assert!(shared.frame().is_root, "public inputs can only be read by the root circuit");
		let index = shared.num_public_inputs;
		shared.num_public_inputs += 1;
		shared.push(Instruction::PublicInput { index }, 1)[0]
	}

	pub fn constant(&self, value: F) -> Variable {
		self.shared().var(Expression::constant(value))
	}

	/// The value of `v` if it is a compile-time constant.
	pub fn constant_value(&self, v: Variable) -> Option<F> {
		self.shared().expr(v).constant_value()
	}

	/// A fresh random value, drawn anew for every evaluation of the layered circuit.
	///
	/// The value is unknown while solving the witness, so hints must not depend on it.
	pub fn get_random_value(&self) -> Variable {
		self.shared().push(Instruction::GetRandom, 2)[0]
	}

	/// The output of custom gate `gate_type` applied to `inputs`.
	///
	/// The gate function is resolved by the [`HintRegistry`](crate::HintRegistry) used to solve
	/// and evaluate the circuit.
	pub fn custom_gate(&self, gate_type: u64, inputs: &[Variable]) -> Variable {
		let mut shared = self.shared();
		let inputs = inputs.iter().map(|&v| shared.expr(v)).collect::<Vec<_>>();
		let layer = inputs
			.iter()
			.map(|e| shared.frame().layer_of(e))
			.max()
			.unwrap_or(1)
			+ 1;
		shared.push(Instruction::CustomGate { gate_type, inputs }, layer)[0]
	}

	/// Outputs of the user hint registered under `key`.
	///
	/// The outputs are unconstrained; the circuit must constrain them itself.
	pub fn new_hint(&self, key: &str, inputs: &[Variable], num_outputs: usize) -> Vec<Variable> {
		self.hint(crate::hints::hint_key_to_id(key), inputs, num_outputs)
	}

	/// Outputs of a builtin hint. They are unconstrained.
	pub fn builtin_hint(
		&self,
		hint: crate::BuiltinHint,
		inputs: &[Variable],
		num_outputs: usize,
	) -> Vec<Variable> {
		self.hint(hint.id(), inputs, num_outputs)
	}

	fn hint(&self, hint_id: u64, inputs: &[Variable], num_outputs: usize) -> Vec<Variable> {
		assert!(num_outputs > 0, "a hint needs at least one output");
		let mut shared = self.shared();
		let inputs = inputs.iter().map(|&v| shared.expr(v)).collect();
		shared.push(
			Instruction::Hint {
				hint_id,
				inputs,
				num_outputs,
			},
			1,
		)
	}

	/// The estimated layer at which `v` becomes available. Only meant for diagnostics.
	pub fn layer_of(&self, v: Variable) -> usize {
		let mut shared = self.shared();
		let e = shared.expr(v);
		shared.frame().layer_of(&e)
	}
}
