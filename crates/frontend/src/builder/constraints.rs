// Copyright 2025 Irreducible Inc.
use stratum_field::Field;
use stratum_utils::Pool;

use super::{CircuitBuilder, Frame, Variable};
use crate::{
	BuiltinHint,
	ir::{Expression, Instruction},
};

/// What is known about a fact over an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
	/// Holds by construction; nothing to enforce.
	Marked,
	/// Must be enforced by a constraint of this circuit.
	Asserted,
}

/// Facts of one kind, keyed by expression, in first-seen order.
pub(crate) struct Bucket<F> {
	exprs: Pool<Expression<F>>,
	status: Vec<Status>,
}

impl<F> Default for Bucket<F> {
	fn default() -> Self {
		Self {
			exprs: Pool::default(),
			status: Vec::new(),
		}
	}
}

impl<F: Field> Bucket<F> {
	/// Records a fact. A fact that is already known keeps its status.
	pub(crate) fn insert(&mut self, expr: &Expression<F>, status: Status) {
		if self.exprs.add(expr) == self.status.len() {
			self.status.push(status);
		}
	}

	pub(crate) fn status(&self, expr: &Expression<F>) -> Option<Status> {
		self.exprs.try_get_idx(expr).map(|idx| self.status[idx])
	}

	fn asserted(&self) -> impl Iterator<Item = &Expression<F>> {
		self.exprs
			.vec()
			.iter()
			.zip(&self.status)
			.filter(|(_, status)| **status == Status::Asserted)
			.map(|(expr, _)| expr)
	}
}

/// The facts recorded for one circuit.
pub(crate) struct ConstraintSet<F> {
	pub(crate) bools: Bucket<F>,
	pub(crate) zeroes: Bucket<F>,
	pub(crate) non_zeroes: Bucket<F>,
}

impl<F> ConstraintSet<F> {
	/// The buckets in a fixed order: booleans, zeroes, non-zeroes.
	pub(crate) fn buckets(&self) -> [&Bucket<F>; 3] {
		[&self.bools, &self.zeroes, &self.non_zeroes]
	}

	pub(crate) fn buckets_mut(&mut self) -> [&mut Bucket<F>; 3] {
		[&mut self.bools, &mut self.zeroes, &mut self.non_zeroes]
	}
}

impl<F> Default for ConstraintSet<F> {
	fn default() -> Self {
		Self {
			bools: Bucket::default(),
			zeroes: Bucket::default(),
			non_zeroes: Bucket::default(),
		}
	}
}

impl<F: Field> Frame<F> {
	/// Turns every asserted fact into zero constraints, adding the wires this requires.
	///
	/// `e` boolean becomes `e · (1 - e) = 0`; `e` non-zero gets a hinted inverse `inv` and
	/// becomes `e · inv - 1 = 0`.
	pub(super) fn lower_constraints(&mut self) -> Vec<Expression<F>> {
		let set = std::mem::take(&mut self.constraints);
		let one = Expression::constant(F::ONE);
		let mut out = set.zeroes.asserted().cloned().collect::<Vec<_>>();
		for e in set.bools.asserted() {
			let e = self.linearize(e);
			out.push(e.mul_linear(&(&one - &e)));
		}
		for e in set.non_zeroes.asserted() {
			let e = self.linearize(e);
			let inv = self.push(
				Instruction::Hint {
					hint_id: BuiltinHint::Div.id(),
					inputs: vec![one.clone(), e.clone()],
					num_outputs: 1,
				},
				1,
			);
			out.push(&e.mul_linear(&Expression::var(inv)) - &one);
		}
		out
	}

	pub(crate) fn linearize(&mut self, e: &Expression<F>) -> Expression<F> {
		if e.degree() == 2 {
			self.hoist(e)
		} else {
			e.clone()
		}
	}
}

#[derive(Clone, Copy)]
enum Kind {
	Bool,
	Zero,
	NonZero,
}

impl<F: Field> CircuitBuilder<F> {
	fn record_fact(&self, v: Variable, kind: Kind, status: Status) {
		let mut shared = self.shared();
		let e = shared.expr(v);
		if let Some(c) = e.constant_value() {
			let holds = match kind {
				Kind::Bool => c.is_zero() || c.is_one(),
				Kind::Zero => c.is_zero(),
				Kind::NonZero => !c.is_zero(),
			};
			assert!(holds, "constant {c} violates an assertion");
			return;
		}
		let constraints = &mut shared.frame().constraints;
		let bucket = match kind {
			Kind::Bool => &mut constraints.bools,
			Kind::Zero => &mut constraints.zeroes,
			Kind::NonZero => &mut constraints.non_zeroes,
		};
		bucket.insert(&e, status);
	}

	/// Constrains `v` to be zero.
	///
	/// # Panics
	///
	/// If `v` is a non-zero constant.
	pub fn assert_is_zero(&self, v: Variable) {
		self.record_fact(v, Kind::Zero, Status::Asserted);
	}

	/// Constrains `v` to be non-zero.
	///
	/// # Panics
	///
	/// If `v` is the constant zero.
	pub fn assert_is_non_zero(&self, v: Variable) {
		self.record_fact(v, Kind::NonZero, Status::Asserted);
	}

	/// Constrains `v` to be zero or one.
	///
	/// # Panics
	///
	/// If `v` is a constant other than zero and one.
	pub fn assert_is_bool(&self, v: Variable) {
		self.record_fact(v, Kind::Bool, Status::Asserted);
	}

	pub fn assert_is_equal(&self, a: Variable, b: Variable) {
		let diff = self.sub(a, b);
		self.assert_is_zero(diff);
	}

	pub fn assert_is_different(&self, a: Variable, b: Variable) {
		let diff = self.sub(a, b);
		self.assert_is_non_zero(diff);
	}

	/// Records that `v` is boolean without constraining it.
	///
	/// Only sound when another constraint already implies it.
	pub fn mark_boolean(&self, v: Variable) {
		self.record_fact(v, Kind::Bool, Status::Marked);
	}

	/// Whether `v` is known or asserted to be boolean.
	pub fn is_boolean(&self, v: Variable) -> bool {
		let mut shared = self.shared();
		let e = shared.expr(v);
		match e.constant_value() {
			Some(c) => c.is_zero() || c.is_one(),
			None => shared.frame().constraints.bools.status(&e).is_some(),
		}
	}
}
