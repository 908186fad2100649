// Copyright 2025 Irreducible Inc.
//! Arithmetic, boolean and comparison operations of the builder.

use stratum_field::Field;

use super::{CircuitBuilder, Frame, Variable};
use crate::{
	BuiltinHint,
	ir::{Expression, Instruction},
};

impl<F: Field> Frame<F> {
	/// Materializes a linear operand whose wires are spread over too many layers.
	fn compress_add(&mut self, e: Expression<F>, threshold: usize) -> Expression<F> {
		if e.degree() <= 1 && self.layer_span(&e) > threshold {
			self.hoist(&e)
		} else {
			e
		}
	}

	/// Brings both operands of a product to degree one and bounds the size of the product.
	fn prepare_mul(
		&mut self,
		x: &Expression<F>,
		y: &Expression<F>,
		threshold: usize,
	) -> (Expression<F>, Expression<F>) {
		let mut x = self.linearize(x);
		let mut y = self.linearize(y);
		if x.len().min(y.len()) > threshold {
			x = self.hoist(&x);
			y = self.hoist(&y);
		} else if x.len() * y.len() > threshold {
			if x.len() >= y.len() {
				x = self.hoist(&x);
			} else {
				y = self.hoist(&y);
			}
		}
		(x, y)
	}
}

impl<F: Field> CircuitBuilder<F> {
	/// `a + b`.
	pub fn add(&self, a: Variable, b: Variable) -> Variable {
		self.sum(&[a, b])
	}

	/// The sum of any number of variables.
	pub fn sum(&self, vars: &[Variable]) -> Variable {
		let mut shared = self.shared();
		let threshold = shared.opts().compress_threshold_add;
		let mut exprs = Vec::with_capacity(vars.len());
		for &v in vars {
			let e = shared.expr(v);
			exprs.push(shared.frame().compress_add(e, threshold));
		}
		let e = Expression::sum(&exprs);
		shared.var(e)
	}

	/// `a - b`.
	pub fn sub(&self, a: Variable, b: Variable) -> Variable {
		let mut shared = self.shared();
		let threshold = shared.opts().compress_threshold_add;
		let (a, b) = (shared.expr(a), shared.expr(b));
		let frame = shared.frame();
		let a = frame.compress_add(a, threshold);
		let b = frame.compress_add(b, threshold);
		let e = &a - &b;
		shared.var(e)
	}

	/// `-a`.
	pub fn neg(&self, a: Variable) -> Variable {
		let mut shared = self.shared();
		let e = -&shared.expr(a);
		shared.var(e)
	}

	/// `factor · a`.
	pub fn mul_constant(&self, a: Variable, factor: F) -> Variable {
		let mut shared = self.shared();
		let e = shared.expr(a).scale(factor);
		shared.var(e)
	}

	/// The product of two variables.
	///
	/// Quadratic operands are materialized first. Operands with more terms than
	/// `compress_threshold_mul` are materialized as well, and so is the larger operand when
	/// the product would have more terms than the threshold.
	pub fn mul(&self, a: Variable, b: Variable) -> Variable {
		let mut shared = self.shared();
		let threshold = shared.opts().compress_threshold_mul;
		let (x, y) = (shared.expr(a), shared.expr(b));
		let e = match (x.constant_value(), y.constant_value()) {
			(Some(c), _) => y.scale(c),
			(_, Some(c)) => x.scale(c),
			(None, None) => {
				let (x, y) = shared.frame().prepare_mul(&x, &y, threshold);
				x.mul_linear(&y)
			}
		};
		shared.var(e)
	}

	/// A variable that is a single wire, equal to `a`.
	pub fn to_single_variable(&self, a: Variable) -> Variable {
		let mut shared = self.shared();
		let e = shared.expr(a);
		if e.as_single_var().is_some() {
			return a;
		}
		let layer = shared.frame().layer_of(&e) + 1;
		shared.push(Instruction::InternalVariable { expr: e }, layer)[0]
	}

	/// `x / y`.
	///
	/// With `checked`, `y` is constrained to be invertible. Otherwise only `q · y = x` is
	/// enforced, which leaves `q` free when both `x` and `y` are zero.
	///
	/// # Panics
	///
	/// If `y` is the constant zero.
	pub fn div(&self, x: Variable, y: Variable, checked: bool) -> Variable {
		if let Some(c) = self.constant_value(y) {
			let inv = c.invert().expect("division by the constant zero");
			return self.mul_constant(x, inv);
		}
		if checked {
			let inv = self.inverse(y);
			return self.mul(inv, x);
		}
		let q = self.builtin_hint(BuiltinHint::Div, &[x, y], 1)[0];
		let qy = self.mul(q, y);
		self.assert_is_equal(qy, x);
		q
	}

	/// The inverse of `x`, which is constrained to be non-zero.
	///
	/// # Panics
	///
	/// If `x` is the constant zero.
	pub fn inverse(&self, x: Variable) -> Variable {
		if let Some(c) = self.constant_value(x) {
			let inv = c.invert().expect("inverse of the constant zero");
			return self.constant(inv);
		}
		let one = self.constant(F::ONE);
		let inv = self.builtin_hint(BuiltinHint::Div, &[one, x], 1)[0];
		let prod = self.mul(inv, x);
		self.assert_is_equal(prod, one);
		inv
	}

	/// One if `a` is zero, zero otherwise.
	pub fn is_zero(&self, a: Variable) -> Variable {
		if let Some(c) = self.constant_value(a) {
			return self.constant(if c.is_zero() { F::ONE } else { F::ZERO });
		}
		// inv is 1/a, or 0 when a is 0; m = 1 - a·inv is then forced by a·m = 0.
		let one = self.constant(F::ONE);
		let inv = self.builtin_hint(BuiltinHint::Div, &[one, a], 1)[0];
		let a_inv = self.mul(a, inv);
		let m = self.sub(one, a_inv);
		let am = self.mul(a, m);
		self.assert_is_zero(am);
		self.mark_boolean(m);
		m
	}

	/// Boolean AND. Both operands are constrained to be boolean.
	pub fn and(&self, a: Variable, b: Variable) -> Variable {
		self.assert_is_bool(a);
		self.assert_is_bool(b);
		let r = self.mul(a, b);
		self.mark_boolean(r);
		r
	}

	/// Boolean OR. Both operands are constrained to be boolean.
	pub fn or(&self, a: Variable, b: Variable) -> Variable {
		self.assert_is_bool(a);
		self.assert_is_bool(b);
		let ab = self.mul(a, b);
		let ab = self.neg(ab);
		let r = self.sum(&[a, b, ab]);
		self.mark_boolean(r);
		r
	}

	/// Boolean XOR. Both operands are constrained to be boolean.
	pub fn xor(&self, a: Variable, b: Variable) -> Variable {
		self.assert_is_bool(a);
		self.assert_is_bool(b);
		let ab = self.mul(a, b);
		let ab = self.mul_constant(ab, -F::from_u64(2));
		let r = self.sum(&[a, b, ab]);
		self.mark_boolean(r);
		r
	}

	/// Boolean negation of `a`, which is constrained to be boolean.
	pub fn not(&self, a: Variable) -> Variable {
		self.assert_is_bool(a);
		let one = self.constant(F::ONE);
		let r = self.sub(one, a);
		self.mark_boolean(r);
		r
	}

	/// `a` if `cond` is one, `b` if it is zero. `cond` is constrained to be boolean.
	pub fn select(&self, cond: Variable, a: Variable, b: Variable) -> Variable {
		self.assert_is_bool(cond);
		if let Some(c) = self.constant_value(cond) {
			return if c.is_one() { a } else { b };
		}
		let diff = self.sub(a, b);
		let picked = self.mul(cond, diff);
		self.add(picked, b)
	}

	/// `values[b0 + 2 · b1]`. Both selector bits are constrained to be boolean.
	pub fn lookup2(&self, b0: Variable, b1: Variable, values: [Variable; 4]) -> Variable {
		self.assert_is_bool(b0);
		self.assert_is_bool(b1);
		if let (Some(c0), Some(c1)) = (self.constant_value(b0), self.constant_value(b1)) {
			return values[c0.is_one() as usize + 2 * c1.is_one() as usize];
		}
		let [v0, v1, v2, v3] = values;
		// t = b1 · (v3 - v2 - v1 + v0) + v1 - v0, so that v0 + b0 · t picks along b0.
		let (neg_v1, neg_v2) = (self.neg(v1), self.neg(v2));
		let t = self.sum(&[v3, neg_v2, neg_v1, v0]);
		let t = self.mul(t, b1);
		let neg_v0 = self.neg(v0);
		let t = self.sum(&[t, v1, neg_v0]);
		let t = self.mul(t, b0);
		let r = self.sub(v2, v0);
		let r = self.mul(r, b1);
		self.sum(&[r, t, v0])
	}

	/// The `num_bits` little-endian bits of `x`, constrained to be boolean and to recompose
	/// to `x`.
	///
	/// The decomposition is unique only if `num_bits` is smaller than the bit length of the
	/// field.
	///
	/// # Panics
	///
	/// If `num_bits` is zero or `x` is a constant that does not fit.
	pub fn to_binary(&self, x: Variable, num_bits: usize) -> Vec<Variable> {
		assert!(num_bits > 0, "to_binary needs at least one bit");
		if let Some(c) = self.constant_value(x) {
			let value = c.to_biguint();
			assert!(value.bits() <= num_bits as u64, "constant {c} does not fit into {num_bits} bits");
			return (0..num_bits)
				.map(|i| self.constant(if value.bit(i as u64) { F::ONE } else { F::ZERO }))
				.collect();
		}
		let bits = self.builtin_hint(BuiltinHint::ToBinary, &[x], num_bits);
		for &bit in &bits {
			self.assert_is_bool(bit);
		}
		let packed = self.from_binary(&bits);
		self.assert_is_equal(packed, x);
		bits
	}

	/// `Σ 2^i · bits[i]`. The bits are not constrained.
	pub fn from_binary(&self, bits: &[Variable]) -> Variable {
		let two = F::from_u64(2);
		let weighted = bits
			.iter()
			.enumerate()
			.map(|(i, &bit)| self.mul_constant(bit, two.pow(i as u64)))
			.collect::<Vec<_>>();
		self.sum(&weighted)
	}

	/// Compares the `num_bits`-bit integers `a` and `b`: one if `a > b`, zero if they are
	/// equal and minus one if `a < b`.
	pub fn cmp(&self, a: Variable, b: Variable, num_bits: usize) -> Variable {
		let a_bits = self.to_binary(a, num_bits);
		let b_bits = self.to_binary(b, num_bits);
		// Scanning from the least significant bit, a differing bit overrides the result so far.
		let mut res = self.constant(F::ZERO);
		for (&ai, &bi) in a_bits.iter().zip(&b_bits) {
			let d = self.sub(ai, bi);
			let differs = self.mul(d, d);
			self.mark_boolean(differs);
			res = self.select(differs, d, res);
		}
		res
	}

	/// Constrains the `num_bits`-bit integer `a` to be at most `bound`.
	///
	/// # Panics
	///
	/// If both operands are constants and `a > bound`.
	pub fn assert_is_less_or_equal(&self, a: Variable, bound: Variable, num_bits: usize) {
		if let (Some(x), Some(y)) = (self.constant_value(a), self.constant_value(bound)) {
			assert!(x.to_biguint() <= y.to_biguint(), "{x} is not less than or equal to {y}");
			return;
		}
		// cmp is -1, 0 or 1; c · (c + 1) vanishes exactly for the first two.
		let c = self.cmp(a, bound, num_bits);
		let one = self.constant(F::ONE);
		let c1 = self.add(c, one);
		let prod = self.mul(c, c1);
		self.assert_is_zero(prod);
	}
}

#[cfg(test)]
mod tests {
	use stratum_field::M31;

	use super::*;
	use crate::Options;

	fn builder_with(opts: Options) -> CircuitBuilder<M31> {
		CircuitBuilder::with_options(opts)
	}

	#[test]
	fn test_constant_folding() {
		let b = builder_with(Options::default());
		let x = b.constant(M31::new(6));
		let y = b.constant(M31::new(3));
		assert_eq!(b.constant_value(b.mul(x, y)), Some(M31::new(18)));
		assert_eq!(b.constant_value(b.div(x, y, true)), Some(M31::new(2)));
		assert_eq!(b.constant_value(b.sub(x, x)), Some(M31::ZERO));
		let bits = b.to_binary(x, 4);
		let bits = bits
			.iter()
			.map(|&bit| b.constant_value(bit).unwrap())
			.collect::<Vec<_>>();
		assert_eq!(bits, vec![M31::ZERO, M31::ONE, M31::ONE, M31::ZERO]);
		assert_eq!(b.constant_value(b.is_zero(b.constant(M31::ZERO))), Some(M31::ONE));
		let rc = b.build().unwrap();
		assert!(rc.root().unwrap().instructions.is_empty());
	}

	#[test]
	fn test_select_with_constant_condition() {
		let b = builder_with(Options::default());
		let x = b.add_input();
		let y = b.add_input();
		let one = b.constant(M31::ONE);
		assert_eq!(b.select(one, x, y), x);
		let zero = b.constant(M31::ZERO);
		assert_eq!(b.lookup2(one, zero, [x, y, x, y]), y);
	}

	#[test]
	fn test_sum_compresses_deep_operands() {
		let b = builder_with(Options {
			compress_threshold_add: 1,
			..Options::default()
		});
		let x = b.add_input();
		let x2 = b.mul(x, x);
		let x4 = b.mul(x2, x2);
		let deep = b.to_single_variable(x4);
		assert_eq!(b.layer_of(deep), 3);
		let s = b.add(x, deep);
		let _ = b.add(s, x);
		let rc = b.build().unwrap();
		// x^2, x^4 and the hoisted x + x^4.
		assert_eq!(rc.root().unwrap().instructions.len(), 3);
	}

	#[test]
	fn test_wide_products_are_compressed() {
		let b = builder_with(Options {
			compress_threshold_mul: 4,
			..Options::default()
		});
		let xs = (0..3).map(|_| b.add_input()).collect::<Vec<_>>();
		let ys = (0..2).map(|_| b.add_input()).collect::<Vec<_>>();
		let sx = b.sum(&xs);
		let sy = b.sum(&ys);
		let p = b.mul(sx, sy);
		b.assert_is_zero(p);
		let rc = b.build().unwrap();
		let root = rc.root().unwrap();
		// 3 · 2 terms exceed the threshold, so the wider sum gets its own wire.
		assert_eq!(root.instructions.len(), 1);
		assert_eq!(root.constraints[0].len(), 2);
	}

	#[test]
	fn test_checked_division_asserts_inverse() {
		let b = builder_with(Options::default());
		let x = b.add_input();
		let y = b.add_input();
		let _ = b.div(x, y, true);
		let rc = b.build().unwrap();
		let root = rc.root().unwrap();
		assert!(matches!(
			root.instructions[0],
			Instruction::Hint { hint_id, .. } if hint_id == BuiltinHint::Div.id()
		));
		assert_eq!(root.constraints.len(), 1);
	}

	#[test]
	#[should_panic(expected = "constant zero")]
	fn test_division_by_constant_zero_panics() {
		let b = builder_with(Options::default());
		let x = b.add_input();
		let zero = b.constant(M31::ZERO);
		let _ = b.div(x, zero, false);
	}

	#[test]
	#[should_panic(expected = "is not less than or equal")]
	fn test_constant_comparison_panics() {
		let b = builder_with(Options::default());
		let (x, y) = (b.constant(M31::new(5)), b.constant(M31::new(4)));
		b.assert_is_less_or_equal(x, y, 4);
	}
}
