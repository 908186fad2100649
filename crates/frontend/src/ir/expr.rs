// Copyright 2025 Irreducible Inc.
//! Quadratic expressions over circuit wires.

use std::{
	fmt::{self, Display, Formatter},
	ops::{Add, Mul, Neg, Sub},
};

use itertools::Itertools;
use smallvec::{SmallVec, smallvec};
use stratum_field::Field;

/// `coef · w[vid0] · w[vid1]`, where wire 0 is the constant one.
///
/// Terms are kept canonical with `vid0 >= vid1`, so `(v, 0)` is a linear term and `(0, 0)` a
/// constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term<F> {
	pub vid0: usize,
	pub vid1: usize,
	pub coef: F,
}

impl<F: Field> Term<F> {
	/// A canonical term over the two wires, in any order.
	pub fn new(a: usize, b: usize, coef: F) -> Self {
		Self {
			vid0: a.max(b),
			vid1: a.min(b),
			coef,
		}
	}

	pub fn constant(coef: F) -> Self {
		Self::new(0, 0, coef)
	}

	pub fn linear(vid: usize, coef: F) -> Self {
		Self::new(vid, 0, coef)
	}

	/// The ordering key of the term inside an expression.
	pub fn key(&self) -> (usize, usize) {
		(self.vid0, self.vid1)
	}

	/// 0 for constants, 1 for linear terms, 2 otherwise.
	pub fn degree(&self) -> usize {
		match (self.vid0, self.vid1) {
			(0, _) => 0,
			(_, 0) => 1,
			_ => 2,
		}
	}

	fn value(&self, values: &[F]) -> F {
		let wire = |vid: usize| if vid == 0 { F::ONE } else { values[vid] };
		self.coef * wire(self.vid0) * wire(self.vid1)
	}
}

/// A sum of [`Term`]s in canonical form.
///
/// Terms are sorted by `(vid0, vid1)`, equal keys are merged and zero coefficients dropped. The
/// term list is never empty: the zero expression is a single constant-zero term. Equality and
/// hashing are therefore structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression<F> {
	terms: SmallVec<[Term<F>; 4]>,
}

impl<F: Field> Default for Expression<F> {
	fn default() -> Self {
		Self::zero()
	}
}

impl<F: Field> Expression<F> {
	pub fn zero() -> Self {
		Self::constant(F::ZERO)
	}

	pub fn constant(value: F) -> Self {
		Self {
			terms: smallvec![Term::constant(value)],
		}
	}

	/// The wire `vid` with coefficient one.
	pub fn var(vid: usize) -> Self {
		Self::linear(vid, F::ONE)
	}

	pub fn linear(vid: usize, coef: F) -> Self {
		Self::from_terms([Term::linear(vid, coef)])
	}

	/// Normalizes an arbitrary bag of terms.
	pub fn from_terms(terms: impl IntoIterator<Item = Term<F>>) -> Self {
		let mut terms = terms.into_iter().collect::<SmallVec<[Term<F>; 4]>>();
		terms.sort_by_key(Term::key);
		Self::from_sorted(terms.into_iter())
	}

	fn from_sorted(terms: impl Iterator<Item = Term<F>>) -> Self {
		let terms = terms
			.coalesce(|a, b| {
				if a.key() == b.key() {
					Ok(Term {
						coef: a.coef + b.coef,
						..a
					})
				} else {
					Err((a, b))
				}
			})
			.filter(|t| !t.coef.is_zero())
			.collect::<SmallVec<[Term<F>; 4]>>();
		if terms.is_empty() {
			Self::zero()
		} else {
			Self { terms }
		}
	}

	/// The sum of any number of expressions, computed as a k-way merge of their term lists.
	pub fn sum<'a>(exprs: impl IntoIterator<Item = &'a Expression<F>>) -> Self {
		let merged = exprs
			.into_iter()
			.map(|e| e.terms.iter().copied())
			.kmerge_by(|a, b| a.key() < b.key());
		Self::from_sorted(merged)
	}

	pub fn terms(&self) -> &[Term<F>] {
		&self.terms
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	/// Always false; present for symmetry with [`Self::len`].
	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn degree(&self) -> usize {
		self.terms.iter().map(Term::degree).max().unwrap_or(0)
	}

	pub fn is_zero(&self) -> bool {
		self.constant_value().is_some_and(|c| c.is_zero())
	}

	/// The value of a constant expression.
	pub fn constant_value(&self) -> Option<F> {
		match self.terms.as_slice() {
			[t] if t.degree() == 0 => Some(t.coef),
			_ => None,
		}
	}

	/// The wire of an expression that is exactly one wire with coefficient one.
	pub fn as_single_var(&self) -> Option<usize> {
		match self.terms.as_slice() {
			[t] if t.degree() == 1 && t.coef.is_one() => Some(t.vid0),
			_ => None,
		}
	}

	/// Every non-constant wire the expression reads, with repetition.
	pub fn vars(&self) -> impl Iterator<Item = usize> + '_ {
		self.terms
			.iter()
			.flat_map(|t| [t.vid0, t.vid1])
			.filter(|&vid| vid != 0)
	}

	pub fn scale(&self, factor: F) -> Self {
		if factor.is_zero() {
			return Self::zero();
		}
		if factor.is_one() {
			return self.clone();
		}
		Self {
			terms: self
				.terms
				.iter()
				.map(|t| Term {
					coef: t.coef * factor,
					..*t
				})
				.collect(),
		}
	}

	/// The product of two expressions of degree at most one.
	///
	/// # Panics
	///
	/// If either operand has degree two.
	pub fn mul_linear(&self, other: &Self) -> Self {
		assert!(
			self.degree() <= 1 && other.degree() <= 1,
			"multiplying a quadratic expression"
		);
		if let Some(c) = self.constant_value() {
			return other.scale(c);
		}
		if let Some(c) = other.constant_value() {
			return self.scale(c);
		}
		Self::from_terms(
			self.terms
				.iter()
				.cartesian_product(other.terms.iter())
				.map(|(a, b)| Term::new(a.vid0, b.vid0, a.coef * b.coef)),
		)
	}

	/// Renames every wire through `f`; wire 0 stays the constant one.
	pub fn map_vars(&self, f: impl Fn(usize) -> usize) -> Self {
		let rename = |vid: usize| if vid == 0 { 0 } else { f(vid) };
		Self::from_terms(
			self.terms
				.iter()
				.map(|t| Term::new(rename(t.vid0), rename(t.vid1), t.coef)),
		)
	}

	/// Evaluates the expression; `values[vid]` holds the value of wire `vid`.
	pub fn evaluate(&self, values: &[F]) -> F {
		self.terms.iter().map(|t| t.value(values)).sum()
	}
}

impl<F: Field> Add for &Expression<F> {
	type Output = Expression<F>;

	fn add(self, rhs: Self) -> Expression<F> {
		Expression::sum([self, rhs])
	}
}

impl<F: Field> Sub for &Expression<F> {
	type Output = Expression<F>;

	fn sub(self, rhs: Self) -> Expression<F> {
		Expression::sum([self, &-rhs])
	}
}

impl<F: Field> Neg for &Expression<F> {
	type Output = Expression<F>;

	fn neg(self) -> Expression<F> {
		self.scale(-F::ONE)
	}
}

impl<F: Field> Mul for &Expression<F> {
	type Output = Expression<F>;

	fn mul(self, rhs: Self) -> Expression<F> {
		self.mul_linear(rhs)
	}
}

impl<F: Field> Display for Expression<F> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for (i, t) in self.terms.iter().enumerate() {
			if i > 0 {
				write!(f, " + ")?;
			}
			match t.degree() {
				0 => write!(f, "{}", t.coef)?,
				1 => write!(f, "{}*w{}", t.coef, t.vid0)?,
				_ => write!(f, "{}*w{}*w{}", t.coef, t.vid0, t.vid1)?,
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use stratum_field::M31;

	use super::*;

	fn arb_term() -> impl Strategy<Value = Term<M31>> {
		(0usize..5, 0usize..5, 0u32..4).prop_map(|(a, b, c)| Term::new(a, b, M31::new(c)))
	}

	fn arb_linear_term() -> impl Strategy<Value = Term<M31>> {
		(0usize..5, 0u32..4).prop_map(|(a, c)| Term::linear(a, M31::new(c)))
	}

	fn arb_values() -> impl Strategy<Value = Vec<M31>> {
		prop::collection::vec(any::<u32>().prop_map(M31::new), 5).prop_map(|mut v| {
			v[0] = M31::ONE;
			v
		})
	}

	fn assert_canonical(e: &Expression<M31>) {
		assert!(!e.terms().is_empty());
		if e.len() > 1 {
			assert!(e.terms().iter().all(|t| !t.coef.is_zero()));
		}
		for pair in e.terms().windows(2) {
			assert!(pair[0].key() < pair[1].key());
		}
		for t in e.terms() {
			assert!(t.vid0 >= t.vid1);
		}
	}

	proptest! {
		#[test]
		fn test_from_terms_is_canonical(
			terms in prop::collection::vec(arb_term(), 0..8),
			values in arb_values(),
		) {
			let e = Expression::from_terms(terms.iter().copied());
			assert_canonical(&e);
			let direct: M31 = terms.iter().map(|t| t.value(&values)).sum();
			prop_assert_eq!(e.evaluate(&values), direct);
		}

		#[test]
		fn test_sum_and_difference(
			a in prop::collection::vec(arb_term(), 0..6),
			b in prop::collection::vec(arb_term(), 0..6),
			values in arb_values(),
		) {
			let (a, b) = (Expression::from_terms(a), Expression::from_terms(b));
			let sum = &a + &b;
			assert_canonical(&sum);
			prop_assert_eq!(sum.evaluate(&values), a.evaluate(&values) + b.evaluate(&values));
			prop_assert_eq!(&sum, &(&b + &a));
			prop_assert!((&a - &a).is_zero());
			prop_assert_eq!(&(&sum - &b), &a);
		}

		#[test]
		fn test_linear_product(
			a in prop::collection::vec(arb_linear_term(), 0..4),
			b in prop::collection::vec(arb_linear_term(), 0..4),
			values in arb_values(),
		) {
			let (a, b) = (Expression::from_terms(a), Expression::from_terms(b));
			let product = &a * &b;
			assert_canonical(&product);
			prop_assert!(product.degree() <= 2);
			prop_assert_eq!(product.evaluate(&values), a.evaluate(&values) * b.evaluate(&values));
		}
	}

	#[test]
	fn test_zero_expression_shape() {
		let zero = Expression::<M31>::zero();
		assert_eq!(zero.terms(), &[Term::constant(M31::ZERO)]);
		assert!(zero.is_zero());
		assert_eq!(Expression::var(3).scale(M31::ZERO), zero);
		assert_eq!(Expression::<M31>::from_terms([]), zero);
	}

	#[test]
	fn test_single_var_detection() {
		assert_eq!(Expression::<M31>::var(7).as_single_var(), Some(7));
		assert_eq!(Expression::linear(7, M31::new(2)).as_single_var(), None);
		assert_eq!(Expression::<M31>::var(0).as_single_var(), None);
		let x_plus_one = &Expression::<M31>::var(7) + &Expression::constant(M31::ONE);
		assert_eq!(x_plus_one.as_single_var(), None);
		assert_eq!(x_plus_one.terms()[0], Term::constant(M31::ONE));
	}

	#[test]
	fn test_map_vars_reorders() {
		let e = &Expression::<M31>::var(1) + &Expression::linear(2, M31::new(5));
		let swapped = e.map_vars(|v| 3 - v);
		assert_eq!(swapped.terms()[0], Term::linear(1, M31::new(5)));
		assert_eq!(swapped.terms()[1], Term::linear(2, M31::ONE));
	}

	#[test]
	#[should_panic(expected = "quadratic")]
	fn test_quadratic_product_panics() {
		let x = Expression::<M31>::var(1);
		let xx = &x * &x;
		let _ = &xx * &x;
	}
}
