// Copyright 2025 Irreducible Inc.
use super::Variable;

/// Values that can cross a sub-circuit boundary: nested structures of [`Variable`]s.
///
/// The shape of a value (not the variables themselves) is part of the memoization key of a
/// call, so two calls with the same name and parameters but differently shaped arguments are
/// compiled separately.
pub trait Variables: Sized + 'static {
	/// Appends every variable in a fixed traversal order.
	fn collect_into(&self, out: &mut Vec<Variable>);

	/// Appends a description of the shape.
	fn describe(&self, shape: &mut Vec<u64>);

	/// A value of the same shape as `self` holding the next variables of `vars`, taken in
	/// the order of [`Self::collect_into`].
	fn rebuild(&self, vars: &mut dyn Iterator<Item = Variable>) -> Self;

	fn variables(&self) -> Vec<Variable> {
		let mut out = Vec::new();
		self.collect_into(&mut out);
		out
	}

	fn shape(&self) -> Vec<u64> {
		let mut shape = Vec::new();
		self.describe(&mut shape);
		shape
	}
}

impl Variables for Variable {
	fn collect_into(&self, out: &mut Vec<Variable>) {
		out.push(*self);
	}

	fn describe(&self, shape: &mut Vec<u64>) {
		shape.push(0);
	}

	fn rebuild(&self, vars: &mut dyn Iterator<Item = Variable>) -> Self {
		vars.next()
			.expect("a rebuilt value has as many variables as its template")
	}
}

impl<T: Variables> Variables for Vec<T> {
	fn collect_into(&self, out: &mut Vec<Variable>) {
		self.iter().for_each(|item| item.collect_into(out));
	}

	fn describe(&self, shape: &mut Vec<u64>) {
		shape.extend([1, self.len() as u64]);
		self.iter().for_each(|item| item.describe(shape));
	}

	fn rebuild(&self, vars: &mut dyn Iterator<Item = Variable>) -> Self {
		self.iter().map(|item| item.rebuild(vars)).collect()
	}
}

impl<T: Variables, const N: usize> Variables for [T; N] {
	fn collect_into(&self, out: &mut Vec<Variable>) {
		self.iter().for_each(|item| item.collect_into(out));
	}

	fn describe(&self, shape: &mut Vec<u64>) {
		shape.extend([2, N as u64]);
		self.iter().for_each(|item| item.describe(shape));
	}

	fn rebuild(&self, vars: &mut dyn Iterator<Item = Variable>) -> Self {
		std::array::from_fn(|i| self[i].rebuild(vars))
	}
}

impl Variables for () {
	fn collect_into(&self, _out: &mut Vec<Variable>) {}

	fn describe(&self, shape: &mut Vec<u64>) {
		shape.push(4);
	}

	fn rebuild(&self, _vars: &mut dyn Iterator<Item = Variable>) -> Self {}
}

macro_rules! impl_variables_for_tuple {
	($arity:literal; $($name:ident: $idx:tt),+) => {
		impl<$($name: Variables),+> Variables for ($($name,)+) {
			fn collect_into(&self, out: &mut Vec<Variable>) {
				$(self.$idx.collect_into(out);)+
			}

			fn describe(&self, shape: &mut Vec<u64>) {
				shape.extend([3, $arity]);
				$(self.$idx.describe(shape);)+
			}

			fn rebuild(&self, vars: &mut dyn Iterator<Item = Variable>) -> Self {
				($(self.$idx.rebuild(vars),)+)
			}
		}
	};
}

impl_variables_for_tuple!(2; A: 0, B: 1);
impl_variables_for_tuple!(3; A: 0, B: 1, C: 2);
impl_variables_for_tuple!(4; A: 0, B: 1, C: 2, D: 3);

#[cfg(test)]
mod tests {
	use cranelift_entity::EntityRef;

	use super::*;

	fn v(i: usize) -> Variable {
		Variable::new(i)
	}

	#[test]
	fn test_nested_shapes_differ() {
		let flat = vec![v(0), v(1), v(2), v(3)];
		let nested = vec![vec![v(0), v(1)], vec![v(2), v(3)]];
		assert_eq!(flat.variables(), nested.variables());
		assert_ne!(flat.shape(), nested.shape());
		assert_eq!(nested.shape(), vec![1, 2, 1, 2, 0, 0, 1, 2, 0, 0]);
	}

	#[test]
	fn test_rebuild_follows_collection_order() {
		let template = (v(0), [v(1), v(2)], vec![v(3)]);
		let mut fresh = (10..14).map(v);
		let rebuilt = template.rebuild(&mut fresh);
		assert_eq!(rebuilt, (v(10), [v(11), v(12)], vec![v(13)]));
		assert!(fresh.next().is_none());
	}
}
