// Copyright 2025 Irreducible Inc.

//! Circuit construction frontend and layering compiler for Stratum.
//!
//! This crate provides the [`CircuitBuilder`] API for describing arithmetic circuits over a
//! prime field and the compiler that turns them into layered circuits, where every gate reads
//! only the layer directly below it.
//!
//! # Usage Flow
//!
//! Use [`CircuitBuilder`] to construct your circuit. Call `add_input()` and `public_input()`
//! to create [`Variable`]s, combine them with operations like `add()`, `mul()` and `div()`,
//! and constrain them with `assert_is_zero()` and friends. Repeated structure goes through
//! `memorized_call()`, which records a sub-circuit once and calls it everywhere else.
//!
//! `build()` returns the IR of the circuit as a [`ir::RootCircuit`]. [`compile`] validates it,
//! rewrites it into the normal form the layering engine expects and lays it out into a
//! [`stratum_core::LayeredCircuit`].
//!
//! To produce a witness, hand the root circuit inputs to the [`WitnessSolver`] returned by
//! [`compile`] together with a [`HintRegistry`] holding every hint the circuit uses.
//!
//! Use [`CircuitStat`] and [`IrStat`] to inspect the size of the result.

mod builder;
mod compile;
mod error;
pub mod hints;
pub mod ir;
pub mod layering;
mod options;
pub mod stat;
mod witness;

pub use builder::{CircuitBuilder, Variable, Variables};
pub use compile::{CompileResult, compile};
pub use error::{Error, IrLocation};
pub use hints::{BuiltinHint, Hint, HintError, HintRegistry, hint_key_to_id};
pub use layering::InputOrder;
pub use options::{CompileOptions, Options};
pub use stat::{CircuitStat, IrStat};
pub use witness::WitnessSolver;
