// Copyright 2025 Irreducible Inc.
//! Core datatypes shared by the compiler and by consumers of its output.
//!
//! Most importantly it hosts the definition of a [`LayeredCircuit`], the artifact produced by
//! the layering compiler, together with its evaluator and the [`Witness`] container.

#![warn(missing_docs)]

pub mod error;
pub mod layered;
pub mod witness;

pub use error::LayeredCircuitError;
pub use layered::*;
pub use witness::Witness;
