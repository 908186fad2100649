// Copyright 2025 Irreducible Inc.

//! Prime fields supported by the Stratum compiler.
//!
//! Every circuit is compiled over exactly one [`Field`]. The concrete fields are the BN254
//! scalar field, the Mersenne-31 field and GF(2).

mod bn254;
mod error;
mod field;
mod gf2;
mod m31;

pub use bn254::Bn254;
pub use error::FieldError;
pub use field::{Field, FieldId};
pub use gf2::Gf2;
pub use m31::{M31, M31_MODULUS};
