// Copyright 2025 Irreducible Inc.

//! Utility modules used across the Stratum crates.

pub mod pool;
pub mod serialization;

pub use bytes;
pub use pool::Pool;
pub use serialization::{DeserializeBytes, SerializationError, SerializeBytes};
