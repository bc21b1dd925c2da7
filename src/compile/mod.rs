//! Compiles rule definitions into rules.
//!
//! Rules are written as serde structures (usually JSON, see [RuleSetSpec]) and compiled through
//! `TryFrom` into their matching structures. Everything which can be wrong about a definition
//! is reported here as [Error::MalformedPattern][crate::Error::MalformedPattern], matching never fails because of it.

mod impls;
mod structure;

pub use structure::*;
