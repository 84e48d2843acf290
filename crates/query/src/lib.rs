//! Quill Query - query plumbing for the Quill dataset engine.
//!
//! This crate provides the two pieces of machinery every query builder is
//! composed from:
//!
//! - `syntax`: keyword grammar definition and validation per query kind
//! - `composite`: the odometer-style cross-product iterator that drives joins

pub mod composite;
pub mod syntax;

pub use composite::{CompositeIterator, Direction};
pub use syntax::{Quantifier, Rule, Syntax, Term};
