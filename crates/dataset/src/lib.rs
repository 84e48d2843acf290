//! Quill Dataset - SQL-like queries over in-memory record collections.
//!
//! This crate provides the public API of the Quill engine:
//!
//! - `Collection` / `Cursor`: ordered, mutable record sequences
//! - `Field`: deferred field references
//! - `Expr` / `Operand`: captured expression trees over fields and literals
//! - `EvalContext`: per-tuple record bindings driving resolution
//! - `select` / `update` / `delete` / `alter`: fluent query builders
//!
//! # Example
//!
//! ```rust
//! use quill_core::{Record, Value};
//! use quill_dataset::{select, Collection, Operand};
//!
//! let shapes = Collection::with_name(
//!     vec![
//!         Record::from_iter([("name", Value::from("triangle")), ("sides", Value::from(3i64))]),
//!         Record::from_iter([("name", Value::from("square")), ("sides", Value::from(4i64))]),
//!     ],
//!     "Shapes",
//! );
//!
//! let result = select([shapes.field("name")])
//!     .from_(&shapes)
//!     .where_(shapes.field("sides").ge(4))
//!     .execute()
//!     .unwrap();
//!
//! assert_eq!(result.len(), 1);
//! assert_eq!(result.records()[0].value("name"), Value::from("square"));
//! ```

mod collection;
mod eval;
mod expr;
mod field;
mod query;

pub use collection::{Collection, CollectionId, Cursor};
pub use eval::EvalContext;
pub use expr::{BinaryOp, CallFunc, Expr, ExprKind, Operand, UnaryOp};
pub use field::Field;
pub use query::{
    alter, asc, assign, delete, desc, select, select_all, update, AlterQuery, Assignment,
    DeleteQuery, SelectQuery, SortKey, SortOrder, UpdateQuery,
};
