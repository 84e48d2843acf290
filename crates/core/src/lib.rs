//! Quill Core - Core types for the Quill dataset query engine.
//!
//! This crate provides the foundational types shared by the query layer:
//!
//! - `Value`: runtime values a record field can hold
//! - `DataType`: value types, doubling as cast targets
//! - `Record`: a schema-less field-name → value mapping
//! - `Error`: error types for query construction and execution
//!
//! # Example
//!
//! ```rust
//! use quill_core::{Record, Value};
//!
//! let record = Record::from_iter([
//!     ("name", Value::from("triangle")),
//!     ("sides", Value::from(3i64)),
//! ]);
//!
//! assert_eq!(record.value("sides"), Value::Int64(3));
//! assert_eq!(record.value("color"), Value::Null);
//! ```

mod error;
mod record;
mod value;

pub use error::{Error, Result};
pub use record::Record;
pub use value::{DataType, Value};
