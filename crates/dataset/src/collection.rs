//! Collections of records and position cursors.
//!
//! A `Collection` is an ordered, mutable sequence of schema-less records with
//! an optional display name. Handles are cheap clones sharing one underlying
//! store, so a query builder, its field references and the caller all see the
//! same data; in-place queries (UPDATE, DELETE, ALTER) mutate through the
//! handle they were given.

use crate::field::Field;
use quill_core::{Record, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a collection.
pub type CollectionId = u64;

/// Global collection ID counter.
static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(0);

fn next_collection_id() -> CollectionId {
    NEXT_COLLECTION_ID.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct Inner {
    records: Vec<Record>,
    name: Option<String>,
}

/// An ordered, named, mutable sequence of records.
#[derive(Clone)]
pub struct Collection {
    id: CollectionId,
    inner: Rc<RefCell<Inner>>,
}

impl Collection {
    /// Creates an unnamed collection from a record sequence.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            id: next_collection_id(),
            inner: Rc::new(RefCell::new(Inner {
                records,
                name: None,
            })),
        }
    }

    /// Creates a named collection from a record sequence.
    pub fn with_name(records: Vec<Record>, name: impl Into<String>) -> Self {
        let collection = Self::new(records);
        collection.inner.borrow_mut().name = Some(name.into());
        collection
    }

    /// Renames the collection, builder-style.
    pub fn set_name(self, name: impl Into<String>) -> Self {
        self.inner.borrow_mut().name = Some(name.into());
        self
    }

    /// Returns the collection name if set.
    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    /// Returns the process-unique collection ID.
    #[inline]
    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    /// Returns true if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().records.is_empty()
    }

    /// Returns a snapshot copy of all records.
    pub fn records(&self) -> Vec<Record> {
        self.inner.borrow().records.clone()
    }

    /// Returns a copy of the record at `index`.
    pub fn record(&self, index: usize) -> Option<Record> {
        self.inner.borrow().records.get(index).cloned()
    }

    /// Appends a record.
    pub fn push(&self, record: Record) {
        self.inner.borrow_mut().records.push(record);
    }

    /// Removes and returns the record at `index`. Removing shifts later
    /// records down, so batch deletions must run from highest index to
    /// lowest.
    pub fn remove(&self, index: usize) -> Option<Record> {
        let mut inner = self.inner.borrow_mut();
        if index < inner.records.len() {
            Some(inner.records.remove(index))
        } else {
            None
        }
    }

    /// Returns one cursor per record, in order.
    pub fn cursors(&self) -> Vec<Cursor> {
        (0..self.len())
            .map(|index| Cursor {
                collection: self.clone(),
                index,
            })
            .collect()
    }

    /// Creates a deferred reference to the named field.
    pub fn field(&self, name: impl Into<String>) -> Field {
        Field::new(self.clone(), name)
    }

    /// Returns a new unnamed collection holding copies of this collection's
    /// records followed by `other`'s.
    pub fn concat(&self, other: &Collection) -> Collection {
        let mut records = self.records();
        records.extend(other.records());
        Collection::new(records)
    }

    /// Appends copies of `other`'s records in place.
    pub fn extend(&self, other: &Collection) {
        let added = other.records();
        self.inner.borrow_mut().records.extend(added);
    }

    /// Reads one field of the record at `index`; a present record with a
    /// missing field reads as `Null`, a missing record as `None`.
    pub(crate) fn field_value(&self, index: usize, field: &str) -> Option<Value> {
        self.inner
            .borrow()
            .records
            .get(index)
            .map(|record| record.value(field))
    }

    /// Returns whether the record at `index` carries the field.
    pub(crate) fn record_contains(&self, index: usize, field: &str) -> Option<bool> {
        self.inner
            .borrow()
            .records
            .get(index)
            .map(|record| record.contains(field))
    }

    /// Applies a batch of field writes to the record at `index` at once.
    pub(crate) fn set_fields(&self, index: usize, updates: Vec<(String, Value)>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(record) = inner.records.get_mut(index) {
            for (field, value) in updates {
                record.set(field, value);
            }
        }
    }

    /// Removes one field from the record at `index`; absent fields are a
    /// no-op.
    pub(crate) fn drop_field(&self, index: usize, field: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(record) = inner.records.get_mut(index) {
            record.remove(field);
        }
    }

    /// Renders the collection as a formatted text table. Column headers are
    /// centered, numeric cells right-justified, and cells wider than
    /// `maxwidth` (when non-zero) truncated with `...`. Columns appear in
    /// sorted name order.
    pub fn to_table(&self, separator: &str, maxwidth: usize) -> String {
        let records = self.records();
        let mut columns: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            for (name, value) in record.iter() {
                let width = columns
                    .entry(name.to_string())
                    .or_insert_with(|| clamp_width(name.chars().count(), maxwidth));
                let value_width = clamp_width(plain_text(value).chars().count(), maxwidth);
                if value_width > *width {
                    *width = value_width;
                }
            }
        }
        if columns.is_empty() {
            return String::new();
        }

        let left_edge = separator.trim_start();
        let right_edge = separator.trim_end();
        let table_width = columns.values().sum::<usize>()
            + (columns.len() - 1) * separator.chars().count()
            + left_edge.chars().count()
            + right_edge.chars().count();
        let horizontal_line = "-".repeat(table_width);

        let data_line = |cells: Vec<String>| -> String {
            format!("{}{}{}", left_edge, cells.join(separator), right_edge)
        };

        let mut lines = Vec::new();
        lines.push(horizontal_line.clone());
        lines.push(data_line(
            columns
                .iter()
                .map(|(name, width)| fit_cell(name, *width, Justify::Center))
                .collect(),
        ));
        lines.push(horizontal_line.clone());
        for record in &records {
            lines.push(data_line(
                columns
                    .iter()
                    .map(|(name, width)| match record.get(name) {
                        Some(value @ (Value::Int64(_) | Value::Float64(_))) => {
                            fit_cell(&plain_text(value), *width, Justify::Right)
                        }
                        Some(value) => fit_cell(&plain_text(value), *width, Justify::Left),
                        None => fit_cell("", *width, Justify::Left),
                    })
                    .collect(),
            ));
        }
        lines.push(horizontal_line);
        lines.join("\n")
    }
}

impl PartialEq for Collection {
    /// Handles are equal when they share the same underlying collection.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Collection {}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("len", &self.len())
            .finish()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "`{}`", name),
            None => write!(f, "`Collection_#{}`", self.id),
        }
    }
}

fn clamp_width(width: usize, maxwidth: usize) -> usize {
    if maxwidth > 0 && width > maxwidth {
        maxwidth
    } else {
        width
    }
}

/// Cell text for a value: strings render raw, without explain quoting.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Justify {
    Left,
    Right,
    Center,
}

fn fit_cell(text: &str, width: usize, justify: Justify) -> String {
    let mut text = text.to_string();
    if text.chars().count() > width {
        text = text.chars().take(width.saturating_sub(3)).collect::<String>() + "...";
    }
    match justify {
        Justify::Left => format!("{:<width$}", text),
        Justify::Right => format!("{:>width$}", text),
        Justify::Center => format!("{:^width$}", text),
    }
}

/// A position-stable reference to one record within a collection.
#[derive(Clone, Debug)]
pub struct Cursor {
    collection: Collection,
    index: usize,
}

impl Cursor {
    /// Returns the record position.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the owning collection handle.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Reads a copy of the referenced record.
    pub fn record(&self) -> Option<Record> {
        self.collection.record(self.index)
    }

    /// Deletes the referenced record from its collection. Cursors past this
    /// index keep their record identity only if deletions are applied from
    /// highest index to lowest.
    pub fn delete(&self) -> Option<Record> {
        self.collection.remove(self.index)
    }

    /// Removes one field from the referenced record; an absent field is a
    /// no-op.
    pub fn drop_field(&self, field: &str) {
        self.collection.drop_field(self.index, field);
    }
}
