//! Query builders for SELECT, UPDATE, DELETE and ALTER operations.
//!
//! Each builder is a fluent state machine: clause methods accumulate state
//! and feed one keyword per call to the query kind's grammar, `execute()`
//! validates the accumulated sentence and runs the query. Builder-level
//! misuse (an unknown keyword, ON without a pending JOIN) is deferred into a
//! pending error and surfaced by `execute()`, so chains never break mid-way.
//! Queries are re-executable; every run re-validates the same sentence.

use crate::collection::{Collection, Cursor};
use crate::eval::EvalContext;
use crate::expr::Expr;
use crate::field::Field;
use quill_core::{Error, Record, Result, Value};
use quill_query::{CompositeIterator, Syntax};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use tracing::debug;

const INDENT: &str = "    ";

/// Sort order for one ORDER BY key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY key: an expression plus a direction. Descending inverts the
/// ordering comparisons only, never equality.
#[derive(Clone, Debug)]
pub struct SortKey {
    expr: Expr,
    order: SortOrder,
}

impl SortKey {
    /// Creates a sort key with an explicit direction.
    pub fn new(expr: impl Into<Expr>, order: SortOrder) -> Self {
        Self {
            expr: expr.into(),
            order,
        }
    }

    /// Returns the key expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Returns the direction.
    pub fn order(&self) -> SortOrder {
        self.order
    }
}

impl From<Expr> for SortKey {
    fn from(expr: Expr) -> Self {
        SortKey::new(expr, SortOrder::Asc)
    }
}

impl From<Field> for SortKey {
    fn from(field: Field) -> Self {
        SortKey::new(field, SortOrder::Asc)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Asc => write!(f, "{}", self.expr),
            SortOrder::Desc => write!(f, "{} DESC", self.expr),
        }
    }
}

/// Marks a sort key as ascending (the default; useful for clarity).
pub fn asc(key: impl Into<Expr>) -> SortKey {
    SortKey::new(key, SortOrder::Asc)
}

/// Marks a sort key as descending.
pub fn desc(key: impl Into<Expr>) -> SortKey {
    SortKey::new(key, SortOrder::Desc)
}

/// One SET element of an UPDATE query: target field and value expression.
#[derive(Clone, Debug)]
pub struct Assignment {
    field: Field,
    value: Expr,
}

impl Assignment {
    /// Creates an assignment.
    pub fn new(field: Field, value: impl Into<Expr>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Returns the target field.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Returns the value expression.
    pub fn value(&self) -> &Expr {
        &self.value
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}

/// Shorthand constructor for an UPDATE assignment.
pub fn assign(field: Field, value: impl Into<Expr>) -> Assignment {
    Assignment::new(field, value)
}

/// One JOIN clause: collection plus optional ON condition. No condition
/// means an unconditional cross join.
#[derive(Clone, Debug)]
struct JoinClause {
    collection: Collection,
    condition: Option<Expr>,
}

/// Starts a SELECT query over the given field/expression projections.
pub fn select<I>(fields: I) -> SelectQuery
where
    I: IntoIterator,
    I::Item: Into<Expr>,
{
    let mut query = SelectQuery {
        syntax: Syntax::select(),
        selected: fields.into_iter().map(Into::into).collect(),
        from: None,
        joins: Vec::new(),
        filter: None,
        order_by: Vec::new(),
        limit: None,
        pending: None,
    };
    query.keyword("select");
    query
}

/// Starts a SELECT query projecting every field of every tuple member.
pub fn select_all() -> SelectQuery {
    select(Vec::<Expr>::new())
}

/// Starts an UPDATE query against a collection.
pub fn update(collection: &Collection) -> UpdateQuery {
    let mut query = UpdateQuery {
        syntax: Syntax::update(),
        target: collection.clone(),
        assignments: Vec::new(),
        filter: None,
        pending: None,
    };
    query.keyword("update");
    query
}

/// Starts a DELETE query; the source collection comes from `from_`.
pub fn delete() -> DeleteQuery {
    let mut query = DeleteQuery {
        syntax: Syntax::delete(),
        from: None,
        filter: None,
        pending: None,
    };
    query.keyword("delete");
    query
}

/// Starts an ALTER query against a collection.
pub fn alter(collection: &Collection) -> AlterQuery {
    let mut query = AlterQuery {
        syntax: Syntax::alter(),
        target: collection.clone(),
        dropped: Vec::new(),
        filter: None,
        pending: None,
    };
    query.keyword("alter");
    query
}

/// SELECT query builder.
pub struct SelectQuery {
    syntax: Syntax,
    selected: Vec<Expr>,
    from: Option<Collection>,
    joins: Vec<JoinClause>,
    filter: Option<Expr>,
    order_by: Vec<SortKey>,
    limit: Option<usize>,
    pending: Option<Error>,
}

impl SelectQuery {
    fn keyword(&mut self, keyword: &str) {
        if let Err(error) = self.syntax.add_keyword(keyword) {
            self.fail(error);
        }
    }

    fn fail(&mut self, error: Error) {
        if self.pending.is_none() {
            self.pending = Some(error);
        }
    }

    /// Sets the FROM collection.
    pub fn from_(mut self, collection: &Collection) -> Self {
        self.keyword("from");
        self.from = Some(collection.clone());
        self
    }

    /// Adds an unconditional (cross) JOIN.
    pub fn join(mut self, collection: &Collection) -> Self {
        self.keyword("join");
        self.joins.push(JoinClause {
            collection: collection.clone(),
            condition: None,
        });
        self
    }

    /// Adds a JOIN with an inline ON condition.
    pub fn join_on(mut self, collection: &Collection, condition: impl Into<Expr>) -> Self {
        self.keyword("join");
        self.joins.push(JoinClause {
            collection: collection.clone(),
            condition: Some(condition.into()),
        });
        self
    }

    /// Attaches an ON condition to the most recent JOIN. Requires a
    /// preceding JOIN with no condition yet.
    pub fn on(mut self, condition: impl Into<Expr>) -> Self {
        self.keyword("on");
        let error = match self.joins.last_mut() {
            None => Some(Error::OnWithoutJoin),
            Some(join) if join.condition.is_some() => Some(Error::OnAlreadyDefined),
            Some(join) => {
                join.condition = Some(condition.into());
                None
            }
        };
        if let Some(error) = error {
            self.fail(error);
        }
        self
    }

    /// Sets the WHERE condition.
    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.keyword("where");
        self.filter = Some(condition.into());
        self
    }

    /// Sets the ORDER BY keys.
    pub fn order_by<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SortKey>,
    {
        self.keyword("order_by");
        self.order_by = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the LIMIT.
    pub fn limit(mut self, limit: usize) -> Self {
        self.keyword("limit");
        self.limit = Some(limit);
        self
    }

    /// Validates the keyword sentence, then runs the query: the cross
    /// product of [FROM, joins...] is enumerated with the rightmost declared
    /// collection changing fastest; every ON condition and the WHERE
    /// condition must match; survivors are projected, sorted and limited
    /// into a fresh unnamed collection.
    pub fn execute(&self) -> Result<Collection> {
        if let Some(error) = &self.pending {
            return Err(error.clone());
        }
        self.syntax.check()?;
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| Error::missing_clause("FROM"))?;

        let mut sources: Vec<Collection> = Vec::with_capacity(1 + self.joins.len());
        sources.push(from.clone());
        sources.extend(self.joins.iter().map(|join| join.collection.clone()));
        let conditions: Vec<&Expr> = self
            .joins
            .iter()
            .filter_map(|join| join.condition.as_ref())
            .collect();
        let ranges: Vec<Range<usize>> = sources.iter().map(|source| 0..source.len()).collect();

        let mut results: Vec<(Vec<Value>, Record)> = Vec::new();
        let mut ctx = EvalContext::new();
        for tuple in CompositeIterator::new(ranges) {
            ctx.clear();
            for (source, index) in sources.iter().zip(&tuple) {
                ctx.bind(source, *index);
            }
            if !conditions.iter().all(|condition| condition.matches(&ctx)) {
                continue;
            }
            if let Some(filter) = &self.filter {
                if !filter.matches(&ctx) {
                    continue;
                }
            }
            let record = if self.selected.is_empty() {
                // No projection: the union of every tuple member's fields,
                // later members shadowing earlier ones.
                let mut record = Record::new();
                for (source, index) in sources.iter().zip(&tuple) {
                    if let Some(member) = source.record(*index) {
                        record.merge(&member);
                    }
                }
                record
            } else {
                let mut record = Record::new();
                for expr in &self.selected {
                    record.set(
                        expr.result_key(),
                        expr.resolve(&ctx).unwrap_or(Value::Null),
                    );
                }
                record
            };
            let sort_key: Vec<Value> = self
                .order_by
                .iter()
                .map(|key| key.expr().resolve(&ctx).unwrap_or(Value::Null))
                .collect();
            results.push((sort_key, record));
        }

        if !self.order_by.is_empty() {
            let orders: Vec<SortOrder> = self.order_by.iter().map(SortKey::order).collect();
            results.sort_by(|a, b| compare_sort_keys(&a.0, &b.0, &orders));
        }
        let mut records: Vec<Record> = results.into_iter().map(|(_, record)| record).collect();
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        debug!(rows = records.len(), "select query executed");
        Ok(Collection::new(records))
    }

    /// Renders the composed clauses as a statement: multi-line and indented
    /// when `pretty`, single-line otherwise.
    pub fn explain(&self, pretty: bool) -> String {
        let mut sections: Vec<String> = Vec::new();

        let mut selected = String::from("SELECT");
        if self.selected.is_empty() {
            selected.push_str(" *");
        } else {
            let rendered: Vec<String> = self.selected.iter().map(Expr::to_string).collect();
            if pretty {
                selected.push('\n');
                selected.push_str(
                    &rendered
                        .iter()
                        .map(|field| format!("{}{}", INDENT, field))
                        .collect::<Vec<_>>()
                        .join(",\n"),
                );
            } else {
                selected.push(' ');
                selected.push_str(&rendered.join(", "));
            }
        }
        sections.push(selected);

        if let Some(from) = &self.from {
            sections.push(explain_from(from, pretty));
        }
        if !self.joins.is_empty() {
            let joins: Vec<String> = self
                .joins
                .iter()
                .map(|join| {
                    let mut line = String::new();
                    if pretty {
                        line.push_str(INDENT);
                    }
                    line.push_str(&format!("JOIN {}", join.collection));
                    if let Some(condition) = &join.condition {
                        line.push_str(&format!(" ON {}", condition));
                    }
                    line
                })
                .collect();
            sections.push(joins.join(if pretty { "\n" } else { " " }));
        }
        if let Some(filter) = &self.filter {
            sections.push(explain_where(filter, pretty));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(SortKey::to_string).collect();
            if pretty {
                sections.push(format!(
                    "ORDER BY\n{}",
                    keys.iter()
                        .map(|key| format!("{}{}", INDENT, key))
                        .collect::<Vec<_>>()
                        .join(",\n")
                ));
            } else {
                sections.push(format!("ORDER BY {}", keys.join(", ")));
            }
        }
        if let Some(limit) = self.limit {
            sections.push(format!("LIMIT {}", limit));
        }

        sections.join(if pretty { "\n" } else { " " })
    }
}

/// UPDATE query builder.
pub struct UpdateQuery {
    syntax: Syntax,
    target: Collection,
    assignments: Vec<Assignment>,
    filter: Option<Expr>,
    pending: Option<Error>,
}

impl UpdateQuery {
    fn keyword(&mut self, keyword: &str) {
        if let Err(error) = self.syntax.add_keyword(keyword) {
            if self.pending.is_none() {
                self.pending = Some(error);
            }
        }
    }

    /// Sets the SET assignments.
    pub fn set_(mut self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        self.keyword("set");
        self.assignments = assignments.into_iter().collect();
        self
    }

    /// Sets the WHERE condition.
    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.keyword("where");
        self.filter = Some(condition.into());
        self
    }

    /// Runs the update. For each matching record, every assignment is
    /// resolved against the record's pre-update state, then all computed
    /// values are applied at once — assignments within one record never see
    /// each other's writes. Returns the mutated collection handle.
    pub fn execute(&self) -> Result<Collection> {
        if let Some(error) = &self.pending {
            return Err(error.clone());
        }
        self.syntax.check()?;

        let mut ctx = EvalContext::new();
        let mut updated = 0usize;
        for index in 0..self.target.len() {
            ctx.clear();
            ctx.bind(&self.target, index);
            if let Some(filter) = &self.filter {
                if !filter.matches(&ctx) {
                    continue;
                }
            }
            let values: Vec<(String, Value)> = self
                .assignments
                .iter()
                .map(|assignment| {
                    (
                        assignment.field().name().to_string(),
                        assignment.value().resolve(&ctx).unwrap_or(Value::Null),
                    )
                })
                .collect();
            self.target.set_fields(index, values);
            updated += 1;
        }
        debug!(rows = updated, "update query executed");
        Ok(self.target.clone())
    }

    /// Renders the composed clauses as a statement.
    pub fn explain(&self, pretty: bool) -> String {
        let mut sections = vec![format!("UPDATE {}", self.target)];
        if !self.assignments.is_empty() {
            let rendered: Vec<String> =
                self.assignments.iter().map(Assignment::to_string).collect();
            if pretty {
                sections.push(format!(
                    "SET\n{}",
                    rendered
                        .iter()
                        .map(|assignment| format!("{}{}", INDENT, assignment))
                        .collect::<Vec<_>>()
                        .join(",\n")
                ));
            } else {
                sections.push(format!("SET {}", rendered.join(", ")));
            }
        }
        if let Some(filter) = &self.filter {
            sections.push(explain_where(filter, pretty));
        }
        sections.join(if pretty { "\n" } else { " " })
    }
}

/// DELETE query builder.
pub struct DeleteQuery {
    syntax: Syntax,
    from: Option<Collection>,
    filter: Option<Expr>,
    pending: Option<Error>,
}

impl DeleteQuery {
    fn keyword(&mut self, keyword: &str) {
        if let Err(error) = self.syntax.add_keyword(keyword) {
            if self.pending.is_none() {
                self.pending = Some(error);
            }
        }
    }

    /// Sets the FROM collection.
    pub fn from_(mut self, collection: &Collection) -> Self {
        self.keyword("from");
        self.from = Some(collection.clone());
        self
    }

    /// Sets the WHERE condition.
    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.keyword("where");
        self.filter = Some(condition.into());
        self
    }

    /// Runs the deletion: matching cursors are collected first, then applied
    /// from highest index to lowest so removals never shift a pending
    /// position. Returns the mutated collection handle.
    pub fn execute(&self) -> Result<Collection> {
        if let Some(error) = &self.pending {
            return Err(error.clone());
        }
        self.syntax.check()?;
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| Error::missing_clause("FROM"))?;

        let mut ctx = EvalContext::new();
        let mut doomed: Vec<Cursor> = Vec::new();
        for cursor in from.cursors() {
            ctx.clear();
            ctx.bind(from, cursor.index());
            let matched = match &self.filter {
                Some(filter) => filter.matches(&ctx),
                None => true,
            };
            if matched {
                doomed.push(cursor);
            }
        }
        for cursor in doomed.iter().rev() {
            cursor.delete();
        }
        debug!(rows = doomed.len(), "delete query executed");
        Ok(from.clone())
    }

    /// Renders the composed clauses as a statement.
    pub fn explain(&self, pretty: bool) -> String {
        let mut sections = vec![String::from("DELETE")];
        if let Some(from) = &self.from {
            sections.push(explain_from(from, pretty));
        }
        if let Some(filter) = &self.filter {
            sections.push(explain_where(filter, pretty));
        }
        sections.join(if pretty { "\n" } else { " " })
    }
}

/// ALTER query builder (DROP fields).
pub struct AlterQuery {
    syntax: Syntax,
    target: Collection,
    dropped: Vec<Field>,
    filter: Option<Expr>,
    pending: Option<Error>,
}

impl AlterQuery {
    fn keyword(&mut self, keyword: &str) {
        if let Err(error) = self.syntax.add_keyword(keyword) {
            if self.pending.is_none() {
                self.pending = Some(error);
            }
        }
    }

    /// Sets the fields to drop.
    pub fn drop(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.keyword("drop");
        self.dropped = fields.into_iter().collect();
        self
    }

    /// Sets the WHERE condition.
    pub fn where_(mut self, condition: impl Into<Expr>) -> Self {
        self.keyword("where");
        self.filter = Some(condition.into());
        self
    }

    /// Runs the alteration: each named field is removed from every matching
    /// record; absent fields are a no-op. Returns the mutated collection
    /// handle.
    pub fn execute(&self) -> Result<Collection> {
        if let Some(error) = &self.pending {
            return Err(error.clone());
        }
        self.syntax.check()?;

        let mut ctx = EvalContext::new();
        let mut altered = 0usize;
        for index in 0..self.target.len() {
            ctx.clear();
            ctx.bind(&self.target, index);
            if let Some(filter) = &self.filter {
                if !filter.matches(&ctx) {
                    continue;
                }
            }
            for field in &self.dropped {
                self.target.drop_field(index, field.name());
            }
            altered += 1;
        }
        debug!(rows = altered, "alter query executed");
        Ok(self.target.clone())
    }

    /// Renders the composed clauses as a statement.
    pub fn explain(&self, pretty: bool) -> String {
        let mut sections = Vec::new();
        if pretty {
            sections.push(format!("ALTER\n{}{}", INDENT, self.target));
        } else {
            sections.push(format!("ALTER {}", self.target));
        }
        let rendered: Vec<String> = self.dropped.iter().map(Field::to_string).collect();
        if pretty {
            sections.push(format!(
                "DROP\n{}",
                rendered
                    .iter()
                    .map(|field| format!("{}{}", INDENT, field))
                    .collect::<Vec<_>>()
                    .join("\n")
            ));
        } else {
            sections.push(format!("DROP {}", rendered.join(", ")));
        }
        if let Some(filter) = &self.filter {
            sections.push(explain_where(filter, pretty));
        }
        sections.join(if pretty { "\n" } else { " " })
    }
}

fn explain_from(from: &Collection, pretty: bool) -> String {
    if pretty {
        format!("FROM\n{}{}", INDENT, from)
    } else {
        format!("FROM {}", from)
    }
}

fn explain_where(filter: &Expr, pretty: bool) -> String {
    if pretty {
        format!("WHERE\n{}{}", INDENT, filter)
    } else {
        format!("WHERE {}", filter)
    }
}

/// Lexicographic comparison over resolved key tuples, reversing per-key for
/// descending order. The enclosing sort is stable.
fn compare_sort_keys(a: &[Value], b: &[Value], orders: &[SortOrder]) -> Ordering {
    for ((left, right), order) in a.iter().zip(b).zip(orders) {
        let mut ordering = left.cmp(right);
        if *order == SortOrder::Desc {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
