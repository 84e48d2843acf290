//! Expression resolution.
//!
//! Evaluation is driven by an explicit `EvalContext` mapping each collection
//! to the record currently under consideration; the executors rebind the
//! context once per candidate tuple. Resolution returns `Option<Value>`:
//! `None` is "absent" — the silent-fault policy. Type mismatches, division
//! by zero and failed casts all degrade to absent rather than erroring,
//! because schema-less records legitimately lack fields and a WHERE clause
//! over heterogeneous data must keep going.

use crate::collection::{Collection, CollectionId};
use crate::expr::{BinaryOp, Expr, ExprKind, UnaryOp};
use quill_core::Value;
use std::cmp::Ordering;
use std::mem::discriminant;

/// Maps each collection to the record index currently being evaluated.
///
/// The executors own one context per query run and rebind it per tuple;
/// nothing is stored on the collections themselves, so two queries over the
/// same collection never interfere.
#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    bindings: Vec<(CollectionId, usize)>,
}

impl EvalContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a collection to a record index, replacing any previous binding
    /// for the same collection.
    pub fn bind(&mut self, collection: &Collection, index: usize) {
        let id = collection.id();
        if let Some(binding) = self.bindings.iter_mut().find(|(bound, _)| *bound == id) {
            binding.1 = index;
        } else {
            self.bindings.push((id, index));
        }
    }

    /// Looks up the bound record index for a collection.
    pub fn get(&self, id: CollectionId) -> Option<usize> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == id)
            .map(|(_, index)| *index)
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

impl Expr {
    /// Evaluates the tree bottom-up against the context.
    ///
    /// `None` is absent: the operator faulted, or a referenced collection is
    /// not bound. Absence never escapes as an error, and an absent operand
    /// behaves as `Null` for the consuming operator.
    pub fn resolve(&self, ctx: &EvalContext) -> Option<Value> {
        match self.kind() {
            ExprKind::Literal(value) => Some(value.clone()),
            ExprKind::Field(field) => field.resolve(ctx),
            ExprKind::Binary { op, left, right } => {
                let left = left.resolve(ctx).unwrap_or(Value::Null);
                let right = right.resolve(ctx).unwrap_or(Value::Null);
                apply_binary(*op, left, right)
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr,
            } => {
                let value = expr.resolve(ctx).unwrap_or(Value::Null);
                Some(Value::Boolean(!value.truthy()))
            }
            ExprKind::InList { expr, list } => {
                let needle = expr.resolve(ctx).unwrap_or(Value::Null);
                let found = list
                    .iter()
                    .any(|item| item.resolve(ctx).unwrap_or(Value::Null) == needle);
                Some(Value::Boolean(found))
            }
            ExprKind::Is { expr, sentinel } => {
                let value = expr.resolve(ctx).unwrap_or(Value::Null);
                let same = discriminant(&value) == discriminant(sentinel) && value == *sentinel;
                Some(Value::Boolean(same))
            }
            ExprKind::Call { func, args, .. } => {
                let values: Vec<Value> = args
                    .iter()
                    .map(|arg| arg.resolve(ctx).unwrap_or(Value::Null))
                    .collect();
                (func.0)(&values)
            }
            ExprKind::Cast { target, expr } => {
                apply_cast(*target, expr.resolve(ctx).unwrap_or(Value::Null))
            }
            ExprKind::Match { expr, compiled, .. } => {
                let matched = match (expr.resolve(ctx), compiled) {
                    (Some(Value::String(value)), Some(regex)) => regex.is_match(&value),
                    // A non-string value or an invalid pattern is a match
                    // fault; it degrades to false, not absent.
                    _ => false,
                };
                Some(Value::Boolean(matched))
            }
            ExprKind::Exists { field } => {
                let index = ctx.get(field.collection().id())?;
                field
                    .collection()
                    .record_contains(index, field.name())
                    .map(Value::Boolean)
            }
        }
    }

    /// True iff the expression resolves to exactly `Boolean(true)`.
    pub fn matches(&self, ctx: &EvalContext) -> bool {
        self.resolve(ctx) == Some(Value::Boolean(true))
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Option<Value> {
    match op {
        BinaryOp::Eq => Some(Value::Boolean(left == right)),
        BinaryOp::Ne => Some(Value::Boolean(left != right)),
        BinaryOp::Lt => compare(left, right, |ordering| ordering == Ordering::Less),
        BinaryOp::Le => compare(left, right, |ordering| ordering != Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |ordering| ordering == Ordering::Greater),
        BinaryOp::Ge => compare(left, right, |ordering| ordering != Ordering::Less),
        BinaryOp::And => match (left.as_bool(), right.as_bool()) {
            (Some(a), Some(b)) => Some(Value::Boolean(a && b)),
            _ => None,
        },
        BinaryOp::Or => match (left.as_bool(), right.as_bool()) {
            (Some(a), Some(b)) => Some(Value::Boolean(a || b)),
            _ => None,
        },
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => numeric(left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => numeric(left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => divide(left, right),
        BinaryOp::FloorDiv => floor_divide(left, right),
        BinaryOp::Rem => modulo(left, right),
    }
}

fn compare(left: Value, right: Value, accept: impl Fn(Ordering) -> bool) -> Option<Value> {
    left.try_compare(&right)
        .map(|ordering| Value::Boolean(accept(ordering)))
}

/// Addition doubles as string concatenation when both sides are strings.
fn add(left: Value, right: Value) -> Option<Value> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(Value::String(a + &b)),
        (left, right) => numeric(left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Numeric promotion: two Int64 stay integral, any Float64 widens both.
fn numeric(
    left: Value,
    right: Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Option<Value> {
    match (&left, &right) {
        (Value::Int64(a), Value::Int64(b)) => int_op(*a, *b).map(Value::Int64),
        _ => {
            let a = left.as_number()?;
            let b = right.as_number()?;
            Some(Value::Float64(float_op(a, b)))
        }
    }
}

/// True division: always floating point, even for two integers.
fn divide(left: Value, right: Value) -> Option<Value> {
    let a = left.as_number()?;
    let b = right.as_number()?;
    if b == 0.0 {
        None
    } else {
        Some(Value::Float64(a / b))
    }
}

/// Floor division rounds toward negative infinity.
fn floor_divide(left: Value, right: Value) -> Option<Value> {
    match (&left, &right) {
        (Value::Int64(a), Value::Int64(b)) => int_floor_div(*a, *b).map(Value::Int64),
        _ => {
            let a = left.as_number()?;
            let b = right.as_number()?;
            if b == 0.0 {
                None
            } else {
                Some(Value::Float64((a / b).floor()))
            }
        }
    }
}

/// Modulo; the result takes the divisor's sign.
fn modulo(left: Value, right: Value) -> Option<Value> {
    match (&left, &right) {
        (Value::Int64(a), Value::Int64(b)) => {
            let quotient = int_floor_div(*a, *b)?;
            quotient
                .checked_mul(*b)
                .and_then(|product| a.checked_sub(product))
                .map(Value::Int64)
        }
        _ => {
            let a = left.as_number()?;
            let b = right.as_number()?;
            if b == 0.0 {
                None
            } else {
                Some(Value::Float64(a - (a / b).floor() * b))
            }
        }
    }
}

fn int_floor_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let quotient = a.checked_div(b)?;
    let remainder = a.checked_rem(b)?;
    if remainder != 0 && (a < 0) != (b < 0) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

fn apply_cast(target: quill_core::DataType, value: Value) -> Option<Value> {
    use quill_core::DataType;
    match target {
        // Truthiness is total, so casting to Boolean never faults.
        DataType::Boolean => Some(Value::Boolean(value.truthy())),
        DataType::Int64 => match value {
            Value::Int64(i) => Some(Value::Int64(i)),
            Value::Float64(f) if f.is_finite() => Some(Value::Int64(f.trunc() as i64)),
            Value::Boolean(b) => Some(Value::Int64(b as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int64),
            _ => None,
        },
        DataType::Float64 => match value {
            Value::Int64(i) => Some(Value::Float64(i as f64)),
            Value::Float64(f) => Some(Value::Float64(f)),
            Value::Boolean(b) => Some(Value::Float64(if b { 1.0 } else { 0.0 })),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::Float64),
            _ => None,
        },
        DataType::String => match value {
            Value::Null => None,
            Value::String(s) => Some(Value::String(s)),
            Value::Boolean(b) => Some(Value::String(b.to_string())),
            Value::Int64(i) => Some(Value::String(i.to_string())),
            Value::Float64(f) => Some(Value::String(f.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Operand;
    use quill_core::{DataType, Record};

    fn bound(records: Vec<Record>, index: usize) -> (Collection, EvalContext) {
        let collection = Collection::with_name(records, "TestCollection");
        let mut ctx = EvalContext::new();
        ctx.bind(&collection, index);
        (collection, ctx)
    }

    fn amount_record(amount: i64) -> Record {
        Record::from_iter([
            ("amount", Value::from(amount)),
            ("even", Value::from(amount % 2 == 0)),
        ])
    }

    #[test]
    fn test_comparisons() {
        let (collection, ctx) = bound(vec![amount_record(1)], 0);
        let amount = || collection.field("amount");
        assert!(amount().eq(1).matches(&ctx));
        assert!(amount().ne(2).matches(&ctx));
        assert!(amount().lt(2).matches(&ctx));
        assert!(!amount().gt(1).matches(&ctx));
        assert!(amount().le(1).matches(&ctx));
        assert!(amount().ge(1).matches(&ctx));
    }

    #[test]
    fn test_arithmetic() {
        let (collection, ctx) = bound(vec![amount_record(5)], 0);
        let amount = || collection.field("amount");
        assert_eq!(amount().add(1).resolve(&ctx), Some(Value::Int64(6)));
        assert_eq!(amount().sub(1).resolve(&ctx), Some(Value::Int64(4)));
        assert_eq!(amount().mul(2).resolve(&ctx), Some(Value::Int64(10)));
        assert_eq!(amount().div(2).resolve(&ctx), Some(Value::Float64(2.5)));
        assert_eq!(amount().floordiv(2).resolve(&ctx), Some(Value::Int64(2)));
        assert_eq!(amount().rem(2).resolve(&ctx), Some(Value::Int64(1)));
    }

    #[test]
    fn test_reflected_arithmetic() {
        let (collection, ctx) = bound(vec![amount_record(2)], 0);
        let amount = || collection.field("amount");
        assert_eq!(
            Expr::literal(10).sub(amount()).resolve(&ctx),
            Some(Value::Int64(8))
        );
        assert_eq!(
            Expr::literal(10).div(amount()).resolve(&ctx),
            Some(Value::Float64(5.0))
        );
        assert_eq!(
            Expr::literal(10).floordiv(amount()).resolve(&ctx),
            Some(Value::Int64(5))
        );
    }

    #[test]
    fn test_floor_division_rounds_down() {
        let ctx = EvalContext::new();
        assert_eq!(
            Expr::literal(-7).floordiv(2).resolve(&ctx),
            Some(Value::Int64(-4))
        );
        assert_eq!(
            Expr::literal(7).floordiv(-2).resolve(&ctx),
            Some(Value::Int64(-4))
        );
        assert_eq!(
            Expr::literal(-7).rem(2).resolve(&ctx),
            Some(Value::Int64(1))
        );
    }

    #[test]
    fn test_division_by_zero_is_absent() {
        let ctx = EvalContext::new();
        assert_eq!(Expr::literal(1).div(0).resolve(&ctx), None);
        assert_eq!(Expr::literal(1).floordiv(0).resolve(&ctx), None);
        assert_eq!(Expr::literal(1).rem(0).resolve(&ctx), None);
    }

    #[test]
    fn test_string_concatenation() {
        let ctx = EvalContext::new();
        assert_eq!(
            Expr::literal("Red").add(" ").add("square").resolve(&ctx),
            Some(Value::String("Red square".into()))
        );
    }

    #[test]
    fn test_logic() {
        let (collection, ctx) = bound(vec![amount_record(2)], 0);
        let even = || collection.field("even");
        assert_eq!(
            even().and(true).resolve(&ctx),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            even().or(false).resolve(&ctx),
            Some(Value::Boolean(true))
        );
        assert_eq!(even().not().resolve(&ctx), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_not_is_truthiness_based() {
        let (collection, ctx) = bound(vec![amount_record(2)], 0);
        // NOT over a missing field (Null) is true.
        assert_eq!(
            collection.field("missing").not().resolve(&ctx),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            collection.field("amount").not().resolve(&ctx),
            Some(Value::Boolean(false))
        );
    }

    #[test]
    fn test_faults_degrade_to_absent() {
        let (collection, ctx) = bound(vec![amount_record(1)], 0);
        // Ordered comparison against an incompatible type.
        assert_eq!(collection.field("amount").lt("text").resolve(&ctx), None);
        // Arithmetic over a missing field.
        assert_eq!(collection.field("missing").add(1).resolve(&ctx), None);
        // The fault is falsy wherever a boolean is expected.
        assert!(!collection.field("missing").add(1).matches(&ctx));
        // Equality never faults: a missing field is simply not equal.
        assert!(collection.field("missing").ne(1).matches(&ctx));
    }

    #[test]
    fn test_absent_operand_propagates() {
        let (collection, ctx) = bound(vec![amount_record(1)], 0);
        // (missing + 1) faults, so ((missing + 1) * 2) faults too.
        let inner = collection.field("missing").add(1);
        assert_eq!(inner.mul(2).resolve(&ctx), None);
    }

    #[test]
    fn test_in_list() {
        let (collection, ctx) = bound(vec![amount_record(3)], 0);
        assert!(collection.field("amount").in_list([0, 1, 2, 3]).matches(&ctx));
        assert!(!collection.field("amount").in_list([0, 1]).matches(&ctx));
    }

    #[test]
    fn test_is_identity() {
        let (collection, ctx) = bound(vec![amount_record(2)], 0);
        assert!(collection.field("even").is_(true).matches(&ctx));
        assert!(!collection.field("even").is_(false).matches(&ctx));
        assert!(collection.field("missing").is_(Value::Null).matches(&ctx));
        // Strict typing: Int64(1) is not Boolean(true).
        assert!(!collection.field("amount").is_(true).matches(&ctx));
    }

    #[test]
    fn test_call() {
        let (collection, ctx) = bound(vec![amount_record(4)], 0);
        let doubled = collection.field("amount").func(
            "double",
            |args| args[0].as_i64().map(|v| Value::Int64(v * 2)),
            Vec::new(),
        );
        assert_eq!(doubled.resolve(&ctx), Some(Value::Int64(8)));

        let faulty = collection.field("amount").func("boom", |_| None, Vec::new());
        assert_eq!(faulty.resolve(&ctx), None);
    }

    #[test]
    fn test_cast() {
        let (collection, ctx) = bound(vec![amount_record(3)], 0);
        assert_eq!(
            collection.field("amount").cast_as(DataType::String).resolve(&ctx),
            Some(Value::String("3".into()))
        );
        assert_eq!(
            Expr::literal("12").cast_as(DataType::Int64).resolve(&ctx),
            Some(Value::Int64(12))
        );
        assert_eq!(
            Expr::literal("not a number").cast_as(DataType::Int64).resolve(&ctx),
            None
        );
        assert_eq!(
            Expr::literal(0).cast_as(DataType::Boolean).resolve(&ctx),
            Some(Value::Boolean(false))
        );
        // The cast keeps the field's name for projection.
        let cast = collection.field("amount").cast_as(DataType::String);
        assert_eq!(cast.alias(), Some("amount"));
    }

    #[test]
    fn test_like() {
        let (collection, ctx) = bound(
            vec![Record::from_iter([("element", Value::from("Element 0"))])],
            0,
        );
        assert!(collection
            .field("element")
            .like(r"^Element [0-9]+$")
            .matches(&ctx));
        assert!(!collection
            .field("element")
            .like(r"^Unmatched$")
            .matches(&ctx));
        // re-match semantics: anchored at the start even without `^`.
        assert!(collection.field("element").like(r"Element").matches(&ctx));
        assert!(!collection.field("element").like(r"lement").matches(&ctx));
        // Case-insensitive variant.
        assert!(collection
            .field("element")
            .like_insensitive(r"^element")
            .matches(&ctx));
    }

    #[test]
    fn test_like_faults_are_false_not_absent() {
        let (collection, ctx) = bound(vec![amount_record(1)], 0);
        // Non-string value.
        assert_eq!(
            collection.field("amount").like("1").resolve(&ctx),
            Some(Value::Boolean(false))
        );
        // Invalid pattern.
        assert_eq!(
            collection.field("amount").like("(unclosed").resolve(&ctx),
            Some(Value::Boolean(false))
        );
    }

    #[test]
    fn test_context_rebinding() {
        let collection = Collection::new(vec![amount_record(1), amount_record(2)]);
        let expr = collection.field("amount").eq(2);
        let mut ctx = EvalContext::new();
        ctx.bind(&collection, 0);
        assert!(!expr.matches(&ctx));
        ctx.bind(&collection, 1);
        assert!(expr.matches(&ctx));
    }
}
