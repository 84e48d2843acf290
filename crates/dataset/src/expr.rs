//! Deferred expression trees.
//!
//! Comparisons, arithmetic and logic over fields build `Expr` nodes instead
//! of evaluating immediately; the tree is resolved later, once per candidate
//! record combination, by the query executors (see `eval`). The `Operand`
//! trait supplies the capture methods once and is implemented by both
//! `Field` and `Expr`, so chains like `field.rem(2).eq(0)` compose freely.

use crate::field::Field;
use quill_core::{DataType, Value};
use regex::RegexBuilder;
use std::fmt;
use std::rc::Rc;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
}

impl BinaryOp {
    /// Infix symbol used when rendering the expression.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// A caller-supplied function applied during resolution.
#[derive(Clone)]
pub struct CallFunc(pub(crate) Rc<dyn Fn(&[Value]) -> Option<Value>>);

impl CallFunc {
    /// Wraps a closure. Returning `None` is an evaluation fault; the
    /// enclosing expression resolves to absent.
    pub fn new(func: impl Fn(&[Value]) -> Option<Value> + 'static) -> Self {
        Self(Rc::new(func))
    }
}

impl fmt::Debug for CallFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallFunc(..)")
    }
}

/// Expression node kinds.
#[derive(Clone, Debug)]
pub enum ExprKind {
    /// Literal value.
    Literal(Value),
    /// Deferred field reference.
    Field(Field),
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Membership test against a value list.
    InList { expr: Box<Expr>, list: Vec<Expr> },
    /// Strict identity test against a sentinel value (no numeric coercion).
    Is { expr: Box<Expr>, sentinel: Value },
    /// Caller-supplied function application.
    Call {
        name: String,
        func: CallFunc,
        args: Vec<Expr>,
    },
    /// Type conversion of the resolved value.
    Cast { target: DataType, expr: Box<Expr> },
    /// Regex match over the resolved string, anchored at the start.
    Match {
        expr: Box<Expr>,
        pattern: String,
        case_insensitive: bool,
        compiled: Option<regex::Regex>,
    },
    /// Field presence test.
    Exists { field: Field },
}

/// A deferred computation tree over fields, literals and operators.
///
/// Nodes are immutable after construction; `set_name`/`as_` attach display
/// metadata used only for result-record keys and explain rendering, never
/// for evaluation.
#[derive(Clone, Debug)]
pub struct Expr {
    kind: ExprKind,
    name: Option<String>,
    alias: Option<String>,
    display: Option<String>,
}

impl Expr {
    fn with_kind(kind: ExprKind) -> Self {
        Self {
            kind,
            name: None,
            alias: None,
            display: None,
        }
    }

    fn with_display(kind: ExprKind, display: String) -> Self {
        Self {
            kind,
            name: None,
            alias: None,
            display: Some(display),
        }
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::with_kind(ExprKind::Literal(value.into()))
    }

    /// Creates a binary operation, rendering as `(left op right)`.
    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let display = format!("({} {} {})", left, op.symbol(), right);
        Self::with_display(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            display,
        )
    }

    /// Creates a logical NOT, rendering as `(NOT expr)`.
    pub(crate) fn negation(expr: Expr) -> Self {
        let display = format!("(NOT {})", expr);
        Self::with_display(
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            },
            display,
        )
    }

    /// Creates a membership test, rendering as `(expr IN [a, b, ...])`.
    pub(crate) fn membership(expr: Expr, list: Vec<Expr>) -> Self {
        let rendered = list
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let display = format!("({} IN [{}])", expr, rendered);
        Self::with_display(
            ExprKind::InList {
                expr: Box::new(expr),
                list,
            },
            display,
        )
    }

    /// Creates a strict identity test, rendering as `(expr IS sentinel)`.
    pub(crate) fn identity(expr: Expr, sentinel: Value) -> Self {
        let display = format!("({} IS {})", expr, sentinel);
        Self::with_display(
            ExprKind::Is {
                expr: Box::new(expr),
                sentinel,
            },
            display,
        )
    }

    /// Creates a function application expression. Renders as
    /// `name(arg, arg, ...)` unless overridden.
    pub fn call(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Option<Value> + 'static,
        args: Vec<Expr>,
    ) -> Self {
        Self::with_kind(ExprKind::Call {
            name: name.into(),
            func: CallFunc::new(func),
            args,
        })
    }

    /// Creates a cast expression, rendering as `CAST(expr AS TYPE)`.
    pub(crate) fn cast(target: DataType, expr: Expr) -> Self {
        let display = format!("CAST({} AS {})", expr, target.name());
        Self::with_display(
            ExprKind::Cast {
                target,
                expr: Box::new(expr),
            },
            display,
        )
    }

    /// Creates a regex match expression, anchored at the start of the
    /// resolved string.
    pub(crate) fn regex_match(expr: Expr, pattern: &str, case_insensitive: bool) -> Self {
        // An invalid pattern is an evaluation fault, so the match degrades
        // to false rather than failing construction.
        let compiled = RegexBuilder::new(&format!("^(?:{})", pattern))
            .case_insensitive(case_insensitive)
            .build()
            .ok();
        let display = if case_insensitive {
            format!("({} LIKE '{}' (CASE_INSENSITIVE))", expr, pattern)
        } else {
            format!("({} LIKE '{}')", expr, pattern)
        };
        Self::with_display(
            ExprKind::Match {
                expr: Box::new(expr),
                pattern: pattern.to_string(),
                case_insensitive,
                compiled,
            },
            display,
        )
    }

    /// Creates a field presence test, rendering as `EXISTS(field)`.
    pub(crate) fn presence(field: Field) -> Self {
        let display = format!("EXISTS({})", field);
        Self::with_display(ExprKind::Exists { field }, display)
    }

    /// Returns the node kind.
    pub(crate) fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Names the expression, builder-style.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Assigns an alias, builder-style.
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the expression name if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the alias, falling back to the name.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref().or(self.name.as_deref())
    }

    /// The key this expression contributes to a result record:
    /// alias, else name, else the rendered expression text.
    pub(crate) fn result_key(&self) -> String {
        match self.alias() {
            Some(alias) => alias.to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display {
            Some(display) => write!(f, "{}", display)?,
            None => match &self.kind {
                ExprKind::Literal(value) => write!(f, "{}", value)?,
                ExprKind::Field(field) => write!(f, "{}", field.base_display())?,
                ExprKind::Call { name, args, .. } => {
                    let rendered = args
                        .iter()
                        .map(|arg| arg.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "{}({})", name, rendered)?;
                }
                // Every other kind captures a display string at construction.
                other => write!(f, "{:?}", other)?,
            },
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS `{}`", alias)?;
        }
        Ok(())
    }
}

impl From<Field> for Expr {
    /// A bare field reference; the field's alias carries over so projection
    /// keys work the same whether a field or an expression is selected.
    fn from(field: Field) -> Self {
        Self {
            name: Some(field.name().to_string()),
            alias: field.alias_if_set().map(str::to_string),
            display: None,
            kind: ExprKind::Field(field),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::literal(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::literal(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::literal(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::literal(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::literal(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::literal(value)
    }
}

/// Expression capture: every operation builds a new `Expr` node instead of
/// evaluating. Implemented by `Field` and `Expr`; a literal on the left is
/// written `Expr::literal(2).sub(field)`.
pub trait Operand: Into<Expr> + Sized {
    /// `(self == other)`
    fn eq(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Eq, self.into(), other.into())
    }

    /// `(self != other)`
    fn ne(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Ne, self.into(), other.into())
    }

    /// `(self < other)`
    fn lt(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Lt, self.into(), other.into())
    }

    /// `(self <= other)`
    fn le(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Le, self.into(), other.into())
    }

    /// `(self > other)`
    fn gt(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Gt, self.into(), other.into())
    }

    /// `(self >= other)`
    fn ge(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Ge, self.into(), other.into())
    }

    /// `(self + other)` — numeric addition or string concatenation.
    fn add(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Add, self.into(), other.into())
    }

    /// `(self - other)`
    fn sub(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Sub, self.into(), other.into())
    }

    /// `(self * other)`
    fn mul(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Mul, self.into(), other.into())
    }

    /// `(self / other)` — true division, always floating point.
    fn div(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Div, self.into(), other.into())
    }

    /// `(self // other)` — floor division.
    fn floordiv(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::FloorDiv, self.into(), other.into())
    }

    /// `(self % other)` — modulo; the result takes the divisor's sign.
    fn rem(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Rem, self.into(), other.into())
    }

    /// `(self AND other)`
    fn and(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::And, self.into(), other.into())
    }

    /// `(self OR other)`
    fn or(self, other: impl Into<Expr>) -> Expr {
        Expr::binary(BinaryOp::Or, self.into(), other.into())
    }

    /// `(NOT self)` — truthiness-based negation.
    fn not(self) -> Expr {
        Expr::negation(self.into())
    }

    /// `(self IN [values...])`
    fn in_list<V>(self, values: impl IntoIterator<Item = V>) -> Expr
    where
        V: Into<Value>,
    {
        let list = values
            .into_iter()
            .map(|value| Expr::literal(value))
            .collect();
        Expr::membership(self.into(), list)
    }

    /// `(self IS sentinel)` — strict same-type identity, e.g. `is_(true)`,
    /// `is_(Value::Null)`.
    fn is_(self, sentinel: impl Into<Value>) -> Expr {
        Expr::identity(self.into(), sentinel.into())
    }

    /// `CAST(self AS target)`
    fn cast_as(self, target: DataType) -> Expr {
        Expr::cast(target, self.into())
    }
}

impl Operand for Expr {}
impl Operand for Field {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use quill_core::Record;

    fn amounts() -> Collection {
        Collection::with_name(
            vec![Record::from_iter([("amount", Value::from(1i64))])],
            "Amounts",
        )
    }

    #[test]
    fn test_comparison_captures_instead_of_evaluating() {
        let amounts = amounts();
        let expr = amounts.field("amount").eq(1);
        assert!(matches!(
            expr.kind(),
            ExprKind::Binary {
                op: BinaryOp::Eq,
                ..
            }
        ));
        assert_eq!(expr.to_string(), "(`Amounts`.`amount` == 1)");
    }

    #[test]
    fn test_reflected_form_is_literal_on_the_left() {
        let amounts = amounts();
        let expr = Expr::literal(2).sub(amounts.field("amount"));
        assert_eq!(expr.to_string(), "(2 - `Amounts`.`amount`)");
    }

    #[test]
    fn test_chained_logic_display() {
        let amounts = amounts();
        let field = amounts.field("amount");
        let expr = field.clone().ge(3).and(field.le(6));
        assert_eq!(
            expr.to_string(),
            "((`Amounts`.`amount` >= 3) AND (`Amounts`.`amount` <= 6))"
        );
    }

    #[test]
    fn test_not_display() {
        let amounts = amounts();
        let expr = amounts.field("amount").eq(1).not();
        assert_eq!(expr.to_string(), "(NOT (`Amounts`.`amount` == 1))");
    }

    #[test]
    fn test_in_list_display() {
        let amounts = amounts();
        let expr = amounts.field("amount").in_list([1, 2, 3]);
        assert_eq!(expr.to_string(), "(`Amounts`.`amount` IN [1, 2, 3])");
    }

    #[test]
    fn test_alias_falls_back_to_name() {
        let expr = Expr::literal(1).set_name("one");
        assert_eq!(expr.alias(), Some("one"));
        let expr = expr.as_("first");
        assert_eq!(expr.name(), Some("one"));
        assert_eq!(expr.alias(), Some("first"));
    }

    #[test]
    fn test_aliased_display() {
        let expr = Expr::literal(1).as_("one");
        assert_eq!(expr.to_string(), "1 AS `one`");
    }

    #[test]
    fn test_cast_display() {
        let amounts = amounts();
        let expr = amounts.field("amount").cast_as(DataType::String);
        assert_eq!(
            expr.to_string(),
            "CAST(`Amounts`.`amount` AS STRING)"
        );
    }

    #[test]
    fn test_call_renders_operator_style() {
        let amounts = amounts();
        let expr = Expr::call(
            "double",
            |args| args[0].as_i64().map(|v| Value::Int64(v * 2)),
            vec![amounts.field("amount").into()],
        );
        assert_eq!(expr.to_string(), "double(`Amounts`.`amount`)");
    }

    #[test]
    fn test_result_key_prefers_alias() {
        let amounts = amounts();
        let aliased: Expr = amounts.field("amount").as_("total").into();
        assert_eq!(aliased.result_key(), "total");

        let named: Expr = amounts.field("amount").into();
        assert_eq!(named.result_key(), "amount");

        let bare = Expr::literal(1).add(Expr::literal(2));
        assert_eq!(bare.result_key(), "(1 + 2)");
    }
}
