//! Deferred field references.
//!
//! A `Field` names one field of a collection without reading it; resolution
//! happens later against whatever record an evaluation context binds for
//! that collection. Fields are cheap handles and double as the left-hand
//! side of captured expressions via the `Operand` trait.

use crate::collection::Collection;
use crate::eval::EvalContext;
use crate::expr::Expr;
use quill_core::{DataType, Value};
use std::fmt;

/// A deferred reference to the value of one named field in a collection.
#[derive(Clone, Debug)]
pub struct Field {
    collection: Collection,
    name: String,
    alias: Option<String>,
}

impl Field {
    pub(crate) fn new(collection: Collection, name: impl Into<String>) -> Self {
        Self {
            collection,
            name: name.into(),
            alias: None,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the alias, falling back to the field name.
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Returns the alias only if one was explicitly assigned.
    pub(crate) fn alias_if_set(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the owning collection handle.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Assigns an alias, builder-style.
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Reads the field from the record the context binds for this field's
    /// collection. An unbound collection is an evaluation fault (absent); a
    /// bound record without the field reads as `Null`.
    pub fn resolve(&self, ctx: &EvalContext) -> Option<Value> {
        let index = ctx.get(self.collection.id())?;
        self.collection.field_value(index, &self.name)
    }

    /// Expression testing whether the bound record carries this field.
    pub fn exists(self) -> Expr {
        Expr::presence(self)
    }

    /// Cast expression over this field's value, named after the field so the
    /// cast keeps its projection key.
    pub fn cast_as(self, target: DataType) -> Expr {
        let name = self.name.clone();
        Expr::cast(target, self.into()).set_name(name)
    }

    /// Regex match over this field's string value, anchored at the start of
    /// the value.
    pub fn like(self, pattern: &str) -> Expr {
        Expr::regex_match(self.into(), pattern, false)
    }

    /// Case-insensitive variant of [`Field::like`].
    pub fn like_insensitive(self, pattern: &str) -> Expr {
        Expr::regex_match(self.into(), pattern, true)
    }

    /// Applies a caller-supplied function with this field's value as the
    /// first argument, plus any extra argument expressions.
    pub fn func(
        self,
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Option<Value> + 'static,
        extra_args: Vec<Expr>,
    ) -> Expr {
        let mut args: Vec<Expr> = vec![self.into()];
        args.extend(extra_args);
        Expr::call(name, func, args)
    }

    /// Rendering without the alias suffix; `Display` adds ` AS \`alias\``.
    pub(crate) fn base_display(&self) -> String {
        format!("{}.`{}`", self.collection, self.name)
    }
}

impl PartialEq for Field {
    /// Two fields are equal iff same collection, same name, same alias.
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
            && self.name == other.name
            && self.alias == other.alias
    }
}

impl Eq for Field {}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_display())?;
        if let Some(alias) = &self.alias {
            write!(f, " AS `{}`", alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Record;

    fn elements() -> Collection {
        Collection::with_name(
            vec![
                Record::from_iter([
                    ("element", Value::from("Element 0")),
                    ("amount", Value::from(0i64)),
                ]),
                Record::from_iter([
                    ("element", Value::from("Element 1")),
                    ("amount", Value::from(1i64)),
                ]),
            ],
            "TestCollection",
        )
    }

    #[test]
    fn test_field_equality() {
        let elements = elements();
        assert_eq!(elements.field("element"), elements.field("element"));
        assert_ne!(elements.field("element"), elements.field("amount"));
        assert_ne!(
            elements.field("element"),
            elements.field("element").as_("aliased")
        );

        let other = Collection::new(Vec::new());
        assert_ne!(elements.field("element"), other.field("element"));
    }

    #[test]
    fn test_name_and_alias() {
        let elements = elements();
        let field = elements.field("element");
        assert_eq!(field.name(), "element");
        assert_eq!(field.alias(), "element");

        let field = field.as_("AliasedField");
        assert_eq!(field.name(), "element");
        assert_eq!(field.alias(), "AliasedField");
    }

    #[test]
    fn test_field_display() {
        let elements = elements();
        assert_eq!(
            elements.field("element").to_string(),
            "`TestCollection`.`element`"
        );
        assert_eq!(
            elements.field("element").as_("e").to_string(),
            "`TestCollection`.`element` AS `e`"
        );
    }

    #[test]
    fn test_resolution_through_context() {
        let elements = elements();
        let field = elements.field("amount");

        let mut ctx = EvalContext::new();
        ctx.bind(&elements, 1);
        assert_eq!(field.resolve(&ctx), Some(Value::Int64(1)));

        // Missing field reads as Null.
        assert_eq!(
            elements.field("missing").resolve(&ctx),
            Some(Value::Null)
        );

        // Unbound collection is absent.
        let unbound = EvalContext::new();
        assert_eq!(field.resolve(&unbound), None);
    }

    #[test]
    fn test_exists() {
        let elements = elements();
        let mut ctx = EvalContext::new();
        ctx.bind(&elements, 0);
        assert_eq!(
            elements.field("element").exists().resolve(&ctx),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            elements.field("unknown_key").exists().resolve(&ctx),
            Some(Value::Boolean(false))
        );
    }
}
