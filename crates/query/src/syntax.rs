//! Keyword grammar definition and validation.
//!
//! A query's clause methods each feed one keyword token to a `Syntax`
//! instance; before execution the accumulated sentence is checked against the
//! query kind's grammar. A grammar is a sequence of quantified rules over
//! keyword tokens, compiled once to an anchored regular expression.
//!
//! ```
//! use quill_query::syntax::Syntax;
//!
//! let mut syntax = Syntax::select();
//! syntax.add_keyword("select").unwrap();
//! syntax.add_keyword("from").unwrap();
//! syntax.add_keyword("where").unwrap();
//! assert!(syntax.check().is_ok());
//! ```

use quill_core::{Error, Result};
use regex::Regex;
use std::cell::OnceCell;

/// How many times a rule may occur in a legal sentence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantifier {
    /// Exactly once.
    Once,
    /// Zero or one time.
    NoneOrOnce,
    /// Any number of times, including zero.
    NoneOrMore,
    /// One or more times.
    OnceOrMore,
}

impl Quantifier {
    /// Regex suffix applied to the rule's group.
    fn regex_suffix(&self) -> &'static str {
        match self {
            Quantifier::Once => "",
            Quantifier::NoneOrOnce => "?",
            Quantifier::NoneOrMore => "*",
            Quantifier::OnceOrMore => "+",
        }
    }

    /// Wraps a human-readable fragment in this quantifier's notation.
    fn describe(&self, inner: &str) -> String {
        match self {
            Quantifier::Once => inner.to_string(),
            Quantifier::NoneOrOnce => format!("[{}]", inner),
            Quantifier::NoneOrMore => format!("[{}]...", inner),
            Quantifier::OnceOrMore => format!("{}(...)", inner),
        }
    }
}

/// One element of a rule: a literal keyword or a nested quantified group.
#[derive(Clone, Debug)]
pub enum Term {
    /// A literal keyword token.
    Keyword(&'static str),
    /// A nested quantified group.
    Group(Rule),
}

/// A quantified sequence of terms.
#[derive(Clone, Debug)]
pub struct Rule {
    quantifier: Quantifier,
    terms: Vec<Term>,
}

impl Rule {
    /// Creates a rule from a term sequence.
    pub fn new(quantifier: Quantifier, terms: Vec<Term>) -> Self {
        Self { quantifier, terms }
    }

    /// Creates a single-keyword rule.
    pub fn keyword(quantifier: Quantifier, keyword: &'static str) -> Self {
        Self::new(quantifier, vec![Term::Keyword(keyword)])
    }

    /// Appends this rule's regex fragment. `first` tracks whether the next
    /// keyword is the first of the whole sentence (no leading space).
    fn regex_fragment(&self, out: &mut String, first: &mut bool) {
        out.push('(');
        for term in &self.terms {
            match term {
                Term::Keyword(keyword) => {
                    if !*first {
                        out.push(' ');
                    }
                    out.push_str(&keyword.to_uppercase());
                    *first = false;
                }
                Term::Group(rule) => rule.regex_fragment(out, first),
            }
        }
        out.push(')');
        out.push_str(self.quantifier.regex_suffix());
    }

    /// Human-readable rendering of this rule.
    fn describe(&self) -> String {
        let inner = self
            .terms
            .iter()
            .map(|term| match term {
                Term::Keyword(keyword) => keyword.to_uppercase(),
                Term::Group(rule) => rule.describe(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.quantifier.describe(&inner)
    }

    /// Collects this rule's keywords into the grammar alphabet.
    fn collect_keywords(&self, out: &mut Vec<String>) {
        for term in &self.terms {
            match term {
                Term::Keyword(keyword) => out.push(keyword.to_uppercase()),
                Term::Group(rule) => rule.collect_keywords(out),
            }
        }
    }
}

/// A query kind's grammar plus the keyword sentence accumulated so far.
#[derive(Debug)]
pub struct Syntax {
    rules: Vec<Rule>,
    sentence: Vec<String>,
    matcher: OnceCell<Regex>,
}

impl Syntax {
    /// Creates a grammar from quantified rules. A grammar with no rules
    /// accepts every sentence (degenerate case).
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            sentence: Vec::new(),
            matcher: OnceCell::new(),
        }
    }

    /// SELECT grammar: `SELECT FROM (JOIN ON?)* WHERE? ORDER_BY? LIMIT?`.
    pub fn select() -> Self {
        Self::new(vec![
            Rule::keyword(Quantifier::Once, "select"),
            Rule::keyword(Quantifier::Once, "from"),
            Rule::new(
                Quantifier::NoneOrMore,
                vec![
                    Term::Keyword("join"),
                    Term::Group(Rule::keyword(Quantifier::NoneOrOnce, "on")),
                ],
            ),
            Rule::keyword(Quantifier::NoneOrOnce, "where"),
            Rule::keyword(Quantifier::NoneOrOnce, "order_by"),
            Rule::keyword(Quantifier::NoneOrOnce, "limit"),
        ])
    }

    /// UPDATE grammar: `UPDATE SET WHERE?`.
    pub fn update() -> Self {
        Self::new(vec![
            Rule::keyword(Quantifier::Once, "update"),
            Rule::keyword(Quantifier::Once, "set"),
            Rule::keyword(Quantifier::NoneOrOnce, "where"),
        ])
    }

    /// DELETE grammar: `DELETE FROM WHERE?`.
    pub fn delete() -> Self {
        Self::new(vec![
            Rule::keyword(Quantifier::Once, "delete"),
            Rule::keyword(Quantifier::Once, "from"),
            Rule::keyword(Quantifier::NoneOrOnce, "where"),
        ])
    }

    /// ALTER grammar: `ALTER DROP WHERE?`.
    pub fn alter() -> Self {
        Self::new(vec![
            Rule::keyword(Quantifier::Once, "alter"),
            Rule::keyword(Quantifier::Once, "drop"),
            Rule::keyword(Quantifier::NoneOrOnce, "where"),
        ])
    }

    /// The anchored regular expression the grammar compiles to.
    pub fn pattern(&self) -> String {
        let mut out = String::from("^");
        let mut first = true;
        for rule in &self.rules {
            rule.regex_fragment(&mut out, &mut first);
        }
        out.push('$');
        out
    }

    /// Human-readable grammar rendering, e.g.
    /// `SELECT FROM [JOIN [ON]]... [WHERE] [ORDER_BY] [LIMIT]`.
    pub fn describe(&self) -> String {
        self.rules
            .iter()
            .map(Rule::describe)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Every keyword the grammar knows, upper-cased.
    pub fn allowed_keywords(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.collect_keywords(&mut out);
        }
        out
    }

    /// The space-joined sentence accumulated so far.
    pub fn sentence(&self) -> String {
        self.sentence.join(" ")
    }

    /// Appends a keyword to the sentence. The token must belong to the
    /// grammar's alphabet; matching is case-insensitive.
    pub fn add_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = keyword.to_uppercase();
        if !self.rules.is_empty() && self.allowed_keywords().contains(&token) {
            self.sentence.push(token);
            Ok(())
        } else {
            Err(Error::unknown_keyword(keyword))
        }
    }

    /// Checks the accumulated sentence against the grammar. A grammar with
    /// no rules always passes.
    pub fn check(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Ok(());
        }
        if self.matcher()?.is_match(&self.sentence()) {
            Ok(())
        } else {
            Err(Error::syntax_mismatch(self.sentence(), self.describe()))
        }
    }

    fn matcher(&self) -> Result<&Regex> {
        if let Some(regex) = self.matcher.get() {
            return Ok(regex);
        }
        let regex = Regex::new(&self.pattern())
            .map_err(|e| Error::invalid_operation(format!("grammar did not compile: {}", e)))?;
        Ok(self.matcher.get_or_init(|| regex))
    }
}
