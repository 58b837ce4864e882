//! Value expressions
//!
//! A value field holds one of:
//! - a literal number (`1000`, `-2.5`)
//! - the name of a setting or other stored subject
//! - `<number><word>`, the number times the resolved word (`20Shares`)
//! - `BMV<expr>`, a bond maturity value; the tag is stripped and the rest resolved
//!
//! Resolution recurses through names and is cut off at `MAX_RESOLVE_DEPTH`.
//! An unresolvable expression is not an error, it simply has no value yet.

use crate::model::{ModelData, tokens::BOND_MATURITY};

pub const MAX_RESOLVE_DEPTH: usize = 10;

/// Source of named numeric values for expression resolution
pub trait NamedValues {
    /// Numeric value of `name`, or `None` when it is unknown or unresolvable.
    /// `depth` is the recursion depth already used by the caller.
    fn named_value(&self, name: &str, depth: usize) -> Option<f64>;
}

/// Parse a finite literal number
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Split `20Shares` into (20, "Shares")
pub fn split_composite(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)?;
    if split == 0 {
        return None;
    }
    let (number, word) = text.split_at(split);
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    Some((parse_number(number)?, word))
}

/// Strip the bond maturity tag, if present
pub fn strip_bond_tag(text: &str) -> Option<&str> {
    text.trim().strip_prefix(BOND_MATURITY)
}

/// Setting a `BMV` value refers to: `BMV2Target` and `BMVTarget` both give `Target`
pub fn bond_target(expr: &str) -> Option<&str> {
    let rest = strip_bond_tag(expr)?.trim();
    let target = split_composite(rest).map_or(rest, |(_, word)| word);
    (!target.is_empty()).then_some(target)
}

/// Resolve an expression to a number
pub fn resolve_expression<N: NamedValues + ?Sized>(
    values: &N,
    expr: &str,
    depth: usize,
) -> Option<f64> {
    if depth > MAX_RESOLVE_DEPTH {
        tracing::warn!(expr, "value resolution exceeded depth bound");
        return None;
    }
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }
    if let Some(number) = parse_number(expr) {
        return Some(number);
    }
    if let Some(rest) = strip_bond_tag(expr) {
        return resolve_expression(values, rest, depth + 1);
    }
    if let Some(value) = values.named_value(expr, depth + 1) {
        return Some(value);
    }
    let (multiplier, word) = split_composite(expr)?;
    let base = values
        .named_value(word, depth + 1)
        .or_else(|| resolve_expression(values, word, depth + 1))?;
    Some(multiplier * base)
}

/// Settings of a stored model, for resolving values before simulation
pub struct ModelValues<'m> {
    model: &'m ModelData,
}

impl<'m> ModelValues<'m> {
    pub fn new(model: &'m ModelData) -> Self {
        Self { model }
    }

    pub fn resolve(&self, expr: &str) -> Option<f64> {
        resolve_expression(self, expr, 0)
    }
}

impl NamedValues for ModelValues<'_> {
    fn named_value(&self, name: &str, depth: usize) -> Option<f64> {
        let setting = self.model.setting(name)?;
        resolve_expression(self, &setting.value, depth)
    }
}
