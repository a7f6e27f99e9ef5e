//! Condition predicate evaluation.
//!
//! `ConditionEvaluator` is a pure function over `(condition, context)`: no
//! side effects, same inputs always produce the same branch decision.
//! Evaluation failures (absent fields in comparisons, malformed patterns or
//! expressions) are coerced to `false` so traversal stays deterministic.
//!
//! The `custom` predicate runs a JEXL expression through `jexl_eval` with a
//! small transform library. Context data is always passed as an evaluation
//! context object, NEVER interpolated into the expression string, and the
//! grammar has no IO or host access -- this is deliberately not an
//! arbitrary-code primitive.

use std::collections::HashMap;

use serde_json::{Value, json};
use uniflow_types::error::ConditionError;
use uniflow_types::workflow::{ConditionSpec, PredicateKind};

use super::context::expression_context;

/// Evaluates condition predicates against an execution context.
pub struct ConditionEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl ConditionEvaluator {
    /// Create a new evaluator with the standard transforms registered.
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            .with_transform("contains", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let search = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.contains(search)))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.len(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            });

        Self { evaluator }
    }

    /// Evaluate a condition, coercing any evaluation error to `false`.
    pub fn evaluate(&self, condition: &ConditionSpec, context: &HashMap<String, Value>) -> bool {
        match self.try_evaluate(condition, context) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(
                    field = condition.field.as_str(),
                    %err,
                    "condition evaluation failed, treating as false"
                );
                false
            }
        }
    }

    /// Evaluate a condition, preserving the typed error.
    pub fn try_evaluate(
        &self,
        condition: &ConditionSpec,
        context: &HashMap<String, Value>,
    ) -> Result<bool, ConditionError> {
        let field_value = context.get(&condition.field);

        match condition.predicate {
            PredicateKind::Equals => Ok(field_value
                .map(|v| values_equal(v, &condition.operand))
                .unwrap_or(false)),

            PredicateKind::Contains => {
                let haystack = field_value.map(stringify).unwrap_or_default();
                Ok(haystack.contains(&stringify(&condition.operand)))
            }

            PredicateKind::GreaterThan => {
                let (field, operand) = self.numeric_pair(condition, field_value)?;
                Ok(field > operand)
            }

            PredicateKind::LessThan => {
                let (field, operand) = self.numeric_pair(condition, field_value)?;
                Ok(field < operand)
            }

            PredicateKind::IsEmpty => Ok(match field_value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            }),

            PredicateKind::MatchesPattern => {
                let pattern = stringify(&condition.operand);
                // Anchored: the full stringified field must match.
                let regex = regex::Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| ConditionError::InvalidPattern(e.to_string()))?;
                let subject = field_value.map(stringify).unwrap_or_default();
                Ok(regex.is_match(&subject))
            }

            PredicateKind::Custom => {
                let expression = condition.operand.as_str().ok_or_else(|| {
                    ConditionError::Expression(
                        "custom predicate operand must be an expression string".to_string(),
                    )
                })?;
                let result = self
                    .evaluator
                    .eval_in_context(expression, &expression_context(context))
                    .map_err(|e| ConditionError::Expression(e.to_string()))?;
                Ok(truthy(&result))
            }
        }
    }

    fn numeric_pair(
        &self,
        condition: &ConditionSpec,
        field_value: Option<&Value>,
    ) -> Result<(f64, f64), ConditionError> {
        let field = field_value.and_then(numeric).ok_or_else(|| {
            ConditionError::TypeConversion(format!(
                "field '{}' is absent or not numeric",
                condition.field
            ))
        })?;
        let operand = numeric(&condition.operand).ok_or_else(|| {
            ConditionError::TypeConversion("operand is not numeric".to_string())
        })?;
        Ok((field, operand))
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Exact value equality, except two numerics compare numerically so that
/// `1` equals `1.0`. A string field never equals a numeric operand.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Numeric view of a value: a JSON number, or a string that parses as one.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Display string for substring and pattern predicates.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// JS-like truthiness for custom expression results.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> ConditionEvaluator {
        ConditionEvaluator::new()
    }

    fn condition(predicate: PredicateKind, field: &str, operand: Value) -> ConditionSpec {
        ConditionSpec {
            predicate,
            field: field.to_string(),
            operand,
            on_true: Some("yes".to_string()),
            on_false: Some("no".to_string()),
        }
    }

    fn context(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // -------------------------------------------------------------------
    // equals
    // -------------------------------------------------------------------

    #[test]
    fn equals_exact_string() {
        let eval = evaluator();
        let ctx = context(&[("status", json!("open"))]);
        assert!(eval.evaluate(&condition(PredicateKind::Equals, "status", json!("open")), &ctx));
        assert!(!eval.evaluate(&condition(PredicateKind::Equals, "status", json!("closed")), &ctx));
    }

    #[test]
    fn equals_is_type_sensitive() {
        let eval = evaluator();
        // A string field never equals a numeric operand.
        let ctx = context(&[("amount", json!("100"))]);
        assert!(!eval.evaluate(&condition(PredicateKind::Equals, "amount", json!(100)), &ctx));
    }

    #[test]
    fn equals_compares_numerics_numerically() {
        let eval = evaluator();
        let ctx = context(&[("amount", json!(100))]);
        assert!(eval.evaluate(&condition(PredicateKind::Equals, "amount", json!(100.0)), &ctx));
    }

    #[test]
    fn equals_absent_field_is_false() {
        let eval = evaluator();
        let ctx = context(&[]);
        assert!(!eval.evaluate(&condition(PredicateKind::Equals, "missing", json!("x")), &ctx));
    }

    // -------------------------------------------------------------------
    // contains
    // -------------------------------------------------------------------

    #[test]
    fn contains_substring() {
        let eval = evaluator();
        let ctx = context(&[("subject", json!("Invoice overdue notice"))]);
        assert!(eval.evaluate(&condition(PredicateKind::Contains, "subject", json!("overdue")), &ctx));
        assert!(!eval.evaluate(&condition(PredicateKind::Contains, "subject", json!("paid")), &ctx));
    }

    #[test]
    fn contains_stringifies_non_strings() {
        let eval = evaluator();
        let ctx = context(&[("code", json!(40404))]);
        assert!(eval.evaluate(&condition(PredicateKind::Contains, "code", json!(404)), &ctx));
    }

    // -------------------------------------------------------------------
    // greater_than / less_than
    // -------------------------------------------------------------------

    #[test]
    fn greater_than_numeric() {
        let eval = evaluator();
        let cond = condition(PredicateKind::GreaterThan, "amount", json!(100));
        assert!(eval.evaluate(&cond, &context(&[("amount", json!(150))])));
        assert!(!eval.evaluate(&cond, &context(&[("amount", json!(50))])));
        assert!(!eval.evaluate(&cond, &context(&[("amount", json!(100))])));
    }

    #[test]
    fn greater_than_parses_numeric_strings() {
        let eval = evaluator();
        let cond = condition(PredicateKind::GreaterThan, "amount", json!(100));
        assert!(eval.evaluate(&cond, &context(&[("amount", json!("150"))])));
    }

    #[test]
    fn greater_than_non_numeric_field_is_false() {
        let eval = evaluator();
        let cond = condition(PredicateKind::GreaterThan, "amount", json!(100));
        let ctx = context(&[("amount", json!("x"))]);
        assert!(!eval.evaluate(&cond, &ctx));

        let err = eval.try_evaluate(&cond, &ctx).unwrap_err();
        assert!(matches!(err, ConditionError::TypeConversion(_)));
    }

    #[test]
    fn greater_than_absent_field_is_false() {
        let eval = evaluator();
        let cond = condition(PredicateKind::GreaterThan, "amount", json!(100));
        assert!(!eval.evaluate(&cond, &context(&[])));
    }

    #[test]
    fn less_than_numeric() {
        let eval = evaluator();
        let cond = condition(PredicateKind::LessThan, "amount", json!(100));
        assert!(eval.evaluate(&cond, &context(&[("amount", json!(50))])));
        assert!(!eval.evaluate(&cond, &context(&[("amount", json!(150))])));
    }

    // -------------------------------------------------------------------
    // is_empty
    // -------------------------------------------------------------------

    #[test]
    fn is_empty_absent_null_and_empty_string() {
        let eval = evaluator();
        let cond = condition(PredicateKind::IsEmpty, "email", Value::Null);
        assert!(eval.evaluate(&cond, &context(&[])));
        assert!(eval.evaluate(&cond, &context(&[("email", Value::Null)])));
        assert!(eval.evaluate(&cond, &context(&[("email", json!(""))])));
        assert!(!eval.evaluate(&cond, &context(&[("email", json!("a@b.com"))])));
        assert!(!eval.evaluate(&cond, &context(&[("email", json!(0))])));
    }

    // -------------------------------------------------------------------
    // matches_pattern
    // -------------------------------------------------------------------

    #[test]
    fn matches_pattern_is_full_match() {
        let eval = evaluator();
        let cond = condition(
            PredicateKind::MatchesPattern,
            "email",
            json!(r"[a-z]+@[a-z]+\.com"),
        );
        assert!(eval.evaluate(&cond, &context(&[("email", json!("a@b.com"))])));
        // Partial matches do not count.
        assert!(!eval.evaluate(&cond, &context(&[("email", json!("a@b.com extra"))])));
    }

    #[test]
    fn matches_pattern_invalid_pattern_is_false() {
        let eval = evaluator();
        let cond = condition(PredicateKind::MatchesPattern, "email", json!("("));
        let ctx = context(&[("email", json!("a@b.com"))]);
        assert!(!eval.evaluate(&cond, &ctx));

        let err = eval.try_evaluate(&cond, &ctx).unwrap_err();
        assert!(matches!(err, ConditionError::InvalidPattern(_)));
    }

    // -------------------------------------------------------------------
    // custom
    // -------------------------------------------------------------------

    #[test]
    fn custom_expression_over_context() {
        let eval = evaluator();
        let cond = condition(
            PredicateKind::Custom,
            "",
            json!("amount > 100 && status == 'open'"),
        );
        assert!(eval.evaluate(
            &cond,
            &context(&[("amount", json!(150)), ("status", json!("open"))]),
        ));
        assert!(!eval.evaluate(
            &cond,
            &context(&[("amount", json!(150)), ("status", json!("closed"))]),
        ));
    }

    #[test]
    fn custom_expression_with_transform() {
        let eval = evaluator();
        let cond = condition(PredicateKind::Custom, "", json!("name|lower == 'alice'"));
        assert!(eval.evaluate(&cond, &context(&[("name", json!("ALICE"))])));
    }

    #[test]
    fn custom_malformed_expression_is_false() {
        let eval = evaluator();
        let cond = condition(PredicateKind::Custom, "", json!("amount >"));
        let ctx = context(&[("amount", json!(1))]);
        assert!(!eval.evaluate(&cond, &ctx));

        let err = eval.try_evaluate(&cond, &ctx).unwrap_err();
        assert!(matches!(err, ConditionError::Expression(_)));
    }

    #[test]
    fn custom_non_string_operand_is_false() {
        let eval = evaluator();
        let cond = condition(PredicateKind::Custom, "", json!(42));
        assert!(!eval.evaluate(&cond, &context(&[])));
    }

    // -------------------------------------------------------------------
    // determinism
    // -------------------------------------------------------------------

    #[test]
    fn evaluation_is_referentially_transparent() {
        let eval = evaluator();
        let cond = condition(PredicateKind::GreaterThan, "amount", json!(100));
        let ctx = context(&[("amount", json!(150))]);
        let first = eval.evaluate(&cond, &ctx);
        for _ in 0..10 {
            assert_eq!(eval.evaluate(&cond, &ctx), first);
        }
    }
}
