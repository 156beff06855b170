//! Metric expression evaluator -- a small, restricted boolean expression
//! language checked against test-case parameters and run results.
//!
//! Expressions see exactly four things: the `test_case` body, the `results`
//! record, the `within_range` / `within_percent` helpers, and a math
//! function namespace. Nothing else resolves -- no assignment, no ambient
//! program state, no I/O. Anything outside that surface is classified as a
//! failure rather than evaluated.
//!
//! Typical metrics:
//!
//! ```text
//! within_range(results['Summary']['DeliveredPercent'], 95, 100)
//! within_percent(results['IPLayerCapacity'], test_case['target-mbps'], 10)
//! results['LossRatio'] <= 0.02 and results['MinRTT'] < 150
//! ```

mod ast;
mod eval;
mod parser;
mod token;

use serde::Serialize;

use self::eval::{Bindings, EvalFault};

/// Classified outcome of evaluating one metric expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    /// The expression text did not lex/parse.
    MalformedExpression(String),
    /// The expression referenced a name, function, key, or field that does
    /// not exist in the bound namespace.
    UndefinedReference(String),
    /// Any other evaluation fault: type mismatch, division by zero,
    /// out-of-range index, non-finite arithmetic.
    UnexpectedError(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::MalformedExpression(d) => write!(f, "MALFORMED ({d})"),
            Verdict::UndefinedReference(d) => write!(f, "UNDEFINED ({d})"),
            Verdict::UnexpectedError(d) => write!(f, "ERROR ({d})"),
        }
    }
}

/// One evaluated metric, attributed by name and original expression text.
#[derive(Debug, Clone, Serialize)]
pub struct MetricOutcome {
    pub metric: String,
    pub expression: String,
    pub verdict: Verdict,
}

/// Evaluate one named metric expression against a case and its results.
///
/// Never panics and never propagates an error: every failure mode is folded
/// into the returned [`Verdict`], so one broken metric cannot take down its
/// siblings or the suite.
pub fn evaluate_metric(
    metric: &str,
    expression: &str,
    test_case: &serde_json::Value,
    results: &serde_json::Value,
) -> MetricOutcome {
    let verdict = evaluate_verdict(expression, test_case, results);
    MetricOutcome {
        metric: metric.to_string(),
        expression: expression.to_string(),
        verdict,
    }
}

fn evaluate_verdict(
    expression: &str,
    test_case: &serde_json::Value,
    results: &serde_json::Value,
) -> Verdict {
    let parsed = match parser::parse(expression) {
        Ok(expr) => expr,
        Err(err) => return Verdict::MalformedExpression(err.to_string()),
    };

    let bindings = Bindings { test_case, results };
    match eval::evaluate(&parsed, &bindings) {
        Ok(value) => {
            if eval::is_truthy(&value) {
                Verdict::Pass
            } else {
                Verdict::Fail
            }
        }
        Err(EvalFault::Undefined(detail)) => Verdict::UndefinedReference(detail),
        Err(EvalFault::Fault(detail)) => Verdict::UnexpectedError(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(expr: &str) -> Verdict {
        let test_case = json!({
            "client-cli": "-f json 172.20.0.2",
            "server-cli": "",
            "target-mbps": 100,
            "metrics": { "x": "1 == 1" }
        });
        let results = json!({
            "throughput": 100,
            "LossRatio": 0.01,
            "Summary": { "DeliveredPercent": 99.3, "MinRTT": 12 },
            "Rates": [10, 20, 30]
        });
        evaluate_metric("m", expr, &test_case, &results).verdict
    }

    #[test]
    fn test_within_range_pass() {
        assert_eq!(check("within_range(results['throughput'], 90, 110)"), Verdict::Pass);
    }

    #[test]
    fn test_within_range_boundaries_inclusive() {
        assert_eq!(check("within_range(90, 90, 110)"), Verdict::Pass);
        assert_eq!(check("within_range(110, 90, 110)"), Verdict::Pass);
        assert_eq!(check("within_range(89.999, 90, 110)"), Verdict::Fail);
        assert_eq!(check("within_range(110.001, 90, 110)"), Verdict::Fail);
    }

    #[test]
    fn test_within_percent_semantics() {
        assert_eq!(check("within_percent(105, 100, 5)"), Verdict::Pass);
        assert_eq!(check("within_percent(106, 100, 5)"), Verdict::Fail);
        assert_eq!(check("within_percent(95, 100, 5)"), Verdict::Pass);
        // a == r holds for any non-negative delta
        assert_eq!(check("within_percent(100, 100, 0)"), Verdict::Pass);
    }

    #[test]
    fn test_within_percent_zero_reference_is_unexpected_error() {
        assert!(matches!(
            check("within_percent(5, 0, 10)"),
            Verdict::UnexpectedError(_)
        ));
    }

    #[test]
    fn test_missing_result_key_is_undefined_reference() {
        assert!(matches!(
            check("results['missing']"),
            Verdict::UndefinedReference(_)
        ));
    }

    #[test]
    fn test_unknown_name_is_undefined_reference() {
        assert!(matches!(check("bogus > 1"), Verdict::UndefinedReference(_)));
    }

    #[test]
    fn test_unknown_function_is_undefined_reference() {
        assert!(matches!(
            check("frobnicate(results['throughput'])"),
            Verdict::UndefinedReference(_)
        ));
    }

    #[test]
    fn test_syntax_error_is_malformed() {
        assert!(matches!(
            check("within_range(results['throughput'], 90,"),
            Verdict::MalformedExpression(_)
        ));
        assert!(matches!(check("1 ==="), Verdict::MalformedExpression(_)));
    }

    #[test]
    fn test_division_by_zero_is_unexpected_error() {
        assert!(matches!(check("1 / 0 == 1"), Verdict::UnexpectedError(_)));
    }

    #[test]
    fn test_nested_lookup_and_comparison() {
        assert_eq!(check("results['Summary']['DeliveredPercent'] >= 95"), Verdict::Pass);
        assert_eq!(check("results['Summary']['MinRTT'] > 50"), Verdict::Fail);
    }

    #[test]
    fn test_dot_access_on_objects() {
        assert_eq!(check("results.Summary.DeliveredPercent >= 95"), Verdict::Pass);
        assert!(matches!(
            check("results.Summary.Absent >= 95"),
            Verdict::UndefinedReference(_)
        ));
    }

    #[test]
    fn test_sequence_indexing() {
        assert_eq!(check("results['Rates'][0] == 10"), Verdict::Pass);
        assert_eq!(check("results['Rates'][-1] == 30"), Verdict::Pass);
        assert!(matches!(check("results['Rates'][9]"), Verdict::UnexpectedError(_)));
    }

    #[test]
    fn test_test_case_binding_visible() {
        assert_eq!(
            check("within_percent(results['throughput'], test_case['target-mbps'], 10)"),
            Verdict::Pass
        );
    }

    #[test]
    fn test_boolean_connectives() {
        assert_eq!(check("1 < 2 and 2 < 3"), Verdict::Pass);
        assert_eq!(check("1 < 2 && 2 > 3"), Verdict::Fail);
        assert_eq!(check("1 > 2 or 3 > 2"), Verdict::Pass);
        assert_eq!(check("not (1 > 2)"), Verdict::Pass);
        assert_eq!(check("!(1 < 2)"), Verdict::Fail);
    }

    #[test]
    fn test_math_namespace() {
        assert_eq!(check("math.sqrt(16) == 4"), Verdict::Pass);
        assert_eq!(check("sqrt(16) == 4"), Verdict::Pass);
        assert_eq!(check("math.fabs(0 - 3) == 3"), Verdict::Pass);
        assert_eq!(check("floor(1.9) == 1 and ceil(1.1) == 2"), Verdict::Pass);
        assert_eq!(check("min(3, 1, 2) == 1 and max(3, 1, 2) == 3"), Verdict::Pass);
    }

    #[test]
    fn test_chained_comparison_rejected_at_parse() {
        assert!(matches!(
            check("90 <= results['throughput'] <= 110"),
            Verdict::MalformedExpression(_)
        ));
    }

    #[test]
    fn test_truthy_non_boolean_results() {
        // Discouraged but defined: host truthiness conversion.
        assert_eq!(check("results['throughput']"), Verdict::Pass);
        assert_eq!(check("0"), Verdict::Fail);
        assert_eq!(check("''"), Verdict::Fail);
        assert_eq!(check("results['Summary']"), Verdict::Pass);
    }

    #[test]
    fn test_type_mismatch_is_unexpected_error() {
        assert!(matches!(
            check("results['Summary'] + 1 > 0"),
            Verdict::UnexpectedError(_)
        ));
    }
}
