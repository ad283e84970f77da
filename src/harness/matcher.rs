//! Tolerant equality between a candidate's actual output and the
//! expected value of a test case.

use serde_json::{Number, Value};

const FLOAT_TOLERANCE: f64 = 1e-9;

/// True when `actual` matches `expected`.
///
/// Numeric comparisons tolerate an absolute error below 1e-9 whenever
/// either side carries a floating representation. Sequences compare
/// element-wise with the same per-element tolerance, one level deep:
/// nested sequences of floats fall through to exact equality.
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(e)) => numbers_match(a, e),
        (Value::Array(a), Value::Array(e)) => {
            if a.len() != e.len() {
                return false;
            }
            a.iter().zip(e).all(|(av, ev)| match (av, ev) {
                (Value::Number(an), Value::Number(en)) => numbers_match(an, en),
                _ => av == ev,
            })
        }
        _ => actual == expected,
    }
}

fn numbers_match(a: &Number, e: &Number) -> bool {
    if a.is_f64() || e.is_f64() {
        match (a.as_f64(), e.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < FLOAT_TOLERANCE,
            _ => false,
        }
    } else {
        a == e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matching_is_reflexive() {
        for v in [
            json!(0),
            json!(-7),
            json!(3.5),
            json!("racecar"),
            json!(true),
            json!(null),
            json!([1, 2, 3]),
            json!([[1.0, 2.0], [3.0]]),
            json!({ "k": 1 }),
        ] {
            assert!(values_match(&v, &v), "{v} should match itself");
        }
    }

    #[test]
    fn floats_within_tolerance_match() {
        assert!(values_match(&json!(0.1), &json!(0.1 + 1e-12)));
        assert!(values_match(&json!(2.0), &json!(2)));
        assert!(!values_match(&json!(0.1), &json!(0.1 + 1e-6)));
    }

    #[test]
    fn integers_compare_exactly() {
        assert!(values_match(&json!(5), &json!(5)));
        assert!(!values_match(&json!(5), &json!(6)));
    }

    #[test]
    fn sequences_compare_element_wise_with_tolerance() {
        assert!(values_match(
            &json!([1.0, 2.0 + 1e-12, "x"]),
            &json!([1.0, 2.0, "x"])
        ));
        assert!(!values_match(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(!values_match(&json!([1, 2]), &json!([1, 3])));
    }

    #[test]
    fn nested_sequences_are_not_tolerant() {
        // One level deep only: inner float arrays compare exactly.
        assert!(!values_match(&json!([[1.0 + 1e-12]]), &json!([[1.0]])));
        assert!(values_match(&json!([[1.0]]), &json!([[1.0]])));
    }

    #[test]
    fn mismatched_shapes_do_not_match() {
        assert!(!values_match(&json!([1]), &json!(1)));
        assert!(!values_match(&json!("1"), &json!(1)));
        assert!(!values_match(&json!(true), &json!(1)));
    }
}
