//! Maps a polymorphic test input onto a call of the entry function.
//!
//! Rule order is a contract:
//! 1. pairs always unpack positionally
//! 2. bare scalars are always a single argument
//! 3. a sequence against arity 1 passes through whole
//! 4. a sequence whose length equals an arity above 1 unpacks
//! 5. anything else tries unpacking first and falls back to passing
//!    the sequence as one argument on arity mismatch

use serde_json::Value;

use crate::state::TestInput;

#[derive(Debug, Clone, PartialEq)]
pub enum CallPlan {
    /// Call with one argument.
    Single(Value),
    /// Unpack positionally.
    Unpack(Vec<Value>),
    /// Unpack positionally; on arity mismatch retry with the whole
    /// sequence as one argument.
    UnpackOrSingle(Vec<Value>),
}

impl CallPlan {
    pub fn kind(&self) -> &'static str {
        match self {
            CallPlan::Single(_) => "single",
            CallPlan::Unpack(_) => "unpack",
            CallPlan::UnpackOrSingle(_) => "unpack_or_single",
        }
    }

    pub fn args(&self) -> Vec<Value> {
        match self {
            CallPlan::Single(v) => vec![v.clone()],
            CallPlan::Unpack(items) | CallPlan::UnpackOrSingle(items) => items.clone(),
        }
    }
}

pub fn bind(arity: usize, input: &TestInput) -> CallPlan {
    match input {
        TestInput::Pair(a, b) => CallPlan::Unpack(vec![a.clone(), b.clone()]),
        TestInput::Scalar(v) => CallPlan::Single(v.clone()),
        TestInput::Sequence(items) => {
            if arity == 1 {
                CallPlan::Single(Value::Array(items.clone()))
            } else if arity > 1 && items.len() == arity {
                CallPlan::Unpack(items.clone())
            } else {
                CallPlan::UnpackOrSingle(items.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(values: &[Value]) -> TestInput {
        TestInput::Sequence(values.to_vec())
    }

    #[test]
    fn unary_entry_receives_whole_sequence() {
        let plan = bind(1, &seq(&[json!(1), json!(2), json!(3)]));
        assert_eq!(plan, CallPlan::Single(json!([1, 2, 3])));
    }

    #[test]
    fn matching_length_unpacks() {
        let plan = bind(2, &seq(&[json!(3), json!(5)]));
        assert_eq!(plan, CallPlan::Unpack(vec![json!(3), json!(5)]));
    }

    #[test]
    fn ambiguous_length_tries_unpack_then_single() {
        let plan = bind(2, &seq(&[json!(1), json!(2), json!(3)]));
        assert_eq!(
            plan,
            CallPlan::UnpackOrSingle(vec![json!(1), json!(2), json!(3)])
        );
    }

    #[test]
    fn pairs_always_unpack() {
        // Arity 1 would keep a plain sequence whole; a pair still unpacks.
        let plan = bind(1, &TestInput::Pair(json!([2, 7, 11, 15]), json!(9)));
        assert_eq!(plan, CallPlan::Unpack(vec![json!([2, 7, 11, 15]), json!(9)]));
    }

    #[test]
    fn scalars_pass_through() {
        let plan = bind(3, &TestInput::Scalar(json!("racecar")));
        assert_eq!(plan, CallPlan::Single(json!("racecar")));
    }

    #[test]
    fn empty_sequence_against_unary_entry_stays_whole() {
        let plan = bind(1, &seq(&[]));
        assert_eq!(plan, CallPlan::Single(json!([])));
    }

    #[test]
    fn empty_sequence_against_wider_arity_falls_back() {
        let plan = bind(2, &seq(&[]));
        assert_eq!(plan, CallPlan::UnpackOrSingle(vec![]));
    }
}
