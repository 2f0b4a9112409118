//! Local evaluation helpers: applying a parsed `filter` condition to a
//! fetched triple set, and the shaped result tree `expand` produces.

use edgegraph_query::{CompOp, Condition, Literal};
use edgegraph_types::{EntityId, Triple, TypedValue};

/// The executor's output shape: a single entity, a list of entities (one
/// per traversal-frontier member), or null (lookup miss / filtered out).
#[derive(Debug, Clone, PartialEq)]
pub enum ExecValue {
    Null,
    Entity { id: EntityId, fields: Vec<(String, ExecValue)>, triples: Vec<Triple> },
    List(Vec<ExecValue>),
    Scalar(TypedValue),
}

/// Evaluates `condition` against one entity's current triple set. A field
/// with no live triple never satisfies a comparison (spec: filters apply
/// "locally over returned triples" — an absent predicate can't compare
/// true against anything).
pub fn matches_condition(triples: &[Triple], condition: &Condition) -> bool {
    match condition {
        Condition::Comparison(cmp) => {
            let Some(triple) = triples.iter().find(|t| t.predicate.as_str() == cmp.field) else {
                return false;
            };
            compare(&triple.object, cmp.op, &cmp.literal)
        }
        Condition::And(l, r) => matches_condition(triples, l) && matches_condition(triples, r),
        Condition::Or(l, r) => matches_condition(triples, l) || matches_condition(triples, r),
    }
}

fn compare(value: &TypedValue, op: CompOp, literal: &Literal) -> bool {
    match (value, literal) {
        (TypedValue::Int32(n), Literal::Number(rhs)) => compare_f64(*n as f64, op, *rhs),
        (TypedValue::Int64(n), Literal::Number(rhs)) => compare_f64(*n as f64, op, *rhs),
        (TypedValue::Float64(n), Literal::Number(rhs)) => compare_f64(*n, op, *rhs),
        (TypedValue::Timestamp(n), Literal::Number(rhs)) => compare_f64(*n as f64, op, *rhs),
        (TypedValue::String(s), Literal::String(rhs)) => compare_str(s, op, rhs),
        (TypedValue::Url(s), Literal::String(rhs)) => compare_str(s, op, rhs),
        _ => false,
    }
}

fn compare_f64(lhs: f64, op: CompOp, rhs: f64) -> bool {
    match op {
        CompOp::Gt => lhs > rhs,
        CompOp::Lt => lhs < rhs,
        CompOp::Gte => lhs >= rhs,
        CompOp::Lte => lhs <= rhs,
        CompOp::Eq => lhs == rhs,
        CompOp::Neq => lhs != rhs,
    }
}

fn compare_str(lhs: &str, op: CompOp, rhs: &str) -> bool {
    match op {
        CompOp::Eq => lhs == rhs,
        CompOp::Neq => lhs != rhs,
        CompOp::Gt => lhs > rhs,
        CompOp::Lt => lhs < rhs,
        CompOp::Gte => lhs >= rhs,
        CompOp::Lte => lhs <= rhs,
    }
}
