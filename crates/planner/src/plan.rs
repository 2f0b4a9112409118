//! AST → `QueryPlan` compilation (spec §4.8): step ordering, the additive
//! cost model, and cache-key derivation.

use edgegraph_query::{CompOp, Condition, Expansion, Field, Query, SourceKey, Step};

use crate::error::{PlanError, PlanResult};
use crate::shard::shard_for;

/// Implementation maximum for `.pred*[depth N]` recursion; the spec
/// requires *a* clamp, not a specific value, and 10 is the example it
/// gives (§4.8).
pub const MAX_RECURSION_DEPTH: u32 = 10;

/// Calibrated cost weights (spec §4.8: "concrete constants are an
/// implementation calibration"). Reverse traversals cost more than
/// forward ones because they scatter across the predicate index rather
/// than following a single ref.
const C_LOOKUP: f64 = 1.0;
const C_TRAVERSE: f64 = 2.0;
const C_REVERSE: f64 = 3.0;
const C_FILTER: f64 = 0.5;
const C_EXPAND_FIELD: f64 = 1.0;
const C_RECURSE_BASE: f64 = 2.0;

/// Generous ceiling for non-adversarial queries; recursion depth is
/// already clamped to [`MAX_RECURSION_DEPTH`] and the parser bounds
/// expansion/filter nesting, so this mostly guards against a future step
/// kind whose cost term isn't yet bounded.
const MAX_COST: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Lookup { label: String, key: SourceKey, shard: u32 },
    Traverse { predicate: String, shard: u32 },
    Reverse { predicate: String, shard: u32 },
    Filter(Condition),
    Recurse { predicate: String, max_depth: u32, shard: u32 },
    Expand { fields: Vec<Field> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub steps: Vec<PlanStep>,
    pub shards: Vec<u32>,
    pub estimated_cost: f64,
    pub can_cache: bool,
    pub cache_key: String,
}

/// Compiles a parsed query into an ordered, costed, cacheable plan.
///
/// Ordering invariants enforced by construction (spec §4.8): `lookup` is
/// always first; each `traverse`/`reverse` precedes the `filter` that
/// follows it in source order (steps are emitted in AST order, which is
/// already that order); `expand` is always last.
pub fn compile(query: &Query, namespace: &str) -> PlanResult<QueryPlan> {
    let subject_repr = source_key_repr(&query.source.key);
    let shard = shard_for(namespace, &format!("{}:{}", query.source.label, subject_repr));

    let mut steps = vec![PlanStep::Lookup { label: query.source.label.clone(), key: query.source.key.clone(), shard }];
    let mut cost = C_LOOKUP;

    for step in &query.steps {
        match step {
            Step::Forward(predicate) => {
                steps.push(PlanStep::Traverse { predicate: predicate.clone(), shard });
                cost += C_TRAVERSE;
            }
            Step::Reverse(predicate) => {
                steps.push(PlanStep::Reverse { predicate: predicate.clone(), shard });
                cost += C_REVERSE;
            }
            Step::Recurse { predicate, max_depth } => {
                if *max_depth > MAX_RECURSION_DEPTH {
                    return Err(PlanError::RecursionDepthExceeded {
                        requested: *max_depth,
                        max: MAX_RECURSION_DEPTH,
                    });
                }
                steps.push(PlanStep::Recurse { predicate: predicate.clone(), max_depth: *max_depth, shard });
                cost += C_RECURSE_BASE * (*max_depth as f64).powf(1.5);
            }
            Step::Filter(condition) => {
                steps.push(PlanStep::Filter(condition.clone()));
                cost += C_FILTER;
            }
        }
    }

    if let Some(expansion) = &query.expansion {
        cost += C_EXPAND_FIELD * count_fields(expansion) as f64;
        steps.push(PlanStep::Expand { fields: expansion.fields.clone() });
    }

    if cost > MAX_COST {
        return Err(PlanError::CostOverflow { cost, max: MAX_COST });
    }

    Ok(QueryPlan { steps, shards: vec![shard], estimated_cost: cost, can_cache: true, cache_key: cache_key_for(query) })
}

fn count_fields(expansion: &Expansion) -> usize {
    expansion.fields.iter().map(|f| 1 + f.nested.as_ref().map(count_fields).unwrap_or(0)).sum()
}

fn source_key_repr(key: &SourceKey) -> String {
    match key {
        SourceKey::Number(n) => format!("n:{n}"),
        SourceKey::String(s) => format!("s:{s}"),
    }
}

/// Builds a deterministic cache key from the query's shape. Two
/// structurally identical queries (same source, same predicates/fields in
/// the same order) always collide; varying the source id changes the key
/// because the id is embedded. Filter *literal values* are deliberately
/// left out of the key — only the field and operator participate — so
/// queries differing solely in a comparison's right-hand side may share a
/// cached plan, per the spec's explicitly documented-policy carve-out
/// (§4.8, §8 property 6).
pub(crate) fn cache_key_for(query: &Query) -> String {
    let mut key = format!("{}:{}", query.source.label, source_key_repr(&query.source.key));
    for step in &query.steps {
        key.push('|');
        match step {
            Step::Forward(p) => key.push_str(&format!("fwd:{p}")),
            Step::Reverse(p) => key.push_str(&format!("rev:{p}")),
            Step::Recurse { predicate, max_depth } => key.push_str(&format!("rec:{predicate}:{max_depth}")),
            Step::Filter(condition) => key.push_str(&format!("filter:{}", condition_shape(condition))),
        }
    }
    if let Some(expansion) = &query.expansion {
        key.push_str("|expand:");
        key.push_str(&expansion_shape(expansion));
    }
    key
}

fn condition_shape(condition: &Condition) -> String {
    match condition {
        Condition::Comparison(cmp) => format!("{}{}", cmp.field, op_shape(cmp.op)),
        Condition::And(l, r) => format!("({} AND {})", condition_shape(l), condition_shape(r)),
        Condition::Or(l, r) => format!("({} OR {})", condition_shape(l), condition_shape(r)),
    }
}

fn op_shape(op: CompOp) -> &'static str {
    match op {
        CompOp::Gt => ">",
        CompOp::Lt => "<",
        CompOp::Gte => ">=",
        CompOp::Lte => "<=",
        CompOp::Eq => "=",
        CompOp::Neq => "!=",
    }
}

fn expansion_shape(expansion: &Expansion) -> String {
    expansion
        .fields
        .iter()
        .map(|f| match &f.nested {
            Some(nested) => format!("{}{{{}}}", f.name, expansion_shape(nested)),
            None => f.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_step_order_matches_spec_example() {
        let query = edgegraph_query::parse("user:123.friends[?age > 30].posts { title, author { name } }").unwrap();
        let plan = compile(&query, "ns").unwrap();
        assert!(matches!(plan.steps[0], PlanStep::Lookup { .. }));
        assert!(matches!(&plan.steps[1], PlanStep::Traverse { predicate, .. } if predicate == "friends"));
        assert!(matches!(plan.steps[2], PlanStep::Filter(_)));
        assert!(matches!(&plan.steps[3], PlanStep::Traverse { predicate, .. } if predicate == "posts"));
        assert!(matches!(plan.steps[4], PlanStep::Expand { .. }));
        assert_eq!(plan.steps.len(), 5);
    }

    #[test]
    fn recursion_beyond_max_depth_is_rejected() {
        let query = edgegraph_query::parse("user:1.reports*[depth 11]").unwrap();
        assert!(matches!(
            compile(&query, "ns"),
            Err(PlanError::RecursionDepthExceeded { requested: 11, max: MAX_RECURSION_DEPTH })
        ));
    }

    #[test]
    fn identical_queries_share_cache_key_varying_source_differs() {
        let a = edgegraph_query::parse("user:1.friends").unwrap();
        let b = edgegraph_query::parse("user:1.friends").unwrap();
        let c = edgegraph_query::parse("user:2.friends").unwrap();
        assert_eq!(compile(&a, "ns").unwrap().cache_key, compile(&b, "ns").unwrap().cache_key);
        assert_ne!(compile(&a, "ns").unwrap().cache_key, compile(&c, "ns").unwrap().cache_key);
    }

    #[test]
    fn filters_differing_only_in_literal_share_cache_key() {
        let a = edgegraph_query::parse("user:1[?age > 30]").unwrap();
        let b = edgegraph_query::parse("user:1[?age > 99]").unwrap();
        assert_eq!(compile(&a, "ns").unwrap().cache_key, compile(&b, "ns").unwrap().cache_key);
    }

    #[test]
    fn differing_predicates_change_cache_key() {
        let a = edgegraph_query::parse("user:1.friends").unwrap();
        let b = edgegraph_query::parse("user:1.enemies").unwrap();
        assert_ne!(compile(&a, "ns").unwrap().cache_key, compile(&b, "ns").unwrap().cache_key);
    }

    #[test]
    fn cost_is_nonnegative_and_grows_with_steps() {
        let simple = edgegraph_query::parse("user:1").unwrap();
        let complex = edgegraph_query::parse("user:1.friends[?age>1].posts{title}").unwrap();
        let simple_cost = compile(&simple, "ns").unwrap().estimated_cost;
        let complex_cost = compile(&complex, "ns").unwrap().estimated_cost;
        assert!(simple_cost >= 0.0);
        assert!(complex_cost > simple_cost);
    }
}
