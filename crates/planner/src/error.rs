use thiserror::Error;

/// Query-semantics failures raised while compiling an AST into a
/// [`crate::QueryPlan`] (spec §7: "planner cost overflow, unbounded
/// recursion").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("recursive step requests depth {requested}, exceeding the implementation maximum of {max}")]
    RecursionDepthExceeded { requested: u32, max: u32 },
    #[error("estimated plan cost {cost} exceeds the maximum of {max}")]
    CostOverflow { cost: f64, max: f64 },
}

pub type PlanResult<T> = Result<T, PlanError>;
