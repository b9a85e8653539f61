use thiserror::Error;

use crate::model::validation::ValidationReport;

/// Errors raised by the factor algebra.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    #[error("variable '{variable}' appears with different states in the two scopes")]
    ScopeMismatch { variable: String },

    #[error("cannot eliminate '{variable}': not in the factor scope")]
    InvalidElimination { variable: String },

    #[error("state index {state} is out of range for '{variable}' ({cardinality} states)")]
    InvalidState {
        variable: String,
        state: usize,
        cardinality: usize,
    },

    #[error("factor table has {found} entries, scope requires {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("factor values must be finite and non-negative, found {value}")]
    InvalidValue { value: f64 },

    #[error("variable '{variable}' appears more than once in a scope")]
    DuplicateVariable { variable: String },

    #[error("factor sums to {sum}, cannot normalize")]
    Degenerate { sum: f64 },
}

/// Errors raised while declaring the network. These are fatal for the builder call that
/// produced them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("node '{0}' is already declared")]
    DuplicateNode(String),

    #[error("node '{0}' is not declared")]
    UnknownNode(String),

    #[error("node '{0}' must have at least one state")]
    EmptyStates(String),

    #[error("node '{node}' declares state '{state}' twice")]
    DuplicateState { node: String, state: String },

    #[error("edge '{0}' -> '{0}' is a self-loop")]
    SelfLoop(String),

    #[error("edge '{parent}' -> '{child}' is already declared")]
    DuplicateEdge { parent: String, child: String },

    #[error("edge '{parent}' -> '{child}' would create a cycle")]
    Cycle { parent: String, child: String },

    #[error("node '{0}' has no conditional probability table")]
    MissingCpt(String),

    #[error("CPT for '{node}' has scope {found:?}, expected {expected:?}")]
    ScopeMismatch {
        node: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("CPT for '{node}' is malformed: {reason}")]
    MalformedTable { node: String, reason: String },

    #[error(transparent)]
    Factor(#[from] FactorError),
}

/// Rejections of a query before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidQueryError {
    #[error("query must name at least one variable")]
    EmptyQuery,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("variable '{0}' is requested more than once")]
    DuplicateVariable(String),

    #[error("'{state}' is not a state of '{variable}'")]
    UnknownState { variable: String, state: String },

    #[error("variable '{0}' appears both in the query and in the evidence")]
    EvidenceOverlap(String),

    #[error("elimination order is invalid: {0}")]
    EliminationOrder(String),
}

/// Top-level error of the inference engine.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("model failed validation:\n{0}")]
    Validation(ValidationReport),

    #[error(transparent)]
    InvalidQuery(#[from] InvalidQueryError),

    #[error("evidence has zero probability under the model")]
    Degenerate,

    #[error(
        "eliminating '{variable}' needs a factor of {size} entries, budget is {budget}"
    )]
    Tractability {
        variable: String,
        size: usize,
        budget: usize,
    },

    #[error(transparent)]
    Factor(FactorError),
}

impl From<FactorError> for InferenceError {
    fn from(error: FactorError) -> Self {
        match error {
            FactorError::Degenerate { .. } => InferenceError::Degenerate,
            other => InferenceError::Factor(other),
        }
    }
}

pub type Result<T, E = InferenceError> = std::result::Result<T, E>;
