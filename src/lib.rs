pub mod common;
pub mod inference;
pub mod model;
pub mod scenarios;
pub mod storage;

pub use common::errors::{InferenceError, Result};
pub use inference::{
    evidence, EliminationStrategy, EngineConfig, Evidence, Factor, ProbabilityTable,
    QueryRequest, VariableElimination,
};
pub use model::network::{BayesianNetwork, NetworkBuilder};
pub use model::variable::Variable;
pub use model::ModelDefinition;
pub use storage::ModelStore;
