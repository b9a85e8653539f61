pub mod engine;
pub mod factor;
pub mod planner;
pub mod query;
pub mod table;

pub use engine::{eliminate, EngineConfig, DEFAULT_MAX_FACTOR_SIZE};
pub use factor::Factor;
pub use planner::{EliminationPlan, EliminationStrategy};
pub use query::{evidence, Evidence, MapAssignment, QueryRequest, VariableElimination};
pub use table::ProbabilityTable;
