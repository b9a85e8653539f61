pub mod errors;
pub mod setup;

pub use errors::{FactorError, InferenceError, InvalidQueryError, Result, StructuralError};
