pub mod database;

pub use database::{ModelStore, ModelSummary};
