pub mod factory;
pub mod ics;
pub mod random;
pub mod textbook;

pub use factory::ScenarioFactory;
pub use ics::{ics_attack_graph, reference_analyses, Analysis};
pub use random::{random_definition, RandomNetworkConfig};
