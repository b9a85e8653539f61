use anyhow::{bail, Result};

use crate::model::ModelDefinition;
use crate::scenarios::{ics, random, textbook};

pub struct ScenarioFactory;

impl ScenarioFactory {
    pub const NAMES: [&'static str; 4] = ["ics_attack", "sprinkler", "intrusion_sensors", "random"];

    /// The definition of a built-in scenario. `random` uses the default generator settings.
    pub fn definition(name: &str) -> Result<ModelDefinition> {
        match name {
            "ics_attack" => ics::ics_attack_graph(),
            "sprinkler" => Ok(textbook::sprinkler()),
            "intrusion_sensors" => Ok(textbook::intrusion_sensors()),
            "random" => Ok(random::random_definition(&random::RandomNetworkConfig::default())),
            other => bail!(
                "Unknown scenario '{}', expected one of {:?}",
                other,
                Self::NAMES
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_scenario_builds() {
        for name in ScenarioFactory::NAMES {
            let definition = ScenarioFactory::definition(name).unwrap();
            assert!(definition.to_network().is_ok(), "{} failed to validate", name);
        }
    }

    #[test]
    fn test_unknown_scenario() {
        assert!(ScenarioFactory::definition("dating_simple").is_err());
    }
}
