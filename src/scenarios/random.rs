use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::model::cpt::TableOrientation;
use crate::model::{CptDefinition, ModelDefinition};

/// Shape of a generated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomNetworkConfig {
    pub nodes: usize,
    pub max_parents: usize,
    /// Cardinalities are drawn from `2..=max_states`.
    pub max_states: usize,
    pub seed: u64,
}

impl Default for RandomNetworkConfig {
    fn default() -> Self {
        RandomNetworkConfig {
            nodes: 6,
            max_parents: 2,
            max_states: 2,
            seed: 7,
        }
    }
}

/// A random valid network. Nodes are `X0..Xn` and only take parents among earlier nodes, so
/// the graph is acyclic by construction. The same config always yields the same network.
pub fn random_definition(config: &RandomNetworkConfig) -> ModelDefinition {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut definition = ModelDefinition::new(&format!("random_{}_{}", config.nodes, config.seed));
    let max_states = config.max_states.max(2);

    let mut cardinalities = Vec::with_capacity(config.nodes);
    for i in 0..config.nodes {
        let cardinality = rng.gen_range(2..=max_states);
        let states: Vec<String> = (0..cardinality).map(|s| format!("s{}", s)).collect();
        let states: Vec<&str> = states.iter().map(String::as_str).collect();
        definition.node(&format!("X{}", i), &states);
        cardinalities.push(cardinality);
    }

    for child in 0..config.nodes {
        let mut candidates: Vec<usize> = (0..child).collect();
        candidates.shuffle(&mut rng);
        let count = rng.gen_range(0..=config.max_parents.min(child));
        let mut parents: Vec<usize> = candidates.into_iter().take(count).collect();
        parents.sort_unstable();
        for &parent in &parents {
            definition.edge(&format!("X{}", parent), &format!("X{}", child));
        }

        let columns: usize = parents.iter().map(|&p| cardinalities[p]).product();
        let mut values = vec![vec![0.0; columns]; cardinalities[child]];
        for column in 0..columns {
            let weights: Vec<f64> = (0..cardinalities[child])
                .map(|_| 0.05 + rng.r#gen::<f64>())
                .collect();
            let total: f64 = weights.iter().sum();
            for (row, weight) in weights.into_iter().enumerate() {
                values[row][column] = weight / total;
            }
        }
        definition.cpts.push(CptDefinition {
            variable: format!("X{}", child),
            parents: parents.iter().map(|p| format!("X{}", p)).collect(),
            orientation: TableOrientation::StateRows,
            values,
        });
    }
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_network_is_valid_and_seeded() {
        let config = RandomNetworkConfig {
            nodes: 8,
            max_parents: 3,
            max_states: 3,
            seed: 42,
        };
        let first = random_definition(&config);
        let second = random_definition(&config);
        assert_eq!(first.edges, second.edges);
        assert_eq!(first.cpts, second.cpts);
        assert_eq!(first.to_network().unwrap().node_count(), 8);
    }

    #[test]
    fn test_parent_limit_is_respected() {
        let config = RandomNetworkConfig {
            nodes: 10,
            max_parents: 1,
            ..RandomNetworkConfig::default()
        };
        let network = random_definition(&config).to_network().unwrap();
        for node in network.nodes() {
            assert!(network.parents(node.name()).unwrap().len() <= 1);
        }
    }
}
