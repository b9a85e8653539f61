//! Elimination ordering.
//!
//! The planner works on factor scopes only: it simulates eliminating nuisance variables
//! from the active scopes and greedily picks the cheapest next variable under the chosen
//! heuristic. Ties always go to the lexicographically smallest name so plans are
//! deterministic.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::common::errors::InvalidQueryError;
use crate::inference::factor::Factor;
use crate::model::network::BayesianNetwork;

/// How to order the nuisance variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationStrategy {
    /// Fewest variables in the combined factor.
    #[default]
    MinNeighbors,
    /// Smallest combined factor by entry count.
    MinWeight,
    /// Fewest new interaction edges.
    MinFill,
    /// Fill edges weighted by the product of their endpoints' cardinalities.
    WeightedMinFill,
    /// Children before parents. Never clever, always valid.
    ReverseTopological,
    /// A caller-chosen order. Must name every nuisance variable exactly once.
    Explicit(Vec<String>),
}

impl EliminationStrategy {
    pub const NAMED: [&'static str; 5] = [
        "min_neighbors",
        "min_weight",
        "min_fill",
        "weighted_min_fill",
        "reverse_topological",
    ];
}

impl fmt::Display for EliminationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EliminationStrategy::MinNeighbors => write!(f, "min_neighbors"),
            EliminationStrategy::MinWeight => write!(f, "min_weight"),
            EliminationStrategy::MinFill => write!(f, "min_fill"),
            EliminationStrategy::WeightedMinFill => write!(f, "weighted_min_fill"),
            EliminationStrategy::ReverseTopological => write!(f, "reverse_topological"),
            EliminationStrategy::Explicit(order) => write!(f, "explicit[{}]", order.join(", ")),
        }
    }
}

impl FromStr for EliminationStrategy {
    type Err = String;

    /// Accepts the heuristic names, or a comma-separated order prefixed with `explicit:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min_neighbors" => Ok(EliminationStrategy::MinNeighbors),
            "min_weight" => Ok(EliminationStrategy::MinWeight),
            "min_fill" => Ok(EliminationStrategy::MinFill),
            "weighted_min_fill" => Ok(EliminationStrategy::WeightedMinFill),
            "reverse_topological" => Ok(EliminationStrategy::ReverseTopological),
            other => match other.strip_prefix("explicit:") {
                Some(list) => Ok(EliminationStrategy::Explicit(
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                )),
                None => Err(format!(
                    "unknown elimination strategy '{}', expected one of {:?} or explicit:<a,b,...>",
                    other,
                    Self::NAMED
                )),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationPlan {
    pub order: Vec<String>,
    /// Entries of the largest product the order will build.
    pub peak_size: usize,
    /// The variable whose elimination builds that product.
    pub peak_variable: Option<String>,
}

/// Active scopes during simulation.
struct ScopeGraph<'a> {
    scopes: Vec<BTreeSet<&'a str>>,
    cardinality: HashMap<&'a str, usize>,
}

impl<'a> ScopeGraph<'a> {
    fn new(factors: &'a [Factor]) -> Self {
        let mut cardinality = HashMap::new();
        let scopes = factors
            .iter()
            .map(|factor| {
                factor
                    .scope()
                    .iter()
                    .map(|v| {
                        cardinality.insert(v.name(), v.cardinality());
                        v.name()
                    })
                    .collect()
            })
            .collect();
        ScopeGraph {
            scopes,
            cardinality,
        }
    }

    fn variables(&self) -> BTreeSet<&'a str> {
        self.scopes.iter().flatten().copied().collect()
    }

    fn combined(&self, var: &str) -> BTreeSet<&'a str> {
        self.scopes
            .iter()
            .filter(|scope| scope.contains(var))
            .flatten()
            .copied()
            .collect()
    }

    fn weight(&self, vars: &BTreeSet<&'a str>) -> usize {
        vars.iter().fold(1usize, |acc, v| {
            acc.saturating_mul(self.cardinality.get(v).copied().unwrap_or(1))
        })
    }

    fn fill_edges(&self, var: &str) -> Vec<(&'a str, &'a str)> {
        let neighbors: Vec<&'a str> = self
            .combined(var)
            .into_iter()
            .filter(|v| *v != var)
            .collect();
        let mut fill = Vec::new();
        for (i, a) in neighbors.iter().enumerate() {
            for b in &neighbors[i + 1..] {
                let connected = self
                    .scopes
                    .iter()
                    .any(|scope| scope.contains(a) && scope.contains(b));
                if !connected {
                    fill.push((*a, *b));
                }
            }
        }
        fill
    }

    fn cost(&self, var: &str, strategy: &EliminationStrategy) -> usize {
        match strategy {
            EliminationStrategy::MinNeighbors => self.combined(var).len(),
            EliminationStrategy::MinWeight => self.weight(&self.combined(var)),
            EliminationStrategy::MinFill => self.fill_edges(var).len(),
            EliminationStrategy::WeightedMinFill => self
                .fill_edges(var)
                .into_iter()
                .map(|(a, b)| self.cardinality[a] * self.cardinality[b])
                .sum(),
            EliminationStrategy::ReverseTopological | EliminationStrategy::Explicit(_) => 0,
        }
    }

    /// Replace every scope containing `var` with their union minus `var`. Returns the size
    /// of the product that elimination builds.
    fn eliminate(&mut self, var: &str) -> usize {
        let combined = self.combined(var);
        let size = self.weight(&combined);
        self.scopes.retain(|scope| !scope.contains(var));
        let mut reduced = combined;
        reduced.remove(var);
        if !reduced.is_empty() {
            self.scopes.push(reduced);
        }
        size
    }
}

/// Order the variables of `factors` that are not in `keep`.
pub fn plan(
    network: &BayesianNetwork,
    factors: &[Factor],
    keep: &HashSet<&str>,
    strategy: &EliminationStrategy,
) -> Result<EliminationPlan, InvalidQueryError> {
    let mut graph = ScopeGraph::new(factors);
    let mut remaining: BTreeSet<&str> = graph
        .variables()
        .into_iter()
        .filter(|v| !keep.contains(v))
        .collect();

    let fixed: Option<Vec<&str>> = match strategy {
        EliminationStrategy::ReverseTopological => {
            let mut order = network.topological_order();
            order.reverse();
            Some(order.into_iter().filter(|v| remaining.contains(v)).collect())
        }
        EliminationStrategy::Explicit(order) => Some(explicit_order(order, &remaining)?),
        _ => None,
    };

    let mut order = Vec::with_capacity(remaining.len());
    let mut peak_size = 0;
    let mut peak_variable = None;
    let mut step = |graph: &mut ScopeGraph, var: &str| {
        let size = graph.eliminate(var);
        if size > peak_size {
            peak_size = size;
            peak_variable = Some(var.to_string());
        }
        order.push(var.to_string());
    };

    match fixed {
        Some(fixed) => {
            for var in fixed {
                step(&mut graph, var);
            }
        }
        None => {
            while let Some(var) = remaining
                .iter()
                .copied()
                .min_by_key(|v| (graph.cost(v, strategy), *v))
            {
                step(&mut graph, var);
                remaining.remove(var);
            }
        }
    }

    debug!(
        "{} plan: {:?} (peak {} entries)",
        strategy, order, peak_size
    );
    Ok(EliminationPlan {
        order,
        peak_size,
        peak_variable,
    })
}

fn explicit_order<'a>(
    order: &'a [String],
    nuisance: &BTreeSet<&str>,
) -> Result<Vec<&'a str>, InvalidQueryError> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in order {
        if !seen.insert(name.as_str()) {
            return Err(InvalidQueryError::EliminationOrder(format!(
                "'{}' is listed twice",
                name
            )));
        }
        // Names outside the nuisance set (pruned or query variables) are skipped.
        if nuisance.contains(name.as_str()) {
            result.push(name.as_str());
        }
    }
    if let Some(missing) = nuisance.iter().find(|v| !seen.contains(*v)) {
        return Err(InvalidQueryError::EliminationOrder(format!(
            "'{}' is never eliminated",
            missing
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDefinition;

    const BREACH: [&str; 2] = ["Non-Breached", "Breached"];

    /// A -> B, A -> C, B -> D, C -> D
    fn diamond() -> BayesianNetwork {
        let mut definition = ModelDefinition::new("diamond");
        definition
            .node("A", &BREACH)
            .node("B", &BREACH)
            .node("C", &BREACH)
            .node("D", &BREACH)
            .edge("A", "B")
            .edge("A", "C")
            .edge("B", "D")
            .edge("C", "D")
            .table("A", &[], vec![vec![0.5], vec![0.5]])
            .table("B", &["A"], vec![vec![0.9, 0.2], vec![0.1, 0.8]])
            .table("C", &["A"], vec![vec![0.7, 0.4], vec![0.3, 0.6]])
            .table(
                "D",
                &["B", "C"],
                vec![vec![1.0, 0.5, 0.5, 0.1], vec![0.0, 0.5, 0.5, 0.9]],
            );
        definition.to_network().unwrap()
    }

    fn factors(network: &BayesianNetwork) -> Vec<Factor> {
        network.cpts().iter().map(|c| c.factor().clone()).collect()
    }

    #[test]
    fn test_heuristic_plans_cover_nuisance() {
        let network = diamond();
        let factors = factors(&network);
        let keep = HashSet::from(["D"]);
        for name in EliminationStrategy::NAMED {
            let strategy: EliminationStrategy = name.parse().unwrap();
            let plan = plan(&network, &factors, &keep, &strategy).unwrap();
            let mut sorted = plan.order.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["A", "B", "C"], "{}", name);
            assert!(plan.peak_size >= 4);
        }
    }

    #[test]
    fn test_min_neighbors_picks_smallest_scope_then_name() {
        let network = diamond();
        let factors = factors(&network);
        let keep = HashSet::from(["D"]);
        let plan = plan(&network, &factors, &keep, &EliminationStrategy::MinNeighbors).unwrap();
        // A touches {A, B, C}; B and C touch {A, B, C, D}.
        assert_eq!(plan.order[0], "A");
        assert_eq!(plan.order, vec!["A", "B", "C"]);
        assert_eq!(plan.peak_size, 8);
    }

    #[test]
    fn test_reverse_topological() {
        let network = diamond();
        let factors = factors(&network);
        let keep = HashSet::from(["A"]);
        let plan = plan(
            &network,
            &factors,
            &keep,
            &EliminationStrategy::ReverseTopological,
        )
        .unwrap();
        assert_eq!(plan.order, vec!["D", "C", "B"]);
    }

    #[test]
    fn test_explicit_order_checks() {
        let network = diamond();
        let factors = factors(&network);
        let keep = HashSet::from(["D"]);

        let ok = EliminationStrategy::Explicit(vec!["C".into(), "B".into(), "A".into(), "D".into()]);
        assert_eq!(
            plan(&network, &factors, &keep, &ok).unwrap().order,
            vec!["C", "B", "A"]
        );

        let missing = EliminationStrategy::Explicit(vec!["C".into(), "B".into()]);
        assert!(matches!(
            plan(&network, &factors, &keep, &missing),
            Err(InvalidQueryError::EliminationOrder(_))
        ));

        let twice = EliminationStrategy::Explicit(vec!["A".into(), "A".into()]);
        assert!(plan(&network, &factors, &keep, &twice).is_err());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "min_fill".parse::<EliminationStrategy>(),
            Ok(EliminationStrategy::MinFill)
        );
        assert_eq!(
            "explicit: B, A".parse::<EliminationStrategy>(),
            Ok(EliminationStrategy::Explicit(vec!["B".into(), "A".into()]))
        );
        assert!("greedy".parse::<EliminationStrategy>().is_err());
    }
}
