use log::{debug, trace};
use std::collections::HashSet;

use crate::common::errors::{InferenceError, Result};
use crate::inference::factor::{joint_size, Factor};
use crate::inference::planner::{self, EliminationStrategy};
use crate::model::network::BayesianNetwork;

/// Default budget for any single intermediate factor, in entries.
pub const DEFAULT_MAX_FACTOR_SIZE: usize = 1 << 24;

/// Tuning for variable elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub strategy: EliminationStrategy,
    /// Drop CPTs outside the ancestral closure of the query and evidence variables.
    pub prune: bool,
    /// Largest intermediate factor allowed, in entries.
    pub max_factor_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strategy: EliminationStrategy::default(),
            prune: true,
            max_factor_size: DEFAULT_MAX_FACTOR_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn with_strategy(mut self, strategy: EliminationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_max_factor_size(mut self, max_factor_size: usize) -> Self {
        self.max_factor_size = max_factor_size;
        self
    }
}

fn check_budget(variable: &str, size: usize, budget: usize) -> Result<()> {
    if size > budget {
        return Err(InferenceError::Tractability {
            variable: variable.to_string(),
            size,
            budget,
        });
    }
    Ok(())
}

fn product_all(factors: Vec<Factor>) -> Result<Factor> {
    let mut iter = factors.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Factor::scalar(1.0));
    };
    Ok(iter.try_fold(first, |acc, f| acc.product(&f))?)
}

/// Sum-product variable elimination.
///
/// Returns the unnormalized factor over `query`, in `query` order, with `evidence` (state
/// indices) fixed. Inputs are assumed checked: query and evidence variables exist and are
/// disjoint. The network is only read; every factor built here belongs to this call.
pub fn eliminate(
    network: &BayesianNetwork,
    query: &[&str],
    evidence: &[(&str, usize)],
    config: &EngineConfig,
) -> Result<Factor> {
    // Phase 1: relevant CPTs with the evidence sliced in.
    let relevant: Option<HashSet<&str>> = config.prune.then(|| {
        network.ancestral_closure(
            query
                .iter()
                .copied()
                .chain(evidence.iter().map(|(name, _)| *name)),
        )
    });
    let mut factors = Vec::with_capacity(network.node_count());
    for cpt in network.cpts() {
        if relevant
            .as_ref()
            .is_some_and(|r| !r.contains(cpt.child().name()))
        {
            continue;
        }
        let mut factor = cpt.factor().clone();
        for &(name, state) in evidence {
            factor = factor.reduce(name, state)?;
        }
        factors.push(factor);
    }
    debug!(
        "query {:?} given {} observations: {} of {} CPTs active",
        query,
        evidence.len(),
        factors.len(),
        network.node_count()
    );

    // Phase 2: sum out the nuisance variables.
    let keep: HashSet<&str> = query.iter().copied().collect();
    let plan = planner::plan(network, &factors, &keep, &config.strategy)?;
    if let Some(variable) = &plan.peak_variable {
        check_budget(variable, plan.peak_size, config.max_factor_size)?;
    }

    for var in &plan.order {
        let (touching, rest): (Vec<Factor>, Vec<Factor>) =
            factors.into_iter().partition(|f| f.contains(var));
        factors = rest;
        if touching.is_empty() {
            continue;
        }
        check_budget(var, joint_size(&touching), config.max_factor_size)?;
        let inputs = touching.len();
        let summed = product_all(touching)?.marginalize(&[var.as_str()])?;
        trace!(
            "eliminated '{}' from {} factors -> scope {:?}",
            var,
            inputs,
            summed.variable_names()
        );
        factors.push(summed);
    }

    // Phase 3: what is left only mentions query variables.
    check_budget(&query.join(", "), joint_size(&factors), config.max_factor_size)?;
    let joint = product_all(factors)?;
    Ok(joint.permute(query)?)
}
