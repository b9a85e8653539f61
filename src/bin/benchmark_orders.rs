use anyhow::Result;
use bayesbreach::common::setup::init_logging;
use bayesbreach::inference::planner::{self, EliminationStrategy};
use bayesbreach::inference::{EngineConfig, Evidence, Factor, VariableElimination};
use bayesbreach::model::network::BayesianNetwork;
use bayesbreach::scenarios::{ics_attack_graph, random_definition, RandomNetworkConfig};
use clap::Parser;
use colored::Colorize;
use std::collections::HashSet;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare elimination heuristics on built-in and random networks", long_about = None)]
struct Args {
    /// Node counts of the random networks (comma-separated)
    #[arg(long, default_value = "10,20,30")]
    node_counts: String,

    /// Maximum parents per random node
    #[arg(long, default_value_t = 3)]
    max_parents: usize,

    /// Maximum states per random node
    #[arg(long, default_value_t = 3)]
    max_states: usize,

    /// Seed for the random networks
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Repetitions per query when timing
    #[arg(long, default_value_t = 20)]
    repeat: u32,
}

fn strategies() -> Vec<EliminationStrategy> {
    vec![
        EliminationStrategy::MinNeighbors,
        EliminationStrategy::MinWeight,
        EliminationStrategy::MinFill,
        EliminationStrategy::WeightedMinFill,
        EliminationStrategy::ReverseTopological,
    ]
}

fn benchmark_network(label: &str, network: &BayesianNetwork, target: &str, repeat: u32) -> Result<()> {
    println!("\n========== {} ({} nodes, query {}) ==========", label.bold(), network.node_count(), target);
    let factors: Vec<Factor> = network.cpts().iter().map(|cpt| cpt.factor().clone()).collect();
    let keep: HashSet<&str> = HashSet::from([target]);
    let none = Evidence::new();

    let mut reference: Option<Vec<f64>> = None;
    for strategy in strategies() {
        let plan = planner::plan(network, &factors, &keep, &strategy)?;
        let config = EngineConfig::default()
            .with_strategy(strategy.clone())
            .with_prune(false);
        let engine = VariableElimination::with_config(network, config);

        let start = Instant::now();
        let mut table = engine.query(&[target], &none);
        for _ in 1..repeat {
            table = engine.query(&[target], &none);
        }
        let elapsed = start.elapsed() / repeat.max(1);

        match table {
            Ok(table) => {
                let values = table.factor().to_vec();
                let agrees = reference.as_ref().is_none_or(|r| {
                    r.iter().zip(&values).all(|(a, b)| (a - b).abs() < 1e-9)
                });
                reference.get_or_insert(values);
                let verdict = if agrees { "ok".green() } else { "MISMATCH".red() };
                println!(
                    "{:<22} peak {:>10} entries  {:>10.3?} per query  {}",
                    strategy.to_string(),
                    plan.peak_size,
                    elapsed,
                    verdict
                );
            }
            Err(error) => println!("{:<22} {}", strategy.to_string(), error.to_string().red()),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let ics = ics_attack_graph()?.to_network()?;
    benchmark_network("ics_attack", &ics, "PLC 1", args.repeat)?;

    for count in args.node_counts.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let nodes: usize = count.parse()?;
        let config = RandomNetworkConfig {
            nodes,
            max_parents: args.max_parents,
            max_states: args.max_states,
            seed: args.seed,
        };
        let definition = random_definition(&config);
        let network = definition.to_network()?;
        let target = format!("X{}", nodes.saturating_sub(1));
        benchmark_network(&definition.name, &network, &target, args.repeat)?;
    }
    Ok(())
}
