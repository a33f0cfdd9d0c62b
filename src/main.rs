use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{info, warn};

use routing_visualizer::{
    config::EngineConfig,
    logging,
    network::{
        generate::{RandomTopologySpec, random_topology},
        topology::Topology,
    },
    parsers::{table_csv, topology_csv},
    routing::{
        Protocol, RoutingError, RoutingTable, diffusing,
        distance_vector::RoundStepper,
        link_state,
        table::INFINITY_MARKER,
    },
};

/// Computes routing tables for a topology with a RIP-, OSPF- or EIGRP-like engine.
#[derive(Parser, Debug)]
#[command(name = "routing-visualizer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Topology CSV with a `source,target,cost` header
    #[arg(long, conflicts_with = "random", required_unless_present = "random")]
    topology: Option<PathBuf>,

    /// rip, ospf or eigrp
    #[arg(short, long, default_value = "ospf")]
    protocol: Protocol,

    /// Router whose table is shown (first router by ID when omitted)
    #[arg(short, long)]
    local: Option<String>,

    /// Show the intermediate steps: rounds, flooding or sweeps
    #[arg(long)]
    step: bool,

    /// Engine configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the resulting table as CSV
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Generate a random connected topology with this many routers
    #[arg(long)]
    random: Option<usize>,

    /// Seed for --random. When omitted, a random seed is used and logged.
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let topology = load_topology(&cli, &config)?;
    let Some(local) = cli
        .local
        .clone()
        .or_else(|| topology.routers().first().map(|r| r.to_string()))
    else {
        bail!("the topology has no routers");
    };
    if !topology.contains(&local) {
        bail!("router {local} is not part of the topology");
    }
    info!(protocol = %cli.protocol, local = %local, routers = topology.router_count(), "computing routes");

    let table = match run(&cli, &config, &topology, &local) {
        Ok(table) => table,
        Err(RoutingError::NonConvergence { rounds, last_table }) => {
            println!("Not converged after {rounds} rounds, last table:");
            print_table(&last_table, None);
            bail!("{} did not converge", cli.protocol);
        }
        Err(e) => return Err(e.into()),
    };

    let shown = match cli.protocol {
        Protocol::DistanceVector if !cli.step => Some(local.as_str()),
        _ => None,
    };
    print_table(&table, shown);

    if let Some(path) = &cli.export {
        table_csv::export_table(&table, path).with_context(|| format!("exporting table to {}", path.display()))?;
        info!(path = %path.display(), "table exported");
    }
    Ok(())
}

fn load_topology(cli: &Cli, config: &EngineConfig) -> Result<Topology> {
    let mode = cli.protocol.link_mode();
    if let Some(routers) = cli.random {
        let seed = cli.seed.unwrap_or_else(|| rand::rng().random());
        info!(seed, routers, "generating random topology");
        let mut rng = StdRng::seed_from_u64(seed);
        let spec = RandomTopologySpec { routers, mode, ..Default::default() };
        return Ok(random_topology(&mut rng, &spec));
    }

    let Some(path) = &cli.topology else {
        bail!("either --topology or --random is required");
    };
    let (topology, report) = topology_csv::load_topology(path, mode, config.import_policy, config.duplicate_policy)
        .with_context(|| format!("importing {}", path.display()))?;
    for error in &report.errors {
        warn!("{error}");
    }
    Ok(topology)
}

fn run(cli: &Cli, config: &EngineConfig, topology: &Topology, local: &str) -> Result<RoutingTable, RoutingError> {
    if !cli.step {
        return cli.protocol.engine(config).compute(topology, local);
    }

    match cli.protocol {
        Protocol::DistanceVector => {
            let mut stepper = RoundStepper::new(topology, config.max_hop);
            loop {
                if stepper.round() >= config.max_rounds {
                    return Err(RoutingError::NonConvergence {
                        rounds: stepper.round(),
                        last_table: Box::new(stepper.table().clone()),
                    });
                }
                let step = stepper.step(topology);
                let mut cells = Vec::new();
                for router in topology.routers() {
                    if let Some(destinations) = step.diff.changed_for(router.as_str()) {
                        cells.extend(destinations.iter().map(|d| format!("{router}->{d}")));
                    }
                }
                println!("Round {}: {} changed {}", step.round, step.diff.len(), cells.join(" "));
                if !step.changed {
                    break;
                }
            }
            Ok(stepper.table().clone())
        }
        Protocol::LinkState => {
            for step in link_state::flooding_order(topology, local)? {
                println!("LSA {} -> {}", step.from, step.to);
            }
            for (parent, child) in link_state::spf_tree(topology, local)? {
                println!("SPF {parent} - {child}");
            }
            link_state::compute_table(topology, local)
        }
        Protocol::Diffusing => {
            let matrix = diffusing::distance_matrix(topology, config.max_sweeps);
            println!("Relaxation sweeps: {}", matrix.sweeps());
            diffusing::compute_table(topology, local, config.max_sweeps)
        }
    }
}

fn print_table(table: &RoutingTable, only: Option<&str>) {
    println!("{:<10} {:<12} {:>6} {:<10} {}", "router", "destination", "cost", "next hop", "state");
    for row in table.rows() {
        if only.is_some_and(|router| row.router != router) {
            continue;
        }
        let cost = row.cost.value().map_or_else(|| INFINITY_MARKER.to_string(), |c| c.to_string());
        let next_hop = row.next_hop.as_ref().map_or("-", |hop| hop.as_str());
        println!("{:<10} {:<12} {:>6} {:<10} {}", row.router, row.destination, cost, next_hop, row.state);
    }
}
