//! vmpool-demo - Manual-inspection CLI for vmpool-core
//!
//! Runs one of a handful of fixed scenarios through either planner strategy
//! and prints the resulting migration path. This is dev tooling, not a
//! planning front-end: the planner itself never touches a real hypervisor,
//! and there is no provision for arbitrary user-supplied pools beyond the
//! built-in scenarios.
//!
//! Binary: vmpool-demo

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vmpool_core::{DebugLevel, Planner, PlannerConfig, StrategyKind};

mod scenarios;

/// vmpool-demo - exercise the migration path planner against fixed scenarios
#[derive(Parser)]
#[command(name = "vmpool-demo")]
#[command(about = "Runs a fixed VM-pool migration scenario and prints the resulting path", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Displacement,
    ShortestPath,
}

impl From<Strategy> for StrategyKind {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Displacement => StrategyKind::Displacement,
            Strategy::ShortestPath => StrategyKind::ShortestPath,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in scenarios
    List,

    /// Run one scenario and print its migration path
    Run {
        /// Scenario name, as shown by `list`
        scenario: String,

        /// Which planner strategy to use
        #[arg(long, value_enum, default_value_t = Strategy::Displacement)]
        strategy: Strategy,

        /// Print the path as JSON instead of the textual dump
        #[arg(long)]
        json: bool,

        /// Print the debug log accumulated during the run
        #[arg(long)]
        debug: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmpool_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for s in scenarios::SCENARIOS {
                println!("{:<16} {}", s.name, s.description);
            }
        }
        Commands::Run { scenario, strategy, json, debug } => {
            let Some(s) = scenarios::find(&scenario) else {
                eprintln!("unknown scenario '{scenario}'; see `vmpool-demo list`");
                std::process::exit(1);
            };
            info!(scenario = s.name, "building scenario");
            let (initial, final_state) = (s.build)();

            let config = PlannerConfig {
                strategy: strategy.into(),
                debug_level: if debug { DebugLevel::Verbose } else { DebugLevel::Normal },
            };

            let planner = match Planner::new(initial, final_state, config) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("scenario endpoints rejected: {e}");
                    std::process::exit(1);
                }
            };

            match planner.find_path() {
                Ok(Some(path)) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&path).expect("Path serializes"));
                    } else {
                        print!("{}", path.dump());
                        println!("cost: {}", path.cost());
                    }
                }
                Ok(None) => {
                    println!("no plan found for scenario '{scenario}'");
                }
                Err(e) => {
                    eprintln!("planner error: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
