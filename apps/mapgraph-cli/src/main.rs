use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glam::Vec2;
use mapgraph_catalog::Catalog;
use mapgraph_common::{Direction, EntityTypeId, InMemoryPool, NodeIndex, RegionTypeId};
use mapgraph_kernel::{
    EngineConfig, FixedModes, MapGraph, Navigator, TransitionOutcome, WorldEnv,
};
use mapgraph_layout::{LayoutEngine, NodeArea, roll_drop_amount};
use mapgraph_persist::{SaveRecord, SaveStore};
use mapgraph_tools::GraphInspector;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Clock step used to drive fades and countdowns.
const TICK: f32 = 0.1;

#[derive(Parser)]
#[command(name = "mapgraph-cli", about = "CLI tool for map graph operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config (YAML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog (JSON); the built-in mine set when omitted
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and catalog contents
    Info,
    /// Walk a path such as "n,e,back,s,home" and print every transition
    Walk {
        /// Comma-separated steps: n/e/s/w, back, home, recall
        path: String,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Walk during night (transitions are locked unless recalling)
        #[arg(long)]
        night: bool,
        /// Stage used to gate entity types
        #[arg(long, default_value = "0")]
        stage: u32,
    },
    /// Populate one region type and report placement counts
    Populate {
        /// Region type id
        #[arg(short, long, default_value = "1110")]
        region: u32,
        #[arg(short, long, default_value = "42")]
        seed: u64,
        #[arg(long, default_value = "0")]
        stage: u32,
    },
    /// Roll drop amounts and print the distribution
    Drops {
        /// Drop rate in percent
        #[arg(short, long, default_value = "250")]
        rate: f64,
        #[arg(short, long, default_value = "10000")]
        trials: u32,
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Walk a path and write the result to a save store
    Save {
        /// Save store directory
        store: PathBuf,
        #[arg(short, long, default_value = "n,e,n")]
        path: String,
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Load the newest save and resume where it was written
    Load {
        /// Save store directory
        store: PathBuf,
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Portal(Direction),
    Back,
    Home,
    Recall,
}

fn parse_path(path: &str) -> anyhow::Result<Vec<Step>> {
    path.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "back" | "b" => Ok(Step::Back),
            "home" | "h" => Ok(Step::Home),
            "recall" | "r" => Ok(Step::Recall),
            other => other
                .parse::<Direction>()
                .map(Step::Portal)
                .map_err(anyhow::Error::msg),
        })
        .collect()
}

fn load_inputs(cli: &Cli) -> anyhow::Result<(EngineConfig, Catalog)> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let catalog = match &cli.catalog {
        Some(path) => {
            Catalog::load(path).with_context(|| format!("loading catalog {}", path.display()))?
        }
        None => Catalog::builtin(),
    };
    Ok((config, catalog))
}

/// Submit one step and run the clock until the navigator settles.
fn drive(
    nav: &mut Navigator,
    step: Step,
    env: &mut WorldEnv<'_>,
) -> anyhow::Result<Option<TransitionOutcome>> {
    let accepted = match step {
        Step::Portal(direction) => nav.request_transition(direction, env.modes),
        Step::Back => nav.request_return(env.modes),
        Step::Home => nav.request_home_return(env.modes),
        Step::Recall => nav.begin_recall(false),
    };
    if !accepted {
        return Ok(None);
    }

    let mut outcome = None;
    let mut ticks = 0u32;
    while !nav.is_idle() || nav.recall_pending() {
        if let Some(result) = nav.advance(TICK, env) {
            outcome = Some(result?);
        }
        ticks += 1;
        if ticks > 100_000 {
            bail!("transition did not settle");
        }
    }
    Ok(outcome)
}

fn walk(nav: &mut Navigator, steps: &[Step], env: &mut WorldEnv<'_>) -> anyhow::Result<()> {
    for &step in steps {
        match drive(nav, step, env)? {
            Some(TransitionOutcome::Moved { from, to, entry }) => {
                println!("{step:?}: {from} -> {to} entry=({:.1}, {:.1})", entry.x, entry.y);
            }
            Some(TransitionOutcome::Unchanged) => println!("{step:?}: unchanged"),
            None => println!("{step:?}: ignored"),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let (config, catalog) = load_inputs(&cli)?;

    match cli.command {
        Commands::Info => {
            println!("mapgraph-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", mapgraph_common::crate_info());
            println!("catalog: {}", mapgraph_catalog::crate_info());
            println!("layout: {}", mapgraph_layout::crate_info());
            println!("kernel: {}", mapgraph_kernel::crate_info());
            println!("persist: {}", mapgraph_persist::crate_info());
            println!("tools: {}", mapgraph_tools::crate_info());
            for region in &catalog.regions {
                println!(
                    "region {} {:?} '{}' area={}x{} budget={} portals={}",
                    region.id.0,
                    region.tier,
                    region.name,
                    region.area.x,
                    region.area.y,
                    region.budget,
                    region.portals.len()
                );
            }
            for entity in &catalog.entities {
                println!(
                    "entity {} {:?} '{}' weight={} stage={} bonus={}",
                    entity.id.0,
                    entity.kind,
                    entity.name,
                    entity.spawn_weight,
                    entity.spawn_stage,
                    entity.bonus_drop
                );
            }
        }
        Commands::Walk {
            path,
            seed,
            night,
            stage,
        } => {
            let steps = parse_path(&path)?;
            let modes = FixedModes {
                night,
                stage,
                ..FixedModes::default()
            };
            let mut pool = InMemoryPool::new();
            let mut env = WorldEnv::new(&mut pool, &catalog, &modes);
            let graph = MapGraph::with_seed(&config, seed);
            let mut nav = Navigator::new(graph, config.transition.clone());
            walk(&mut nav, &steps, &mut env)?;

            println!("{}", GraphInspector::summary(nav.graph()));
            for link in GraphInspector::links(nav.graph()) {
                println!("  {link}");
            }
            for index in GraphInspector::list_nodes(nav.graph()) {
                if let Some(info) = GraphInspector::inspect_node(nav.graph(), index) {
                    println!("  {info}");
                }
            }
            drop(env);
            println!(
                "pool: active={} acquired={} released={}",
                pool.total_active(),
                pool.acquired_total(),
                pool.released_total()
            );
        }
        Commands::Populate {
            region,
            seed,
            stage,
        } => {
            let region_type = catalog
                .region(RegionTypeId(region))
                .with_context(|| format!("unknown region type {region}"))?;
            let mut pool = InMemoryPool::new();
            let mut engine = LayoutEngine::with_seed(config.layout.clone(), seed);
            let area = NodeArea {
                node: NodeIndex(1),
                origin: Vec2::ZERO,
                region: region_type,
            };
            let report = engine.populate(area, &catalog, stage, &mut pool)?;
            println!(
                "region {} '{}': cells={} bonus={} common={} attempts={}",
                region,
                region_type.name,
                report.candidate_cells,
                report.bonus_placed,
                report.common_placed,
                report.attempts
            );
            let mut per_type: BTreeMap<EntityTypeId, usize> = BTreeMap::new();
            for entity in engine.live_entities(NodeIndex(1)) {
                *per_type.entry(entity.state.type_id).or_default() += 1;
            }
            for (type_id, count) in per_type {
                let name = catalog.entity(type_id).map_or("?", |e| e.name.as_str());
                println!("  {} '{}': {}", type_id.0, name, count);
            }
        }
        Commands::Drops { rate, trials, seed } => {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut histogram: BTreeMap<u32, u32> = BTreeMap::new();
            let mut total = 0u64;
            for _ in 0..trials {
                let amount = roll_drop_amount(1, rate, &mut rng);
                *histogram.entry(amount).or_default() += 1;
                total += u64::from(amount);
            }
            println!("drop rate {rate}% over {trials} rolls (base 1)");
            for (amount, count) in &histogram {
                let share = f64::from(*count) / f64::from(trials.max(1)) * 100.0;
                println!("  {amount}: {count} ({share:.1}%)");
            }
            println!("  mean: {:.3}", total as f64 / f64::from(trials.max(1)));
        }
        Commands::Save { store, path, seed } => {
            let steps = parse_path(&path)?;
            let modes = FixedModes::day();
            let mut pool = InMemoryPool::new();
            let mut env = WorldEnv::new(&mut pool, &catalog, &modes);
            let graph = MapGraph::with_seed(&config, seed);
            let mut nav = Navigator::new(graph, config.transition.clone());
            walk(&mut nav, &steps, &mut env)?;

            let record = SaveRecord::export(nav.graph());
            let mut save_store = SaveStore::open(&store)
                .with_context(|| format!("opening save store {}", store.display()))?;
            let index = save_store.write(&record)?;
            println!(
                "save {index} written to {}: current={} nodes={} links={} hash={:#018x}",
                store.display(),
                record.current,
                record.nodes.len(),
                record.links.len(),
                record.hash
            );
        }
        Commands::Load { store, seed } => {
            let save_store = SaveStore::open(&store)
                .with_context(|| format!("opening save store {}", store.display()))?;
            save_store.verify_integrity()?;
            let record = save_store.load_latest()?;

            let modes = FixedModes::day();
            let mut pool = InMemoryPool::new();
            let mut graph = MapGraph::with_seed(&config, seed);
            let report = record.import_into(&mut graph, &mut pool)?;
            if report.dropped.total() > 0 {
                println!("dropped dangling entries: {:?}", report.dropped);
            }

            let mut env = WorldEnv::new(&mut pool, &catalog, &modes);
            graph.transition_to(report.resume_at, false, &mut env)?;
            println!("resumed at {}", graph.current_node_index());
            println!("{}", GraphInspector::summary(&graph));
        }
    }

    Ok(())
}
