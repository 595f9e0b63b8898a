//! Lightning Join CLI
//!
//! Runs the parallel join-order search over synthetic relations scored by
//! the reference cardinality model, and inspects how the search space is
//! partitioned.

use clap::{Parser, Subcommand};
use lightning_join::join_search::{AdmissibleSetEnumerator, ConstraintGenerator};
use lightning_join::logging::{init_logging, parse_level};
use lightning_join::{search, CardinalityModel, JoinPolicy, SearchConfig, ShapeMode};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "lightning-join")]
#[command(about = "Partitioned parallel join-order search", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for the cheapest join order
    Search {
        /// Row counts of the base relations, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        cardinalities: Vec<f64>,

        /// Number of partitions / worker tasks
        #[arg(short, long)]
        workers: Option<usize>,

        /// Tree shapes to explore (linear, bushy)
        #[arg(short, long, default_value = "linear")]
        mode: ShapeMode,

        /// Selectivity of each join edge
        #[arg(short, long, default_value = "0.01")]
        selectivity: f64,

        /// Join relation 0 with every other relation instead of a chain
        #[arg(long)]
        star: bool,

        /// Score candidates as if relations could be cross-joined freely
        #[arg(long)]
        cross_products: bool,

        /// Call the cost model from one worker at a time
        #[arg(long)]
        serialize_evaluator: bool,

        /// Only merge fragments the model considers connected
        #[arg(long)]
        desirable_only: bool,

        /// Upper bound on pool threads
        #[arg(long)]
        max_threads: Option<usize>,

        /// Load the search configuration from a JSON file; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the ordering constraints of every partition
    Partitions {
        /// Number of base relations
        #[arg(short, long)]
        levels: usize,

        /// Number of partitions
        #[arg(short, long)]
        workers: usize,

        /// Tree shapes to explore (linear, bushy)
        #[arg(short, long, default_value = "linear")]
        mode: ShapeMode,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match parse_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(level, cli.json);

    if let Err(e) = run_command(cli.command, cli.json) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Search {
            cardinalities,
            workers,
            mode,
            selectivity,
            star,
            cross_products,
            serialize_evaluator,
            desirable_only,
            max_threads,
            config,
        } => {
            let mut search_config = match config {
                Some(path) => SearchConfig::from_json(&std::fs::read_to_string(path)?)?,
                None => SearchConfig::default(),
            };
            search_config.levels_needed = cardinalities.len();
            search_config.shape_mode = mode;
            if let Some(w) = workers {
                search_config.n_workers = w;
            }
            if serialize_evaluator {
                search_config.evaluator_reentrant = false;
            }
            if desirable_only {
                search_config.join_policy = JoinPolicy::DesirableOnly;
            }
            if max_threads.is_some() {
                search_config.max_threads = max_threads;
            }

            let model = if star {
                CardinalityModel::star(cardinalities, selectivity)
            } else {
                CardinalityModel::chain(cardinalities, selectivity)
            }
            .with_cross_products(cross_products);

            cmd_search(&model, &search_config, json)
        }
        Commands::Partitions {
            levels,
            workers,
            mode,
        } => cmd_partitions(levels, workers, mode, json),
    }
}

fn cmd_search(
    model: &CardinalityModel,
    config: &SearchConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let relations = model.relations();
    let start = Instant::now();
    let outcome = search(&relations, config, model, model)?;
    let elapsed = start.elapsed();

    if json {
        let report = json!({
            "config": config,
            "tree": outcome.tree,
            "order": outcome.tree.leaf_order(),
            "cost": outcome.cost,
            "plan": outcome.plan.relation,
            "winning_part": outcome.winning_part,
            "workers": outcome.workers,
            "elapsed_us": elapsed.as_micros() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Relations:     {}", config.levels_needed);
    println!("Mode:          {}", config.shape_mode);
    println!("Workers:       {}", config.n_workers);
    println!("Best tree:     {}", outcome.tree);
    println!("Plan:          {}", outcome.plan.relation.label);
    println!("Cost:          {:.2}", outcome.cost);
    println!("Rows:          {:.2}", outcome.plan.relation.cardinality);
    println!("Winning part:  {}", outcome.winning_part);
    println!("Elapsed:       {:.2?}", elapsed);
    println!();
    println!(
        "{:>6} {:>12} {:>10} {:>10} {:>9} {:>10}",
        "part", "cost", "subsets", "evaluated", "refused", "elapsed"
    );
    for worker in &outcome.workers {
        let cost = worker
            .cost()
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6} {:>12} {:>10} {:>10} {:>9} {:>10.2?}",
            worker.part_id,
            cost,
            worker.stats.admissible_subsets,
            worker.stats.candidates_evaluated,
            worker.stats.refusals,
            worker.stats.elapsed
        );
    }
    Ok(())
}

fn cmd_partitions(
    levels: usize,
    workers: usize,
    mode: ShapeMode,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SearchConfig::new(levels, workers, mode);
    config.validate()?;
    let generator = ConstraintGenerator::from_config(&config);
    let enumerator = AdmissibleSetEnumerator::new(levels, mode);

    let partitions: Vec<_> = (0..workers)
        .map(|part_id| {
            let constraints = generator.generate(part_id);
            let admissible = enumerator.enumerate(&constraints).len();
            (part_id, constraints, admissible)
        })
        .collect();

    if json {
        let report: Vec<_> = partitions
            .iter()
            .map(|(part_id, constraints, admissible)| {
                json!({
                    "part_id": part_id,
                    "constraints": constraints,
                    "admissible_subsets": admissible,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} relations in {} groups, {} workers, {} mode: {} distinguished bits, {} distinct partitions",
        levels,
        generator.groups().len(),
        workers,
        generator.shape_mode(),
        generator.distinguished_bits(),
        generator.partition_count()
    );
    for (part_id, constraints, admissible) in &partitions {
        let rendered: Vec<String> = constraints
            .iter()
            .map(|c| format!("{}<{}", c.before, c.after))
            .collect();
        println!(
            "part {:>3}: [{}] {} admissible subsets",
            part_id,
            rendered.join(", "),
            admissible
        );
    }
    Ok(())
}
