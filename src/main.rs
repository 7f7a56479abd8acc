//! q_maze - train a tabular Q-learning agent on a maze and print the path
//! it learned.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use q_maze::{Cell, Env, MazeConfig, Path, PathExtractor, Pos, Trainer, TrainingReport, ValueTable};

#[derive(Parser)]
#[command(name = "q_maze")]
#[command(
    author,
    version,
    about = "Learn a maze with tabular Q-learning and walk it greedily",
    long_about = None
)]
struct Cli {
    /// TOML file with the grid, rewards and hyper-parameters
    #[arg(short, long, env = "Q_MAZE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Probability of exploiting the best-known action
    #[arg(long)]
    epsilon: Option<f32>,

    #[arg(long)]
    discount_factor: Option<f32>,

    #[arg(long)]
    learning_rate: Option<f32>,

    /// Seed for the random source
    #[arg(long)]
    seed: Option<u64>,

    /// Times the greedy walk may re-enter a cell before giving up
    #[arg(long)]
    max_revisits: Option<usize>,

    /// Write per-episode statistics to this CSV file
    #[arg(long)]
    stats_csv: Option<PathBuf>,

    /// Print the greedy action and value of every floor cell
    #[arg(long)]
    show_values: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("q_maze={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;
    let env = config.build_env().context("invalid maze")?;
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, rows = env.rows(), cols = env.cols(), start = %config.start, "training");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut table = ValueTable::for_env(&env);
    let report = Trainer::new(&env, config.training)?.train(&mut table, config.start, &mut rng)?;

    if let Some(path) = &cli.stats_csv {
        write_stats(path, &report)?;
        info!(path = %path.display(), "wrote episode statistics");
    }
    if cli.show_values {
        print_values(&env, &table);
    }

    let path = PathExtractor::new(&env, &table)
        .with_max_revisits(config.navigation.max_revisits)
        .extract(config.start)
        .context("greedy walk did not settle on a terminal cell, try more episodes")?;

    for (i, pos) in path.iter().enumerate() {
        println!("Move {}: {}", i + 1, pos);
    }
    println!();
    print!("{}", render(&env, &path));

    if !path.reached_goal() {
        warn!(end = ?path.end(), "greedy walk did not reach the goal");
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<MazeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            MazeConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => MazeConfig::default(),
    };

    if let Some(episodes) = cli.episodes {
        config.training.episodes = episodes;
    }
    if let Some(epsilon) = cli.epsilon {
        config.training.epsilon = epsilon;
    }
    if let Some(discount_factor) = cli.discount_factor {
        config.training.discount_factor = discount_factor;
    }
    if let Some(learning_rate) = cli.learning_rate {
        config.training.learning_rate = learning_rate;
    }
    if let Some(max_revisits) = cli.max_revisits {
        config.navigation.max_revisits = max_revisits;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    config.training.validate()?;
    Ok(config)
}

fn write_stats(path: &std::path::Path, report: &TrainingReport) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for stats in &report.episodes {
        writer.serialize(stats)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_values(env: &Env, table: &ValueTable) {
    for pos in env.iter_all_coordinates().filter(|pos| !env.is_terminal(*pos)) {
        let (action, value) = table.best_action(pos);
        println!("{:<10} {:<6} {:>10.2}", pos.to_string(), action.to_string(), value);
    }
    println!();
}

fn render(env: &Env, path: &Path) -> String {
    let on_path: HashSet<Pos> = path.iter().copied().collect();
    let mut out = String::with_capacity(env.rows() * (env.cols() + 1));
    for row in 0..env.rows() {
        for col in 0..env.cols() {
            let pos = Pos::new(row, col);
            let glyph = match env.cell(pos) {
                Cell::Goal => 'G',
                _ if on_path.contains(&pos) => '*',
                Cell::Wall => '#',
                Cell::Floor => '.',
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
