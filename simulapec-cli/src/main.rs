//! SimulaPEC CLI: run, estimate and grid commands.
//!
//! Commands:
//! - `run`: probe, confirm, then estimate rejection curves for every tail percentage
//! - `estimate`: time probe only; prints the advisory run-time estimate
//! - `grid`: print the sample-size and tail-percentage grids

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use simulapec_core::grid::max_sample_size;
use simulapec_runner::{
    estimate_run_time, load_real_data, save_csv, save_json, spawn_simulation, ControlHandle,
    RawFields, RunController, RunEvent, RunOutcome, SimulationConfig, SimulationResult,
    TimeEstimate,
};

#[derive(Parser)]
#[command(
    name = "simulapec",
    about = "SimulaPEC: Monte Carlo rejection rates for instrument acceptance tests"
)]
struct Cli {
    /// Debug logging on stderr (RUST_LOG is honoured either way).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full simulation grid.
    Run {
        #[command(flatten)]
        fields: FieldArgs,

        /// Real error list (one decimal per line) for the overlay curves.
        #[arg(long)]
        real_data: Option<PathBuf>,

        /// Skip the confirmation prompt.
        #[arg(long, short, default_value_t = false)]
        yes: bool,

        /// Write the long-format result table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the full result as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Time the first sample size and print the run-time estimate.
    Estimate {
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Print the simulation grids.
    Grid {
        #[command(flatten)]
        fields: FieldArgs,

        /// Print the grid as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// The six user fields plus config-file overrides. Fields are kept as text
/// so that parse errors are reported together by the configuration layer.
#[derive(Args)]
struct FieldArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Population size N.
    #[arg(long = "population-size", short = 'n')]
    population_size: Option<String>,

    /// Admissible error (comma or point decimal).
    #[arg(long = "admissible-error", short = 'e')]
    admissible_error: Option<String>,

    /// Base tail percentage used for the probe and the real-data overlay.
    #[arg(long = "base-tail")]
    base_tail_percent: Option<String>,

    /// Maximum tail percentage on the grid.
    #[arg(long = "max-tail")]
    max_tail_percent: Option<String>,

    /// Step between tail percentages.
    #[arg(long)]
    interval: Option<String>,

    /// Draws per sample size.
    #[arg(long, short = 'i')]
    iterations: Option<String>,

    /// Worker threads for the estimator pool.
    #[arg(long)]
    threads: Option<usize>,

    /// Seed of the draw-with-replacement hierarchy.
    #[arg(long)]
    sampling_seed: Option<u64>,
}

impl FieldArgs {
    /// Base config (file or defaults, with flag overrides) and the raw user fields.
    fn resolve(&self) -> Result<(SimulationConfig, RawFields)> {
        let mut base = match &self.config {
            Some(path) => SimulationConfig::from_file(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(threads) = self.threads {
            base.threads = threads;
        }
        if let Some(seed) = self.sampling_seed {
            base.sampling_seed = seed;
        }

        let mut raw = RawFields::from(&base);
        let overrides = [
            (&self.population_size, &mut raw.population_size),
            (&self.admissible_error, &mut raw.admissible_error),
            (&self.base_tail_percent, &mut raw.base_tail_percent),
            (&self.max_tail_percent, &mut raw.max_tail_percent),
            (&self.interval, &mut raw.tail_interval),
            (&self.iterations, &mut raw.n_iterations),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                field.clone_from(value);
            }
        }
        Ok((base, raw))
    }

    fn config(&self) -> Result<SimulationConfig> {
        let (base, raw) = self.resolve()?;
        Ok(SimulationConfig::from_fields_with(&base, &raw)?)
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            fields,
            real_data,
            yes,
            csv,
            json,
        } => run_simulation(&fields, real_data, yes, csv, json),
        Commands::Estimate { fields } => run_estimate(&fields),
        Commands::Grid { fields, json } => run_grid(&fields, json),
    }
}

// ─── run ─────────────────────────────────────────────────────────────

fn run_simulation(
    fields: &FieldArgs,
    real_data: Option<PathBuf>,
    yes: bool,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let (base, raw) = fields.resolve()?;
    let mut controller = RunController::with_base(base);
    let config = controller.configure(&raw)?;
    print_config(config);

    if let Some(path) = real_data {
        let population = load_real_data(&path)
            .with_context(|| format!("failed to load real data from {}", path.display()))?;
        println!("Real data: {} values from {}", population.len(), path.display());
        controller.load_real_data(population);
    }

    let worker = spawn_simulation(controller)?;
    for event in worker.events().iter() {
        match event {
            RunEvent::State(state) => {
                tracing::debug!(%state, "state");
                if state.is_terminal() {
                    break;
                }
            }
            RunEvent::Estimate(estimate) => {
                print_estimate(&estimate);
                let decision = if yes { Ok(true) } else { prompt_continue() };
                match decision {
                    Ok(true) => {
                        worker.control().confirm();
                        match spawn_cancel_listener(worker.control().clone()) {
                            Ok(()) => eprintln!("Type q and press Enter to cancel."),
                            Err(e) => tracing::warn!(error = %e, "run cannot be cancelled"),
                        }
                    }
                    Ok(false) => {
                        worker.control().abort();
                    }
                    Err(e) => {
                        worker.control().abort();
                        return Err(e);
                    }
                }
            }
            RunEvent::InnerProgress { completed, total } => {
                eprint!("\r  sample sizes {completed}/{total}   ");
            }
            RunEvent::OuterProgress { completed, total } => {
                eprintln!("\rRows {completed}/{total}                  ");
            }
            RunEvent::RowDone(_) => {}
        }
    }

    match worker.join() {
        RunOutcome::Completed(result) => {
            print_result(&result);
            if let Some(path) = json {
                save_json(&result, &path)?;
                println!("JSON written to {}", path.display());
            }
            if let Some(path) = csv {
                save_csv(&result, &path)?;
                println!("CSV written to {}", path.display());
            }
            Ok(())
        }
        RunOutcome::Cancelled { rows } => {
            println!("Run cancelled ({} rows completed, none reported).", rows.len());
            Ok(())
        }
        RunOutcome::Failed(e) => bail!("run failed: {e}"),
    }
}

fn prompt_continue() -> Result<bool> {
    eprint!("Continue? [y/N] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read confirmation from stdin")?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Lines typed during a confirmed run that cancel it.
fn is_cancel_command(line: &str) -> bool {
    matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "q" | "quit" | "cancel"
    )
}

/// Watch stdin on a side thread until a cancel command or end of input.
fn spawn_cancel_listener(control: ControlHandle) -> Result<()> {
    thread::Builder::new()
        .name("simulapec-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_cancel_command(&line) {
                    tracing::info!("cancel requested from stdin");
                    control.cancel();
                    eprintln!("\nCancelling...");
                    break;
                }
            }
        })
        .context("failed to start the stdin listener")?;
    Ok(())
}

// ─── estimate / grid ─────────────────────────────────────────────────

fn run_estimate(fields: &FieldArgs) -> Result<()> {
    let config = fields.config()?;
    print_config(&config);
    let estimate = estimate_run_time(&config)?;
    print_estimate(&estimate);
    Ok(())
}

fn run_grid(fields: &FieldArgs, json: bool) -> Result<()> {
    let config = fields.config()?;
    let grid = config.grid();
    if json {
        println!("{}", serde_json::to_string_pretty(&grid)?);
        return Ok(());
    }
    println!(
        "Tail percentages ({} rows): {:?}",
        grid.rows(),
        grid.tail_percents
    );
    println!(
        "Sample sizes ({} per row, up to {}): {:?}",
        grid.sample_sizes.len(),
        max_sample_size(config.population_size),
        grid.sample_sizes
    );
    println!(
        "Cells: {} ({} draws each)",
        grid.cells(),
        config.n_iterations
    );
    Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────

fn format_secs(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = secs.round() as u64;
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

fn print_config(config: &SimulationConfig) {
    println!("SimulaPEC");
    println!("  Population size:   {}", config.population_size);
    println!("  Admissible error:  {}", config.admissible_error);
    println!("  Base tail:         {}%", config.base_tail_percent);
    println!(
        "  Tail grid:         {}%..={}% step {}",
        config.tail_interval, config.max_tail_percent, config.tail_interval
    );
    println!("  Iterations:        {}", config.n_iterations);
    println!("  Threads:           {}", config.threads);
}

fn print_estimate(estimate: &TimeEstimate) {
    println!(
        "Estimated run time: {} ({} rows × {} probe)",
        format_secs(estimate.total_secs),
        estimate.rows,
        format_secs(estimate.probe_secs)
    );
}

fn print_result(result: &SimulationResult) {
    for row in result.all_rows() {
        println!();
        println!("Tail {}% ({})", row.tail_percent, row.source.as_str());
        println!("{:>8}  {:>13}  {:>13}", "n", "PRM precision", "PRM threshold");
        for line in row.table() {
            println!(
                "{:>8}  {:>12.2}%  {:>12.2}%",
                line.sample_size, line.prm_precision, line.prm_threshold
            );
        }
    }
    println!();
    println!(
        "Completed {} rows in {} (finished {})",
        result.rows.len(),
        format_secs(result.elapsed_secs),
        result.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
