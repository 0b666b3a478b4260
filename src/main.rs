use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use seatrade_scheduler::config::{Config, ConfigOverrides};
use seatrade_scheduler::domain::{validate_rows, Camp, ValidationErrors};
use seatrade_scheduler::engine::{AssignmentEngine, SolveEvent, SolveOutcome, StatusCode};
use seatrade_scheduler::input::CampTables;
use seatrade_scheduler::model::build_model;
use seatrade_scheduler::model::lp::write_lp;
use seatrade_scheduler::output::csv::{assignments_to_csv, summary_to_csv};
use seatrade_scheduler::output::json::{outcome_report, render_json};
use seatrade_scheduler::output::table::{
    render_assignments_table, render_summary_table, render_validation_table,
};
use seatrade_scheduler::server::run_server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "seatrade-scheduler",
    about = "Assign camp cabins to seatrades across fleets and blocks"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(flatten)]
    tuning: TuningArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct TuningArgs {
    #[arg(long = "preference-weight")]
    preference_weight: Option<f64>,
    #[arg(long = "cabins-weight")]
    cabins_weight: Option<f64>,
    #[arg(long = "sparsity-weight")]
    sparsity_weight: Option<f64>,
    #[arg(long = "max-seatrades-per-fleet")]
    max_seatrades_per_fleet: Option<u32>,
    #[arg(long = "time-limit")]
    time_limit_secs: Option<u64>,
    #[arg(long = "gap")]
    relative_gap: Option<f64>,
    #[arg(long = "log-file")]
    log_path: Option<String>,
}

impl From<TuningArgs> for ConfigOverrides {
    fn from(value: TuningArgs) -> Self {
        Self {
            preference_weight: value.preference_weight,
            cabins_weight: value.cabins_weight,
            sparsity_weight: value.sparsity_weight,
            max_seatrades_per_fleet: value.max_seatrades_per_fleet,
            time_limit_secs: value.time_limit_secs,
            relative_gap: value.relative_gap,
            log_path: value.log_path,
        }
    }
}

#[derive(Debug, clap::Args, Clone)]
struct TableArgs {
    /// Seatrade table: seatrade,campers_min,campers_max
    #[arg(long)]
    seatrades: PathBuf,
    /// Camper table: camper,cabin,gender,seatrade_1..seatrade_N
    #[arg(long)]
    campers: PathBuf,
    /// Optional cabin roster: cabin,gender
    #[arg(long)]
    cabins: Option<PathBuf>,
}

impl TableArgs {
    fn load(&self) -> Result<CampTables> {
        CampTables::load(&self.seatrades, &self.campers, self.cabins.as_deref())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build and solve the assignment model
    Solve {
        #[command(flatten)]
        tables: TableArgs,
        /// Print the solver log as it streams
        #[arg(long)]
        follow: bool,
        /// Include unassigned rows in CSV output
        #[arg(long)]
        all: bool,
        /// Also write the assignment CSV to this path
        #[arg(long)]
        save: Option<PathBuf>,
        /// Write per-instance fill levels as CSV to this path
        #[arg(long = "save-summary")]
        save_summary: Option<PathBuf>,
    },
    /// Validate the input tables without solving
    Check {
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Write the model in CPLEX LP format
    Lp {
        #[command(flatten)]
        tables: TableArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(cli.tuning.clone().into());

    match &cli.command {
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
        Commands::Serve { host, port } => {
            config.validate()?;
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            run_server(config, addr).await?;
        }
        Commands::Check { tables } => {
            let tables = tables.load()?;
            let problems = validate_rows(&tables.seatrades, &tables.campers, &tables.cabins);
            if problems.is_empty() {
                println!(
                    "OK: {} seatrades, {} campers",
                    tables.seatrades.len(),
                    tables.campers.len()
                );
            } else {
                print_problems(&ValidationErrors(problems), cli.output)?;
                std::process::exit(1);
            }
        }
        Commands::Lp { tables, out } => {
            config.validate()?;
            let camp = build_or_report(&tables.load()?, cli.output)?;
            let built = build_model(&camp, &config.optimization);
            let lp = write_lp(&built.model);
            match out {
                Some(path) => {
                    std::fs::write(path, lp)
                        .with_context(|| format!("failed writing LP file: {}", path.display()))?;
                    let stats = built.stats();
                    info!(
                        variables = stats.variables,
                        rows = stats.rows,
                        "wrote {}",
                        path.display()
                    );
                }
                None => print!("{lp}"),
            }
        }
        Commands::Solve {
            tables,
            follow,
            all,
            save,
            save_summary,
        } => {
            let camp = Arc::new(build_or_report(&tables.load()?, cli.output)?);
            let engine = AssignmentEngine::with_default_solver();
            let mut handle = engine.start(Arc::clone(&camp), &config)?;
            while let Some(event) = handle.next_event().await {
                match event {
                    SolveEvent::Log(line) if *follow => eprintln!("{line}"),
                    SolveEvent::Phase(phase) => info!(?phase, "solve phase"),
                    SolveEvent::Log(_) => {}
                }
            }
            let outcome = handle.wait().await?;
            if let (Some(path), Some(table)) = (save, &outcome.table) {
                std::fs::write(path, assignments_to_csv(table, *all)?)
                    .with_context(|| format!("failed writing {}", path.display()))?;
            }
            if let (Some(path), Some(table)) = (save_summary, &outcome.table) {
                std::fs::write(path, summary_to_csv(&table.summary(&camp))?)
                    .with_context(|| format!("failed writing {}", path.display()))?;
            }
            print_outcome(&outcome, &camp, cli.output, *all)?;
            if outcome.code != StatusCode::Solved {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn build_or_report(tables: &CampTables, format: OutputFormat) -> Result<Camp> {
    match seatrade_scheduler::domain::build_camp(&tables.seatrades, &tables.campers, &tables.cabins)
    {
        Ok(camp) => Ok(camp),
        Err(errors) => {
            print_problems(&errors, format)?;
            Err(errors.into())
        }
    }
}

fn print_problems(errors: &ValidationErrors, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => eprintln!("{}", render_validation_table(errors)),
        OutputFormat::Json => {
            let messages = errors.iter().map(ToString::to_string).collect::<Vec<_>>();
            println!("{}", render_json(&messages)?);
        }
        OutputFormat::Csv => {
            warn!("CSV output for validation problems not implemented, using table");
            eprintln!("{}", render_validation_table(errors));
        }
    }
    Ok(())
}

fn print_outcome(outcome: &SolveOutcome, camp: &Camp, format: OutputFormat, all: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(&outcome_report(outcome, camp))?),
        OutputFormat::Csv => match &outcome.table {
            Some(table) => println!("{}", assignments_to_csv(table, all)?),
            None => eprintln!("no assignment: {:?}", outcome.status),
        },
        OutputFormat::Table => {
            println!(
                "Status: {} ({:?}){}  Backend: {}",
                outcome.code.as_i8(),
                outcome.status,
                if outcome.certified_optimal {
                    ", optimal"
                } else {
                    ""
                },
                outcome.backend
            );
            if let Some(objective) = outcome.objective {
                println!("Objective: {objective:.2}");
            }
            if let Some(table) = &outcome.table {
                println!("{}", render_assignments_table(table));
                println!("{}", render_summary_table(&table.summary(camp)));
            }
        }
    }
    Ok(())
}
