use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod analysis;
mod classify;
mod filter;
mod join;
mod loader;
mod models;
mod pipeline;
mod report;
mod standardize;
mod stats;
mod timestamp;

use loader::Sources;
use report::{AnalysisReport, Format};
use standardize::ZeroVariance;

#[derive(Parser)]
#[command(name = "learning-regions")]
#[command(about = "Regional differences in student learning behavior", long_about = None)]
struct Cli {
    /// User attribute table
    #[arg(long, global = true, default_value = "./archive/Info_UserData.csv")]
    users: PathBuf,
    /// Content attribute table
    #[arg(long, global = true, default_value = "./archive/Info_Content.csv")]
    content: PathBuf,
    /// Problem event log
    #[arg(long, global = true, default_value = "./archive/Log_Problem.csv")]
    logs: PathBuf,
    /// How z-scores treat a metric with no spread
    #[arg(long, global = true, value_enum, default_value_t = ZeroVariance::Zero)]
    zero_variance: ZeroVariance,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Row counts per filter and the head of the per-student table
    Summary {
        #[arg(long, default_value_t = 5)]
        head: usize,
    },
    /// Kruskal-Wallis tests of points, badges and accuracy across cities
    Regions,
    /// Behavior types and their chi-square association with city
    Behavior,
    /// Full analysis
    Report {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "learning_regions={}",
            level.as_str().to_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("learning-regions v{} starting", env!("CARGO_PKG_VERSION"));

    let sources = Sources {
        users: &cli.users,
        content: &cli.content,
        logs: &cli.logs,
    };
    let tables = loader::load_all(&sources)?;
    let prepared = pipeline::prepare(&tables);
    let mut report = AnalysisReport {
        zero_variance: cli.zero_variance,
        stages: prepared.stages,
        ..AnalysisReport::default()
    };

    let command = cli.command.unwrap_or(Commands::Report {
        format: Format::Text,
        out: None,
    });

    match command {
        Commands::Summary { head } => {
            let profiles = aggregate::profiles(&prepared.rows);
            report.students = Some(profiles.len());
            report.head = profiles.into_iter().take(head).collect();
            print!("{}", report::build_text(&report));
        }
        Commands::Regions => {
            let regional = pipeline::regional(&prepared.rows)?;
            report.students = Some(regional.profiles.len());
            report.kruskal = regional.kruskal;
            print!("{}", report::build_text(&report));
        }
        Commands::Behavior => {
            let behavior = pipeline::behavior(&prepared.rows, cli.zero_variance)?;
            report.classified_students = Some(behavior.summaries.len());
            report.behavior_counts = behavior.counts;
            report.chi_square = behavior.chi_square;
            print!("{}", report::build_text(&report));
        }
        Commands::Report { format, out } => {
            let regional = pipeline::regional(&prepared.rows)?;
            let behavior = pipeline::behavior(&prepared.rows, cli.zero_variance)?;
            report.students = Some(regional.profiles.len());
            report.head = regional.profiles.iter().take(5).cloned().collect();
            report.kruskal = regional.kruskal;
            report.classified_students = Some(behavior.summaries.len());
            report.behavior_counts = behavior.counts;
            report.chi_square = behavior.chi_square;

            let rendered = report::render(&report, format)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}
