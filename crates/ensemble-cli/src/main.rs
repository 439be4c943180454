mod config;
mod display;
mod menu;
mod session;

use clap::{Parser, Subcommand};
use ensemble_orchestrator::{render_result, LocalDeregister, TaskCategory, TaskCoordinator};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble", about = "Ensemble — fan-out task coordinator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ensemble.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive menu session
    Run,
    /// Run a single query and exit (status 1 on failure)
    Query {
        /// The task description
        text: String,
        /// Task category: simple, search, analysis, multi_agent, complex
        #[arg(short = 'k', long, default_value = "multi_agent")]
        category: String,
    },
    /// List registered participants
    Participants,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Stop accepting work, wait for it to drain, then release participants.
async fn shutdown(coordinator: &TaskCoordinator) {
    coordinator.stop_runtime().await;
    println!("\nCleaning up participants...");
    let report = coordinator.cleanup(&LocalDeregister).await;
    for identity in &report.removed {
        println!("  removed  {identity}");
    }
    for identity in &report.retained {
        println!("  retained {identity} (protected)");
    }
    for (identity, error) in &report.failed {
        println!("  failed   {identity}: {error}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = config::load(&cli.config)?;

    match cli.command {
        Commands::Run => {
            let coordinator = session::build_coordinator(&config)?;
            coordinator.start_runtime();
            println!(
                "Response timeout: {}s, response display limit: {}",
                config.orchestration.response_timeout, config.orchestration.max_iterations
            );

            let mut stdout = std::io::stdout();
            let input = session::spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
            tokio::select! {
                outcome = session::run_session(&coordinator, input, &mut stdout) => {
                    if let Err(e) = outcome {
                        warn!(error = %e, "Session ended with an error");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\n\nInterrupted, goodbye!");
                }
            }

            shutdown(&coordinator).await;
        }
        Commands::Query { text, category } => {
            let category = TaskCategory::parse(&category);
            let coordinator = session::build_coordinator(&config)?;
            coordinator.start_runtime();

            info!(category = %category, "One-shot query");
            let result = coordinator.process_query(&text, category).await;
            println!("{}", render_result(&result));

            shutdown(&coordinator).await;
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Participants => {
            let coordinator = session::build_coordinator(&config)?;
            let participants = coordinator.participants();
            println!("Registered participants:");
            for participant in &participants {
                let descriptor = participant.capability.descriptor();
                let marker = if participant.protected { " (protected)" } else { "" };
                println!(
                    "  {}{marker} — {} [{}]",
                    participant.identity, participant.description, descriptor.name
                );
                for op in &descriptor.operations {
                    println!("    {}: {}", op.name, op.description);
                }
            }
            println!("\nTotal: {} participant(s)", participants.len());
        }
    }

    Ok(())
}
