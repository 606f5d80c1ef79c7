use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use grid_tester::runner::{Remote, ResultsPoller};
use grid_tester::RunConfig;

// Exit codes kept in step with the task definitions that drive this tool.
const EXIT_REMOTE_TESTS: i32 = 3;
const EXIT_CREDENTIALS: i32 = 4;
const EXIT_TUNNEL: i32 = 5;

#[derive(Parser)]
#[command(name = "grid-tester")]
#[command(version = "0.1.0")]
#[command(about = "Remote browser grid test orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suite across every browser listed in a run file
    Run {
        /// Path to the YAML run file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let mut run_config = RunConfig::load(&config)?;

            if !run_config.resolve_credentials() {
                eprintln!(
                    "{}",
                    "Missing grid credentials: set SAUCE_USERNAME and SAUCE_ACCESS_KEY"
                        .red()
                        .bold()
                );
                std::process::exit(EXIT_CREDENTIALS);
            }

            println!(
                "{} {} ({} browsers) at {}",
                "▶".green().bold(),
                run_config.name.cyan(),
                run_config.browsers.len(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );

            let on_test = Arc::new(ResultsPoller::new(run_config.poller.clone()));
            let remote = Remote::new(run_config, on_test)?;

            match remote.run().await {
                Ok(Some(0)) => {
                    println!("{}", "All browsers passed".green().bold());
                }
                Ok(Some(failures)) => {
                    println!(
                        "{}",
                        format!("{} browser(s) failed", failures).red().bold()
                    );
                    std::process::exit(EXIT_REMOTE_TESTS);
                }
                Ok(None) => {
                    // Tunnel was shut down before the run started; nothing ran.
                }
                Err(e) => {
                    eprintln!("{} {:#}", "✖".red().bold(), e);
                    std::process::exit(EXIT_TUNNEL);
                }
            }
        }
    }

    Ok(())
}
