use anyhow::{Context, Result};
use clap::Parser;
use node::config::NodeConfig;
use node::logging::init_logging;
use node::{PatientHistoryTracker, Simulation};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "medchain-node")]
#[command(about = "Permissioned proof-of-work ledger of signed health reports", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./medchain.toml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many mining rounds
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Number of competing miners
    #[arg(short, long)]
    miners: Option<usize>,

    /// Leading zero hex digits required of a block hash
    #[arg(short, long)]
    difficulty: Option<u32>,

    /// Prompt for patient history queries on stdin
    #[arg(short, long)]
    interactive: bool,

    /// Write the default configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(rounds) = self.rounds {
            config.simulation.rounds = Some(rounds);
        }
        if let Some(miners) = self.miners {
            config.mining.workers = miners;
        }
        if let Some(difficulty) = self.difficulty {
            config.mining.difficulty = difficulty;
        }
        if self.interactive {
            config.simulation.interactive = true;
        }
    }
}

fn spawn_history_query(history: Arc<PatientHistoryTracker>) {
    // A plain thread: a blocked stdin read must not hold up runtime shutdown
    thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            print!("Enter patient_id to view history (or 'exit'): ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let input = line.trim();
            if input.eq_ignore_ascii_case("exit") {
                break;
            }
            if !input.is_empty() {
                println!("\n{}", history.format_history(input));
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.write_default_config {
        NodeConfig::write_default(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config =
        NodeConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    init_logging(&config.logging).context("failed to initialize logging")?;

    info!(
        miners = config.mining.workers,
        difficulty = config.mining.difficulty,
        block_size = config.mining.block_size,
        patients = config.simulation.patients,
        doctors = config.simulation.doctors,
        "Starting MedChain node"
    );

    let simulation = Arc::new(Simulation::new(config)?);
    if simulation.config().simulation.interactive {
        spawn_history_query(Arc::clone(simulation.history()));
    }

    let stopper = Arc::clone(&simulation);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            stopper.stop();
        }
    });

    let stats = simulation.run().await;
    info!(
        rounds = stats.rounds,
        accepted = stats.accepted,
        rejected = stats.rejected,
        undecided = stats.undecided,
        chain_length = simulation.chain().len(),
        "Simulation finished"
    );

    if let Err(e) = simulation.chain().validate() {
        error!(error = %e, "Chain failed validation");
        return Err(e.into());
    }
    Ok(())
}
