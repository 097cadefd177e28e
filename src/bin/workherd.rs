//! workherd CLI: run a command over every line of a file with a resizable herd.

use std::path::PathBuf;
use std::process::Command as Process;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use workherd::config::Config;
use workherd::server::{self, AppState};
use workherd::telemetry::{TelemetryConfig, init_telemetry};
use workherd::{Herd, Outcome, WorkItem};

/// Exit code a command uses to ask for a retry (sysexits EX_TEMPFAIL).
const EXIT_RETRY: i32 = 75;

#[derive(Parser)]
#[command(name = "workherd", about = "Bounded worker-pool runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a command once per input line, printing each outcome as JSON
    Run {
        /// File with one work item per line
        #[arg(long)]
        input: PathBuf,
        /// Number of concurrent workers
        #[arg(long, env = "HERD_SIZE")]
        herd_size: Option<usize>,
        /// Retry loopbacks per item before giving up
        #[arg(long, env = "HERD_MAX_RETRIES")]
        max_retries: Option<u32>,
        /// Control surface listen address
        #[arg(long, env = "HERD_ADDR")]
        addr: Option<String>,
        /// Command to run; the line is appended as the last argument.
        /// Exit 0 is success, 75 asks for a retry, anything else fails.
        #[arg(required = true, last = true)]
        cmd: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            input,
            herd_size,
            max_retries,
            addr,
            cmd,
        } => cmd_run(input, herd_size, max_retries, addr, cmd).await,
    }
}

async fn cmd_run(
    input: PathBuf,
    herd_size: Option<usize>,
    max_retries: Option<u32>,
    addr: Option<String>,
    cmd: Vec<String>,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(n) = herd_size {
        config.herd.herd_size = n;
    }
    if let Some(n) = max_retries {
        config.herd.max_retries = n;
    }
    if let Some(addr) = addr {
        config.addr = addr;
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workherd".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let lines = tokio::fs::read_to_string(&input).await?;

    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("no command given"))?;
    let program = program.clone();
    let args = args.to_vec();

    let herd = Herd::builder(move |work: &mut WorkItem<String, String>| {
        run_command(&program, &args, work)
    })
    .config(config.herd)
    .on_retry(|work| info!(id = %work.id, retry = work.retry_count(), "retrying"))
    .on_failure(|work| warn!(id = %work.id, "work failed"))
    .build();

    let state = AppState::new(herd.clone());
    let listen = config.addr.clone();
    let control = tokio::spawn(async move {
        if let Err(e) = server::serve(state, &listen).await {
            warn!("control surface stopped: {e}");
        }
    });

    herd.start();

    let loader = herd.clone();
    tokio::spawn(async move {
        let submit_all = async {
            for (n, line) in lines.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                loader.submit(WorkItem::new(n + 1, line.to_string())).await?;
            }
            Ok::<_, workherd::error::Error>(())
        };
        tokio::select! {
            res = submit_all => {
                if let Err(e) = res {
                    warn!("stopped loading work: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, no more work will be submitted");
            }
        }
        loader.close_input();
    });

    let results = herd.results();
    while let Some(work) = results.recv().await {
        println!("{}", serde_json::to_string(&work)?);
    }

    let totals = herd.metrics();
    info!(
        success = totals.success,
        failure = totals.failure,
        retry = totals.retry,
        "all work delivered"
    );
    control.abort();
    Ok(())
}

fn run_command(program: &str, args: &[String], work: &mut WorkItem<String, String>) -> Outcome {
    let output = match Process::new(program).args(args).arg(&work.payload).output() {
        Ok(output) => output,
        Err(e) => {
            work.set_result(format!("failed to spawn {program}: {e}"));
            return Outcome::Failure;
        }
    };

    work.set_result(String::from_utf8_lossy(&output.stdout).trim().to_string());
    match output.status.code() {
        Some(0) => Outcome::Success,
        Some(EXIT_RETRY) => Outcome::Retry,
        _ => Outcome::Failure,
    }
}
