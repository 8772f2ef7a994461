use anyhow::{Context, Result};
use chat_core::{
    parse_user_count, MockSubmitter, Simulation, SimulationConfig, SimulationFile,
    SimulationReport, DEFAULT_NUM_USERS,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "simulate-conversation")]
#[command(about = "Simulate a massive conversation against the message store API")]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Number of simulated users
    users: Option<String>,

    /// Base URL of the message store [default: http://localhost:3000]
    #[arg(long, env = "API_URL")]
    api_url: Option<String>,

    /// Messages each user sends to the next user in the ring
    #[arg(long)]
    messages_per_user: Option<u64>,

    /// Submission mode: http or mock
    #[arg(long, default_value = "http")]
    mode: String,

    /// Per-request timeout in milliseconds (none by default)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Cap on simultaneous requests (uncapped by default)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Print progress every N milliseconds
    #[arg(long)]
    report_every_ms: Option<u64>,

    /// Seed for message content
    #[arg(long)]
    seed: Option<u64>,

    /// Optional TOML file with simulation settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final report as JSON to this path
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    execute(Args::parse()).await
}

/// Run to completion and map the outcome to the process exit status: 1 for a
/// bad configuration or a run that could not settle, 0 otherwise, however
/// many individual messages failed.
async fn execute(args: Args) -> ExitCode {
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            print_usage(&e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(config, &args).await {
        let rule = "=".repeat(70);
        println!();
        println!("{}", rule);
        eprintln!("SIMULATION FAILED!");
        println!("{}", rule);
        eprintln!("{:?}", e);
        println!("{}", rule);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn print_usage(e: &anyhow::Error) {
    eprintln!("Error: {:#}", e);
    eprintln!();
    eprintln!("Usage: simulate-conversation <number_of_users>");
    eprintln!("Example: simulate-conversation 50000");
}

/// Defaults, then the TOML file, then explicit flags.
fn resolve_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = SimulationConfig::new(DEFAULT_NUM_USERS);

    if let Some(path) = &args.config {
        let file = SimulationFile::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        config = file.apply(config);
    }

    if let Some(url) = &args.api_url {
        config.endpoint_url = url.clone();
    }
    if args.users.is_some() {
        config.num_users = parse_user_count(args.users.as_deref())?;
    }
    if let Some(n) = args.messages_per_user {
        config.messages_per_user = n;
    }
    if args.timeout_ms.is_some() {
        config.request_timeout_ms = args.timeout_ms;
    }
    if args.max_in_flight.is_some() {
        config.max_in_flight = args.max_in_flight;
    }
    if let Some(ms) = args.report_every_ms {
        config.report_interval_ms = ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: SimulationConfig, args: &Args) -> Result<()> {
    let simulation = match args.mode.as_str() {
        "http" => Simulation::over_http(config)?,
        "mock" => Simulation::new(config, Arc::new(MockSubmitter::new(5)))?, // 5ms simulated latency
        other => anyhow::bail!("Invalid mode: {}, must be 'http' or 'mock'", other),
    };

    let report = simulation.run().await?;

    if let Some(path) = &args.out {
        write_report(path, &report)?;
        info!("Results written to {:?}", path);
    }

    Ok(())
}

fn write_report(path: &Path, report: &SimulationReport) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).ok();
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("simulate-conversation").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_default_users() {
        let config = resolve_config(&parse(&["--api-url", "http://localhost:3000"])).unwrap();
        assert_eq!(config.num_users, 100_000);
        assert_eq!(config.messages_per_user, 2);
        assert_eq!(config.max_in_flight, None);
    }

    #[test]
    fn test_positional_users() {
        let config = resolve_config(&parse(&["3", "--api-url", "http://mock:1"])).unwrap();
        assert_eq!(config.num_users, 3);
        assert_eq!(config.endpoint_url, "http://mock:1");
        assert_eq!(config.total_messages(), 6);
    }

    #[test]
    fn test_invalid_users_rejected() {
        for bad in ["0", "abc", "-5"] {
            let args = parse(&[bad, "--api-url", "http://localhost:3000"]);
            assert!(resolve_config(&args).is_err(), "{bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_invalid_users_exit_one() {
        for bad in ["0", "abc", "-5"] {
            let code = execute(parse(&[bad, "--api-url", "http://localhost:3000"])).await;
            assert_eq!(code, ExitCode::FAILURE, "{bad:?} should exit 1");
        }
    }

    #[tokio::test]
    async fn test_unknown_mode_exits_one() {
        let code = execute(parse(&["3", "--api-url", "http://localhost:3000", "--mode", "grpc"])).await;
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_all_failures_still_exit_zero() {
        // Bind then drop so every send is refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let out = std::env::temp_dir()
            .join(format!("simulate-conversation-out-{}", std::process::id()))
            .join("report.json");
        let url = format!("http://{}", addr);
        let code = execute(parse(&[
            "3",
            "--api-url",
            &url,
            "--timeout-ms",
            "2000",
            "--out",
            out.to_str().unwrap(),
        ]))
        .await;
        assert_eq!(code, ExitCode::SUCCESS);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(report["succeeded"], 0);
        assert_eq!(report["failed"], 6);
        assert_eq!(report["completed"], 6);
        std::fs::remove_dir_all(out.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_mock_run_exits_zero() {
        let code = execute(parse(&["3", "--api-url", "http://localhost:3000", "--mode", "mock"])).await;
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = std::env::temp_dir().join(format!("simulate-conversation-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sim.toml");
        std::fs::write(&path, "num_users = 40\nseed = 1\nmax_in_flight = 10\n").unwrap();

        let config = resolve_config(&parse(&[
            "--api-url",
            "http://localhost:3000",
            "--config",
            path.to_str().unwrap(),
            "--max-in-flight",
            "3",
        ]))
        .unwrap();

        assert_eq!(config.num_users, 40);
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.max_in_flight, Some(3));
        std::fs::remove_dir_all(&dir).ok();
    }
}
