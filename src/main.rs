use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use clusterplan_builder::{ResourceAccount, StackTaskBuilder};
use clusterplan_config::ClusterConfig;
use clusterplan_tasks::{ChannelNotifier, ExecutionEvent, RunError, Runner};

mod simulate;

use simulate::SimulatedBackend;

/// Clusterplan - plan and run cluster provisioning as task trees
#[derive(Parser)]
#[command(name = "clusterplan")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log filter used when RUST_LOG is unset (e.g. "info", "clusterplan_tasks=debug")
  #[arg(long, global = true, default_value = "warn")]
  log_level: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate a cluster config and print the task tree it produces
  Describe {
    /// Path to the cluster config (YAML or JSON)
    config: PathBuf,

    /// Treat the cluster as not supporting managed nodegroups
    #[arg(long)]
    without_managed_nodes: bool,
  },

  /// Run the task tree against a simulated backend
  Simulate {
    /// Path to the cluster config (YAML or JSON)
    config: PathBuf,

    /// How long each simulated stack takes to complete
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Resource to fail: a cluster or nodegroup name, "<namespace>/<name>"
    /// for a service account, or "oidc"
    #[arg(long = "fail", value_name = "NAME")]
    fail: Vec<String>,

    /// Treat the cluster as not supporting managed nodegroups
    #[arg(long)]
    without_managed_nodes: bool,
  },
}

/// Printed on stdout once a simulated run finishes.
#[derive(Debug, Serialize)]
struct RunSummary {
  cluster: String,
  succeeded: bool,
  failures: Vec<FailureSummary>,
}

#[derive(Debug, Serialize)]
struct FailureSummary {
  path: Vec<String>,
  task: String,
  error: String,
}

impl RunSummary {
  fn new(cluster: &str, result: &Result<(), RunError>) -> Self {
    let failures = match result {
      Ok(()) => Vec::new(),
      Err(err) => err
        .failures()
        .iter()
        .map(|f| FailureSummary {
          path: f.path.clone(),
          task: f.description.clone(),
          error: f.error.to_string(),
        })
        .collect(),
    };

    Self {
      cluster: cluster.to_string(),
      succeeded: result.is_ok(),
      failures,
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(&cli.log_level);

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Commands::Describe {
      config,
      without_managed_nodes,
    } => rt.block_on(describe(config, !without_managed_nodes)),
    Commands::Simulate {
      config,
      delay_ms,
      fail,
      without_managed_nodes,
    } => rt.block_on(simulate(
      config,
      Duration::from_millis(delay_ms),
      fail,
      !without_managed_nodes,
    )),
  }
}

fn init_tracing(fallback: &str) {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}

/// Read a cluster config, choosing the format from the file extension.
async fn load_config(path: &Path) -> Result<ClusterConfig> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read config file: {}", path.display()))?;

  let is_yaml = matches!(
    path.extension().and_then(|ext| ext.to_str()),
    Some("yaml" | "yml")
  );
  let config = if is_yaml {
    ClusterConfig::from_yaml(&content)
  } else {
    ClusterConfig::from_json(&content)
  };

  config.with_context(|| format!("invalid config file: {}", path.display()))
}

async fn describe(config_file: PathBuf, supports_managed_nodes: bool) -> Result<()> {
  let config = load_config(&config_file).await?;

  // Nothing runs, so the backend only stands in for the collaborator handles.
  let backend = Arc::new(SimulatedBackend::new(Duration::ZERO, Vec::new()));
  let builder = StackTaskBuilder::new(
    config.metadata.clone(),
    backend.clone(),
    ResourceAccount::new("unresolved"),
    CancellationToken::new(),
  );
  let tree = builder
    .new_tasks_for_cluster_config(&config, supports_managed_nodes, backend)
    .context("failed to build task tree")?;

  println!("{}", tree);
  Ok(())
}

async fn simulate(
  config_file: PathBuf,
  delay: Duration,
  fail: Vec<String>,
  supports_managed_nodes: bool,
) -> Result<()> {
  let config = load_config(&config_file).await?;
  let cluster = config.metadata.name.clone();
  info!(cluster = %cluster, region = %config.metadata.region, "loaded cluster config");

  let backend = Arc::new(SimulatedBackend::new(delay, fail));
  let account = ResourceAccount::resolve(backend.as_ref(), &config.metadata.region).await?;

  let cancel = CancellationToken::new();
  let builder = StackTaskBuilder::new(
    config.metadata.clone(),
    backend.clone(),
    account,
    cancel.clone(),
  );
  let tree = builder
    .new_tasks_for_cluster_config(&config, supports_managed_nodes, backend)
    .context("failed to build task tree")?;

  eprintln!("[i] {}", tree);

  tokio::spawn({
    let cancel = cancel.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling outstanding tasks");
        cancel.cancel();
      }
    }
  });

  let (notifier, mut events) = ChannelNotifier::channel();
  let printer = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      if let Some(line) = render_event(&event) {
        eprintln!("{}", line);
      }
    }
  });

  let runner = Runner::with_notifier(notifier);
  let result = runner.run(tree).await;
  drop(runner);
  printer.await.context("event printer stopped unexpectedly")?;

  let summary = RunSummary::new(&cluster, &result);
  println!("{}", serde_json::to_string_pretty(&summary)?);

  if let Err(err) = result {
    bail!("failed to create cluster {:?}: {}", cluster, err);
  }
  Ok(())
}

/// One stderr line per event worth showing to an operator.
fn render_event(event: &ExecutionEvent) -> Option<String> {
  match event {
    ExecutionEvent::TaskStarted { task, .. } => Some(format!("[ ] {}", task)),
    ExecutionEvent::TaskProgress { task, message, .. } => Some(format!("[.] {}: {}", task, message)),
    ExecutionEvent::TaskCompleted { task, .. } => Some(format!("[✔] {}", task)),
    ExecutionEvent::TaskFailed { task, error, .. } => Some(format!("[✖] {}: {}", task, error)),
    ExecutionEvent::RunFailed { failures, .. } => Some(format!("[✖] {} task(s) failed", failures)),
    ExecutionEvent::RunStarted { .. } | ExecutionEvent::RunCompleted { .. } => None,
  }
}
