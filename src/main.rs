use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use ratewatch::{
    channels::sentry::init_sentry,
    config::AppConfig,
    engine::AlertOutcome,
    initialization::{InitializationService, Services},
    models::{AlertEvent, AlertPolicy, ChannelKind, Severity},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml and policies.yaml.
    #[arg(long, global = true, default_value = "configs")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reads newline-delimited JSON alert events from stdin and sends each.
    Run,
    /// Sends a single alert event.
    Send(SendArgs),
    /// Prints the alert history of a group as JSON lines.
    History {
        /// The route group.
        #[arg(long)]
        group: String,
        /// Maximum number of entries.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Administers the stored alert policies.
    #[command(subcommand)]
    Policies(PolicyCommands),
}

#[derive(Args)]
struct SendArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    count: u64,
    #[arg(long)]
    path: Option<String>,
    #[arg(long)]
    method: Option<String>,
    #[arg(long)]
    severity: Option<Severity>,
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Lists every stored policy.
    List,
    /// Creates or replaces a policy.
    Upsert {
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "medium")]
        severity: Severity,
        #[arg(long)]
        cooldown_ms: Option<u64>,
        /// Comma-separated channel names.
        #[arg(long, value_delimiter = ',')]
        channels: Vec<String>,
        #[arg(long)]
        disabled: bool,
    },
    /// Deletes a policy.
    Delete {
        #[arg(long)]
        group: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    tracing::debug!(config_dir = %cli.config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(&cli.config_dir))?;
    let _sentry = config.channels.sentry.as_ref().map(init_sentry);

    let services = InitializationService::new(config).run().await?;

    match cli.command {
        Commands::Run => run(&services).await?,
        Commands::Send(args) => send(&services, args).await?,
        Commands::History { group, limit } => {
            for event in services.engine.get_alert_history(&group, limit).await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Commands::Policies(command) => policies(&services, command).await?,
    }

    services.policy_store.close().await;
    Ok(())
}

async fn run(services: &Services) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Reading alert events from stdin...");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AlertEvent>(&line) {
            Ok(event) => {
                services.engine.send_alert(event).await;
                sent += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Skipping malformed alert event."),
        }
    }

    tracing::info!(sent, "Input closed.");
    Ok(())
}

async fn send(services: &Services, args: SendArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut event = AlertEvent::new(args.group, args.identifier, args.count);
    event.path = args.path;
    event.method = args.method;
    event.severity = args.severity;

    let outcome = services.engine.send_alert(event).await;
    services.engine.wait_for_background_tasks().await;

    match outcome {
        AlertOutcome::NoPolicy => println!("no policy"),
        AlertOutcome::Disabled => println!("policy disabled"),
        AlertOutcome::Suppressed { .. } => println!("suppressed (cooldown active)"),
        AlertOutcome::Dispatched(report) => {
            let delivered: Vec<_> = report.delivered.iter().map(ChannelKind::as_str).collect();
            println!("delivered: {}", delivered.join(","));
            for (kind, error) in &report.failed {
                println!("failed: {kind}: {error}");
            }
        }
    }
    Ok(())
}

async fn policies(
    services: &Services,
    command: PolicyCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::clone(&services.policy_store);
    match command {
        PolicyCommands::List => {
            for policy in store.list_policies().await? {
                println!("{}", serde_json::to_string(&policy)?);
            }
        }
        PolicyCommands::Upsert { group, severity, cooldown_ms, channels, disabled } => {
            let policy = AlertPolicy {
                enabled: !disabled,
                cooldown_ms,
                channels: channels.into_iter().map(ChannelKind::from).collect(),
                ..AlertPolicy::new(group, severity)
            };
            store.upsert_policy(&policy).await?;
            println!("{}", serde_json::to_string(&policy)?);
        }
        PolicyCommands::Delete { group } => {
            store.delete_policy(&group).await?;
            println!("deleted {group}");
        }
    }
    Ok(())
}
