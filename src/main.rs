//! ontreg - ONT discovery and registration client for Huawei OLTs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ontreg::config;
use ontreg::error::WorkflowError;
use ontreg::models::{OltId, ProfileId};
use ontreg::service::{OfflineService, ProvisioningService, RemoteService};
use ontreg::workflow::{discovery_table, present, Discovery, Workflow};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ontreg", version)]
#[command(about = "ONT discovery and registration client", long_about = None)]
struct Args {
    /// Config file path (default: ontreg.toml, config.toml, ...)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the built-in simulator regardless of configuration
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured OLT connections
    Olts,

    /// List registration profiles
    Profiles {
        /// Only profiles usable on this OLT
        #[arg(long)]
        olt: Option<String>,
    },

    /// Scan an OLT for unregistered ONTs
    Scan {
        #[arg(long)]
        olt: String,

        #[arg(long)]
        json: bool,
    },

    /// Scan, select and register ONTs in one batch
    Register {
        #[arg(long)]
        olt: String,

        #[arg(long)]
        profile: String,

        /// Positions from the scan table, e.g. 0,2
        #[arg(long, value_delimiter = ',', required_unless_present = "all", conflicts_with = "all")]
        select: Vec<usize>,

        /// Register every discovered ONT
        #[arg(long)]
        all: bool,

        /// Show the OLT command trace under each result
        #[arg(long)]
        commands: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let workflow_err = e.downcast_ref::<WorkflowError>();
            eprintln!("Error: {:#}", e);
            if workflow_err.map_or(false, WorkflowError::is_retryable) {
                eprintln!("This can be retried.");
            }
            if workflow_err.map_or(false, WorkflowError::is_validation) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = config::Config::load(args.config.as_deref())?;
    init_logging(&cfg.logging)?;

    tracing::debug!("ontreg v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Config = args.command {
        print!("{}", cfg.to_display_toml()?);
        return Ok(());
    }

    let service = build_service(&cfg, args.offline)?;

    match args.command {
        Command::Olts => list_olts(service.as_ref()).await,
        Command::Profiles { olt } => list_profiles(service.as_ref(), olt.map(OltId::new)).await,
        Command::Scan { olt, json } => scan(service, &OltId::new(olt), json).await,
        Command::Register {
            olt,
            profile,
            select,
            all,
            commands,
            json,
        } => {
            let olt = OltId::new(olt);
            let profile = ProfileId::new(profile);
            register(service, &olt, &profile, &select, all, commands, json).await
        }
        Command::Config => Ok(()),
    }
}

/// Log to `log_file` if configured, otherwise stderr so stdout stays clean
fn init_logging(cfg: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if cfg.log_file.is_empty() {
        builder.with_writer(std::io::stderr).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.log_file)
            .with_context(|| format!("Failed to open log file {}", cfg.log_file))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    Ok(())
}

/// Pick the provisioning back end from configuration
fn build_service(cfg: &config::Config, offline: bool) -> Result<Arc<dyn ProvisioningService>> {
    let backend = if offline {
        config::Backend::Offline
    } else {
        cfg.service.backend
    };

    let service: Arc<dyn ProvisioningService> = match backend {
        config::Backend::Remote => {
            Arc::new(RemoteService::new(cfg).context("Failed to create registration service client")?)
        }
        config::Backend::Offline => {
            tracing::warn!("Running against the offline simulator, nothing is sent to an OLT");
            Arc::new(OfflineService::new(cfg))
        }
    };
    tracing::info!("Using provisioning service: {}", service.name());
    Ok(service)
}

async fn list_olts(service: &dyn ProvisioningService) -> Result<()> {
    let olts = service.list_olts().await.context("Failed to list OLTs")?;
    if olts.is_empty() {
        println!("No OLTs configured");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<21} {}", "ID", "NAME", "ADDRESS", "STATUS");
    for olt in &olts {
        println!(
            "{:<16} {:<24} {:<21} {}",
            olt.id,
            olt.name,
            format!("{}:{}", olt.ip_address, olt.port),
            olt.status.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn list_profiles(service: &dyn ProvisioningService, olt: Option<OltId>) -> Result<()> {
    let profiles = match &olt {
        Some(olt) => service.profiles_for(olt).await,
        None => service.list_profiles().await,
    }
    .context("Failed to list profiles")?;

    println!(
        "{:<16} {:<20} {:<12} {:>5} {:>5} {:<10} {}",
        "ID", "NAME", "OLT", "LINE", "SRV", "VLANS", "DESCRIPTION"
    );
    for p in &profiles {
        println!(
            "{:<16} {:<20} {:<12} {:>5} {:>5} {:<10} {}",
            p.id,
            p.name,
            p.olt_id.as_ref().map_or("(generic)", |o| o.as_str()),
            p.line_profile_id,
            p.srv_profile_id,
            p.business_vlans,
            p.description
        );
    }
    Ok(())
}

fn discovery_json(discovery: &Discovery) -> serde_json::Value {
    serde_json::json!({
        "olt_id": discovery.olt,
        "generation": discovery.generation,
        "simulated": discovery.source.is_simulated(),
        "source": discovery.source.to_string(),
        "count": discovery.devices.len(),
        "onts": discovery.devices,
    })
}

async fn scan(service: Arc<dyn ProvisioningService>, olt: &OltId, json: bool) -> Result<()> {
    let workflow = Workflow::new(service);
    let discovery = workflow.scan(olt).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&discovery_json(&discovery))?);
    } else {
        print!("{}", discovery_table(&discovery, None));
    }
    Ok(())
}

async fn register(
    service: Arc<dyn ProvisioningService>,
    olt: &OltId,
    profile: &ProfileId,
    select: &[usize],
    all: bool,
    show_commands: bool,
    json: bool,
) -> Result<()> {
    let workflow = Workflow::new(service);
    let discovery = workflow.scan(olt).await?;

    if all {
        workflow.toggle_all()?;
    } else {
        for &position in select {
            if !workflow.selection().contains(position) {
                workflow.toggle(position)?;
            }
        }
    }

    if !json {
        let selection = workflow.selection();
        print!("{}", discovery_table(&discovery, Some(&selection)));
        if !selection.is_empty() {
            println!("{} of {} ONT(s) selected", selection.len(), discovery.devices.len());
        }
        println!();
    }

    let result = workflow.register(Some(olt), Some(profile)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", present(&result).with_commands(show_commands));
    }
    if !result.all_succeeded() {
        tracing::warn!("{} ONT(s) were not registered", result.fail_count);
    }
    tracing::debug!("Session ended {}", workflow.phase());
    Ok(())
}
