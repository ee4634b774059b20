//! ollama-pod - spin Ollama up and down on RunPod GPUs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ollama_pod::config::{
    self, PollSettings, Settings, API_KEY_ENV, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_PULL_TIMEOUT_SECS, DEFAULT_READY_TIMEOUT_SECS, OLLAMA_IMAGE, OLLAMA_REGISTRY_URL,
    POLL_INTERVAL_SECS, RUNPOD_API_URL, STATE_DIR_ENV,
};
use ollama_pod::lifecycle::{PodCondition, UpOutcome, UpRequest};
use ollama_pod::vram::{override_gb, VramRequirement};
use ollama_pod::{CloudType, OllamaRegistry, PodError, PodManager, PodRecord, RunPod, StateStore};

/// Exit code after Ctrl-C, as shells report it.
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// ollama-pod - Spin up/down Ollama on RunPod GPUs.
#[derive(Parser)]
#[command(name = "ollama-pod")]
#[command(about = "Spin up/down Ollama on RunPod GPUs")]
struct Cli {
    /// RunPod API key (or set `RUNPOD_API_KEY` env var).
    #[arg(long, env = API_KEY_ENV, default_value = "", hide_env_values = true)]
    api_key: String,

    /// Directory holding pod records (default `~/.ollama-pod/pods`).
    #[arg(long, env = STATE_DIR_ENV)]
    state_dir: Option<PathBuf>,

    /// RunPod GraphQL endpoint.
    #[arg(long, env = "RUNPOD_API_URL", default_value = RUNPOD_API_URL, hide = true)]
    runpod_api_url: String,

    /// Ollama registry base URL.
    #[arg(long, env = "OLLAMA_REGISTRY_URL", default_value = OLLAMA_REGISTRY_URL, hide = true)]
    registry_url: String,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout: u64,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spin up an Ollama pod and pull a model.
    Up {
        /// Ollama model to pull (e.g. qwen2.5:7b).
        model: String,

        /// Name for this pod (used for multi-pod tracking).
        #[arg(long, default_value = "default")]
        name: String,

        /// Override the VRAM estimate, in GB.
        #[arg(long)]
        vram: Option<f64>,

        /// Specific RunPod GPU type ID.
        #[arg(long)]
        gpu_type: Option<String>,

        /// RunPod network volume ID (kept after `down`).
        #[arg(long)]
        volume_id: Option<String>,

        /// Cloud type: any, community, or secure.
        #[arg(long, default_value = "any")]
        cloud_type: CloudType,

        /// Docker image.
        #[arg(long, default_value = OLLAMA_IMAGE)]
        image: String,

        /// Show GPU and cost without creating a pod.
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Seconds to wait for the pod to come up.
        #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
        ready_timeout: u64,

        /// Seconds to wait for the model pull.
        #[arg(long, default_value_t = DEFAULT_PULL_TIMEOUT_SECS)]
        pull_timeout: u64,
    },

    /// Show tracked pods, checked against RunPod.
    Status {
        /// Name of a specific pod to show.
        #[arg(long)]
        name: Option<String>,
    },

    /// Terminate a tracked pod.
    Down {
        /// Name of the pod to terminate.
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Start tracking running Ollama pods that have no local record.
    Sync,
}

#[tokio::main]
async fn main() -> ExitCode {
    config::load_dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<PodError>() {
                Some(pod_err) => {
                    let kind = pod_err.kind();
                    eprintln!("error[{kind}]: {pod_err}");
                    u8::try_from(kind.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
                }
                None => {
                    eprintln!("error: {err:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn settings(cli: &Cli, poll: PollSettings) -> Result<Settings> {
    let state_dir = match &cli.state_dir {
        Some(dir) => dir.clone(),
        None => config::default_state_dir()?,
    };

    Ok(Settings {
        api_key: cli.api_key.clone(),
        runpod_api_url: cli.runpod_api_url.clone(),
        registry_url: cli.registry_url.clone(),
        state_dir,
        http_timeout: Duration::from_secs(cli.http_timeout),
        poll,
    })
}

fn manager(settings: &Settings) -> Result<PodManager> {
    let api_key = settings.require_api_key()?;
    let provider = RunPod::new(api_key, &settings.runpod_api_url, settings.http_timeout)?;
    let registry = OllamaRegistry::new(&settings.registry_url, settings.http_timeout)?;

    Ok(PodManager::new(
        Arc::new(provider),
        Arc::new(registry),
        StateStore::new(&settings.state_dir),
    )
    .with_poll(settings.poll)
    .with_http_timeout(settings.http_timeout))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Up {
            model,
            name,
            vram,
            gpu_type,
            volume_id,
            cloud_type,
            image,
            dry_run,
            ready_timeout,
            pull_timeout,
        } => {
            let poll = PollSettings {
                interval: Duration::from_secs(POLL_INTERVAL_SECS),
                ready_timeout: Duration::from_secs(*ready_timeout),
                pull_timeout: Duration::from_secs(*pull_timeout),
            };
            let manager = manager(&settings(&cli, poll)?)?;

            let req = UpRequest {
                name: name.clone(),
                model: model.clone(),
                vram_gb: vram.map(override_gb).transpose()?,
                gpu_type: gpu_type.clone(),
                volume_id: volume_id.clone(),
                cloud_type: *cloud_type,
                image: Some(image.clone()),
                dry_run: *dry_run,
            };

            if !dry_run {
                println!("⏳ Provisioning '{name}' for {model} (this can take several minutes)...");
            }

            let outcome = tokio::select! {
                outcome = manager.up(&req) => outcome?,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\n⚠️  Interrupted. Any pod already created is still tracked as '{name}'.");
                    eprintln!("   Inspect it with `ollama-pod status --name {name}` or remove it with `ollama-pod down --name {name}`.");
                    return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
                }
            };

            match outcome {
                UpOutcome::Planned(plan) => {
                    println!("\n📋 Dry run summary:");
                    println!("   Model:  {}", plan.model);
                    println!("   Image:  {}", plan.image);
                    println!("   Name:   {}", plan.name);
                    match plan.vram {
                        VramRequirement::Estimated(e) => println!(
                            "   VRAM:   {} GB (model {:.2} GB x {})",
                            e.required_gb,
                            bytes_to_gb(e.raw_size_bytes),
                            e.overhead_factor
                        ),
                        VramRequirement::Override(gb) => println!("   VRAM:   {gb} GB (override)"),
                    }
                    println!(
                        "   GPU:    {} ({} GB, {} cloud)",
                        plan.offering.type_id, plan.offering.vram_gb, plan.offering.cloud_category
                    );
                    println!("   Cost:   ${:.2}/hr", plan.offering.cost_per_hour);
                    if let Some(volume_id) = &plan.volume_id {
                        println!(
                            "   Volume: {volume_id} ({})",
                            plan.data_center_id.as_deref().unwrap_or("datacenter unknown")
                        );
                    }
                }
                UpOutcome::Ready { record, .. } => {
                    println!("\n✅ Pod is ready!");
                    print_record(&record);
                }
            }
        }

        Commands::Status { name } => {
            let manager = manager(&settings(&cli, PollSettings::default())?)?;
            let reports = manager.status(name.as_deref()).await?;

            if reports.is_empty() {
                println!("No tracked pods. Run `ollama-pod sync` to track pods started elsewhere.");
            }

            for report in reports {
                match (&report.record, &report.condition) {
                    (Ok(record), Some(PodCondition::Live(pod))) => {
                        println!("\n🟢 Pod: {}", report.name);
                        print_record(record);
                        println!("   Remote:   {} ({})", pod.status, pod.desired_status);
                    }
                    (Ok(record), Some(PodCondition::Stale { remote_status })) => {
                        println!("\n🔴 Pod: {} (stale)", report.name);
                        print_record(record);
                        println!(
                            "   Remote:   {}",
                            remote_status.map_or("not found".to_string(), |s| s.to_string())
                        );
                        println!(
                            "   💡 The pod no longer exists on RunPod. Run `ollama-pod down --name {}` to clean up.",
                            report.name
                        );
                    }
                    (Err(e), _) => {
                        println!("\n⚠️  Pod: {} (unreadable record)", report.name);
                        println!("   {e}");
                    }
                    (Ok(record), None) => {
                        println!("\n⚪ Pod: {}", report.name);
                        print_record(record);
                    }
                }
            }
            println!();
        }

        Commands::Down { name } => {
            let manager = manager(&settings(&cli, PollSettings::default())?)?;
            info!(name = %name, "Tearing down pod");
            let outcome = manager.down(name).await?;

            if outcome.already_gone {
                println!(
                    "\n✅ Pod '{name}' ({}) was already gone on RunPod; record removed.",
                    outcome.record.pod_id
                );
            } else {
                println!("\n✅ Pod '{name}' ({}) terminated.", outcome.record.pod_id);
            }
            if outcome.record.volume_id.is_some() {
                println!("   Network volume preserved, models cached for next run.");
            }
        }

        Commands::Sync => {
            let manager = manager(&settings(&cli, PollSettings::default())?)?;
            let adopted = manager.sync().await.context("Failed to sync pods from RunPod")?;

            if adopted.is_empty() {
                println!("No untracked Ollama pods found.");
            }
            for record in adopted {
                println!("🔗 Tracking pod {} as '{}'", record.pod_id, record.name);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_record(record: &PodRecord) {
    println!("   Name:     {}", record.name);
    println!("   Pod ID:   {}", record.pod_id);
    println!("   Status:   {}", record.status);
    println!("   Model:    {}", record.model);
    println!(
        "   Endpoint: {}",
        record.endpoint_url.as_deref().unwrap_or("(not yet known)")
    );
    println!("   GPU:      {}", record.gpu_type_id);
    if record.cost_per_hour > 0.0 {
        println!("   Cost:     ${:.2}/hr", record.cost_per_hour);
    }
    if let Some(volume_id) = &record.volume_id {
        println!("   Volume:   {volume_id}");
    }
    println!(
        "   Created:  {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(err) = &record.last_error {
        println!("   Error:    {err}");
    }
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / f64::from(1u32 << 30)
}
