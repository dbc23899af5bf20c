use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use storyreel::collab::Collaborators;
use storyreel::db::default_database_path;
use storyreel::telemetry::{self, LogFormat};
use storyreel::{load_config, Config, EnhanceRequest, Phase, StoryEngine};

/// Runs one story through the workflow against offline placeholder collaborators.
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn a short story prompt into a staged video generation run", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long = "config", short = 'c')]
    config: Option<PathBuf>,

    /// Story prompt to enhance
    #[arg(long = "prompt", short = 'p')]
    prompt: String,

    /// Story title; generated when omitted
    #[arg(long = "title")]
    title: Option<String>,

    /// Number of scenes (2-6); defaults to the configured value
    #[arg(long = "scenes")]
    scenes: Option<usize>,

    /// Record job metadata in the default database when none is configured
    #[arg(long = "persist")]
    persist: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs")]
    json_logs: bool,
}

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = telemetry::init("storyreel=info", format) {
        eprintln!("Logging disabled: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    if cli.persist && config.database.path.is_none() {
        config.database.path =
            default_database_path().map(|p| p.to_string_lossy().into_owned());
    }

    let max_scenes = cli.scenes.unwrap_or(config.workflow.default_max_scenes);
    let poll_interval = Duration::from_millis(config.workflow.poll_interval_ms.max(1));
    let engine = StoryEngine::new(config, Collaborators::placeholder())?;

    let job_id = engine.create_job();
    let story = engine
        .enhance(
            &job_id,
            EnhanceRequest {
                prompt: cli.prompt,
                title: cli.title,
                max_scenes,
            },
        )
        .await?;
    println!("Title: {}", story.story_title);
    println!("Story: {}", story.enhanced_story);

    let ack = engine.confirm(&job_id, true)?;
    if !ack.generation_started {
        engine.start_generation(&job_id)?;
    }

    let mut last_percentage = -1.0_f32;
    loop {
        if let Some(record) = engine.get_progress(&job_id)? {
            if record.percentage > last_percentage {
                println!("[{:>5.1}%] {}", record.percentage, record.current_step);
                last_percentage = record.percentage;
            }
        }
        if engine.get_status(&job_id)?.phase.is_terminal() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }
    engine.shutdown().await;

    let status = engine.get_status(&job_id)?;
    if status.phase != Phase::Completed {
        return Err(format!(
            "Job {} ended in {}: {}",
            job_id,
            status.phase,
            status.failure_reason.unwrap_or_default()
        )
        .into());
    }

    let result = engine.get_result(&job_id)?;
    info!(job_id = %job_id, "Generation finished");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
