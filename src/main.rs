use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use kedro_agent::llm::{DEFAULT_TASK, SYSTEM_PROMPT};
use kedro_agent::manifest;
use kedro_agent::models::{AgentRun, RunStatus};
use kedro_agent::{AgentConfig, Config, KedroCli, OllamaProvider, ReactAgent, Storage, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "kedro-agent")]
#[command(version)]
#[command(about = "Manage Kedro projects through a tool-calling agent on a local Ollama model")]
struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent on a request (defaults to creating the 'analytics-pipeline' project)
    Run {
        /// Request for the agent
        prompt: Option<String>,

        /// Ollama model to use (overrides OLLAMA_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Directory the kedro commands run in (overrides KEDRO_WORKDIR)
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Do not record the run in the history database
        #[arg(long)]
        no_history: bool,
    },
    /// Check a pyproject.toml manifest
    Manifest {
        /// Path to the manifest
        #[arg(default_value = "pyproject.toml")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON schemas of the agent's tools
    Tools,
    /// Show recent agent runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose, args.log_format)?;

    let command = args.command.unwrap_or(Command::Run {
        prompt: None,
        model: None,
        workdir: None,
        format: OutputFormat::Text,
        no_history: false,
    });

    match command {
        Command::Run {
            prompt,
            model,
            workdir,
            format,
            no_history,
        } => {
            let mut config = Config::from_env()?;
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(workdir) = workdir {
                config.workdir = workdir;
            }
            let prompt = prompt.unwrap_or_else(|| DEFAULT_TASK.to_string());
            run_agent(&config, &prompt, format, no_history).await
        }
        Command::Manifest { path, format } => check_manifest(&path, format),
        Command::Tools => {
            let config = Config::from_env()?;
            let registry = ToolRegistry::kedro(KedroCli::new(config.kedro_bin, config.workdir));
            let specs: Vec<_> = registry.specs().iter().map(|s| s.to_wire()).collect();
            println!("{}", serde_json::to_string_pretty(&specs)?);
            Ok(())
        }
        Command::History { limit } => {
            let config = Config::from_env()?;
            let storage = Storage::new(&config.history_db)?;
            for run in storage.recent_runs(limit)? {
                println!("{}", format_history_line(&run));
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("kedro_agent={}", default_level).parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run_agent(
    config: &Config,
    prompt: &str,
    format: OutputFormat,
    no_history: bool,
) -> anyhow::Result<()> {
    let agent_config = AgentConfig::from(config);

    tracing::info!(model = %agent_config.model, url = %config.ollama_base_url, "Setting up LLM and agent");
    let provider = OllamaProvider::new(
        &config.ollama_base_url,
        &agent_config,
        config.request_timeout_secs,
    )?;
    let registry = ToolRegistry::kedro(KedroCli::new(
        config.kedro_bin.clone(),
        config.workdir.clone(),
    ));
    let agent = ReactAgent::new(Arc::new(provider), registry, SYSTEM_PROMPT, &agent_config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    spinner.set_message("Agent is working...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut run = agent.invoke(prompt).await;
    spinner.finish_and_clear();

    if !no_history {
        match Storage::new(&config.history_db).and_then(|storage| storage.save_run(&run)) {
            Ok(id) => {
                run.id = Some(id);
                tracing::info!(run_id = id, "Run saved to history");
            }
            Err(e) => tracing::warn!(error = %e, "Could not save run history"),
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
        OutputFormat::Text => println!("{}", format_run(&run)),
    }

    if run.status == RunStatus::Failed {
        anyhow::bail!("agent run failed: {}", run.output);
    }
    Ok(())
}

fn check_manifest(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let report = manifest::inspect(path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report.render()),
    }

    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn format_run(run: &AgentRun) -> String {
    let mut output = String::new();

    for message in run.tool_messages() {
        output.push_str(&format!(
            "[{}] {}\n",
            message.tool_name.as_deref().unwrap_or("tool"),
            message.content.lines().next().unwrap_or("")
        ));
    }
    if !output.is_empty() {
        output.push('\n');
    }

    output.push_str(&run.output);
    output
}

fn format_history_line(run: &AgentRun) -> String {
    let first_line = |s: &str| s.lines().next().unwrap_or("").to_string();
    format!(
        "#{} {} [{}] {} | {} -> {}",
        run.id.unwrap_or_default(),
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        run.status,
        run.model,
        first_line(&run.prompt),
        first_line(&run.output)
    )
}
