// respira-cli/src/main.rs
mod rendering;

mod models {
    pub mod cli;
}

use anyhow::{Context, Result, anyhow};
use colored::*;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};

use respira_core::{
    Agent, AgentConfig, AgentError, Analytics, AnalyticsToolbox, Dataset, ToolRegistry,
    TurnOutcome, providers::ProviderRegistry,
};

use crate::rendering::{print_formatted, print_transcript};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const CONFIG_FILENAME: &str = "Respira.toml";
const LOG_FILE_NAME: &str = "respira.log";
const APP_DIR_NAME: &str = "respira";

fn find_config_file() -> Result<Option<PathBuf>> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let mut current = current_dir.as_path();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Ok(Some(config_path));
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

/// Explicit `--config`, else the nearest `Respira.toml`, else built-in defaults.
fn load_cli_config(explicit: Option<&Path>) -> Result<AgentConfig> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };
    match config_path {
        Some(path) => {
            let config = AgentConfig::from_file(&path)?;
            info!("Loaded configuration file at: {:?}", path);
            Ok(config)
        }
        None => {
            info!(
                "No '{}' found in the current directory or its parents, using defaults.",
                CONFIG_FILENAME
            );
            Ok(AgentConfig::default())
        }
    }
}

fn build_agent(config: &AgentConfig, dataset: Arc<Dataset>) -> Result<Agent> {
    let providers = ProviderRegistry::from_config(config)?;
    let provider = providers.default()?;
    let registry = ToolRegistry::with_tools(&config.enabled_tools()?)?;
    info!(
        provider = %providers.default_provider_id(),
        model = %provider.name(),
        tools = registry.len(),
        "Agent ready."
    );
    let toolbox = AnalyticsToolbox::new(registry, Analytics::new(dataset));
    Ok(Agent::new(
        config.system_prompt.clone(),
        provider,
        Arc::new(toolbox),
        config.request_timeout(),
    ))
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "-"]),
    );
    pb.set_message("Consulting the data...");
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn run_turn_with_spinner(agent: &Agent, prompt: &str, use_tools: bool) -> Result<TurnOutcome, AgentError> {
    let pb = spinner().ok();
    let result = agent.run_turn(prompt, use_tools).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result
}

/// Answers one prompt and prints the answer to stdout.
async fn run_single_turn(agent: &Agent, prompt: &str, use_tools: bool, show_history: bool) -> ExitCode {
    info!(use_tools, "Running non-interactive turn.");
    match run_turn_with_spinner(agent, prompt, use_tools).await {
        Ok(outcome) => {
            println!("{}", outcome.answer);
            if show_history {
                print_transcript(&outcome.conversation);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "Turn failed.");
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_welcome_message(agent: &Agent) {
    println!(
        "\n{}",
        "Respira: ask about respiratory-disease hospitalizations.".cyan().bold()
    );
    println!(
        "{}",
        format!(
            "Model: {}. Type 'exit' or 'quit' (or press Ctrl-C) to leave.\n",
            agent.provider_name()
        )
        .dimmed()
    );
}

/// REPL; each line is a separate turn with tool calling enabled.
async fn run_interactive(agent: &Agent, show_history: bool) -> Result<()> {
    print_welcome_message(agent);

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;

    let history_file_path = dirs::cache_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .and_then(|dir| match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir.join("cli_history.txt")),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Could not create history directory.");
                None
            }
        });
    if let Some(path) = &history_file_path {
        if rl.load_history(path).is_err() {
            debug!(path = %path.display(), "No previous CLI history found or error loading.");
        }
    }

    let prompt = format!("{} ", ">".green().bold());

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    info!("Exit command entered, leaving interactive mode.");
                    break;
                }

                match run_turn_with_spinner(agent, input, true).await {
                    Ok(outcome) => {
                        println!();
                        if let Err(e) = print_formatted(&outcome.answer) {
                            error!("Failed to render answer markdown: {}. Printing raw.", e);
                            println!("{}", outcome.answer);
                        }
                        if show_history {
                            print_transcript(&outcome.conversation);
                        }
                        println!();
                    }
                    Err(e) => {
                        error!("Turn failed: {}", e);
                        eprintln!("\n{} {}\n", "Error:".red(), e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                info!("Interrupted, leaving interactive mode.");
                break;
            }
            Err(ReadlineError::Eof) => {
                info!("EOF detected, leaving interactive mode.");
                break;
            }
            Err(err) => {
                error!("Readline error: {:?}", err);
                return Err(anyhow!(err)).context("Error reading input");
            }
        }
    }

    if let Some(path) = &history_file_path {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), error = %e, "Failed to save CLI history.");
        }
    }
    println!("{}", "Goodbye.".cyan());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    colored::control::set_override(true);

    dotenvy::dotenv().ok();
    let cli = models::cli::Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR_NAME);
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("{} Failed to create log directory {}: {}", "Error:".red(), log_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);
    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let time_format_desc = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => desc,
        Err(e) => {
            eprintln!("Warning: Failed to parse time format, using default: {}", e);
            Vec::new()
        }
    };
    let local_timer = LocalTime::new(time_format_desc);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    colored::control::unset_override();

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    let mut config = match load_cli_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(provider_id) = &cli.provider {
        if !config.providers.contains_key(provider_id) {
            eprintln!(
                "{} Provider '{}' is not defined in the configuration.",
                "Error:".red(),
                provider_id
            );
            return ExitCode::FAILURE;
        }
        config.default_provider = provider_id.clone();
    }

    let dataset = match Dataset::load(&config.dataset) {
        Ok(dataset) => Arc::new(dataset),
        Err(e) => {
            let e = AgentError::from(e);
            error!("{}", e);
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let agent = match build_agent(&config, dataset) {
        Ok(agent) => agent,
        Err(e) => {
            error!("Failed to create agent: {:#}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.interactive {
        match run_interactive(&agent, cli.show_history).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{} {:#}", "Error:".red(), e);
                ExitCode::FAILURE
            }
        }
    } else if let Some(prompt) = cli.prompt.as_deref() {
        run_single_turn(&agent, prompt, cli.function_calling, cli.show_history).await
    } else {
        eprintln!("{} Either --prompt or --interactive is required.", "Error:".red());
        ExitCode::FAILURE
    }
}
