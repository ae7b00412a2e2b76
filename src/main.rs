use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use cassi::{
    Config,
    cli::{Cli, Commands, ConfigCommands},
    core::{
        self, PromptQueue, Scheduler, Task, TaskContext, ToolRegistry, WorktreeRegistry,
        prompt::ResponseShape, task::kinds::RequestTask,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            request,
            steps,
            yes,
            repository,
            remote,
        } => {
            let config = Config::load()?;
            let repository_dir = match repository {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            run_request(&config, &repository_dir, request, steps, yes, remote).await
        }

        Commands::Serve { host, port } => {
            let config = Config::load()?;
            let queue = Arc::new(PromptQueue::new());
            cassi::api::serve(&host, port, queue, config.api.token()).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => {
                    let config = Config::load()?;
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                ConfigCommands::Path => {
                    let path = Config::config_path()?;
                    println!("{}", path.display());
                }
                ConfigCommands::GenerateToken => {
                    let token = cassi::config::ApiConfig::generate_token();
                    println!("Generated API token:\n");
                    println!("  {token}\n");
                    println!("Add to your config.toml:");
                    println!("  [api]");
                    println!("  token = \"{token}\"\n");
                    println!("Or set environment variable:");
                    println!("  export CASSI_API_TOKEN=\"{token}\"");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_request(
    config: &Config,
    repository_dir: &std::path::Path,
    request: String,
    steps: Vec<String>,
    yes: bool,
    remote: bool,
) -> anyhow::Result<ExitCode> {
    let queue = Arc::new(PromptQueue::new());
    let ctx = TaskContext::new(
        Arc::clone(ToolRegistry::global()),
        Arc::new(WorktreeRegistry::new()),
        Arc::clone(&queue),
        repository_dir,
    )
    .with_install_command(config.worktree.install_command.clone());

    // Remote mode serves the queue over HTTP; local mode answers on the
    // terminal.
    let answerer = if remote {
        let host = config.api.host.clone();
        let port = config.api.port;
        let token = config.api.token();
        let server_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            if let Err(e) = cassi::api::serve(&host, port, server_queue, token).await {
                tracing::error!(error = %e, "API server stopped");
            }
        })
    } else {
        tokio::spawn(answer_prompts_locally(Arc::clone(&queue), yes))
    };

    // Automated execution advances only on a scheduler tick with an empty
    // queue.
    let (advance_tx, mut advance_rx) = tokio::sync::mpsc::channel::<()>(1);
    let scheduler = Scheduler::new(Arc::clone(&queue)).with_period(config.scheduler.tick());
    let driver = tokio::spawn(scheduler.run(move || {
        let _ = advance_tx.try_send(());
    }));

    let _ = advance_rx.recv().await;

    let mut root = Task::new(RequestTask::new(request, steps));
    core::run_to_completion(&mut root, &ctx).await;

    driver.abort();
    answerer.abort();

    match root.state().error() {
        None => {
            println!("done");
            Ok(ExitCode::SUCCESS)
        }
        Some(error) if error.contains("aborted by user") => {
            println!("cancelled");
            Ok(ExitCode::SUCCESS)
        }
        Some(error) => {
            eprintln!("error: {error}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Answer queued prompts on the terminal until aborted.
async fn answer_prompts_locally(queue: Arc<PromptQueue>, yes: bool) {
    loop {
        if let Some(prompt) = queue.peek() {
            let response = if yes {
                json!(true)
            } else {
                read_response(&prompt).await
            };
            if let Err(e) = queue.resolve(response) {
                tracing::warn!(error = %e, "failed to resolve prompt");
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

async fn read_response(prompt: &core::Prompt) -> serde_json::Value {
    let message = prompt.message.clone();
    match prompt.shape {
        ResponseShape::Confirmation => {
            let confirmed = tokio::task::spawn_blocking(move || {
                dialoguer::Confirm::new()
                    .with_prompt(message)
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            })
            .await
            .unwrap_or(false);
            json!(confirmed)
        }
        ResponseShape::Text => {
            let text = tokio::task::spawn_blocking(move || {
                dialoguer::Input::<String>::new()
                    .with_prompt(message)
                    .interact_text()
                    .unwrap_or_default()
            })
            .await
            .unwrap_or_default();
            json!(text)
        }
    }
}
