use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use console_core::{
    BackendClient, HttpBackendClient, ResultProjector, WorkflowCommand, WorkflowController,
    WorkflowEvent,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod diagnostics;
mod input;
mod render;

use config::{load_settings, parse_backend_url};
use input::{CommandParser, ConsoleCommand, HELP};

#[derive(Parser, Debug)]
#[command(name = "allot-console", about = "Operator console for exam-centre allotment")]
struct Args {
    /// TOML settings file, `console.toml` when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    /// Run commands from a file instead of stdin, stopping at the first failure.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Seed for reproducible student populations.
    #[arg(long)]
    seed: Option<u64>,
}

struct Console<B: BackendClient> {
    controller: Arc<WorkflowController<B>>,
    parser: CommandParser,
    diagnostics_dir: PathBuf,
}

impl<B: BackendClient> Clone for Console<B> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            parser: self.parser.clone(),
            diagnostics_dir: self.diagnostics_dir.clone(),
        }
    }
}

impl<B: BackendClient + 'static> Console<B> {
    async fn run_script(&self, path: &Path) -> Result<()> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read script '{}'", path.display()))?;

        for (index, line) in raw.lines().enumerate() {
            let line_no = index + 1;
            let command = match self.parser.parse(line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(msg) => bail!("{}:{line_no}: {msg}", path.display()),
            };
            if command == ConsoleCommand::Quit {
                break;
            }
            println!("> {}", line.trim());
            if !self.execute(command).await {
                bail!("{}:{line_no}: script stopped after a failed command", path.display());
            }
        }
        Ok(())
    }

    async fn run_interactive(&self) -> Result<()> {
        println!("Exam centre allotment console. Type 'help' for commands.");
        self.run_lines(BufReader::new(tokio::io::stdin())).await
    }

    /// Backend-bound commands run as background tasks so the prompt stays
    /// responsive. Outstanding tasks are awaited before returning.
    async fn run_lines<R: AsyncBufRead + Unpin>(&self, reader: R) -> Result<()> {
        let mut lines = reader.lines();
        let mut pending = JoinSet::new();

        while let Some(line) = lines.next_line().await.context("failed to read input")? {
            while let Some(joined) = pending.try_join_next() {
                if let Err(err) = joined {
                    error!("workflow task failed: {err}");
                }
            }

            match self.parser.parse(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(ConsoleCommand::Workflow(command))) if command.is_long_running() => {
                    println!("{} started", command.name());
                    let console = self.clone();
                    pending.spawn(async move {
                        console.run_workflow(command).await;
                    });
                }
                Ok(Some(command)) => {
                    self.execute(command).await;
                }
                Err(msg) => println!("{msg}"),
            }
        }

        if !pending.is_empty() {
            info!(outstanding = pending.len(), "waiting for outstanding operations");
            println!("Waiting for {} outstanding operation(s)...", pending.len());
        }
        while let Some(joined) = pending.join_next().await {
            if let Err(err) = joined {
                error!("workflow task failed: {err}");
            }
        }
        Ok(())
    }

    /// Returns false when the command failed.
    async fn execute(&self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Workflow(command) => return self.run_workflow(command).await,
            ConsoleCommand::Status => {
                let snapshot = self.controller.snapshot().await;
                println!("{}", render::status(&snapshot));
            }
            ConsoleCommand::Show(student_id) => {
                let snapshot = self.controller.snapshot().await;
                match ResultProjector::new(&snapshot).student_detail(&student_id) {
                    Some(detail) => println!("{}", render::student(&detail)),
                    None => {
                        println!("{}", render::unknown_student(&student_id));
                        return false;
                    }
                }
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => {}
        }
        true
    }

    async fn run_workflow(&self, command: WorkflowCommand) -> bool {
        let event = self.controller.dispatch(command).await;
        if let WorkflowEvent::DiagnosticsReady(report) = &event {
            let written =
                diagnostics::write_report(&self.diagnostics_dir, report, Utc::now()).await;
            return match written {
                Ok(path) => {
                    info!(path = %path.display(), "diagnostic report exported");
                    println!("Diagnostic report exported: {}", path.display());
                    true
                }
                Err(err) => {
                    error!("diagnostics export failed: {err:#}");
                    println!("Export failed: {err:#}");
                    false
                }
            };
        }

        let snapshot = self.controller.snapshot().await;
        println!("{}", render::event(&event, &snapshot));
        !event.is_failure()
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.backend_url {
        parse_backend_url(url)?;
        settings.backend_url = url.trim().to_string();
    }
    if let Some(seed) = args.seed {
        settings.simulation_seed = Some(seed);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend_url = parse_backend_url(&settings.backend_url)?;
    let backend = Arc::new(
        HttpBackendClient::new(
            &backend_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .context("failed to build http client")?,
    );
    let controller = match settings.simulation_seed {
        Some(seed) => WorkflowController::with_seed(backend, seed),
        None => WorkflowController::new(backend),
    };
    info!(
        backend = %backend_url,
        graph_detail = ?settings.graph_detail,
        use_cache = settings.use_cache,
        seeded = settings.simulation_seed.is_some(),
        "console ready"
    );

    let console = Console {
        controller: Arc::new(controller),
        parser: CommandParser::new(&settings),
        diagnostics_dir: settings.diagnostics_dir.clone(),
    };
    match args.script {
        Some(path) => console.run_script(&path).await,
        None => console.run_interactive().await,
    }
}
