//! `alex` — interactive CLI front-end.
//!
//! One task at a time; events from the bus are rendered to stdout as they
//! arrive.  `--sandbox` overrides the execution mode so file/shell tools
//! route to the remote sandbox instead of the host.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use alex::config::{load_default_config, ExecutionModeSetting};
use alex::coordinator::TaskRequest;
use alex::events::WorkflowEvent;
use alex::presets::PresetConfig;
use alex::{AppContainer, ProcessRole};

#[derive(Parser)]
#[command(name = "alex", version, about = "AI coding agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Route file/shell tools through the remote sandbox service.
    #[arg(long, global = true)]
    sandbox: bool,

    /// Verbose logging (also honoured via RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new task in a fresh session.
    Ask {
        /// The task, in natural language.
        task: Vec<String>,
        /// Agent persona preset (default, code-expert, researcher, devops,
        /// security-analyst).
        #[arg(long)]
        agent_preset: Option<String>,
        /// Tool access preset (full, read-only, code-only, web-only, safe).
        #[arg(long)]
        tool_preset: Option<String>,
        /// LLM selection ("provider" or "provider:model").
        #[arg(long)]
        llm: Option<String>,
    },
    /// Append a task to an existing session.
    Resume {
        session_id: String,
        task: Vec<String>,
        #[arg(long)]
        agent_preset: Option<String>,
        #[arg(long)]
        tool_preset: Option<String>,
        #[arg(long)]
        llm: Option<String>,
    },
    /// List stored sessions.
    List,
    /// Index a path for retrieval (requires the external indexing service).
    Index { path: String },
    /// Search the retrieval index (requires the external indexing service).
    Search { query: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = alex::logging::init(cli.verbose);

    let mut config = load_default_config();
    if cli.sandbox {
        config.execution_mode = ExecutionModeSetting::Sandbox;
    }

    let container = match AppContainer::build(config, ProcessRole::Cli) {
        Ok(container) => Arc::new(container),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    container.start().await;

    let code = match cli.command {
        Commands::Ask {
            task,
            agent_preset,
            tool_preset,
            llm,
        } => {
            run_task(
                &container,
                task.join(" "),
                None,
                agent_preset,
                tool_preset,
                llm,
            )
            .await
        }
        Commands::Resume {
            session_id,
            task,
            agent_preset,
            tool_preset,
            llm,
        } => {
            run_task(
                &container,
                task.join(" "),
                Some(session_id),
                agent_preset,
                tool_preset,
                llm,
            )
            .await
        }
        Commands::List => list_sessions(&container).await,
        Commands::Index { .. } | Commands::Search { .. } => {
            eprintln!("the retrieval index is provided by the external indexing service; not bundled with this build");
            ExitCode::FAILURE
        }
    };

    container.shutdown().await;
    code
}

async fn run_task(
    container: &Arc<AppContainer>,
    task: String,
    session_id: Option<String>,
    agent_preset: Option<String>,
    tool_preset: Option<String>,
    llm: Option<String>,
) -> ExitCode {
    let request = TaskRequest {
        task,
        session_id,
        presets: PresetConfig {
            agent_preset,
            tool_preset,
        },
        llm_selection: llm,
        stream: true,
        ..Default::default()
    };

    let coordinator = container.coordinator();
    let (handle, mut rx) = match coordinator.execute_task_watch(request).await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("session {}", handle.session_id);

    // Render events until the terminal one arrives.
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                if render_event(&envelope.event) {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                container.bus().record_lag(n);
                eprintln!("… {n} events skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    ExitCode::SUCCESS
}

/// Print one event; returns `true` for terminal events.
fn render_event(event: &WorkflowEvent) -> bool {
    match event {
        WorkflowEvent::NodeStarted {
            iteration, total, ..
        } => {
            println!("· iteration {iteration}/{total}");
        }
        WorkflowEvent::ToolStarted {
            tool_name,
            arguments_preview,
            ..
        } => {
            println!("→ {tool_name} {arguments_preview}");
        }
        WorkflowEvent::ToolCompleted {
            tool_name,
            success,
            error,
            ..
        } => {
            if *success {
                println!("✓ {tool_name}");
            } else {
                println!("✗ {tool_name}: {}", error.as_deref().unwrap_or("failed"));
            }
        }
        WorkflowEvent::NodeOutputDelta { delta } => {
            print!("{delta}");
        }
        WorkflowEvent::NodeFailed { error, .. } => {
            eprintln!("iteration failed: {error}");
        }
        WorkflowEvent::ResultFinal {
            final_answer,
            total_iterations,
            total_tokens,
            ..
        } => {
            if !final_answer.is_empty() {
                println!("\n{final_answer}");
            }
            println!("({total_iterations} iterations, {total_tokens} tokens)");
            return true;
        }
        WorkflowEvent::ResultCancelled { reason, .. } => {
            println!("cancelled: {reason}");
            return true;
        }
        _ => {}
    }
    false
}

async fn list_sessions(container: &Arc<AppContainer>) -> ExitCode {
    match container.coordinator().list_sessions().await {
        Ok(sessions) => {
            if sessions.is_empty() {
                println!("no sessions");
            }
            for session in sessions {
                println!(
                    "{}  {}  {} messages  {}",
                    session.id,
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                    session.message_count,
                    session.label.as_deref().unwrap_or("")
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
