use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use aios_a2a::{Executor, ExecutorConfig};
use aios_events::{EventStreamHub, FileSessionService, InMemorySessionService, SessionJournal};
use aios_protocol::{AgentCard, RunConfig, SessionService};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod ask;
mod echo;
mod server;
mod tasks;

use crate::ask::{AskRequest, ask, build_agent, render, session_key};
use crate::echo::EchoAgent;
use crate::server::{AppState, router};
use crate::tasks::TaskRegistry;

#[derive(Debug, Parser)]
#[command(name = "aios-a2a")]
#[command(about = "Bridge aiOS sessions with A2A peers")]
struct Cli {
    /// Persist sessions as JSONL under this directory instead of in memory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the echo agent over JSON-RPC with SSE streaming.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8788")]
        listen: SocketAddr,
        #[arg(long, default_value = "echo")]
        name: String,
        #[arg(long, default_value = "Replies with whatever it is sent")]
        description: String,
        /// URL advertised in the agent card; defaults to the listen address.
        #[arg(long)]
        public_url: Option<String>,
    },
    /// Send one message to a remote agent and print its replies.
    Ask {
        /// Agent card source: an http(s) base URL or a card file.
        #[arg(long)]
        agent: String,
        /// Local name for the remote agent, used as the author of its events.
        #[arg(long, default_value = "remote")]
        name: String,
        /// Continue an existing session.
        #[arg(long)]
        session: Option<String>,
        #[arg(required = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let sessions = session_store(cli.root.clone());

    match cli.command {
        Command::Serve {
            listen,
            name,
            description,
            public_url,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .json()
                .init();
            serve(sessions, listen, name, description, public_url).await
        }
        Command::Ask {
            agent,
            name,
            session,
            message,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .compact()
                .init();
            let remote = build_agent(&agent, &name)?;
            let request = AskRequest {
                session_key: session_key(session),
                text: message.join(" "),
            };
            let key = request.session_key.clone();
            for event in ask(sessions, remote, request).await? {
                println!("{}", render(&event));
            }
            eprintln!("session: {}", key.session_id);
            Ok(())
        }
    }
}

fn session_store(root: Option<PathBuf>) -> Arc<dyn SessionService> {
    let store: Arc<dyn SessionService> = match root {
        Some(root) => Arc::new(FileSessionService::new(root)),
        None => Arc::new(InMemorySessionService::new()),
    };
    Arc::new(SessionJournal::new(store, EventStreamHub::new(1024)))
}

async fn serve(
    sessions: Arc<dyn SessionService>,
    listen: SocketAddr,
    name: String,
    description: String,
    public_url: Option<String>,
) -> Result<()> {
    let url = public_url.unwrap_or_else(|| format!("http://{listen}/"));
    let mut card = AgentCard::new(name.clone(), url);
    card.description = description.clone();
    card.skills = aios_a2a::build_agent_skills(
        &aios_a2a::AgentProfile::new(name.clone(), aios_a2a::AgentKind::Custom)
            .with_description(description),
    );

    let runner = Arc::new(EchoAgent::new(name.clone(), sessions.clone()));
    let config = ExecutorConfig::new(name).with_run_config(RunConfig {
        streaming: true,
        max_llm_calls: None,
    });
    let state = AppState {
        card: Arc::new(card),
        executor: Arc::new(Executor::new(config, runner, sessions)),
        tasks: Arc::new(TaskRegistry::new()),
    };

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, "aios-a2a listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
