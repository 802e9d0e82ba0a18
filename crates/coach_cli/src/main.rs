use anyhow::{Context, Result};
use clap::Parser;
use coach_core::{ChatLog, CoachConfig, ExerciseCatalog, SessionStore};
use coach_memory::{InMemoryStore, SessionRepository, SqliteStore};
use coach_reasoning::{create_client, CompletionParams, Orchestrator, TurnReply};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "coach.toml")]
    config: String,

    /// Path to the SQLite database (overrides the config file)
    #[arg(short, long, env = "COACH_DB_PATH")]
    db: Option<String>,

    /// User id for the terminal chat
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Keep everything in memory instead of SQLite
    #[arg(long)]
    ephemeral: bool,

    /// Serve the HTTP gateway instead of the terminal chat
    #[cfg(feature = "gateway")]
    #[arg(long)]
    serve: bool,
}

struct Collaborators {
    sessions: Arc<dyn SessionStore>,
    chat_log: Arc<dyn ChatLog>,
    catalog: Arc<dyn ExerciseCatalog>,
}

async fn open_store(args: &Args, config: &CoachConfig) -> Result<Collaborators> {
    if args.ephemeral {
        info!("Using in-memory store");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Collaborators {
            sessions: store.clone(),
            chat_log: store.clone(),
            catalog: store,
        });
    }

    let path = args.db.as_deref().unwrap_or(&config.storage.db_path);
    info!("Opening database at {}...", path);
    let store = Arc::new(
        SqliteStore::new(path)
            .await
            .with_context(|| format!("Failed to open database {}", path))?,
    );
    Ok(Collaborators {
        sessions: store.clone(),
        chat_log: store.clone(),
        catalog: store,
    })
}

fn print_reply(reply: &TurnReply) {
    if let Some(opening) = &reply.opening {
        println!("\nCoach: {}", opening);
    }
    println!("\nCoach: {}\n", reply.content);
}

async fn run_repl(orchestrator: &Orchestrator, user: &str) -> Result<()> {
    println!("Exercise coach ready. Commands: /new, /history, quit.");
    let mut rl = DefaultEditor::new()?;

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("Type 'quit' to exit.");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match trimmed {
            "quit" | "exit" => break,
            "/new" => match orchestrator.start_session(user).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => println!("\n[System Error]: {:#}\n", e),
            },
            "/history" => match orchestrator.history(user).await {
                Ok(turns) => {
                    for turn in turns {
                        println!("[{}] {}", turn.role.as_str(), turn.content);
                    }
                }
                Err(e) => println!("\n[System Error]: {:#}\n", e),
            },
            text => match orchestrator.handle_message(user, text).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => {
                    error!("Turn failed: {:#}", e);
                    println!("\n[System Error]: {:#}\n", e);
                }
            },
        }
    }

    Ok(())
}

#[cfg(feature = "gateway")]
async fn serve(orchestrator: Orchestrator, config: &CoachConfig) -> Result<()> {
    let server = coach_gateway::GatewayServer::new(
        Arc::new(orchestrator),
        &config.gateway.host,
        config.gateway.port,
    );
    server.start().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,coach=info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = CoachConfig::load_or_default(&args.config);
    let store = open_store(&args, &config).await?;

    info!(
        "Starting coach with {} model {}...",
        config.llm.provider, config.llm.model
    );
    let client = create_client(&config.llm)?;
    let repository = Arc::new(SessionRepository::new(store.sessions));
    let orchestrator = Orchestrator::new(
        repository,
        store.chat_log,
        store.catalog,
        client,
        config.persuasion.clone(),
    )
    .with_params(CompletionParams::from(&config.llm));

    #[cfg(feature = "gateway")]
    {
        if args.serve {
            return serve(orchestrator, &config).await;
        }
    }

    run_repl(&orchestrator, &args.user).await
}
