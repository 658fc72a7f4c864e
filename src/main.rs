#![forbid(unsafe_code)]

//! `lead-responder`: inspect conversations and run the automated-response
//! pipeline against a `SQLite` conversation log.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lead_responder::config::GlobalConfig;
use lead_responder::engine::{DecisionEngine, RawContext};
use lead_responder::loader::{MessageLoader, MessageStore};
use lead_responder::models::lead::LeadProfile;
use lead_responder::models::message::Message;
use lead_responder::persistence::db;
use lead_responder::persistence::message_repo::MessageRepo;
use lead_responder::responder::{AutoResponder, TemplateGenerator};
use lead_responder::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "lead-responder", about = "Automated lead response pipeline", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the conversation for a lead.
    History {
        /// Lead identifier.
        lead_id: String,
    },
    /// Score a message without sending anything.
    Decide(MessageArgs),
    /// Store an inbound message and run the full responder.
    Respond(MessageArgs),
}

#[derive(Debug, Args)]
struct MessageArgs {
    /// Lead identifier.
    lead_id: String,
    /// Customer message text.
    message: String,
    /// Lead display name.
    #[arg(long)]
    name: Option<String>,
    /// Vehicle the lead is interested in.
    #[arg(long)]
    vehicle: Option<String>,
    /// Local event time (`YYYY-MM-DDTHH:MM:SS`); defaults to now.
    #[arg(long)]
    at: Option<NaiveDateTime>,
}

impl MessageArgs {
    fn lead(&self) -> LeadProfile {
        LeadProfile::new(self.name.clone(), self.vehicle.clone())
    }

    fn local_time(&self) -> NaiveDateTime {
        self.at.unwrap_or_else(|| Local::now().naive_local())
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    info!(db_path = %config.db_path().display(), "configuration loaded");

    let pool = Arc::new(db::connect(config.db_path()).await?);
    let repo = Arc::new(MessageRepo::new(pool));
    let store: Arc<dyn MessageStore> = repo.clone();
    let loader = MessageLoader::new(Arc::clone(&store), &config.loader);
    let engine = Arc::new(DecisionEngine::new(&config.decision));

    match args.command {
        Command::History { lead_id } => {
            let messages = loader.load(&lead_id, loader.default_options()).await?;
            print_json(&messages)
        }
        Command::Decide(msg) => {
            let history = loader.load(&msg.lead_id, loader.default_options()).await?;
            let raw = RawContext::new(history, msg.lead(), msg.local_time());
            let decision = engine.decide(&msg.lead_id, &msg.message, raw);
            print_json(&decision)
        }
        Command::Respond(msg) => {
            repo.insert(&Message::inbound(&msg.lead_id, &msg.message))
                .await?;
            let responder = AutoResponder::new(
                store,
                &config.loader,
                Arc::clone(&engine),
                Arc::new(TemplateGenerator),
            );
            let outcome = responder
                .handle_inbound(&msg.lead_id, &msg.lead(), &msg.message, msg.local_time())
                .await?;
            print_json(&outcome)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
