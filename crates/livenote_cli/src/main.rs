//! CLI entry point for the LiveNote sync core.
//!
//! # Responsibility
//! - Drive a `NoteSession` against the SQLite backend from the shell.
//! - Keep output deterministic for quick local sanity checks.

use clap::{Parser, Subcommand};
use livenote_core::{
    content_stats, derive_note_preview, CacheConfig, FetchOutcome, Identity, LogNoticeSink,
    MutationOutcome, NoteId, NoteSession, SqliteNoteService, SqliteNoteStore,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// livenote - paged, realtime-synced notes over a local store
#[derive(Parser, Debug)]
#[command(name = "livenote", version, about, long_about = None)]
struct Cli {
    /// SQLite database file (in-memory when omitted)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON cache config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Identity to sign in as
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Sign in as a guest account
    #[arg(long, global = true)]
    guest: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core linkage info
    Ping,

    /// Page through every note, newest first
    #[command(name = "ls")]
    List,

    /// Create a note
    Add {
        title: String,
        /// Note body markup
        #[arg(default_value = "")]
        content: String,
    },

    /// Replace a note's title and content
    Edit {
        id: NoteId,
        title: String,
        #[arg(default_value = "")]
        content: String,
    },

    /// Delete a note
    #[command(name = "rm")]
    Delete { id: NoteId },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::List => "ls",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "rm",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| livenote_core::default_log_level());
        livenote_core::init_logging(level, log_dir).map_err(|err| err.to_string())?;
    }

    if matches!(cli.command, Command::Ping) {
        println!("livenote_core ping={}", livenote_core::ping());
        println!("livenote_core version={}", livenote_core::core_version());
        return Ok(());
    }

    let config = match cli.config.as_ref() {
        Some(path) => CacheConfig::load(path).map_err(|err| err.to_string())?,
        None => CacheConfig::default(),
    };
    let store = match cli.db.as_ref() {
        Some(path) => SqliteNoteStore::open(path),
        None => SqliteNoteStore::open_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let identity = if cli.guest {
        Identity::guest(cli.user.as_str())
    } else {
        Identity::new(cli.user.as_str()).with_username(cli.user.as_str())
    };
    let remote = Arc::new(SqliteNoteService::signed_in(Arc::new(store), identity));
    let session = NoteSession::start(remote, config, Arc::new(LogNoticeSink)).await;
    info!("event=cli_command module=cli status=start command={}", cli.command.name());

    let result = match cli.command {
        Command::Ping => Ok(()),
        Command::List => list_all(&session).await,
        Command::Add { title, content } => {
            report(session.cache().add_note(title, content).await)
        }
        Command::Edit { id, title, content } => {
            report(session.cache().update_note(id, title, content).await)
        }
        Command::Delete { id } => report(session.cache().delete_note(id).await),
    };
    session.end();
    result
}

async fn list_all(session: &NoteSession) -> Result<(), String> {
    let cache = session.cache();
    loop {
        match cache.load_more_notes().await {
            FetchOutcome::Loaded { has_more: true, .. } => continue,
            FetchOutcome::Failed => return Err("failed to load notes".to_string()),
            FetchOutcome::Loaded { .. } | FetchOutcome::Skipped => break,
        }
    }

    let state = cache.snapshot().await;
    for note in &state.notes {
        let preview = derive_note_preview(&note.content);
        let stats = content_stats(&note.content);
        println!(
            "{}  v{}  {}  [{} words, {} min]  {}",
            note.id,
            note.version,
            note.title,
            stats.words,
            stats.reading_minutes,
            preview.preview_text.unwrap_or_default()
        );
    }
    println!("{} note(s)", state.len());
    Ok(())
}

fn report(outcome: MutationOutcome) -> Result<(), String> {
    match outcome {
        MutationOutcome::Applied(id) => {
            println!("ok {id}");
            Ok(())
        }
        MutationOutcome::Skipped => Err("not signed in".to_string()),
        MutationOutcome::NotFound => Err("note not found".to_string()),
        MutationOutcome::Conflict => {
            Err("note was modified by someone else; refresh and try again".to_string())
        }
        MutationOutcome::Failed => Err("remote call failed; see logs".to_string()),
    }
}
