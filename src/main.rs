mod config;
mod fields;
mod keyboard;
mod messages;
mod metadata;
mod normalize;
mod preferences;
mod session;
mod store;
mod types;
mod wizard;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use config::BotConfig;
use session::Session;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use types::{Event, Output, Reply};

/// Field-data entry bot. Reads one JSON event per stdin line and writes one
/// JSON reply batch per stdout line.
#[derive(Debug, Parser)]
#[command(name = "planilla", version)]
struct Cli {
    /// Directory holding the record log, preferences and conversation state.
    #[arg(long, env = "PLANILLA_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,
}

fn handle_event(data_dir: &Path, event: &Event, now: NaiveDateTime) -> Result<Vec<Reply>> {
    match event {
        Event::Command(e) => Session::open(data_dir, &e.common.conversation_id, now)
            .and_then(|s| s.handle_command(e, now)),
        Event::Text(e) => Session::open(data_dir, &e.common.conversation_id, now)
            .and_then(|s| s.handle_text(e, now)),
        Event::Button(e) => Session::open(data_dir, &e.common.conversation_id, now)
            .and_then(|s| s.handle_button(e, now)),
    }
}

/// Answer one event. Failures are logged and turned into a generic reply for
/// the same conversation so the loop keeps serving everyone else.
fn answer(data_dir: &Path, event: &Event, now: NaiveDateTime) -> Output {
    let conversation_id = event.common().conversation_id.clone();
    let replies = handle_event(data_dir, event, now).unwrap_or_else(|err| {
        error!(conversation = %conversation_id, "event failed: {err:#}");
        vec![Reply::text(messages::EVENT_FAILED)]
    });
    Output {
        conversation_id,
        replies,
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = BotConfig::from_env()?;
    debug!(?config, "bot configuration");
    info!(data_dir = %cli.data_dir.display(), "listening on stdin");

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating {}", cli.data_dir.display()))?;

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    for (n, line) in stdin.lines().enumerate() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                error!(line = n + 1, "skipping unparseable event: {err}");
                continue;
            }
        };
        let output = answer(&cli.data_dir, &event, Local::now().naive_local());
        let json = serde_json::to_string(&output).context("serializing output")?;
        writeln!(stdout, "{json}").context("writing stdout")?;
        stdout.flush().context("flushing stdout")?;
    }
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("planilla=warn")),
        )
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("planilla: {err:#}");
        process::exit(2);
    }
}
