//! Guest intake simulator
//!
//! Replays a scripted editing session (or several at once) against an
//! in-memory store and reports the writes, final step, status and scores.
//! `score` rates a stored record the way a list view would.

mod report;
mod script;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use intake_record::{compute_quality, detect_status, effective_pct, normalize, Step};
use intake_session::{SessionBuilder, SessionConfig, SessionSource};
use intake_store::{MemoryStore, Store};
use report::{Report, Tally};
use script::Action;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn cli() -> Command {
    Command::new("intake-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Guest intake session simulator")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Replay a script against fresh sessions")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Session configuration (TOML)"),
                )
                .arg(
                    Arg::new("script")
                        .long("script")
                        .value_parser(value_parser!(PathBuf))
                        .help("Script of actions (JSON array); built-in walk-through otherwise"),
                )
                .arg(
                    Arg::new("sessions")
                        .long("sessions")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of concurrent sessions"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("score")
                .about("Score a stored guest record")
                .arg(
                    Arg::new("record")
                        .long("record")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Guest record (JSON)"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run", args)) => {
            let passed = run(args).await?;
            std::process::exit(if passed { 0 } else { 1 });
        }
        Some(("score", args)) => {
            let path = args
                .get_one::<PathBuf>("record")
                .context("--record is required")?;
            score(path)
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: &ArgMatches) -> Result<bool> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            SessionConfig::from_toml_str(&text)?
        }
        None => SessionConfig::default(),
    };
    let actions = match args.get_one::<PathBuf>("script") {
        Some(path) => script::load(path)?,
        None => script::default_script(),
    };
    let sessions = args.get_one::<usize>("sessions").copied().unwrap_or(1).max(1);

    tracing::info!(sessions, actions = actions.len(), "starting simulation");
    let store = Arc::new(MemoryStore::new());
    let runs = (0..sessions).map(|n| run_session(n, Arc::clone(&store), config.clone(), &actions));
    let reports = futures::future::try_join_all(runs).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.generate_text());
        }
    }
    Ok(reports.iter().all(Report::passed))
}

async fn run_session(
    index: usize,
    store: Arc<MemoryStore>,
    config: SessionConfig,
    actions: &[Action],
) -> Result<Report> {
    let guests = config.guests_path()?;
    let session = SessionBuilder::new(store.clone())
        .config(config)
        .open(SessionSource::Blank)
        .await?;
    let mut events = session.events();

    script::play(&session, store.as_ref(), &guests, actions).await?;
    if let Err(err) = session.clone().dispose().await {
        tracing::warn!(session = index, error = %err, "final flush failed");
    }

    let mut writes = Tally::default();
    loop {
        match events.try_recv() {
            Ok(event) => writes.observe(&event),
            Err(TryRecvError::Lagged(missed)) => {
                tracing::debug!(session = index, missed, "event backlog trimmed");
            }
            Err(_) => break,
        }
    }

    let view = session.view();
    let stored = match &view.record_id {
        Some(id) => store.read(&guests.child(id.as_str())).await?,
        None => None,
    };
    Ok(Report::new(index, &view, stored.as_ref(), writes))
}

fn score(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading record {}", path.display()))?;
    let raw: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing record {}", path.display()))?;
    let record = normalize(&raw).record;
    let quality = compute_quality(&record);

    println!("Record Score");
    println!("============");
    println!("Status:    {}", detect_status(&record));
    println!("Live:      {}%", quality.pct);
    println!("Badge:     {}%", effective_pct(&record));
    for step in Step::ALL {
        let s = quality.steps.get(step);
        println!("  {step}: {}/{} ({}%)", s.earned, s.max, s.pct());
    }
    if let Some(field) = quality.next_missing() {
        println!("Next:      {field}");
    }
    Ok(())
}
