//! Lap Timing CLI Application
//!
//! Command-line front end for the laptime-core library. It records passages
//! and start directives into the shared race log, corrects log entries, and
//! prints standings, personal bests and exports derived from the log.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use laptime_core::{Bib, ChangeListener, ClassId, LogDiagnostics};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

mod backup;
mod compat;
mod config;
mod report;
mod session;

use backup::BackupSet;
use config::AppConfig;
use session::Session;

/// Configuration file picked up from the working directory
const DEFAULT_CONFIG: &str = "laptime.toml";

/// Lap timer - record passages and follow the standings of a lap race
#[derive(Parser, Debug)]
#[command(name = "laptime-cli")]
#[command(about = "Record and report multi-lap endurance races", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (default: ./laptime.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Race description, overrides the configuration file
    #[arg(long, value_name = "FILE")]
    race: Option<PathBuf>,

    /// Race log, overrides the configuration file
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a passage for a bib at the current time
    Record { bib: Bib },

    /// Start one or more classes (or "all") now
    Start {
        #[arg(required = true)]
        classes: Vec<String>,
    },

    /// Replace the text of a log event, keeping its timestamp
    Edit { index: usize, text: String },

    /// Show the most recent log events
    Tail {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Replay the log and print the standings
    Standings {
        /// Only this class
        #[arg(long)]
        class: Option<ClassId>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replay the log and report every rejected line
    Check,

    /// Reprint the standings every time the log changes
    Watch {
        #[arg(long)]
        class: Option<ClassId>,
    },

    /// Personal best laps
    Top {
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
    },

    /// Export the log in bibtime format
    Bibtime { output: PathBuf },

    /// Copy the log and race file into a backup directory
    Backup {
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Repeat every SECS seconds until interrupted
        #[arg(short, long, value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Put the log and race file back from a backup directory
    Restore {
        #[arg(long, value_name = "DIR")]
        from: PathBuf,

        /// Restore the set with this stamp instead of the latest copies
        #[arg(long)]
        stamp: Option<String>,
    },
}

/// Failures reported by the commands themselves
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0} log line(s) rejected")]
    RejectedLines(usize),

    #[error("No class with id {0}")]
    UnknownClass(ClassId),
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("Lap timer CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using laptime-core v{}", laptime_core::VERSION);

    let app = resolve_config(&args)?;

    // Backup and restore work on the files themselves, even when the race
    // file does not load.
    let files = BackupSet::new(&app.files.log, &app.files.race, app.lock.policy());
    match &args.command {
        Command::Backup { output, interval } => return run_backup(&files, output, *interval),
        Command::Restore { from, stamp } => return files.restore(from, stamp.as_deref()),
        _ => {}
    }

    let mut session = Session::open(&app, LogDiagnostics::shared())?;

    match args.command {
        Command::Record { bib } => {
            let event = session.record(bib)?;
            let (engine, _) = session.replay()?;
            match session.config().team_id_by_bib(bib) {
                Some(team_id) => println!(
                    "{}: lap {}, rank {}",
                    event,
                    engine.get_lap_count_by_team_id(team_id),
                    engine
                        .get_team_ranking(team_id)
                        .map_or_else(|| "-".to_string(), |rank| rank.to_string())
                ),
                None => println!("{}", event),
            }
        }
        Command::Start { classes } => {
            let (event, started) = session.start(&classes)?;
            println!("{}: started classes {:?}", event, started);
        }
        Command::Edit { index, text } => {
            let event = session.edit(index, &text)?;
            println!("{}: {}", index, event);
        }
        Command::Tail { count } => {
            let log = session.load()?;
            print!("{}", report::tail_text(&log, count, session.config()));
        }
        Command::Standings { class, json } => {
            check_class(&session, class)?;
            let (engine, _) = session.replay()?;
            let reports = report::class_reports(&engine, session.config(), class);
            if json {
                println!("{}", report::standings_json(&reports)?);
            } else {
                print!("{}", report::standings_text(&reports));
            }
        }
        Command::Check => {
            let (engine, rejected) = session.replay()?;
            let laps = engine.get_lap_log().len();
            if rejected > 0 {
                return Err(CliError::RejectedLines(rejected).into());
            }
            println!("Log OK: {} laps", laps);
        }
        Command::Watch { class } => {
            check_class(&session, class)?;
            watch(&session, &app.notify.address, class)?;
        }
        Command::Top { count } => {
            let (engine, _) = session.replay()?;
            print!("{}", report::top_text(&engine, session.config(), count));
        }
        Command::Bibtime { output } => {
            let log = session.load()?;
            compat::write_bibtime(&log, &output)?;
        }
        Command::Backup { .. } | Command::Restore { .. } => {}
    }

    Ok(())
}

/// Load the configuration file, then apply command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            config::load_config(Path::new(DEFAULT_CONFIG))?
        }
        None => AppConfig::default(),
    };

    if let Some(race) = &args.race {
        app.files.race = race.clone();
    }
    if let Some(log) = &args.log {
        app.files.log = log.clone();
    }
    Ok(app)
}

fn check_class(session: &Session, class: Option<ClassId>) -> Result<()> {
    match class {
        Some(id) if session.config().class(id).is_none() => {
            Err(CliError::UnknownClass(id).into())
        }
        _ => Ok(()),
    }
}

fn run_backup(files: &BackupSet, output: &Path, interval: Option<u64>) -> Result<()> {
    loop {
        let written = files.backup(output)?;
        println!("Backed up {} files to {:?}", written.len(), output);

        let Some(seconds) = interval else {
            return Ok(());
        };
        log::info!("Next backup in {} s", seconds);
        thread::sleep(Duration::from_secs(seconds.max(1)));
    }
}

fn watch(session: &Session, address: &str, class: Option<ClassId>) -> Result<()> {
    let listener = ChangeListener::bind(address)
        .with_context(|| format!("Failed to listen for changes on {}", address))?;
    log::info!("Waiting for log changes on {}", address);

    loop {
        let (engine, _) = session.replay()?;
        let reports = report::class_reports(&engine, session.config(), class);
        print!("{}", report::standings_text(&reports));

        if let Some(count) = listener.wait(None)? {
            log::debug!("Log change #{}", count);
        }
    }
}

/// Initialize logging from the verbosity flags
///
/// Unless `--quiet` is given, `RUST_LOG` directives are applied on top of the
/// flag level, e.g. `RUST_LOG=laptime_core::journal=trace`.
fn init_logging(verbose: u8, quiet: bool) {
    use chrono::Local;
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    if !quiet {
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{} {}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
