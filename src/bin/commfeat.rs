//! commfeat - Command-line interface for commlog feature extraction
//!
//! Commands:
//! - extract: Build the feature table for every user in a data directory
//! - user: Build one user's feature row from their folder or a JSON document
//! - features: List the feature columns that would be produced
//! - doctor: Check the data directory, roster and word list

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{info, info_span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use commlog_features::config::ExtractorConfig;
use commlog_features::ingest::{parse_user_json, RosterEntry};
use commlog_features::profanity::ProfanitySet;
use commlog_features::registry::FeatureName;
use commlog_features::table::FeatureTable;
use commlog_features::{FeatureError, CRATE_VERSION, PRODUCER_NAME};

/// commfeat - Communication-log features for credit-risk modeling
#[derive(Parser)]
#[command(name = "commfeat")]
#[command(version = CRATE_VERSION)]
#[command(about = "Extract per-user features from call, SMS and contact logs", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format (written to stderr)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by commands that compute features
#[derive(clap::Args)]
struct ExtractArgs {
    /// Include experimental features
    #[arg(long)]
    experimental: bool,

    /// Count SMS without a valid timestamp in the daily SMS rate
    #[arg(long)]
    allow_invalid_datetime: bool,

    /// Replace the built-in bad word list with this file (one word per line)
    #[arg(long)]
    bad_words: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature table for every user in the roster
    Extract {
        /// Data directory holding the roster and user-<id> folders
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Roster file name inside the data directory
        #[arg(long)]
        roster: Option<String>,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: TableFormat,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Build one user's feature row as JSON
    User {
        /// User id; the devices are read from <data-dir>/user-<id>
        #[arg(long, conflicts_with = "input")]
        id: Option<String>,

        /// User JSON document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Data directory holding the user-<id> folders
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Status written into the row when reading from a folder
        #[arg(long)]
        status: Option<String>,

        /// Pretty-print the row
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// List the feature columns
    Features {
        /// Include experimental features
        #[arg(long)]
        experimental: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the data directory, roster and bad word list
    Doctor {
        /// Data directory to check
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per event
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum TableFormat {
    /// Comma-separated table with a header row
    Csv,
    /// JSON array of row objects
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let run_id = Uuid::new_v4();
    let _span = info_span!("commfeat", %run_id).entered();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so that stdout stays clean for table output
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(atty::is(atty::Stream::Stderr))
                    .with_writer(io::stderr)
                    .pretty(),
            )
            .init(),
    }
}

fn run(cli: Cli) -> Result<(), CommfeatCliError> {
    let mut config = match &cli.config {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::default(),
    };

    match cli.command {
        Commands::Extract {
            data_dir,
            roster,
            output,
            format,
            extract,
        } => {
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(roster) = roster {
                config.roster_file = roster;
            }
            if output.is_some() {
                config.output = output;
            }
            apply_extract_args(&mut config, extract);
            cmd_extract(&config, format)
        }
        Commands::User {
            id,
            input,
            data_dir,
            status,
            pretty,
            extract,
        } => {
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            apply_extract_args(&mut config, extract);
            cmd_user(&config, id, input.as_deref(), status, pretty)
        }
        Commands::Features { experimental, json } => {
            config.experimental |= experimental;
            cmd_features(&config, json)
        }
        Commands::Doctor { data_dir, json } => {
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            cmd_doctor(&config, json)
        }
    }
}

fn apply_extract_args(config: &mut ExtractorConfig, args: ExtractArgs) {
    config.experimental |= args.experimental;
    if args.allow_invalid_datetime {
        config.require_valid_datetime = false;
    }
    if args.bad_words.is_some() {
        config.bad_words_file = args.bad_words;
    }
}

fn cmd_extract(config: &ExtractorConfig, format: TableFormat) -> Result<(), CommfeatCliError> {
    let extractor = config.extractor()?;
    let data = config.data_directory();
    info!(data_dir = %data.root().display(), "Reading user tree");

    let table = extractor.extract_directory(&data)?;
    if table.is_empty() {
        return Err(CommfeatCliError::NoUsers);
    }

    let rendered = format_table(&table, format)?;
    match config.output.as_deref() {
        Some(path) if path != Path::new("-") => {
            fs::write(path, rendered).map_err(|e| CommfeatCliError::Io(path.to_path_buf(), e))?;
            info!(path = %path.display(), rows = table.len(), "Wrote feature table");
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&rendered)
                .map_err(|e| CommfeatCliError::Io(PathBuf::from("<stdout>"), e))?;
        }
    }
    Ok(())
}

fn format_table(table: &FeatureTable, format: TableFormat) -> Result<Vec<u8>, CommfeatCliError> {
    let bytes = match format {
        TableFormat::Csv => {
            let mut out = Vec::new();
            table.write_csv(&mut out)?;
            out
        }
        TableFormat::Json => table.to_json(false)?.into_bytes(),
        TableFormat::JsonPretty => {
            let mut json = table.to_json(true)?;
            json.push('\n');
            json.into_bytes()
        }
    };
    Ok(bytes)
}

fn cmd_user(
    config: &ExtractorConfig,
    id: Option<String>,
    input: Option<&Path>,
    status: Option<String>,
    pretty: bool,
) -> Result<(), CommfeatCliError> {
    let extractor = config.extractor()?;

    let (user_id, user) = match (id, input) {
        (Some(user_id), _) => {
            let entry = RosterEntry { user_id, status };
            let user = config.data_directory().load_user(&entry);
            (entry.user_id, user)
        }
        (None, Some(path)) => {
            let text = read_input(path)?;
            (String::new(), parse_user_json(&text)?)
        }
        (None, None) => return Err(CommfeatCliError::MissingUser),
    };

    let row = extractor.extract_row(&user_id, &user);
    let json = if pretty {
        serde_json::to_string_pretty(&row)
    } else {
        serde_json::to_string(&row)
    }
    .map_err(FeatureError::from)?;
    println!("{json}");
    Ok(())
}

fn read_input(path: &Path) -> Result<String, CommfeatCliError> {
    let mut text = String::new();
    if path == Path::new("-") {
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| CommfeatCliError::Io(PathBuf::from("<stdin>"), e))?;
    } else {
        text = fs::read_to_string(path).map_err(|e| CommfeatCliError::Io(path.to_path_buf(), e))?;
    }
    Ok(text)
}

fn cmd_features(config: &ExtractorConfig, json: bool) -> Result<(), CommfeatCliError> {
    let registry = config.registry()?;
    let experimental: Vec<FeatureName> = FeatureName::EXPERIMENTAL.to_vec();

    if json {
        let listing: Vec<FeatureListing> = registry
            .names()
            .iter()
            .map(|name| FeatureListing {
                name: name.as_str(),
                experimental: experimental.contains(name),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&listing).map_err(FeatureError::from)?
        );
    } else {
        for name in registry.names() {
            let marker = if experimental.contains(name) {
                " (experimental)"
            } else {
                ""
            };
            println!("{name}{marker}");
        }
    }
    Ok(())
}

fn cmd_doctor(config: &ExtractorConfig, json: bool) -> Result<(), CommfeatCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();
    let data = config.data_directory();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{PRODUCER_NAME} {CRATE_VERSION}"),
    });

    if data.root().is_dir() {
        checks.push(DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Ok,
            message: format!("Data directory {}", data.root().display()),
        });
    } else {
        checks.push(DoctorCheck {
            name: "data_dir".to_string(),
            status: CheckStatus::Error,
            message: format!("Data directory {} does not exist", data.root().display()),
        });
    }

    match data.read_roster() {
        Ok(roster) => {
            let missing = roster
                .iter()
                .filter(|entry| !data.user_dir(&entry.user_id).is_dir())
                .count();
            checks.push(DoctorCheck {
                name: "roster".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} users in {}", roster.len(), data.roster_path().display()),
            });
            if missing > 0 {
                checks.push(DoctorCheck {
                    name: "user_folders".to_string(),
                    status: CheckStatus::Warning,
                    message: format!("{missing} users have no folder and will have no devices"),
                });
            }
        }
        Err(e) => checks.push(DoctorCheck {
            name: "roster".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        }),
    }

    let words = match &config.bad_words_file {
        Some(path) => ProfanitySet::from_file(path).map(|set| (set, path.display().to_string())),
        None => Ok((ProfanitySet::builtin(), "built-in list".to_string())),
    };
    checks.push(match words {
        Ok((set, _)) if set.is_empty() => DoctorCheck {
            name: "bad_words".to_string(),
            status: CheckStatus::Error,
            message: "Bad word list is empty".to_string(),
        },
        Ok((set, source)) => DoctorCheck {
            name: "bad_words".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} words from {source}", set.len()),
        },
        Err(e) => DoctorCheck {
            name: "bad_words".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CRATE_VERSION.to_string(),
        checks,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(FeatureError::from)?
        );
    } else {
        println!("commfeat Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CommfeatCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CommfeatCliError {
    Io(PathBuf, io::Error),
    Feature(FeatureError),
    NoUsers,
    MissingUser,
    DoctorFailed,
}

impl From<FeatureError> for CommfeatCliError {
    fn from(e: FeatureError) -> Self {
        CommfeatCliError::Feature(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CommfeatCliError> for CliError {
    fn from(e: CommfeatCliError) -> Self {
        match e {
            CommfeatCliError::Io(path, e) => CliError {
                code: "IO_ERROR".to_string(),
                message: format!("{}: {}", path.display(), e),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CommfeatCliError::Feature(e) => {
                let (code, hint) = match &e {
                    FeatureError::Io { .. } => ("IO_ERROR", "Check file paths and permissions"),
                    FeatureError::Json(_) => ("JSON_ERROR", "Check JSON syntax"),
                    FeatureError::Csv(_) | FeatureError::MissingColumn(_) => {
                        ("ROSTER_ERROR", "The roster needs user_id and status columns")
                    }
                    FeatureError::UnknownFeature(_) => {
                        ("UNKNOWN_FEATURE", "Run 'commfeat features' to list feature names")
                    }
                    FeatureError::Config(_) => ("CONFIG_ERROR", "Review the configuration file"),
                    FeatureError::SearchStartOutOfRange { .. } => ("INTERNAL_ERROR", "Please report this"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CommfeatCliError::NoUsers => CliError {
                code: "NO_USERS".to_string(),
                message: "The roster lists no users".to_string(),
                hint: Some("Ensure the roster file has data rows".to_string()),
            },
            CommfeatCliError::MissingUser => CliError {
                code: "MISSING_USER".to_string(),
                message: "No user given".to_string(),
                hint: Some("Pass --id <user id> or --input <file>".to_string()),
            },
            CommfeatCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct FeatureListing {
    name: &'static str,
    experimental: bool,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
