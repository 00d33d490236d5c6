//! Purpose: `trackmux` CLI entry point.
//! Role: Binary crate root; parses args, replays event streams, emits JSON on stdout.
//! Invariants: One JSON assignment per input event on stdout, then one summary object.
//! Invariants: Anomaly notices and errors go to stderr, never stdout.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use trackmux::api::{AnomalyPolicy, Error, ErrorKind, TrackerOptions, to_exit_code};
use trackmux::notice::{Notice, anomaly_notice, notice_json};
use trackmux::replay::replay;

#[derive(Parser, Debug)]
#[command(
    name = "trackmux",
    version,
    about = "Assign overlapping async slices to a minimal set of non-overlapping tracks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSONL event stream and print the track chosen for each event.
    Replay {
        #[arg(
            help = "Input file with one event per line; `-` or omitted reads stdin",
            value_hint = ValueHint::FilePath
        )]
        input: Option<PathBuf>,
        #[arg(long, help = "Fail on the first protocol anomaly instead of reporting it")]
        strict: bool,
        #[arg(long, default_value = "jsonl", value_enum, help = "Output format: jsonl|pretty")]
        format: OutputFormat,
        #[arg(long, help = "Only print the final summary")]
        summary_only: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Jsonl,
    Pretty,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            input,
            strict,
            format,
            summary_only,
        } => {
            let policy = if strict {
                AnomalyPolicy::Strict
            } else {
                AnomalyPolicy::Report
            };
            let options = TrackerOptions::new().with_policy(policy);
            let reader = open_input(input)?;
            let summary = replay(
                reader,
                options,
                |assignment| {
                    if !summary_only {
                        emit_json(json!(assignment), format);
                    }
                    Ok(())
                },
                |line, anomaly| {
                    let time = notice_time_now().unwrap_or_default();
                    emit_notice(&anomaly_notice(&anomaly, "replay", Some(line), time));
                },
            )?;
            emit_json(json!({ "summary": summary }), format);
            Ok(())
        }
    }
}

fn open_input(input: Option<PathBuf>) -> Result<Box<dyn Read>, Error> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(&path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(format!("failed to open {}", path.display()))
                    .with_source(err)
            })?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin())),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: Value, format: OutputFormat) {
    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(&value),
        OutputFormat::Jsonl => serde_json::to_string(&value),
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice) {
    if io::stderr().is_terminal() {
        eprintln!("notice: {} ({})", notice.message, notice.kind);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {}", error_message(err));
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Protocol => "protocol anomaly".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    if let Some(set) = err.set() {
        inner.insert("set".to_string(), json!(set));
    }
    if let Some(cookie) = err.cookie() {
        inner.insert("cookie".to_string(), json!(cookie));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}
