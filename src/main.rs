//! truenas-api - apply one desired state to a TrueNAS appliance
//!
//! Each invocation reads a parameter file (JSON or YAML), reconciles one
//! resource and prints the result record as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use truenas_api::config::Config;
use truenas_api::filter::{listing_body, structure_truenas_api_jail_fstab_entry_response};
use truenas_api::resource::{
    FstabParams, JailFstab, LifecycleState, ReconciliationResult, Reconciler, UserModel,
};
use truenas_api::truenas::client::TruenasClient;

/// Idempotent TrueNAS resource management
#[derive(Parser, Debug)]
#[command(name = "truenas-api", version, about, long_about = None)]
struct Args {
    /// Base URL of the TrueNAS appliance (overrides TRUENAS_URL and the config file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Report what would change without sending any mutating request
    #[arg(long, global = true)]
    check: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage a user
    User {
        /// Parameter file: `state` and `model`
        #[arg(long)]
        params: PathBuf,
    },
    /// Manage a jail fstab entry
    JailFstab {
        /// Parameter file: `state`, `jail`, `source`, `destination`, `fsoptions`, `force`
        #[arg(long)]
        params: PathBuf,
    },
    /// Flatten a saved jail fstab LIST response (reads stdin without --input)
    StructureFstab {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Store connection settings in the config file
    Configure {
        #[arg(long)]
        api_key: Option<String>,
        /// Verify the server certificate
        #[arg(long, conflicts_with = "insecure")]
        verify_tls: bool,
        /// Accept self-signed certificates
        #[arg(long)]
        insecure: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInvocation {
    #[serde(default)]
    state: LifecycleState,
    #[serde(default)]
    model: UserModel,
}

#[derive(Debug, Deserialize)]
struct FstabInvocation {
    #[serde(default = "fetch_state")]
    state: LifecycleState,
    #[serde(flatten)]
    params: FstabParams,
}

fn fetch_state() -> LifecycleState {
    LifecycleState::Fetch
}

// stdout carries the result record, so logs go to a file
fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("truenas-api started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("truenas-api").join("truenas-api.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".truenas-api").join("truenas-api.log");
    }
    PathBuf::from("truenas-api.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level);

    let code = match run(&args).await {
        Ok(output) => {
            let failed = output.get("failed").and_then(Value::as_bool).unwrap_or(false);
            println!("{}", output);
            i32::from(failed)
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            println!("{}", json!({"failed": true, "msg": format!("{:#}", err)}));
            1
        }
    };

    // exit() skips destructors; flush the log writer first
    drop(log_guard);
    std::process::exit(code);
}

async fn run(args: &Args) -> Result<Value> {
    let mut config = Config::load();

    match &args.command {
        Command::User { params } => {
            let invocation: UserInvocation = read_params(params)?;
            let client = connect(&config, args)?;
            let users = Reconciler::for_kind(&client, "user", args.check)?;
            let model = invocation.model.into_model()?;
            let result = users.apply(invocation.state, model).await?;
            result_record(&result, Map::new())
        }
        Command::JailFstab { params } => {
            let invocation: FstabInvocation = read_params(params)?;
            let client = connect(&config, args)?;
            let fstab = JailFstab::new(&client, args.check)?;
            let result = fstab.apply(invocation.state, &invocation.params).await?;

            let mut echoed = Map::new();
            echoed.insert("source".into(), json!(invocation.params.source));
            echoed.insert("destination".into(), json!(invocation.params.destination));
            echoed.insert("fsoptions".into(), json!(invocation.params.fsoptions));
            result_record(&result, echoed)
        }
        Command::StructureFstab { input } => {
            let raw = match input {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let response: Value =
                serde_json::from_str(&raw).context("Failed to parse fstab response JSON")?;
            let listing = listing_body(response)?;
            let entries = structure_truenas_api_jail_fstab_entry_response(&listing)?;
            Ok(serde_json::to_value(entries)?)
        }
        Command::Configure {
            api_key,
            verify_tls,
            insecure,
        } => {
            if let Some(url) = &args.url {
                TruenasClient::new(url, None, true)?;
            }
            let tls = match (*verify_tls, *insecure) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            config.update(args.url.clone(), api_key.clone(), tls);
            config.save().context("Failed to save configuration")?;
            Ok(json!({
                "changed": true,
                "path": Config::config_path(),
            }))
        }
    }
}

fn connect(config: &Config, args: &Args) -> Result<TruenasClient> {
    let base_url = config.effective_base_url(args.url.as_deref()).with_context(|| {
        format!(
            "No TrueNAS URL configured. Set {} or use --url",
            truenas_api::config::ENV_URL
        )
    })?;
    let api_key = config.effective_api_key();

    tracing::info!("Using TrueNAS at {}", base_url);

    TruenasClient::new(&base_url, api_key.as_deref(), config.verify_tls)
}

fn read_params<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    // YAML is a superset of JSON, so one parser covers both
    serde_yaml::from_str(&content).with_context(|| format!("Invalid parameters in {:?}", path))
}

fn result_record(result: &ReconciliationResult, echoed: Map<String, Value>) -> Result<Value> {
    let mut record = serde_json::to_value(result)?;
    if let Value::Object(map) = &mut record {
        map.extend(echoed);
    }
    Ok(record)
}
