use crate::models::route::RouteConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_WAIT_MS: u64 = 500;
const DEFAULT_LIST_PER_PAGE: u32 = 100;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_PLACEHOLDER: &str = "image.gif";

/// Centralized application configuration.
/// Combines environment variables (and `.env`) with CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub verbose: bool,
    pub initial_wait: Duration,
    pub retry_wait: Duration,
    pub list_per_page: u32,
    pub upstream_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
    pub placeholder_path: PathBuf,
    pub routes: Vec<RouteConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Relay uploads to AList-style storage backends")]
pub struct Args {
    /// Host to bind to (overrides SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Placeholder image served on GET (overrides PLACEHOLDER_PATH)
    #[arg(long)]
    pub placeholder: Option<PathBuf>,

    /// Enable debug logging (same as DEBUG_MODE=true)
    #[arg(long)]
    pub debug: bool,
}

impl AppConfig {
    /// Load `.env`, then parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        dotenvy::dotenv().ok();
        let args = Args::parse();

        let mut cfg = Self::from_lookup(|key| env::var(key).ok())?;

        // --- Merge ---
        if let Some(host) = args.host {
            cfg.host = host;
        }
        if let Some(port) = args.port {
            cfg.port = port;
        }
        if let Some(placeholder) = args.placeholder {
            cfg.placeholder_path = placeholder;
        }
        cfg.debug |= args.debug;

        Ok(cfg)
    }

    /// Build the configuration from a variable lookup (the process
    /// environment in production). Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upstream_timeout = parse_opt::<u64, _>(&lookup, "UPSTREAM_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "SERVER_PORT", DEFAULT_PORT)?,
            debug: flag(&lookup, "DEBUG_MODE"),
            verbose: flag(&lookup, "DEBUG_VERBOSE"),
            initial_wait: Duration::from_millis(parse_or(
                &lookup,
                "INITIAL_WAIT_MS",
                DEFAULT_WAIT_MS,
            )?),
            retry_wait: Duration::from_millis(parse_or(&lookup, "RETRY_WAIT_MS", DEFAULT_WAIT_MS)?),
            list_per_page: parse_or(&lookup, "LIST_PER_PAGE", DEFAULT_LIST_PER_PAGE)?,
            upstream_timeout,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            placeholder_path: lookup("PLACEHOLDER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_placeholder(env::current_exe().ok().as_deref())),
            routes: parse_routes(&lookup),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default log filter derived from the debug flags.
    pub fn log_level(&self) -> &'static str {
        match (self.debug, self.verbose) {
            (true, true) => "trace",
            (true, false) => "debug",
            _ => "info",
        }
    }
}

/// Read `ROUTE_1_*`, `ROUTE_2_*`, ... until the first missing `ROUTE_<n>_API_URL`.
/// Without any numbered route, a single route is built from the legacy variables.
fn parse_routes<F>(lookup: &F) -> Vec<RouteConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut routes = Vec::new();

    for index in 1.. {
        let key = |field: &str| format!("ROUTE_{}_{}", index, field);
        let Some(api_url) = lookup(&key("API_URL")) else {
            break;
        };

        routes.push(RouteConfig {
            api_url,
            suffix: lookup(&key("SUFFIX")).unwrap_or_default(),
            username: lookup(&key("USERNAME")).unwrap_or_else(|| "admin".into()),
            password: lookup(&key("PASSWORD")).unwrap_or_else(|| "password".into()),
            upload_path: lookup(&key("UPLOAD_PATH")).unwrap_or_else(|| "/".into()),
            absolute_path: lookup(&key("ABSOLUTE_PATH")).unwrap_or_default(),
        });
    }

    if routes.is_empty() {
        routes.push(RouteConfig {
            api_url: lookup("ALIST_API_URL").unwrap_or_else(|| "http://localhost:5244".into()),
            suffix: lookup("DEFAULT_SUFFIX").unwrap_or_default(),
            username: lookup("ALIST_USERNAME").unwrap_or_else(|| "admin".into()),
            password: lookup("ALIST_PASSWORD").unwrap_or_else(|| "password".into()),
            upload_path: lookup("UPLOAD_PATH").unwrap_or_else(|| "/".into()),
            absolute_path: lookup("ABSOLUTE_PATH").unwrap_or_default(),
        });
    }

    routes
}

/// `image.gif` in the executable's directory, or the working directory when
/// the executable path is unknown.
fn default_placeholder(exe: Option<&Path>) -> PathBuf {
    exe.and_then(Path::parent)
        .map(|dir| dir.join(DEFAULT_PLACEHOLDER))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PLACEHOLDER))
}

fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).as_deref() == Some("true")
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", key, value))
        })
        .transpose()
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
