//!
//! modelhub server binary
//! ----------------------
//! Command-line entry point. Configuration comes from the environment (see
//! `modelhub::config`); `--http-port` and `--data-dir` override it.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use modelhub::config::Config;

const USAGE: &str = "modelhub server\n\nUSAGE:\n  modelhub [--http-port N] [--data-dir PATH]\n\nOPTIONS:\n  --http-port N     HTTP API port (env: MODELHUB_HTTP_PORT, default 8000)\n  --data-dir PATH   Folder holding the parquet tables (env: MODELHUB_DATA_DIR, default data)\n\nENVIRONMENT:\n  SECRET_KEY                     token signing key (random per process if unset)\n  ACCESS_TOKEN_EXPIRE_MINUTES    token lifetime, default 30\n  ADMIN_EMAIL, ADMIN_PASSWORD    admin account seeded at startup\n  RUST_LOG                       log filter, default info\n";

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| anyhow!("{} requires a value", flag)),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let mut config = Config::from_env()?;
    if let Some(port) = arg_value(&args, "--http-port")? {
        config.http_port = port.parse().map_err(|e| anyhow!("Invalid --http-port '{}': {}", port, e))?;
    }
    if let Some(dir) = arg_value(&args, "--data-dir")? {
        config.data_dir = PathBuf::from(dir);
    }

    modelhub::server::run_with_config(config).await
}
