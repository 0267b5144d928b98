//! Parses the command line arguments and runs one simulated device.
//!
//! Basic usage, serving a script on an unprivileged port:
//!
//! ```text
//! snmpsim demos/router.snmp --port 1161 --log-level debug
//! ```
//!
//! Diagnostics are written as JSON lines next to the script, to
//! `<script>.log`.

use crate::script::{parse_program, Interpreter, ParseError};
use clap::Parser;
use snmpsim_core::{
    config::SNMP_PORT,
    snmp::{DEFAULT_RO_COMMUNITY, DEFAULT_RW_COMMUNITY},
    simulate, ExitStatus, SimConfig, SimError,
};
use std::{
    ffi::OsString,
    fs::OpenOptions,
    io,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error as ThisError;
use tracing::{Dispatch, Level};
use tracing_subscriber::FmtSubscriber;

/// Stores the different command line arguments.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version, about = "Simulates an SNMP device driven by a script")]
pub struct Args {
    /// Script describing the device's values and how they change
    pub script: PathBuf,
    /// Address to bind the agent socket to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// UDP port to serve SNMP on
    #[arg(short, long, default_value_t = SNMP_PORT)]
    pub port: u16,
    /// Seconds to wait for a request before checking for shutdown
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
    /// Community allowed to read
    #[arg(long, default_value = DEFAULT_RO_COMMUNITY)]
    pub ro_community: String,
    /// Community allowed to read and write
    #[arg(long, default_value = DEFAULT_RW_COMMUNITY)]
    pub rw_community: String,
    /// Most verbose level written to the log file
    #[arg(long, default_value = "info")]
    pub log_level: Level,
    /// Seed for `random`, to make runs repeatable
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Args {
    pub fn config(&self) -> SimConfig {
        SimConfig {
            bind: SocketAddr::new(self.bind, self.port),
            recv_timeout: Duration::from_secs(self.timeout),
            ro_community: self.ro_community.clone(),
            rw_community: self.rw_community.clone(),
        }
    }
}

/// The log file for `script`: its full name with `.log` appended.
pub fn log_path(script: &Path) -> PathBuf {
    let mut name = OsString::from(script.as_os_str());
    name.push(".log");
    PathBuf::from(name)
}

/// Opens (or appends to) the log file and builds the subscriber writing to
/// it. The returned handle is attached to the simulation rather than set as
/// the global default, so it is released when the run ends.
pub fn initialize_logging(path: &Path, level: Level) -> io::Result<Dispatch> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let subscriber = FmtSubscriber::builder()
        .with_writer(Arc::new(file))
        .with_max_level(level)
        .json()
        .finish();
    Ok(Dispatch::new(subscriber))
}

/// Reads and parses the script, then simulates the device until the script
/// ends.
pub async fn run(args: &Args) -> Result<ExitStatus, StartupError> {
    let result = start(args).await;
    if let Err(err) = &result {
        tracing::error!("{err}");
    }
    result
}

async fn start(args: &Args) -> Result<ExitStatus, StartupError> {
    let source = std::fs::read_to_string(&args.script).map_err(|source| StartupError::Read {
        path: args.script.clone(),
        source,
    })?;
    let program = parse_program(&source)?;
    tracing::info!(
        script = %args.script.display(),
        "Loaded {} statements",
        program.statements.len()
    );

    let interpreter = match args.seed {
        Some(seed) => Interpreter::with_seed(seed),
        None => Interpreter::new(),
    };
    let status = simulate(interpreter, program, &args.config()).await?;
    tracing::info!("Simulation ended: {status:?}");
    Ok(status)
}

#[derive(Debug, ThisError)]
pub enum StartupError {
    #[error("Unable to read file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Parsing error: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to init snmp server: {0}")]
    Bind(#[source] io::Error),
    #[error(transparent)]
    Sim(SimError),
}

impl From<SimError> for StartupError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Bind(err) => StartupError::Bind(err),
            other => StartupError::Sim(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["snmpsim", "device.snmp"]).unwrap();
        assert_eq!(args.log_level, Level::INFO);
        assert_eq!(args.seed, None);
        assert_eq!(
            args.config(),
            SimConfig {
                bind: (Ipv4Addr::UNSPECIFIED, 161).into(),
                ..SimConfig::default()
            }
        );
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "snmpsim",
            "device.snmp",
            "--bind",
            "127.0.0.1",
            "-p",
            "1161",
            "--timeout",
            "2",
            "--ro-community",
            "watch",
            "--log-level",
            "debug",
            "--seed",
            "3",
        ])
        .unwrap();
        assert_eq!(args.log_level, Level::DEBUG);
        assert_eq!(args.seed, Some(3));
        let config = args.config();
        assert_eq!(config.bind, SocketAddr::from((Ipv4Addr::LOCALHOST, 1161)));
        assert_eq!(config.recv_timeout, Duration::from_secs(2));
        assert_eq!(config.ro_community, "watch");
        assert_eq!(config.rw_community, "private");
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Args::try_parse_from(["snmpsim"]).is_err());
        assert!(Args::try_parse_from(["snmpsim", "a", "--timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["snmpsim", "a", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn log_path_appends_extension() {
        assert_eq!(
            log_path(Path::new("scripts/router.snmp")),
            PathBuf::from("scripts/router.snmp.log")
        );
    }

    #[tokio::test]
    async fn missing_script_is_reported() {
        let args = Args::try_parse_from(["snmpsim", "/nonexistent/device.snmp"]).unwrap();
        let err = run(&args).await.unwrap_err();
        assert!(matches!(err, StartupError::Read { .. }));
        assert!(err
            .to_string()
            .starts_with("Unable to read file /nonexistent/device.snmp"));
    }
}
