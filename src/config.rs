use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::level_filters::LevelFilter;

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The command line did not describe a server to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// `--help` was given.
    Help,
    /// The two positional arguments were not given exactly once.
    WrongArguments,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help requested"),
            Self::WrongArguments => write!(f, "expected <port> <root-directory>"),
        }
    }
}

impl std::error::Error for UsageError {}

/// Server settings, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Document root, without a trailing slash.
    pub wwwroot: String,
    pub bindaddr: IpAddr,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Receive and send timeout for client sockets. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Normalize targets and refuse those that climb above the document root.
    pub safe_paths: bool,
    pub log_level: LevelFilter,
}

impl Config {
    /// Parse `std::env::args()`, printing usage and exiting if it asks for that.
    pub fn from_command_line() -> Result<Self> {
        let mut args = std::env::args();
        let name = args.next().unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let config = Self::from_args(args);
        if let Some(usage_error) = config
            .as_ref()
            .err()
            .and_then(|e| e.downcast_ref::<UsageError>())
        {
            usage(&name);
            std::process::exit(match usage_error {
                UsageError::Help => 0,
                UsageError::WrongArguments => 1,
            });
        }
        config
    }

    /// Parse arguments, not including the program name.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let args: Vec<String> = args.into_iter().collect();
        if args.iter().any(|arg| arg == "--help") {
            return Err(UsageError::Help.into());
        }
        let (port, wwwroot, flags) = match args.as_slice() {
            [port, wwwroot, flags @ ..] if !port.starts_with("--") && !wwwroot.starts_with("--") => {
                (port, wwwroot, flags)
            }
            _ => return Err(UsageError::WrongArguments.into()),
        };

        let port = match port
            .parse::<u16>()
            .with_context(|| format!("port number {} is invalid", port))?
        {
            0 => return Err(anyhow!("port number 0 is invalid")),
            port => port,
        };

        let mut wwwroot = wwwroot.to_string();
        let metadata = std::fs::metadata(&wwwroot)
            .with_context(|| format!("failed to open document root {}", wwwroot))?;
        if !metadata.is_dir() {
            return Err(anyhow!("document root {} is not a directory", wwwroot));
        }
        // Strip ending slash; targets bring their own.
        if wwwroot.len() > 1 && wwwroot.ends_with('/') {
            wwwroot.pop();
        }

        let mut config = Self {
            port,
            wwwroot,
            bindaddr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            safe_paths: false,
            log_level: LevelFilter::INFO,
        };

        let mut flags = flags.iter();
        while let Some(flag) = flags.next() {
            match flag.as_str() {
                "--addr" => {
                    let ip = flags.next().context("missing ip after --addr")?;
                    config.bindaddr = ip
                        .parse()
                        .with_context(|| format!("address {} is invalid", ip))?;
                }
                "--workers" => {
                    let number = flags.next().context("missing number after --workers")?;
                    config.workers = parse_count(number, "workers")?;
                }
                "--queue" => {
                    let number = flags.next().context("missing number after --queue")?;
                    config.queue_capacity = parse_count(number, "queue")?;
                }
                "--timeout" => {
                    let number = flags.next().context("missing number after --timeout")?;
                    let timeout_secs = number
                        .parse::<u64>()
                        .with_context(|| format!("timeout number {} is invalid", number))?;
                    config.timeout = match timeout_secs {
                        0 => None,
                        timeout_secs => Some(Duration::from_secs(timeout_secs)),
                    };
                }
                "--safe-paths" => config.safe_paths = true,
                "--log-level" => {
                    let level = flags.next().context("missing level after --log-level")?;
                    config.log_level = level
                        .parse()
                        .map_err(|_| anyhow!("log level {} is invalid", level))?;
                }
                arg if arg.starts_with("--") => {
                    return Err(anyhow!("unknown argument `{}'", arg));
                }
                _ => return Err(UsageError::WrongArguments.into()),
            }
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bindaddr, self.port)
    }
}

fn parse_count(number: &str, what: &str) -> Result<usize> {
    match number
        .parse::<usize>()
        .with_context(|| format!("{} number {} is invalid", what, number))?
    {
        0 => Err(anyhow!("{} number must be at least 1", what)),
        count => Ok(count),
    }
}

/// Print usage to standard output.
pub fn usage(argv0: &str) {
    print!(
        "usage:\t{} <port> <root-directory> [flags]\n\n\
        \tport is 1-65535; root-directory must be an existing directory.\n\n\
        flags:\t--addr ip (default: all interfaces)\n\
        \t\tWhich local address to bind the listening socket to.\n\n\
        \t--workers number (default: {})\n\
        \t\tHow many connections are handled at the same time.\n\n\
        \t--queue number (default: {})\n\
        \t\tHow many accepted connections may wait for a worker.\n\n\
        \t--timeout secs (default: {})\n\
        \t\tHow long to wait on a silent client. Set to zero to disable.\n\n\
        \t--safe-paths\n\
        \t\tResolve . and .. in request paths and refuse paths\n\
        \t\tthat leave the root directory.\n\n\
        \t--log-level level (default: info)\n\
        \t\tOne of off, error, warn, info, debug, trace.\n\n",
        argv0, DEFAULT_WORKERS, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT_SECS,
    );
}
