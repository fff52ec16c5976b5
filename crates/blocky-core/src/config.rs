//! Configuration types for the blocky system
//!
//! The on-disk format is an INI file with a single `[main]` section,
//! e.g. `/etc/blocky.conf`:
//!
//! ```ini
//! [main]
//! table = filter
//! chain = FORWARD
//! check_every = 30
//! domains = youtube.com, youtube.pl
//! ipset = blocky_blacklist
//! rule_pos = 0
//! whitelist_local_ips = 10.0.0.1, 172.16.1.1
//! log_type = syslog
//! log_level = info
//! log_facility = daemon
//! ```
//!
//! `domains` (and `whitelist_local_ips`) accept either an inline
//! comma-separated list or `@<path>` naming a file with one entry per
//! line; blank lines and `#` comments are ignored.

use crate::domains;
use crate::error::{Error, Result};
use ini::Ini;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys that must be present in the `[main]` section
const REQUIRED_KEYS: &[&str] = &[
    "table",
    "chain",
    "check_every",
    "domains",
    "ipset",
    "rule_pos",
    "log_type",
    "log_level",
];

/// Default path for file logging
const DEFAULT_LOG_PATH: &str = "/var/log/blocky.log";

/// Default pidfile path
const DEFAULT_PIDFILE: &str = "/var/run/blocky.pid";

/// Default per-domain resolution timeout in seconds
const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 5;

/// Main blocky configuration
///
/// Loaded from the INI file, validated, with domain/whitelist sources
/// already expanded. The raw `domains` and `whitelist_local_ips` values
/// are retained so a loaded config re-serializes to the same key values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockyConfig {
    /// Firewall table holding the chain (e.g. "filter")
    pub table: String,

    /// Chain the blocking rule is inserted into (e.g. "FORWARD")
    pub chain: String,

    /// Cycle interval in seconds (must be positive)
    pub check_every: u64,

    /// Raw `domains` value as written in the config file
    pub domains_raw: String,

    /// Expanded domain list (non-empty)
    pub domains: Vec<String>,

    /// Name of the blocking set
    pub ipset: String,

    /// Zero-based insertion position of the blocking rule in the chain
    pub rule_pos: u32,

    /// Raw `whitelist_local_ips` value as written in the config file
    pub whitelist_raw: String,

    /// Local addresses that must never be blocked
    pub whitelist_local_ips: Vec<IpAddr>,

    /// Per-domain resolution timeout in seconds
    pub resolve_timeout: u64,

    /// Logging configuration
    pub log: LogConfig,

    /// Pidfile path
    pub pidfile: PathBuf,
}

impl BlockyConfig {
    /// Load and validate a configuration file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_ini(&ini)
    }

    /// Load and validate a configuration from INI text
    pub fn load_from_str(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| Error::config(format!("cannot parse config: {}", e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let main = ini
            .section(Some("main"))
            .ok_or_else(|| Error::config("missing [main] section"))?;

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| main.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "missing mandatory option(s): {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| main.get(key).map(str::trim).unwrap_or("").to_string();

        let check_every: u64 = get("check_every")
            .parse()
            .map_err(|_| Error::config(format!("check_every is not an integer: {}", get("check_every"))))?;
        if check_every == 0 {
            return Err(Error::config("check_every must be positive"));
        }

        let rule_pos: u32 = get("rule_pos")
            .parse()
            .map_err(|_| Error::config(format!("rule_pos is not a non-negative integer: {}", get("rule_pos"))))?;

        let resolve_timeout: u64 = match main.get("resolve_timeout") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("resolve_timeout is not an integer: {}", raw)))?,
            None => DEFAULT_RESOLVE_TIMEOUT_SECS,
        };
        if resolve_timeout == 0 {
            return Err(Error::config("resolve_timeout must be positive"));
        }

        let domains_raw = get("domains");
        let domains = domains::load_domains(&domains_raw)?;

        let whitelist_raw = main.get("whitelist_local_ips").map(str::trim).unwrap_or("").to_string();
        let whitelist_local_ips = domains::load_whitelist(&whitelist_raw)?;

        let log = LogConfig {
            log_type: get("log_type").parse()?,
            log_level: get("log_level").parse()?,
            log_facility: main
                .get("log_facility")
                .map(str::trim)
                .unwrap_or("daemon")
                .parse()?,
            log_path: main
                .get("log_path")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_LOG_PATH)
                .into(),
        };

        let config = Self {
            table: get("table"),
            chain: get("chain"),
            check_every,
            domains_raw,
            domains,
            ipset: get("ipset"),
            rule_pos,
            whitelist_raw,
            whitelist_local_ips,
            resolve_timeout,
            log,
            pidfile: main
                .get("pidfile")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_PIDFILE)
                .into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::config("table cannot be empty"));
        }
        if self.chain.is_empty() {
            return Err(Error::config("chain cannot be empty"));
        }
        if self.ipset.is_empty() {
            return Err(Error::config("ipset cannot be empty"));
        }
        if self.domains.is_empty() {
            return Err(Error::domain_source("domain list is empty"));
        }
        if self.log.log_type == LogType::File && self.log.log_path.as_os_str().is_empty() {
            return Err(Error::config("log_type is file but log_path is empty"));
        }
        Ok(())
    }

    /// Render the configuration back to its INI form
    ///
    /// Raw list values are written as loaded, so load → serialize → load
    /// yields an identical configuration.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("main"))
            .set("table", self.table.as_str())
            .set("chain", self.chain.as_str())
            .set("check_every", self.check_every.to_string())
            .set("domains", self.domains_raw.as_str())
            .set("ipset", self.ipset.as_str())
            .set("rule_pos", self.rule_pos.to_string())
            .set("whitelist_local_ips", self.whitelist_raw.as_str())
            .set("resolve_timeout", self.resolve_timeout.to_string())
            .set("log_type", self.log.log_type.as_str())
            .set("log_level", self.log.log_level.as_str())
            .set("log_facility", self.log.log_facility.as_str())
            .set("log_path", self.log.log_path.to_string_lossy().into_owned())
            .set("pidfile", self.pidfile.to_string_lossy().into_owned());
        ini
    }

    /// Render the configuration to INI text
    pub fn to_ini_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.to_ini().write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Cycle interval as a [`Duration`]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_every)
    }

    /// Per-domain resolution timeout as a [`Duration`]
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout)
    }
}

/// Engine tuning
///
/// Derived from [`BlockyConfig`] for the daemon; constructed directly
/// in tests, where intervals are shrunk to milliseconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between cycles
    pub check_interval: Duration,

    /// Per-domain resolution timeout
    pub resolve_timeout: Duration,

    /// Log the full blocked-address list every this many cycles
    /// (0 disables the summary)
    pub summary_every_cycles: u64,

    /// Capacity of the engine event channel
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine tuning
    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(Error::config("check interval must be positive"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event channel capacity must be positive"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            resolve_timeout: Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECS),
            summary_every_cycles: 10,
            event_channel_capacity: 256,
        }
    }
}

impl From<&BlockyConfig> for EngineConfig {
    fn from(config: &BlockyConfig) -> Self {
        Self {
            check_interval: config.check_interval(),
            resolve_timeout: config.resolve_timeout(),
            ..Self::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Destination kind
    pub log_type: LogType,
    /// Minimum severity
    pub log_level: LogLevel,
    /// Syslog facility (used when `log_type = syslog`)
    pub log_facility: LogFacility,
    /// Log file path (used when `log_type = file`)
    pub log_path: PathBuf,
}

/// Log destination kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// System logger via /dev/log
    Syslog,
    /// Plain append-mode file
    File,
}

impl LogType {
    /// Canonical config-file spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syslog => "syslog",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for LogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syslog" => Ok(Self::Syslog),
            "file" => Ok(Self::File),
            other => Err(Error::config(format!("incorrect log_type: {}", other))),
        }
    }
}

/// Minimum log severity, syslog-style names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Emerg,
    Alert,
    Critical,
    Error,
    Warn,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    /// Canonical config-file spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emerg => "emerg",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Map to the nearest tracing level
    ///
    /// Syslog severities above error have no tracing counterpart and
    /// collapse onto ERROR; notice collapses onto INFO.
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            Self::Emerg | Self::Alert | Self::Critical | Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Notice | Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emerg" => Ok(Self::Emerg),
            "alert" => Ok(Self::Alert),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(Error::config(format!("incorrect log_level: {}", other))),
        }
    }
}

/// Syslog facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFacility {
    Kern,
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    Authpriv,
    Ftp,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl LogFacility {
    /// Canonical config-file spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kern => "kern",
            Self::User => "user",
            Self::Mail => "mail",
            Self::Daemon => "daemon",
            Self::Auth => "auth",
            Self::Syslog => "syslog",
            Self::Lpr => "lpr",
            Self::News => "news",
            Self::Uucp => "uucp",
            Self::Cron => "cron",
            Self::Authpriv => "authpriv",
            Self::Ftp => "ftp",
            Self::Local0 => "local0",
            Self::Local1 => "local1",
            Self::Local2 => "local2",
            Self::Local3 => "local3",
            Self::Local4 => "local4",
            Self::Local5 => "local5",
            Self::Local6 => "local6",
            Self::Local7 => "local7",
        }
    }
}

impl std::str::FromStr for LogFacility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kern" => Ok(Self::Kern),
            "user" => Ok(Self::User),
            "mail" => Ok(Self::Mail),
            "daemon" => Ok(Self::Daemon),
            "auth" => Ok(Self::Auth),
            "syslog" => Ok(Self::Syslog),
            "lpr" => Ok(Self::Lpr),
            "news" => Ok(Self::News),
            "uucp" => Ok(Self::Uucp),
            "cron" => Ok(Self::Cron),
            "authpriv" => Ok(Self::Authpriv),
            "ftp" => Ok(Self::Ftp),
            "local0" => Ok(Self::Local0),
            "local1" => Ok(Self::Local1),
            "local2" => Ok(Self::Local2),
            "local3" => Ok(Self::Local3),
            "local4" => Ok(Self::Local4),
            "local5" => Ok(Self::Local5),
            "local6" => Ok(Self::Local6),
            "local7" => Ok(Self::Local7),
            other => Err(Error::config(format!("incorrect log_facility: {}", other))),
        }
    }
}
