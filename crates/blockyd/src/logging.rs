//! Logging initialization
//!
//! Routes tracing output to syslog or an append-mode file per the
//! config; `--foreground` sends everything to stderr instead.

use anyhow::{Context, Result};
use blocky_core::{LogConfig, LogFacility, LogType};
use std::ffi::CString;
use syslog_tracing::{Facility, Options, Syslog};

/// Initialize the global tracing subscriber
pub fn init(log: &LogConfig, foreground: bool) -> Result<()> {
    let level = log.log_level.tracing_level();

    if foreground {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    match log.log_type {
        LogType::File => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log.log_path)
                .with_context(|| format!("cannot open log file {}", log.log_path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
                .init();
        }
        LogType::Syslog => {
            let identity = CString::new("blockyd").context("invalid syslog identity")?;
            let syslog = Syslog::new(identity, Options::LOG_PID, facility(log.log_facility))
                .context("cannot connect to syslog")?;
            // Syslog adds its own timestamp and identity
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .without_time()
                .with_target(false)
                .with_writer(syslog)
                .init();
        }
    }
    Ok(())
}

fn facility(facility: LogFacility) -> Facility {
    match facility {
        LogFacility::Kern => Facility::Kern,
        LogFacility::User => Facility::User,
        LogFacility::Mail => Facility::Mail,
        LogFacility::Daemon => Facility::Daemon,
        LogFacility::Auth => Facility::Auth,
        LogFacility::Syslog => Facility::Syslog,
        LogFacility::Lpr => Facility::Lpr,
        LogFacility::News => Facility::News,
        LogFacility::Uucp => Facility::Uucp,
        LogFacility::Cron => Facility::Cron,
        LogFacility::Authpriv => Facility::AuthPriv,
        LogFacility::Ftp => Facility::Ftp,
        LogFacility::Local0 => Facility::Local0,
        LogFacility::Local1 => Facility::Local1,
        LogFacility::Local2 => Facility::Local2,
        LogFacility::Local3 => Facility::Local3,
        LogFacility::Local4 => Facility::Local4,
        LogFacility::Local5 => Facility::Local5,
        LogFacility::Local6 => Facility::Local6,
        LogFacility::Local7 => Facility::Local7,
    }
}
