//! Domain and whitelist source expansion
//!
//! Config list values come in two shapes: an inline comma-separated list
//! (`youtube.com, youtube.pl`) or a file reference (`@/etc/blocky.domains`)
//! with one entry per line, blank lines and `#` comments ignored.

use crate::error::{Error, Result};
use std::net::IpAddr;
use std::path::PathBuf;

/// Parsed shape of a config list value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    /// Inline comma-separated entries
    Inline(String),
    /// `@<path>` file reference
    File(PathBuf),
}

impl ListSource {
    /// Classify a raw config value
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('@') {
            Some(path) => Self::File(PathBuf::from(path.trim())),
            None => Self::Inline(raw.to_string()),
        }
    }

    /// Expand to the list of entries
    ///
    /// File errors surface as `Error::DomainSource`; callers loading
    /// something other than domains re-wrap as appropriate.
    pub fn expand(&self) -> Result<Vec<String>> {
        match self {
            Self::Inline(raw) => Ok(split_inline(raw)),
            Self::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::domain_source(format!("cannot read {}: {}", path.display(), e))
                })?;
                Ok(text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string)
                    .collect())
            }
        }
    }
}

fn split_inline(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand the `domains` value into a non-empty hostname list
pub fn load_domains(raw: &str) -> Result<Vec<String>> {
    let domains = ListSource::parse(raw).expand()?;
    if domains.is_empty() {
        return Err(Error::domain_source(format!(
            "domain source \"{}\" yields no domains",
            raw.trim()
        )));
    }
    Ok(domains)
}

/// Expand the `whitelist_local_ips` value into parsed addresses
///
/// An empty value is fine (no whitelist); unparsable entries and
/// unreadable file references are configuration errors.
pub fn load_whitelist(raw: &str) -> Result<Vec<IpAddr>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries = ListSource::parse(raw)
        .expand()
        .map_err(|e| Error::config(e.to_string()))?;
    entries
        .iter()
        .map(|entry| {
            entry.parse::<IpAddr>().map_err(|_| {
                Error::config(format!("whitelist_local_ips entry is not an IP address: {}", entry))
            })
        })
        .collect()
}
