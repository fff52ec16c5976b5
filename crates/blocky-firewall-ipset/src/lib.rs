// # ipset/iptables Firewall Backend
//
// This crate provides the Linux firewall backend for the blocky system,
// driving the `ipset` and `iptables` command-line tools via
// `tokio::process`.
//
// ## Shape
//
// One `IpsetFirewall` manages one set and one rule, described by a
// [`FirewallSpec`]. The blocking rule is identified by its comment
// match, so creation and deletion stay idempotent across restarts.
// Set create/add/del run under `-exist`, so repeating an operation is
// harmless.
//
// ## Atomicity
//
// Membership is changed entry by entry; each `ipset add`/`del` is
// atomic in the kernel and the set is never flushed, so a rule
// evaluating the set always sees either the old or the new membership
// for any given address, never an empty set mid-update.

use blocky_core::traits::{FirewallBackend, FirewallSpec};
use blocky_core::{Error, Result};

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

/// PATH used when the environment does not provide one
const DEFAULT_PATH: &str = "/sbin:/bin:/usr/sbin:/usr/bin";

/// Upper bound on duplicate rules removed by delete_rule
const MAX_RULE_DELETIONS: usize = 16;

/// Firewall backend driving ipset(8) and iptables(8)
pub struct IpsetFirewall {
    spec: FirewallSpec,
    path: String,
}

impl IpsetFirewall {
    /// Create a backend for the given set/rule spec
    pub fn new(spec: FirewallSpec) -> Self {
        let path = std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        Self { spec, path }
    }

    /// The spec this backend was built from
    pub fn spec(&self) -> &FirewallSpec {
        &self.spec
    }

    /// Verify the host can run this backend at all
    ///
    /// Checks that `ipset` and `iptables` are runnable, that the
    /// configured table/chain exists, and that `rule_pos` is not beyond
    /// the chain's current rule count. Run once at startup; failures
    /// here are fatal.
    pub async fn preflight(&self) -> Result<()> {
        self.run("ipset", &["list", "-n"]).await.map_err(|e| {
            Error::firewall(format!("ipset is missing or unusable: {}", e))
        })?;

        let rules = self.chain_rules().await?;
        if self.spec.rule_pos as usize > rules.len() {
            return Err(Error::config(format!(
                "rule_pos {} is beyond the {} rule(s) in chain {}",
                self.spec.rule_pos,
                rules.len(),
                self.spec.chain
            )));
        }
        Ok(())
    }

    /// Current rules of the configured chain, one `-A ...` line each
    async fn chain_rules(&self) -> Result<Vec<String>> {
        let stdout = self
            .run("iptables", &["-t", &self.spec.table, "-S", &self.spec.chain])
            .await
            .map_err(|e| {
                Error::firewall(format!(
                    "chain {} not found in table {}: {}",
                    self.spec.chain, self.spec.table, e
                ))
            })?;
        Ok(stdout
            .lines()
            .filter(|line| line.starts_with("-A "))
            .map(str::to_string)
            .collect())
    }

    /// Match/target arguments shared by check, insert and delete
    fn rule_tail(&self) -> Vec<String> {
        vec![
            "-m".into(),
            "set".into(),
            "--match-set".into(),
            self.spec.set_name.clone(),
            self.spec.match_flag.as_str().into(),
            "-m".into(),
            "comment".into(),
            "--comment".into(),
            self.spec.comment.clone(),
            "-j".into(),
            self.spec.target.as_str().into(),
        ]
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.run_owned(program, &owned).await
    }

    async fn run_owned(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("running {} {}", program, args.join(" "));
        let output: Output = Command::new(program)
            .args(args)
            .env_clear()
            .env("PATH", &self.path)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| Error::firewall(format!("cannot run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::firewall(format!(
                "{} {} failed ({}): {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Extract member addresses from `ipset save` output
///
/// The dump interleaves a `create` header with one `add <set> <ip>`
/// line per member.
fn parse_save_output(set_name: &str, dump: &str) -> BTreeSet<IpAddr> {
    dump.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some("add"), Some(name), Some(addr)) if name == set_name => {
                    addr.parse().ok()
                }
                _ => None,
            }
        })
        .collect()
}

/// iptables rule numbers are 1-based; the config's rule_pos is 0-based
fn insert_position(rule_pos: u32) -> String {
    (rule_pos + 1).to_string()
}

#[async_trait::async_trait]
impl FirewallBackend for IpsetFirewall {
    async fn ensure_set(&self) -> Result<()> {
        info!("ensuring ipset {} exists", self.spec.set_name);
        self.run(
            "ipset",
            &[
                "-exist",
                "create",
                &self.spec.set_name,
                "hash:ip",
                "hashsize",
                "4096",
            ],
        )
        .await?;
        Ok(())
    }

    async fn destroy_set(&self) -> Result<()> {
        info!("destroying ipset {}", self.spec.set_name);
        self.run("ipset", &["destroy", &self.spec.set_name]).await?;
        Ok(())
    }

    async fn list_members(&self) -> Result<BTreeSet<IpAddr>> {
        let dump = self.run("ipset", &["save", &self.spec.set_name]).await?;
        Ok(parse_save_output(&self.spec.set_name, &dump))
    }

    async fn add_member(&self, ip: IpAddr) -> Result<()> {
        self.run(
            "ipset",
            &["-exist", "add", &self.spec.set_name, &ip.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, ip: IpAddr) -> Result<()> {
        self.run(
            "ipset",
            &["-exist", "del", &self.spec.set_name, &ip.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn ensure_rule(&self) -> Result<()> {
        let mut check = vec![
            "-t".to_string(),
            self.spec.table.clone(),
            "-C".to_string(),
            self.spec.chain.clone(),
        ];
        check.extend(self.rule_tail());
        if self.run_owned("iptables", &check).await.is_ok() {
            debug!("rule for set {} already present", self.spec.set_name);
            return Ok(());
        }

        info!(
            "inserting {} rule into chain {} (table {}) for ipset \"{}\" at position {}",
            self.spec.target.as_str(),
            self.spec.chain,
            self.spec.table,
            self.spec.set_name,
            self.spec.rule_pos
        );
        let mut insert = vec![
            "-t".to_string(),
            self.spec.table.clone(),
            "-I".to_string(),
            self.spec.chain.clone(),
            insert_position(self.spec.rule_pos),
        ];
        insert.extend(self.rule_tail());
        self.run_owned("iptables", &insert).await?;
        Ok(())
    }

    async fn delete_rule(&self) -> Result<()> {
        let mut delete = vec![
            "-t".to_string(),
            self.spec.table.clone(),
            "-D".to_string(),
            self.spec.chain.clone(),
        ];
        delete.extend(self.rule_tail());

        // Remove every copy of the rule; duplicates can accumulate if a
        // previous run died between insert and cleanup
        let mut deleted = 0;
        while deleted < MAX_RULE_DELETIONS {
            if self.run_owned("iptables", &delete).await.is_err() {
                break;
            }
            deleted += 1;
        }
        if deleted > 0 {
            info!(
                "deleted {} rule(s) for ipset {} from chain {}",
                deleted, self.spec.set_name, self.spec.chain
            );
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "ipset"
    }

    fn set_name(&self) -> &str {
        &self.spec.set_name
    }
}
