use std::io;
use std::process::Command;

use thiserror::Error;
use tracing::info;

use crate::classifier::Family;

const FIREWALL_CMD: &str = "firewall-cmd";

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// The two operations a trap needs from the host firewall.
pub trait FirewallGateway: Send + Sync {
    /// Adds a runtime rule dropping all traffic from `address`.
    fn ban_address(&self, address: &str, family: Family) -> Result<(), FirewallError>;

    /// Makes the runtime rules added during this session permanent.
    fn persist_rules(&self) -> Result<(), FirewallError>;
}

/// firewalld backend driven through `firewall-cmd`.
#[derive(Debug, Default)]
pub struct Firewalld;

impl FirewallGateway for Firewalld {
    fn ban_address(&self, address: &str, family: Family) -> Result<(), FirewallError> {
        info!("Adding firewalld rule for {}", address);
        run_command(FIREWALL_CMD, &ban_args(address, family))
    }

    fn persist_rules(&self) -> Result<(), FirewallError> {
        info!("Saving firewalld rules");
        run_command(FIREWALL_CMD, &persist_args())
    }
}

/// Reports the firewalld commands it would run without touching the host.
#[derive(Debug, Default)]
pub struct DryRun;

impl FirewallGateway for DryRun {
    fn ban_address(&self, address: &str, family: Family) -> Result<(), FirewallError> {
        info!(
            "[dry-run] {}",
            render_command(FIREWALL_CMD, &ban_args(address, family))
        );
        Ok(())
    }

    fn persist_rules(&self) -> Result<(), FirewallError> {
        info!("[dry-run] {}", render_command(FIREWALL_CMD, &persist_args()));
        Ok(())
    }
}

fn ban_args(address: &str, family: Family) -> Vec<String> {
    vec![
        "--add-rich-rule".to_string(),
        format!("rule family=\"{family}\" source address=\"{address}\" drop"),
    ]
}

fn persist_args() -> Vec<String> {
    vec!["--runtime-to-permanent".to_string()]
}

fn render_command(command: &str, args: &[String]) -> String {
    let mut rendered = command.to_string();
    for arg in args {
        rendered.push(' ');
        if arg.contains(' ') {
            rendered.push_str(&format!("'{arg}'"));
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

/// Runs an external command, treating a non-zero exit as failure.
fn run_command(command: &str, args: &[String]) -> Result<(), FirewallError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|source| FirewallError::Spawn {
            command: render_command(command, args),
            source,
        })?;

    if !output.status.success() {
        return Err(FirewallError::CommandFailed {
            command: render_command(command, args),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod testing;
