use std::io;
use std::sync::Arc;
use std::thread;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::TrapConfig;
use crate::port_trap::{PortTrap, TrapContext};

const TERMINATION_SIGNALS: [i32; 2] = [SIGTERM, SIGINT];

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to register termination signal handler: {0}")]
    Signal(#[source] io::Error),

    #[error("no trap could be started")]
    NoTrapsRunning,
}

/// Owns every trap for the lifetime of the process.
pub struct TrapSupervisor {
    config: TrapConfig,
    context: Arc<TrapContext>,
    traps: Vec<PortTrap>,
    shut_down: bool,
}

impl TrapSupervisor {
    pub fn new(config: TrapConfig, context: Arc<TrapContext>) -> Self {
        TrapSupervisor {
            config,
            context,
            traps: Vec::new(),
            shut_down: false,
        }
    }

    #[cfg(test)]
    pub fn traps(&self) -> &[PortTrap] {
        &self.traps
    }

    /// Starts the traps, blocks until SIGTERM or SIGINT, then shuts down.
    pub fn run(&mut self) -> Result<(), SupervisorError> {
        let mut signals = Signals::new(TERMINATION_SIGNALS).map_err(SupervisorError::Signal)?;
        self.start()?;

        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}", signal);
        }

        self.shutdown();
        Ok(())
    }

    /// Starts one trap per configured port. A port that fails to bind is reported and skipped.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        info!("IPTrap is starting");
        for &port in self.config.ports() {
            let mut trap = PortTrap::new(port, Arc::clone(&self.context));
            match trap.start() {
                Ok(()) => {
                    debug!("Trap listening on port {}", trap.local_port().unwrap_or(port));
                    self.traps.push(trap);
                }
                Err(e) => error!("Trap on port {} failed to start: {}", trap.port(), e),
            }
        }

        if self.traps.is_empty() {
            return Err(SupervisorError::NoTrapsRunning);
        }
        Ok(())
    }

    /// Stops every trap in parallel, then persists the firewall rules once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("IPTrap is being stopped");
        thread::scope(|scope| {
            for trap in &mut self.traps {
                scope.spawn(move || trap.stop());
            }
        });

        if let Err(e) = self.context.gateway().persist_rules() {
            error!("Failed to persist firewall rules: {}", e);
        }
    }
}
