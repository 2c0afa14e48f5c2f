use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use super::{FirewallError, FirewallGateway};
use crate::classifier::Family;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Ban(String, Family),
    Persist,
}

/// Remembers every call, optionally failing bans.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_bans: bool,
}

impl RecordingGateway {
    pub fn failing_bans() -> Self {
        RecordingGateway {
            calls: Mutex::new(Vec::new()),
            fail_bans: true,
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bans(&self) -> Vec<(String, Family)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Ban(address, family) => Some((address, family)),
                GatewayCall::Persist => None,
            })
            .collect()
    }

    pub fn persist_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == GatewayCall::Persist)
            .count()
    }
}

impl FirewallGateway for RecordingGateway {
    fn ban_address(&self, address: &str, family: Family) -> Result<(), FirewallError> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Ban(address.to_string(), family));
        if self.fail_bans {
            return Err(FirewallError::CommandFailed {
                command: "firewall-cmd --add-rich-rule".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn persist_rules(&self) -> Result<(), FirewallError> {
        self.calls.lock().unwrap().push(GatewayCall::Persist);
        Ok(())
    }
}

/// Records calls like `RecordingGateway`, but every ban waits for `release`.
pub struct BlockingGateway {
    inner: RecordingGateway,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl BlockingGateway {
    /// Returns the gateway, a receiver told when a ban starts, and the release sender.
    pub fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gateway = BlockingGateway {
            inner: RecordingGateway::default(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (gateway, entered_rx, release_tx)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.calls()
    }
}

impl FirewallGateway for BlockingGateway {
    fn ban_address(&self, address: &str, family: Family) -> Result<(), FirewallError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner.ban_address(address, family)
    }

    fn persist_rules(&self) -> Result<(), FirewallError> {
        self.inner.persist_rules()
    }
}
