use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no valid ports found")]
    NoValidPorts,
}

/// Distinct, non-zero ports to trap, in the order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapConfig {
    ports: Vec<u16>,
}

impl TrapConfig {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Result<Self, ConfigError> {
        let mut distinct = Vec::new();
        for port in ports {
            if port != 0 && !distinct.contains(&port) {
                distinct.push(port);
            }
        }

        if distinct.is_empty() {
            return Err(ConfigError::NoValidPorts);
        }
        Ok(TrapConfig { ports: distinct })
    }

    /// Parses command-line port arguments, skipping the ones that are not valid ports.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let ports = args.iter().filter_map(|arg| {
            let arg = arg.as_ref();
            match parse_port(arg) {
                Ok(port) => Some(port),
                Err(reason) => {
                    warn!("Skipping invalid argument \"{}\": {}", arg, reason);
                    None
                }
            }
        });
        Self::new(ports)
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

fn parse_port(arg: &str) -> Result<u16, String> {
    match arg.trim().parse::<u16>() {
        Ok(0) => Err("port must be positive".to_string()),
        Ok(port) => Ok(port),
        Err(e) => Err(e.to_string()),
    }
}
