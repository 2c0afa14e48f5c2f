use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::classifier::{classify, is_loopback};
use crate::event_log::{CaptureEvent, EventLogger};
use crate::firewall::FirewallGateway;

pub const DEFAULT_BANNER: &str = "BUSTED";

const LISTEN_BACKLOG: i32 = 5;

#[derive(Debug, Error)]
pub enum TrapError {
    #[error("failed to listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn worker for port {port}: {source}")]
    Spawn {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("trap on port {0} was already started")]
    AlreadyStarted(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// What every trap shares: the banner, the capture log and the firewall.
pub struct TrapContext {
    banner: Vec<u8>,
    logger: Arc<EventLogger>,
    gateway: Arc<dyn FirewallGateway>,
}

impl TrapContext {
    pub fn new(banner: &str, logger: Arc<EventLogger>, gateway: Arc<dyn FirewallGateway>) -> Self {
        let mut banner = banner.as_bytes().to_vec();
        banner.push(b'\n');
        TrapContext {
            banner,
            logger,
            gateway,
        }
    }

    pub fn gateway(&self) -> &dyn FirewallGateway {
        self.gateway.as_ref()
    }

    /// Sends the banner, hangs up, then reacts to the peer.
    fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr, port: u16) {
        if let Err(e) = stream.write_all(&self.banner) {
            debug!("Could not send banner to {} on port {}: {}", peer, port, e);
        }
        drop(stream);

        self.catch(&peer.ip().to_string(), port);
    }

    /// Logs and bans a raw peer address unless it is the local host.
    pub fn catch(&self, raw_address: &str, port: u16) -> Option<CaptureEvent> {
        let (family, address) = classify(raw_address);
        if is_loopback(&address) {
            debug!("Ignoring loopback connection on port {}", port);
            return None;
        }

        let event = CaptureEvent::now(family, address, port);
        self.logger.record(&event);

        if let Err(e) = self.gateway.ban_address(event.address(), event.family()) {
            error!(
                "Failed to ban {} caught on port {}: {}",
                event.address(),
                event.port(),
                e
            );
        }

        Some(event)
    }
}

/// One listening socket on one port.
pub struct PortTrap {
    port: u16,
    context: Arc<TrapContext>,
    state: Arc<Mutex<TrapState>>,
    // duplicate of the worker's socket, kept to interrupt its accept
    listener: Option<Socket>,
    worker: Option<JoinHandle<()>>,
    local_port: Option<u16>,
}

impl PortTrap {
    pub fn new(port: u16, context: Arc<TrapContext>) -> Self {
        PortTrap {
            port,
            context,
            state: Arc::new(Mutex::new(TrapState::Created)),
            listener: None,
            worker: None,
            local_port: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Port actually bound, which differs from `port()` only when that is 0.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    pub fn state(&self) -> TrapState {
        *lock(&self.state)
    }

    /// Binds the listener and spawns the accept loop.
    pub fn start(&mut self) -> Result<(), TrapError> {
        if self.state() != TrapState::Created {
            return Err(TrapError::AlreadyStarted(self.port));
        }

        info!("Initializing trap on port {}", self.port);
        let port = self.port;
        let listener = bind_listener(port).map_err(|source| TrapError::Bind { port, source })?;
        let handle = listener
            .try_clone()
            .map_err(|source| TrapError::Bind { port, source })?;
        self.local_port = listener
            .local_addr()
            .ok()
            .and_then(|addr| addr.as_socket())
            .map(|addr| addr.port());

        *lock(&self.state) = TrapState::Running;

        let context = Arc::clone(&self.context);
        let state = Arc::clone(&self.state);
        let worker = thread::Builder::new()
            .name(format!("iptrap :{port}"))
            .spawn(move || accept_loop(&listener, port, &context, &state))
            .map_err(|source| {
                *lock(&self.state) = TrapState::Stopped;
                TrapError::Spawn { port, source }
            })?;

        self.listener = Some(handle);
        self.worker = Some(worker);
        Ok(())
    }

    /// Shuts the listener down and waits for the accept loop to finish.
    ///
    /// Only the first call after `start` does anything.
    pub fn stop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        info!("Stopping trap on port {}", self.port);
        *lock(&self.state) = TrapState::Stopping;

        if let Err(e) = listener.shutdown(Shutdown::Both) {
            if e.kind() == io::ErrorKind::NotConnected {
                debug!("Listener on port {} was already shut down", self.port);
            } else {
                error!("Error stopping trap on port {}: {}", self.port, e);
            }
        }
        drop(listener);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Trap on port {} panicked", self.port);
            }
        }

        *lock(&self.state) = TrapState::Stopped;
    }
}

fn accept_loop(listener: &Socket, port: u16, context: &TrapContext, state: &Mutex<TrapState>) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => match peer.as_socket() {
                Some(peer) => context.handle_connection(stream.into(), peer, port),
                None => warn!("Dropping connection on port {} from a non-IP peer", port),
            },
            Err(_) if *lock(state) == TrapState::Stopping => {
                debug!("Accept loop on port {} interrupted by stop", port);
                return;
            }
            Err(e) if is_transient(&e) => {
                warn!("Connection on port {} failed before accept: {}", port, e);
            }
            Err(e) => {
                error!("Error running trap on port {}: {}", port, e);
                break;
            }
        }
    }

    let mut state = lock(state);
    if *state == TrapState::Running {
        *state = TrapState::Stopped;
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Dual-stack wildcard listener, or IPv4-only when the host lacks IPv6.
fn bind_listener(port: u16) -> io::Result<Socket> {
    let dual_stack = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    match listen_on(dual_stack) {
        Ok(socket) => Ok(socket),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
            ) =>
        {
            Err(e)
        }
        Err(e) => {
            warn!(
                "IPv6 listener unavailable on port {} ({}), falling back to IPv4",
                port, e
            );
            listen_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        }
    }
}

fn listen_on(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket)
}

fn lock(state: &Mutex<TrapState>) -> MutexGuard<'_, TrapState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
