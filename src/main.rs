mod classifier;
mod cli;
mod config;
mod event_log;
mod firewall;
mod port_trap;
mod supervisor;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use config::TrapConfig;
use event_log::EventLogger;
use firewall::{DryRun, FirewallGateway, Firewalld};
use port_trap::TrapContext;
use supervisor::TrapSupervisor;

fn main() -> ExitCode {
    let args = cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    let config = match TrapConfig::from_args(&args.ports) {
        Ok(config) => config,
        Err(e) => {
            error!("{}, exiting", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway: Arc<dyn FirewallGateway> = if args.dry_run {
        Arc::new(DryRun)
    } else {
        Arc::new(Firewalld)
    };
    let logger = Arc::new(EventLogger::new(args.log_file));
    let context = Arc::new(TrapContext::new(&args.banner, logger, gateway));

    let mut supervisor = TrapSupervisor::new(config, context);
    if let Err(e) = supervisor.run() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
