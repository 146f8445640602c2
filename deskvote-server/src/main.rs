#[macro_use]
extern crate tracing;

use clap::Parser;
use deskvote_core::error::DeskResult;
use deskvote_core::package_full;

use crate::cli::{AppCli, Command};

mod api;
mod cli;
mod init;
#[cfg(test)]
mod tests;

fn main() -> DeskResult<()> {
    crate::init::logging();
    let cli = AppCli::parse();

    use tokio::runtime::Builder;
    let runtime = Builder::new_multi_thread()
        .thread_name_fn(|| {
            use std::sync::atomic::{AtomicUsize, Ordering};
            static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
            let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
            format!("deskvote-{}", id)
        })
        .enable_all()
        .build()?;

    match cli.command {
        Command::Server(server) => {
            info!("Starting {}", package_full());
            if server.skip_migrations {
                warn!("Not running database migrations");
            }
            runtime.block_on(crate::cli::server::server_start(
                cli.config,
                !server.skip_migrations,
            ))?;
        }
        Command::Migrate => {
            runtime.block_on(crate::cli::migrate::migrate(cli.config))?;
        }
    }
    runtime.shutdown_timeout(std::time::Duration::from_secs(10));
    Ok(())
}
