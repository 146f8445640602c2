use clap::{Args, Parser, Subcommand};

pub mod migrate;
pub mod server;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Desk setup gallery with per-IP voting", long_about = None)]
pub struct AppCli {
    #[clap(subcommand)]
    pub command: Command,
    #[clap(flatten)]
    pub config: deskvote_core::config::Configuration,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Server(ServerCli),
    /// Apply pending database migrations and exit. Requires DATABASE_URL
    Migrate,
}

#[derive(Args, Debug)]
pub struct ServerCli {
    #[clap(long)]
    /// Do not apply database migrations on startup
    pub skip_migrations: bool,
}
