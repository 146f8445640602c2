use deskvote_dependencies::{better_panic, kankyo, tracing_subscriber};
use tracing_subscriber::EnvFilter;

const QUIET_MODULES: &[&str] = &["sqlx=warn", "sqlx::query=warn", "hyper=warn"];

pub fn logging() {
    better_panic::install();
    // .env has to be in the environment before the configuration is parsed
    let dotenv = kankyo::load(false);
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in QUIET_MODULES {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("invalid log directive {}: {}", directive, e),
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Err(e) = dotenv {
        info!("couldn't load .env file: {}, this is probably fine", e);
    }
}
