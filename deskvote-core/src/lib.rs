#[macro_use]
extern crate tracing;

use deskvote_dependencies::reqwest::{self, header::HeaderMap};

use crate::config::Configuration;
use crate::error::DeskResult;

pub mod blob;
pub mod config;
pub mod error;
pub mod media;
pub mod rate_limit;
pub mod request_helper;
pub mod state;
pub mod upload;

pub fn http_client(config: &Configuration) -> DeskResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_millis(500))
        .timeout(config.upload_timeout())
        .redirect(reqwest::redirect::Policy::none());
    Ok(client.default_headers(common_headers()?).build()?)
}

fn common_headers() -> DeskResult<HeaderMap> {
    let mut hm = HeaderMap::new();
    let user_agent = format!("{} v{}", package_name(), package_version());
    trace!("new user agent with value {}", user_agent);
    hm.append(
        reqwest::header::USER_AGENT,
        user_agent
            .parse()
            .map_err(|e| error::DeskError::Other(format!("invalid user agent: {e}")))?,
    );
    Ok(hm)
}

pub fn package_full() -> String {
    format!("{} v{}", package_name(), package_version())
}

pub const fn package_name() -> &'static str {
    const NAME: &str = env!("CARGO_PKG_NAME");
    NAME
}

pub const fn package_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    VERSION
}
