//! Rebuildable HTTP session wrapper used by `PostPool`.
//!
//! `reqwest::Client` has no separately ownable connector handle to swap
//! underneath an existing session, so a rebuild here means constructing a
//! fresh `Client` (which gets its own internal `Arc`-shared connection
//! pool) instead.

use crate::config::PoolConfig;
use crate::error::Result;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:65.0) Gecko/20100101 Firefox/65.0";

/// Build a `reqwest::Client` with the fixed desktop User-Agent, total
/// timeout, and idle-connection cap used by the rest of this worker.
pub fn build_session(config: &PoolConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout)
        .pool_max_idle_per_host(config.connection_limit)
        .build()
        .map_err(Into::into)
}
