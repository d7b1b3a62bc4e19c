//! Connection pool setup.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::Result;

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of open connections.
    pub max_size: usize,
    /// How long establishing a new connection may take.
    pub connect_timeout: Duration,
    /// How long a caller waits for a free connection.
    pub wait_timeout: Duration,
    /// Server-side `statement_timeout` set on every connection.
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            connect_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(60),
        }
    }
}

/// Build a pool for `url`. No connection is opened until first use.
pub fn build_pool(url: &str, settings: &PoolSettings) -> Result<Pool> {
    let mut config: tokio_postgres::Config = url.parse()?;
    config.connect_timeout(settings.connect_timeout);
    config.options(&format!(
        "-c statement_timeout={}",
        settings.statement_timeout.as_millis()
    ));

    let manager = Manager::from_config(
        config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager)
        .max_size(settings.max_size)
        .wait_timeout(Some(settings.wait_timeout))
        .create_timeout(Some(settings.connect_timeout))
        .runtime(Runtime::Tokio1)
        .build()?;
    Ok(pool)
}

/// Hide the password of a connection URL before it is logged.
pub fn mask_password(url: &str) -> String {
    if let Some(start) = url.find("://")
        && let Some(at) = url.rfind('@')
        && at > start
    {
        let prefix = &url[..start + 3];
        let suffix = &url[at..];
        if let Some(colon) = url[start + 3..at].find(':') {
            let user = &url[start + 3..start + 3 + colon];
            return format!("{prefix}{user}:***{suffix}");
        }
    }
    url.to_string()
}
