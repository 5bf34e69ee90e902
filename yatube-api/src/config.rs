use serde::Deserialize;
use std::{
    fmt::{Debug, Formatter},
    net::IpAddr,
    num::NonZeroUsize,
    path::PathBuf,
};
use yatube_common::{
    snowflake::{ProcessId, WorkerId},
    util::{NonPositiveDurationError, PositiveDuration},
};

const fn default_page_cache_ttl_seconds() -> i64 {
    20
}

const fn default_page_cache_capacity() -> NonZeroUsize {
    match NonZeroUsize::new(256) {
        Some(capacity) => capacity,
        None => NonZeroUsize::MIN,
    }
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without it, everything is kept in memory and lost on exit.
    pub database_url: Option<String>,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    #[serde(default = "default_page_cache_ttl_seconds")]
    pub page_cache_ttl_seconds: i64,
    /// Upper bound on cached pages; each distinct `page` query value takes one entry.
    #[serde(default = "default_page_cache_capacity")]
    pub page_cache_capacity: NonZeroUsize,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Enables `/admin` when set.
    pub admin_token: Option<String>,
}

impl Env {
    pub fn page_cache_ttl(&self) -> Result<PositiveDuration, NonPositiveDurationError> {
        PositiveDuration::from_seconds(self.page_cache_ttl_seconds)
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("worker_id", &self.worker_id)
            .field("process_id", &self.process_id)
            .field("page_cache_ttl_seconds", &self.page_cache_ttl_seconds)
            .field("page_cache_capacity", &self.page_cache_capacity)
            .field("media_root", &self.media_root)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
