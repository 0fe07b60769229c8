use crate::action_log::{DEFAULT_APPEND_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::session::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_MAX_CLIENTS: usize = 8;
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACTION_LOG: &str = "player_log.csv";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Clients silent for longer than this are dropped
    pub client_timeout: Duration,
    /// CSV action log location. None disables action logging.
    pub action_log: Option<PathBuf>,
    pub log_max_attempts: u32,
    pub log_retry_backoff: Duration,
    /// Single append attempts running longer than this count as failed
    pub log_append_timeout: Duration,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            action_log: Some(PathBuf::from(DEFAULT_ACTION_LOG)),
            log_max_attempts: DEFAULT_MAX_ATTEMPTS,
            log_retry_backoff: DEFAULT_RETRY_BACKOFF,
            log_append_timeout: DEFAULT_APPEND_TIMEOUT,
            session: SessionConfig::default(),
        }
    }
}
