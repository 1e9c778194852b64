/// Hub server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Pending payloads a connection may have queued before the hub drops it.
    pub outbound_queue_capacity: usize,
    /// Requests that may wait for the hub before submitters are made to wait.
    pub hub_queue_capacity: usize,
}

const DEFAULT_PORT: u16 = 12345;
const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
const DEFAULT_HUB_QUEUE_CAPACITY: usize = 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            hub_queue_capacity: DEFAULT_HUB_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; missing or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            outbound_queue_capacity: capacity(var("OUTBOUND_QUEUE_CAPACITY"))
                .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAPACITY),
            hub_queue_capacity: capacity(var("HUB_QUEUE_CAPACITY"))
                .unwrap_or(DEFAULT_HUB_QUEUE_CAPACITY),
        }
    }
}

/// Channel capacities must be at least one.
fn capacity(value: Option<String>) -> Option<usize> {
    value.and_then(|v| v.parse().ok()).filter(|n| *n > 0)
}
