pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hub::HubHandle;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: HubHandle,
}

impl AppState {
    /// Build the state and start the hub task on the current runtime.
    pub fn new(config: Config) -> Self {
        let hub = HubHandle::spawn(config.hub_queue_capacity);
        Self {
            config: Arc::new(config),
            hub,
        }
    }
}
