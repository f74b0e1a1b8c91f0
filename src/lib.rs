pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod report;
pub mod response;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

use config::DeployConfig;
use executor::CommandExecutor;

/// Read-only state shared by every request
pub struct AppState {
    pub config: DeployConfig,
    pub executor: CommandExecutor,
}

impl AppState {
    pub fn new(config: DeployConfig) -> Self {
        let executor = CommandExecutor::new(config.command_timeout);
        Self { config, executor }
    }
}

pub type SharedState = Arc<AppState>;
