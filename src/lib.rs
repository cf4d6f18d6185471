// Warden - service supervision engine with host metrics

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod process;
pub mod reconcile;
pub mod registry;
pub mod store;

pub use config::{ServiceConfig, WardenSettings};
pub use daemon::Daemon;
pub use error::{Result, WardenError};
