// Process module - Service process lifecycle and observed status

pub mod health;
pub mod output;
pub mod spawner;
mod supervisor;
mod types;

pub use health::{HealthChecker, HealthState};
pub use output::{OutputBuffer, OutputLine, OutputStream};
pub use spawner::{spawn_process, SpawnedProcess};
pub use supervisor::{ProcessSupervisor, SupervisorOptions};
pub use types::{LifecycleState, ProcessHandle, ServiceStatus, StartOutcome, StopOutcome};
