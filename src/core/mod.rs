pub mod archiver;
pub mod dumper;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod setup;

pub use archiver::FileArchiver;
pub use dumper::DatabaseDumper;
pub use error::BackupError;
pub use history::{RunHistory, RunRecord};
pub use orchestrator::{BackupOrchestrator, BackupRunResult};
pub use registry::{BackupConfiguration, ConfigRegistry};
pub use retention::{KeepMostRecent, RetentionManager, RetentionPolicy, RetentionReport};
pub use scheduler::{CronScheduler, Schedule};
