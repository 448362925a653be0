pub mod config_manager;
pub mod engine;
pub mod filters;
pub mod persistent_file;
pub mod resources;
pub mod scaledown;
pub mod scaleup;
pub mod util;
pub mod worker_manager;

pub use config_manager::ConfigManager;
pub use engine::Engine;
pub use persistent_file::{ConfigMapFile, FsFile, PersistentFile};
pub use util::Error;
pub use worker_manager::WorkerManager;
