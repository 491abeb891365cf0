pub mod cli;
pub mod config;
pub mod daemon;
pub mod launcher;
pub mod registrar;

// re-export selected public API
pub use config::{Config, DatabaseConfig, load_config};
pub use launcher::TaskLauncher;
pub use registrar::Registrar;
