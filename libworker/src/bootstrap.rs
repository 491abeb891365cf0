use anyhow::Result;
use async_trait::async_trait;
use log::debug;

/// Seam for one-time database initialization.
///
/// Runs once per supervisor start, before the first reconciliation. A
/// failure here is fatal to the supervisor; whoever launched it applies the
/// restart policy.
#[async_trait]
pub trait Bootstrap: Send + Sync {
    async fn init_database(&self, dbname: &str) -> Result<()>;
}

/// Bootstrap for databases that are already initialized.
#[derive(Debug, Default)]
pub struct NullBootstrap;

impl NullBootstrap {
    pub fn new() -> Self {
        NullBootstrap
    }
}

#[async_trait]
impl Bootstrap for NullBootstrap {
    async fn init_database(&self, dbname: &str) -> Result<()> {
        debug!("database {dbname:?} needs no initialization (null implementation)");
        Ok(())
    }
}
