use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use common::{ConnectionRow, DatabaseId, TimelineId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    // local node identity
    pub sysid: u64,
    pub timeline: TimelineId,
    // capacity of the shared worker table
    pub max_workers: usize,
    #[serde(default = "default_wake_interval_secs")]
    pub wake_interval_secs: u64,
    // replicated databases on this node
    pub databases: Vec<DatabaseConfig>,
    // seed rows for the connections table
    #[serde(default)]
    pub connections: Vec<ConnectionRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub dboid: DatabaseId,
}

fn default_wake_interval_secs() -> u64 {
    180
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let cfg: Config = serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn parses_a_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "sysid: 100\n\
             timeline: 1\n\
             max_workers: 16\n\
             wake_interval_secs: 30\n\
             databases:\n\
             - name: alpha\n  \
             dboid: 5\n\
             connections:\n\
             - sysid: \"100\"\n  \
             timeline: 1\n  \
             dboid: 5\n\
             - sysid: \"200\"\n  \
             timeline: 1\n  \
             dboid: 5\n"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.sysid, 100);
        assert_eq!(cfg.timeline, 1);
        assert_eq!(cfg.max_workers, 16);
        assert_eq!(cfg.wake_interval_secs, 30);
        assert_eq!(cfg.databases.len(), 1);
        assert_eq!(cfg.databases[0].name, "alpha");
        assert_eq!(cfg.connections.len(), 2);
    }

    #[test]
    fn wake_interval_defaults_when_absent() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "sysid: 100\ntimeline: 1\nmax_workers: 4\ndatabases: []\n"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.wake_interval_secs, 180);
        assert!(cfg.connections.is_empty());
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = load_config(Path::new("/nonexistent/rmrd.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rmrd.yaml"));
    }
}
