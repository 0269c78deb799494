//! Server-side configuration.
//!
//! Reads `/etc/openerp/<name>.toml`, or any path given with `-c`.

use std::path::{Path, PathBuf};

use receiving::ReceivingConfig;
use serde::Deserialize;

/// Directory searched for bare context names.
const CONFIG_DIR: &str = "/etc/openerp";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub receiving: ReceivingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,

    /// Explicit database file; defaults to `{data_dir}/data.sqlite`.
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

impl ServerConfig {
    /// Resolve `-c` to a file path.
    ///
    /// Anything containing `/` or `.` is taken as a path; a bare name maps
    /// to `/etc/openerp/<name>.toml`.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        config.verify()?;
        Ok(config)
    }

    fn verify(&self) -> anyhow::Result<()> {
        if self.storage.data_dir.is_empty() {
            anyhow::bail!("Storage data_dir is empty in configuration.");
        }
        Ok(())
    }

    /// Storage settings in the shape the storage layer expects.
    pub fn service_config(&self, listen: &str) -> openerp_core::ServiceConfig {
        openerp_core::ServiceConfig {
            data_dir: Some(PathBuf::from(&self.storage.data_dir)),
            sqlite_path: self.storage.sqlite_path.as_ref().map(PathBuf::from),
            listen: listen.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_resolves_under_etc() {
        assert_eq!(
            ServerConfig::resolve_path("warehouse"),
            PathBuf::from("/etc/openerp/warehouse.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./dev.toml"),
            PathBuf::from("./dev.toml")
        );
    }

    #[test]
    fn load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wh.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/var/lib/openerp\"\n\n[receiving]\npack_prefix = \"RCV\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/openerp");
        assert_eq!(config.receiving.pack_prefix, "RCV");

        let svc = config.service_config("127.0.0.1:9000");
        assert_eq!(
            svc.resolve_sqlite_path(),
            PathBuf::from("/var/lib/openerp/data.sqlite")
        );
        assert_eq!(svc.listen, "127.0.0.1:9000");
    }

    #[test]
    fn receiving_section_is_optional() {
        let config: ServerConfig = toml::from_str("[storage]\ndata_dir = \"/tmp/x\"\n").unwrap();
        assert_eq!(config.receiving.pack_prefix, "PKG");
        assert!(config.storage.sqlite_path.is_none());
    }

    #[test]
    fn empty_data_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"\"\n").unwrap();
        assert!(ServerConfig::load(&path).is_err());
        assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
