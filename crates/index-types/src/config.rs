//! Configuration loading for the artifact index tools.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/artifact-index/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::IndexError;

/// Default number of incremental chunks advertised and kept on disk.
pub const DEFAULT_MAX_CHUNKS: usize = 30;

/// Default file name prefix of published index files.
pub const DEFAULT_FILE_PREFIX: &str = "artifact-index";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the live (Tantivy) index directory
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Identity written into descriptor records and properties
    #[serde(default = "default_index_id")]
    pub index_id: String,

    /// Directory published files are written to
    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    /// Prefix of `<prefix>.gz`, `<prefix>.<n>.gz` and `<prefix>.properties`
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Retention window for incremental chunks
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Write an incremental chunk when records changed since the last publish
    #[serde(default = "default_true")]
    pub create_incremental_chunks: bool,

    /// Write `.sha1`/`.md5` sidecars next to published files
    #[serde(default)]
    pub create_checksum_files: bool,

    /// Read prior publish state from the target directory instead of the index
    #[serde(default)]
    pub use_target_properties: bool,

    /// Memory budget for the index writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_index_path() -> String {
    ProjectDirs::from("", "", "artifact-index")
        .map(|p| p.data_local_dir().join("index"))
        .unwrap_or_else(|| PathBuf::from("./index"))
        .to_string_lossy()
        .to_string()
}

fn default_index_id() -> String {
    "local".to_string()
}

fn default_target_dir() -> String {
    ProjectDirs::from("", "", "artifact-index")
        .map(|p| p.data_local_dir().join("publish"))
        .unwrap_or_else(|| PathBuf::from("./publish"))
        .to_string_lossy()
        .to_string()
}

fn default_file_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

fn default_true() -> bool {
    true
}

fn default_writer_memory_mb() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            index_id: default_index_id(),
            target_dir: default_target_dir(),
            file_prefix: default_file_prefix(),
            max_chunks: default_max_chunks(),
            create_incremental_chunks: true,
            create_checksum_files: false,
            use_target_properties: false,
            writer_memory_mb: default_writer_memory_mb(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/artifact-index/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (ARTIFACT_INDEX_*, nested with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, IndexError> {
        let config_dir = ProjectDirs::from("", "", "artifact-index")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("index_path", default_index_path())
            .map_err(|e| IndexError::Config(e.to_string()))?
            .set_default("index_id", default_index_id())
            .map_err(|e| IndexError::Config(e.to_string()))?
            .set_default("target_dir", default_target_dir())
            .map_err(|e| IndexError::Config(e.to_string()))?
            .set_default("file_prefix", default_file_prefix())
            .map_err(|e| IndexError::Config(e.to_string()))?
            .set_default("max_chunks", default_max_chunks() as i64)
            .map_err(|e| IndexError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| IndexError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ARTIFACT_INDEX_MAX_CHUNKS, ARTIFACT_INDEX_TARGET_DIR, ...
        builder = builder.add_source(
            Environment::with_prefix("ARTIFACT_INDEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| IndexError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(IndexError::Config(format!(
                "file_prefix must be a plain file name, got {:?}",
                self.file_prefix
            )));
        }
        if self.max_chunks == 0 {
            return Err(IndexError::Config("max_chunks must be > 0".to_string()));
        }
        Ok(())
    }

    /// Index path with a leading `~/` expanded
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }

    /// Target directory with a leading `~/` expanded
    pub fn expanded_target_dir(&self) -> PathBuf {
        expand_home(&self.target_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_chunks, 30);
        assert_eq!(settings.file_prefix, "artifact-index");
        assert!(settings.create_incremental_chunks);
        assert!(!settings.create_checksum_files);
        assert!(!settings.use_target_properties);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "max_chunks = 5\nfile_prefix = \"central\"\ncreate_checksum_files = true\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.max_chunks, 5);
        assert_eq!(settings.file_prefix, "central");
        assert!(settings.create_checksum_files);
        assert!(settings.create_incremental_chunks);
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.max_chunks = 0;
        assert!(settings.validate().is_err());

        settings.max_chunks = 3;
        settings.file_prefix = "a/b".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        let expanded = expand_home("~/idx");
        assert!(expanded.ends_with("idx"));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.max_chunks, settings.max_chunks);
        assert_eq!(decoded.index_id, settings.index_id);
    }
}
