//! Configuration for the five named constants in the external interface:
//! `STORAGE_ROOT`, `INGEST_DIR`, `TEMP_DIR`, `CHUNK_SIZE`, `FIELD_PRINT_LEN`.
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/duoq/config.toml` (user defaults)
//! 2. `.duoq.toml` / `duoq.toml` in the project root (project overrides)
//!
//! Explicit construction (what tests use almost exclusively) overrides both.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Values layered in from `duoq.toml`. Every field is optional so a partial
/// file only overrides what it mentions.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage_root: Option<PathBuf>,
    ingest_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    chunk_size: Option<usize>,
    field_print_len: Option<usize>,
}

impl ConfigFile {
    fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read config {}: {e}", path.display());
                return None;
            }
        };
        match toml::from_str::<Self>(&content) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!("failed to parse config {}: {e}", path.display());
                None
            }
        }
    }

    fn override_with(self, other: Self) -> Self {
        ConfigFile {
            storage_root: other.storage_root.or(self.storage_root),
            ingest_dir: other.ingest_dir.or(self.ingest_dir),
            temp_dir: other.temp_dir.or(self.temp_dir),
            chunk_size: other.chunk_size.or(self.chunk_size),
            field_print_len: other.field_print_len.or(self.field_print_len),
        }
    }
}

/// Engine configuration: where tables live, where loads read from, where
/// the sort scratch space is, and the chunking/fan-in and print-width
/// constants.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub storage_root: PathBuf,
    pub ingest_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub chunk_size: usize,
    pub field_print_len: usize,
}

impl EngineConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 100;
    pub const MIN_FIELD_PRINT_LEN: usize = 6;

    pub fn relational_root(&self) -> PathBuf {
        self.storage_root.join("Relational")
    }

    pub fn document_root(&self) -> PathBuf {
        self.storage_root.join("Document")
    }

    /// Loads configuration from the user and project config files, layered
    /// over built-in defaults rooted at `project_root`.
    pub fn load(project_root: &Path) -> Self {
        let defaults = ConfigFile {
            storage_root: Some(project_root.join("Storage")),
            ingest_dir: Some(project_root.join("ToBeLoaded")),
            temp_dir: Some(project_root.join("Temp")),
            chunk_size: Some(Self::DEFAULT_CHUNK_SIZE),
            field_print_len: Some(Self::MIN_FIELD_PRINT_LEN),
        };

        let user_config = dirs::config_dir()
            .map(|d| d.join("duoq/config.toml"))
            .and_then(|p| ConfigFile::load_file(&p))
            .unwrap_or_default();

        let project_config = ConfigFile::load_file(&project_root.join(".duoq.toml"))
            .or_else(|| ConfigFile::load_file(&project_root.join("duoq.toml")))
            .unwrap_or_default();

        let merged = defaults.override_with(user_config).override_with(project_config);
        let config = EngineConfig {
            storage_root: merged.storage_root.unwrap(),
            ingest_dir: merged.ingest_dir.unwrap(),
            temp_dir: merged.temp_dir.unwrap(),
            chunk_size: merged.chunk_size.unwrap().max(1),
            field_print_len: merged.field_print_len.unwrap().max(Self::MIN_FIELD_PRINT_LEN),
        };
        tracing::debug!(
            storage_root = %config.storage_root.display(),
            chunk_size = config.chunk_size,
            "effective engine config"
        );
        config
    }

    /// Builds a config rooted entirely under `root`, for tests and other
    /// callers that want an isolated, self-contained workspace rather than
    /// the layered user/project lookup.
    pub fn rooted_at(root: &Path, chunk_size: usize) -> Self {
        EngineConfig {
            storage_root: root.join("Storage"),
            ingest_dir: root.join("ToBeLoaded"),
            temp_dir: root.join("Temp"),
            chunk_size: chunk_size.max(1),
            field_print_len: Self::MIN_FIELD_PRINT_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_uses_defaults_when_no_files_present() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path());
        assert_eq!(config.chunk_size, EngineConfig::DEFAULT_CHUNK_SIZE);
        assert_eq!(config.storage_root, dir.path().join("Storage"));
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".duoq.toml"), "chunk_size = 7\n").unwrap();
        let config = EngineConfig::load(dir.path());
        assert_eq!(config.chunk_size, 7);
    }

    #[test]
    fn rooted_at_is_self_contained() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::rooted_at(dir.path(), 2);
        assert_eq!(config.relational_root(), dir.path().join("Storage/Relational"));
        assert_eq!(config.chunk_size, 2);
    }
}
