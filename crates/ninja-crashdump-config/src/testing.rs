//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - An isolated dump directory per test
//! - A config pointing at that directory
//!
//! # Usage
//!
//! ```ignore
//! use ninja_crashdump_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     // env.dump_dir is private to this test
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with its own dump directory
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    temp_dir: TempDir,
    /// Directory dumps are written to
    pub dump_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let dump_dir = temp_dir.path().join("dumps");
        std::fs::create_dir_all(&dump_dir)?;

        Ok(Self {
            temp_dir,
            dump_dir,
            test_id,
        })
    }

    /// Root of the temporary tree
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path a dump for `pid` lands at inside this environment
    pub fn dump_path_for(&self, pid: u32) -> PathBuf {
        self.dump_dir.join(format!("ninja_crash_dump_{}.dmp", pid))
    }

    /// Create a file with content relative to the dump directory
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.dump_dir.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Config whose dumps go to this environment
    pub fn config(&self) -> crate::Config {
        let mut cfg = crate::Config::default();
        cfg.dump.directory = Some(self.dump_dir.clone());
        cfg
    }

    /// Environment variables that point a spawned process at this environment
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![(
            crate::ENV_DIR.to_string(),
            self.dump_dir.to_string_lossy().into_owned(),
        )]
    }

    /// Number of files currently in the dump directory
    pub fn dump_count(&self) -> usize {
        std::fs::read_dir(&self.dump_dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.dump_dir.exists());
        assert_eq!(env.dump_count(), 0);
    }

    #[test]
    fn test_environment_has_unique_dirs() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.dump_dir, env2.dump_dir);
        assert_ne!(env1.test_id, env2.test_id);
    }

    #[test]
    fn test_create_file() {
        let env = TestEnvironment::new().unwrap();
        let path = env.create_file("stale.dmp", b"sentinel").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"sentinel");
        assert_eq!(env.dump_count(), 1);
    }

    #[test]
    fn test_config_and_env_point_at_dump_dir() {
        let env = TestEnvironment::new().unwrap();
        assert_eq!(env.config().dump.directory.as_deref(), Some(env.dump_dir.as_path()));
        assert!(env.env_vars().iter().any(|(k, _)| k == crate::ENV_DIR));
        assert!(env
            .dump_path_for(42)
            .ends_with("ninja_crash_dump_42.dmp"));
    }
}
