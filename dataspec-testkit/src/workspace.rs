//! Temporary workspaces with a SQLite database and a settings file.

use dataspec::config::{PollSettings, TemplateSettings};
use dataspec::{Database, DatabaseSettings, Settings, SqliteSession, DEFAULT_SETTINGS_FILE};
use fs_err as fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the database file inside a workspace.
pub const DATABASE_FILE: &str = "test.db";

/// Name of the template directory inside a workspace.
pub const TEMPLATES_DIR: &str = "templates";

/// A temporary workspace holding a SQLite database, a `dataspec.toml`
/// pointing at it, and a template directory.
///
/// Polling is configured short (5 attempts, 10 ms apart) so that failing
/// waits finish quickly. The workspace is removed when dropped.
pub struct TestWorkspace {
    /// Temporary directory containing the workspace.
    _temp: TempDir,
    /// Path to the workspace root.
    root: PathBuf,
    settings: Settings,
}

impl TestWorkspace {
    /// Create a workspace and write its settings file.
    pub fn new() -> Result<Self, TestWorkspaceError> {
        Self::with_poll(PollSettings {
            attempts: 5,
            interval_ms: 10,
        })
    }

    /// Create a workspace with a specific poll budget.
    pub fn with_poll(poll: PollSettings) -> Result<Self, TestWorkspaceError> {
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join(TEMPLATES_DIR))?;

        let mut settings = Settings::new(DatabaseSettings::sqlite(
            root.join(DATABASE_FILE).to_string_lossy(),
        ));
        settings.poll = poll;
        settings.templates = Some(TemplateSettings {
            dir: root.join(TEMPLATES_DIR),
        });
        settings.save(root.join(DEFAULT_SETTINGS_FILE))?;

        Ok(Self {
            _temp: temp,
            root,
            settings,
        })
    }

    /// Get the workspace root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The settings written to the workspace.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the settings file path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(DEFAULT_SETTINGS_FILE)
    }

    /// Get the database file path.
    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    /// Get the absolute path for a relative path.
    pub fn path(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path)
    }

    /// Write a file to the workspace.
    pub fn write_file(&self, rel_path: &str, contents: &[u8]) -> Result<PathBuf, TestWorkspaceError> {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write a document template under the template directory.
    pub fn write_template(&self, name: &str, text: &str) -> Result<PathBuf, TestWorkspaceError> {
        self.write_file(&format!("{TEMPLATES_DIR}/{name}"), text.as_bytes())
    }

    /// Read a file from the workspace.
    pub fn read_file(&self, rel_path: &str) -> Result<Vec<u8>, TestWorkspaceError> {
        Ok(fs::read(self.root.join(rel_path))?)
    }

    /// Check if a file exists in the workspace.
    pub fn file_exists(&self, rel_path: &str) -> bool {
        self.root.join(rel_path).exists()
    }

    /// Open the workspace database with the workspace settings.
    pub fn open(&self) -> Result<Database<SqliteSession>, TestWorkspaceError> {
        Ok(Database::open(&self.settings)?)
    }

    /// Run a SQL script against the workspace database.
    pub fn execute(&self, sql: &str) -> Result<(), TestWorkspaceError> {
        let db = self.open()?;
        db.session().execute_batch(sql)?;
        db.close()?;
        Ok(())
    }
}

/// Error type for TestWorkspace operations.
#[derive(Debug)]
pub enum TestWorkspaceError {
    /// I/O error.
    Io(std::io::Error),
    /// Settings or database error.
    Dataspec(dataspec::Error),
}

impl std::fmt::Display for TestWorkspaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestWorkspaceError::Io(e) => write!(f, "I/O error: {}", e),
            TestWorkspaceError::Dataspec(e) => write!(f, "dataspec error: {}", e),
        }
    }
}

impl std::error::Error for TestWorkspaceError {}

impl From<std::io::Error> for TestWorkspaceError {
    fn from(e: std::io::Error) -> Self {
        TestWorkspaceError::Io(e)
    }
}

impl From<dataspec::Error> for TestWorkspaceError {
    fn from(e: dataspec::Error) -> Self {
        TestWorkspaceError::Dataspec(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workspace() {
        let ws = TestWorkspace::new().unwrap();
        assert!(ws.root().exists());
        assert!(ws.config_path().is_file());
        assert!(ws.path(TEMPLATES_DIR).is_dir());
    }

    #[test]
    fn test_settings_file_round_trips() {
        let ws = TestWorkspace::new().unwrap();
        let loaded = Settings::load(ws.config_path()).unwrap();
        assert_eq!(&loaded, ws.settings());
        assert_eq!(loaded.poll.attempts, 5);
    }

    #[test]
    fn test_write_read_file() {
        let ws = TestWorkspace::new().unwrap();
        ws.write_file("data/customers.txt", b"| id |\n| 1 |\n").unwrap();
        assert!(ws.file_exists("data/customers.txt"));
        assert_eq!(ws.read_file("data/customers.txt").unwrap(), b"| id |\n| 1 |\n");
    }

    #[test]
    fn test_execute_creates_database() {
        let ws = TestWorkspace::new().unwrap();
        ws.execute("create table t (id integer)").unwrap();
        assert!(ws.database_path().is_file());
        assert_eq!(ws.open().unwrap().select_count("t").unwrap(), 0);
    }
}
