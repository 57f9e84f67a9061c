use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::poll::{PollPolicy, DEFAULT_ATTEMPTS, DEFAULT_INTERVAL};
use crate::resources::ResourceDir;

pub const DEFAULT_SETTINGS_FILE: &str = "dataspec.toml";

/// SQL flavour, used where generated SQL differs between engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    H2,
    Oracle,
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "h2" => Ok(Dialect::H2),
            "oracle" => Ok(Dialect::Oracle),
            other => Err(Error::config(format!("Unknown database dialect {other:?}."))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::H2 => "h2",
            Dialect::Oracle => "oracle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSettings {
    pub driver: String,
    pub url: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub dialect: Dialect,
}

impl DatabaseSettings {
    /// A SQLite database at `url` (a file path or `:memory:`).
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self {
            driver: "sqlite".to_string(),
            url: url.into(),
            user: String::new(),
            password: String::new(),
            schema: "main".to_string(),
            dialect: Dialect::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            attempts: self.attempts,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub poll: PollSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplateSettings>,
}

/// The file as written; every database key is optional until validated.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    database: DatabaseFile,
    #[serde(default)]
    poll: PollSettings,
    templates: Option<TemplateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseFile {
    driver: Option<String>,
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    schema: Option<String>,
    dialect: Option<String>,
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value.ok_or_else(|| Error::config(format!("Database {what} is required.")))
}

impl TryFrom<SettingsFile> for Settings {
    type Error = Error;

    fn try_from(file: SettingsFile) -> Result<Self> {
        let db = file.database;
        let database = DatabaseSettings {
            driver: required(db.driver, "driver")?,
            url: required(db.url, "URL")?,
            user: required(db.user, "user name")?,
            password: required(db.password, "password")?,
            schema: required(db.schema, "schema")?,
            dialect: required(db.dialect, "dialect")?.parse()?,
        };
        Ok(Settings {
            database,
            poll: file.poll,
            templates: file.templates,
        })
    }
}

impl Settings {
    pub fn new(database: DatabaseSettings) -> Self {
        Self {
            database,
            poll: PollSettings::default(),
            templates: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(text)?;
        file.try_into()
    }

    /// Load settings from a file. A relative template directory is resolved
    /// against the directory holding the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            let expected_at = std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf());
            return Err(Error::SettingsNotFound {
                path: path.to_path_buf(),
                expected_at,
            });
        }
        let content = fs::read_to_string(path)?;
        let mut settings = Self::parse(&content)?;
        if let (Some(templates), Some(base)) = (settings.templates.as_mut(), path.parent()) {
            if templates.dir.is_relative() {
                templates.dir = base.join(&templates.dir);
            }
        }
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Look for the settings file in `directory` and its ancestors.
    pub fn find(directory: impl AsRef<Path>) -> Option<Result<Self>> {
        let found = directory
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(DEFAULT_SETTINGS_FILE))
            .find(|candidate| {
                log::debug!("Looking for settings at {}", candidate.display());
                candidate.is_file()
            })?;
        Some(Self::load(found))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))?;
        fs::write(path, content)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll.policy()
    }

    /// Where document templates live; the current directory if unset.
    pub fn resources(&self) -> ResourceDir {
        match &self.templates {
            Some(t) => ResourceDir::new(&t.dir),
            None => ResourceDir::new("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::create_file;

    const FULL: &str = r#"
        [database]
        driver = "sqlite"
        url = "feature-tests.db"
        user = "sa"
        password = ""
        schema = "main"
        dialect = "sqlite"

        [poll]
        attempts = 3

        [templates]
        dir = "templates"
    "#;

    #[test]
    fn parses_full_settings() {
        let settings = Settings::parse(FULL).unwrap();
        assert_eq!(settings.database.url, "feature-tests.db");
        assert_eq!(settings.database.password, "");
        assert_eq!(settings.database.dialect, Dialect::Sqlite);
        assert_eq!(
            settings.poll_policy(),
            PollPolicy {
                attempts: 3,
                interval: Duration::from_millis(200)
            }
        );
    }

    #[test]
    fn poll_section_is_optional() {
        let settings = Settings::new(DatabaseSettings::sqlite(":memory:"));
        assert_eq!(settings.poll_policy(), PollPolicy::default());
    }

    #[test]
    fn missing_keys_are_named() {
        let err = Settings::parse("[database]\ndriver = \"sqlite\"").unwrap_err();
        assert_eq!(err.error_type(), "config_error");
        assert_eq!(
            err.to_string(),
            "configuration error: Database URL is required."
        );

        let err = Settings::parse(
            "[database]\ndriver = \"sqlite\"\nurl = \"x\"\nuser = \"sa\"\npassword = \"\"\nschema = \"main\"",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Database dialect is required."));
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let text = FULL.replace("dialect = \"sqlite\"", "dialect = \"db2\"");
        let err = Settings::parse(&text).unwrap_err();
        assert!(err.to_string().contains("Unknown database dialect"));
    }

    #[test]
    fn load_resolves_template_dir_and_find_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        create_file(tmp.path(), DEFAULT_SETTINGS_FILE, FULL.as_bytes());
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let settings = Settings::find(&nested).unwrap().unwrap();
        assert_eq!(
            settings.resources().root(),
            tmp.path().join("templates").as_path()
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DEFAULT_SETTINGS_FILE);
        let original = Settings::new(DatabaseSettings::sqlite("db.sqlite"));
        original.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), original);
    }

    #[test]
    fn missing_file_reports_where_it_was_expected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Settings::load(tmp.path().join("nope.toml")).unwrap_err();
        assert_eq!(err.error_type(), "settings_not_found");
        assert!(err.to_string().contains("nope.toml"));
    }
}
