//! Named resources (document templates, data tables) under a root directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDir {
    root: PathBuf,
}

impl ResourceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Read a resource as text.
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.path_of(name);
        log::debug!("Loading resource {}", path.display());
        fs::read_to_string(&path).map_err(|e| {
            let hint = match e.kind() {
                ErrorKind::NotFound => "Does it exist?",
                ErrorKind::PermissionDenied => "Do I have permission to read it?",
                _ => "Is it readable text?",
            };
            Error::Resource {
                name: name.to_string(),
                hint,
            }
        })
    }

    /// Load a document template.
    pub fn template(&self, name: &str) -> Result<crate::document::Template> {
        Ok(crate::document::Template::new(name, self.load(name)?))
    }
}
