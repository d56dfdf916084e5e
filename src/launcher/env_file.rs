//! Environment-definition file loading.

use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Key/value pairs read from a dotenv-style file, in file order.
///
/// The pairs are kept aside instead of being written into the process
/// environment, so the launcher can hand them to the child only.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    vars: Vec<(String, String)>,
}

impl EnvFile {
    /// Parse the file at `path`.
    ///
    /// Supports the usual dotenv syntax: `#` comments, blank lines, an
    /// optional `export` prefix, single or double quotes, and `${VAR}`
    /// substitution against earlier lines and the process environment.
    ///
    /// # Errors
    ///
    /// - `EnvFileMissing` if the file does not exist
    /// - `EnvFile` if a line cannot be parsed
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let wrap = |source: dotenvy::Error| {
            if source.not_found() {
                AppError::EnvFileMissing(path.to_path_buf())
            } else {
                AppError::EnvFile {
                    path: path.to_path_buf(),
                    source,
                }
            }
        };

        let mut vars = Vec::new();
        for item in dotenvy::from_path_iter(path).map_err(wrap)? {
            vars.push(item.map_err(wrap)?);
        }

        tracing::debug!(path = %path.display(), count = vars.len(), "Environment file loaded");
        Ok(Self {
            path: path.to_path_buf(),
            vars,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// Value of `key`; a key defined twice resolves to its last definition.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
