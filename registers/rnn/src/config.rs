// Licensed under the Apache-2.0 license

//! Configuration for loading databases and rendering decoded output.
//!
//! This module provides [`SearchPath`] which controls where database files
//! and their validation schemas are looked up, [`LoadConfig`] which bundles
//! the loader settings, and [`Colors`] which controls how decoded names and
//! values are highlighted.

use crate::tree::Element;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable holding the colon-separated database search path.
pub const RNN_PATH_ENV: &str = "RNN_PATH";

/// Search path used when [`RNN_PATH_ENV`] is unset.
pub const DEFAULT_RNN_PATH: &str = "/usr/share/rnn:/usr/local/share/rnn";

/// Colon-separated list of directories searched for relative file names.
///
/// # Example
///
/// ```
/// use registers_rnn::config::SearchPath;
///
/// let path = SearchPath::new("/opt/db:/usr/share/rnn");
/// assert_eq!(path.dirs().len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(DEFAULT_RNN_PATH)
    }
}

impl SearchPath {
    /// Build a search path from a colon-separated list. Empty entries are
    /// skipped.
    pub fn new(path: &str) -> Self {
        Self {
            dirs: path
                .split(':')
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }

    /// Read [`RNN_PATH_ENV`], falling back to [`DEFAULT_RNN_PATH`].
    pub fn from_env() -> Self {
        match std::env::var(RNN_PATH_ENV) {
            Ok(path) => Self::new(&path),
            Err(_) => Self::default(),
        }
    }

    /// Put a directory in front of the existing entries.
    pub fn prepend(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.insert(0, dir.into());
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Locate `name`. Absolute names are used as-is. Relative names with a
    /// directory part are tried as given first; then every directory is
    /// tried in order.
    pub fn find(&self, name: &Path) -> Option<PathBuf> {
        if name.is_absolute() {
            return name.is_file().then(|| name.to_path_buf());
        }
        let has_dir = name.parent().is_some_and(|p| !p.as_os_str().is_empty());
        if has_dir && name.is_file() {
            return Some(name.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Like [`SearchPath::find`] but also accepts a compressed `<name>.gz`.
    pub fn find_schema(&self, name: &Path) -> Option<PathBuf> {
        self.find(name).or_else(|| {
            let mut gz = name.as_os_str().to_os_string();
            gz.push(".gz");
            self.find(Path::new(&gz))
        })
    }
}

/// External structural validation of a database document.
///
/// The loader locates the schema named by the root's `schemaLocation` and
/// hands it to the validator together with the parsed root element. An
/// `Err` is recorded as a soft, per-file failure.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, schema: &Path, root: &Element) -> Result<(), String>;
}

/// Settings for [`crate::Loader`].
#[derive(Clone, Default)]
pub struct LoadConfig {
    pub search_path: SearchPath,
    /// Honour `schemaLocation` declarations.
    pub validate: bool,
    pub validator: Option<Arc<dyn SchemaValidator>>,
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("search_path", &self.search_path)
            .field("validate", &self.validate)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl LoadConfig {
    /// Search path from the environment, validation enabled.
    pub fn from_env() -> Self {
        Self {
            search_path: SearchPath::from_env(),
            validate: true,
            validator: None,
        }
    }

    pub fn with_search_path(mut self, search_path: SearchPath) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self.validate = true;
        self
    }
}

/// Escape sequences wrapped around the parts of decoded output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colors {
    pub reset: &'static str,
    /// Plain numbers.
    pub num: &'static str,
    /// Enum value names.
    pub eval: &'static str,
    /// Register and bitfield names.
    pub rname: &'static str,
    /// Set boolean flags.
    pub modifier: &'static str,
    /// Anything that didn't decode cleanly.
    pub err: &'static str,
}

impl Default for Colors {
    fn default() -> Self {
        Self::none()
    }
}

impl Colors {
    /// Plain text output.
    pub const fn none() -> Self {
        Self {
            reset: "",
            num: "",
            eval: "",
            rname: "",
            modifier: "",
            err: "",
        }
    }

    /// ANSI terminal colors.
    pub const fn ansi() -> Self {
        Self {
            reset: "\x1b[0m",
            num: "\x1b[1;36m",
            eval: "\x1b[1;35m",
            rname: "\x1b[1;32m",
            modifier: "\x1b[1;33m",
            err: "\x1b[1;31m",
        }
    }
}
