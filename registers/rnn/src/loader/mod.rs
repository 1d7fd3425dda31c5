// Licensed under the Apache-2.0 license

//! Loading register database files into a [`Database`].
//!
//! This module contains:
//! - [`Loader`], the entry point holding the [`LoadConfig`]
//! - `LoadSession`, the per-call state threaded through element parsing
//!
//! The implementation is split across submodules:
//! - `parse`: converting markup elements into database definitions
//!
//! A load call works on a staging copy of the database and only commits it
//! when no fatal error occurred, so a missing file never leaves a partially
//! extended database behind.

mod parse;

use crate::config::LoadConfig;
use crate::error::{Diagnostic, LoadError};
use crate::tree::{self, Attribute, Element};
use crate::types::*;
use crate::util::{parse_bool, parse_num};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Reads database files according to a [`LoadConfig`].
#[derive(Clone, Debug, Default)]
pub struct Loader {
    config: LoadConfig,
}

impl Loader {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Load `file` (and everything it imports) into `db`.
    ///
    /// Names are looked up on the configured search path; imports are also
    /// searched next to the importing file.
    /// Files already listed in [`Database::files`] are skipped.
    pub fn load(&self, db: &mut Database, file: impl AsRef<Path>) -> Result<(), LoadError> {
        let mut staging = db.clone();
        LoadSession::new(self, &mut staging).load_file(file.as_ref(), None)?;
        *db = staging;
        Ok(())
    }

    /// Load a document held in memory. `name` is recorded in
    /// [`Database::files`] and used in diagnostics.
    pub fn load_str(&self, db: &mut Database, name: &str, text: &str) -> Result<(), LoadError> {
        let mut staging = db.clone();
        {
            let mut session = LoadSession::new(self, &mut staging);
            let path = PathBuf::from(name);
            if session.db.files.contains(&path) {
                debug!("{name} already loaded, skipping");
                return Ok(());
            }
            session.db.files.push(path);
            let idx = session.db.files.len() - 1;
            session.load_text(idx, text)?;
        }
        *db = staging;
        Ok(())
    }
}

/// Mutable state of one load call.
pub(crate) struct LoadSession<'a> {
    loader: &'a Loader,
    db: &'a mut Database,
    /// File currently being parsed.
    file: FileIdx,
}

impl<'a> LoadSession<'a> {
    fn new(loader: &'a Loader, db: &'a mut Database) -> Self {
        Self {
            loader,
            db,
            file: 0,
        }
    }

    /// Find a file, trying `relative_to` first when given.
    fn locate(&self, name: &Path, relative_to: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = relative_to.filter(|_| name.is_relative()) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        self.loader.config.search_path.find(name)
    }

    fn current_dir(&self) -> Option<PathBuf> {
        self.db
            .files
            .get(self.file)
            .and_then(|f| f.parent())
            .map(Path::to_path_buf)
    }

    pub(crate) fn load_file(
        &mut self,
        name: &Path,
        relative_to: Option<&Path>,
    ) -> Result<(), LoadError> {
        let path = self
            .locate(name, relative_to)
            .ok_or_else(|| LoadError::FileNotFound(name.display().to_string()))?;
        if self.db.files.contains(&path) {
            debug!("{} already loaded, skipping", path.display());
            return Ok(());
        }
        self.db.files.push(path.clone());
        let idx = self.db.files.len() - 1;
        match std::fs::read_to_string(&path) {
            Ok(text) => self.load_text(idx, &text),
            Err(e) => {
                let saved = std::mem::replace(&mut self.file, idx);
                self.error(None, LoadError::MalformedDocument(e.to_string()));
                self.file = saved;
                Ok(())
            }
        }
    }

    fn load_text(&mut self, file: FileIdx, text: &str) -> Result<(), LoadError> {
        let saved = std::mem::replace(&mut self.file, file);
        let result = self.parse_document(text);
        self.file = saved;
        result
    }

    fn parse_document(&mut self, text: &str) -> Result<(), LoadError> {
        let roots = match tree::parse(text) {
            Ok(roots) => roots,
            Err(e) => {
                self.error(None, LoadError::MalformedDocument(e.to_string()));
                return Ok(());
            }
        };
        for root in &roots {
            if root.name != "database" {
                self.error(
                    Some(root.line),
                    LoadError::UnknownElementOrAttribute {
                        context: "document".into(),
                        name: root.name.clone(),
                        what: "top-level tag",
                    },
                );
                continue;
            }
            self.validate(root);
            for child in &root.children {
                if !self.try_top(child)? && !is_doc(child) {
                    self.wrong_tag(root, child);
                }
            }
        }
        Ok(())
    }

    /// Run external validation if the root declares a schema location.
    fn validate(&mut self, root: &Element) {
        if !self.loader.config.validate {
            return;
        }
        let Some(location) = root.attr_local("schemaLocation") else {
            return;
        };
        // "namespace location" pairs; only the location matters.
        let tokens: Vec<&str> = location.split_whitespace().collect();
        let Some(schema) = tokens.get(1).or(tokens.first()) else {
            return;
        };
        let schema = Path::new(schema);
        let local = self
            .current_dir()
            .map(|dir| dir.join(schema))
            .filter(|p| p.is_file());
        let found = local.or_else(|| self.loader.config.search_path.find_schema(schema));
        let Some(found) = found else {
            self.error(
                Some(root.line),
                LoadError::SchemaValidationFailed(format!(
                    "couldn't find schema {}",
                    schema.display()
                )),
            );
            return;
        };
        if let Some(validator) = &self.loader.config.validator {
            if let Err(msg) = validator.validate(&found, root) {
                self.error(Some(root.line), LoadError::SchemaValidationFailed(msg));
            }
        }
    }

    //=========================================================================
    // Diagnostics
    //=========================================================================

    fn error(&mut self, line: Option<u32>, error: LoadError) {
        let diag = Diagnostic {
            file: self.db.files.get(self.file).cloned(),
            line,
            error,
        };
        warn!("{diag}");
        self.db.diagnostics.push(diag);
        self.db.failed = true;
    }

    fn wrong_attr(&mut self, node: &Element, attr: &Attribute) {
        self.error(
            Some(node.line),
            LoadError::UnknownElementOrAttribute {
                context: node.name.clone(),
                name: attr.name.clone(),
                what: "attribute",
            },
        );
    }

    fn wrong_tag(&mut self, parent: &Element, child: &Element) {
        self.error(
            Some(child.line),
            LoadError::UnknownElementOrAttribute {
                context: parent.name.clone(),
                name: child.name.clone(),
                what: "tag",
            },
        );
    }

    fn missing(&mut self, node: &Element, attr: &str) {
        self.error(
            Some(node.line),
            LoadError::MissingRequiredAttribute {
                element: node.name.clone(),
                attr: attr.into(),
            },
        );
    }

    fn conflict(&mut self, node: &Element, kind: &'static str, name: &str, detail: &str) {
        self.error(
            Some(node.line),
            LoadError::DuplicateDefinitionConflict {
                kind,
                name: name.into(),
                detail: detail.into(),
            },
        );
    }

    //=========================================================================
    // Attribute values
    //=========================================================================

    fn loc(&self, node: &Element) -> SourceLoc {
        SourceLoc {
            file: self.file,
            line: node.line,
        }
    }

    /// Numeric attribute; malformed text is reported and reads as 0.
    fn num_attr(&mut self, node: &Element, attr: &Attribute) -> u64 {
        match parse_num(&attr.value) {
            Some(val) => val,
            None => {
                self.error(
                    Some(node.line),
                    LoadError::MalformedAttribute {
                        attr: attr.name.clone(),
                        value: attr.value.clone(),
                        expected: "numeric",
                    },
                );
                0
            }
        }
    }

    fn u32_attr(&mut self, node: &Element, attr: &Attribute) -> u32 {
        let val = self.num_attr(node, attr);
        u32::try_from(val).unwrap_or(u32::MAX)
    }

    fn bool_attr(&mut self, node: &Element, attr: &Attribute) -> bool {
        match parse_bool(&attr.value) {
            Some(val) => val,
            None => {
                self.error(
                    Some(node.line),
                    LoadError::MalformedAttribute {
                        attr: attr.name.clone(),
                        value: attr.value.clone(),
                        expected: "boolean",
                    },
                );
                false
            }
        }
    }
}

fn is_doc(node: &Element) -> bool {
    matches!(node.name.as_str(), "doc" | "brief")
}

/// Handles the `varset`/`variants`/`prefix` attributes shared by most nodes.
fn try_varinfo_attr(vi: &mut VarInfo, attr: &Attribute) -> bool {
    match attr.name.as_str() {
        "varset" => vi.varset_str = Some(attr.value.clone()),
        "variants" => vi.variants_str = Some(attr.value.clone()),
        "prefix" => vi.prefix_str = Some(attr.value.clone()),
        _ => return false,
    }
    true
}
