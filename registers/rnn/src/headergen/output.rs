// Licensed under the Apache-2.0 license

//! Generated header files.

use crate::util::include_guard;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// One generated C header, named after the database file its contents came
/// from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedHeader {
    /// `<source basename>.h`.
    pub file_name: String,
    pub guard: String,
    /// Definitions, without the include guard.
    pub body: String,
}

impl GeneratedHeader {
    pub fn for_source(source: &Path, body: String) -> Self {
        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        let file_name = format!("{base}.h");
        Self {
            guard: include_guard(&file_name),
            file_name,
            body,
        }
    }

    /// The complete header text.
    pub fn render(&self) -> String {
        let guard = &self.guard;
        format!(
            "#ifndef {guard}\n#define {guard}\n\n{}\n#endif /* {guard} */\n",
            self.body
        )
    }
}

/// Write every header into `dir`, returning the paths written.
pub fn write_headers(headers: &[GeneratedHeader], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    headers
        .iter()
        .map(|header| {
            let path = dir.join(&header.file_name);
            std::fs::write(&path, header.render())
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {}", path.display());
            Ok(path)
        })
        .collect()
}
