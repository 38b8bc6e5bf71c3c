//! Configuration Writer
//!
//! Writes synthesized artifacts. Every write replaces the whole file; there
//! is no atomic rename and no rollback, so a failure part-way through a run
//! leaves earlier artifacts in place.

pub mod template;

use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

pub use template::{apply_substitutions, Substitution};

/// Writes JSON documents and materializes text templates.
#[derive(Debug, Clone, Default)]
pub struct ConfigWriter;

impl ConfigWriter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize `value` as indented JSON to `path`.
    pub async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let mut body =
            serde_json::to_vec_pretty(value).map_err(|e| Error::serialization(path, e))?;
        body.push(b'\n');

        ensure_parent(path)
            .await
            .map_err(|e| Error::serialization(path, e))?;
        tokio::fs::write(path, body)
            .await
            .map_err(|e| Error::serialization(path, e))?;

        debug!(path = %path.display(), "Wrote JSON config");
        Ok(())
    }

    /// Copy `src` to `dst` with `substitutions` applied.
    pub async fn apply_template(
        &self,
        src: &Path,
        dst: &Path,
        substitutions: &[Substitution],
    ) -> Result<()> {
        let template = tokio::fs::read_to_string(src)
            .await
            .map_err(|e| Error::template_io(src, e))?;
        let output = apply_substitutions(&template, substitutions);

        ensure_parent(dst)
            .await
            .map_err(|e| Error::template_io(dst, e))?;
        tokio::fs::write(dst, output)
            .await
            .map_err(|e| Error::template_io(dst, e))?;

        debug!(
            src = %src.display(),
            dst = %dst.display(),
            substitutions = substitutions.len(),
            "Materialized template"
        );
        Ok(())
    }

    /// Rewrite `path` in place with `substitutions` applied.
    pub async fn substitute_in_place(
        &self,
        path: &Path,
        substitutions: &[Substitution],
    ) -> Result<()> {
        self.apply_template(path, path, substitutions).await
    }

    /// Append `text` to an existing file.
    pub async fn append_text(&self, path: &Path, text: &str) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::template_io(path, e))?;
        file.write_all(text.as_bytes())
            .await
            .map_err(|e| Error::template_io(path, e))?;
        file.flush().await.map_err(|e| Error::template_io(path, e))?;
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
