//! Download targets for finished PDFs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;

/// Saves finished files under a name.
pub trait OutputSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for &S {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        (**self).save(file_name, bytes)
    }
}

/// Writes files into a directory, creating it on first save.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a file name will be written to. Path separators in the name are
    /// replaced so a document number can never escape the directory.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        let safe: String = file_name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect();
        let safe = if safe.trim_matches('.').is_empty() {
            "export.pdf".to_string()
        } else {
            safe
        };
        self.dir.join(safe)
    }
}

impl OutputSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(file_name);
        fs::write(&path, bytes)?;
        log::info!("Wrote '{}' ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn get(&self, file_name: &str) -> Option<Vec<u8>> {
        self.lock().get(file_name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl OutputSink for MemorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.lock().insert(file_name.to_string(), bytes.to_vec());
        Ok(())
    }
}
