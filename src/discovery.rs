use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::DispatchError;

/// File-name prefix that marks a suite executable.
pub const SUITE_PREFIX: &str = "suite";

/// Finds suite executables for the dispatcher.
///
/// The discovery process follows this flow:
/// 1. Resolve each input: files are taken as given, directories are scanned
/// 2. Walk directories recursively
/// 3. Keep executable files whose name starts with `suite`
/// 4. Sort each directory's findings for a deterministic dispatch order
#[derive(Debug)]
pub struct SuiteDiscoverer;

impl SuiteDiscoverer {
    // =====================
    // Public API
    // =====================

    /// Recursively scans a directory for suite executables, sorted.
    pub fn discover_suite_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, DispatchError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !Self::is_suite_file(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// Expands command-line inputs into the ordered list of files to run.
    pub fn resolve_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, DispatchError> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                let found = Self::discover_suite_files(input)?;
                tracing::debug!(dir = %input.display(), found = found.len(), "scanned directory");
                files.extend(found);
            } else if input.exists() {
                files.push(input.clone());
            } else {
                return Err(DispatchError::NotFound { path: input.clone() });
            }
        }
        Ok(files)
    }

    // =====================
    // Internal
    // =====================

    fn is_suite_file(path: &Path) -> bool {
        let named_like_suite = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(SUITE_PREFIX));
        named_like_suite && is_executable(path)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "exe")
}
