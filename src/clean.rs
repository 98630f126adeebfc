//! Production clean stage: empty the output directory before a build.
//!
//! Only the configured output root is touched. The fingerprint cache lives
//! beside it (`.sitepack-cache/`), so cached favicon sets and icon fonts
//! survive a clean.

use crate::config::Project;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to clean {path}: it contains the project root")]
    ContainsRoot { path: PathBuf },
}

/// What the clean stage removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Top-level entries removed from the output directory.
    pub removed: usize,
}

/// Empty the output directory. The directory itself is kept.
///
/// A missing output directory is not an error and is not created.
pub fn clean_output(project: &Project) -> Result<CleanReport, CleanError> {
    let output = project.output_dir();
    if !output.exists() {
        return Ok(CleanReport::default());
    }
    guard(&output, &project.root)?;

    let mut removed = 0;
    for entry in fs::read_dir(&output)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    tracing::debug!(removed, dir = %output.display(), "output directory cleaned");
    Ok(CleanReport { removed })
}

/// Reject an output directory that is the project root or one of its
/// ancestors (e.g. `output_dir = "."` or a symlink pointing upward).
fn guard(output: &Path, root: &Path) -> Result<(), CleanError> {
    let output_abs = output.canonicalize()?;
    let root_abs = root.canonicalize()?;
    if root_abs.starts_with(&output_abs) {
        return Err(CleanError::ContainsRoot { path: output_abs });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use tempfile::TempDir;

    #[test]
    fn removes_everything_in_output() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dist/js/old")).unwrap();
        fs::write(tmp.path().join("dist/stale.html"), "x").unwrap();
        fs::write(tmp.path().join("dist/js/old/a.js"), "x").unwrap();
        let project = Project::new(tmp.path(), BuildConfig::default());

        let report = clean_output(&project).unwrap();
        assert_eq!(report.removed, 2);
        assert!(tmp.path().join("dist").is_dir());
        assert_eq!(fs::read_dir(tmp.path().join("dist")).unwrap().count(), 0);
    }

    #[test]
    fn missing_output_is_fine() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), BuildConfig::default());
        assert_eq!(clean_output(&project).unwrap(), CleanReport::default());
        assert!(!tmp.path().join("dist").exists());
    }

    #[test]
    fn cache_directory_survives() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dist")).unwrap();
        fs::create_dir_all(tmp.path().join(".sitepack-cache")).unwrap();
        fs::write(tmp.path().join(".sitepack-cache/favicon.json"), "{}").unwrap();
        let project = Project::new(tmp.path(), BuildConfig::default());

        clean_output(&project).unwrap();
        assert!(tmp.path().join(".sitepack-cache/favicon.json").exists());
    }

    #[test]
    fn refuses_to_clean_project_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.txt"), "x").unwrap();
        let mut config = BuildConfig::default();
        config.output_dir = ".".to_string();
        let project = Project::new(tmp.path(), config);

        let result = clean_output(&project);
        assert!(matches!(result, Err(CleanError::ContainsRoot { .. })));
        assert!(tmp.path().join("keep.txt").exists());
    }
}
