//! Template discovery.
//!
//! Scans the template directory (non-recursively) and produces one
//! [`PageDescriptor`] per template file. Each descriptor later becomes one
//! page task and one `<name>.html` in the output.
//!
//! ```text
//! src/html/views/
//! ├── home.html       → dist/home.html
//! ├── about.html      → dist/about.html
//! ├── .DS_Store       # hidden, skipped
//! ├── notes.txt       # extension not accepted, skipped
//! └── partials/       # directories are skipped
//! ```

use crate::naming::parse_template_name;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template directory not readable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A discovered template.
///
/// `template_dir/<name>.<extension>` existed when discovery ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDescriptor {
    pub name: String,
    pub extension: String,
}

impl PageDescriptor {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    /// Path of the template inside `template_dir`.
    pub fn template_path(&self, template_dir: &Path) -> PathBuf {
        template_dir.join(self.file_name())
    }

    /// Output file name, always `.html`.
    pub fn output_name(&self) -> String {
        format!("{}.html", self.name)
    }
}

/// List the templates in `dir`, sorted by file name.
///
/// Accepts regular, non-hidden files with an extension. When `extensions`
/// is non-empty, the last extension component must also be in it
/// (compared case-insensitively).
pub fn discover_templates(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<PageDescriptor>, TemplateError> {
    let unreadable = |source| TemplateError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<String> = fs::read_dir(dir)
        .map_err(unreadable)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    files.sort();

    let pages = files
        .iter()
        .filter_map(|f| parse_template_name(f))
        .filter(|p| {
            extensions.is_empty()
                || extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(p.final_extension()))
        })
        .map(|p| PageDescriptor {
            name: p.name,
            extension: p.extension,
        })
        .collect();

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn html_only() -> Vec<String> {
        vec!["html".to_string()]
    }

    fn names(pages: &[PageDescriptor]) -> Vec<&str> {
        pages.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn one_descriptor_per_template() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("home.html"), "").unwrap();
        fs::write(tmp.path().join("about.html"), "").unwrap();

        let pages = discover_templates(tmp.path(), &html_only()).unwrap();
        assert_eq!(names(&pages), vec!["about", "home"]);
        assert_eq!(pages[0].extension, "html");
    }

    #[test]
    fn empty_directory_yields_no_pages() {
        let tmp = TempDir::new().unwrap();
        let pages = discover_templates(tmp.path(), &html_only()).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn skips_hidden_directories_and_extensionless() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("home.html"), "").unwrap();
        fs::write(tmp.path().join(".DS_Store"), "").unwrap();
        fs::write(tmp.path().join("README"), "").unwrap();
        fs::create_dir(tmp.path().join("partials.html")).unwrap();

        let pages = discover_templates(tmp.path(), &[]).unwrap();
        assert_eq!(names(&pages), vec!["home"]);
    }

    #[test]
    fn extension_filter_applies_to_last_component() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("about.en.html"), "").unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();

        let pages = discover_templates(tmp.path(), &html_only()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].name, "about");
        assert_eq!(pages[0].extension, "en.html");
        assert_eq!(pages[0].output_name(), "about.html");
    }

    #[test]
    fn empty_extension_list_accepts_everything() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "").unwrap();
        fs::write(tmp.path().join("home.HTML"), "").unwrap();

        let pages = discover_templates(tmp.path(), &[]).unwrap();
        assert_eq!(names(&pages), vec!["home", "notes"]);
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("home.HTML"), "").unwrap();
        let pages = discover_templates(tmp.path(), &html_only()).unwrap();
        assert_eq!(names(&pages), vec!["home"]);
    }

    #[test]
    fn template_path_roundtrips() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("about.en.html"), "").unwrap();
        let pages = discover_templates(tmp.path(), &[]).unwrap();
        assert!(pages[0].template_path(tmp.path()).is_file());
    }

    #[test]
    fn missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = discover_templates(&tmp.path().join("nope"), &html_only());
        assert!(matches!(result, Err(TemplateError::Unreadable { .. })));
    }
}
