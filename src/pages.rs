//! Page assembly.
//!
//! Renders one template into `<output_dir>/<name>.html`. Two transforms are
//! applied, in this order:
//!
//! 1. **Raw includes.** `<%= require('path') %>` is replaced with the bytes
//!    of `path`, resolved relative to the template. An optional loader prefix
//!    (`raw-loader!./nav.html`) is accepted and ignored. Included files must
//!    live under `templates.includes_dir`; their contents are inserted
//!    verbatim and are not scanned for further includes.
//! 2. **Favicon markup.** When present, inserted right before `</head>`, or
//!    at the very start of the page if the template has no head.
//!
//! Anything else in the template is copied through untouched.

use crate::config::Project;
use crate::templates::PageDescriptor;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{template}: include not found: {include}")]
    IncludeNotFound { template: PathBuf, include: String },
    #[error("{template}: include {include} is outside {includes_dir}")]
    IncludeOutsideDir {
        template: PathBuf,
        include: String,
        includes_dir: PathBuf,
    },
}

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<%=\s*require\(\s*['"]([^'"]+)['"]\s*\)\s*%>"#).expect("Invalid include regex")
});

/// Render `page` and write it to the output directory. Returns the written path.
pub fn render_page(
    project: &Project,
    page: &PageDescriptor,
    favicon_markup: Option<&str>,
) -> Result<PathBuf, PageError> {
    let template_dir = project.path(&project.config.templates.dir);
    let template_path = page.template_path(&template_dir);
    let includes_dir = project.path(&project.config.templates.includes_dir);

    let source = fs::read_to_string(&template_path)?;
    let mut html = expand_includes(&source, &template_path, &includes_dir)?;
    if let Some(markup) = favicon_markup.filter(|m| !m.is_empty()) {
        html = inject_head(&html, markup);
    }

    let output = project.output_path(&page.output_name());
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, html)?;
    Ok(output)
}

/// Replace every `<%= require('...') %>` in `source` with the included file.
pub fn expand_includes(
    source: &str,
    template_path: &Path,
    includes_dir: &Path,
) -> Result<String, PageError> {
    let base = template_path.parent().unwrap_or(Path::new("."));
    // Canonical form is only needed once an include is actually seen.
    let mut allowed: Option<PathBuf> = None;

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in INCLUDE_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        let request = &caps[1];
        let include = strip_loader(request);

        let not_found = || PageError::IncludeNotFound {
            template: template_path.to_path_buf(),
            include: include.to_string(),
        };
        let resolved = base.join(include).canonicalize().map_err(|_| not_found())?;
        if allowed.is_none() {
            allowed = includes_dir.canonicalize().ok();
        }
        if !allowed.as_ref().is_some_and(|dir| resolved.starts_with(dir)) {
            return Err(PageError::IncludeOutsideDir {
                template: template_path.to_path_buf(),
                include: include.to_string(),
                includes_dir: includes_dir.to_path_buf(),
            });
        }

        out.push_str(&source[last..whole.start()]);
        out.push_str(&fs::read_to_string(&resolved)?);
        last = whole.end();
    }
    out.push_str(&source[last..]);
    Ok(out)
}

/// Drop a webpack-style loader prefix: `raw-loader!./a.html` → `./a.html`.
fn strip_loader(request: &str) -> &str {
    request.rsplit('!').next().unwrap_or(request)
}

/// Insert `markup` before the first `</head>` (case-insensitive), or at the
/// start of the document when there is none.
pub fn inject_head(html: &str, markup: &str) -> String {
    match html.to_ascii_lowercase().find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + markup.len());
            out.push_str(&html[..pos]);
            out.push_str(markup);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{markup}{html}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use tempfile::TempDir;

    fn project_with_views(tmp: &TempDir) -> Project {
        let project = Project::new(tmp.path(), BuildConfig::default());
        fs::create_dir_all(tmp.path().join("src/html/views")).unwrap();
        fs::create_dir_all(tmp.path().join("src/html/includes")).unwrap();
        project
    }

    fn page(name: &str) -> PageDescriptor {
        PageDescriptor {
            name: name.to_string(),
            extension: "html".to_string(),
        }
    }

    // =========================================================================
    // Includes
    // =========================================================================

    #[test]
    fn expands_raw_include() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(tmp.path().join("src/html/includes/nav.html"), "<nav>N</nav>").unwrap();
        fs::write(
            tmp.path().join("src/html/views/home.html"),
            "<body><%= require('../includes/nav.html') %></body>",
        )
        .unwrap();

        let out = render_page(&project, &page("home"), None).unwrap();
        assert_eq!(out, tmp.path().join("dist/home.html"));
        assert_eq!(
            fs::read_to_string(out).unwrap(),
            "<body><nav>N</nav></body>"
        );
    }

    #[test]
    fn include_with_loader_prefix_and_double_quotes() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(tmp.path().join("src/html/includes/f.html"), "F").unwrap();
        fs::write(
            tmp.path().join("src/html/views/a.html"),
            r#"[<%=require("raw-loader!../includes/f.html")%>]"#,
        )
        .unwrap();

        let out = render_page(&project, &page("a"), None).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "[F]");
    }

    #[test]
    fn included_content_is_not_reexpanded() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(
            tmp.path().join("src/html/includes/outer.html"),
            "<%= require('./inner.html') %>",
        )
        .unwrap();
        fs::write(
            tmp.path().join("src/html/views/a.html"),
            "<%= require('../includes/outer.html') %>",
        )
        .unwrap();

        let out = render_page(&project, &page("a"), None).unwrap();
        assert_eq!(
            fs::read_to_string(out).unwrap(),
            "<%= require('./inner.html') %>"
        );
    }

    #[test]
    fn include_outside_includes_dir_rejected() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(tmp.path().join("src/html/views/other.html"), "x").unwrap();
        fs::write(
            tmp.path().join("src/html/views/a.html"),
            "<%= require('./other.html') %>",
        )
        .unwrap();

        let result = render_page(&project, &page("a"), None);
        assert!(matches!(result, Err(PageError::IncludeOutsideDir { .. })));
    }

    #[test]
    fn missing_include_rejected() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(
            tmp.path().join("src/html/views/a.html"),
            "<%= require('../includes/gone.html') %>",
        )
        .unwrap();

        let result = render_page(&project, &page("a"), None);
        assert!(matches!(result, Err(PageError::IncludeNotFound { .. })));
    }

    #[test]
    fn other_template_syntax_passes_through() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        let body = "<p><%= title %></p>";
        fs::write(tmp.path().join("src/html/views/a.html"), body).unwrap();
        let out = render_page(&project, &page("a"), None).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), body);
    }

    // =========================================================================
    // Head injection
    // =========================================================================

    #[test]
    fn injects_before_head_close() {
        let html = "<html><head><title>T</title></head><body></body></html>";
        let out = inject_head(html, "<link rel=\"icon\">");
        assert_eq!(
            out,
            "<html><head><title>T</title><link rel=\"icon\"></head><body></body></html>"
        );
    }

    #[test]
    fn injects_case_insensitively() {
        let out = inject_head("<HEAD></HEAD>", "M");
        assert_eq!(out, "<HEAD>M</HEAD>");
    }

    #[test]
    fn prepends_without_head() {
        assert_eq!(inject_head("<p>x</p>", "M"), "M<p>x</p>");
    }

    #[test]
    fn render_with_markup_writes_injected_page() {
        let tmp = TempDir::new().unwrap();
        let project = project_with_views(&tmp);
        fs::write(
            tmp.path().join("src/html/views/about.html"),
            "<head></head>",
        )
        .unwrap();
        let out = render_page(&project, &page("about"), Some("<meta name=\"x\">")).unwrap();
        assert_eq!(
            fs::read_to_string(out).unwrap(),
            "<head><meta name=\"x\"></head>"
        );
    }

    #[test]
    fn strip_loader_variants() {
        assert_eq!(strip_loader("./a.html"), "./a.html");
        assert_eq!(strip_loader("raw-loader!./a.html"), "./a.html");
        assert_eq!(strip_loader("a!b!./c.html"), "./c.html");
    }
}
