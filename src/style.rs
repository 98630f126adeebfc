//! Stylesheet pipeline: SCSS entry → one standalone minified CSS file.
//!
//! | Step | Crate |
//! |---|---|
//! | SCSS → CSS | `grass` |
//! | Comment removal, vendor prefixes, minify | `lightningcss` |
//! | Source map | `parcel_sourcemap` via `lightningcss` printer |
//!
//! `grass` does not produce source maps, so the map cannot reach back into
//! the `.scss` files. Its single source is the compiled CSS, embedded as
//! `sourcesContent` under a virtual name (see [`compiled_source_name`]) so
//! devtools never present it as the SCSS entry.
//!
//! Every comment is dropped, `/*!` license comments included. `url(...)`
//! values are left exactly as written; referenced files are not resolved or
//! copied.

use crate::config::{Project, StyleConfig};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SCSS error in {path}: {message}")]
    Sass { path: PathBuf, message: String },
    #[error("CSS error: {0}")]
    Css(String),
    #[error("invalid browser query: {0}")]
    Browsers(String),
    #[error("source map error: {0}")]
    SourceMap(String),
}

/// Compiled stylesheet, not yet written.
#[derive(Debug, Clone)]
pub struct CompiledStyle {
    pub code: String,
    pub map: Option<String>,
}

/// What the style task wrote.
#[derive(Debug, Clone)]
pub struct StyleReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub map: Option<PathBuf>,
}

/// Resolve the browserslist queries into lightningcss targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, StyleError> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| StyleError::Browsers(e.to_string()))?;
    Ok(browsers.map(Targets::from).unwrap_or_default())
}

/// Name the compiled CSS carries in the source map.
///
/// `src/scss/style.scss` → `sitepack://compiled/src/scss/style.css`
pub fn compiled_source_name(entry: &str) -> String {
    let css = Path::new(entry).with_extension("css");
    format!(
        "sitepack://compiled/{}",
        css.to_string_lossy().trim_start_matches("./")
    )
}

/// Compile `entry` through SCSS preprocessing, prefixing and minification.
///
/// `source_name` is the entry as configured; the map records it through
/// [`compiled_source_name`].
pub fn compile_stylesheet(
    entry: &Path,
    source_name: &str,
    config: &StyleConfig,
    load_paths: &[PathBuf],
) -> Result<CompiledStyle, StyleError> {
    let mut options = grass::Options::default();
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }
    for path in load_paths {
        options = options.load_path(path);
    }
    let css = grass::from_path(entry, &options).map_err(|e| StyleError::Sass {
        path: entry.to_path_buf(),
        message: e.to_string(),
    })?;

    let targets = browser_targets(&config.browsers)?;

    let mut sheet = StyleSheet::parse(
        &css,
        ParserOptions {
            filename: source_name.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| StyleError::Css(e.to_string()))?;
    sheet.license_comments.clear();
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let mut source_map = config.source_map.then(|| {
        let mut sm = SourceMap::new("/");
        sm.add_source(&compiled_source_name(source_name));
        sm
    });
    if let Some(sm) = source_map.as_mut() {
        sm.set_source_content(0, &css)
            .map_err(|e| StyleError::SourceMap(e.to_string()))?;
    }

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: source_map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let map = match source_map.as_mut() {
        Some(sm) => Some(
            sm.to_json(None)
                .map_err(|e| StyleError::SourceMap(e.to_string()))?,
        ),
        None => None,
    };

    Ok(CompiledStyle {
        code: printed.code,
        map,
    })
}

/// Run the style task for `project`: compile and write the bundle (+ map).
pub fn build_style(project: &Project) -> Result<StyleReport, StyleError> {
    let config = &project.config.style;
    let entry = project.path(&config.entry);
    let load_paths: Vec<PathBuf> = config.load_paths.iter().map(|p| project.path(p)).collect();

    let compiled = compile_stylesheet(&entry, &config.entry, config, &load_paths)?;

    let output = project.output_path(&config.output);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut code = compiled.code;
    let map = match compiled.map {
        Some(json) => {
            let map_path = sibling_with_suffix(&output, ".map");
            fs::write(&map_path, json)?;
            code.push_str(&format!(
                "\n/*# sourceMappingURL={} */\n",
                file_name(&map_path)
            ));
            Some(map_path)
        }
        None => None,
    };
    fs::write(&output, &code)?;

    Ok(StyleReport {
        output,
        bytes: code.len() as u64,
        map,
    })
}

/// `dist/css/a.css` + `.map` → `dist/css/a.css.map`.
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
