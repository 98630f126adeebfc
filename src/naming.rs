//! Centralized filename parsing for page templates.
//!
//! A template file name splits at its *first* dot: the part before becomes
//! the page name, the part after is kept whole as the extension. Joining the
//! two with a dot always gives back the original file name.
//!
//! - `home.html` → name `home`, extension `html`
//! - `about.en.html` → name `about`, extension `en.html`
//! - `.draft.html` → hidden, rejected
//! - `README` → no extension, rejected

/// Result of parsing a template file name like `about.en.html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Text before the first `.`. Never empty.
    pub name: String,
    /// Text after the first `.`. Never empty.
    pub extension: String,
}

impl ParsedName {
    /// The last dot-separated component (`html` for `en.html`).
    pub fn final_extension(&self) -> &str {
        self.extension
            .rsplit('.')
            .next()
            .unwrap_or(self.extension.as_str())
    }
}

/// Parse a template file name.
///
/// Returns `None` for hidden files (leading `.`) and names without a
/// non-empty extension.
pub fn parse_template_name(file_name: &str) -> Option<ParsedName> {
    let (name, extension) = file_name.split_once('.')?;
    if name.is_empty() || extension.is_empty() {
        return None;
    }
    Some(ParsedName {
        name: name.to_string(),
        extension: extension.to_string(),
    })
}
