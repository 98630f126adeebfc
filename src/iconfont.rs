//! Icon font generation: a directory of SVG icons → fonts + SCSS partial.
//!
//! ```text
//! src/iconfont/home.svg    ─┐   src/fonts/iconfont.woff2          (WOFF2)
//! src/iconfont/search.svg  ─┼─▶ src/fonts/iconfont.ttf            (TrueType)
//! src/iconfont/user.svg    ─┘   src/fonts/iconfont.svg            (SVG font)
//!                               src/scss/_iconfont_iconfont.scss  (@font-face + classes)
//! ```
//!
//! All outputs land in the *source* tree: the fonts are picked up by the font
//! copy task and the partial by the stylesheet, which is why the build graph
//! orders this task before both.
//!
//! ## Glyphs
//!
//! Icons are the `.svg` files under `iconfont.source` whose root-relative
//! path matches the `iconfont.watch` glob. They are sorted by file name and
//! assigned consecutive code points from `iconfont.start_codepoint`
//! (`U+EA01` by default). Each icon is parsed and flattened with `usvg`, so
//! shapes, groups and transforms all end up as absolute path outlines, then
//! scaled to a 1000-unit em with the y axis flipped.
//!
//! The TrueType font is assembled with `write-fonts`. Its outlines hold only
//! lines and quadratics, so cubic segments are approximated by quadratic
//! splines to within one font unit. The WOFF2 file is the same font run
//! through `ttf2woff2`.
//!
//! ## Caching
//!
//! A fingerprint over the options and every icon's path and bytes is stored
//! in `.sitepack-cache/iconfont.json`. While it matches and every output
//! exists, the task does nothing.

use crate::cache::{self, CacheRecord, CacheStatus, Fingerprinter};
use crate::config::{IconFontConfig, Project};
use kurbo::{BezPath, CubicBez, Point};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use usvg::tiny_skia_path::PathSegment;
use walkdir::WalkDir;
use write_fonts::tables::cmap::Cmap;
use write_fonts::tables::glyf::{Bbox, GlyfLocaBuilder, Glyph as TtGlyph, SimpleGlyph};
use write_fonts::tables::head::Head;
use write_fonts::tables::hhea::Hhea;
use write_fonts::tables::hmtx::{Hmtx, LongMetric};
use write_fonts::tables::maxp::Maxp;
use write_fonts::tables::name::{Name, NameRecord};
use write_fonts::tables::os2::Os2;
use write_fonts::tables::post::Post;
use write_fonts::types::{FWord, Fixed, GlyphId, NameId, UfWord};
use write_fonts::{FontBuilder, OffsetMarker};

#[derive(Error, Debug)]
pub enum IconFontError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot walk icon directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid SVG {path}: {message}")]
    Svg { path: PathBuf, message: String },
    #[error("two icons map to the glyph name '{0}'")]
    DuplicateName(String),
    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("cannot fingerprint options: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("cannot build TrueType font: {0}")]
    Font(String),
    #[error("cannot encode WOFF2 font: {0}")]
    Woff2(#[from] ttf2woff2::Error),
}

/// Units per em of the generated font.
const UPEM: f32 = 1000.0;

/// Primary font type; substituted for `[type]` in the reported font path.
pub const FONT_TYPE: &str = "svg";

/// Every font type written, in `@font-face` preference order.
pub const FONT_TYPES: [&str; 3] = ["woff2", "ttf", FONT_TYPE];

/// Maximum distance, in font units, between a cubic and its quadratic spline.
const QUAD_ACCURACY: f64 = 1.0;

const CACHE_KEY: &str = "iconfont";

/// One icon file selected for the font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSource {
    pub name: String,
    pub path: PathBuf,
    /// Root-relative path with `/` separators.
    pub relative: String,
}

/// A glyph as written to the font and stylesheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Glyph {
    pub name: String,
    pub codepoint: u32,
    pub advance: u32,
    /// Outline in font units (y up), SVG path syntax.
    pub path_data: String,
    /// The same outline with cubics replaced by quadratic splines.
    #[serde(skip)]
    pub outline: BezPath,
}

#[derive(Debug, Clone)]
pub struct IconFontReport {
    pub status: CacheStatus,
    pub glyphs: usize,
    pub font: PathBuf,
    pub css: PathBuf,
}

// =============================================================================
// Glob matching
// =============================================================================

/// Translate a watch glob into an anchored regex over `/`-separated paths.
///
/// Supports `**`, `*`, `?` and `{a,b}` alternation.
pub fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_group = false;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '{' => {
                in_group = true;
                re.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                re.push(')');
            }
            ',' if in_group => re.push('|'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');
    Regex::new(&re)
}

/// Regex selecting the icons of `config`.
pub fn watch_regex(config: &IconFontConfig) -> Result<Regex, regex::Error> {
    glob_to_regex(config.watch.trim_start_matches("./"))
}

fn relative_slash(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Glyph name for an icon file: its stem, with characters that are not
/// valid in a CSS class replaced by `-`.
fn glyph_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// List the icons of `project`, sorted by file name.
pub fn collect_icons(project: &Project) -> Result<Vec<IconSource>, IconFontError> {
    let config = &project.config.iconfont;
    let pattern = watch_regex(config)?;
    let source = project.path(&config.source);

    let mut icons = Vec::new();
    for entry in WalkDir::new(&source) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_svg = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
        let relative = relative_slash(entry.path(), &project.root);
        if is_svg && pattern.is_match(&relative) {
            icons.push(IconSource {
                name: glyph_name(entry.path()),
                path: entry.path().to_path_buf(),
                relative,
            });
        }
    }
    icons.sort_by(|a, b| {
        let key = |i: &IconSource| i.path.file_name().map(|n| n.to_os_string());
        key(a).cmp(&key(b)).then_with(|| a.relative.cmp(&b.relative))
    });

    let mut seen = HashSet::new();
    for icon in &icons {
        if !seen.insert(icon.name.as_str()) {
            return Err(IconFontError::DuplicateName(icon.name.clone()));
        }
    }
    Ok(icons)
}

// =============================================================================
// Outline extraction
// =============================================================================

fn fmt_num(v: f32) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Accumulates an icon's outline as SVG path data and as a quadratic path.
struct Outline {
    scale: f32,
    svg: String,
    quads: BezPath,
    start: Point,
    current: Point,
}

impl Outline {
    fn new(scale: f32) -> Self {
        Self {
            scale,
            svg: String::new(),
            quads: BezPath::new(),
            start: Point::ZERO,
            current: Point::ZERO,
        }
    }

    fn font_point(&self, p: usvg::tiny_skia_path::Point) -> Point {
        Point::new(
            f64::from(p.x * self.scale),
            f64::from(UPEM - p.y * self.scale),
        )
    }

    fn svg_point(p: Point) -> String {
        format!("{} {}", fmt_num(p.x as f32), fmt_num(p.y as f32))
    }

    fn push(&mut self, segment: PathSegment) {
        let _ = match segment {
            PathSegment::MoveTo(p) => {
                let p = self.font_point(p);
                self.quads.move_to(p);
                self.start = p;
                self.current = p;
                write!(self.svg, "M{}", Self::svg_point(p))
            }
            PathSegment::LineTo(p) => {
                let p = self.font_point(p);
                self.quads.line_to(p);
                self.current = p;
                write!(self.svg, "L{}", Self::svg_point(p))
            }
            PathSegment::QuadTo(c, p) => {
                let (c, p) = (self.font_point(c), self.font_point(p));
                self.quads.quad_to(c, p);
                self.current = p;
                write!(self.svg, "Q{} {}", Self::svg_point(c), Self::svg_point(p))
            }
            PathSegment::CubicTo(c1, c2, p) => {
                let (c1, c2, p) = (self.font_point(c1), self.font_point(c2), self.font_point(p));
                for (_, _, quad) in CubicBez::new(self.current, c1, c2, p).to_quads(QUAD_ACCURACY) {
                    self.quads.quad_to(quad.p1, quad.p2);
                }
                self.current = p;
                write!(
                    self.svg,
                    "C{} {} {}",
                    Self::svg_point(c1),
                    Self::svg_point(c2),
                    Self::svg_point(p)
                )
            }
            PathSegment::Close => {
                self.quads.close_path();
                self.current = self.start;
                write!(self.svg, "Z")
            }
        };
    }
}

fn collect_outlines(group: &usvg::Group, out: &mut Outline) {
    for node in group.children() {
        match node {
            usvg::Node::Group(g) => collect_outlines(g, out),
            usvg::Node::Path(path) if path.is_visible() && path.fill().is_some() => {
                let Some(data) = path.data().clone().transform(path.abs_transform()) else {
                    continue;
                };
                for segment in data.segments() {
                    out.push(segment);
                }
            }
            _ => {}
        }
    }
}

/// Parse one icon into a glyph outline scaled to the em square.
pub fn load_glyph(icon: &IconSource, codepoint: u32) -> Result<Glyph, IconFontError> {
    let data = fs::read(&icon.path)?;
    let tree = usvg::Tree::from_data(&data, &usvg::Options::default()).map_err(|e| {
        IconFontError::Svg {
            path: icon.path.clone(),
            message: e.to_string(),
        }
    })?;

    let size = tree.size();
    let scale = UPEM / size.height();
    let mut outline = Outline::new(scale);
    collect_outlines(tree.root(), &mut outline);

    Ok(Glyph {
        name: icon.name.clone(),
        codepoint,
        advance: (size.width() * scale).round().max(1.0) as u32,
        path_data: outline.svg,
        outline: outline.quads,
    })
}

// =============================================================================
// Output rendering
// =============================================================================

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the SVG font document.
pub fn render_svg_font(family: &str, glyphs: &[Glyph]) -> String {
    let family = xml_escape(family);
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
    out.push_str("<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n");
    out.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\">\n<defs>\n");
    let _ = writeln!(out, "<font id=\"{family}\" horiz-adv-x=\"{UPEM}\">");
    let _ = writeln!(
        out,
        "<font-face font-family=\"{family}\" units-per-em=\"{UPEM}\" ascent=\"{UPEM}\" descent=\"0\" />"
    );
    out.push_str("<missing-glyph horiz-adv-x=\"0\" />\n");
    for glyph in glyphs {
        let _ = writeln!(
            out,
            "<glyph glyph-name=\"{}\" unicode=\"&#x{:X};\" horiz-adv-x=\"{}\" d=\"{}\" />",
            xml_escape(&glyph.name),
            glyph.codepoint,
            glyph.advance,
            glyph.path_data
        );
    }
    out.push_str("</font>\n</defs>\n</svg>\n");
    out
}

fn font_err(e: impl std::fmt::Display) -> IconFontError {
    IconFontError::Font(e.to_string())
}

fn clamp_u16(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

/// PostScript names are printable ASCII without spaces or delimiters.
fn postscript_name(family: &str) -> String {
    let name: String = family
        .chars()
        .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
        .take(63)
        .collect();
    if name.is_empty() {
        "iconfont".to_string()
    } else {
        name
    }
}

fn name_table(family: &str) -> Name {
    let record = |id: NameId, value: &str| {
        NameRecord::new(3, 1, 0x409, id, OffsetMarker::new(value.to_string()))
    };
    Name::new(vec![
        record(NameId::FAMILY_NAME, family),
        record(NameId::SUBFAMILY_NAME, "Regular"),
        record(NameId::FULL_NAME, family),
        record(NameId::POSTSCRIPT_NAME, &postscript_name(family)),
    ])
}

/// Assemble a TrueType font. Glyph 0 is an empty `.notdef`; icon glyphs
/// follow in order and are mapped from their code points.
pub fn render_truetype(family: &str, glyphs: &[Glyph]) -> Result<Vec<u8>, IconFontError> {
    let mut outlines = vec![TtGlyph::Empty];
    for glyph in glyphs {
        if glyph.outline.is_empty() {
            outlines.push(TtGlyph::Empty);
            continue;
        }
        let simple = SimpleGlyph::from_bezpath(&glyph.outline)
            .map_err(|e| IconFontError::Font(format!("glyph '{}': {e:?}", glyph.name)))?;
        outlines.push(TtGlyph::Simple(simple));
    }

    let mut advances = vec![UPEM as u16];
    advances.extend(glyphs.iter().map(|g| clamp_u16(g.advance)));

    let mut loca_builder = GlyfLocaBuilder::new();
    let mut bbox: Option<Bbox> = None;
    let mut metrics = Vec::with_capacity(outlines.len());
    let (mut max_points, mut max_contours) = (0u16, 0u16);
    let (mut min_lsb, mut min_rsb, mut max_extent) = (i16::MAX, i16::MAX, i16::MIN);
    for (outline, &advance) in outlines.iter().zip(&advances) {
        loca_builder.add_glyph(outline).map_err(font_err)?;
        let lsb = match outline.bbox() {
            Some(b) => {
                bbox = Some(bbox.map_or(b, |all| all.union(b)));
                min_lsb = min_lsb.min(b.x_min);
                min_rsb = min_rsb.min((i32::from(advance) - i32::from(b.x_max)) as i16);
                max_extent = max_extent.max(b.x_max);
                b.x_min
            }
            None => 0,
        };
        if let TtGlyph::Simple(simple) = outline {
            let points: usize = simple.contours.iter().map(|c| c.len()).sum();
            max_points = max_points.max(points as u16);
            max_contours = max_contours.max(simple.contours.len() as u16);
        }
        metrics.push(LongMetric::new(advance, lsb));
    }
    let (glyf, loca, loca_format) = loca_builder.build();
    let bbox = bbox.unwrap_or_default();
    if max_extent == i16::MIN {
        (min_lsb, min_rsb, max_extent) = (0, 0, 0);
    }

    let head = Head {
        font_revision: Fixed::ONE,
        units_per_em: UPEM as u16,
        x_min: bbox.x_min,
        y_min: bbox.y_min,
        x_max: bbox.x_max,
        y_max: bbox.y_max,
        lowest_rec_ppem: 8,
        index_to_loc_format: loca_format as i16,
        ..Default::default()
    };
    let advance_max = advances.iter().copied().max().unwrap_or(0);
    let hhea = Hhea {
        ascender: FWord::new(UPEM as i16),
        descender: FWord::new(0),
        advance_width_max: UfWord::new(advance_max),
        min_left_side_bearing: FWord::new(min_lsb),
        min_right_side_bearing: FWord::new(min_rsb),
        x_max_extent: FWord::new(max_extent),
        caret_slope_rise: 1,
        number_of_h_metrics: metrics.len() as u16,
        ..Default::default()
    };
    let maxp = Maxp {
        max_points: Some(max_points),
        max_contours: Some(max_contours),
        max_composite_points: Some(0),
        max_composite_contours: Some(0),
        max_zones: Some(2),
        max_twilight_points: Some(0),
        max_storage: Some(0),
        max_function_defs: Some(0),
        max_instruction_defs: Some(0),
        max_stack_elements: Some(0),
        max_size_of_instructions: Some(0),
        max_component_elements: Some(0),
        max_component_depth: Some(0),
        ..Maxp::new(outlines.len() as u16)
    };

    let codepoints = glyphs.iter().map(|g| clamp_u16(g.codepoint));
    let average = advances.iter().map(|&a| u32::from(a)).sum::<u32>() / advances.len() as u32;
    let os2 = Os2 {
        x_avg_char_width: clamp_u16(average) as i16,
        us_first_char_index: codepoints.clone().min().unwrap_or(0),
        us_last_char_index: codepoints.max().unwrap_or(0),
        s_typo_ascender: UPEM as i16,
        s_typo_descender: 0,
        us_win_ascent: bbox.y_max.max(UPEM as i16) as u16,
        us_win_descent: (-i32::from(bbox.y_min)).max(0) as u16,
        ul_code_page_range_1: Some(1),
        ul_code_page_range_2: Some(0),
        sx_height: Some(0),
        s_cap_height: Some(0),
        us_default_char: Some(0),
        us_break_char: Some(32),
        us_max_context: Some(0),
        ..Default::default()
    };

    let hmtx = Hmtx::new(metrics, Vec::new());
    let cmap = Cmap::from_mappings(glyphs.iter().enumerate().filter_map(|(i, g)| {
        char::from_u32(g.codepoint).map(|c| (c, GlyphId::new(i as u32 + 1)))
    }))
    .map_err(font_err)?;
    let names: Vec<&str> = std::iter::once(".notdef")
        .chain(glyphs.iter().map(|g| g.name.as_str()))
        .collect();
    let post = Post::new_v2(names);

    let mut builder = FontBuilder::new();
    builder
        .add_table(&head)
        .map_err(font_err)?
        .add_table(&hhea)
        .map_err(font_err)?
        .add_table(&maxp)
        .map_err(font_err)?
        .add_table(&os2)
        .map_err(font_err)?
        .add_table(&hmtx)
        .map_err(font_err)?
        .add_table(&cmap)
        .map_err(font_err)?
        .add_table(&glyf)
        .map_err(font_err)?
        .add_table(&loca)
        .map_err(font_err)?
        .add_table(&name_table(family))
        .map_err(font_err)?
        .add_table(&post)
        .map_err(font_err)?;
    Ok(builder.build())
}

/// Compress a TrueType font into WOFF2.
pub fn render_woff2(ttf: &[u8]) -> Result<Vec<u8>, IconFontError> {
    Ok(ttf2woff2::encode(ttf, ttf2woff2::BrotliQuality::default())?)
}

fn font_format(font_type: &str) -> &str {
    match font_type {
        "ttf" => "truetype",
        other => other,
    }
}

/// Render the SCSS partial: `@font-face`, glyph map, base class, one rule per glyph.
///
/// `font_files` pairs each font type with its file name, in preference order.
pub fn render_scss(config: &IconFontConfig, font_files: &[(&str, String)], glyphs: &[Glyph]) -> String {
    let family = &config.family;
    let sources = font_files
        .iter()
        .map(|(font_type, file)| {
            let fragment = if *font_type == "svg" { format!("#{family}") } else { String::new() };
            format!(
                "url(\"{}{file}{fragment}\") format(\"{}\")",
                config.font_url,
                font_format(font_type)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n    ");
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// Generated from {}. Changes are overwritten on the next build.\n",
        config.source
    );
    let _ = writeln!(
        out,
        "@font-face {{\n  font-family: \"{family}\";\n  src: {sources};\n  font-weight: normal;\n  font-style: normal;\n}}\n"
    );

    let _ = writeln!(out, "${family}-icons: (");
    for glyph in glyphs {
        let _ = writeln!(out, "  \"{}\": \"\\{:x}\",", glyph.name, glyph.codepoint);
    }
    out.push_str(");\n\n");

    let _ = writeln!(
        out,
        ".{family} {{\n  font-family: \"{family}\" !important;\n  font-style: normal;\n  font-weight: normal;\n  font-variant: normal;\n  line-height: 1;\n  text-transform: none;\n  -webkit-font-smoothing: antialiased;\n  -moz-osx-font-smoothing: grayscale;\n}}\n"
    );
    for glyph in glyphs {
        let _ = writeln!(
            out,
            ".{family}-{}:before {{\n  content: \"\\{:x}\";\n}}",
            glyph.name, glyph.codepoint
        );
    }
    out
}

// =============================================================================
// Task
// =============================================================================

fn fingerprint(project: &Project, icons: &[IconSource]) -> Result<String, IconFontError> {
    let mut fp = Fingerprinter::new(CACHE_KEY).options(&project.config.iconfont)?;
    for icon in icons {
        fp = fp.file(&icon.relative, &icon.path)?;
    }
    Ok(fp.finish())
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), IconFontError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Run the icon-font task. `force` skips the fingerprint check.
pub fn build_iconfont(project: &Project, force: bool) -> Result<IconFontReport, IconFontError> {
    let config = &project.config.iconfont;
    let font_rels: Vec<(&str, String)> = FONT_TYPES
        .iter()
        .map(|&font_type| (font_type, config.font_path(font_type)))
        .collect();
    let css_rel = config.css_path();
    let font = project.path(&config.font_path(FONT_TYPE));
    let css = project.path(&css_rel);

    let icons = collect_icons(project)?;
    let fp = fingerprint(project, &icons)?;
    let cache_dir = project.cache_dir();

    if !force && cache::lookup(&cache_dir, CACHE_KEY, &fp, &project.root) == CacheStatus::Cached {
        tracing::debug!(icons = icons.len(), "icon font unchanged, skipping");
        return Ok(IconFontReport {
            status: CacheStatus::Cached,
            glyphs: icons.len(),
            font,
            css,
        });
    }

    let glyphs = icons
        .iter()
        .enumerate()
        .map(|(i, icon)| load_glyph(icon, config.start_codepoint + i as u32))
        .collect::<Result<Vec<_>, _>>()?;

    let ttf = render_truetype(&config.family, &glyphs)?;
    let woff2 = render_woff2(&ttf)?;
    let mut font_files = Vec::with_capacity(font_rels.len());
    for (font_type, rel) in &font_rels {
        let path = project.path(rel);
        match *font_type {
            "woff2" => write_file(&path, &woff2)?,
            "ttf" => write_file(&path, &ttf)?,
            _ => write_file(&path, render_svg_font(&config.family, &glyphs).as_bytes())?,
        }
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        font_files.push((*font_type, file));
    }
    write_file(&css, render_scss(config, &font_files, &glyphs).as_bytes())?;

    let mut outputs: Vec<String> = font_rels.into_iter().map(|(_, rel)| rel).collect();
    outputs.push(css_rel);
    CacheRecord::new(fp, outputs).save(&cache_dir, CACHE_KEY)?;
    tracing::debug!(
        glyphs = glyphs.len(),
        ttf_bytes = ttf.len(),
        woff2_bytes = woff2.len(),
        font = %font.display(),
        "icon font generated"
    );

    Ok(IconFontReport {
        status: CacheStatus::Generated,
        glyphs: glyphs.len(),
        font,
        css,
    })
}
