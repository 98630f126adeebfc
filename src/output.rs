//! CLI output formatting for planning and builds.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Plan (production)
//!     Wave 1: clean
//!     Wave 2: iconfont, favicon, script, images
//!     Wave 3: style, fonts, page:about, page:home
//!
//! Pages
//!     001 about → about.html
//!         Source: about.html
//!     002 home → home.html
//!         Source: home.html
//! ```
//!
//! ## Build
//!
//! ```text
//! Wave 1: iconfont, favicon, script, images
//!     iconfont: cached (12 glyphs)
//!     favicon: generated (34 files)
//!     img/photo.jpg: 120.4 KB → 61.0 KB
//!     img/broken.png: failed (Processing failed: ...), kept original
//!     script: js/bundle.js 14.2 KB (6 modules)
//!     images: 8 copied, 5 compressed, 1 kept, 1 failed
//! ...
//! Built 2 pages in 1.42s (development)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::CompressOutcome;
use crate::pipeline::{BuildEvent, BuildPlan, BuildSummary, TaskOutcome};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// Show `path` relative to `base` when possible.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ============================================================================
// Plan
// ============================================================================

/// Format the planned waves and discovered pages.
pub fn format_plan(plan: &BuildPlan) -> Vec<String> {
    let mut lines = vec![format!("Plan ({})", plan.profile)];
    let tasks = plan.graph.tasks();
    for (i, wave) in plan.graph.waves().iter().enumerate() {
        let names: Vec<String> = wave.iter().map(|&t| tasks[t].to_string()).collect();
        lines.push(format!("    Wave {}: {}", i + 1, names.join(", ")));
    }

    lines.push(String::new());
    lines.push("Pages".to_string());
    let mut any = false;
    for (i, page) in plan.pages().enumerate() {
        any = true;
        lines.push(format!(
            "    {} {} → {}",
            format_index(i + 1),
            page.name,
            page.output_name()
        ));
        lines.push(format!("        Source: {}", page.file_name()));
    }
    if !any {
        lines.push("    (no templates)".to_string());
    }
    lines
}

pub fn print_plan(plan: &BuildPlan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Build events
// ============================================================================

/// One-line description of a finished task.
fn outcome_line(task: &str, outcome: &TaskOutcome, output_dir: &Path) -> String {
    match outcome {
        TaskOutcome::Clean(report) => {
            format!("{task}: removed {} entries", report.removed)
        }
        TaskOutcome::IconFont(report) => {
            format!("{task}: {} ({} glyphs)", report.status, report.glyphs)
        }
        TaskOutcome::Favicon(report) => {
            format!("{task}: {} ({} files)", report.status, report.files.len())
        }
        TaskOutcome::Style(report) => format!(
            "{task}: {} {}",
            display_path(&report.output, output_dir),
            format_size(report.bytes)
        ),
        TaskOutcome::Script(report) => format!(
            "{task}: {} {} ({} modules)",
            display_path(&report.output, output_dir),
            format_size(report.bytes),
            report.modules
        ),
        TaskOutcome::Images(report) => format!(
            "{task}: {} copied, {} compressed, {} kept, {} failed",
            report.copied,
            report.compressed,
            report.kept,
            report.failed.len()
        ),
        TaskOutcome::Fonts(report) => format!(
            "{task}: {} files, {}",
            report.files.len(),
            format_size(report.bytes)
        ),
        TaskOutcome::Page(path) => format!("{task} → {}", display_path(path, output_dir)),
    }
}

/// Format a single build event. Paths are shown relative to `output_dir`.
pub fn format_build_event(event: &BuildEvent, output_dir: &Path) -> Vec<String> {
    match event {
        BuildEvent::WaveStarted { index, tasks } => {
            vec![format!("Wave {}: {}", index + 1, tasks.join(", "))]
        }
        BuildEvent::TaskFinished { task, outcome, .. } => {
            vec![format!("    {}", outcome_line(task, outcome, output_dir))]
        }
        BuildEvent::ImageCompressed { path, outcome } => {
            let shown = display_path(path, output_dir);
            match outcome {
                CompressOutcome::Compressed { before, after } => vec![format!(
                    "    {shown}: {} → {}",
                    format_size(*before),
                    format_size(*after)
                )],
                CompressOutcome::Kept { size } => {
                    vec![format!("    {shown}: {} (already optimal)", format_size(*size))]
                }
            }
        }
        BuildEvent::ImageFailed { path, error } => vec![format!(
            "    {}: failed ({error}), kept original",
            display_path(path, output_dir)
        )],
    }
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let pages = summary.pages().count();
    let mut lines = Vec::new();
    let failed: usize = summary
        .outcomes
        .iter()
        .map(|(_, o)| match o {
            TaskOutcome::Images(report) => report.failed.len(),
            _ => 0,
        })
        .sum();
    if failed > 0 {
        lines.push(format!(
            "Warning: {failed} image(s) could not be compressed"
        ));
    }
    lines.push(format!(
        "Built {} page{} in {:.2}s ({})",
        pages,
        if pages == 1 { "" } else { "s" },
        summary.elapsed.as_secs_f64(),
        summary.profile
    ));
    lines
}

pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
