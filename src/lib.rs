//! # sitepack
//!
//! A single-binary asset pipeline for static front-end projects. A project
//! laid out as `src/{html,js,scss,img,fonts,iconfont,favicon}` is built into
//! a categorized output tree:
//!
//! ```text
//! dist/
//! ├── home.html, about.html        # one page per template
//! ├── js/bundle.js                 # + .map, .LICENSE.txt
//! ├── css/style.bundle.css         # + .map
//! ├── img/**                       # JPEG/PNG compressed in place
//! ├── fonts/**                     # copied, including the generated icon fonts
//! └── favicon/**                   # icon set + manifests
//! ```
//!
//! # Architecture: a Declared Build Graph
//!
//! Every build is planned before it runs. [`pipeline::plan`] discovers the
//! templates, checks every configured input, and produces a list of tasks
//! with explicit ordering edges. [`pipeline::run`] executes the graph wave by
//! wave on the rayon pool:
//!
//! ```text
//! clean ──▶ everything                 (production only)
//! iconfont ──▶ style, fonts            (generated partial + font file)
//! favicon ──▶ every page               (injected <head> markup)
//! ```
//!
//! Ordering hazards are prevented by these edges rather than by timing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `sitepack.toml` loading, stock defaults, validation, [`config::Project`] |
//! | [`pipeline`] | Task list, build graph, planning, wave execution, build events |
//! | [`templates`] | Template discovery → page descriptors |
//! | [`naming`] | Template file name parsing (`name.ext`) |
//! | [`pages`] | Page assembly: raw includes + favicon markup injection |
//! | [`style`] | SCSS → prefixed, minified CSS with source map |
//! | [`script`] | ES module bundling, legal comment extraction, minification |
//! | [`assets`] | Font copy, image copy + compression |
//! | [`iconfont`] | SVG icons → WOFF2/TrueType/SVG fonts + SCSS partial |
//! | [`favicon`] | Logo → platform icon set, manifests, markup |
//! | [`clean`] | Production clean stage |
//! | [`cache`] | Content fingerprints for the favicon and icon-font tasks |
//! | [`imaging`] | Pure-Rust raster operations behind the [`imaging::ImageBackend`] trait |
//! | [`watch`] | Development rebuilds on file changes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Immutable Configuration
//!
//! The config is loaded once, merged over stock defaults, validated, and then
//! only ever borrowed. The production-only clean task is added by the pure
//! [`pipeline::build_task_list`] from an explicit [`config::BuildProfile`],
//! never by mutating configuration.
//!
//! ## Content-Fingerprint Caches
//!
//! Favicon rendering and icon-font synthesis are keyed by SHA-256 over their
//! inputs and options ([`cache`]). Records and the cached favicon set live in
//! `.sitepack-cache/`, outside the output directory, so a production clean
//! does not throw them away.
//!
//! ## Pure-Rust Everything
//!
//! SCSS (`grass`), CSS (`lightningcss`), JavaScript (`oxc`), SVG (`usvg`),
//! fonts (`write-fonts`, `ttf2woff2`) and raster images (`image`,
//! `imagequant`) are all handled by statically linked Rust crates.
//! No Node, no ImageMagick, no system libraries.

pub mod assets;
pub mod cache;
pub mod clean;
pub mod config;
pub mod favicon;
pub mod iconfont;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod script;
pub mod style;
pub mod templates;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
