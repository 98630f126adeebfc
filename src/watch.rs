//! Development watch mode: rebuild when project files change.
//!
//! The project root is watched recursively. Each filesystem event path is
//! classified by [`classify_change`]:
//!
//! | Path | Effect |
//! |---|---|
//! | inside the output directory | ignored |
//! | hidden, editor temp, or under a dot-directory (`.git`, cache) | ignored |
//! | the generated icon fonts or their SCSS partial | ignored |
//! | the config file | config reloaded, then rebuild |
//! | matches `iconfont.watch` | rebuild (icon font regenerates) |
//! | anything else | rebuild |
//!
//! Events are debounced: after the first relevant event, the loop keeps
//! draining until the watcher has been quiet for [`DEBOUNCE`]. Rebuilds
//! always use the development profile, so nothing is cleaned.

use crate::config::{self, BuildProfile, CONFIG_FILENAME, ConfigError, Project};
use crate::iconfont;
use crate::imaging::ImageBackend;
use crate::pipeline::{self, BuildError, BuildEvent, BuildSummary};
use notify::{EventKind, RecursiveMode, Watcher};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;
use thiserror::Error;

/// Quiet period that closes a batch of changes.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// How a changed path affects the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Ignored,
    Config,
    Icon,
    Source,
}

/// Paths the build itself writes into the source tree.
struct Generated {
    fonts: Vec<PathBuf>,
    css: PathBuf,
}

/// Everything needed to classify paths for one loaded config.
pub struct Classifier {
    root: PathBuf,
    output: PathBuf,
    config_file: PathBuf,
    icons: Regex,
    generated: Generated,
}

impl Classifier {
    pub fn new(project: &Project, config_file: &Path) -> Result<Self, regex::Error> {
        let iconfont = &project.config.iconfont;
        Ok(Self {
            root: project.root.clone(),
            output: project.output_dir(),
            config_file: config_file.to_path_buf(),
            icons: iconfont::watch_regex(iconfont)?,
            generated: Generated {
                fonts: iconfont::FONT_TYPES
                    .iter()
                    .map(|font_type| project.path(&iconfont.font_path(font_type)))
                    .collect(),
                css: project.path(&iconfont.css_path()),
            },
        })
    }

    /// Classify one event path. Paths outside the root are ignored.
    pub fn classify_change(&self, path: &Path) -> Change {
        if path == self.config_file {
            return Change::Config;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return Change::Ignored;
        };
        if path.starts_with(&self.output)
            || self.generated.fonts.iter().any(|font| path == font)
            || path == self.generated.css
            || relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            || is_temp_file(path)
        {
            return Change::Ignored;
        }
        let slash = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if self.icons.is_match(&slash) {
            Change::Icon
        } else {
            Change::Source
        }
    }
}

fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext, "bak" | "swp" | "swo" | "tmp") || name.ends_with('~')
}

/// Changes collected over one debounce window.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub config: bool,
    pub icons: usize,
    pub sources: usize,
}

impl ChangeBatch {
    pub fn add(&mut self, change: Change) {
        match change {
            Change::Ignored => {}
            Change::Config => self.config = true,
            Change::Icon => self.icons += 1,
            Change::Source => self.sources += 1,
        }
    }

    /// Fold a raw notify event into the batch.
    pub fn add_event(&mut self, classifier: &Classifier, event: &notify::Event) {
        let relevant = match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) => true,
            EventKind::Modify(kind) => !matches!(kind, notify::event::ModifyKind::Metadata(_)),
            _ => false,
        };
        if relevant {
            for path in &event.paths {
                self.add(classifier.classify_change(path));
            }
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        self.config || self.icons > 0 || self.sources > 0
    }
}

fn build_once(
    project: &Project,
    backend: &dyn ImageBackend,
    force: bool,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BuildError> {
    let plan = pipeline::plan(project, BuildProfile::Development)?;
    pipeline::run(&plan, project, backend, force, events)
}

/// Build once, then rebuild on every relevant change until the watcher
/// disconnects.
///
/// `force` bypasses the caches for the first build only. Each build result,
/// success or failure, is handed to `report`; a failing build does not end
/// the session.
pub fn watch(
    root: &Path,
    config_file: Option<&Path>,
    backend: &dyn ImageBackend,
    force: bool,
    events: Option<Sender<BuildEvent>>,
    mut report: impl FnMut(&Result<BuildSummary, BuildError>),
) -> Result<(), WatchError> {
    let root = root.canonicalize()?;
    let config_path = match config_file {
        Some(path) => path.canonicalize()?,
        None => root.join(CONFIG_FILENAME),
    };
    let mut project = config::load_project(&root, config_file)?;
    let mut classifier = Classifier::new(&project, &config_path)?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    if !config_path.starts_with(&root) {
        watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
    }

    report(&build_once(&project, backend, force, events.clone()));
    tracing::info!(root = %root.display(), "watching for changes");

    while let Ok(first) = rx.recv() {
        let mut batch = ChangeBatch::default();
        let mut pending = vec![first];
        loop {
            for res in pending.drain(..) {
                match res {
                    Ok(event) => batch.add_event(&classifier, &event),
                    Err(error) => tracing::warn!(%error, "watch error"),
                }
            }
            match rx.recv_timeout(DEBOUNCE) {
                Ok(res) => pending.push(res),
                Err(_) => break,
            }
        }
        if !batch.needs_rebuild() {
            continue;
        }
        tracing::debug!(?batch, "change batch");

        if batch.config {
            match config::load_project(&root, config_file) {
                Ok(reloaded) => {
                    classifier = Classifier::new(&reloaded, &config_path)?;
                    project = reloaded;
                    tracing::info!("config reloaded");
                }
                Err(error) => {
                    tracing::warn!(%error, "config reload failed, keeping previous config");
                    continue;
                }
            }
        }
        report(&build_once(&project, backend, false, events.clone()));
    }
    Ok(())
}
