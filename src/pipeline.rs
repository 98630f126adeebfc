//! Build planning and execution.
//!
//! A build is declared up front as a list of [`Task`]s plus ordering edges
//! (a [`TaskGraph`]), then run wave by wave:
//!
//! ```text
//! wave 0   clean                                   (production only)
//! wave 1   iconfont  favicon  script  images
//! wave 2   style  fonts  page:about  page:home
//! ```
//!
//! | Edge | Why it exists |
//! |---|---|
//! | `clean → *` | the output tree is emptied before anything writes into it |
//! | `iconfont → style` | the stylesheet imports the generated partial |
//! | `iconfont → fonts` | the generated font is copied with the other fonts |
//! | `favicon → page:*` | pages embed the favicon markup (when injection is on) |
//!
//! Every task in a wave runs concurrently on the rayon pool. After a wave,
//! the first task error aborts the build; later waves never start.
//!
//! [`plan`] checks every configured input before anything runs, so a
//! missing entry file or source directory is reported without touching the
//! output directory. Templates that would render to the same page are
//! rejected there too.

use crate::assets::{self, AssetError, CopyReport, ImageReport};
use crate::clean::{self, CleanError, CleanReport};
use crate::config::{BuildProfile, ConfigError, Project};
use crate::favicon::{self, FaviconError, FaviconReport};
use crate::iconfont::{self, IconFontError, IconFontReport};
use crate::imaging::{CompressOutcome, ImageBackend};
use crate::pages::{self, PageError};
use crate::script::{self, ScriptError, ScriptReport};
use crate::style::{self, StyleError, StyleReport};
use crate::templates::{self, PageDescriptor, TemplateError};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error from a single task, tagged by the module that raised it.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    IconFont(#[from] IconFontError),
    #[error(transparent)]
    Favicon(#[from] FaviconError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("missing {what}: {path}")]
    MissingInput { what: &'static str, path: PathBuf },
    #[error("templates {first} and {second} both render to {output}")]
    DuplicatePage {
        output: String,
        first: String,
        second: String,
    },
    #[error("task {task} failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },
}

// =============================================================================
// Tasks and graph
// =============================================================================

/// One unit of work in the build graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Clean,
    IconFont,
    Favicon,
    Style,
    Script,
    Images,
    Fonts,
    Page(PageDescriptor),
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Clean => f.write_str("clean"),
            Task::IconFont => f.write_str("iconfont"),
            Task::Favicon => f.write_str("favicon"),
            Task::Style => f.write_str("style"),
            Task::Script => f.write_str("script"),
            Task::Images => f.write_str("images"),
            Task::Fonts => f.write_str("fonts"),
            Task::Page(page) => write!(f, "page:{}", page.name),
        }
    }
}

/// The tasks a build runs, in declaration order.
///
/// The clean task is present only for production builds. Disabled sections
/// contribute no task.
pub fn build_task_list(
    project: &Project,
    profile: BuildProfile,
    pages: Vec<PageDescriptor>,
) -> Vec<Task> {
    let config = &project.config;
    let mut tasks = Vec::new();
    if profile.is_production() {
        tasks.push(Task::Clean);
    }
    for (enabled, task) in [
        (config.iconfont.enabled, Task::IconFont),
        (config.favicon.enabled, Task::Favicon),
        (config.style.enabled, Task::Style),
        (config.script.enabled, Task::Script),
        (config.images.enabled, Task::Images),
        (config.fonts.enabled, Task::Fonts),
    ] {
        if enabled {
            tasks.push(task);
        }
    }
    tasks.extend(pages.into_iter().map(Task::Page));
    tasks
}

/// Tasks plus `(before, after)` ordering edges, as indices into the task list.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    edges: Vec<(usize, usize)>,
}

impl TaskGraph {
    /// Derive the ordering edges for `tasks`.
    pub fn new(tasks: Vec<Task>, inject_favicon: bool) -> Self {
        let position = |wanted: &Task| tasks.iter().position(|t| t == wanted);
        let mut edges = Vec::new();

        if let Some(clean) = position(&Task::Clean) {
            edges.extend((0..tasks.len()).filter(|&i| i != clean).map(|i| (clean, i)));
        }
        if let Some(iconfont) = position(&Task::IconFont) {
            for dependent in [Task::Style, Task::Fonts] {
                if let Some(i) = position(&dependent) {
                    edges.push((iconfont, i));
                }
            }
        }
        if let Some(favicon) = position(&Task::Favicon).filter(|_| inject_favicon) {
            for (i, task) in tasks.iter().enumerate() {
                if matches!(task, Task::Page(_)) {
                    edges.push((favicon, i));
                }
            }
        }

        Self { tasks, edges }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Kahn levels: each wave holds the tasks whose predecessors all sit in
    /// earlier waves. Indices within a wave keep declaration order.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut indegree = vec![0usize; self.tasks.len()];
        for &(_, after) in &self.edges {
            indegree[after] += 1;
        }
        let mut done = vec![false; self.tasks.len()];
        let mut waves = Vec::new();

        loop {
            let wave: Vec<usize> = (0..self.tasks.len())
                .filter(|&i| !done[i] && indegree[i] == 0)
                .collect();
            if wave.is_empty() {
                break;
            }
            for &i in &wave {
                done[i] = true;
                for &(before, after) in &self.edges {
                    if before == i {
                        indegree[after] -= 1;
                    }
                }
            }
            waves.push(wave);
        }
        waves
    }
}

/// A validated build, ready to run.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub profile: BuildProfile,
    pub graph: TaskGraph,
}

impl BuildPlan {
    pub fn pages(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.graph.tasks().iter().filter_map(|t| match t {
            Task::Page(page) => Some(page),
            _ => None,
        })
    }
}

fn require(what: &'static str, path: PathBuf, present: bool) -> Result<(), BuildError> {
    if present {
        Ok(())
    } else {
        Err(BuildError::MissingInput { what, path })
    }
}

/// Discover templates, check every enabled task's inputs, and build the graph.
/// Two templates differing only in extension would write the same page.
fn check_unique_outputs(pages: &[PageDescriptor]) -> Result<(), BuildError> {
    let mut seen: HashMap<String, &PageDescriptor> = HashMap::new();
    for page in pages {
        if let Some(first) = seen.insert(page.output_name(), page) {
            return Err(BuildError::DuplicatePage {
                output: page.output_name(),
                first: first.file_name(),
                second: page.file_name(),
            });
        }
    }
    Ok(())
}

pub fn plan(project: &Project, profile: BuildProfile) -> Result<BuildPlan, BuildError> {
    let config = &project.config;
    let template_dir = project.path(&config.templates.dir);
    let pages = templates::discover_templates(&template_dir, &config.templates.extensions)?;
    check_unique_outputs(&pages)?;

    if config.script.enabled {
        let entry = project.path(&config.script.entry);
        require("script entry", entry.clone(), entry.is_file())?;
    }
    if config.style.enabled {
        let entry = project.path(&config.style.entry);
        require("style entry", entry.clone(), entry.is_file())?;
    }
    if config.images.enabled {
        let dir = project.path(&config.images.source);
        require("image directory", dir.clone(), dir.is_dir())?;
    }
    if config.fonts.enabled {
        let dir = project.path(&config.fonts.source);
        // The icon font task creates the font directory when it writes there.
        let generated = config.iconfont.enabled
            && project
                .path(&config.iconfont.font_path(iconfont::FONT_TYPE))
                .starts_with(&dir);
        require("font directory", dir.clone(), dir.is_dir() || generated)?;
    }
    if config.iconfont.enabled {
        let dir = project.path(&config.iconfont.source);
        require("icon directory", dir.clone(), dir.is_dir())?;
    }
    if config.favicon.enabled {
        let logo = project.path(&config.favicon.logo);
        require("favicon logo", logo.clone(), logo.is_file())?;
    }

    let inject = config.favicon.enabled && config.favicon.inject;
    let graph = TaskGraph::new(build_task_list(project, profile, pages), inject);
    Ok(BuildPlan { profile, graph })
}

// =============================================================================
// Execution
// =============================================================================

/// What a finished task produced.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Clean(CleanReport),
    IconFont(IconFontReport),
    Favicon(FaviconReport),
    Style(StyleReport),
    Script(ScriptReport),
    Images(ImageReport),
    Fonts(CopyReport),
    Page(PathBuf),
}

/// Progress events, streamed while the build runs.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    WaveStarted {
        index: usize,
        tasks: Vec<String>,
    },
    TaskFinished {
        task: String,
        outcome: TaskOutcome,
        elapsed: Duration,
    },
    ImageCompressed {
        path: PathBuf,
        outcome: CompressOutcome,
    },
    ImageFailed {
        path: PathBuf,
        error: String,
    },
}

/// Result of a successful build, in task declaration order.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub profile: BuildProfile,
    pub outcomes: Vec<(Task, TaskOutcome)>,
    pub elapsed: Duration,
}

impl BuildSummary {
    pub fn pages(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|(_, o)| match o {
            TaskOutcome::Page(path) => Some(path.as_path()),
            _ => None,
        })
    }
}

/// Shared state of a running build.
struct Context<'a> {
    project: &'a Project,
    backend: &'a dyn ImageBackend,
    events: Option<&'a Sender<BuildEvent>>,
    force: bool,
    favicon_markup: OnceLock<String>,
}

impl Context<'_> {
    fn send(&self, event: BuildEvent) {
        if let Some(tx) = self.events {
            tx.send(event).ok();
        }
    }

    fn execute(&self, task: &Task) -> Result<TaskOutcome, TaskError> {
        let project = self.project;
        Ok(match task {
            Task::Clean => TaskOutcome::Clean(clean::clean_output(project)?),
            Task::IconFont => TaskOutcome::IconFont(iconfont::build_iconfont(project, self.force)?),
            Task::Favicon => {
                let report = favicon::build_favicons(project, self.backend, self.force)?;
                self.favicon_markup.set(report.markup.clone()).ok();
                TaskOutcome::Favicon(report)
            }
            Task::Style => TaskOutcome::Style(style::build_style(project)?),
            Task::Script => TaskOutcome::Script(script::build_script(project)?),
            Task::Images => {
                TaskOutcome::Images(assets::build_images(project, self.backend, self.events)?)
            }
            Task::Fonts => TaskOutcome::Fonts(assets::build_fonts(project)?),
            Task::Page(page) => {
                let markup = project
                    .config
                    .favicon
                    .inject
                    .then(|| self.favicon_markup.get())
                    .flatten()
                    .map(String::as_str);
                TaskOutcome::Page(pages::render_page(project, page, markup)?)
            }
        })
    }
}

/// Run `plan`. `force` bypasses the favicon and icon-font caches.
///
/// Events go to `events` when given; the sender is dropped when the build
/// returns, which ends a receiver loop on the other side.
pub fn run(
    plan: &BuildPlan,
    project: &Project,
    backend: &dyn ImageBackend,
    force: bool,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BuildError> {
    let start = Instant::now();
    let ctx = Context {
        project,
        backend,
        events: events.as_ref(),
        force,
        favicon_markup: OnceLock::new(),
    };
    let tasks = plan.graph.tasks();
    let mut finished: Vec<(usize, TaskOutcome)> = Vec::with_capacity(tasks.len());

    for (index, wave) in plan.graph.waves().into_iter().enumerate() {
        ctx.send(BuildEvent::WaveStarted {
            index,
            tasks: wave.iter().map(|&i| tasks[i].to_string()).collect(),
        });

        let results: Vec<Result<(usize, TaskOutcome), BuildError>> = wave
            .par_iter()
            .map(|&i| {
                let task = &tasks[i];
                let task_start = Instant::now();
                let outcome = ctx.execute(task).map_err(|source| BuildError::Task {
                    task: task.to_string(),
                    source,
                })?;
                tracing::debug!(task = %task, elapsed = ?task_start.elapsed(), "task finished");
                ctx.send(BuildEvent::TaskFinished {
                    task: task.to_string(),
                    outcome: outcome.clone(),
                    elapsed: task_start.elapsed(),
                });
                Ok((i, outcome))
            })
            .collect();

        for result in results {
            finished.push(result?);
        }
    }

    finished.sort_by_key(|(i, _)| *i);
    Ok(BuildSummary {
        profile: plan.profile,
        outcomes: finished
            .into_iter()
            .map(|(i, outcome)| (tasks[i].clone(), outcome))
            .collect(),
        elapsed: start.elapsed(),
    })
}
