//! Script pipeline: ES module entry → one minified classic script.
//!
//! ## Bundling
//!
//! Starting at the entry, every static `import` / `export ... from` with a
//! relative specifier is followed. A specifier resolves to the first existing
//! file of:
//!
//! 1. the path as written
//! 2. the path + `.js`
//! 3. the path + `.mjs`
//! 4. `<path>/index.js`
//!
//! Bare specifiers (`lodash`) are errors. Import cycles are allowed: a module
//! reached again while it is still evaluating exposes the bindings it has
//! initialised so far, as ES modules do.
//!
//! Each module becomes one function in a table. A module runs once, on the
//! first `__sitepack_require` of its id, and its exports object is cached:
//!
//! ```text
//! (function () {
//! "use strict";
//! var __sitepack_modules = [
//! function (__sitepack_exports, __sitepack_require) {
//! __sitepack_define(__sitepack_exports, { "count": function () { return count; } });
//! var __sitepack_m1 = __sitepack_require(1);
//! ...module body...
//! },
//! ...
//! ];
//! ...require / define / star helpers...
//! __sitepack_require(0);   // the entry is always module 0
//! })();
//! ```
//!
//! Exports are getters over the module's own bindings, so importers always
//! read the current value, and function declarations stay hoisted. Import
//! declarations are removed and every reference to an imported binding is
//! rewritten into a property read on the dependency's exports object:
//! `inc()` becomes `(0, __sitepack_m1["inc"])()`.
//!
//! ## Output
//!
//! Legal comments (`/*!`, `@license`, `@preserve`) are collected from every
//! module into `<output>.LICENSE.txt`, then the bundle is compressed and
//! mangled with `oxc` for ES5-era engines with all comments dropped. A
//! pointer comment to the license file is appended after the code.
//!
//! The linker records where every token of the linked script came from; the
//! minifier's map is resolved through that record, so the written map lists
//! the project's module files as its `sources`.

use crate::config::{Project, ScriptConfig};
use crate::style::{file_name, sibling_with_suffix};
use oxc::allocator::Allocator;
use oxc::ast::AstKind;
use oxc::ast::ast::{
    BindingIdentifier, Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier,
    ModuleExportName, Statement,
};
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::{AstNodes, Scoping, SemanticBuilder};
use oxc::span::{GetSpan, SourceType};
use oxc_compat::EngineTargets;
use parcel_sourcemap::{OriginalLocation, SourceMap, SourceMapError};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read module {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("syntax error in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{importer}: cannot resolve '{specifier}'")]
    Unresolved { importer: PathBuf, specifier: String },
    #[error("{importer}: bare specifier '{specifier}' is not supported (only relative imports)")]
    BareSpecifier { importer: PathBuf, specifier: String },
    #[error("source map error: {0}")]
    SourceMap(#[from] SourceMapError),
}

const EXPORTS: &str = "__sitepack_exports";
const REQUIRE: &str = "__sitepack_require";
const DEFINE: &str = "__sitepack_define";
const STAR: &str = "__sitepack_star";
const MODULES: &str = "__sitepack_modules";
const DEFAULT_LOCAL: &str = "__sitepack_default";

/// Module loader shared by every bundle. Names match the constants above.
const RUNTIME: &str = r#"var __sitepack_cache = {};
function __sitepack_require(id) {
if (id in __sitepack_cache) return __sitepack_cache[id];
var exports = __sitepack_cache[id] = {};
__sitepack_modules[id].call(undefined, exports, __sitepack_require);
return exports;
}
function __sitepack_define(exports, getters) {
for (var name in getters) Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
}
function __sitepack_star(exports, source) {
Object.keys(source).forEach(function (name) {
if (name !== "default" && !Object.prototype.hasOwnProperty.call(exports, name)) {
Object.defineProperty(exports, name, { enumerable: true, get: function () { return source[name]; } });
}
});
}
"#;

fn module_var(index: usize) -> String {
    format!("__sitepack_m{index}")
}

/// Engines without ES2015 syntax, so compression never introduces any.
fn es5_targets() -> EngineTargets {
    EngineTargets::parse_versions(
        [
            ("chrome", "40"),
            ("edge", "12"),
            ("firefox", "30"),
            ("ios", "8"),
            ("safari", "8"),
        ]
        .into_iter()
        .map(|(engine, version)| (engine.to_string(), version.to_string()))
        .collect(),
    )
}

// =============================================================================
// Per-module analysis
// =============================================================================

/// A text replacement over a byte range of the module source.
#[derive(Debug, Clone, PartialEq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Debug, Clone, PartialEq)]
enum ImportBinding {
    Named { imported: String, local: String },
    Default { local: String },
    Namespace { local: String },
}

#[derive(Debug, Clone, PartialEq)]
struct ImportDecl {
    start: usize,
    end: usize,
    specifier: String,
    bindings: Vec<ImportBinding>,
}

/// How a reference to an imported binding sits in its parent expression.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RefPosition {
    Value,
    /// `f()` or `` f`...` ``: must be called without a `this`.
    Callee,
    /// `{ f }`: needs an explicit key once rewritten.
    Shorthand,
}

/// One use of an imported binding in the module body.
#[derive(Debug, Clone, PartialEq)]
struct ImportRef {
    start: usize,
    end: usize,
    local: String,
    position: RefPosition,
}

/// Where the value of an exported name comes from.
#[derive(Debug, Clone, PartialEq)]
enum ExportValue {
    /// A binding in this module's scope.
    Local(String),
    /// A named export of another module.
    Reexport { specifier: String, imported: String },
    /// The whole exports object of another module.
    Namespace { specifier: String },
}

/// Module syntax that matters for bundling, detached from the AST.
#[derive(Debug, Clone, Default, PartialEq)]
struct ModuleSyntax {
    imports: Vec<ImportDecl>,
    refs: Vec<ImportRef>,
    /// Removals of `export` keywords and re-export statements.
    edits: Vec<Edit>,
    exports: Vec<(String, ExportValue)>,
    /// `export * from '...'` sources.
    star_exports: Vec<String>,
    legal_comments: Vec<String>,
}

impl ModuleSyntax {
    /// Every specifier this module loads, in source order, deduplicated.
    fn requests(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let reexports = self.exports.iter().filter_map(|(_, v)| match v {
            ExportValue::Reexport { specifier, .. } | ExportValue::Namespace { specifier } => {
                Some(specifier)
            }
            ExportValue::Local(_) => None,
        });
        for spec in self
            .imports
            .iter()
            .map(|i| &i.specifier)
            .chain(reexports)
            .chain(self.star_exports.iter())
        {
            if seen.insert(spec.clone()) {
                out.push(spec.clone());
            }
        }
        out
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// True for comments terser would extract: `/*!`, `//!`, `@license`, `@preserve`.
fn is_legal_comment(text: &str) -> bool {
    let body = text.trim_start_matches('/').trim_start_matches('*');
    body.starts_with('!') || text.contains("@license") || text.contains("@preserve")
}

/// Every resolved reference to `local` in the module.
fn binding_refs(local: &BindingIdentifier, scoping: &Scoping, nodes: &AstNodes) -> Vec<ImportRef> {
    scoping
        .get_resolved_references(local.symbol_id())
        .map(|reference| {
            let node = reference.node_id();
            let span = nodes.kind(node).span();
            let position = match nodes.parent_kind(node) {
                AstKind::CallExpression(call) if call.callee.span() == span => RefPosition::Callee,
                AstKind::TaggedTemplateExpression(tagged) if tagged.tag.span() == span => {
                    RefPosition::Callee
                }
                AstKind::ObjectProperty(prop) if prop.shorthand => RefPosition::Shorthand,
                _ => RefPosition::Value,
            };
            ImportRef {
                start: span.start as usize,
                end: span.end as usize,
                local: local.name.to_string(),
                position,
            }
        })
        .collect()
}

fn analyze(path: &Path, source: &str) -> Result<ModuleSyntax, ScriptError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(err) = ret.errors.first() {
        return Err(ScriptError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        });
    }
    let program = ret.program;
    let semantic = SemanticBuilder::new().build(&program).semantic;
    let mut syntax = ModuleSyntax::default();

    for comment in &program.comments {
        let text = &source[comment.span.start as usize..comment.span.end as usize];
        if is_legal_comment(text) {
            syntax.legal_comments.push(text.to_string());
        }
    }

    for stmt in &program.body {
        let span = stmt.span();
        let (start, end) = (span.start as usize, span.end as usize);
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let Some(specifiers) = &decl.specifiers else {
                    // `import './side-effect'`
                    syntax.imports.push(ImportDecl {
                        start,
                        end,
                        specifier: decl.source.value.to_string(),
                        bindings: Vec::new(),
                    });
                    continue;
                };
                for specifier in specifiers {
                    syntax.refs.extend(binding_refs(
                        specifier.local(),
                        semantic.scoping(),
                        semantic.nodes(),
                    ));
                }
                let bindings = specifiers
                    .iter()
                    .map(|s| match s {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => ImportBinding::Named {
                            imported: export_name(&s.imported),
                            local: s.local.name.to_string(),
                        },
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            ImportBinding::Default {
                                local: s.local.name.to_string(),
                            }
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            ImportBinding::Namespace {
                                local: s.local.name.to_string(),
                            }
                        }
                    })
                    .collect();
                syntax.imports.push(ImportDecl {
                    start,
                    end,
                    specifier: decl.source.value.to_string(),
                    bindings,
                });
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(declaration) = &decl.declaration {
                    // `export const a = 1` → `const a = 1`
                    syntax.edits.push(Edit {
                        start,
                        end: declaration.span().start as usize,
                        text: String::new(),
                    });
                    for name in declared_names(declaration) {
                        syntax.exports.push((name.clone(), ExportValue::Local(name)));
                    }
                    continue;
                }
                syntax.edits.push(Edit {
                    start,
                    end,
                    text: String::new(),
                });
                for spec in &decl.specifiers {
                    let exported = export_name(&spec.exported);
                    let local = export_name(&spec.local);
                    let value = match &decl.source {
                        Some(src) => ExportValue::Reexport {
                            specifier: src.value.to_string(),
                            imported: local,
                        },
                        None => ExportValue::Local(local),
                    };
                    syntax.exports.push((exported, value));
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let inner = decl.declaration.span();
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                        Some(f.id.as_ref().map_or_else(
                            || {
                                // Named in place so the declaration stays hoisted.
                                let at = f.params.span.start as usize;
                                let pad = if source[..at].ends_with(char::is_whitespace) {
                                    ""
                                } else {
                                    " "
                                };
                                syntax.edits.push(Edit {
                                    start: at,
                                    end: at,
                                    text: format!("{pad}{DEFAULT_LOCAL}"),
                                });
                                DEFAULT_LOCAL.to_string()
                            },
                            |id| id.name.to_string(),
                        ))
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                        c.id.as_ref().map(|id| id.name.to_string())
                    }
                    _ => None,
                };
                let local = match named {
                    Some(name) => {
                        syntax.edits.push(Edit {
                            start,
                            end: inner.start as usize,
                            text: String::new(),
                        });
                        name
                    }
                    None => {
                        syntax.edits.push(Edit {
                            start,
                            end: inner.start as usize,
                            text: format!("var {DEFAULT_LOCAL} = "),
                        });
                        syntax.edits.push(Edit {
                            start: inner.end as usize,
                            end: inner.end as usize,
                            text: ";".to_string(),
                        });
                        DEFAULT_LOCAL.to_string()
                    }
                };
                syntax
                    .exports
                    .push(("default".to_string(), ExportValue::Local(local)));
            }
            Statement::ExportAllDeclaration(decl) => {
                syntax.edits.push(Edit {
                    start,
                    end,
                    text: String::new(),
                });
                let specifier = decl.source.value.to_string();
                match &decl.exported {
                    Some(name) => syntax
                        .exports
                        .push((export_name(name), ExportValue::Namespace { specifier })),
                    None => syntax.star_exports.push(specifier),
                }
            }
            _ => {}
        }
    }

    Ok(syntax)
}

fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Module graph
// =============================================================================

#[derive(Debug)]
struct Module {
    path: PathBuf,
    source: String,
    syntax: ModuleSyntax,
    /// Specifier → id of the resolved module.
    deps: HashMap<String, usize>,
}

/// Resolve a relative specifier against the importing module.
fn resolve(importer: &Path, specifier: &str) -> Result<PathBuf, ScriptError> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return Err(ScriptError::BareSpecifier {
            importer: importer.to_path_buf(),
            specifier: specifier.to_string(),
        });
    }
    let base = importer.parent().unwrap_or(Path::new("."));
    let target = base.join(specifier);
    let candidates = [
        target.clone(),
        sibling_with_suffix(&target, ".js"),
        sibling_with_suffix(&target, ".mjs"),
        target.join("index.js"),
    ];
    candidates
        .into_iter()
        .find(|c| c.is_file())
        .ok_or_else(|| ScriptError::Unresolved {
            importer: importer.to_path_buf(),
            specifier: specifier.to_string(),
        })
}

#[derive(Default)]
struct GraphBuilder {
    modules: Vec<Module>,
    ids: HashMap<PathBuf, usize>,
    /// Ids in the order their evaluation finishes at runtime.
    order: Vec<usize>,
}

impl GraphBuilder {
    /// Depth-first. A module's id is fixed when first seen, so an import
    /// cycle refers back to a module that has not finished yet.
    fn visit(&mut self, path: &Path) -> Result<usize, ScriptError> {
        let key = path.canonicalize().map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }

        let source = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let syntax = analyze(path, &source)?;
        let requests = syntax.requests();

        let id = self.modules.len();
        self.ids.insert(key, id);
        self.modules.push(Module {
            path: path.to_path_buf(),
            source,
            syntax,
            deps: HashMap::new(),
        });

        let mut deps = HashMap::new();
        for specifier in requests {
            let resolved = resolve(path, &specifier)?;
            let dep = self.visit(&resolved)?;
            deps.insert(specifier, dep);
        }
        self.modules[id].deps = deps;
        self.order.push(id);
        Ok(id)
    }
}

// =============================================================================
// Linking
// =============================================================================

/// A run of the linked module text.
#[derive(Debug, PartialEq)]
enum Piece<'a> {
    /// Untouched source starting at byte `offset`.
    Source { offset: usize, text: &'a str },
    /// Replacement for the source range starting at byte `offset`.
    Replaced { offset: usize, text: String },
}

/// Split `source` into untouched runs and replacements. Edits overlapping
/// an earlier one are dropped.
fn splice(source: &str, mut edits: Vec<Edit>) -> Vec<Piece<'_>> {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut pieces = Vec::new();
    let mut last = 0;
    for edit in edits {
        if edit.start < last {
            continue;
        }
        if edit.start > last {
            pieces.push(Piece::Source {
                offset: last,
                text: &source[last..edit.start],
            });
        }
        if !edit.text.is_empty() {
            pieces.push(Piece::Replaced {
                offset: edit.start,
                text: edit.text,
            });
        }
        last = edit.end;
    }
    if last < source.len() {
        pieces.push(Piece::Source {
            offset: last,
            text: &source[last..],
        });
    }
    pieces
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn member(object: &str, name: &str) -> String {
    format!("{object}[{}]", js_string(name))
}

/// Advance a zero-based line / UTF-16 column position past `c`.
fn step(line: &mut u32, column: &mut u32, c: char) {
    if c == '\n' {
        *line += 1;
        *column = 0;
    } else {
        *column += c.len_utf16() as u32;
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn starts_token(prev: Option<char>, c: char) -> bool {
    if c.is_whitespace() {
        return false;
    }
    match prev {
        None => true,
        Some(p) => p.is_whitespace() || !is_word(p) || !is_word(c),
    }
}

/// Byte offset → line / UTF-16 column in one module's source.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self
            .starts
            .partition_point(|&s| s <= offset)
            .saturating_sub(1);
        let column = self.source[self.starts[line]..offset].encode_utf16().count();
        (line as u32, column as u32)
    }
}

/// Accumulates the linked script and a map from it back to module sources.
struct Linker {
    code: String,
    line: u32,
    column: u32,
    map: SourceMap,
}

impl Linker {
    fn new() -> Self {
        Self {
            code: String::new(),
            line: 0,
            column: 0,
            map: SourceMap::new("/"),
        }
    }

    /// Generated glue; carries no mapping.
    fn push(&mut self, text: &str) {
        for c in text.chars() {
            step(&mut self.line, &mut self.column, c);
        }
        self.code.push_str(text);
    }

    fn mark(&mut self, source: u32, (line, column): (u32, u32)) {
        self.map.add_mapping(
            self.line,
            self.column,
            Some(OriginalLocation::new(line, column, source, None)),
        );
    }

    /// Module text copied verbatim, mapped at every token start.
    fn push_original(&mut self, text: &str, source: u32, from: (u32, u32)) {
        let (mut line, mut column) = from;
        let mut prev = None;
        for c in text.chars() {
            if starts_token(prev, c) {
                self.mark(source, (line, column));
            }
            step(&mut self.line, &mut self.column, c);
            step(&mut line, &mut column, c);
            prev = Some(c);
        }
        self.code.push_str(text);
    }
}

/// Path recorded in the source map: relative to `root`, `/`-separated.
fn source_label(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_module(linker: &mut Linker, module: &Module, source_id: u32) {
    let dep_id = |spec: &str| module.deps.get(spec).copied().unwrap_or_default();
    let dep = |spec: &str| module_var(dep_id(spec));
    let syntax = &module.syntax;

    // Imported local → expression reading it from the dependency.
    let mut reads: HashMap<&str, String> = HashMap::new();
    for import in &syntax.imports {
        let source = dep(&import.specifier);
        for binding in &import.bindings {
            let (local, read) = match binding {
                ImportBinding::Named { imported, local } => (local, member(&source, imported)),
                ImportBinding::Default { local } => (local, member(&source, "default")),
                ImportBinding::Namespace { local } => (local, source.clone()),
            };
            reads.insert(local.as_str(), read);
        }
    }

    let mut edits = syntax.edits.clone();
    for import in &syntax.imports {
        edits.push(Edit {
            start: import.start,
            end: import.end,
            text: String::new(),
        });
    }
    for r in &syntax.refs {
        let Some(read) = reads.get(r.local.as_str()) else {
            continue;
        };
        let text = match r.position {
            RefPosition::Value => read.clone(),
            RefPosition::Callee => format!("(0, {read})"),
            RefPosition::Shorthand => format!("{}: {read}", r.local),
        };
        edits.push(Edit {
            start: r.start,
            end: r.end,
            text,
        });
    }

    linker.push(&format!("function ({EXPORTS}, {REQUIRE}) {{\n"));
    if !syntax.exports.is_empty() {
        let getters: Vec<String> = syntax
            .exports
            .iter()
            .map(|(name, value)| {
                let read = match value {
                    ExportValue::Local(local) => reads
                        .get(local.as_str())
                        .cloned()
                        .unwrap_or_else(|| local.clone()),
                    ExportValue::Reexport {
                        specifier,
                        imported,
                    } => member(&dep(specifier), imported),
                    ExportValue::Namespace { specifier } => dep(specifier),
                };
                format!("{}: function () {{ return {read}; }}", js_string(name))
            })
            .collect();
        linker.push(&format!(
            "{DEFINE}({EXPORTS}, {{ {} }});\n",
            getters.join(", ")
        ));
    }
    for specifier in syntax.requests() {
        linker.push(&format!(
            "var {} = {REQUIRE}({});\n",
            dep(&specifier),
            dep_id(&specifier)
        ));
    }
    for specifier in &syntax.star_exports {
        linker.push(&format!("{STAR}({EXPORTS}, {});\n", dep(specifier)));
    }

    let lines = LineIndex::new(&module.source);
    for piece in splice(&module.source, edits) {
        match piece {
            Piece::Source { offset, text } => {
                linker.push_original(text, source_id, lines.position(offset));
            }
            Piece::Replaced { offset, text } => {
                linker.mark(source_id, lines.position(offset));
                linker.push(&text);
            }
        }
    }
    linker.push("\n}");
}

/// The unminified script plus what went into it.
struct Linked {
    code: String,
    /// Linked script → module sources.
    map: SourceMap,
    modules: Vec<Module>,
    order: Vec<usize>,
}

/// Wrap every module reachable from `entry` into one unminified script.
/// Source map paths are taken relative to `root`.
fn link(entry: &Path, root: &Path) -> Result<Linked, ScriptError> {
    let mut graph = GraphBuilder::default();
    graph.visit(entry)?;

    let mut linker = Linker::new();
    linker.push(&format!("(function () {{\n\"use strict\";\nvar {MODULES} = [\n"));
    for (id, module) in graph.modules.iter().enumerate() {
        let source = linker.map.add_source(&source_label(&module.path, root));
        linker
            .map
            .set_source_content(source as usize, &module.source)?;
        if id > 0 {
            linker.push(",\n");
        }
        render_module(&mut linker, module, source);
    }
    linker.push("\n];\n");
    linker.push(RUNTIME);
    linker.push(&format!("{REQUIRE}(0);\n}})();\n"));

    Ok(Linked {
        code: linker.code,
        map: linker.map,
        modules: graph.modules,
        order: graph.order,
    })
}

// =============================================================================
// Bundle + minify
// =============================================================================

/// The bundled, minified script, not yet written.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    pub map: Option<String>,
    /// Deduplicated legal comments in evaluation order.
    pub legal_comments: Vec<String>,
    /// Module paths in evaluation order (entry last).
    pub modules: Vec<PathBuf>,
}

/// Bundle and minify `entry`. Map sources are relative to `root`.
pub fn bundle(entry: &Path, root: &Path, config: &ScriptConfig) -> Result<Bundle, ScriptError> {
    let linked = link(entry, root)?;
    let mut modules: Vec<Option<Module>> = linked.modules.into_iter().map(Some).collect();
    let ordered: Vec<Module> = linked
        .order
        .iter()
        .filter_map(|&id| modules.get_mut(id).and_then(Option::take))
        .collect();

    let mut legal_comments = Vec::new();
    let mut seen = HashSet::new();
    for comment in ordered.iter().flat_map(|m| &m.syntax.legal_comments) {
        if seen.insert(comment.as_str()) {
            legal_comments.push(comment.clone());
        }
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &linked.code, SourceType::cjs()).parse();
    if let Some(err) = ret.errors.first() {
        return Err(ScriptError::Parse {
            path: entry.to_path_buf(),
            message: err.to_string(),
        });
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions {
            target: es5_targets(),
            ..CompressOptions::smallest()
        }),
    };
    let minified = Minifier::new(options).minify(&allocator, &mut program);
    let generated = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            source_map_path: config.source_map.then(|| PathBuf::from("linked.js")),
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program);

    let map = match generated.map {
        Some(minified_map) => {
            let mut link_map = linked.map;
            let mut out = SourceMap::new("/");
            out.add_sources(link_map.get_sources().clone());
            for (index, content) in link_map.get_sources_content().iter().enumerate() {
                out.set_source_content(index, content)?;
            }
            for token in minified_map.get_tokens() {
                if token.get_source_id().is_none() {
                    continue;
                }
                let original = link_map
                    .find_closest_mapping(token.get_src_line(), token.get_src_col())
                    .and_then(|m| m.original);
                let Some(original) = original else {
                    continue;
                };
                let name = token
                    .get_name_id()
                    .and_then(|id| minified_map.get_name(id))
                    .map(|name| out.add_name(name));
                out.add_mapping(
                    token.get_dst_line(),
                    token.get_dst_col(),
                    Some(OriginalLocation::new(
                        original.original_line,
                        original.original_column,
                        original.source,
                        name,
                    )),
                );
            }
            Some(out.to_json(None)?)
        }
        None => None,
    };

    Ok(Bundle {
        code: generated.code,
        map,
        legal_comments,
        modules: ordered.into_iter().map(|m| m.path).collect(),
    })
}

/// What the script task wrote.
#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub modules: usize,
    pub map: Option<PathBuf>,
    pub license: Option<PathBuf>,
}

/// Run the script task for `project`.
pub fn build_script(project: &Project) -> Result<ScriptReport, ScriptError> {
    let config = &project.config.script;
    let entry = project.path(&config.entry);
    let bundle = bundle(&entry, &project.root, config)?;

    let output = project.output_path(&config.output);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut code = bundle.code;
    if !code.ends_with('\n') {
        code.push('\n');
    }

    let license = if config.extract_comments && !bundle.legal_comments.is_empty() {
        let path = sibling_with_suffix(&output, ".LICENSE.txt");
        fs::write(&path, bundle.legal_comments.join("\n\n") + "\n")?;
        code.push_str(&format!(
            "/*! For license information please see {} */\n",
            file_name(&path)
        ));
        Some(path)
    } else {
        None
    };

    let map = match bundle.map {
        Some(json) => {
            let path = sibling_with_suffix(&output, ".map");
            fs::write(&path, json)?;
            code.push_str(&format!("//# sourceMappingURL={}\n", file_name(&path)));
            Some(path)
        }
        None => None,
    };

    fs::write(&output, &code)?;
    Ok(ScriptReport {
        output,
        bytes: code.len() as u64,
        modules: bundle.modules.len(),
        map,
        license,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use boa_engine::{Context, Source};
    use tempfile::TempDir;

    fn write_files(root: &Path, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    fn joined(pieces: &[Piece]) -> String {
        pieces
            .iter()
            .map(|p| match p {
                Piece::Source { text, .. } => text.to_string(),
                Piece::Replaced { text, .. } => text.clone(),
            })
            .collect()
    }

    /// Bundle `files` (entry `index.js`) and run the result in a JS engine,
    /// returning the numeric value of `expr` afterwards.
    fn run_bundle(files: &[(&str, &str)], expr: &str) -> f64 {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), files);
        let bundle = bundle(
            &tmp.path().join("index.js"),
            tmp.path(),
            &ScriptConfig::default(),
        )
        .unwrap();
        let mut context = Context::default();
        context
            .eval(Source::from_bytes(bundle.code.as_bytes()))
            .unwrap();
        context
            .eval(Source::from_bytes(expr.as_bytes()))
            .unwrap()
            .as_number()
            .unwrap()
    }

    // =========================================================================
    // analyze
    // =========================================================================

    #[test]
    fn analyze_collects_imports() {
        let syntax = analyze(
            Path::new("a.js"),
            "import d, { x as y, z } from './b.js';\nimport * as ns from './c';\nimport './side';\n",
        )
        .unwrap();
        assert_eq!(syntax.imports.len(), 3);
        assert_eq!(
            syntax.imports[0].bindings,
            vec![
                ImportBinding::Default { local: "d".into() },
                ImportBinding::Named {
                    imported: "x".into(),
                    local: "y".into()
                },
                ImportBinding::Named {
                    imported: "z".into(),
                    local: "z".into()
                },
            ]
        );
        assert_eq!(
            syntax.imports[1].bindings,
            vec![ImportBinding::Namespace { local: "ns".into() }]
        );
        assert!(syntax.imports[2].bindings.is_empty());
        assert_eq!(syntax.requests(), vec!["./b.js", "./c", "./side"]);
    }

    #[test]
    fn analyze_classifies_import_references() {
        let source = "import { f, v } from './m';\nf(v);\nconst o = { v };\nf`t`;\n";
        let syntax = analyze(Path::new("a.js"), source).unwrap();
        let mut refs: Vec<(&str, RefPosition)> = syntax
            .refs
            .iter()
            .map(|r| (&source[r.start..r.end], r.position))
            .collect();
        refs.sort_by_key(|(_, p)| format!("{p:?}"));
        assert_eq!(
            refs,
            vec![
                ("f", RefPosition::Callee),
                ("f", RefPosition::Callee),
                ("v", RefPosition::Shorthand),
                ("v", RefPosition::Value),
            ]
        );
    }

    #[test]
    fn shadowed_names_are_not_import_references() {
        let syntax = analyze(
            Path::new("a.js"),
            "import { x } from './m';\nfunction g(x) { return x; }\nexport const y = x;\n",
        )
        .unwrap();
        assert_eq!(syntax.refs.len(), 1);
    }

    #[test]
    fn analyze_collects_exports() {
        let syntax = analyze(
            Path::new("a.js"),
            "export const a = 1, b = 2;\nexport function f() {}\nconst c = 3;\nexport { c as d };\nexport { e } from './e';\nexport * from './s';\nexport default 42;\n",
        )
        .unwrap();
        let names: Vec<&str> = syntax.exports.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "f", "d", "e", "default"]);
        assert_eq!(syntax.star_exports, vec!["./s"]);
        assert_eq!(
            syntax.exports[3].1,
            ExportValue::Local("c".into())
        );
        assert_eq!(
            syntax.exports[4].1,
            ExportValue::Reexport {
                specifier: "./e".into(),
                imported: "e".into()
            }
        );
    }

    #[test]
    fn analyze_collects_legal_comments() {
        let syntax = analyze(
            Path::new("a.js"),
            "/*! lib v1 | MIT */\n// plain\n/** @license Apache-2.0 */\nexport const x = 1;\n",
        )
        .unwrap();
        assert_eq!(syntax.legal_comments.len(), 2);
        assert!(syntax.legal_comments[0].contains("lib v1"));
        assert!(syntax.legal_comments[1].contains("Apache-2.0"));
    }

    #[test]
    fn analyze_reports_syntax_errors() {
        let result = analyze(Path::new("bad.js"), "const = ;");
        assert!(matches!(result, Err(ScriptError::Parse { .. })));
    }

    #[test]
    fn legal_comment_detection() {
        assert!(is_legal_comment("/*! MIT */"));
        assert!(is_legal_comment("/**! MIT */"));
        assert!(is_legal_comment("//! note"));
        assert!(is_legal_comment("/* @preserve */"));
        assert!(!is_legal_comment("/* plain */"));
        assert!(!is_legal_comment("// plain !"));
    }

    #[test]
    fn splice_replaces_ranges() {
        let pieces = splice(
            "export const a = b;",
            vec![
                Edit {
                    start: 0,
                    end: 7,
                    text: String::new(),
                },
                Edit {
                    start: 17,
                    end: 18,
                    text: "m[\"b\"]".into(),
                },
            ],
        );
        assert_eq!(joined(&pieces), "const a = m[\"b\"];");
        assert_eq!(
            pieces[0],
            Piece::Source {
                offset: 7,
                text: "const a = "
            }
        );
    }

    #[test]
    fn line_index_positions() {
        let index = LineIndex::new("ab\ncdé\nf");
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(4), (1, 1));
        assert_eq!(index.position(8), (2, 0));
    }

    // =========================================================================
    // Resolution and graph
    // =========================================================================

    #[test]
    fn resolve_tries_extensions_and_index() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("main.js", ""),
                ("a.js", ""),
                ("b.mjs", ""),
                ("lib/index.js", ""),
            ],
        );
        let importer = tmp.path().join("main.js");
        assert_eq!(resolve(&importer, "./a").unwrap(), tmp.path().join("./a.js"));
        assert_eq!(resolve(&importer, "./b").unwrap(), tmp.path().join("./b.mjs"));
        assert_eq!(
            resolve(&importer, "./lib").unwrap(),
            tmp.path().join("./lib").join("index.js")
        );
        assert!(matches!(
            resolve(&importer, "./missing"),
            Err(ScriptError::Unresolved { .. })
        ));
        assert!(matches!(
            resolve(&importer, "lodash"),
            Err(ScriptError::BareSpecifier { .. })
        ));
    }

    #[test]
    fn entry_is_module_zero_and_evaluates_last() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("index.js", "import { b } from './b';\nimport { c } from './c';\nconsole.log(b, c);\n"),
                ("b.js", "import { c } from './c';\nexport const b = c + 1;\n"),
                ("c.js", "export const c = 1;\n"),
            ],
        );
        let linked = link(&tmp.path().join("index.js"), tmp.path()).unwrap();
        let name = |id: usize| {
            linked.modules[id]
                .path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string()
        };
        assert_eq!(name(0), "index.js");
        let order: Vec<String> = linked.order.iter().map(|&id| name(id)).collect();
        assert_eq!(order, vec!["c.js", "b.js", "index.js"]);
    }

    #[test]
    fn cycle_links_each_module_once() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("a.js", "import './b';\n"),
                ("b.js", "import './a';\n"),
            ],
        );
        let linked = link(&tmp.path().join("a.js"), tmp.path()).unwrap();
        assert_eq!(linked.modules.len(), 2);
        assert_eq!(linked.order, vec![1, 0]);
    }

    #[test]
    fn linked_output_wires_exports() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("index.js", "import greet, { name as who } from './greet';\ngreet(who);\n"),
                ("greet.js", "export const name = 'x';\nexport default function (n) { return n; }\n"),
            ],
        );
        let linked = link(&tmp.path().join("index.js"), tmp.path()).unwrap();
        let code = &linked.code;
        assert!(code.starts_with("(function () {\n\"use strict\";"));
        assert!(code.contains("var __sitepack_m1 = __sitepack_require(1);"));
        assert!(code.contains("(0, __sitepack_m1[\"default\"])(__sitepack_m1[\"name\"]);"));
        assert!(code.contains("function __sitepack_default(n)"));
        assert!(code.contains("\"default\": function () { return __sitepack_default; }"));
        assert!(code.contains("__sitepack_require(0);"));
        assert!(!code.contains("import "));
        assert!(!code.contains("export "));
    }

    // =========================================================================
    // Runtime behavior of the minified bundle
    // =========================================================================

    #[test]
    fn imports_are_live_bindings() {
        let result = run_bundle(
            &[
                (
                    "index.js",
                    "import { count, inc } from './counter';\nimport * as c from './counter';\ninc();\ninc();\nglobalThis.result = count * 10 + c.count;\n",
                ),
                (
                    "counter.js",
                    "export let count = 0;\nexport function inc() { count++; }\n",
                ),
            ],
            "result",
        );
        assert_eq!(result, 22.0);
    }

    #[test]
    fn hoisted_functions_are_reachable_through_a_cycle() {
        let files = [
            (
                "index.js",
                "import { b } from './b';\nexport function a() { return 1; }\nglobalThis.total = b();\n",
            ),
            (
                "b.js",
                "import { a } from './index';\nglobalThis.early = a();\nexport function b() { return a() + 1; }\n",
            ),
        ];
        assert_eq!(run_bundle(&files, "early"), 1.0);
        assert_eq!(run_bundle(&files, "total"), 2.0);
    }

    #[test]
    fn reexports_and_defaults_resolve_at_runtime() {
        let result = run_bundle(
            &[
                (
                    "index.js",
                    "import seven, { one, two } from './lib';\nglobalThis.result = seven() + one + two;\n",
                ),
                (
                    "lib/index.js",
                    "export { one } from './one';\nexport * from './two';\nexport default function () { return 7; }\n",
                ),
                ("lib/one.js", "export const one = 1;\n"),
                ("lib/two.js", "export const two = 2;\nexport default 99;\n"),
            ],
            "result",
        );
        assert_eq!(result, 10.0);
    }

    #[test]
    fn minified_output_stays_es5() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                (
                    "index.js",
                    "import { greet } from './greet';\nvar who = window.name;\nwindow.msg = greet('Hello, ' + who + '!');\n",
                ),
                (
                    "greet.js",
                    "export function greet(text) {\n  return '<p>' + text + '</p>';\n}\n",
                ),
            ],
        );
        let bundle = bundle(
            &tmp.path().join("index.js"),
            tmp.path(),
            &ScriptConfig::default(),
        )
        .unwrap();
        assert!(!bundle.code.contains('`'));
        assert!(!bundle.code.contains("=>"));
    }

    // =========================================================================
    // build_script
    // =========================================================================

    #[test]
    fn build_writes_bundle_map_and_license() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                (
                    "src/js/index.js",
                    "import { add } from './math';\nwindow.result = add(1, 2);\n",
                ),
                (
                    "src/js/math.js",
                    "/*! math-lib | MIT */\nexport function add(a, b) {\n  // sum\n  return a + b;\n}\n",
                ),
            ],
        );
        let project = Project::new(tmp.path(), BuildConfig::default());
        let report = build_script(&project).unwrap();

        assert_eq!(report.output, tmp.path().join("dist/js/bundle.js"));
        assert_eq!(report.modules, 2);

        let code = fs::read_to_string(&report.output).unwrap();
        assert!(!code.contains("math-lib"));
        assert!(!code.contains("// sum"));
        assert!(code.contains("For license information please see bundle.js.LICENSE.txt"));
        assert!(code.contains("//# sourceMappingURL=bundle.js.map"));

        let license = fs::read_to_string(report.license.unwrap()).unwrap();
        assert!(license.contains("math-lib | MIT"));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report.map.unwrap()).unwrap()).unwrap();
        assert_eq!(map["version"], 3);
    }

    #[test]
    fn source_map_lists_every_module() {
        let tmp = TempDir::new().unwrap();
        let math = "export function add(a, b) {\n  return a + b;\n}\n";
        write_files(
            tmp.path(),
            &[
                (
                    "src/js/index.js",
                    "import { add } from './math';\nimport { twice } from './util/twice';\nwindow.result = twice(add(1, 2));\n",
                ),
                ("src/js/math.js", math),
                (
                    "src/js/util/twice.js",
                    "export function twice(n) {\n  return n * 2;\n}\n",
                ),
            ],
        );
        let project = Project::new(tmp.path(), BuildConfig::default());
        let report = build_script(&project).unwrap();
        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report.map.unwrap()).unwrap()).unwrap();

        let sources: Vec<&str> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        for module in ["src/js/index.js", "src/js/math.js", "src/js/util/twice.js"] {
            assert!(sources.contains(&module), "{module} missing from {sources:?}");
        }
        let math_index = sources.iter().position(|s| *s == "src/js/math.js").unwrap();
        assert_eq!(map["sourcesContent"][math_index], math);
        assert!(!map["mappings"].as_str().unwrap().is_empty());
    }

    #[test]
    fn build_without_map_or_extraction() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[("src/js/index.js", "/*! keep */\nwindow.x = 1;\n")],
        );
        let mut config = BuildConfig::default();
        config.script.source_map = false;
        config.script.extract_comments = false;
        let project = Project::new(tmp.path(), config);

        let report = build_script(&project).unwrap();
        assert!(report.map.is_none());
        assert!(report.license.is_none());
        assert!(!tmp.path().join("dist/js/bundle.js.map").exists());
        assert!(!tmp.path().join("dist/js/bundle.js.LICENSE.txt").exists());
    }

    #[test]
    fn missing_entry_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), BuildConfig::default());
        let result = build_script(&project);
        assert!(matches!(result, Err(ScriptError::Read { .. })));
    }
}
