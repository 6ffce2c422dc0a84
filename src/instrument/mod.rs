//! Per-compile-unit AST rewriting.
//!
//! A [`UnitRewriter`] lives for one compile unit: it applies file rules,
//! rewrites each targeted source file (jump-sites, struct fields, raw
//! splices, appended relays and carriers), runs the optimizer and emits
//! the shared globals file. All rewritten files land in the compile
//! working directory; originals are never touched.

use crate::{
    ast::{self, ParseMode},
    config::BuildPaths,
    error::{Result, WeaveError},
    rules::{FileBucket, RuleSet},
    utils,
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

pub mod inject;
pub mod jump;
pub mod optimize;
pub mod trampoline;

use jump::TrampolineJump;
use trampoline::HookLibrary;

/// Name of the generated globals file; emitted at most once per unit.
pub const GLOBALS_FILE: &str = "otel.globals.go";

/// Outcome of one unit rewrite.
#[derive(Debug, Default)]
pub struct RewriteResult {
    /// Original compile-argument path -> rewritten file.
    pub replacements: Vec<(PathBuf, PathBuf)>,
    /// Files to append to the compile argument list (injected files and
    /// the globals file).
    pub additions: Vec<PathBuf>,
    /// Whether any function rule fired; governs globals emission and the
    /// `-complete` strip.
    pub fired: bool,
}

pub struct UnitRewriter<'a> {
    paths: &'a BuildPaths,
    set: &'a RuleSet,
    import_path: String,
    /// Source files as they appear in the compile argument list.
    sources: Vec<PathBuf>,
    out_dir: PathBuf,
    package_name: String,
    hook_libs: HashMap<String, Option<HookLibrary>>,
    hook_decls: Vec<String>,
}

impl<'a> UnitRewriter<'a> {
    pub fn new(
        paths: &'a BuildPaths,
        set: &'a RuleSet,
        import_path: impl Into<String>,
        sources: Vec<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut package_name = set.package_name.clone();
        if package_name.is_empty() {
            // file-rule-only sets may reach interception without a package
            // name; recover it from the first compile source
            if let Some(first) = sources.first() {
                package_name =
                    ast::parser::parse_file(first, ParseMode::PackageOnly)?.package.data;
            }
        }
        if package_name.is_empty() {
            return Err(WeaveError::msg(format!(
                "cannot determine package name for {}",
                set.module_path
            )));
        }
        Ok(Self {
            paths,
            set,
            import_path: import_path.into(),
            sources,
            out_dir: out_dir.into(),
            package_name,
            hook_libs: HashMap::new(),
            hook_decls: Vec::new(),
        })
    }

    pub fn rewrite(mut self) -> Result<RewriteResult> {
        let mut result = RewriteResult::default();

        // file rules run before everything else
        for rule in &self.set.file_rules {
            let staged = self.paths.resolve_hook_lib(&rule.path);
            let written =
                inject::inject_file(&staged, rule, &self.package_name, &self.out_dir)?;
            self.debug_copy(&written);
            result.additions.push(written);
        }

        let buckets: Vec<FileBucket> =
            self.set.files.iter().filter(|b| !b.is_empty()).cloned().collect();
        for bucket in &buckets {
            let Some(actual) = self.locate_source(&bucket.path)? else {
                warn!(
                    "source {} from the manifest is not part of this compile unit",
                    bucket.path.display()
                );
                continue;
            };
            let rewritten = self.rewrite_file(bucket, &actual, &mut result)?;
            self.debug_copy(&rewritten);
            result.replacements.push((actual, rewritten));
        }

        if result.fired {
            let globals = self.emit_globals()?;
            self.debug_copy(&globals);
            result.additions.push(globals);
        }
        Ok(result)
    }

    /// Rewrites one source file, returning the path it was written to.
    fn rewrite_file(
        &mut self,
        bucket: &FileBucket,
        actual: &Path,
        result: &mut RewriteResult,
    ) -> Result<PathBuf> {
        let file = ast::parser::parse_file(actual, ParseMode::Full)?;
        let mut updates: Vec<(usize, usize, String)> = Vec::new();
        // per-function chains, keyed by declaration offset in source order
        let mut chains: Vec<(usize, Vec<TrampolineJump>)> = Vec::new();
        // anonymous-result renames, once per function
        let mut renamed: HashMap<usize, Vec<String>> = HashMap::new();

        for rule in &bucket.func_rules {
            let target = file
                .find_func_decl(&rule.func, rule.recv.as_deref())
                .ok_or_else(|| WeaveError::TargetNotFound {
                    rule: rule.base.name.clone(),
                    kind: "func",
                    name: rule.func.clone(),
                    path: actual.to_path_buf(),
                })?;
            let key = target.span.start;
            let names = match renamed.get(&key) {
                Some(names) => names.clone(),
                None => {
                    let (names, edit) = trampoline::resolved_result_names(target);
                    if let Some(edit) = edit {
                        updates.push(edit);
                    }
                    renamed.insert(key, names.clone());
                    names
                }
            };
            let info = trampoline::plan(&file, target, rule, &names)?;
            let package_name = self.package_name.clone();
            let hooks = self.hook_library(&rule.path);
            let code =
                trampoline::synthesize(&info, &package_name, &target.name.data, hooks)?;
            trace!(
                "jump-site for rule {} on {} ({})",
                rule.base.name,
                target.name.data,
                info.suffix
            );
            let jump = TrampolineJump::new(info, code);
            let idx = match chains.iter().position(|(k, _)| *k == key) {
                Some(idx) => idx,
                None => {
                    chains.push((key, Vec::new()));
                    chains.len() - 1
                }
            };
            chains[idx].1.push(jump);
            result.fired = true;
        }

        for rule in &bucket.struct_rules {
            updates.push(inject::struct_insertion(&file, rule)?);
        }

        for rule in &bucket.raw_rules {
            let target = file
                .find_func_decl(&rule.func, rule.recv.as_deref())
                .ok_or_else(|| WeaveError::TargetNotFound {
                    rule: rule.base.name.clone(),
                    kind: "func",
                    name: rule.func.clone(),
                    path: actual.to_path_buf(),
                })?;
            let body = target.body.as_ref().ok_or_else(|| {
                WeaveError::msg(format!("rule {}: {} has no body", rule.base.name, rule.func))
            })?;
            let key = target.span.start;
            if !renamed.contains_key(&key) {
                let (names, edit) = trampoline::resolved_result_names(target);
                if let Some(edit) = edit {
                    updates.push(edit);
                }
                renamed.insert(key, names);
            }
            updates.push(inject::raw_insertion(rule, body.span.start)?);
        }

        // one optimizer pass per registered jump-site, then render the
        // chains and the appended declarations
        let mut appendix = String::new();
        for (key, chain) in &mut chains {
            for jump in chain.iter_mut() {
                optimize::optimize(jump);
            }
            let target = file
                .func_decls()
                .find(|f| f.span.start == *key)
                .expect("chain key points at a function declaration");
            let body = target.body.as_ref().ok_or_else(|| {
                WeaveError::msg(format!("{} has no body", target.name.data))
            })?;
            let orig = body
                .first_stmt
                .map(|(_, line)| (file.path.to_string_lossy().into_owned(), line));
            let rendered =
                jump::render_chain(chain, orig.as_ref().map(|(f, l)| (f.as_str(), *l)));
            updates.push((body.span.start + 1, body.span.start + 1, rendered));

            for jump in chain.iter() {
                appendix.push_str("\n\n");
                appendix.push_str(&jump.code.carrier);
                if jump.emit_before {
                    appendix.push_str("\n\n");
                    appendix.push_str(&jump.code.before_relay);
                }
                if jump.emit_after {
                    appendix.push_str("\n\n");
                    appendix.push_str(&jump.code.after_relay);
                }
                self.hook_decls.extend(jump.code.hook_decls.iter().cloned());
            }
        }
        if !appendix.is_empty() {
            appendix.push('\n');
            updates.push((file.src.len(), file.src.len(), appendix));
        }

        let content = utils::apply_updates(&file.src, updates);
        let file_name = actual
            .file_name()
            .ok_or_else(|| WeaveError::msg(format!("bad source path {}", actual.display())))?;
        let out_path = self.out_dir.join(file_name);
        utils::write_file(&out_path, &content)?;
        Ok(out_path)
    }

    /// The globals file: linkage marker import, the shared capability
    /// declaration and the accumulated hook declarations.
    fn emit_globals(&self) -> Result<PathBuf> {
        let mut content = String::from("// Code generated by otel-weave. DO NOT EDIT.\n\n");
        content.push_str(&format!("package {}\n\n", self.package_name));
        content.push_str(&ast::node::import_decl(&[(Some("_"), "unsafe")]));
        content.push_str("\n\n");
        content.push_str(&trampoline::hook_context_interface());
        content.push('\n');
        for decl in &self.hook_decls {
            content.push('\n');
            content.push_str(decl);
            content.push('\n');
        }
        let out_path = self.out_dir.join(GLOBALS_FILE);
        utils::write_file(&out_path, &content)?;
        Ok(out_path)
    }

    /// Maps a manifest source path onto this unit's compile arguments:
    /// absolute equality first, then basename. Two unit sources sharing the
    /// basename is ambiguous and fails loudly.
    fn locate_source(&self, wanted: &Path) -> Result<Option<PathBuf>> {
        if let Some(path) = self.sources.iter().find(|p| p.as_path() == wanted) {
            return Ok(Some(path.clone()));
        }
        let wanted_canon = utils::canonicalized(wanted);
        if let Some(path) =
            self.sources.iter().find(|p| utils::canonicalized(p) == wanted_canon)
        {
            return Ok(Some(path.clone()));
        }
        let Some(base) = wanted.file_name() else {
            return Ok(None);
        };
        let matches: Vec<&PathBuf> =
            self.sources.iter().filter(|p| p.file_name() == Some(base)).collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0].clone())),
            _ => Err(WeaveError::msg(format!(
                "ambiguous basename match for {}: {} and {}",
                wanted.display(),
                matches[0].display(),
                matches[1].display()
            ))),
        }
    }

    fn hook_library(&mut self, rule_path: &str) -> Option<&HookLibrary> {
        let paths = self.paths;
        self.hook_libs
            .entry(rule_path.to_string())
            .or_insert_with(|| {
                let dir = paths.resolve_hook_lib(rule_path);
                match HookLibrary::load(&dir) {
                    Ok(lib) => Some(lib),
                    Err(err) => {
                        warn!("hook signatures unchecked for {rule_path}: {err}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Mirrors a written file under the debug tree; failures are tolerated.
    fn debug_copy(&self, written: &Path) {
        let Some(name) = written.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let dest = self.paths.debug_copy(&self.import_path, name);
        if let Err(err) = utils::copy_file(written, &dest) {
            warn!("debug copy of {} failed: {err}", written.display());
        }
    }
}
