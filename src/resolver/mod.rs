//! Discovery of the build's real dependency graph.
//!
//! Runs the host toolchain in plan-only mode (`go build -a -x -n`), captures
//! the echoed subcommand stream and scrapes it for compile units and their
//! source files, including generated cgo files resolved back to their
//! hand-written originals.

use crate::{
    config::WeaveContext,
    error::{Result, WeaveError},
    utils,
};
use semver::Version;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Command,
};

/// One compile unit discovered from the dry plan.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Dependency {
    pub import_path: String,
    /// Module version extracted from the module-cache path, when present.
    pub version: Option<Version>,
    /// Source files contributing to the unit.
    pub sources: Vec<PathBuf>,
    /// Generated cgo file -> hand-written original.
    pub cgo_sources: BTreeMap<PathBuf, PathBuf>,
}

/// Runs the dry build and scrapes the plan. The raw command stream is kept
/// at `.otel-build/build-plan.log` for debugging.
pub fn discover(ctx: &WeaveContext, build_args: &[String]) -> Result<Vec<Dependency>> {
    let mut cmd = Command::new(&ctx.go_bin);
    cmd.args(["build", "-a", "-x", "-n"])
        .args(build_args)
        .current_dir(&ctx.paths.work_dir);
    debug!("running dry build: {cmd:?}");
    let output = cmd.output().map_err(|err| WeaveError::io(err, &ctx.go_bin))?;
    if !output.status.success() {
        return Err(WeaveError::go_output(&output));
    }
    // `-x -n` echo the plan to stderr
    let plan = String::from_utf8(output.stderr).map_err(|_| WeaveError::InvalidUtf8)?;
    utils::write_file(&ctx.paths.build_plan_log(), &plan)?;
    let deps = parse_plan(&plan, &ctx.paths.work_dir);
    debug!("discovered {} compile units", deps.len());
    Ok(deps)
}

/// Stream-parses a dry-plan command stream.
///
/// Malformed lines are skipped with a trace; a compile command with no
/// resolvable sources yields a dependency with empty sources, which simply
/// matches nothing downstream.
pub fn parse_plan(plan: &str, work_dir: &Path) -> Vec<Dependency> {
    let mut deps = Vec::new();
    // current source directory, tracked from `cd` lines
    let mut cur_dir = work_dir.to_path_buf();
    // cgo object dir -> source dir of the hand-written files
    let mut objdirs: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for line in plan.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        if words[0] == "cd" && words.len() >= 2 {
            cur_dir = PathBuf::from(words[1]);
            continue;
        }

        if is_cgo_command(&words) {
            if let Some(objdir) = flag_value(&words, "-objdir") {
                objdirs.insert(normalized_dir(objdir), cur_dir.clone());
            } else {
                trace!("cgo line without -objdir: {line}");
            }
            continue;
        }

        if !is_compile_command(&words) {
            continue;
        }
        let Some(import_path) = flag_value(&words, "-p") else {
            trace!("compile line without -p: {line}");
            continue;
        };

        let mut dep = Dependency { import_path: import_path.to_string(), ..Default::default() };
        for word in &words {
            if !word.ends_with(".go") {
                continue;
            }
            let path = resolve_source(&cur_dir, word);
            if let Some(original) = resolve_cgo_original(&objdirs, &path) {
                dep.cgo_sources.insert(path, original.clone());
                dep.sources.push(original);
            } else if path.parent().map_or(false, |dir| objdirs.contains_key(dir)) {
                // purely generated file living in a cgo objdir, no original
                trace!("skipping generated source {}", path.display());
            } else {
                dep.sources.push(path);
            }
        }
        dep.version = dep.sources.first().and_then(|p| utils::module_version(p));
        deps.push(dep);
    }
    deps
}

/// A compile command carries `-o`, `-p`, `-buildid` and the compile driver,
/// and is not a PGO recompilation probe. The interceptor uses the same
/// fingerprint to classify the subprocesses it is handed.
pub(crate) fn is_compile_command(words: &[&str]) -> bool {
    let has = |flag: &str| words.iter().any(|w| *w == flag);
    has("-o")
        && has("-p")
        && has("-buildid")
        && !has("-pgoprofile")
        && words.first().map_or(false, |w| is_tool(w, "compile"))
}

/// A cgo codegen command: the cgo tool with `-objdir` and `-importpath`,
/// but not the `-dynimport` probe.
fn is_cgo_command(words: &[&str]) -> bool {
    words.first().map_or(false, |w| is_tool(w, "cgo"))
        && words.iter().any(|w| *w == "-objdir")
        && words.iter().any(|w| *w == "-importpath")
        && !words.iter().any(|w| *w == "-dynimport")
}

fn is_tool(word: &str, tool: &str) -> bool {
    word == tool || word.ends_with(&format!("/{tool}")) || word.ends_with(&format!("\\{tool}"))
}

pub(crate) fn flag_value<'a>(words: &[&'a str], flag: &str) -> Option<&'a str> {
    words.iter().position(|w| *w == flag).and_then(|i| words.get(i + 1).copied())
}

fn normalized_dir(dir: &str) -> PathBuf {
    use path_slash::PathBufExt;
    PathBuf::from_slash(dir.trim_end_matches(['/', '\\']))
}

fn resolve_source(cur_dir: &Path, word: &str) -> PathBuf {
    let path = Path::new(word);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cur_dir.join(path.strip_prefix("./").unwrap_or(path))
    }
}

/// Maps `$WORK/bNNN/file.cgo1.go` back to `<source dir>/file.go` via the
/// recorded objdir.
fn resolve_cgo_original(objdirs: &BTreeMap<PathBuf, PathBuf>, path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(utils::CGO_GEN_SUFFIX)?;
    let objdir = path.parent()?;
    let src_dir = objdirs.get(objdir)?;
    Some(src_dir.join(format!("{stem}.go")))
}
